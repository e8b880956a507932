pub mod price_service;
