pub mod common;
pub mod config;
pub mod domain;
pub mod infra;
pub mod ingest;
pub mod schema;
pub mod server;
pub mod util;
