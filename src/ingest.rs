pub mod aggregate;
pub mod archive;
pub mod filter;
pub mod parser;
