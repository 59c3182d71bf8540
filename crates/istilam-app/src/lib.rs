pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod query;
