pub mod config;
mod server;
pub mod violations;

pub use config::*;
pub use server::{DynViolationProvider, ServerError, build_api_router, serve};
pub use violations::*;
