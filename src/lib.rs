pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod relay;
pub mod tracing_helper;
mod utils;
