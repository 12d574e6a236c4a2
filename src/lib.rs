pub mod api;
pub mod app;
pub mod backend;
pub mod config;
mod error;
pub mod model;
pub mod sse;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
