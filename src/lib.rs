pub mod cli;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::AppError;
pub use models::{Config, OutputFormat};
