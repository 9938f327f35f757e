pub mod app_state;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, Result};
