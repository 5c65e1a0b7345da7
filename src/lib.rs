pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod http_client;
pub mod messaging;
pub mod models;
pub mod notify;
pub mod queries;
pub mod services;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
