pub mod alerts;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod fetch;
pub mod health;
pub mod models;
pub mod plugins;
pub mod reconcile;
pub mod scheduler;
pub mod store;
pub mod targets;
pub mod utils;
pub mod watcher;

// Re-export commonly used types
pub use config::AppConfig;
pub use scheduler::CycleReport;
pub use utils::error::AppError;
pub use watcher::Watcher;

pub type Result<T> = std::result::Result<T, AppError>;
