pub mod config;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod store;
pub mod urls;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::{RunSummary, ScrapePipeline};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
