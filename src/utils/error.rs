use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out waiting for element: {selector}")]
    ElementTimeout { selector: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Missing credentials for {name}")]
    MissingCredentials { name: String },
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
