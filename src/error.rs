use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog file not found: {}", path.display())]
    CatalogMissing { path: PathBuf },

    #[error("Malformed catalog file {}: {message}", path.display())]
    CatalogFormat { path: PathBuf, message: String },

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Download trigger failed: {0}")]
    Trigger(String),

    #[error("No new file appeared after {attempts} poll attempts")]
    DownloadTimeout { attempts: u32 },

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Failed to install geckodriver after {attempts} attempts: {message}")]
    DriverInstall { attempts: u32, message: String },

    #[error("Failed to start geckodriver: {0}")]
    DriverStart(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
