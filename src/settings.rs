use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

use crate::error::Result;
use crate::models::AveragingPeriod;
use crate::utils::constants::{
    CATALOG_FILE, DEFAULT_CONFIG_FILE, DEFAULT_EXPECTED_EXTENSIONS, DEFAULT_INSTALL_RETRIES,
    DEFAULT_INSTALL_RETRY_DELAY_SECS, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_PAGE_READY_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_MS, DOWNLOAD_DIR, DRIVER_CACHE_DIR, GECKODRIVER_VERSION,
    REGION_LISTING_BASE_URL,
};

/// Runtime settings, layered from built-in defaults, an optional TOML file
/// and `SINCA__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Settings {
    #[validate(nested)]
    pub catalog: CatalogSettings,
    #[validate(nested)]
    pub download: DownloadSettings,
    #[validate(nested)]
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CatalogSettings {
    pub output: PathBuf,
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,
    #[validate(url)]
    pub region_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DownloadSettings {
    pub output_dir: PathBuf,
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,
    #[validate(range(min = 10, max = 600000))]
    pub poll_interval_ms: u64,
    #[validate(range(min = 1, max = 100000))]
    pub max_poll_attempts: u32,
    #[validate(range(max = 10))]
    pub task_retries: u32,
    pub period: AveragingPeriod,
    #[validate(length(min = 1))]
    pub expected_extensions: Vec<String>,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BrowserSettings {
    pub driver_cache_dir: PathBuf,
    #[validate(length(min = 1))]
    pub geckodriver_version: String,
    pub firefox_binary: Option<PathBuf>,
    pub headless: bool,
    #[validate(range(min = 1, max = 600))]
    pub page_ready_timeout_secs: u64,
    #[validate(range(min = 1, max = 20))]
    pub install_retries: u32,
    pub install_retry_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: CatalogSettings {
                output: PathBuf::from(CATALOG_FILE),
                workers: num_cpus::get().clamp(1, 8),
                region_base_url: REGION_LISTING_BASE_URL.to_string(),
            },
            download: DownloadSettings {
                output_dir: PathBuf::from(DOWNLOAD_DIR),
                workers: num_cpus::get().clamp(1, 4),
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
                max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
                task_retries: 0,
                period: AveragingPeriod::default(),
                expected_extensions: DEFAULT_EXPECTED_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                report: None,
            },
            browser: BrowserSettings {
                driver_cache_dir: PathBuf::from(DRIVER_CACHE_DIR),
                geckodriver_version: GECKODRIVER_VERSION.to_string(),
                firefox_binary: None,
                headless: true,
                page_ready_timeout_secs: DEFAULT_PAGE_READY_TIMEOUT_SECS,
                install_retries: DEFAULT_INSTALL_RETRIES,
                install_retry_delay_secs: DEFAULT_INSTALL_RETRY_DELAY_SECS,
            },
        }
    }
}

impl Settings {
    /// Load settings. An explicit `config_file` must exist; without one,
    /// `sinca.toml` in the working directory is used when present.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = match config_file {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("SINCA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }
}

impl DownloadSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl BrowserSettings {
    pub fn page_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.page_ready_timeout_secs)
    }

    pub fn install_retry_delay(&self) -> Duration {
        Duration::from_secs(self.install_retry_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarvestError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.download.max_poll_attempts, 30);
        assert_eq!(settings.download.period, AveragingPeriod::Annual);
        assert_eq!(settings.download.task_retries, 0);
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sinca.toml");
        fs::write(
            &path,
            r#"
[download]
workers = 2
poll_interval_ms = 250
period = "diario"
expected_extensions = ["xls"]

[browser]
headless = false
"#,
        )?;

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.download.workers, 2);
        assert_eq!(settings.download.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.download.period, AveragingPeriod::Daily);
        assert_eq!(settings.download.expected_extensions, vec!["xls".to_string()]);
        assert!(!settings.browser.headless);
        assert_eq!(settings.catalog.output, PathBuf::from(CATALOG_FILE));
        Ok(())
    }

    #[test]
    fn test_out_of_range_value_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[download]\nmax_poll_attempts = 0\n")?;

        match Settings::load(Some(&path)) {
            Err(HarvestError::Validation(_)) => Ok(()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/sinca.toml")));
        assert!(matches!(result, Err(HarvestError::Config(_))));
    }
}
