use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thirtyfour::common::capabilities::firefox::FirefoxPreferences;
use thirtyfour::prelude::*;
use thirtyfour::FirefoxCapabilities;

use super::driver::GeckoService;
use super::{BrowserSession, DownloadTrigger, RegionPageSource, SessionFactory};
use crate::error::{HarvestError, Result};
use crate::models::{CatalogEntry, Region};
use crate::utils::constants::{
    DEFAULT_PAGE_READY_TIMEOUT_SECS, DOWNLOAD_MIME_TYPES, EXPORT_LINK_SELECTOR,
};

const REGION_TABLE_SELECTOR: &str = "#tablaRegional";
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Opens Firefox sessions, each with its own geckodriver process.
#[derive(Debug, Clone)]
pub struct FirefoxSessionFactory {
    driver_path: PathBuf,
    firefox_binary: Option<PathBuf>,
    headless: bool,
    page_ready_timeout: Duration,
}

impl FirefoxSessionFactory {
    pub fn new(driver_path: impl Into<PathBuf>) -> Self {
        Self {
            driver_path: driver_path.into(),
            firefox_binary: None,
            headless: true,
            page_ready_timeout: Duration::from_secs(DEFAULT_PAGE_READY_TIMEOUT_SECS),
        }
    }

    pub fn with_firefox_binary(mut self, binary: Option<PathBuf>) -> Self {
        self.firefox_binary = binary;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_page_ready_timeout(mut self, timeout: Duration) -> Self {
        self.page_ready_timeout = timeout;
        self
    }

    fn capabilities(&self, download_dir: Option<&Path>) -> Result<FirefoxCapabilities> {
        let mut caps = DesiredCapabilities::firefox();
        if self.headless {
            caps.set_headless()?;
        }

        if let Some(dir) = download_dir {
            let mut prefs = FirefoxPreferences::new();
            prefs.set("browser.download.folderList", 2)?;
            prefs.set("browser.download.dir", dir.display().to_string())?;
            prefs.set("browser.download.useDownloadDir", true)?;
            prefs.set("browser.download.manager.showWhenStarting", false)?;
            prefs.set("browser.download.panel.shown", false)?;
            prefs.set("browser.download.alwaysOpenPanel", false)?;
            prefs.set("browser.helperApps.neverAsk.saveToDisk", DOWNLOAD_MIME_TYPES)?;
            prefs.set("pdfjs.disabled", true)?;
            caps.set_preferences(prefs)?;
        }

        Ok(caps)
    }
}

#[async_trait]
impl SessionFactory for FirefoxSessionFactory {
    type Session = FirefoxSession;

    async fn open_session(&self, download_dir: Option<&Path>) -> Result<FirefoxSession> {
        // Firefox ignores relative download directories
        let download_dir = match download_dir {
            Some(dir) => Some(dir.canonicalize()?),
            None => None,
        };
        let caps = self.capabilities(download_dir.as_deref())?;

        let mut service = GeckoService::start(&self.driver_path, self.firefox_binary.as_deref()).await?;
        let driver = match WebDriver::new(service.url(), caps).await {
            Ok(driver) => driver,
            Err(e) => {
                service.shutdown().await;
                return Err(e.into());
            }
        };

        tracing::debug!(
            port = service.port(),
            download_dir = ?download_dir,
            "firefox session opened"
        );
        Ok(FirefoxSession {
            driver,
            service,
            page_ready_timeout: self.page_ready_timeout,
        })
    }
}

/// One Firefox window and the geckodriver process serving it.
pub struct FirefoxSession {
    driver: WebDriver,
    service: GeckoService,
    page_ready_timeout: Duration,
}

#[async_trait]
impl RegionPageSource for FirefoxSession {
    async fn region_page(&mut self, region: &Region) -> Result<String> {
        self.driver.goto(region.listing_url.as_str()).await?;

        let ready = self
            .driver
            .query(By::Css(REGION_TABLE_SELECTOR))
            .wait(self.page_ready_timeout, ELEMENT_POLL_INTERVAL)
            .first()
            .await;
        if let Err(e) = ready {
            tracing::warn!(
                region = %region.code,
                "station table did not appear within {:?}: {}",
                self.page_ready_timeout,
                e
            );
        }

        Ok(self.driver.source().await?)
    }
}

#[async_trait]
impl DownloadTrigger for FirefoxSession {
    async fn trigger_download(&mut self, entry: &CatalogEntry) -> Result<()> {
        self.driver
            .goto(entry.report_url())
            .await
            .map_err(|e| HarvestError::Trigger(format!("{}: could not open report: {}", entry, e)))?;

        let link = self
            .driver
            .query(By::Css(EXPORT_LINK_SELECTOR))
            .wait(self.page_ready_timeout, ELEMENT_POLL_INTERVAL)
            .first()
            .await
            .map_err(|e| HarvestError::Trigger(format!("{}: export link not found: {}", entry, e)))?;

        link.wait_until()
            .clickable()
            .await
            .map_err(|e| HarvestError::Trigger(format!("{}: export link not clickable: {}", entry, e)))?;
        link.click()
            .await
            .map_err(|e| HarvestError::Trigger(format!("{}: click failed: {}", entry, e)))?;

        tracing::debug!(entry = %entry, "export requested");
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FirefoxSession {
    async fn close(self) -> Result<()> {
        let FirefoxSession {
            driver, mut service, ..
        } = self;
        let quit = driver.quit().await;
        service.shutdown().await;
        quit?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_route_downloads_to_worker_dir() -> Result<()> {
        let factory = FirefoxSessionFactory::new("geckodriver");
        let caps = factory.capabilities(Some(Path::new("/data/.staging/worker-0-abc")))?;

        let prefs: serde_json::Value = caps
            .browser_option("prefs")
            .ok_or_else(|| HarvestError::InvalidFormat("no prefs set".to_string()))?;
        assert_eq!(prefs["browser.download.folderList"], 2);
        assert_eq!(prefs["browser.download.dir"], "/data/.staging/worker-0-abc");
        assert_eq!(
            prefs["browser.helperApps.neverAsk.saveToDisk"],
            DOWNLOAD_MIME_TYPES
        );
        assert!(caps.args().iter().any(|a| a == "-headless"));
        Ok(())
    }

    #[test]
    fn test_headed_session_without_download_dir() -> Result<()> {
        let caps = FirefoxSessionFactory::new("geckodriver")
            .with_headless(false)
            .capabilities(None)?;

        assert!(caps.browser_option::<serde_json::Value>("prefs").is_none());
        assert!(caps.args().is_empty());
        Ok(())
    }
}
