//! Browser collaborators.
//!
//! The catalog builder and the download reconciler only see a browser
//! through the traits below: one session per worker, opened by a factory and
//! closed explicitly when the worker is done.

pub mod driver;
pub mod firefox;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::models::{CatalogEntry, Region};

pub use driver::{DriverCache, GeckoService};
pub use firefox::{FirefoxSession, FirefoxSessionFactory};

/// Produces the page source of a region's station listing.
#[async_trait]
pub trait RegionPageSource: Send {
    async fn region_page(&mut self, region: &Region) -> Result<String>;
}

/// Causes the export for an entry to be written into the session's
/// download directory. Completion is observed by the caller, not here.
#[async_trait]
pub trait DownloadTrigger: Send {
    async fn trigger_download(&mut self, entry: &CatalogEntry) -> Result<()>;
}

#[async_trait]
pub trait BrowserSession: RegionPageSource + DownloadTrigger {
    /// Release the session and everything it started.
    async fn close(self) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: BrowserSession + 'static;

    /// Open a session whose downloads land in `download_dir`, if given.
    async fn open_session(&self, download_dir: Option<&Path>) -> Result<Self::Session>;
}
