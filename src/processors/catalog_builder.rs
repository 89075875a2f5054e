use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::browser::{BrowserSession, RegionPageSource, SessionFactory};
use crate::error::{HarvestError, Result};
use crate::models::{Catalog, Region};
use crate::readers::{RegionPageParser, RegionParse};
use crate::utils::progress::ProgressReporter;

/// Outcome of a catalog build.
#[derive(Debug, Default)]
pub struct CatalogBuildReport {
    pub catalog: Catalog,
    /// Regions whose page could not be fetched or read, with the reason.
    pub failures: Vec<(String, String)>,
    /// Regions that produced no stations.
    pub empty_regions: Vec<String>,
    pub warnings: Vec<String>,
}

impl CatalogBuildReport {
    pub fn generate_summary(&self) -> String {
        let mut summary = self.catalog.summary();

        if !self.empty_regions.is_empty() {
            summary.push_str(&format!(
                "\nRegions without stations: {}\n",
                self.empty_regions.join(", ")
            ));
        }

        if !self.failures.is_empty() {
            summary.push_str(&format!("\nFailed regions ({}):\n", self.failures.len()));
            for (region, reason) in &self.failures {
                summary.push_str(&format!("  - {}: {}\n", region, reason));
            }
        }

        if !self.warnings.is_empty() {
            summary.push_str(&format!("\nWarnings ({}):\n", self.warnings.len()));
            for warning in self.warnings.iter().take(20) {
                summary.push_str(&format!("  - {}\n", warning));
            }
            if self.warnings.len() > 20 {
                summary.push_str(&format!("  ... and {} more\n", self.warnings.len() - 20));
            }
        }

        summary
    }
}

/// Walks region listing pages and assembles the station catalog.
pub struct CatalogBuilder {
    parser: Arc<RegionPageParser>,
    max_workers: usize,
    save_pages: Option<PathBuf>,
}

impl CatalogBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: Arc::new(RegionPageParser::new()?),
            max_workers: num_cpus::get().clamp(1, 8),
            save_pages: None,
        })
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Keep a copy of every fetched page as `<dir>/<REGION>.html`.
    pub fn with_save_pages(mut self, dir: Option<PathBuf>) -> Self {
        self.save_pages = dir;
        self
    }

    /// Fetch every region page through its own browser session, at most
    /// `max_workers` at a time, and parse it.
    pub async fn build_with_browser<F: SessionFactory>(
        &self,
        factory: Arc<F>,
        regions: Vec<Region>,
        progress: Option<&ProgressReporter>,
    ) -> Result<CatalogBuildReport> {
        if let Some(dir) = &self.save_pages {
            fs::create_dir_all(dir)?;
        }
        if let Some(p) = progress {
            p.set_length(regions.len() as u64);
            p.set_message("Fetching region pages...");
        }

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut set = JoinSet::new();
        for region in regions {
            let semaphore = Arc::clone(&semaphore);
            let factory = Arc::clone(&factory);
            let parser = Arc::clone(&self.parser);
            let save_pages = self.save_pages.clone();

            set.spawn(async move {
                let parsed = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        fetch_and_parse(factory.as_ref(), &parser, &region, save_pages.as_deref())
                            .await
                    }
                    Err(e) => Err(HarvestError::InvalidFormat(e.to_string())),
                };
                (region, parsed)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (region, parsed) = joined?;
            if let Some(p) = progress {
                p.increment(1);
                p.set_message(&format!("Parsed {}", region.code));
            }
            results.push((region, parsed));
        }

        Ok(merge(results))
    }

    /// Parse page sources obtained elsewhere, in parallel.
    pub fn build_from_pages(&self, pages: Vec<(Region, Result<String>)>) -> CatalogBuildReport {
        let parser = self.parser.as_ref();
        let results: Vec<(Region, Result<RegionParse>)> = pages
            .into_par_iter()
            .map(|(region, page)| {
                let parsed = page.map(|html| parser.parse(&region, &html));
                (region, parsed)
            })
            .collect();

        merge(results)
    }
}

/// Read saved pages named `<REGION>.html` from `dir`.
pub fn read_saved_pages(dir: &Path, regions: &[Region]) -> Vec<(Region, Result<String>)> {
    regions
        .iter()
        .map(|region| {
            let path = saved_page_path(dir, region);
            let page = fs::read_to_string(&path).map_err(HarvestError::from);
            (region.clone(), page)
        })
        .collect()
}

pub fn saved_page_path(dir: &Path, region: &Region) -> PathBuf {
    dir.join(format!("{}.html", region.code))
}

async fn fetch_and_parse<F: SessionFactory>(
    factory: &F,
    parser: &RegionPageParser,
    region: &Region,
    save_pages: Option<&Path>,
) -> Result<RegionParse> {
    let mut session = factory.open_session(None).await?;
    let page = session.region_page(region).await;
    if let Err(e) = session.close().await {
        tracing::warn!(region = %region.code, "browser session did not close cleanly: {}", e);
    }
    let page = page?;

    if let Some(dir) = save_pages {
        let path = saved_page_path(dir, region);
        if let Err(e) = fs::write(&path, &page) {
            tracing::warn!("could not save {}: {}", path.display(), e);
        }
    }

    Ok(parser.parse(region, &page))
}

/// Combine per-region results into one catalog. Regions are keyed by code,
/// so the order results arrive in does not matter.
fn merge(results: Vec<(Region, Result<RegionParse>)>) -> CatalogBuildReport {
    let mut report = CatalogBuildReport::default();

    for (region, parsed) in results {
        match parsed {
            Ok(parse) => {
                if parse.is_empty() {
                    tracing::warn!(region = %region.code, "region produced no stations");
                    report.empty_regions.push(region.code.clone());
                }
                report.warnings.extend(parse.warnings.into_iter().map(|w| {
                    if w.starts_with(&region.code) {
                        w
                    } else {
                        format!("{}: {}", region.code, w)
                    }
                }));
                report.catalog.insert_region(region.code, parse.record);
            }
            Err(e) => {
                tracing::error!(region = %region.code, "region failed: {}", e);
                report.failures.push((region.code, e.to_string()));
            }
        }
    }

    report.empty_regions.sort();
    report.failures.sort();
    report.warnings.sort();
    report
}
