use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::browser::{DriverCache, FirefoxSessionFactory};
use crate::cli::args::{Cli, Commands};
use crate::error::{HarvestError, Result};
use crate::models::{EntryFilter, Region};
use crate::processors::{read_saved_pages, CatalogBuilder, DownloadProcessor, Reconciler};
use crate::readers::CatalogReader;
use crate::settings::{BrowserSettings, Settings};
use crate::utils::progress::ProgressReporter;
use crate::writers::{write_download_report, CatalogWriter};

pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Catalog {
            output,
            region,
            workers,
            pages_dir,
            save_pages,
        } => {
            let output = output.unwrap_or_else(|| settings.catalog.output.clone());
            let workers = workers.unwrap_or(settings.catalog.workers);
            let regions = Region::select(&region, &settings.catalog.region_base_url)?;

            println!("Building station catalog...");
            println!("Regions: {}", regions.len());
            println!("Output file: {}", output.display());

            let builder = CatalogBuilder::new()?
                .with_max_workers(workers)
                .with_save_pages(save_pages);

            let mut report = match pages_dir {
                Some(dir) => {
                    println!("Reading saved pages from {}", dir.display());
                    builder.build_from_pages(read_saved_pages(&dir, &regions))
                }
                None => {
                    let factory = firefox_factory(&settings.browser, false).await?;
                    let progress = ProgressReporter::new(regions.len() as u64, "Fetching regions...", false);
                    let report = builder
                        .build_with_browser(Arc::new(factory), regions, Some(&progress))
                        .await?;
                    progress.finish_with_message(&format!(
                        "Cataloged {} regions",
                        report.catalog.region_count()
                    ));
                    report
                }
            };

            println!("\n{}", report.generate_summary());

            if report.catalog.region_count() == 0 {
                return Err(HarvestError::InvalidFormat(
                    "no region could be cataloged; nothing written".to_string(),
                ));
            }

            CatalogWriter::new()
                .with_period(settings.download.period)
                .write(&mut report.catalog, &output)?;
            println!("Catalog written to {}", output.display());
        }

        Commands::Download {
            catalog,
            output_dir,
            region,
            station,
            pollutant,
            workers,
            period,
            poll_interval_ms,
            max_poll_attempts,
            task_retries,
            report,
            headed,
            dry_run,
        } => {
            let mut download = settings.download.clone();
            if let Some(dir) = output_dir {
                download.output_dir = dir;
            }
            if let Some(w) = workers {
                download.workers = w.max(1);
            }
            if let Some(p) = period {
                download.period = p;
            }
            if let Some(ms) = poll_interval_ms {
                download.poll_interval_ms = ms;
            }
            if let Some(n) = max_poll_attempts {
                download.max_poll_attempts = n;
            }
            if let Some(n) = task_retries {
                download.task_retries = n;
            }

            let catalog_path = catalog.unwrap_or_else(|| settings.catalog.output.clone());
            let catalog = CatalogReader::read(&catalog_path)?;

            let filter = EntryFilter::new()
                .with_regions(&region, &settings.catalog.region_base_url)?
                .with_station(station)
                .with_pollutants(&pollutant);
            let entries = filter.apply(catalog.entries(download.period));

            println!("Catalog: {}", catalog_path.display());
            println!("Selected series: {}", entries.len());
            println!("Output directory: {}", download.output_dir.display());

            if dry_run {
                for entry in &entries {
                    println!("  {} -> {}", entry, entry.report_url());
                }
                return Ok(());
            }
            if entries.is_empty() {
                println!("Nothing to download");
                return Ok(());
            }

            let factory = firefox_factory(&settings.browser, headed).await?;
            let reconciler = Reconciler::new()
                .with_poll_interval(download.poll_interval())
                .with_max_attempts(download.max_poll_attempts)
                .with_expected_extensions(download.expected_extensions.clone());
            let processor = DownloadProcessor::new(factory, &download.output_dir)
                .with_reconciler(reconciler)
                .with_max_workers(download.workers)
                .with_task_retries(download.task_retries);

            let progress = ProgressReporter::new(entries.len() as u64, "Downloading...", false);
            let summary = processor.run(entries, Some(&progress)).await?;

            println!("\n{}", summary.generate_summary());

            let report_path = report
                .or(download.report.clone())
                .unwrap_or_else(|| default_report_path(&download.output_dir));
            write_download_report(&summary, &report_path)?;
            println!("Report written to {}", report_path.display());
        }

        Commands::Info { catalog, entries } => {
            let catalog_path = catalog.unwrap_or_else(|| settings.catalog.output.clone());
            println!("Reading catalog: {}", catalog_path.display());

            let catalog = CatalogReader::read(&catalog_path)?;
            println!("\n{}", catalog.summary());

            if entries > 0 {
                println!("Entries (showing {}):", entries);
                for (i, entry) in catalog
                    .entries(settings.download.period)
                    .iter()
                    .take(entries)
                    .enumerate()
                {
                    println!("{}. {} [{}-{}]", i + 1, entry, entry.from_date, entry.to_date);
                    println!("   {}", entry.report_url());
                }
            }
        }

        Commands::InstallDriver => {
            let path = driver_cache(&settings.browser).ensure_installed().await?;
            println!("geckodriver ready at {}", path.display());
        }
    }

    Ok(())
}

fn driver_cache(browser: &BrowserSettings) -> DriverCache {
    DriverCache::new(&browser.driver_cache_dir)
        .with_version(browser.geckodriver_version.clone())
        .with_retries(browser.install_retries, browser.install_retry_delay())
}

async fn firefox_factory(browser: &BrowserSettings, headed: bool) -> Result<FirefoxSessionFactory> {
    let driver = driver_cache(browser).ensure_installed().await?;
    Ok(FirefoxSessionFactory::new(driver)
        .with_firefox_binary(browser.firefox_binary.clone())
        .with_headless(browser.headless && !headed)
        .with_page_ready_timeout(browser.page_ready_timeout()))
}

fn default_report_path(output_dir: &Path) -> PathBuf {
    output_dir.join(format!(
        "download_report_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}
