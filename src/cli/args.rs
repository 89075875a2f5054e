use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::AveragingPeriod;

#[derive(Parser)]
#[command(name = "sinca-harvester")]
#[command(about = "Catalog and download SINCA air-quality series")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Settings file [default: sinca.toml when present]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the station catalog from the region listing pages
    Catalog {
        #[arg(short, long, help = "Catalog JSON path [default: data/stations/stations_data.json]")]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Region codes to scrape (e.g. RVIII, RM); all when omitted")]
        region: Vec<String>,

        #[arg(long, help = "Concurrent browser sessions")]
        workers: Option<usize>,

        #[arg(
            long,
            help = "Parse saved <REGION>.html pages from this directory instead of a browser"
        )]
        pages_dir: Option<PathBuf>,

        #[arg(long, help = "Save fetched pages as <REGION>.html into this directory")]
        save_pages: Option<PathBuf>,
    },

    /// Download one CSV export per cataloged series
    Download {
        #[arg(short, long, help = "Catalog JSON path [default: data/stations/stations_data.json]")]
        catalog: Option<PathBuf>,

        #[arg(short, long, help = "Directory for renamed files [default: data/contaminants]")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, help = "Only these region codes")]
        region: Vec<String>,

        #[arg(short, long, help = "Only stations whose name or key contains this text")]
        station: Option<String>,

        #[arg(short, long, help = "Only these pollutant codes (e.g. PM25, 0003)")]
        pollutant: Vec<String>,

        #[arg(long, help = "Concurrent browser sessions")]
        workers: Option<usize>,

        #[arg(
            long,
            value_parser = parse_period,
            help = "Averaging period: diario, trimestral or anual"
        )]
        period: Option<AveragingPeriod>,

        #[arg(long, help = "Milliseconds between directory polls")]
        poll_interval_ms: Option<u64>,

        #[arg(long, help = "Polls before a download counts as failed")]
        max_poll_attempts: Option<u32>,

        #[arg(long, help = "Extra attempts for a failed download")]
        task_retries: Option<u32>,

        #[arg(long, help = "Write a CSV report of every task to this path")]
        report: Option<PathBuf>,

        #[arg(long, help = "Show the browser window")]
        headed: bool,

        #[arg(long, help = "List the selected series without downloading")]
        dry_run: bool,
    },

    /// Summarize an existing catalog
    Info {
        #[arg(short, long, help = "Catalog JSON path [default: data/stations/stations_data.json]")]
        catalog: Option<PathBuf>,

        #[arg(long, default_value = "0", help = "Print this many entries with their report URLs")]
        entries: usize,
    },

    /// Download geckodriver into the driver cache if it is missing
    InstallDriver,
}

fn parse_period(value: &str) -> Result<AveragingPeriod, String> {
    value.parse::<AveragingPeriod>().map_err(|e| e.to_string())
}
