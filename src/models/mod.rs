pub mod catalog;
pub mod filter;
pub mod pollutant;
pub mod region;
pub mod task;

pub use catalog::{build_report_url, Catalog, CatalogEntry, RegionRecord, SeriesRecord, StationRecord};
pub use filter::EntryFilter;
pub use pollutant::{AveragingPeriod, AveragingVariant, Pollutant};
pub use region::Region;
pub use task::{DownloadSummary, DownloadTask, TaskOutcome, TaskReportRow};
