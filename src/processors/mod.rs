pub mod catalog_builder;
pub mod download_processor;
pub mod reconciler;
pub mod snapshot;
pub mod worker_dir;

pub use catalog_builder::{read_saved_pages, CatalogBuildReport, CatalogBuilder};
pub use download_processor::DownloadProcessor;
pub use reconciler::{promote, Reconciler};
pub use snapshot::DirectorySnapshot;
pub use worker_dir::WorkerDirectory;
