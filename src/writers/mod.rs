pub mod catalog_writer;
pub mod report_writer;

pub use catalog_writer::CatalogWriter;
pub use report_writer::write_download_report;
