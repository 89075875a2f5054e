pub mod anchor;
pub mod catalog_reader;
pub mod region_page;

pub use anchor::{extract_anchor_fields, AnchorFields};
pub use catalog_reader::CatalogReader;
pub use region_page::{RegionPageParser, RegionParse};
