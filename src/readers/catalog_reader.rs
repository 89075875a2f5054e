use std::fs;
use std::path::Path;

use crate::error::{HarvestError, Result};
use crate::models::Catalog;

/// Loads a persisted catalog, enforcing the preconditions of a download run:
/// the file must exist and its root must be a JSON object.
pub struct CatalogReader;

impl CatalogReader {
    pub fn read(path: &Path) -> Result<Catalog> {
        if !path.is_file() {
            return Err(HarvestError::CatalogMissing {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Catalog> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| HarvestError::CatalogFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if !value.is_object() {
            return Err(HarvestError::CatalogFormat {
                path: path.to_path_buf(),
                message: "root must be a JSON object keyed by region code".to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| HarvestError::CatalogFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
