use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{HarvestError, Result};
use crate::models::{build_report_url, AveragingPeriod, Catalog};

/// Persists a catalog as pretty-printed JSON.
pub struct CatalogWriter {
    period: AveragingPeriod,
}

impl CatalogWriter {
    pub fn new() -> Self {
        Self {
            period: AveragingPeriod::default(),
        }
    }

    /// Period used for the stored `graph_url` values.
    pub fn with_period(mut self, period: AveragingPeriod) -> Self {
        self.period = period;
        self
    }

    /// Fill in `graph_url` for every series from its identifying fields.
    pub fn derive_graph_urls(&self, catalog: &mut Catalog) {
        for (region_code, region) in catalog.regions.iter_mut() {
            for (station_name, station) in region.stations.iter_mut() {
                for (code, series) in station.contaminants.iter_mut() {
                    series.graph_url = build_report_url(
                        region_code,
                        &station.key,
                        station_name,
                        code,
                        &series.from_date,
                        &series.to_date,
                        self.period,
                    );
                }
            }
        }
    }

    /// Write the catalog atomically: the JSON goes to a temporary file next
    /// to the destination and is renamed over it once complete.
    pub fn write(&self, catalog: &mut Catalog, path: &Path) -> Result<()> {
        self.derive_graph_urls(catalog);

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, catalog)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        temp.persist(path)
            .map_err(|e| HarvestError::Io(e.error))?;

        tracing::info!(
            path = %path.display(),
            regions = catalog.region_count(),
            series = catalog.series_count(),
            "catalog written"
        );
        Ok(())
    }
}

impl Default for CatalogWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RegionRecord, SeriesRecord, StationRecord};
    use crate::readers::CatalogReader;
    use tempfile::TempDir;

    fn catalog() -> Catalog {
        let mut station = StationRecord {
            name: "Talcahuano".to_string(),
            key: "talcahuano".to_string(),
            ..Default::default()
        };
        station.contaminants.insert(
            "PM2D".to_string(),
            SeriesRecord {
                from_date: "010100".to_string(),
                to_date: "250101".to_string(),
                graph_url: String::new(),
            },
        );
        let mut region = RegionRecord {
            number_stations: 1,
            ..Default::default()
        };
        region.stations.insert("Talcahuano".to_string(), station);

        let mut catalog = Catalog::new();
        catalog.insert_region("RVIII", region);
        catalog
    }

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("stations").join("stations_data.json");

        let mut original = catalog();
        CatalogWriter::new().write(&mut original, &path)?;

        let loaded = CatalogReader::read(&path)?;
        assert_eq!(loaded, original);

        let url = &loaded.regions["RVIII"].stations["Talcahuano"].contaminants["PM2D"].graph_url;
        assert!(url.contains("PM2D.discreto.anual.ic"));

        // Only the final file remains in the directory
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert_eq!(names.len(), 1);
        Ok(())
    }

    #[test]
    fn test_overwrites_existing_catalog() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("stations_data.json");
        fs::write(&path, "stale")?;

        CatalogWriter::new()
            .with_period(AveragingPeriod::Daily)
            .write(&mut catalog(), &path)?;

        let loaded = CatalogReader::read(&path)?;
        assert_eq!(loaded.series_count(), 1);
        Ok(())
    }
}
