use crate::error::Result;
use crate::models::pollutant::code_for_display_name;
use crate::models::{CatalogEntry, Region};

/// Narrows a catalog down to the series a run should touch.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    regions: Vec<String>,
    station: Option<String>,
    pollutants: Vec<String>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region codes or bare numerals; unknown regions are rejected.
    pub fn with_regions(mut self, regions: &[String], base_url: &str) -> Result<Self> {
        self.regions = regions
            .iter()
            .map(|r| Region::from_code(r, base_url).map(|region| region.code))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// Case-insensitive substring of the station name or key.
    pub fn with_station(mut self, station: Option<String>) -> Self {
        self.station = station
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self
    }

    /// Pollutant codes or display names.
    pub fn with_pollutants(mut self, pollutants: &[String]) -> Self {
        self.pollutants = pollutants
            .iter()
            .map(|p| code_for_display_name(p.trim()).to_uppercase())
            .collect();
        self
    }

    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        if !self.regions.is_empty() && !self.regions.contains(&entry.region_code) {
            return false;
        }
        if let Some(station) = &self.station {
            let name = entry.station_name.to_lowercase();
            let key = entry.station_key.to_lowercase();
            if !name.contains(station) && !key.contains(station) {
                return false;
            }
        }
        if !self.pollutants.is_empty()
            && !self
                .pollutants
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&entry.pollutant_code))
        {
            return false;
        }
        true
    }

    pub fn apply(&self, entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AveragingPeriod;
    use crate::utils::constants::REGION_LISTING_BASE_URL;

    fn entry(region: &str, station: &str, code: &str) -> CatalogEntry {
        CatalogEntry::new(
            region,
            station.to_lowercase(),
            station,
            None,
            code,
            "010100",
            "250101",
            AveragingPeriod::Annual,
        )
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = EntryFilter::new();
        assert!(filter.matches(&entry("RVIII", "Talcahuano", "PM25")));
    }

    #[test]
    fn test_filter_by_region_station_and_pollutant() -> Result<()> {
        let filter = EntryFilter::new()
            .with_regions(&["VIII".to_string()], REGION_LISTING_BASE_URL)?
            .with_station(Some("talca".to_string()))
            .with_pollutants(&["NO2".to_string(), "pm25".to_string()]);

        assert!(filter.matches(&entry("RVIII", "Talcahuano", "PM25")));
        assert!(filter.matches(&entry("RVIII", "Talcahuano", "0003")));
        assert!(!filter.matches(&entry("RVIII", "Talcahuano", "PM10")));
        assert!(!filter.matches(&entry("RVIII", "Hualpén", "PM25")));
        assert!(!filter.matches(&entry("RM", "Talcahuano", "PM25")));
        Ok(())
    }

    #[test]
    fn test_unknown_region_is_rejected() {
        let result = EntryFilter::new().with_regions(&["RXX".to_string()], REGION_LISTING_BASE_URL);
        assert!(result.is_err());
    }
}
