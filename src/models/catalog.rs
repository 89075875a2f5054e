use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::models::pollutant::averaging_variant_for_code;
use crate::models::AveragingPeriod;
use crate::utils::constants::{REPORT_BASE_URL, REPORT_GRAPH_SIZE};

/// Persisted catalog: region code -> region record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub regions: BTreeMap<String, RegionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    #[serde(deserialize_with = "deserialize_station_count")]
    pub number_stations: u32,
    #[serde(default)]
    pub stations: BTreeMap<String, StationRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct StationRecord {
    pub name: String,

    #[validate(length(min = 1))]
    pub key: String,

    pub id: Option<String>,

    #[serde(default)]
    pub online: bool,

    #[serde(default)]
    pub meteorological: bool,

    #[serde(default)]
    pub public: bool,

    pub info_url: Option<String>,

    #[serde(default)]
    pub contaminants: BTreeMap<String, SeriesRecord>,
}

/// Date range and report URL of one pollutant series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SeriesRecord {
    #[validate(length(equal = 6))]
    pub from_date: String,

    #[validate(length(equal = 6))]
    pub to_date: String,

    #[serde(default)]
    pub graph_url: String,
}

/// Older catalogs store the caption count as a string ("12").
fn deserialize_station_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("invalid station count '{}'", text))
        }),
    }
}

/// One pollutant series for one station, flattened out of the catalog.
///
/// `report_url` is derived from the identifying fields and the averaging
/// period; it cannot be set on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    pub region_code: String,
    pub station_key: String,
    pub station_name: String,
    pub station_id: Option<String>,
    pub pollutant_code: String,
    pub from_date: String,
    pub to_date: String,
    period: AveragingPeriod,
    report_url: String,
}

impl CatalogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        region_code: impl Into<String>,
        station_key: impl Into<String>,
        station_name: impl Into<String>,
        station_id: Option<String>,
        pollutant_code: impl Into<String>,
        from_date: impl Into<String>,
        to_date: impl Into<String>,
        period: AveragingPeriod,
    ) -> Self {
        let mut entry = Self {
            region_code: region_code.into(),
            station_key: station_key.into(),
            station_name: station_name.into(),
            station_id,
            pollutant_code: pollutant_code.into(),
            from_date: from_date.into(),
            to_date: to_date.into(),
            period,
            report_url: String::new(),
        };
        entry.report_url = build_report_url(
            &entry.region_code,
            &entry.station_key,
            &entry.station_name,
            &entry.pollutant_code,
            &entry.from_date,
            &entry.to_date,
            period,
        );
        entry
    }

    pub fn report_url(&self) -> &str {
        &self.report_url
    }

    pub fn period(&self) -> AveragingPeriod {
        self.period
    }

    /// The uniqueness key within a catalog.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.region_code, &self.station_key, &self.pollutant_code)
    }
}

impl std::fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.region_code, self.station_name, self.pollutant_code
        )
    }
}

/// Report page URL for a series.
///
/// The macro path uses the `discreto` variant for the two discrete PM codes
/// and `diario` for everything else.
pub fn build_report_url(
    region_code: &str,
    station_key: &str,
    station_name: &str,
    pollutant_code: &str,
    from_date: &str,
    to_date: &str,
    period: AveragingPeriod,
) -> String {
    let variant = averaging_variant_for_code(pollutant_code);
    format!(
        "{base}?page=pageRight&header={header}&gsize={gsize}&period=specified&from={from}&to={to}\
         &macro=./{region}/{key}/Cal/{code}//{code}.{variant}.{period}.ic\
         &limgfrom=&limgto=&limdfrom=&limdto=&rsrc=&stnkey=",
        base = REPORT_BASE_URL,
        header = urlencoding::encode(station_name),
        gsize = REPORT_GRAPH_SIZE,
        from = from_date,
        to = to_date,
        region = region_code,
        key = station_key,
        code = pollutant_code,
        variant = variant.as_str(),
        period = period.as_str(),
    )
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_region(&mut self, code: impl Into<String>, record: RegionRecord) {
        self.regions.insert(code.into(), record);
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn station_count(&self) -> usize {
        self.regions.values().map(|r| r.stations.len()).sum()
    }

    pub fn series_count(&self) -> usize {
        self.regions
            .values()
            .flat_map(|r| r.stations.values())
            .map(|s| s.contaminants.len())
            .sum()
    }

    /// Flatten the catalog into entries for the given averaging period.
    ///
    /// Stations and series that fail validation are skipped with a warning.
    pub fn entries(&self, period: AveragingPeriod) -> Vec<CatalogEntry> {
        let mut entries = Vec::with_capacity(self.series_count());

        for (region_code, region) in &self.regions {
            for (station_name, station) in &region.stations {
                if let Err(e) = station.validate() {
                    tracing::warn!(region = %region_code, station = %station_name, "skipping station: {}", e);
                    continue;
                }
                for (pollutant_code, series) in &station.contaminants {
                    if let Err(e) = series.validate() {
                        tracing::warn!(
                            region = %region_code,
                            station = %station_name,
                            pollutant = %pollutant_code,
                            "skipping series: {}",
                            e
                        );
                        continue;
                    }
                    entries.push(CatalogEntry::new(
                        region_code.as_str(),
                        station.key.as_str(),
                        station_name.as_str(),
                        station.id.clone(),
                        pollutant_code.as_str(),
                        series.from_date.as_str(),
                        series.to_date.as_str(),
                        period,
                    ));
                }
            }
        }

        entries
    }

    /// Human readable overview, one line per region.
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("=== Station Catalog ===\n");
        summary.push_str(&format!("Regions: {}\n", self.region_count()));
        summary.push_str(&format!("Stations: {}\n", self.station_count()));
        summary.push_str(&format!("Pollutant series: {}\n", self.series_count()));

        for (code, region) in &self.regions {
            let series: usize = region.stations.values().map(|s| s.contaminants.len()).sum();
            summary.push_str(&format!(
                "  {:<6} listed: {:>3}  cataloged: {:>3}  series: {:>4}\n",
                code,
                region.number_stations,
                region.stations.len(),
                series
            ));
        }

        summary
    }
}
