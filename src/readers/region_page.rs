use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

use crate::error::{HarvestError, Result};
use crate::models::{Region, RegionRecord, SeriesRecord, StationRecord};
use crate::readers::anchor::extract_anchor_fields;
use crate::utils::constants::{
    ANCHOR_SELECTOR, STATION_COUNT_SELECTOR, STATION_ROW_SELECTOR, STATION_TYPE_METEOROLOGICAL,
    STATION_TYPE_ONLINE, STATION_TYPE_PUBLIC,
};

/// Result of parsing one region listing page.
#[derive(Debug, Clone, Default)]
pub struct RegionParse {
    pub record: RegionRecord,
    /// Problems that did not stop parsing (missing table, unmatched anchors).
    pub warnings: Vec<String>,
}

impl RegionParse {
    pub fn is_empty(&self) -> bool {
        self.record.stations.is_empty()
    }
}

/// Parses a station listing page into a region record.
pub struct RegionPageParser {
    count_selector: Selector,
    row_selector: Selector,
    anchor_selector: Selector,
    online_selector: Selector,
    meteorological_selector: Selector,
    public_selector: Selector,
}

impl RegionPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            count_selector: parse_selector(STATION_COUNT_SELECTOR)?,
            row_selector: parse_selector(STATION_ROW_SELECTOR)?,
            anchor_selector: parse_selector(ANCHOR_SELECTOR)?,
            online_selector: type_selector(STATION_TYPE_ONLINE)?,
            meteorological_selector: type_selector(STATION_TYPE_METEOROLOGICAL)?,
            public_selector: type_selector(STATION_TYPE_PUBLIC)?,
        })
    }

    /// Parse a listing page. A page without the station table yields an empty
    /// record with a warning rather than an error.
    pub fn parse(&self, region: &Region, html: &str) -> RegionParse {
        let document = Html::parse_document(html);
        let mut warnings = Vec::new();

        let listed = document
            .select(&self.count_selector)
            .next()
            .map(|caption| collapse_whitespace(&element_text(&caption)));

        let rows: Vec<ElementRef> = document.select(&self.row_selector).collect();
        if rows.is_empty() {
            warnings.push(format!(
                "{}: no station table found at {}",
                region.code, region.listing_url
            ));
            return RegionParse {
                record: RegionRecord::default(),
                warnings,
            };
        }

        let mut stations: BTreeMap<String, StationRecord> = BTreeMap::new();
        let mut region_codes_seen = Vec::new();

        let base = Url::parse(&region.listing_url).ok();
        for row in rows {
            let Some(station) =
                self.parse_row(&row, base.as_ref(), &mut region_codes_seen, &mut warnings)
            else {
                continue;
            };
            insert_station(&mut stations, station, &region.code, &mut warnings);
        }

        if region_codes_seen.is_empty() {
            warnings.push(format!(
                "{}: no region code found in the analyzed links",
                region.code
            ));
            return RegionParse {
                record: RegionRecord::default(),
                warnings,
            };
        }
        if let Some(other) = region_codes_seen.iter().find(|c| **c != region.code) {
            warnings.push(format!(
                "{}: anchors reference region {}, keeping listing region",
                region.code, other
            ));
        }

        let number_stations = match listed.as_deref().and_then(parse_station_count) {
            Some(count) => count,
            None => {
                warnings.push(format!(
                    "{}: station count caption missing or unreadable, using parsed count",
                    region.code
                ));
                stations.len() as u32
            }
        };

        RegionParse {
            record: RegionRecord {
                number_stations,
                stations,
            },
            warnings,
        }
    }

    /// Build a station record from one table row once all of its anchors
    /// have been read.
    fn parse_row(
        &self,
        row: &ElementRef,
        base: Option<&Url>,
        region_codes_seen: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Option<StationRecord> {
        let mut anchors = row.select(&self.anchor_selector);
        let name_anchor = anchors.next()?;
        let name = collapse_whitespace(&element_text(&name_anchor));
        if name.is_empty() {
            return None;
        }
        let info_url = name_anchor
            .value()
            .attr("href")
            .map(|href| absolute_url(base, href));

        let mut station = StationRecord {
            name: name.clone(),
            online: row.select(&self.online_selector).next().is_some(),
            meteorological: row.select(&self.meteorological_selector).next().is_some(),
            public: row.select(&self.public_selector).next().is_some(),
            id: info_url
                .as_deref()
                .and_then(|url| extract_anchor_fields(url).station_id),
            info_url,
            ..Default::default()
        };

        for anchor in std::iter::once(name_anchor).chain(anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let fields = extract_anchor_fields(href);

            if station.id.is_none() {
                station.id = fields.station_id.clone();
            }
            if let Some(code) = &fields.region_code {
                if !region_codes_seen.contains(code) {
                    region_codes_seen.push(code.clone());
                }
            }
            if let Some(key) = &fields.station_key {
                if station.key.is_empty() {
                    station.key = key.clone();
                } else if station.key != *key {
                    warnings.push(format!(
                        "station '{}' links to a second key '{}', ignoring it",
                        name, key
                    ));
                    continue;
                }
            }
            if !fields.is_series() {
                continue;
            }

            let (Some(code), Some(from_date), Some(to_date)) =
                (fields.pollutant_code, fields.from_date, fields.to_date)
            else {
                continue;
            };
            // Last anchor for a pollutant wins.
            station.contaminants.insert(
                code,
                SeriesRecord {
                    from_date,
                    to_date,
                    graph_url: String::new(),
                },
            );
        }

        if station.key.is_empty() {
            warnings.push(format!("station '{}' has no series links, skipped", name));
            return None;
        }

        Some(station)
    }
}

/// Resolve a link against the listing page; unparseable links are kept as-is.
fn absolute_url(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(String::from)
        .unwrap_or_else(|| href.to_string())
}

/// Insert a station keyed by display name.
///
/// Rows sharing a station key merge into one record whatever their names,
/// with later series ranges winning. A name already used by a different key
/// is disambiguated with the key.
fn insert_station(
    stations: &mut BTreeMap<String, StationRecord>,
    station: StationRecord,
    region_code: &str,
    warnings: &mut Vec<String>,
) {
    if let Some(existing) = stations.values_mut().find(|s| s.key == station.key) {
        if existing.name != station.name {
            warnings.push(format!(
                "{}: station '{}' is listed again as '{}', merging into '{}'",
                region_code, station.key, station.name, existing.name
            ));
        }
        merge_station(existing, station);
        return;
    }

    if !stations.contains_key(&station.name) {
        stations.insert(station.name.clone(), station);
        return;
    }

    let mut display = format!("{} ({})", station.name, station.key);
    let mut suffix = 2;
    while stations.contains_key(&display) {
        display = format!("{} ({}) {}", station.name, station.key, suffix);
        suffix += 1;
    }
    warnings.push(format!(
        "{}: station name '{}' is shared by several keys, storing as '{}'",
        region_code, station.name, display
    ));
    stations.insert(
        display.clone(),
        StationRecord {
            name: display,
            ..station
        },
    );
}

fn merge_station(existing: &mut StationRecord, later: StationRecord) {
    existing.contaminants.extend(later.contaminants);
    existing.online |= later.online;
    existing.meteorological |= later.meteorological;
    existing.public |= later.public;
    if existing.id.is_none() {
        existing.id = later.id;
    }
    if existing.info_url.is_none() {
        existing.info_url = later.info_url;
    }
}

/// Read the number after the colon of the caption, e.g. "Estaciones: 12".
pub fn parse_station_count(caption: &str) -> Option<u32> {
    caption.split(':').nth(1)?.trim().parse().ok()
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| {
        HarvestError::InvalidFormat(format!("invalid CSS selector '{}': {}", selector, e))
    })
}

fn type_selector(title: &str) -> Result<Selector> {
    parse_selector(&format!("span[title='{}']", title))
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join("")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::REGION_LISTING_BASE_URL;
    use pretty_assertions::assert_eq;

    fn series_href(region: &str, key: &str, code: &str, from: &str, to: &str) -> String {
        format!(
            "/cgi-bin/APUB-MMA/apub.htmlindico2.cgi?page=pageRight&amp;header=X&amp;period=specified\
             &amp;from={from}&amp;to={to}&amp;macro=./{region}/{key}/Cal/{code}//{code}.diario.diario.ic&amp;limgfrom="
        )
    }

    fn listing_page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table id="tablaRegional">
              <caption id="tableRows">Estaciones: 2</caption>
              <tbody>{rows}</tbody>
            </table>
            </body></html>"#
        )
    }

    fn region() -> Region {
        Region::from_code("RVIII", REGION_LISTING_BASE_URL).unwrap()
    }

    #[test]
    fn test_parse_listing() {
        let rows = format!(
            r#"<tr>
                 <th><a href="/index.php/estacion/index/id/231"> Talcahuano </a></th>
                 <td><span title="en línea"></span><span title="estación pública"></span></td>
                 <td><a href="{}">PM2,5</a></td>
                 <td><a href="{}">NO2</a></td>
               </tr>
               <tr>
                 <th><a href="/index.php/estacion/index/id/232">Hualpén</a></th>
                 <td><span title="estación meteorológica"></span></td>
                 <td><a href="{}">PM10</a></td>
               </tr>"#,
            series_href("RVIII", "talcahuano", "PM25", "010100", "250101"),
            series_href("RVIII", "talcahuano", "0003", "090101", "240101"),
            series_href("RVIII", "hualpen", "PM10", "050101", "240101"),
        );

        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), &listing_page(&rows));

        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.record.number_stations, 2);
        assert_eq!(parsed.record.stations.len(), 2);

        let talcahuano = &parsed.record.stations["Talcahuano"];
        assert_eq!(talcahuano.key, "talcahuano");
        assert_eq!(talcahuano.id.as_deref(), Some("231"));
        assert_eq!(
            talcahuano.info_url.as_deref(),
            Some("https://sinca.mma.gob.cl/index.php/estacion/index/id/231")
        );
        assert!(talcahuano.online);
        assert!(talcahuano.public);
        assert!(!talcahuano.meteorological);
        assert_eq!(talcahuano.contaminants.len(), 2);
        assert_eq!(talcahuano.contaminants["PM25"].from_date, "010100");

        let hualpen = &parsed.record.stations["Hualpén"];
        assert!(hualpen.meteorological);
        assert_eq!(hualpen.contaminants["PM10"].to_date, "240101");
    }

    #[test]
    fn test_duplicate_anchor_last_wins() {
        let rows = format!(
            r#"<tr>
                 <th><a href="/index.php/estacion/index/id/231">Talcahuano</a></th>
                 <td><a href="{}">PM2,5</a></td>
                 <td><a href="{}">PM2,5</a></td>
               </tr>"#,
            series_href("RVIII", "talcahuano", "PM25", "010100", "200101"),
            series_href("RVIII", "talcahuano", "PM25", "010100", "250101"),
        );

        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), &listing_page(&rows));
        let station = &parsed.record.stations["Talcahuano"];

        assert_eq!(station.contaminants.len(), 1);
        assert_eq!(station.contaminants["PM25"].to_date, "250101");
    }

    #[test]
    fn test_missing_table_yields_empty_record() {
        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), "<html><body><p>Mantención</p></body></html>");

        assert!(parsed.is_empty());
        assert_eq!(parsed.record.number_stations, 0);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("no station table"));
    }

    #[test]
    fn test_rows_without_region_code() {
        let rows = r#"<tr><th><a href="/index.php/estacion/index/id/1">Sin datos</a></th></tr>"#;
        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), &listing_page(rows));

        assert!(parsed.is_empty());
        assert!(parsed
            .warnings
            .iter()
            .any(|w| w.contains("no region code found")));
    }

    #[test]
    fn test_name_collision_is_disambiguated() {
        let rows = format!(
            r#"<tr><th><a href="/id/1">Coronel</a></th><td><a href="{}">x</a></td></tr>
               <tr><th><a href="/id/2">Coronel</a></th><td><a href="{}">x</a></td></tr>"#,
            series_href("RVIII", "coronel-norte", "PM10", "010100", "250101"),
            series_href("RVIII", "coronel-sur", "PM10", "010100", "250101"),
        );
        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), &listing_page(&rows));

        assert_eq!(parsed.record.stations.len(), 2);
        assert_eq!(parsed.record.stations["Coronel"].key, "coronel-norte");
        assert_eq!(
            parsed.record.stations["Coronel (coronel-sur)"].key,
            "coronel-sur"
        );
    }

    #[test]
    fn test_same_key_under_two_names_is_one_station() {
        let rows = format!(
            r#"<tr><th><a href="/id/1">Talcahuano</a></th><td><a href="{}">x</a></td></tr>
               <tr><th><a href="/id/1">Talcahuano Centro</a></th>
                   <td><a href="{}">x</a></td><td><a href="{}">x</a></td></tr>"#,
            series_href("RVIII", "talcahuano", "PM25", "010100", "200101"),
            series_href("RVIII", "talcahuano", "PM25", "010100", "250101"),
            series_href("RVIII", "talcahuano", "0003", "090101", "240101"),
        );
        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), &listing_page(&rows));

        assert_eq!(parsed.record.stations.len(), 1);
        let station = &parsed.record.stations["Talcahuano"];
        assert_eq!(station.contaminants.len(), 2);
        assert_eq!(station.contaminants["PM25"].to_date, "250101");
        assert!(parsed.warnings.iter().any(|w| w.contains("listed again")));

        let mut catalog = crate::models::Catalog::new();
        catalog.insert_region("RVIII".to_string(), parsed.record);
        let pm25 = catalog
            .entries(crate::models::AveragingPeriod::Annual)
            .into_iter()
            .filter(|e| e.key() == ("RVIII", "talcahuano", "PM25"))
            .count();
        assert_eq!(pm25, 1);
    }

    #[test]
    fn test_disambiguated_station_keeps_earlier_series() {
        let rows = format!(
            r#"<tr><th><a href="/id/1">Coronel</a></th><td><a href="{}">x</a></td></tr>
               <tr><th><a href="/id/2">Coronel</a></th><td><a href="{}">x</a></td></tr>
               <tr><th><a href="/id/2">Coronel</a></th><td><a href="{}">x</a></td></tr>"#,
            series_href("RVIII", "coronel-norte", "PM10", "010100", "250101"),
            series_href("RVIII", "coronel-sur", "PM10", "010100", "250101"),
            series_href("RVIII", "coronel-sur", "0003", "010100", "250101"),
        );
        let parser = RegionPageParser::new().unwrap();
        let parsed = parser.parse(&region(), &listing_page(&rows));

        assert_eq!(parsed.record.stations.len(), 2);
        let sur = &parsed.record.stations["Coronel (coronel-sur)"];
        assert_eq!(
            sur.contaminants.keys().cloned().collect::<Vec<_>>(),
            vec!["0003".to_string(), "PM10".to_string()]
        );
        assert_eq!(parsed.record.stations["Coronel"].contaminants.len(), 1);
    }

    #[test]
    fn test_parse_station_count() {
        assert_eq!(parse_station_count("Número de estaciones: 12"), Some(12));
        assert_eq!(parse_station_count("Estaciones:  3 "), Some(3));
        assert_eq!(parse_station_count("sin conteo"), None);
    }
}
