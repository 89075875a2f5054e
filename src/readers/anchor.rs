use regex::Regex;
use std::sync::LazyLock;

static RE_REGION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([IVXRM]+)/[^/]+/Cal/").unwrap());
static RE_STATION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[IVXRM]+/([^/]+)/Cal/").unwrap());
static RE_STATION_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/id/(\d+)").unwrap());
static RE_MACRO_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"macro=([^./&]+)\.").unwrap());
static RE_PATH_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/Cal/([^/&]+)/").unwrap());
static RE_FROM_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]from=(\d{6})(?:&|$)").unwrap());
static RE_TO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]to=(\d{6})(?:&|$)").unwrap());

/// Fields embedded in a listing-page anchor URL. Every field is optional;
/// the URL schema is stable but not every anchor carries every field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorFields {
    pub region_code: Option<String>,
    pub station_key: Option<String>,
    pub station_id: Option<String>,
    pub pollutant_code: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl AnchorFields {
    /// True when the anchor identifies a complete pollutant series.
    pub fn is_series(&self) -> bool {
        self.region_code.is_some()
            && self.station_key.is_some()
            && self.pollutant_code.is_some()
            && self.from_date.is_some()
            && self.to_date.is_some()
    }
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract every known field from an anchor URL.
pub fn extract_anchor_fields(url: &str) -> AnchorFields {
    // The pollutant normally precedes the first dot of the macro value;
    // macros written as paths carry it after `/Cal/` instead.
    let pollutant_code =
        capture(&RE_MACRO_CODE, url).or_else(|| capture(&RE_PATH_CODE, url));

    AnchorFields {
        region_code: capture(&RE_REGION_CODE, url),
        station_key: capture(&RE_STATION_KEY, url),
        station_id: capture(&RE_STATION_ID, url),
        pollutant_code,
        from_date: capture(&RE_FROM_DATE, url),
        to_date: capture(&RE_TO_DATE, url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_series_anchor() {
        let url = "https://sinca.mma.gob.cl/cgi-bin/APUB-MMA/apub.htmlindico2.cgi?page=pageRight\
                   &header=Talcahuano&gsize=1495x708&period=specified&from=010100&to=250101\
                   &macro=./RVIII/talcahuano/Cal/PM25//PM25.diario.diario.ic&limgfrom=";
        let fields = extract_anchor_fields(url);

        assert_eq!(fields.region_code.as_deref(), Some("RVIII"));
        assert_eq!(fields.station_key.as_deref(), Some("talcahuano"));
        assert_eq!(fields.pollutant_code.as_deref(), Some("PM25"));
        assert_eq!(fields.from_date.as_deref(), Some("010100"));
        assert_eq!(fields.to_date.as_deref(), Some("250101"));
        assert_eq!(fields.station_id, None);
        assert!(fields.is_series());
    }

    #[test]
    fn test_bare_macro_code() {
        let url = "/cgi-bin/APUB-MMA/apub.tsindico2.cgi?outtype=xcl&macro=0003.horario.horario.ic\
                   &path=/usr/airviro/data/CONAMA/RM/D14/Cal/0003/&from=090101&to=240101&";
        let fields = extract_anchor_fields(url);
        assert_eq!(fields.pollutant_code.as_deref(), Some("0003"));
        assert_eq!(fields.region_code.as_deref(), Some("RM"));
        assert_eq!(fields.station_key.as_deref(), Some("D14"));
    }

    #[test]
    fn test_station_detail_anchor() {
        let url = "https://sinca.mma.gob.cl/index.php/estacion/index/id/231";
        let fields = extract_anchor_fields(url);
        assert_eq!(fields.station_id.as_deref(), Some("231"));
        assert_eq!(fields.region_code, None);
        assert!(!fields.is_series());
    }

    #[test]
    fn test_dates_must_have_six_digits() {
        let url = "/x?macro=./RXV/F01/Cal/PM25//PM25.diario.diario.ic&from=00010100&to=25050523";
        let fields = extract_anchor_fields(url);
        assert_eq!(fields.from_date, None);
        assert_eq!(fields.to_date, None);
        assert_eq!(fields.pollutant_code.as_deref(), Some("PM25"));
    }

    #[test]
    fn test_unrelated_url() {
        assert_eq!(
            extract_anchor_fields("https://example.com/about"),
            AnchorFields::default()
        );
    }
}
