/// Site endpoints
pub const REGION_LISTING_BASE_URL: &str = "https://sinca.mma.gob.cl/index.php/region/index/id/";
pub const REPORT_BASE_URL: &str = "https://sinca.mma.gob.cl/cgi-bin/APUB-MMA/apub.htmlindico2.cgi";

/// Region numerals in listing order
pub const REGION_NUMERALS: [&str; 16] = [
    "XV", "I", "II", "III", "IV", "V", "M", "VI", "VII", "XVI", "VIII", "IX", "XIV", "X", "XI",
    "XII",
];

/// Listing page selectors
pub const STATION_COUNT_SELECTOR: &str = "caption#tableRows";
pub const STATION_ROW_SELECTOR: &str = "#tablaRegional > tbody > tr";
pub const ANCHOR_SELECTOR: &str = "a";

/// Station type markers (span titles on the listing page)
pub const STATION_TYPE_ONLINE: &str = "en línea";
pub const STATION_TYPE_METEOROLOGICAL: &str = "estación meteorológica";
pub const STATION_TYPE_PUBLIC: &str = "estación pública";

/// Export control on the report page
pub const EXPORT_LINK_SELECTOR: &str = "body > table > tbody > tr > td > table:nth-child(3) > tbody > tr:nth-child(1) > td > label > span.icon-file-excel > a";

/// Report graph size requested from the site
pub const REPORT_GRAPH_SIZE: &str = "1495x708";

/// File names and directories
pub const CATALOG_FILE: &str = "data/stations/stations_data.json";
pub const DOWNLOAD_DIR: &str = "data/contaminants";
pub const STAGING_DIR_NAME: &str = ".staging";
pub const DRIVER_CACHE_DIR: &str = "./.driver_cache";
pub const DEFAULT_CONFIG_FILE: &str = "sinca.toml";
pub const CANONICAL_EXTENSION: &str = "csv";

/// Download reconciliation defaults
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;
pub const DEFAULT_PAGE_READY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EXPECTED_EXTENSIONS: [&str; 2] = ["xls", "csv"];

/// Suffixes browsers use while a download is still being written
pub const PARTIAL_DOWNLOAD_SUFFIXES: [&str; 4] = ["part", "crdownload", "tmp", "download"];

/// MIME types saved without a dialog
pub const DOWNLOAD_MIME_TYPES: &str = "text/csv,application/csv,application/vnd.ms-excel,text/comma-separated-values,text/xml,application/xml";

/// Driver acquisition
pub const GECKODRIVER_VERSION: &str = "v0.36.0";
pub const GECKODRIVER_RELEASE_URL: &str = "https://github.com/mozilla/geckodriver/releases/download";
pub const DEFAULT_INSTALL_RETRIES: u32 = 5;
pub const DEFAULT_INSTALL_RETRY_DELAY_SECS: u64 = 30;
