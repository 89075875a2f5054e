use crate::models::pollutant::display_name_for_code;
use crate::models::CatalogEntry;
use crate::utils::constants::CANONICAL_EXTENSION;

/// Characters rejected by at least one common filesystem.
const ILLEGAL_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Placeholder used when nothing printable survives sanitization.
const EMPTY_NAME: &str = "unnamed";

pub fn is_illegal_filename_char(c: char) -> bool {
    ILLEGAL_FILENAME_CHARS.contains(&c) || c.is_control() || c.is_whitespace()
}

/// Make an arbitrary string safe to embed in a file name.
///
/// Illegal characters become `_`, runs of `_` collapse to one, and leading or
/// trailing `_` are trimmed. The function is total and idempotent.
///
/// # Examples
/// ```
/// use sinca_harvester::utils::sanitize_filename_component;
///
/// assert_eq!(sanitize_filename_component("Las Condes"), "Las_Condes");
/// assert_eq!(sanitize_filename_component(" a/b:c "), "a_b_c");
/// ```
pub fn sanitize_filename_component(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if is_illegal_filename_char(c) { '_' } else { c };
        if c == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(c);
    }

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        EMPTY_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonical file name for one catalog entry:
/// `{region}_{station}_{pollutant}_{from}_{to}_{period}.csv`
pub fn canonical_filename(entry: &CatalogEntry) -> String {
    let pollutant = display_name_for_code(&entry.pollutant_code);
    format!(
        "{}_{}_{}_{}_{}_{}.{}",
        sanitize_filename_component(&entry.region_code),
        sanitize_filename_component(&entry.station_name),
        sanitize_filename_component(&pollutant),
        sanitize_filename_component(&entry.from_date),
        sanitize_filename_component(&entry.to_date),
        entry.period().as_str(),
        CANONICAL_EXTENSION
    )
}

/// File name used when the canonical name of `entry` is already claimed by
/// another entry: the station key and the raw pollutant code are spelled out.
/// `{region}_{station}_{key}_{pollutant}[_{code}]_{from}_{to}_{period}.csv`
pub fn disambiguated_filename(entry: &CatalogEntry) -> String {
    let display = display_name_for_code(&entry.pollutant_code);
    let pollutant = if display.as_ref() == entry.pollutant_code.as_str() {
        sanitize_filename_component(&display)
    } else {
        format!(
            "{}_{}",
            sanitize_filename_component(&display),
            sanitize_filename_component(&entry.pollutant_code)
        )
    };
    format!(
        "{}_{}_{}_{}_{}_{}_{}.{}",
        sanitize_filename_component(&entry.region_code),
        sanitize_filename_component(&entry.station_name),
        sanitize_filename_component(&entry.station_key),
        pollutant,
        sanitize_filename_component(&entry.from_date),
        sanitize_filename_component(&entry.to_date),
        entry.period().as_str(),
        CANONICAL_EXTENSION
    )
}
