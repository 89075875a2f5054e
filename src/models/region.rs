use crate::error::{HarvestError, Result};
use crate::utils::constants::{REGION_LISTING_BASE_URL, REGION_NUMERALS};

/// Administrative region whose station listing is scraped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    /// Catalog key, e.g. "RVIII".
    pub code: String,
    pub listing_url: String,
}

impl Region {
    pub fn new(numeral: &str, base_url: &str) -> Self {
        Self {
            code: format!("R{}", numeral),
            listing_url: format!("{}{}", base_url, numeral),
        }
    }

    /// Every region in the network, in listing order.
    pub fn all() -> Vec<Region> {
        Self::all_with_base(REGION_LISTING_BASE_URL)
    }

    pub fn all_with_base(base_url: &str) -> Vec<Region> {
        REGION_NUMERALS
            .iter()
            .map(|numeral| Region::new(numeral, base_url))
            .collect()
    }

    /// Accepts either the catalog code ("RVIII") or the bare numeral ("VIII").
    pub fn from_code(code: &str, base_url: &str) -> Result<Region> {
        let wanted = code.trim().to_uppercase();
        REGION_NUMERALS
            .iter()
            .find(|numeral| wanted == **numeral || wanted.strip_prefix('R') == Some(**numeral))
            .map(|numeral| Region::new(numeral, base_url))
            .ok_or(HarvestError::UnknownRegion(code.to_string()))
    }

    /// Resolve a list of requested codes, or every region when empty.
    pub fn select(codes: &[String], base_url: &str) -> Result<Vec<Region>> {
        if codes.is_empty() {
            return Ok(Self::all_with_base(base_url));
        }
        codes.iter().map(|c| Region::from_code(c, base_url)).collect()
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}
