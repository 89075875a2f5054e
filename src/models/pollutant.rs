use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

use crate::error::HarvestError;

/// Pollutant series published by the monitoring network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    Pm10,
    Pm25,
    Pm10Discrete, // PM1D
    Pm25Discrete, // PM2D
    SulfurDioxide,
    NitrogenDioxide,
    CarbonMonoxide,
    Ozone,
    NitricOxide,
    NitrogenOxides,
}

/// Macro variant used by the report page for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AveragingVariant {
    Daily,
    Discrete,
}

impl AveragingVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AveragingVariant::Daily => "diario",
            AveragingVariant::Discrete => "discreto",
        }
    }
}

impl Pollutant {
    pub const ALL: [Pollutant; 10] = [
        Pollutant::Pm10,
        Pollutant::Pm25,
        Pollutant::Pm10Discrete,
        Pollutant::Pm25Discrete,
        Pollutant::SulfurDioxide,
        Pollutant::NitrogenDioxide,
        Pollutant::CarbonMonoxide,
        Pollutant::Ozone,
        Pollutant::NitricOxide,
        Pollutant::NitrogenOxides,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PM10" => Some(Pollutant::Pm10),
            "PM25" => Some(Pollutant::Pm25),
            "PM1D" => Some(Pollutant::Pm10Discrete),
            "PM2D" => Some(Pollutant::Pm25Discrete),
            "0001" => Some(Pollutant::SulfurDioxide),
            "0003" => Some(Pollutant::NitrogenDioxide),
            "0004" => Some(Pollutant::CarbonMonoxide),
            "0008" => Some(Pollutant::Ozone),
            "0NO" => Some(Pollutant::NitricOxide),
            "0NOX" => Some(Pollutant::NitrogenOxides),
            _ => None,
        }
    }

    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.display_name().eq_ignore_ascii_case(name))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm25 => "PM25",
            Pollutant::Pm10Discrete => "PM1D",
            Pollutant::Pm25Discrete => "PM2D",
            Pollutant::SulfurDioxide => "0001",
            Pollutant::NitrogenDioxide => "0003",
            Pollutant::CarbonMonoxide => "0004",
            Pollutant::Ozone => "0008",
            Pollutant::NitricOxide => "0NO",
            Pollutant::NitrogenOxides => "0NOX",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm25 => "PM25",
            Pollutant::Pm10Discrete => "PM10D",
            Pollutant::Pm25Discrete => "PM25D",
            Pollutant::SulfurDioxide => "SO2",
            Pollutant::NitrogenDioxide => "NO2",
            Pollutant::CarbonMonoxide => "CO",
            Pollutant::Ozone => "O3",
            Pollutant::NitricOxide => "NO",
            Pollutant::NitrogenOxides => "NOX",
        }
    }

    pub fn averaging_variant(&self) -> AveragingVariant {
        match self {
            Pollutant::Pm10Discrete | Pollutant::Pm25Discrete => AveragingVariant::Discrete,
            _ => AveragingVariant::Daily,
        }
    }
}

impl std::fmt::Display for Pollutant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Display name for a raw source code; unknown codes pass through unchanged.
pub fn display_name_for_code(code: &str) -> Cow<'_, str> {
    match Pollutant::from_code(code) {
        Some(pollutant) => Cow::Borrowed(pollutant.display_name()),
        None => Cow::Borrowed(code),
    }
}

/// Source code for a display name; unknown names pass through unchanged.
pub fn code_for_display_name(name: &str) -> Cow<'_, str> {
    match Pollutant::from_display_name(name) {
        Some(pollutant) => Cow::Borrowed(pollutant.code()),
        None => Cow::Borrowed(name),
    }
}

/// Averaging variant for a raw source code. Only the two discrete PM codes
/// differ from the daily default.
pub fn averaging_variant_for_code(code: &str) -> AveragingVariant {
    Pollutant::from_code(code)
        .map(|p| p.averaging_variant())
        .unwrap_or(AveragingVariant::Daily)
}

/// Averaging period requested from the report page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AveragingPeriod {
    #[serde(rename = "diario")]
    Daily,
    #[serde(rename = "trimestral")]
    Quarterly,
    #[default]
    #[serde(rename = "anual")]
    Annual,
}

impl AveragingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AveragingPeriod::Daily => "diario",
            AveragingPeriod::Quarterly => "trimestral",
            AveragingPeriod::Annual => "anual",
        }
    }
}

impl FromStr for AveragingPeriod {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "diario" | "daily" => Ok(AveragingPeriod::Daily),
            "trimestral" | "quarterly" => Ok(AveragingPeriod::Quarterly),
            "anual" | "annual" => Ok(AveragingPeriod::Annual),
            other => Err(HarvestError::InvalidFormat(format!(
                "Unknown averaging period: '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AveragingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
