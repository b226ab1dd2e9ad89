//! Emission-factor reference rows
//!
//! Rows arrive from the factor store with every text field optional. The
//! accessors here make the missing-field handling explicit so the index never
//! has to reason about absent values.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

pub type FactorId = i64;

/// Publisher of an emission-factor table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceStandard {
    Defra,
    Epa,
    Ipcc,
    GhgProtocolDefault,
    Ademe,
    Custom(String),
}

impl SourceStandard {
    pub fn as_str(&self) -> &str {
        match self {
            SourceStandard::Defra => "DEFRA",
            SourceStandard::Epa => "EPA",
            SourceStandard::Ipcc => "IPCC",
            SourceStandard::GhgProtocolDefault => "GHG Protocol Default",
            SourceStandard::Ademe => "ADEME",
            SourceStandard::Custom(name) => name,
        }
    }

    /// Whether both name the same publisher. Custom names compare without
    /// regard to case, like the known standards do when parsed.
    pub fn same_standard(&self, other: &SourceStandard) -> bool {
        match (self, other) {
            (SourceStandard::Custom(a), SourceStandard::Custom(b)) => a.eq_ignore_ascii_case(b),
            _ => self == other,
        }
    }
}

impl Default for SourceStandard {
    fn default() -> Self {
        SourceStandard::Defra
    }
}

impl fmt::Display for SourceStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SourceStandard {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_lowercase().as_str() {
            "defra" => SourceStandard::Defra,
            "epa" => SourceStandard::Epa,
            "ipcc" => SourceStandard::Ipcc,
            "ghg protocol default" | "ghg protocol" => SourceStandard::GhgProtocolDefault,
            "ademe" => SourceStandard::Ademe,
            _ => SourceStandard::Custom(trimmed.to_string()),
        }
    }
}

impl From<String> for SourceStandard {
    fn from(value: String) -> Self {
        SourceStandard::from(value.as_str())
    }
}

impl From<SourceStandard> for String {
    fn from(value: SourceStandard) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for SourceStandard {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SourceStandard::from(s))
    }
}

/// GHG Protocol scope as it appears in the data: a bare number or free text
/// such as `"1"` or `"Scope 2"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeValue {
    Number(i64),
    Text(String),
}

impl ScopeValue {
    /// Parses text into a numeric scope when it is a plain integer.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(n) => ScopeValue::Number(n),
            Err(_) => ScopeValue::Text(text.to_string()),
        }
    }
}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeValue::Number(n) => write!(f, "{}", n),
            ScopeValue::Text(t) => f.write_str(t),
        }
    }
}

impl From<i64> for ScopeValue {
    fn from(value: i64) -> Self {
        ScopeValue::Number(value)
    }
}

impl From<&str> for ScopeValue {
    fn from(value: &str) -> Self {
        ScopeValue::Text(value.to_string())
    }
}

impl From<String> for ScopeValue {
    fn from(value: String) -> Self {
        ScopeValue::Text(value)
    }
}

/// One row of an emission-factor reference table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    pub id: FactorId,
    #[serde(default)]
    pub category_1: Option<String>,
    #[serde(default)]
    pub category_2: Option<String>,
    #[serde(default)]
    pub category_3: Option<String>,
    #[serde(default)]
    pub category_4: Option<String>,
    #[serde(default)]
    pub uom: Option<String>,
    pub source: SourceStandard,
    #[serde(default)]
    pub scope: Option<ScopeValue>,
    /// kg CO2e per unit of `uom`
    #[serde(default)]
    pub conversion_factor: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl EmissionFactor {
    /// Non-empty category levels joined with single spaces, e.g.
    /// "Fuels Liquid Diesel".
    pub fn full_category(&self) -> String {
        [
            &self.category_1,
            &self.category_2,
            &self.category_3,
            &self.category_4,
        ]
        .iter()
        .filter_map(|level| level.as_deref())
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .join(" ")
    }

    pub fn unit(&self) -> &str {
        self.uom.as_deref().unwrap_or("")
    }

    pub fn scope_text(&self) -> String {
        self.scope
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// A factor can be used for calculation only when it carries a usable
    /// conversion value.
    pub fn is_eligible(&self) -> bool {
        self.conversion_factor.map_or(false, f64::is_finite)
    }
}
