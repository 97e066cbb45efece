//! Region properties
//!
//! A region carries at most one [`Property`] per [`PropertyKey`]. Two variants
//! exist: non-functional properties (numeric metrics) and feature properties
//! (membership of a region in a variability feature).
//!
//! Negative NFP values are the "not computed / not applicable" sentinel. The
//! threshold lives in [`is_unset_value`] so range statistics and application
//! can never disagree about which values count.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{IrError, Result};

/// Returns true for NFP values that must be neither ranged nor rendered
pub fn is_unset_value(value: f64) -> bool {
    value < 0.0
}

/// Value assigned when an NFP carries an empty sample list
pub const UNSET_VALUE: f64 = -1.0;

// ============================================================================
// Property Type & Key
// ============================================================================

/// Property variant tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyType {
    #[serde(rename = "Feature", alias = "feature", alias = "FEATURE")]
    Feature,
    #[serde(rename = "NFP", alias = "nfp", alias = "Nfp")]
    Nfp,
}

impl PropertyType {
    /// Parse a type tag (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "feature" => Some(PropertyType::Feature),
            "nfp" => Some(PropertyType::Nfp),
            _ => None,
        }
    }

    /// Canonical tag as used in data files
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Feature => "Feature",
            PropertyType::Nfp => "NFP",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a property on a region: `(type, name)`.
///
/// Names are stored lower-case, so `Complexity` and `complexity` address the
/// same property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub name: String,
}

impl PropertyKey {
    /// Create a key, normalising the name
    pub fn new(kind: PropertyType, name: impl AsRef<str>) -> Self {
        Self {
            kind,
            name: name.as_ref().trim().to_lowercase(),
        }
    }

    /// Key of a non-functional property
    pub fn nfp(name: impl AsRef<str>) -> Self {
        Self::new(PropertyType::Nfp, name)
    }

    /// Key of a feature property
    pub fn feature(name: impl AsRef<str>) -> Self {
        Self::new(PropertyType::Feature, name)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

// ============================================================================
// Property
// ============================================================================

/// A typed, named value attached to a region. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Property {
    /// Region takes part in a variability feature
    #[serde(rename = "Feature")]
    Feature { name: String, member: bool },

    /// Numeric code metric; negative means "not computed"
    #[serde(rename = "NFP")]
    Nfp {
        name: String,
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
}

impl Property {
    /// Create an NFP property
    pub fn nfp(name: impl AsRef<str>, value: f64) -> Self {
        Property::Nfp {
            name: name.as_ref().trim().to_lowercase(),
            value,
            unit: None,
        }
    }

    /// Create a feature property
    pub fn feature(name: impl AsRef<str>, member: bool) -> Self {
        Property::Feature {
            name: name.as_ref().trim().to_lowercase(),
            member,
        }
    }

    /// Attach a unit (NFP only; ignored for features)
    pub fn with_unit(self, unit: impl Into<String>) -> Self {
        match self {
            Property::Nfp { name, value, .. } => Property::Nfp {
                name,
                value,
                unit: Some(unit.into()),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> PropertyType {
        match self {
            Property::Feature { .. } => PropertyType::Feature,
            Property::Nfp { .. } => PropertyType::Nfp,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Property::Feature { name, .. } | Property::Nfp { name, .. } => name,
        }
    }

    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(self.kind(), self.name())
    }

    /// Numeric projection used for ranges and normalisation.
    ///
    /// Features project to `1.0` (member) or `0.0`.
    pub fn numeric_value(&self) -> f64 {
        match self {
            Property::Feature { member, .. } => {
                if *member {
                    1.0
                } else {
                    0.0
                }
            }
            Property::Nfp { value, .. } => *value,
        }
    }

    /// True when the value is the "not computed" sentinel
    pub fn is_unset(&self) -> bool {
        match self {
            Property::Feature { .. } => false,
            Property::Nfp { value, .. } => is_unset_value(*value),
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            Property::Nfp { unit, .. } => unit.as_deref(),
            Property::Feature { .. } => None,
        }
    }
}

// ============================================================================
// Property Factory
// ============================================================================

/// Build a property from a type tag, a name and a raw JSON value.
///
/// Fails with [`IrError::InvalidProperty`] when the tag is unknown or the raw
/// value does not fit the variant (numeric for NFP, boolean-like for features).
pub fn create_property(kind: &str, name: &str, raw: &Value, unit: Option<&str>) -> Result<Property> {
    let property_type = PropertyType::parse(kind)
        .ok_or_else(|| IrError::invalid_property(kind, name, "unknown property type"))?;

    if name.trim().is_empty() {
        return Err(IrError::invalid_property(kind, name, "missing property name"));
    }

    match property_type {
        PropertyType::Nfp => {
            let value = coerce_numeric(raw)
                .map_err(|reason| IrError::invalid_property(kind, name, reason))?;
            let property = Property::nfp(name, value);
            Ok(match unit.map(str::trim).filter(|u| !u.is_empty()) {
                Some(u) => property.with_unit(u),
                None => property,
            })
        }
        PropertyType::Feature => {
            let member = coerce_membership(raw)
                .map_err(|reason| IrError::invalid_property(kind, name, reason))?;
            Ok(Property::feature(name, member))
        }
    }
}

fn coerce_numeric(raw: &Value) -> std::result::Result<f64, String> {
    let value = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("unrepresentable number {}", n))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not numeric", s))?,
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(UNSET_VALUE);
            }
            let mut sum = 0.0;
            for item in items {
                sum += item
                    .as_f64()
                    .ok_or_else(|| format!("sample {} is not numeric", item))?;
            }
            sum / items.len() as f64
        }
        Value::Null => return Err("missing value".to_string()),
        other => return Err(format!("expected a number, got {}", other)),
    };

    if !value.is_finite() {
        return Err(format!("non-finite value {}", value));
    }
    Ok(value)
}

fn coerce_membership(raw: &Value) -> std::result::Result<bool, String> {
    match raw {
        // presence alone marks membership
        Value::Null => Ok(true),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map_or(false, |v| v != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(format!("'{}' is not a membership value", s)),
        },
        other => Err(format!("expected a boolean, got {}", other)),
    }
}
