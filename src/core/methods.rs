//! Mapping methods
//!
//! A [`MappingMethod`] turns a normalised percentage into a [`VisualValue`].
//! The set of variants is closed; each variant holds its own immutable
//! parameters and evaluation is a pure function of the input.
//!
//! Methods are built from JSON parameters by [`MappingMethod::from_config`],
//! keyed on a base name:
//!
//! | base name                    | variant        | parameters                 |
//! |------------------------------|----------------|----------------------------|
//! | `Color_Scale`                | `ColorScale`   | `from`, `to`, `steps`      |
//! | `Color`, `Color_Fixed`       | `ColorFixed`   | `color`                    |
//! | `Size_Scale`                 | `SizeScale`    | `from`, `to`               |
//! | `Size`, `Size_Fixed`         | `SizeFixed`    | `value`                    |
//! | `Width_Scale`                | `SizeScale`    | `from`, `to` (in `[0,100]`)|
//! | `Width`, `Width_Fixed`       | `SizeFixed`    | `value` (in `[0,100]`)     |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::error::{MappingError, Result};

// ============================================================================
// Colors & Visual Values
// ============================================================================

/// RGBA color with channels in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Rgba = Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const GREEN: Rgba = Rgba { r: 0.0, g: 1.0, b: 0.0, a: 1.0 };
    pub const RED: Rgba = Rgba { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };

    /// Create a color, clamping every channel into `[0, 1]`
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
            a: clamp_unit(a),
        }
    }

    /// Opaque color
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Per-channel linear blend: `(1 - t) * self + t * other`
    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let mix = |a: f32, b: f32| (1.0 - t) * a + t * b;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Parse `"r,g,b"` or `"r,g,b,a"`; `default_alpha` applies when alpha is omitted
    pub fn parse(s: &str, default_alpha: f32) -> Option<Rgba> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>().ok())
            .collect::<Option<Vec<_>>>()?;
        Self::from_channels(&parts, default_alpha)
    }

    /// Read a color from a `"r,g,b[,a]"` string or a `[r, g, b(, a)]` array
    pub fn from_value(value: &Value, default_alpha: f32) -> Option<Rgba> {
        match value {
            Value::String(s) => Self::parse(s, default_alpha),
            Value::Array(items) => {
                let channels = items
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Option<Vec<_>>>()?;
                Self::from_channels(&channels, default_alpha)
            }
            _ => None,
        }
    }

    fn from_channels(channels: &[f32], default_alpha: f32) -> Option<Rgba> {
        if channels.iter().any(|c| !c.is_finite()) {
            return None;
        }
        match *channels {
            [r, g, b] => Some(Rgba::new(r, g, b, default_alpha)),
            [r, g, b, a] => Some(Rgba::new(r, g, b, a)),
            _ => None,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({:.3}, {:.3}, {:.3}, {:.3})", self.r, self.g, self.b, self.a)
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Value handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VisualValue {
    Color(Rgba),
    Size(f32),
}

impl fmt::Display for VisualValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisualValue::Color(c) => write!(f, "{}", c),
            VisualValue::Size(s) => write!(f, "size({:.3})", s),
        }
    }
}

/// Opaque renderer-side handle for a region's visual representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetHandle(pub u64);

/// A visual value addressed to a target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualUpdate {
    pub target: TargetHandle,
    pub value: VisualValue,
}

// ============================================================================
// Method Kinds
// ============================================================================

/// Built-in method base names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    ColorScale,
    ColorFixed,
    SizeScale,
    SizeFixed,
    WidthScale,
    WidthFixed,
}

impl MethodKind {
    /// Parse a base name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "color_scale" => Some(MethodKind::ColorScale),
            "color" | "color_fixed" => Some(MethodKind::ColorFixed),
            "size_scale" => Some(MethodKind::SizeScale),
            "size" | "size_fixed" => Some(MethodKind::SizeFixed),
            "width_scale" => Some(MethodKind::WidthScale),
            "width" | "width_fixed" => Some(MethodKind::WidthFixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::ColorScale => "Color_Scale",
            MethodKind::ColorFixed => "Color_Fixed",
            MethodKind::SizeScale => "Size_Scale",
            MethodKind::SizeFixed => "Size_Fixed",
            MethodKind::WidthScale => "Width_Scale",
            MethodKind::WidthFixed => "Width_Fixed",
        }
    }
}

// ============================================================================
// Mapping Method
// ============================================================================

/// Alpha used for scale endpoints given without alpha
pub const SCALE_DEFAULT_ALPHA: f32 = 0.5;

/// Alpha used for fixed colors given without alpha
pub const FIXED_DEFAULT_ALPHA: f32 = 1.0;

/// Width values live in `[0, WIDTH_LIMIT]`
pub const WIDTH_LIMIT: f32 = 100.0;

/// Strategy converting a percentage into a visual value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum MappingMethod {
    ColorFixed { color: Rgba },
    ColorScale { from: Rgba, to: Rgba, steps: u32 },
    SizeFixed { value: f32 },
    SizeScale { from: f32, to: f32 },
}

impl MappingMethod {
    pub fn color_fixed(color: Rgba) -> Self {
        MappingMethod::ColorFixed { color }
    }

    /// Continuous color scale
    pub fn color_scale(from: Rgba, to: Rgba) -> Self {
        MappingMethod::ColorScale { from, to, steps: 0 }
    }

    /// Color scale quantised into `steps` bands (`steps < 2` is continuous)
    pub fn color_steps(from: Rgba, to: Rgba, steps: u32) -> Self {
        MappingMethod::ColorScale { from, to, steps }
    }

    pub fn size_fixed(value: f32) -> Self {
        MappingMethod::SizeFixed { value }
    }

    /// Size scale; a `to` smaller than `from` is raised to `from`
    pub fn size_scale(from: f32, to: f32) -> Self {
        MappingMethod::SizeScale {
            from,
            to: if to < from { from } else { to },
        }
    }

    /// Scaled methods consume the percentage; fixed ones ignore it
    pub fn is_scaled(&self) -> bool {
        matches!(
            self,
            MappingMethod::ColorScale { .. } | MappingMethod::SizeScale { .. }
        )
    }

    /// Evaluate at percentage `p` (clamped into `[0, 1]`, NaN treated as 0)
    pub fn evaluate(&self, p: f32) -> VisualValue {
        let t = clamp_unit(p);
        match self {
            MappingMethod::ColorFixed { color } => VisualValue::Color(*color),
            MappingMethod::ColorScale { from, to, steps } => {
                let t = apply_gradient_steps(t, *steps);
                if t == 0.0 {
                    VisualValue::Color(*from)
                } else if t == 1.0 {
                    VisualValue::Color(*to)
                } else {
                    VisualValue::Color(from.lerp(*to, t))
                }
            }
            MappingMethod::SizeFixed { value } => VisualValue::Size(*value),
            MappingMethod::SizeScale { from, to } => {
                if t == 0.0 {
                    VisualValue::Size(*from)
                } else if t == 1.0 {
                    VisualValue::Size(*to)
                } else {
                    VisualValue::Size((1.0 - t) * from + t * to)
                }
            }
        }
    }

    /// Evaluate and address the result to `target`
    pub fn apply(&self, target: TargetHandle, p: f32) -> VisualUpdate {
        VisualUpdate {
            target,
            value: self.evaluate(p),
        }
    }

    /// Construct a method from its base name and JSON parameters.
    ///
    /// Unknown names fail with [`MappingError::UnknownMethod`]; parameters that
    /// are present but unreadable fail with [`MappingError::InvalidMethodConfig`].
    /// Absent parameters take their defaults.
    pub fn from_config(base: &str, config: &Value) -> Result<Self> {
        let kind = MethodKind::parse(base).ok_or_else(|| MappingError::UnknownMethod {
            name: base.to_string(),
        })?;

        let params = Params::new(kind, config)?;
        let method = match kind {
            MethodKind::ColorScale => {
                let from = params.color("from", SCALE_DEFAULT_ALPHA)?.unwrap_or(Rgba::BLACK);
                let to = params.color("to", SCALE_DEFAULT_ALPHA)?.unwrap_or(Rgba::BLACK);
                let steps = params.number("steps")?.map_or(0, |s| s.max(0.0) as u32);
                MappingMethod::color_steps(from, to, steps)
            }
            MethodKind::ColorFixed => {
                let color = params.color("color", FIXED_DEFAULT_ALPHA)?.unwrap_or(Rgba::BLACK);
                MappingMethod::color_fixed(color)
            }
            MethodKind::SizeScale => {
                let from = params.number("from")?.unwrap_or(0.0);
                let to = params.number("to")?.unwrap_or(1.0);
                MappingMethod::size_scale(from, to)
            }
            MethodKind::SizeFixed => MappingMethod::size_fixed(params.number("value")?.unwrap_or(0.0)),
            MethodKind::WidthScale => {
                let from = params.number("from")?.unwrap_or(10.0).clamp(0.0, WIDTH_LIMIT);
                let to = params.number("to")?.unwrap_or(50.0).clamp(0.0, WIDTH_LIMIT);
                MappingMethod::size_scale(from, to)
            }
            MethodKind::WidthFixed => {
                MappingMethod::size_fixed(params.number("value")?.unwrap_or(0.0).clamp(0.0, WIDTH_LIMIT))
            }
        };
        Ok(method)
    }
}

/// Quantise `t` into `steps` bands; `steps < 2` leaves `t` untouched
fn apply_gradient_steps(t: f32, steps: u32) -> f32 {
    if steps < 2 {
        return t;
    }
    let step = 1.0 / steps as f32;
    let index = (t / step).floor();
    (index / (steps - 1) as f32).min(1.0)
}

/// Typed access to a method's JSON parameters
struct Params<'a> {
    kind: MethodKind,
    config: Option<&'a serde_json::Map<String, Value>>,
}

impl<'a> Params<'a> {
    fn new(kind: MethodKind, config: &'a Value) -> Result<Self> {
        match config {
            Value::Null => Ok(Self { kind, config: None }),
            Value::Object(map) => Ok(Self {
                kind,
                config: Some(map),
            }),
            other => Err(MappingError::invalid_method(
                kind.as_str(),
                format!("parameters must be an object, got {}", other),
            )),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.config.and_then(|m| m.get(key)).filter(|v| !v.is_null())
    }

    fn color(&self, key: &str, default_alpha: f32) -> Result<Option<Rgba>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => Rgba::from_value(v, default_alpha).map(Some).ok_or_else(|| {
                MappingError::invalid_method(self.kind.as_str(), format!("'{}' is not a color: {}", key, v))
            }),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f32>> {
        let parsed = match self.get(key) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
            Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
            Some(_) => None,
        };
        match parsed {
            Some(f) if f.is_finite() => Ok(Some(f)),
            _ => Err(MappingError::invalid_method(
                self.kind.as_str(),
                format!("'{}' is not a number", key),
            )),
        }
    }
}
