//! Codecs between typed values and URL query strings.
//!
//! `stringify` may be lossy (numbers are rounded), so a codec only has to
//! reach a fixed point after one round trip:
//! `parse(stringify(parse(x))) == parse(x)`.

use crate::config::{ARRAY_PARAM_SEPARATOR, NUMBER_PARAM_PRECISION};

/// Conversion between a value and its raw query-string form.
pub trait Codec: 'static {
    type Value: Clone + PartialEq + 'static;

    /// Decode a raw parameter. Never fails: malformed input maps to a
    /// default that [`Codec::is_set`] reports as unset.
    fn parse(&self, raw: &str) -> Self::Value;

    fn stringify(&self, value: &Self::Value) -> String;

    /// Whether `value` carries information worth adopting from, or
    /// writing to, the URL.
    fn is_set(&self, value: &Self::Value) -> bool;
}

// ============================================================================
// Scalars
// ============================================================================

/// Identity codec. The empty string is unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn parse(&self, raw: &str) -> String {
        raw.to_string()
    }

    fn stringify(&self, value: &String) -> String {
        value.clone()
    }

    fn is_set(&self, value: &String) -> bool {
        !value.is_empty()
    }
}

/// Numeric codec rounding to a fixed number of decimals on the way out.
///
/// Rounding works on the shortest decimal form of the value, so `1.005`
/// at two places is `1.01`, and halves round towards positive infinity.
/// Magnitudes too large to carry any decimals are written unchanged.
///
/// Input that is not a finite number becomes `0`, which is unset.
#[derive(Debug, Clone, Copy)]
pub struct NumberCodec {
    precision: u32,
}

impl NumberCodec {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn round(&self, value: f64) -> f64 {
        let places = self.precision as i32;
        let scaled = shift(value, places);
        if !scaled.is_finite() {
            return value;
        }

        let rounded = shift(round_half_up(scaled), -places);
        if !rounded.is_finite() {
            return value;
        }
        // "-0" would never match a parsed "0"
        if rounded == 0.0 { 0.0 } else { rounded }
    }
}

/// Move the decimal point of `value` by `places` in its shortest decimal
/// form. `1.005` shifted by 2 is exactly `100.5`, not `100.49999999999999`.
fn shift(value: f64, places: i32) -> f64 {
    let repr = format!("{value:e}");
    repr.split_once('e')
        .and_then(|(mantissa, exp)| {
            let exp: i32 = exp.parse().ok()?;
            format!("{mantissa}e{}", exp + places).parse().ok()
        })
        .unwrap_or(f64::NAN)
}

fn round_half_up(value: f64) -> f64 {
    let rounded = value.round();
    // f64::round sends -2.5 to -3
    if value - rounded == 0.5 { rounded + 1.0 } else { rounded }
}

/// Plain notation, switching to exponent form for very large or very
/// small magnitudes.
fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        format!("{value:e}")
    } else {
        format!("{value}")
    }
}

impl Default for NumberCodec {
    fn default() -> Self {
        Self::new(NUMBER_PARAM_PRECISION)
    }
}

impl Codec for NumberCodec {
    type Value = f64;

    fn parse(&self, raw: &str) -> f64 {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return 0.0;
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }

    fn stringify(&self, value: &f64) -> String {
        if !value.is_finite() {
            return "0".to_string();
        }
        format_number(self.round(*value))
    }

    fn is_set(&self, value: &f64) -> bool {
        value.is_finite() && *value != 0.0
    }
}

/// Boolean codec: case-insensitive `"true"`, anything else is `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    type Value = bool;

    fn parse(&self, raw: &str) -> bool {
        raw.eq_ignore_ascii_case("true")
    }

    fn stringify(&self, value: &bool) -> String {
        value.to_string()
    }

    fn is_set(&self, value: &bool) -> bool {
        *value
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Comma-joined list of another codec's values.
///
/// Any decoded list is adopted from the URL, even an empty one; an empty
/// list stringifies to `""` and so is never written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayCodec<C> {
    item: C,
}

impl<C: Codec> ArrayCodec<C> {
    pub fn new(item: C) -> Self {
        Self { item }
    }
}

impl<C: Codec> Codec for ArrayCodec<C> {
    type Value = Vec<C::Value>;

    fn parse(&self, raw: &str) -> Self::Value {
        raw.split(ARRAY_PARAM_SEPARATOR)
            .map(|part| self.item.parse(part))
            .collect()
    }

    fn stringify(&self, value: &Self::Value) -> String {
        let mut out = String::new();
        for (i, item) in value.iter().enumerate() {
            if i > 0 {
                out.push(ARRAY_PARAM_SEPARATOR);
            }
            out.push_str(&self.item.stringify(item));
        }
        out
    }

    fn is_set(&self, _value: &Self::Value) -> bool {
        true
    }
}
