//! Parsing of string-encoded physical constants.
//!
//! Hosts hand over constants whose decimal expansions carry more digits than an
//! `f64` holds. The text is validated against a strict decimal grammar, the
//! optional unit suffix is resolved, and the value is converted exactly once,
//! with correct rounding of the full decimal expansion.

use crate::error::{PluginError, PluginResult};

pub const ASTRONOMICAL_UNIT_M: f64 = 149_597_870_700.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Length,
    Speed,
    GravitationalParameter,
    Angle,
    Dimensionless,
}

/// How a unit suffix maps onto SI.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scale {
    // Power of ten, folded into the decimal exponent before rounding.
    Decimal(i32),
    Factor(f64),
}

impl Quantity {
    fn unit_scale(self, unit: &str) -> Option<Scale> {
        match (self, unit) {
            (_, "") => Some(Scale::Decimal(0)),
            (Quantity::Length, "m") => Some(Scale::Decimal(0)),
            (Quantity::Length, "km") => Some(Scale::Decimal(3)),
            (Quantity::Length, "au") => Some(Scale::Factor(ASTRONOMICAL_UNIT_M)),
            (Quantity::Speed, "m/s") => Some(Scale::Decimal(0)),
            (Quantity::Speed, "km/s") => Some(Scale::Decimal(3)),
            (Quantity::GravitationalParameter, "m^3/s^2") => Some(Scale::Decimal(0)),
            (Quantity::GravitationalParameter, "km^3/s^2") => Some(Scale::Decimal(9)),
            (Quantity::Angle, "rad") => Some(Scale::Decimal(0)),
            (Quantity::Angle, "deg") | (Quantity::Angle, "°") => Some(Scale::Factor(core::f64::consts::PI / 180.0)),
            _ => None,
        }
    }
}

/// Rewrites `literal` with its exponent raised by `shift`, so that the
/// scaled value is rounded only once.
fn shift_exponent(literal: &str, shift: i32) -> Result<String, &'static str> {
    if shift == 0 {
        return Ok(literal.to_string());
    }
    let (mantissa, exponent) = match literal.find(['e', 'E']) {
        Some(at) => (&literal[..at], &literal[at + 1..]),
        None => (literal, "0"),
    };
    let exponent: i32 = exponent.parse().map_err(|_| "exponent out of range")?;
    let exponent = exponent.checked_add(shift).ok_or("exponent out of range")?;
    Ok(alloc::format!("{mantissa}e{exponent}"))
}

/// Splits `text` into its numeric literal and unit suffix, checking the
/// literal against `[+-]? digits [. digits]? ([eE] [+-]? digits)?`.
fn split_literal(text: &str) -> Result<(&str, &str), &'static str> {
    let bytes = text.as_bytes();
    let mut i = 0;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let integer_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - integer_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let fraction_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - fraction_start;
    }
    if mantissa_digits == 0 {
        return Err("no digits in mantissa");
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exponent_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exponent_start {
            return Err("no digits in exponent");
        }
    }

    let (literal, rest) = text.split_at(i);
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err("unexpected character after number");
    }
    Ok((literal, rest.trim()))
}

/// Parses one string-encoded constant, naming `field` in any error.
pub fn parse_quantity(field: &str, text: &str, quantity: Quantity) -> PluginResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PluginError::malformed(field, "empty value"));
    }
    let (literal, unit) = split_literal(trimmed)
        .map_err(|reason| PluginError::malformed(field, alloc::format!("{reason} in {trimmed:?}")))?;
    let scale = quantity
        .unit_scale(unit)
        .ok_or_else(|| PluginError::malformed(field, alloc::format!("unit {unit:?} does not measure {quantity:?}")))?;
    let parse = |literal: &str| -> PluginResult<f64> {
        literal
            .parse()
            .map_err(|e| PluginError::malformed(field, alloc::format!("{e} in {literal:?}")))
    };
    let scaled = match scale {
        Scale::Decimal(shift) => {
            let shifted = shift_exponent(literal, shift)
                .map_err(|reason| PluginError::malformed(field, alloc::format!("{reason} in {trimmed:?}")))?;
            parse(&shifted)?
        }
        Scale::Factor(factor) => parse(literal)? * factor,
    };
    if !scaled.is_finite() {
        return Err(PluginError::malformed(field, alloc::format!("{trimmed:?} overflows")));
    }
    Ok(scaled)
}
