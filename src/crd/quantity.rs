//! Kubernetes resource quantity parsing
//!
//! Quantities such as `"500m"`, `"0.5"`, `"1Gi"` or `"1e3"` are parsed into an
//! exact integer count of nano-units so that equivalent spellings compare
//! equal. Precision below one nano-unit is truncated.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Error returned for malformed quantity strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid quantity {input:?}: {reason}")]
pub struct QuantityError {
    pub input: String,
    pub reason: String,
}

impl QuantityError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed quantity, stored as nano-units
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuantityValue {
    nanos: i128,
}

impl QuantityValue {
    pub fn as_nanos(&self) -> i128 {
        self.nanos
    }
}

impl PartialOrd for QuantityValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QuantityValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl fmt::Display for QuantityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}n", self.nanos)
    }
}

/// Largest decimal exponent accepted in an `e<N>` suffix; anything beyond
/// cannot be represented as nano-units in an `i128`.
const MAX_EXPONENT: i32 = 64;

/// Scale applied by a quantity suffix
enum Scale {
    Decimal(i32),
    Binary(u32),
}

fn parse_suffix(input: &str, suffix: &str) -> Result<Scale, QuantityError> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        other if other.starts_with(['e', 'E']) => {
            let exponent: i32 = other[1..]
                .parse()
                .map_err(|_| QuantityError::new(input, format!("bad exponent {other:?}")))?;
            if !(-MAX_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
                return Err(QuantityError::new(
                    input,
                    format!("exponent {exponent} out of range"),
                ));
            }
            Scale::Decimal(exponent)
        }
        other => {
            return Err(QuantityError::new(
                input,
                format!("unknown suffix {other:?}"),
            ))
        }
    };
    Ok(scale)
}

/// Parse a Kubernetes quantity string
pub fn parse_quantity(input: &str) -> Result<QuantityValue, QuantityError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(QuantityError::new(input, "empty quantity"));
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let number_end = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_end);

    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if fraction.contains('.') {
        return Err(QuantityError::new(input, "more than one decimal point"));
    }
    if whole.is_empty() && fraction.is_empty() {
        return Err(QuantityError::new(input, "missing digits"));
    }

    let overflow = || QuantityError::new(input, "quantity too large");

    let mut mantissa: i128 = 0;
    for digit in whole.bytes().chain(fraction.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(i128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }

    let mut decimal_exponent: i32 = 9 - fraction.len() as i32;
    match parse_suffix(input, suffix)? {
        Scale::Decimal(exp) => {
            decimal_exponent = decimal_exponent.checked_add(exp).ok_or_else(overflow)?;
        }
        Scale::Binary(shift) => {
            mantissa = mantissa.checked_mul(1i128 << shift).ok_or_else(overflow)?;
        }
    }

    let nanos = if decimal_exponent >= 0 {
        10i128
            .checked_pow(decimal_exponent as u32)
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or_else(overflow)?
    } else {
        match 10i128.checked_pow(decimal_exponent.unsigned_abs()) {
            Some(divisor) => mantissa / divisor,
            None => 0,
        }
    };

    Ok(QuantityValue {
        nanos: if negative { -nanos } else { nanos },
    })
}
