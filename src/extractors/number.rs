//! Numeric coercion of extracted text
//!
//! Prices on the pages this crate targets use Dutch formatting: a decimal comma
//! (`12,99`) and whole amounts written with dotted thousands and a `,-` suffix
//! (`1.234,-`). Text is normalised to a decimal point and then must contain
//! exactly one number.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Number;
use thiserror::Error;

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").expect("valid decimal pattern"));
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid integer pattern"));

/// Why a text could not be read as a number
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    #[error("multiple decimal values")]
    MultipleDecimals,

    #[error("multiple values")]
    MultipleIntegers,

    #[error("no value")]
    NoNumber,
}

/// Parse the single number contained in `raw`.
///
/// Decimal matches take precedence over plain digit runs. Zero or several
/// candidates are both failures.
pub fn parse_number(raw: &str) -> Result<Number, NumberError> {
    let text = normalize(raw);

    let mut decimals = DECIMAL.find_iter(&text);
    if let Some(first) = decimals.next() {
        if decimals.next().is_some() {
            return Err(NumberError::MultipleDecimals);
        }
        return first
            .as_str()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or(NumberError::NoNumber);
    }

    let mut integers = INTEGER.find_iter(&text);
    let first = integers.next().ok_or(NumberError::NoNumber)?;
    if integers.next().is_some() {
        return Err(NumberError::MultipleIntegers);
    }

    let digits = first.as_str();
    match digits.parse::<u64>() {
        Ok(n) => Ok(Number::from(n)),
        // too long for u64, keep the magnitude
        Err(_) => digits
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or(NumberError::NoNumber),
    }
}

fn normalize(raw: &str) -> String {
    let text = if raw.contains(",-") {
        raw.replacen(",-", "", 1).replace('.', "")
    } else {
        raw.to_string()
    };
    text.replacen(',', ".", 1)
}
