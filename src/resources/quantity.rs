use crate::error::{Error, Result};

const SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E", "",
];

/// Accepts the plain decimal and binary-suffixed forms of a Kubernetes quantity
/// (`8Gi`, `500m`, `1.5`). Exponent notation is not accepted.
pub fn validate_quantity(value: &str) -> Result<()> {
    let invalid = || Error::InvalidQuantity(value.to_string());

    let digits_end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(digits_end);

    if number.is_empty() || number.starts_with('.') || number.ends_with('.') {
        return Err(invalid());
    }
    if number.matches('.').count() > 1 {
        return Err(invalid());
    }
    if !SUFFIXES.contains(&suffix) {
        return Err(invalid());
    }
    Ok(())
}
