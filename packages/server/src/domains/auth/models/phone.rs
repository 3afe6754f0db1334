use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Country calling code assumed for bare 10-digit numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "91";

/// Length of a domestic number without country code.
const NATIONAL_NUMBER_LEN: usize = 10;

lazy_static! {
    static ref E164: Regex = Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("valid E.164 pattern");
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,

    #[error("phone number contains no digits")]
    NoDigits,
}

/// Canonical `+<country code><digits>` phone number used for every comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the number has E.164 shape (`+`, 8 to 15 digits, no leading zero).
    ///
    /// Normalization is permissive; callers that must reject junk check this.
    pub fn is_plausible(&self) -> bool {
        E164.is_match(&self.0)
    }

    /// Last four digits, for logs.
    pub fn masked(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("***{tail}")
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalizes user-supplied phone strings.
///
/// - Input starting with `+` is trusted: whitespace is removed, nothing else.
/// - 10 digits get the default country code.
/// - Country code followed by 10 digits gets a `+`.
/// - Anything else gets a `+` in front of its digits.
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    country_code: String,
}

impl PhoneNormalizer {
    pub fn new(country_code: impl Into<String>) -> Self {
        let country_code: String = country_code.into();
        Self {
            country_code: country_code
                .chars()
                .filter(char::is_ascii_digit)
                .collect(),
        }
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn normalize(&self, input: &str) -> Result<PhoneNumber, PhoneError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        if trimmed.starts_with('+') {
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            if !compact.chars().any(|c| c.is_ascii_digit()) {
                return Err(PhoneError::NoDigits);
            }
            return Ok(PhoneNumber(compact));
        }

        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(PhoneError::NoDigits);
        }

        // Numbers that already carry the country code, and every other shape,
        // just get the `+`.
        if digits.len() == NATIONAL_NUMBER_LEN {
            Ok(PhoneNumber(format!("+{}{}", self.country_code, digits)))
        } else {
            Ok(PhoneNumber(format!("+{digits}")))
        }
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTRY_CODE)
    }
}

/// Normalize with the default country code.
pub fn normalize_phone(input: &str) -> Result<PhoneNumber, PhoneError> {
    PhoneNormalizer::default().normalize(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domestic_number_gets_country_code() {
        assert_eq!(normalize_phone("9876543210").unwrap().as_str(), "+919876543210");
    }

    #[test]
    fn equivalent_forms_normalize_equal() {
        let a = normalize_phone("9876543210").unwrap();
        let b = normalize_phone("+919876543210").unwrap();
        let c = normalize_phone("919876543210").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn punctuation_is_stripped_from_unprefixed_input() {
        assert_eq!(
            normalize_phone("(987) 654-3210").unwrap().as_str(),
            "+919876543210"
        );
        assert_eq!(
            normalize_phone("91 98765 43210").unwrap().as_str(),
            "+919876543210"
        );
    }

    #[test]
    fn plus_prefixed_input_only_loses_whitespace() {
        assert_eq!(
            normalize_phone(" +91 98765 43210 ").unwrap().as_str(),
            "+919876543210"
        );
        assert_eq!(normalize_phone("+1 415 555 0100").unwrap().as_str(), "+14155550100");
    }

    #[test]
    fn other_shapes_fall_back_to_plus_digits() {
        assert_eq!(normalize_phone("12345").unwrap().as_str(), "+12345");
        assert_eq!(normalize_phone("441632960961").unwrap().as_str(), "+441632960961");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "9876543210",
            "+919876543210",
            "919876543210",
            "+1 415 555 0100",
            "(987) 654-3210",
            "12345",
            "0044 20 7946 0958",
        ] {
            let once = normalize_phone(input).unwrap();
            let twice = normalize_phone(once.as_str()).unwrap();
            assert_eq!(once, twice, "input {input:?}");
        }
    }

    #[test]
    fn rejects_input_without_digits() {
        assert_eq!(normalize_phone("   "), Err(PhoneError::Empty));
        assert_eq!(normalize_phone("call me"), Err(PhoneError::NoDigits));
        assert_eq!(normalize_phone("+ "), Err(PhoneError::NoDigits));
    }

    #[test]
    fn custom_country_code() {
        let normalizer = PhoneNormalizer::new("+1");
        assert_eq!(normalizer.country_code(), "1");
        assert_eq!(normalizer.normalize("4155550100").unwrap().as_str(), "+14155550100");
        assert_eq!(normalizer.normalize("14155550100").unwrap().as_str(), "+14155550100");
    }

    #[test]
    fn plausibility_is_stricter_than_normalization() {
        assert!(normalize_phone("9876543210").unwrap().is_plausible());
        assert!(!normalize_phone("12345").unwrap().is_plausible());
        assert!(!normalize_phone("+91-98765-43210").unwrap().is_plausible());
        assert!(!normalize_phone("01234567890").unwrap().is_plausible());
    }

    #[test]
    fn masked_keeps_last_four_digits() {
        assert_eq!(normalize_phone("9876543210").unwrap().masked(), "***3210");
    }
}
