//! Order tracking codes.
//!
//! A tracking code lets anyone look up an order's status without signing in,
//! so it is short enough to read over the phone and avoids characters that
//! are easily confused (`0`/`O`, `1`/`I`).

use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "STES-";
const BODY_LEN: usize = 8;
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Errors that can occur when parsing a [`TrackingCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingCodeError {
    #[error("tracking code must start with {PREFIX}")]
    MissingPrefix,
    #[error("tracking code must have {BODY_LEN} characters after the prefix")]
    WrongLength,
    #[error("tracking code contains an invalid character: {0}")]
    InvalidCharacter(char),
}

/// A public order tracking code, e.g. `STES-7K2QMX9A`.
///
/// Deserializing goes through [`TrackingCode::parse`], so a response can
/// never carry a code the type would reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingCode(String);

impl TrackingCode {
    /// Generate a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(PREFIX.len() + BODY_LEN);
        code.push_str(PREFIX);
        for _ in 0..BODY_LEN {
            let idx = rng.random_range(0..ALPHABET.len());
            code.push(char::from(ALPHABET.get(idx).copied().unwrap_or(b'X')));
        }
        Self(code)
    }

    /// Parse user input. Case-insensitive and tolerant of surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix, length or alphabet do not match.
    pub fn parse(s: &str) -> Result<Self, TrackingCodeError> {
        let upper = s.trim().to_uppercase();
        let body = upper
            .strip_prefix(PREFIX)
            .ok_or(TrackingCodeError::MissingPrefix)?;

        if body.chars().count() != BODY_LEN {
            return Err(TrackingCodeError::WrongLength);
        }

        if let Some(bad) = body.chars().find(|c| !c.is_ascii() || !ALPHABET.contains(&(*c as u8))) {
            return Err(TrackingCodeError::InvalidCharacter(bad));
        }

        Ok(Self(upper))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TrackingCode {
    type Error = TrackingCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TrackingCode> for String {
    fn from(code: TrackingCode) -> Self {
        code.0
    }
}

impl fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TrackingCode {
    type Err = TrackingCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_parse_back() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let code = TrackingCode::generate(&mut rng);
            assert!(code.as_str().starts_with("STES-"));
            assert_eq!(code.as_str().len(), 13);
            assert_eq!(TrackingCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let code = TrackingCode::parse("  stes-abcd2345 ").unwrap();
        assert_eq!(code.as_str(), "STES-ABCD2345");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            TrackingCode::parse("ABCD2345"),
            Err(TrackingCodeError::MissingPrefix)
        );
        assert_eq!(
            TrackingCode::parse("STES-ABC"),
            Err(TrackingCodeError::WrongLength)
        );
        assert_eq!(
            TrackingCode::parse("STES-ABCD2340"),
            Err(TrackingCodeError::InvalidCharacter('0'))
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let code: TrackingCode = serde_json::from_str("\"stes-7k3m9qpx\"").unwrap();
        assert_eq!(code.as_str(), "STES-7K3M9QPX");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"STES-7K3M9QPX\"");

        assert!(serde_json::from_str::<TrackingCode>("\"bad\"").is_err());
        assert!(serde_json::from_str::<TrackingCode>("\"STES-ABCD2340\"").is_err());
    }
}
