use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

use crate::constants::{MIN_DEPOSIT, MIN_IDENTIFIER_LENGTH};

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("player id is missing or empty")]
    Empty,
    #[error("player id too short (len={len}, min={min})")]
    TooShort { len: usize, min: usize },
}

/// Opaque player identifier supplied by the partner network and the client.
///
/// Identifiers are case-sensitive and used verbatim as storage keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Accepts any non-empty identifier without altering it.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Ok(Self(raw.to_string()))
    }

    /// Trims surrounding whitespace before accepting the identifier.
    ///
    /// Partner macros frequently pad the substituted value, so inbound
    /// notifications go through this path.
    pub fn parse_trimmed(raw: &str) -> Result<Self, IdentifierError> {
        Self::parse(raw.trim())
    }

    /// Like [`PlayerId::parse`] but also enforces the login minimum length.
    pub fn parse_for_login(raw: &str) -> Result<Self, IdentifierError> {
        let id = Self::parse(raw)?;
        let len = id.len();
        if len < MIN_IDENTIFIER_LENGTH {
            return Err(IdentifierError::TooShort {
                len,
                min: MIN_IDENTIFIER_LENGTH,
            });
        }
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration, deposit and credit state of one player.
///
/// Serialized as `{"registered":..,"deposit":..,"predictionsLeft":..}`.
/// A missing record is equivalent to `UserRecord::default()`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub registered: bool,
    #[serde(rename = "deposit", default)]
    pub total_deposit: f64,
    #[serde(default)]
    pub predictions_left: u32,
}

impl UserRecord {
    /// Whether the cumulative deposit has reached [`MIN_DEPOSIT`].
    pub fn is_qualified(&self) -> bool {
        self.total_deposit >= MIN_DEPOSIT
    }

    pub fn has_credits(&self) -> bool {
        self.predictions_left > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_identifier_verbatim() {
        let id = PlayerId::parse(" Player42 ").unwrap();
        assert_eq!(id.as_str(), " Player42 ");
        assert_ne!(PlayerId::parse("abc").unwrap(), PlayerId::parse("ABC").unwrap());
    }

    #[test]
    fn test_parse_trimmed() {
        assert_eq!(PlayerId::parse_trimmed("  p42\t").unwrap().as_str(), "p42");
        assert_eq!(PlayerId::parse_trimmed("   "), Err(IdentifierError::Empty));
    }

    #[test]
    fn test_parse_for_login_enforces_minimum() {
        assert_eq!(PlayerId::parse_for_login(""), Err(IdentifierError::Empty));
        assert_eq!(
            PlayerId::parse_for_login("ab"),
            Err(IdentifierError::TooShort { len: 2, min: 3 })
        );
        assert!(PlayerId::parse_for_login("abc").is_ok());
    }

    #[test]
    fn test_record_wire_layout() {
        let record = UserRecord {
            registered: true,
            total_deposit: 12.5,
            predictions_left: 15,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"registered": true, "deposit": 12.5, "predictionsLeft": 15})
        );
    }

    #[test]
    fn test_record_missing_credits_defaults_to_zero() {
        let record: UserRecord =
            serde_json::from_str(r#"{"registered":true,"deposit":4}"#).unwrap();
        assert_eq!(record.predictions_left, 0);
        assert!(!record.is_qualified());
    }
}
