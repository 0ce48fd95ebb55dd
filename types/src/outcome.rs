use serde::{Deserialize, Serialize};

use crate::constants::MIN_PROMO_CODE_LENGTH;

/// Result of spending one prediction credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consumption {
    Spent { predictions_left: u32 },
    NotFound,
    NoCredits,
}

impl Consumption {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Spent { .. } => "Prediction used.",
            Self::NotFound => "User not found.",
            Self::NoCredits => "No predictions left.",
        }
    }
}

/// Result of comparing a supplied admin password with the configured one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminCheck {
    Accepted,
    Rejected,
    NotConfigured,
}

impl AdminCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Accepted => "Admin access granted.",
            Self::Rejected => "Incorrect admin password.",
            Self::NotConfigured => "Admin access is not configured on the server.",
        }
    }
}

/// Result of an admin promo-code write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromoUpdate {
    Updated(String),
    Denied(AdminCheck),
    TooShort,
}

impl PromoUpdate {
    pub fn message(&self) -> String {
        match self {
            Self::Updated(code) => format!("Promo code successfully updated to: {code}"),
            Self::Denied(check) => check.message().to_string(),
            Self::TooShort => {
                format!("Promo code must be at least {MIN_PROMO_CODE_LENGTH} characters long.")
            }
        }
    }
}
