use serde::{Deserialize, Serialize};

use crate::constants::MIN_DEPOSIT;

/// Login decision for an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    InvalidId,
    NotRegistered,
    NeedsDeposit,
    NeedsRedeposit,
    LoggedIn,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidId => "INVALID_ID",
            Self::NotRegistered => "NOT_REGISTERED",
            Self::NeedsDeposit => "NEEDS_DEPOSIT",
            Self::NeedsRedeposit => "NEEDS_REDEPOSIT",
            Self::LoggedIn => "LOGGED_IN",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::InvalidId => "Please enter a valid Player ID.".to_string(),
            Self::NotRegistered => "Sorry, this Player ID is not registered! Please use the \
                'Register Here' button and wait a few minutes before trying again."
                .to_string(),
            Self::NeedsDeposit => {
                format!("User is registered but needs to deposit at least ${MIN_DEPOSIT}.")
            }
            Self::NeedsRedeposit => {
                "You have used all predictions. Deposit again to get more.".to_string()
            }
            Self::LoggedIn => "Access granted.".to_string(),
        }
    }
}

/// Gate status plus the credit count the client should display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateResult {
    pub status: GateStatus,
    /// Present for `LOGGED_IN` and `NEEDS_REDEPOSIT` (always zero there).
    pub predictions_left: Option<u32>,
    pub message: String,
}

impl GateResult {
    pub fn new(status: GateStatus) -> Self {
        Self {
            status,
            predictions_left: None,
            message: status.message(),
        }
    }

    pub fn with_predictions(status: GateStatus, predictions_left: u32) -> Self {
        Self {
            predictions_left: Some(predictions_left),
            ..Self::new(status)
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.status == GateStatus::LoggedIn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in [
            GateStatus::InvalidId,
            GateStatus::NotRegistered,
            GateStatus::NeedsDeposit,
            GateStatus::NeedsRedeposit,
            GateStatus::LoggedIn,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_needs_deposit_message_mentions_threshold() {
        assert_eq!(
            GateStatus::NeedsDeposit.message(),
            "User is registered but needs to deposit at least $10."
        );
    }
}
