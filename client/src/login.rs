//! Client-side login flow.
//!
//! The server gate is stateless. Repeated `NOT_REGISTERED` answers for the same
//! identifier are counted here so a front end can stop repeating the server's
//! generic message and point the player at registration instead.

use crate::{Client, Result};
use funnel_types::api::{ApiStatus, VerifyResponse};
use std::collections::HashMap;

/// Consecutive `NOT_REGISTERED` results before the message escalates.
pub const ESCALATION_THRESHOLD: u32 = 3;

pub const ESCALATED_MESSAGE: &str = "We still can't find a registration for this Player ID. \
Please register through our link, wait a few minutes for the registration to arrive, then try again.";

const FALLBACK_MESSAGE: &str = "An unknown error occurred.";

/// What a front end should show after one login attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginFeedback {
    LoggedIn { predictions_left: u32 },
    NeedsDeposit { message: String },
    NeedsRedeposit { message: String },
    NotRegistered { attempts: u32, message: String },
    Rejected { status: ApiStatus, message: String },
}

#[derive(Debug, Default)]
pub struct LoginTracker {
    attempts: HashMap<String, u32>,
}

impl LoginTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive `NOT_REGISTERED` results recorded for `player_id`.
    pub fn attempts(&self, player_id: &str) -> u32 {
        self.attempts.get(player_id).copied().unwrap_or(0)
    }

    /// Fold one verify response into the tracker.
    pub fn observe(&mut self, player_id: &str, response: &VerifyResponse) -> LoginFeedback {
        let message = || {
            response
                .message
                .clone()
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
        };
        if response.status != ApiStatus::NotRegistered {
            self.attempts.remove(player_id);
        }
        match response.status {
            ApiStatus::LoggedIn if response.success => LoginFeedback::LoggedIn {
                predictions_left: response.predictions_left.unwrap_or(0),
            },
            ApiStatus::NeedsDeposit => LoginFeedback::NeedsDeposit { message: message() },
            ApiStatus::NeedsRedeposit => LoginFeedback::NeedsRedeposit { message: message() },
            ApiStatus::NotRegistered => {
                let attempts = self.attempts.entry(player_id.to_string()).or_insert(0);
                *attempts += 1;
                let message = if *attempts >= ESCALATION_THRESHOLD {
                    ESCALATED_MESSAGE.to_string()
                } else {
                    message()
                };
                LoginFeedback::NotRegistered {
                    attempts: *attempts,
                    message,
                }
            }
            status => LoginFeedback::Rejected {
                status,
                message: message(),
            },
        }
    }

    /// Verify `player_id` against the server and fold in the result.
    pub async fn attempt(&mut self, client: &Client, player_id: &str) -> Result<LoginFeedback> {
        let response = client.verify(player_id).await?;
        Ok(self.observe(player_id, &response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: ApiStatus, predictions_left: Option<u32>) -> VerifyResponse {
        VerifyResponse {
            success: status == ApiStatus::LoggedIn,
            status,
            message: Some(format!("server says {status:?}")),
            predictions_left,
        }
    }

    #[test]
    fn test_escalates_after_threshold() {
        let mut tracker = LoginTracker::new();
        let not_registered = response(ApiStatus::NotRegistered, None);

        for expected in 1..ESCALATION_THRESHOLD {
            match tracker.observe("p1", &not_registered) {
                LoginFeedback::NotRegistered { attempts, message } => {
                    assert_eq!(attempts, expected);
                    assert_eq!(message, "server says NotRegistered");
                }
                other => panic!("unexpected feedback: {other:?}"),
            }
        }
        match tracker.observe("p1", &not_registered) {
            LoginFeedback::NotRegistered { attempts, message } => {
                assert_eq!(attempts, ESCALATION_THRESHOLD);
                assert_eq!(message, ESCALATED_MESSAGE);
            }
            other => panic!("unexpected feedback: {other:?}"),
        }

        // Counts are per identifier.
        assert_eq!(tracker.attempts("p2"), 0);
        assert!(matches!(
            tracker.observe("p2", &not_registered),
            LoginFeedback::NotRegistered { attempts: 1, .. }
        ));
    }

    #[test]
    fn test_other_outcomes_reset_count() {
        let mut tracker = LoginTracker::new();
        tracker.observe("p1", &response(ApiStatus::NotRegistered, None));
        tracker.observe("p1", &response(ApiStatus::NotRegistered, None));
        assert_eq!(tracker.attempts("p1"), 2);

        assert!(matches!(
            tracker.observe("p1", &response(ApiStatus::NeedsDeposit, None)),
            LoginFeedback::NeedsDeposit { .. }
        ));
        assert_eq!(tracker.attempts("p1"), 0);

        assert_eq!(
            tracker.observe("p1", &response(ApiStatus::LoggedIn, Some(15))),
            LoginFeedback::LoggedIn {
                predictions_left: 15
            }
        );
        assert!(matches!(
            tracker.observe("p1", &response(ApiStatus::ServerError, None)),
            LoginFeedback::Rejected {
                status: ApiStatus::ServerError,
                ..
            }
        ));
    }
}
