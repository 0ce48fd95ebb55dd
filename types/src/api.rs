//! JSON payloads exchanged between the server and its clients.

use serde::{Deserialize, Serialize};

use crate::event::Outcome;
use crate::gate::{GateResult, GateStatus};
use crate::outcome::AdminCheck;

/// Status tag carried by every response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiStatus {
    Ok,
    // postback
    Applied,
    Ignored,
    InvalidAmount,
    MissingEvent,
    // gate
    InvalidId,
    NotRegistered,
    NeedsDeposit,
    NeedsRedeposit,
    LoggedIn,
    // credits
    Consumed,
    NotFound,
    NoCredits,
    // admin
    Accepted,
    Rejected,
    NotConfigured,
    InvalidPromoCode,
    // clear
    Cleared,
    ServerError,
}

impl From<GateStatus> for ApiStatus {
    fn from(status: GateStatus) -> Self {
        match status {
            GateStatus::InvalidId => Self::InvalidId,
            GateStatus::NotRegistered => Self::NotRegistered,
            GateStatus::NeedsDeposit => Self::NeedsDeposit,
            GateStatus::NeedsRedeposit => Self::NeedsRedeposit,
            GateStatus::LoggedIn => Self::LoggedIn,
        }
    }
}

impl From<AdminCheck> for ApiStatus {
    fn from(check: AdminCheck) -> Self {
        match check {
            AdminCheck::Accepted => Self::Accepted,
            AdminCheck::Rejected => Self::Rejected,
            AdminCheck::NotConfigured => Self::NotConfigured,
        }
    }
}

impl From<&Outcome> for ApiStatus {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Registered | Outcome::Deposited { .. } => Self::Applied,
            Outcome::Ignored { .. } => Self::Ignored,
            Outcome::InvalidAmount { .. } => Self::InvalidAmount,
        }
    }
}

/// Query string of a partner notification.
///
/// Networks disagree on parameter names, so the identifier may arrive as
/// `user_id` or `sub1` and the event as `event_type` or `event`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostbackQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

impl PostbackQuery {
    /// First non-empty of `user_id`, `sub1`.
    pub fn player_id(&self) -> Option<&str> {
        first_present(&self.user_id, &self.sub1)
    }

    /// First non-empty of `event_type`, `event`.
    pub fn event_kind(&self) -> Option<&str> {
        first_present(&self.event_type, &self.event)
    }
}

/// Builds the query from raw `(name, value)` pairs. A repeated parameter
/// keeps its first non-empty value; unrecognised names are dropped.
impl FromIterator<(String, String)> for PostbackQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "user_id" => &mut query.user_id,
                "sub1" => &mut query.sub1,
                "event_type" => &mut query.event_type,
                "event" => &mut query.event,
                "amount" => &mut query.amount,
                _ => continue,
            };
            keep_first(slot, value);
        }
        query
    }
}

fn keep_first(slot: &mut Option<String>, value: String) {
    if slot.as_deref().map_or(true, str::is_empty) {
        *slot = Some(value);
    }
}

fn first_present<'a>(primary: &'a Option<String>, fallback: &'a Option<String>) -> Option<&'a str> {
    primary
        .as_deref()
        .filter(|value| !value.is_empty())
        .or_else(|| fallback.as_deref().filter(|value| !value.is_empty()))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackResponse {
    pub success: bool,
    pub status: ApiStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_query: Option<PostbackQuery>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    #[serde(default)]
    pub player_id: Option<String>,
}

impl FromIterator<(String, String)> for VerifyQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            if name == "playerId" {
                keep_first(&mut query.player_id, value);
            }
        }
        query
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions_left: Option<u32>,
}

impl From<GateResult> for VerifyResponse {
    fn from(result: GateResult) -> Self {
        Self {
            success: result.is_logged_in(),
            status: result.status.into(),
            message: Some(result.message),
            predictions_left: result.predictions_left,
        }
    }
}

/// Body of requests naming a single player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    #[serde(default)]
    pub player_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsePredictionResponse {
    pub success: bool,
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions_left: Option<u32>,
    /// Cosmetic multiplier shown by the predictor screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResponse {
    pub success: bool,
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPromoCodeRequest {
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeResponse {
    pub success: bool,
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearUserResponse {
    pub success: bool,
    pub status: ApiStatus,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateLinkResponse {
    pub success: bool,
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postback_aliases() {
        let query = PostbackQuery {
            sub1: Some("p42".to_string()),
            event: Some("registration".to_string()),
            ..Default::default()
        };
        assert_eq!(query.player_id(), Some("p42"));
        assert_eq!(query.event_kind(), Some("registration"));

        let query = PostbackQuery {
            user_id: Some("primary".to_string()),
            sub1: Some("fallback".to_string()),
            ..Default::default()
        };
        assert_eq!(query.player_id(), Some("primary"));
        assert_eq!(query.event_kind(), None);
    }

    #[test]
    fn test_empty_primary_falls_back() {
        let query = PostbackQuery {
            user_id: Some(String::new()),
            sub1: Some("fallback".to_string()),
            event_type: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(query.player_id(), Some("fallback"));
        assert_eq!(query.event_kind(), None);
    }

    #[test]
    fn test_repeated_parameters_keep_first_value() {
        let pairs = [
            ("user_id", ""),
            ("user_id", "p42"),
            ("user_id", "other"),
            ("event_type", "registration"),
            ("event_type", "first_deposit"),
            ("utm_source", "partner"),
        ]
        .map(|(name, value)| (name.to_string(), value.to_string()));
        let query: PostbackQuery = pairs.into_iter().collect();
        assert_eq!(query.user_id.as_deref(), Some("p42"));
        assert_eq!(query.event_kind(), Some("registration"));
        assert_eq!(query.amount, None);

        let query: VerifyQuery = [("playerId", "abc"), ("playerId", "xyz")]
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .into_iter()
            .collect();
        assert_eq!(query.player_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_verify_response_from_gate() {
        let response = VerifyResponse::from(GateResult::with_predictions(GateStatus::LoggedIn, 7));
        assert!(response.success);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "LOGGED_IN");
        assert_eq!(json["predictionsLeft"], 7);

        let response = VerifyResponse::from(GateResult::new(GateStatus::NotRegistered));
        assert!(!response.success);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("predictionsLeft").is_none());
    }
}
