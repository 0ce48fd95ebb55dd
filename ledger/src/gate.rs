use funnel_types::{GateResult, GateStatus, PlayerId, UserRecord};

/// Login decision for a stored record, after the identifier has passed
/// [`PlayerId::parse_for_login`].
pub fn evaluate(record: Option<&UserRecord>) -> GateResult {
    let Some(record) = record.filter(|record| record.registered) else {
        return GateResult::new(GateStatus::NotRegistered);
    };
    if !record.is_qualified() {
        return GateResult::new(GateStatus::NeedsDeposit);
    }
    if !record.has_credits() {
        return GateResult::with_predictions(GateStatus::NeedsRedeposit, 0);
    }
    GateResult::with_predictions(GateStatus::LoggedIn, record.predictions_left)
}

/// Validates a raw identifier for login, mapping any failure to `INVALID_ID`.
pub fn login_id(raw: Option<&str>) -> Result<PlayerId, GateResult> {
    raw.and_then(|raw| PlayerId::parse_for_login(raw).ok())
        .ok_or_else(|| GateResult::new(GateStatus::InvalidId))
}
