use funnel_types::{DEFAULT_PROMO_CODE, MIN_PROMO_CODE_LENGTH};

/// Trims and uppercases a promo code, rejecting anything shorter than
/// [`MIN_PROMO_CODE_LENGTH`] characters.
pub fn normalize(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    (code.chars().count() >= MIN_PROMO_CODE_LENGTH).then_some(code)
}

/// Stored code, falling back to [`DEFAULT_PROMO_CODE`] when unset or empty.
pub fn effective(stored: Option<String>) -> String {
    stored
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| DEFAULT_PROMO_CODE.to_string())
}
