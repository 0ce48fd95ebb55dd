/// Cumulative deposit at which an account starts earning predictions
pub const MIN_DEPOSIT: f64 = 10.0;

/// Predictions granted by every qualifying deposit
pub const PREDICTIONS_AWARDED: u32 = 15;

/// Shortest identifier the login gate will look up
pub const MIN_IDENTIFIER_LENGTH: usize = 3;

/// Shortest promo code accepted after trimming
pub const MIN_PROMO_CODE_LENGTH: usize = 3;

/// Promo code served until an admin sets one
pub const DEFAULT_PROMO_CODE: &str = "OGGY";

/// Storage key prefix for player records (`user:{id}`)
pub const USER_KEY_PREFIX: &str = "user:";

/// Storage key holding the promo code
pub const PROMO_CODE_KEY: &str = "app_config:promo_code";
