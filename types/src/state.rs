use crate::constants::{PROMO_CODE_KEY, USER_KEY_PREFIX};
use crate::record::{PlayerId, UserRecord};

/// Entries the store knows about.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    User(PlayerId),
    PromoCode,
}

impl Key {
    /// Flat key used by string-keyed backends.
    pub fn storage_key(&self) -> String {
        match self {
            Key::User(id) => format!("{USER_KEY_PREFIX}{id}"),
            Key::PromoCode => PROMO_CODE_KEY.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    User(UserRecord),
    PromoCode(String),
}

impl Value {
    /// JSON text stored by string-valued backends.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Value::User(record) => serde_json::to_string(record),
            Value::PromoCode(code) => serde_json::to_string(code),
        }
    }

    /// Decodes JSON text written by [`Value::encode`]; the key picks the shape.
    pub fn decode(key: &Key, raw: &str) -> Result<Self, serde_json::Error> {
        match key {
            Key::User(_) => serde_json::from_str(raw).map(Value::User),
            Key::PromoCode => serde_json::from_str(raw).map(Value::PromoCode),
        }
    }

    pub fn into_user(self) -> Option<UserRecord> {
        match self {
            Value::User(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_promo_code(self) -> Option<String> {
        match self {
            Value::PromoCode(code) => Some(code),
            _ => None,
        }
    }
}

/// Pending change produced by an atomic update.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Update(Value),
    Delete,
}
