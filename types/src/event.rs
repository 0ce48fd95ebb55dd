use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of notification sent by the partner network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Registration,
    FirstDeposit,
    RecurringDeposit,
    Unknown,
}

impl EventKind {
    /// Case-insensitive match; anything unrecognised is [`EventKind::Unknown`].
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("registration") {
            Self::Registration
        } else if raw.eq_ignore_ascii_case("first_deposit") {
            Self::FirstDeposit
        } else if raw.eq_ignore_ascii_case("recurring_deposit") {
            Self::RecurringDeposit
        } else {
            Self::Unknown
        }
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, Self::FirstDeposit | Self::RecurringDeposit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::FirstDeposit => "first_deposit",
            Self::RecurringDeposit => "recurring_deposit",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound notification as received, before it is applied to a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Literal event name as sent, kept for acknowledgments of unknown kinds.
    pub raw_kind: String,
    /// Raw amount parameter; only meaningful for deposits.
    pub amount: Option<String>,
}

impl Event {
    pub fn new(raw_kind: impl Into<String>, amount: Option<String>) -> Self {
        let raw_kind = raw_kind.into();
        Self {
            kind: EventKind::parse(&raw_kind),
            raw_kind,
            amount,
        }
    }

    pub fn registration() -> Self {
        Self::new(EventKind::Registration.as_str(), None)
    }

    pub fn first_deposit(amount: f64) -> Self {
        Self::new(EventKind::FirstDeposit.as_str(), Some(amount.to_string()))
    }

    pub fn recurring_deposit(amount: f64) -> Self {
        Self::new(EventKind::RecurringDeposit.as_str(), Some(amount.to_string()))
    }

    /// Positive, finite deposit amount, or `None` when missing or malformed.
    pub fn deposit_amount(&self) -> Option<f64> {
        parse_amount(self.amount.as_deref()?)
    }
}

/// Parses a decimal amount, accepting only finite values strictly above zero.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// What applying an [`Event`] did to the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Registration recorded (a repeat leaves the record as it was).
    Registered,
    /// Deposit accumulated; `awarded` is zero while the total is below threshold.
    Deposited {
        amount: f64,
        #[serde(rename = "totalDeposit")]
        total_deposit: f64,
        awarded: u32,
    },
    /// Recognised but unsupported event kind; nothing stored.
    Ignored { event: String },
    /// Deposit without a usable amount; nothing stored.
    InvalidAmount { amount: Option<String> },
}

impl Outcome {
    /// Whether the record was written.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Registered | Self::Deposited { .. })
    }

    pub fn message(&self, player: &str) -> String {
        match self {
            Self::Registered | Self::Deposited { .. } => {
                "Postback processed successfully.".to_string()
            }
            Self::Ignored { event } => {
                format!("Unknown event type '{event}' received and acknowledged.")
            }
            Self::InvalidAmount { amount } => format!(
                "Deposit event received for player: {player}, but amount was missing or invalid: {}",
                amount.as_deref().unwrap_or("")
            ),
        }
    }
}
