//! Predictor funnel ledger.
//!
//! Tracks, per player identifier, whether the partner network has reported a
//! registration, the cumulative deposit, and the prediction credits earned by
//! qualifying deposits. The login gate and credit consumption read and spend
//! those credits.
//!
//! ## Atomicity
//! Every mutation of a player record runs inside a single [`Store::update`]
//! call, so concurrent notifications and spends for one identifier serialize
//! instead of overwriting each other. Records of different identifiers are
//! independent.
//!
//! ## Example
//! ```rust,ignore
//! use funnel_ledger::{Funnel, FunnelConfig, Memory};
//! use funnel_types::{Event, PlayerId};
//!
//! let funnel = Funnel::new(Memory::new(), FunnelConfig::default());
//! let player = PlayerId::parse("player42")?;
//! funnel.apply_event(&player, &Event::first_deposit(15.0)).await?;
//! let gate = funnel.verify(Some("player42")).await?;
//! assert!(gate.is_logged_in());
//! ```

use funnel_types::{
    AdminCheck, Consumption, Event, GateResult, IdentifierError, Key, Outcome, PlayerId,
    PromoUpdate, Status, UserRecord, Value,
};
use thiserror::Error as ThisError;
use tracing::{info, warn};

pub mod admin;
pub mod credits;
pub mod events;
pub mod gate;
pub mod promo;
pub mod signal;

mod state;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


pub use admin::FunnelConfig;
pub use events::apply_event;
pub use signal::Signal;
pub use state::{Memory, Store};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid player id: {0}")]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("event type is missing")]
    MissingEventKind,
    #[error("store failure: {0:#}")]
    Store(anyhow::Error),
}

impl Error {
    /// Whether the caller supplied bad input (as opposed to a backend failure).
    pub fn is_validation(&self) -> bool {
        !matches!(self, Error::Store(_))
    }
}

/// The ledger operations, bound to a store and startup configuration.
pub struct Funnel<S: Store> {
    store: S,
    config: FunnelConfig,
}

impl<S: Store> Funnel<S> {
    pub fn new(store: S, config: FunnelConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Validates a raw partner notification and applies it.
    ///
    /// The identifier is trimmed; a blank identifier or missing event name is
    /// rejected before the store is touched.
    pub async fn record_postback(
        &self,
        player_id: Option<&str>,
        event_kind: Option<&str>,
        amount: Option<String>,
    ) -> Result<(PlayerId, Outcome), Error> {
        let player = PlayerId::parse_trimmed(player_id.unwrap_or_default())?;
        let event_kind = event_kind
            .filter(|kind| !kind.is_empty())
            .ok_or(Error::MissingEventKind)?;
        let event = Event::new(event_kind, amount);
        let outcome = self.apply_event(&player, &event).await?;
        Ok((player, outcome))
    }

    /// Applies `event` to the player's record in one atomic update.
    pub async fn apply_event(&self, player: &PlayerId, event: &Event) -> Result<Outcome, Error> {
        let (record, outcome) = self
            .store
            .update(Key::User(player.clone()), |current| {
                let existing = current.and_then(Value::into_user);
                let (record, outcome) = events::apply_event(existing.as_ref(), event);
                let status = outcome
                    .is_mutating()
                    .then(|| Status::Update(Value::User(record.clone())));
                (status, (record, outcome))
            })
            .await
            .map_err(Error::Store)?;

        match &outcome {
            Outcome::Registered => {
                info!(player_id = %player, ?record, "registration recorded");
            }
            Outcome::Deposited {
                amount, awarded, ..
            } => {
                info!(
                    player_id = %player,
                    event = %event.kind,
                    amount,
                    awarded,
                    ?record,
                    "deposit recorded"
                );
            }
            Outcome::Ignored { event } => {
                warn!(player_id = %player, event = %event, "unknown event type acknowledged");
            }
            Outcome::InvalidAmount { amount } => {
                warn!(player_id = %player, event = %event.kind, ?amount, "deposit amount missing or invalid");
            }
        }
        Ok(outcome)
    }

    /// Login gate. Never mutates the record.
    pub async fn verify(&self, player_id: Option<&str>) -> Result<GateResult, Error> {
        let player = match gate::login_id(player_id) {
            Ok(player) => player,
            Err(result) => return Ok(result),
        };
        let record = self.record(&player).await?;
        Ok(gate::evaluate(record.as_ref()))
    }

    /// Spends one prediction credit.
    pub async fn consume(&self, player: &PlayerId) -> Result<Consumption, Error> {
        let consumption = self
            .store
            .update(Key::User(player.clone()), |current| {
                let (next, consumption) = credits::spend(current.and_then(Value::into_user));
                (next.map(|record| Status::Update(Value::User(record))), consumption)
            })
            .await
            .map_err(Error::Store)?;
        if !matches!(consumption, Consumption::Spent { .. }) {
            info!(player_id = %player, ?consumption, "prediction refused");
        }
        Ok(consumption)
    }

    pub fn check_admin(&self, supplied: Option<&str>) -> AdminCheck {
        self.config.check_admin(supplied)
    }

    pub fn affiliate_link(&self) -> Option<&str> {
        self.config.affiliate_link()
    }

    /// Current promo code, or the default when none has been set.
    pub async fn promo_code(&self) -> Result<String, Error> {
        let stored = self
            .store
            .get(&Key::PromoCode)
            .await
            .map_err(Error::Store)?
            .and_then(Value::into_promo_code);
        Ok(promo::effective(stored))
    }

    /// Admin-gated promo code write. Authorization is checked before the value.
    pub async fn set_promo_code(
        &self,
        promo_code: Option<&str>,
        password: Option<&str>,
    ) -> Result<PromoUpdate, Error> {
        let check = self.check_admin(password);
        if !check.is_accepted() {
            warn!(?check, "promo code update denied");
            return Ok(PromoUpdate::Denied(check));
        }
        let Some(code) = promo_code.and_then(promo::normalize) else {
            return Ok(PromoUpdate::TooShort);
        };
        self.store
            .set(Key::PromoCode, Value::PromoCode(code.clone()))
            .await
            .map_err(Error::Store)?;
        info!(promo_code = %code, "promo code updated");
        Ok(PromoUpdate::Updated(code))
    }

    /// Removes the player's record, returning whether one existed.
    pub async fn clear(&self, player: &PlayerId) -> Result<bool, Error> {
        let existed = self
            .store
            .delete(&Key::User(player.clone()))
            .await
            .map_err(Error::Store)?;
        if existed {
            info!(player_id = %player, "player data cleared");
        } else {
            info!(player_id = %player, "no player data to clear");
        }
        Ok(existed)
    }

    /// Stored record, if any.
    pub async fn record(&self, player: &PlayerId) -> Result<Option<UserRecord>, Error> {
        Ok(self
            .store
            .get(&Key::User(player.clone()))
            .await
            .map_err(Error::Store)?
            .and_then(Value::into_user))
    }
}
