pub mod api;
pub mod constants;
pub use constants::*;
pub mod event;
pub use event::{parse_amount, Event, EventKind, Outcome};
pub mod gate;
pub use gate::{GateResult, GateStatus};
pub mod outcome;
pub use outcome::{AdminCheck, Consumption, PromoUpdate};
pub mod record;
pub use record::{IdentifierError, PlayerId, UserRecord};
pub mod state;
pub use state::{Key, Status, Value};
