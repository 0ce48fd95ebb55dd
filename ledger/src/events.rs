use funnel_types::{Event, EventKind, Outcome, UserRecord, PREDICTIONS_AWARDED};

/// Computes the record that results from applying `event` to `existing`.
///
/// Returns the next record alongside what happened. When the outcome is not
/// mutating the returned record equals the prior one (or the default for an
/// absent record) and must not be written.
pub fn apply_event(existing: Option<&UserRecord>, event: &Event) -> (UserRecord, Outcome) {
    let mut record = existing.cloned().unwrap_or_default();
    match event.kind {
        EventKind::Registration => {
            record.registered = true;
            (record, Outcome::Registered)
        }
        EventKind::FirstDeposit | EventKind::RecurringDeposit => {
            // The running total must stay finite to round-trip through JSON.
            let Some((amount, total_deposit)) = event
                .deposit_amount()
                .map(|amount| (amount, record.total_deposit + amount))
                .filter(|(_, total)| total.is_finite())
            else {
                return (
                    record,
                    Outcome::InvalidAmount {
                        amount: event.amount.clone(),
                    },
                );
            };
            record.registered = true;
            record.total_deposit = total_deposit;

            // Every deposit that leaves the account at or above the threshold
            // pays out, not only the one that crosses it.
            let awarded = if record.is_qualified() {
                PREDICTIONS_AWARDED
            } else {
                0
            };
            record.predictions_left = record.predictions_left.saturating_add(awarded);
            let total_deposit = record.total_deposit;
            (
                record,
                Outcome::Deposited {
                    amount,
                    total_deposit,
                    awarded,
                },
            )
        }
        EventKind::Unknown => (
            record,
            Outcome::Ignored {
                event: event.raw_kind.clone(),
            },
        ),
    }
}
