use funnel_types::{Consumption, UserRecord};

/// Spends one credit from `record` if it exists and has any left.
///
/// Returns the record to persist (only on success) and the outcome.
pub fn spend(record: Option<UserRecord>) -> (Option<UserRecord>, Consumption) {
    let Some(mut record) = record else {
        return (None, Consumption::NotFound);
    };
    if !record.has_credits() {
        return (None, Consumption::NoCredits);
    }
    record.predictions_left -= 1;
    let predictions_left = record.predictions_left;
    (Some(record), Consumption::Spent { predictions_left })
}
