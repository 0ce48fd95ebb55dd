use funnel_types::{AdminCheck, Consumption, GateStatus, Outcome};
use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LATENCY_BUCKET_COUNT: usize = 12;
const LATENCY_BUCKETS_MS: [u64; LATENCY_BUCKET_COUNT] =
    [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000];

#[derive(Clone, Debug, Serialize)]
pub struct LatencySnapshot {
    pub buckets_ms: Vec<u64>,
    pub counts: Vec<u64>,
    pub overflow: u64,
    pub count: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

#[derive(Default)]
struct LatencyMetrics {
    buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
    overflow: AtomicU64,
    count: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyMetrics {
    fn record(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);

        match LATENCY_BUCKETS_MS.iter().position(|bucket| ms <= *bucket) {
            Some(idx) => self.buckets[idx].fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let avg_ms = if count > 0 {
            total_ms as f64 / count as f64
        } else {
            0.0
        };

        LatencySnapshot {
            buckets_ms: LATENCY_BUCKETS_MS.to_vec(),
            counts: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            overflow: self.overflow.load(Ordering::Relaxed),
            count,
            avg_ms,
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FunnelMetricsSnapshot {
    pub postback_applied: u64,
    pub postback_ignored: u64,
    pub postback_invalid_amount: u64,
    pub postback_rejected: u64,
    pub gate_invalid_id: u64,
    pub gate_not_registered: u64,
    pub gate_needs_deposit: u64,
    pub gate_needs_redeposit: u64,
    pub gate_logged_in: u64,
    pub consume_spent: u64,
    pub consume_not_found: u64,
    pub consume_no_credits: u64,
    pub admin_rejected: u64,
    pub admin_not_configured: u64,
    pub store_failures: u64,
    pub reject_rate_limit: u64,
    pub reject_body_limit: u64,
}

/// Counters for every ledger outcome the API reports, plus handler latency.
#[derive(Default)]
pub struct FunnelMetrics {
    postback_applied: AtomicU64,
    postback_ignored: AtomicU64,
    postback_invalid_amount: AtomicU64,
    postback_rejected: AtomicU64,
    gate: [AtomicU64; 5],
    consume_spent: AtomicU64,
    consume_not_found: AtomicU64,
    consume_no_credits: AtomicU64,
    admin_rejected: AtomicU64,
    admin_not_configured: AtomicU64,
    store_failures: AtomicU64,
    reject_rate_limit: AtomicU64,
    reject_body_limit: AtomicU64,
    postback_latency: LatencyMetrics,
    verify_latency: LatencyMetrics,
    consume_latency: LatencyMetrics,
}

fn gate_index(status: GateStatus) -> usize {
    match status {
        GateStatus::InvalidId => 0,
        GateStatus::NotRegistered => 1,
        GateStatus::NeedsDeposit => 2,
        GateStatus::NeedsRedeposit => 3,
        GateStatus::LoggedIn => 4,
    }
}

impl FunnelMetrics {
    pub fn record_postback(&self, outcome: &Outcome, duration: Duration) {
        let counter = match outcome {
            Outcome::Registered | Outcome::Deposited { .. } => &self.postback_applied,
            Outcome::Ignored { .. } => &self.postback_ignored,
            Outcome::InvalidAmount { .. } => &self.postback_invalid_amount,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.postback_latency.record(duration);
    }

    pub fn inc_postback_rejected(&self) {
        self.postback_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gate(&self, status: GateStatus, duration: Duration) {
        self.gate[gate_index(status)].fetch_add(1, Ordering::Relaxed);
        self.verify_latency.record(duration);
    }

    pub fn record_consume(&self, consumption: &Consumption, duration: Duration) {
        let counter = match consumption {
            Consumption::Spent { .. } => &self.consume_spent,
            Consumption::NotFound => &self.consume_not_found,
            Consumption::NoCredits => &self.consume_no_credits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.consume_latency.record(duration);
    }

    pub fn record_admin(&self, check: AdminCheck) {
        match check {
            AdminCheck::Accepted => {}
            AdminCheck::Rejected => {
                self.admin_rejected.fetch_add(1, Ordering::Relaxed);
            }
            AdminCheck::NotConfigured => {
                self.admin_not_configured.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn inc_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reject_rate_limit(&self) {
        self.reject_rate_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reject_body_limit(&self) {
        self.reject_body_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FunnelMetricsSnapshot {
        let gate = |status| self.gate[gate_index(status)].load(Ordering::Relaxed);
        FunnelMetricsSnapshot {
            postback_applied: self.postback_applied.load(Ordering::Relaxed),
            postback_ignored: self.postback_ignored.load(Ordering::Relaxed),
            postback_invalid_amount: self.postback_invalid_amount.load(Ordering::Relaxed),
            postback_rejected: self.postback_rejected.load(Ordering::Relaxed),
            gate_invalid_id: gate(GateStatus::InvalidId),
            gate_not_registered: gate(GateStatus::NotRegistered),
            gate_needs_deposit: gate(GateStatus::NeedsDeposit),
            gate_needs_redeposit: gate(GateStatus::NeedsRedeposit),
            gate_logged_in: gate(GateStatus::LoggedIn),
            consume_spent: self.consume_spent.load(Ordering::Relaxed),
            consume_not_found: self.consume_not_found.load(Ordering::Relaxed),
            consume_no_credits: self.consume_no_credits.load(Ordering::Relaxed),
            admin_rejected: self.admin_rejected.load(Ordering::Relaxed),
            admin_not_configured: self.admin_not_configured.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            reject_rate_limit: self.reject_rate_limit.load(Ordering::Relaxed),
            reject_body_limit: self.reject_body_limit.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition of every counter and latency histogram.
    pub fn render_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let counters = [
            ("funnel_postback_applied_total", snapshot.postback_applied),
            ("funnel_postback_ignored_total", snapshot.postback_ignored),
            (
                "funnel_postback_invalid_amount_total",
                snapshot.postback_invalid_amount,
            ),
            ("funnel_postback_rejected_total", snapshot.postback_rejected),
            ("funnel_gate_invalid_id_total", snapshot.gate_invalid_id),
            ("funnel_gate_not_registered_total", snapshot.gate_not_registered),
            ("funnel_gate_needs_deposit_total", snapshot.gate_needs_deposit),
            (
                "funnel_gate_needs_redeposit_total",
                snapshot.gate_needs_redeposit,
            ),
            ("funnel_gate_logged_in_total", snapshot.gate_logged_in),
            ("funnel_consume_spent_total", snapshot.consume_spent),
            ("funnel_consume_not_found_total", snapshot.consume_not_found),
            ("funnel_consume_no_credits_total", snapshot.consume_no_credits),
            ("funnel_admin_rejected_total", snapshot.admin_rejected),
            (
                "funnel_admin_not_configured_total",
                snapshot.admin_not_configured,
            ),
            ("funnel_store_failures_total", snapshot.store_failures),
            ("funnel_http_reject_rate_limit_total", snapshot.reject_rate_limit),
            ("funnel_http_reject_body_limit_total", snapshot.reject_body_limit),
        ];
        for (name, value) in counters {
            append_counter(&mut out, name, value);
        }

        append_histogram(
            &mut out,
            "funnel_postback_latency_ms",
            &self.postback_latency.snapshot(),
        );
        append_histogram(
            &mut out,
            "funnel_verify_latency_ms",
            &self.verify_latency.snapshot(),
        );
        append_histogram(
            &mut out,
            "funnel_consume_latency_ms",
            &self.consume_latency.snapshot(),
        );
        out
    }
}

fn append_counter(out: &mut String, name: &str, value: u64) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn append_histogram(out: &mut String, name: &str, snapshot: &LatencySnapshot) {
    let _ = writeln!(out, "# TYPE {name} histogram");
    let mut cumulative = 0u64;
    for (bucket, count) in snapshot.buckets_ms.iter().zip(snapshot.counts.iter()) {
        cumulative = cumulative.saturating_add(*count);
        let _ = writeln!(out, "{name}_bucket{{le=\"{bucket}\"}} {cumulative}");
    }
    cumulative = cumulative.saturating_add(snapshot.overflow);
    let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(out, "{name}_count {}", snapshot.count);
    let sum = snapshot.avg_ms * snapshot.count as f64;
    let _ = writeln!(out, "{name}_sum {sum}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let latency = LatencyMetrics::default();
        latency.record(Duration::from_millis(3));
        latency.record(Duration::from_millis(40));
        latency.record(Duration::from_secs(10));

        let snapshot = latency.snapshot();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.counts[2], 1);
        assert_eq!(snapshot.counts[5], 1);
        assert_eq!(snapshot.overflow, 1);
        assert_eq!(snapshot.max_ms, 10_000);
    }

    #[test]
    fn test_render_prometheus() {
        let metrics = FunnelMetrics::default();
        metrics.record_postback(&Outcome::Registered, Duration::from_millis(1));
        metrics.record_gate(GateStatus::LoggedIn, Duration::from_millis(1));
        metrics.record_gate(GateStatus::LoggedIn, Duration::from_millis(1));
        metrics.record_consume(&Consumption::NoCredits, Duration::from_millis(1));
        metrics.record_admin(AdminCheck::Rejected);
        metrics.record_admin(AdminCheck::Accepted);

        let body = metrics.render_prometheus();
        assert!(body.contains("funnel_postback_applied_total 1\n"));
        assert!(body.contains("funnel_gate_logged_in_total 2\n"));
        assert!(body.contains("funnel_consume_no_credits_total 1\n"));
        assert!(body.contains("funnel_admin_rejected_total 1\n"));
        assert!(body.contains("funnel_verify_latency_ms_bucket{le=\"+Inf\"} 2\n"));
        assert!(body.contains("funnel_consume_latency_ms_count 1\n"));
    }
}
