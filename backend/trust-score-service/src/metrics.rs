/// Prometheus metrics for trust score computation
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Histogram, IntCounterVec,
};

lazy_static! {
    /// Trust computations (labels: outcome=scored|missing|error)
    pub static ref TRUST_COMPUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trust_score_computations_total",
        "Total trust score computations by outcome",
        &["outcome"]
    )
    .expect("trust_score_computations_total registration");

    /// One-time ledger bonuses granted (labels: reason)
    pub static ref TRUST_BONUSES_AWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trust_score_bonuses_awarded_total",
        "One-time trust bonuses appended to the ledger",
        &["reason"]
    )
    .expect("trust_score_bonuses_awarded_total registration");

    /// Wall time of a full compute, including the store session
    pub static ref TRUST_COMPUTE_DURATION_SECONDS: Histogram = register_histogram!(
        "trust_score_compute_duration_seconds",
        "Trust score compute latency",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("trust_score_compute_duration_seconds registration");
}

pub fn record_outcome(outcome: &str) {
    TRUST_COMPUTATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_bonus(reason: &str) {
    TRUST_BONUSES_AWARDED_TOTAL.with_label_values(&[reason]).inc();
}
