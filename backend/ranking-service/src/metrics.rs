/// Prometheus metrics for feed ranking
use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// Ranking requests (labels: strategy=rule_based|learned|unknown, outcome=ok|<error kind>)
    pub static ref RANKING_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ranking_requests_total",
        "Total feed ranking requests",
        &["strategy", "outcome"]
    )
    .expect("ranking_requests_total registration");

    /// End-to-end ranking latency (labels: strategy)
    pub static ref RANKING_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "ranking_duration_seconds",
        "Feed ranking latency",
        &["strategy"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("ranking_duration_seconds registration");
}

pub fn record_request(strategy: &str, outcome: &str, duration_secs: f64) {
    RANKING_REQUESTS_TOTAL
        .with_label_values(&[strategy, outcome])
        .inc();
    RANKING_DURATION_SECONDS
        .with_label_values(&[strategy])
        .observe(duration_secs);
}
