pub mod trust_batch;

pub use trust_batch::{BatchJobStats, TrustBatchConfig, TrustBatchJob};
