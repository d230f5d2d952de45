// ============================================
// Trust Batch Job
// ============================================
//
// Recomputes every organizer's trust score so that signals which change
// without a triggering action (RSVPs aging out of the 30-day window, flags
// being resolved, account status changes) reach the persisted score.
// Designed to run as a Kubernetes CronJob (TRUST_BATCH_RUN_ONCE=true) or as
// a long-lived process.
//
// Workflow:
// 1. Page through organizer user ids in ascending order
// 2. Recompute each score under a per-call timeout, retrying retryable
//    failures with backoff
// 3. Sleep between pages to spread the load on the signal store

use crate::error::{Result, TrustScoreError};
use crate::services::TrustScoreEngine;
use chrono::{DateTime, Utc};
use resilience::{with_retry_if, with_timeout_result, RetryConfig};
use serde::Deserialize;
use signal_store::{SignalStore, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

fn default_batch_size() -> u32 {
    100
}

fn default_delay_ms() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_compute_timeout_ms() -> u64 {
    resilience::batch_job_config().timeout.duration.as_millis() as u64
}

fn default_run_once() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    3600
}

/// Batch job configuration (`TRUST_BATCH_*` environment variables)
#[derive(Debug, Clone, Deserialize)]
pub struct TrustBatchConfig {
    /// Organizers fetched per page
    #[serde(rename = "size", default = "default_batch_size")]
    pub batch_size: u32,
    /// Delay between pages
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Retries per organizer for retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on one organizer's recompute attempt
    #[serde(default = "default_compute_timeout_ms")]
    pub compute_timeout_ms: u64,
    /// Whether to exit after one pass
    #[serde(default = "default_run_once")]
    pub run_once: bool,
    /// Interval between full passes (if not run_once)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for TrustBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_ms: default_delay_ms(),
            max_retries: default_max_retries(),
            compute_timeout_ms: default_compute_timeout_ms(),
            run_once: default_run_once(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl TrustBatchConfig {
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::prefixed("TRUST_BATCH_").from_env::<TrustBatchConfig>()
    }

    fn retry_config(&self) -> RetryConfig {
        let mut retry = resilience::batch_job_config()
            .retry
            .unwrap_or_default();
        retry.max_retries = self.max_retries;
        retry
    }

    fn compute_timeout(&self) -> Duration {
        Duration::from_millis(self.compute_timeout_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchJobStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub organizers_processed: u32,
    pub organizers_succeeded: u32,
    pub organizers_failed: u32,
    pub total_duration_ms: u64,
}

pub struct TrustBatchJob {
    config: TrustBatchConfig,
    store: Arc<dyn SignalStore>,
    engine: Arc<TrustScoreEngine>,
}

impl TrustBatchJob {
    pub fn new(
        config: TrustBatchConfig,
        store: Arc<dyn SignalStore>,
        engine: Arc<TrustScoreEngine>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
        }
    }

    pub async fn run(&self) -> Result<BatchJobStats> {
        loop {
            let stats = self.run_single_pass().await?;

            info!(
                processed = stats.organizers_processed,
                succeeded = stats.organizers_succeeded,
                failed = stats.organizers_failed,
                duration_ms = stats.total_duration_ms,
                "Trust batch pass completed"
            );

            if self.config.run_once {
                return Ok(stats);
            }

            info!(
                interval_secs = self.config.interval_secs,
                "Sleeping until next pass"
            );
            sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }

    /// One pass over every organizer. Only a failure to list organizers
    /// aborts the pass; per-organizer failures are counted and logged.
    pub async fn run_single_pass(&self) -> Result<BatchJobStats> {
        let start_time = Instant::now();
        let mut stats = BatchJobStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Starting trust batch pass"
        );

        let retry = self.config.retry_config();
        let compute_timeout = self.config.compute_timeout();
        let page_size = self.config.batch_size.max(1) as i64;
        let mut cursor: Option<Uuid> = None;

        loop {
            let page = with_retry_if(
                retry.clone(),
                || self.store.organizer_user_ids(cursor, page_size),
                |e: &StoreError| e.is_retryable(),
            )
            .await
            .map_err(|e| TrustScoreError::from(e.into_inner()))?;

            let Some(last) = page.last().copied() else {
                break;
            };

            for user_id in &page {
                stats.organizers_processed += 1;

                let outcome = with_retry_if(
                    retry.clone(),
                    move || async move {
                        with_timeout_result(compute_timeout, self.engine.compute(*user_id))
                            .await
                            .map_err(|e| {
                                e.into_inner_or(|d| TrustScoreError::Store(StoreError::Timeout(d)))
                            })
                    },
                    |e: &TrustScoreError| e.is_retryable(),
                )
                .await;

                match outcome {
                    Ok(_) => stats.organizers_succeeded += 1,
                    Err(e) => {
                        stats.organizers_failed += 1;
                        error!(
                            user_id = %user_id,
                            error = %e,
                            "Failed to recompute trust score"
                        );
                    }
                }
            }

            if (page.len() as i64) < page_size {
                break;
            }
            cursor = Some(last);

            if self.config.delay_ms > 0 {
                sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        Ok(stats)
    }
}
