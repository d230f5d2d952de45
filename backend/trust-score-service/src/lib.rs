//! Trust score service
//!
//! Organizer reputation: the trust score engine, badge classification,
//! the organizer trust profile, interaction recording that keeps scores
//! current, and the periodic recompute job.

pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod services;

pub use config::Config;
pub use error::{Result, TrustScoreError};
pub use jobs::{BatchJobStats, TrustBatchConfig, TrustBatchJob};
pub use services::{
    badge, InteractionService, LikeState, OrganizerTrustProfile, SaveState, TrustBadge,
    TrustProfileService, TrustScoreEngine,
};
