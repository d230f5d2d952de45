use crate::error::Result;
use crate::services::badge::{badge, TrustBadge};
use crate::services::trust_engine::TrustScoreEngine;
use serde::Serialize;
use signal_store::SignalStore;
use std::sync::Arc;
use uuid::Uuid;

/// Trust summary rendered on an organizer's profile
#[derive(Debug, Clone, Serialize)]
pub struct OrganizerTrustProfile {
    pub user_id: Uuid,
    pub score: i32,
    pub badge: TrustBadge,
    pub follower_count: i64,
}

pub struct TrustProfileService {
    store: Arc<dyn SignalStore>,
    engine: Arc<TrustScoreEngine>,
}

impl TrustProfileService {
    pub fn new(store: Arc<dyn SignalStore>, engine: Arc<TrustScoreEngine>) -> Self {
        Self { store, engine }
    }

    /// Score is recomputed on every call so the badge never lags the signals.
    pub async fn organizer_profile(&self, user_id: Uuid) -> Result<OrganizerTrustProfile> {
        let score = self.engine.compute(user_id).await?;
        let follower_count = self.store.follower_count(user_id).await?;

        Ok(OrganizerTrustProfile {
            user_id,
            score,
            badge: badge(score),
            follower_count,
        })
    }
}
