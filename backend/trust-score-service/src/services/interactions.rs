//! User actions on events
//!
//! Each action appends to the behavioural log the ranking engine counts, and
//! the ones that feed trust signals (RSVPs, likes) recompute the affected
//! organizer's score once the write has committed. A failed recompute does
//! not fail the action: the write stands and the score stays stale until the
//! next compute or batch pass.

use crate::error::{Result, TrustScoreError};
use crate::services::trust_engine::TrustScoreEngine;
use signal_store::{
    Event, EventInteraction, InteractionKind, InteractionWriter, NewInteraction, RsvpStatus,
    RsvpWrite, SignalStore,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Saved,
    Unsaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    Liked,
    Unliked,
}

pub struct InteractionService {
    store: Arc<dyn SignalStore>,
    writer: Arc<dyn InteractionWriter>,
    engine: Arc<TrustScoreEngine>,
}

impl InteractionService {
    pub fn new(
        store: Arc<dyn SignalStore>,
        writer: Arc<dyn InteractionWriter>,
        engine: Arc<TrustScoreEngine>,
    ) -> Self {
        Self {
            store,
            writer,
            engine,
        }
    }

    async fn require_event(&self, event_id: Uuid) -> Result<Event> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(TrustScoreError::EventNotFound(event_id))
    }

    /// Recompute after a committed write; failures are logged, not returned.
    async fn refresh_score(&self, user_id: Uuid, action: &'static str) -> Option<i32> {
        match self.engine.compute(user_id).await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    action,
                    error = %e,
                    "Trust score recompute failed, score is stale"
                );
                None
            }
        }
    }

    pub async fn record_view(&self, user_id: Uuid, event_id: Uuid) -> Result<EventInteraction> {
        self.require_event(event_id).await?;

        let row = self
            .writer
            .record_interaction(NewInteraction {
                user_id,
                event_id,
                kind: InteractionKind::Clicked,
            })
            .await?;

        debug!(user_id = %user_id, event_id = %event_id, "Event view recorded");
        Ok(row)
    }

    pub async fn toggle_save(&self, user_id: Uuid, event_id: Uuid) -> Result<SaveState> {
        self.require_event(event_id).await?;

        let saved = self.writer.toggle_saved(user_id, event_id).await?;
        Ok(if saved {
            SaveState::Saved
        } else {
            SaveState::Unsaved
        })
    }

    /// Create or update the user's RSVP, then recompute the user's own trust score.
    ///
    /// Returns the write outcome even when the recompute fails.
    pub async fn rsvp(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RsvpStatus,
    ) -> Result<RsvpWrite> {
        self.require_event(event_id).await?;

        let write = self.writer.upsert_rsvp(user_id, event_id, status).await?;
        let score = self.refresh_score(user_id, "rsvp").await;

        info!(
            user_id = %user_id,
            event_id = %event_id,
            status = status.as_str(),
            outcome = ?write,
            trust_score = ?score,
            "RSVP recorded"
        );
        Ok(write)
    }

    /// Toggle a like, then recompute the trust score of the event's organizer.
    ///
    /// Returns the new like state even when the organizer lookup or the
    /// recompute fails.
    pub async fn toggle_like(&self, user_id: Uuid, event_id: Uuid) -> Result<LikeState> {
        let event = self.require_event(event_id).await?;

        let liked = self.writer.toggle_like(user_id, event_id).await?;

        match self.store.find_organizer(event.organizer_id).await {
            Ok(Some(organizer)) => {
                if let Some(score) = self.refresh_score(organizer.user_id, "like").await {
                    debug!(
                        organizer_id = %organizer.id,
                        trust_score = score,
                        "Organizer trust score refreshed after like"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                organizer_id = %event.organizer_id,
                error = %e,
                "Organizer lookup failed after like, score is stale"
            ),
        }

        Ok(if liked {
            LikeState::Liked
        } else {
            LikeState::Unliked
        })
    }
}
