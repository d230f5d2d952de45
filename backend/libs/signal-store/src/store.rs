use crate::error::StoreResult;
use crate::models::{
    Event, EventInteraction, LedgerEntry, NewInteraction, Organizer, RsvpStatus, RsvpWrite,
    TrustScore, TrustSignals, User, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Read side of the signal store plus the single trust score write path.
///
/// Implementations bound every call with a timeout; expiry is reported as
/// [`crate::StoreError::Timeout`], never as an empty result.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;

    async fn find_organizer(&self, organizer_id: Uuid) -> StoreResult<Option<Organizer>>;

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    /// Every rankable event, in a stable enumeration order (created_at, id).
    async fn list_events(&self) -> StoreResult<Vec<Event>>;

    /// Lifetime interaction rows for a user (volume, not distinct events).
    async fn count_interactions(&self, user_id: Uuid) -> StoreResult<i64>;

    /// Organizer ids whose owning user is followed by `user_id`.
    async fn followed_organizer_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Categories of events the user holds an RSVP for.
    async fn attended_categories(&self, user_id: Uuid) -> StoreResult<Vec<String>>;

    /// Confirmed RSVP count per event; events without RSVPs may be absent.
    async fn confirmed_rsvp_counts(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>>;

    /// Persisted trust score per organizer; unknown organizers are absent.
    async fn organizer_trust_scores(
        &self,
        organizer_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, i32>>;

    async fn follower_count(&self, user_id: Uuid) -> StoreResult<i64>;

    /// Page of organizer user ids ordered ascending, strictly after `after`.
    async fn organizer_user_ids(&self, after: Option<Uuid>, limit: i64) -> StoreResult<Vec<Uuid>>;

    /// Open a unit of work that serialises trust computations for `user_id`.
    ///
    /// Concurrent sessions for the same user wait for each other; sessions
    /// for different users are independent. Dropping a session without
    /// [`TrustSession::commit`] discards its writes.
    async fn begin_trust_session(&self, user_id: Uuid) -> StoreResult<Box<dyn TrustSession>>;
}

/// Per-user serialised read/write scope for the trust score engine.
#[async_trait]
pub trait TrustSession: Send {
    /// Snapshot of all signals; `None` when the user or its organizer is missing.
    /// `recent_since` is the start of the recent-RSVP window.
    async fn load_signals(&mut self, recent_since: DateTime<Utc>)
        -> StoreResult<Option<TrustSignals>>;

    /// Append a ledger row unless `reason` was already granted to this user.
    /// Returns the new row, or `None` when it already existed.
    async fn append_ledger_once(&mut self, reason: &str, delta: i32)
        -> StoreResult<Option<LedgerEntry>>;

    /// Write the organizer's score, checking the version read in `load_signals`.
    async fn persist_score(
        &mut self,
        organizer_id: Uuid,
        current: TrustScore,
        value: i32,
    ) -> StoreResult<TrustScore>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Write paths for behavioural signals produced by user actions.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait InteractionWriter: Send + Sync {
    async fn record_interaction(&self, interaction: NewInteraction)
        -> StoreResult<EventInteraction>;

    /// Update-in-place RSVP. Appends an `rsvp` interaction row in the same
    /// transaction whenever the RSVP is created or its status changes.
    async fn upsert_rsvp(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RsvpStatus,
    ) -> StoreResult<RsvpWrite>;

    /// Toggle a saved item; returns `true` when the event is now saved.
    /// Saving appends a `saved` interaction row.
    async fn toggle_saved(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool>;

    /// Toggle a like on an event; returns `true` when the like now exists.
    async fn toggle_like(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool>;
}
