//! In-memory signal store
//!
//! Mirrors the PostgreSQL adapter's semantics (per-user serialised trust
//! sessions, awarded-once ledger, optimistic score versions) for tests and
//! local development. `set_available(false)` and `set_latency` inject the
//! failures callers must propagate.

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Event, EventInteraction, FlagStatus, LedgerEntry, NewInteraction, Organizer, Rsvp,
    RsvpStatus, RsvpWrite, TrustScore, TrustSignals, User, UserProfile,
};
use crate::store::{InteractionWriter, SignalStore, TrustSession};
use crate::InteractionKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use resilience::with_timeout;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, UserProfile>,
    organizers: HashMap<Uuid, Organizer>,
    events: HashMap<Uuid, Event>,
    interactions: Vec<EventInteraction>,
    rsvps: HashMap<(Uuid, Uuid), Rsvp>,
    /// (reviewer, rating)
    reviews: Vec<(Uuid, Option<i32>)>,
    /// (user, event)
    likes: HashSet<(Uuid, Uuid)>,
    saved: HashSet<(Uuid, Uuid)>,
    /// (follower, followee)
    follows: HashSet<(Uuid, Uuid)>,
    /// (event, is_cancelled)
    occurrences: Vec<(Uuid, bool)>,
    flags: Vec<(Uuid, FlagStatus)>,
    ledger: Vec<LedgerEntry>,
}

impl State {
    fn organizer_by_user(&self, user_id: Uuid) -> Option<&Organizer> {
        self.organizers.values().find(|o| o.user_id == user_id)
    }

    fn events_of(&self, organizer_id: Uuid) -> HashSet<Uuid> {
        self.events
            .values()
            .filter(|e| e.organizer_id == organizer_id)
            .map(|e| e.id)
            .collect()
    }

    fn signals(&self, user_id: Uuid, recent_since: DateTime<Utc>) -> Option<TrustSignals> {
        let user = self.users.get(&user_id)?.clone();
        let organizer = self.organizer_by_user(user_id)?.clone();
        let own_events = self.events_of(organizer.id);

        let mut ledger: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        ledger.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let user_rsvps = self.rsvps.values().filter(|r| r.user_id == user_id);

        Some(TrustSignals {
            confirmed_attendances: user_rsvps
                .clone()
                .filter(|r| r.status == RsvpStatus::Confirmed)
                .count() as i64,
            recent_rsvps: user_rsvps.filter(|r| r.created_at >= recent_since).count() as i64,
            ratings: self
                .reviews
                .iter()
                .filter(|(reviewer, _)| *reviewer == user_id)
                .filter_map(|(_, rating)| *rating)
                .collect(),
            likes_on_events: self
                .likes
                .iter()
                .filter(|(_, event)| own_events.contains(event))
                .count() as i64,
            cancelled_occurrences: self
                .occurrences
                .iter()
                .filter(|(event, cancelled)| *cancelled && own_events.contains(event))
                .count() as i64,
            resolved_flags: self
                .flags
                .iter()
                .filter(|(event, status)| {
                    *status == FlagStatus::Resolved && own_events.contains(event)
                })
                .count() as i64,
            user,
            organizer,
            ledger,
        })
    }
}

/// Signal store backed by process memory
#[derive(Clone)]
pub struct InMemorySignalStore {
    state: Arc<RwLock<State>>,
    user_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    available: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
    timeout: Duration,
}

impl Default for InMemorySignalStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl InMemorySignalStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            user_locks: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
            latency_ms: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    /// When `false`, every call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Artificial delay added to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn gate(&self) -> StoreResult<()> {
        gate(&self.available, &self.latency_ms, self.timeout).await
    }

    async fn read<T>(&self, op: impl FnOnce(&State) -> T) -> StoreResult<T> {
        self.gate().await?;
        let state = self.state.read().await;
        Ok(op(&state))
    }

    async fn write<T>(&self, op: impl FnOnce(&mut State) -> T) -> StoreResult<T> {
        self.gate().await?;
        let mut state = self.state.write().await;
        Ok(op(&mut state))
    }

    // Seeding

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn insert_profile(&self, profile: UserProfile) {
        self.state
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile);
    }

    pub async fn insert_organizer(&self, organizer: Organizer) {
        self.state
            .write()
            .await
            .organizers
            .insert(organizer.id, organizer);
    }

    pub async fn insert_event(&self, event: Event) {
        self.state.write().await.events.insert(event.id, event);
    }

    /// Seed an RSVP row directly, bypassing the interaction log.
    pub async fn add_rsvp(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RsvpStatus,
        created_at: DateTime<Utc>,
    ) {
        self.state.write().await.rsvps.insert(
            (user_id, event_id),
            Rsvp {
                user_id,
                event_id,
                status,
                created_at,
                updated_at: created_at,
            },
        );
    }

    pub async fn add_review(&self, user_id: Uuid, rating: Option<i32>) {
        self.state.write().await.reviews.push((user_id, rating));
    }

    pub async fn add_like(&self, user_id: Uuid, event_id: Uuid) {
        self.state.write().await.likes.insert((user_id, event_id));
    }

    pub async fn add_follow(&self, follower_id: Uuid, followee_id: Uuid) {
        self.state
            .write()
            .await
            .follows
            .insert((follower_id, followee_id));
    }

    pub async fn add_occurrence(&self, event_id: Uuid, is_cancelled: bool) {
        self.state
            .write()
            .await
            .occurrences
            .push((event_id, is_cancelled));
    }

    pub async fn add_flag(&self, event_id: Uuid, status: FlagStatus) {
        self.state.write().await.flags.push((event_id, status));
    }

    /// Append `count` click interactions for `user_id` on `event_id`.
    pub async fn add_interactions(&self, user_id: Uuid, event_id: Uuid, count: usize) {
        let now = Utc::now();
        let mut state = self.state.write().await;
        for _ in 0..count {
            state.interactions.push(
                NewInteraction {
                    user_id,
                    event_id,
                    kind: InteractionKind::Clicked,
                }
                .into_row(now),
            );
        }
    }

    // Inspection

    pub async fn ledger_for(&self, user_id: Uuid) -> Vec<LedgerEntry> {
        self.state
            .read()
            .await
            .ledger
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn organizer(&self, organizer_id: Uuid) -> Option<Organizer> {
        self.state.read().await.organizers.get(&organizer_id).cloned()
    }

    pub async fn interactions_for(&self, user_id: Uuid) -> Vec<EventInteraction> {
        self.state
            .read()
            .await
            .interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn rsvp(&self, user_id: Uuid, event_id: Uuid) -> Option<Rsvp> {
        self.state
            .read()
            .await
            .rsvps
            .get(&(user_id, event_id))
            .cloned()
    }
}

async fn gate(available: &AtomicBool, latency_ms: &AtomicU64, timeout: Duration) -> StoreResult<()> {
    if !available.load(Ordering::SeqCst) {
        return Err(StoreError::Unavailable(
            "in-memory store switched off".to_string(),
        ));
    }

    let latency = latency_ms.load(Ordering::SeqCst);
    if latency > 0 {
        with_timeout(timeout, tokio::time::sleep(Duration::from_millis(latency)))
            .await
            .map_err(|_| StoreError::Timeout(timeout))?;
    }

    Ok(())
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.read(|s| s.users.get(&user_id).cloned()).await
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        self.read(|s| s.profiles.get(&user_id).cloned()).await
    }

    async fn find_organizer(&self, organizer_id: Uuid) -> StoreResult<Option<Organizer>> {
        self.read(|s| s.organizers.get(&organizer_id).cloned())
            .await
    }

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        self.read(|s| s.events.get(&event_id).cloned()).await
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        self.read(|s| {
            let mut events: Vec<Event> = s.events.values().cloned().collect();
            events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            events
        })
        .await
    }

    async fn count_interactions(&self, user_id: Uuid) -> StoreResult<i64> {
        self.read(|s| s.interactions.iter().filter(|i| i.user_id == user_id).count() as i64)
            .await
    }

    async fn followed_organizer_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.read(|s| {
            s.follows
                .iter()
                .filter(|(follower, _)| *follower == user_id)
                .filter_map(|(_, followee)| s.organizer_by_user(*followee).map(|o| o.id))
                .collect()
        })
        .await
    }

    async fn attended_categories(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        self.read(|s| {
            let categories: HashSet<String> = s
                .rsvps
                .values()
                .filter(|r| r.user_id == user_id && r.status != RsvpStatus::Cancelled)
                .filter_map(|r| s.events.get(&r.event_id))
                .filter_map(|e| e.category.clone())
                .collect();
            categories.into_iter().collect()
        })
        .await
    }

    async fn confirmed_rsvp_counts(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        let wanted: HashSet<Uuid> = event_ids.iter().copied().collect();
        self.read(move |s| {
            let mut counts = HashMap::new();
            for rsvp in s.rsvps.values() {
                if rsvp.status == RsvpStatus::Confirmed && wanted.contains(&rsvp.event_id) {
                    *counts.entry(rsvp.event_id).or_insert(0) += 1;
                }
            }
            counts
        })
        .await
    }

    async fn organizer_trust_scores(
        &self,
        organizer_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, i32>> {
        let wanted: Vec<Uuid> = organizer_ids.to_vec();
        self.read(move |s| {
            wanted
                .into_iter()
                .filter_map(|id| s.organizers.get(&id).map(|o| (id, o.trust_score.value())))
                .collect()
        })
        .await
    }

    async fn follower_count(&self, user_id: Uuid) -> StoreResult<i64> {
        self.read(|s| {
            s.follows
                .iter()
                .filter(|(_, followee)| *followee == user_id)
                .count() as i64
        })
        .await
    }

    async fn organizer_user_ids(&self, after: Option<Uuid>, limit: i64) -> StoreResult<Vec<Uuid>> {
        self.read(|s| {
            let mut ids: Vec<Uuid> = s
                .organizers
                .values()
                .map(|o| o.user_id)
                .filter(|id| after.map_or(true, |a| *id > a))
                .collect();
            ids.sort();
            ids.truncate(limit.max(0) as usize);
            ids
        })
        .await
    }

    async fn begin_trust_session(&self, user_id: Uuid) -> StoreResult<Box<dyn TrustSession>> {
        self.gate().await?;

        let lock = self
            .user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // Bounded like the advisory lock wait in the PostgreSQL adapter
        let guard = with_timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?;

        Ok(Box::new(InMemoryTrustSession {
            store: self.clone(),
            user_id,
            staged_ledger: Vec::new(),
            staged_score: None,
            _guard: guard,
        }))
    }
}

/// Session holding the user's lock; writes are applied on commit only.
struct InMemoryTrustSession {
    store: InMemorySignalStore,
    user_id: Uuid,
    staged_ledger: Vec<LedgerEntry>,
    staged_score: Option<(Uuid, TrustScore)>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl TrustSession for InMemoryTrustSession {
    async fn load_signals(
        &mut self,
        recent_since: DateTime<Utc>,
    ) -> StoreResult<Option<TrustSignals>> {
        let user_id = self.user_id;
        self.store
            .read(|s| s.signals(user_id, recent_since))
            .await
    }

    async fn append_ledger_once(
        &mut self,
        reason: &str,
        delta: i32,
    ) -> StoreResult<Option<LedgerEntry>> {
        let user_id = self.user_id;
        let exists = self
            .store
            .read(|s| {
                s.ledger
                    .iter()
                    .any(|l| l.user_id == user_id && l.reason == reason)
            })
            .await?;

        if exists || self.staged_ledger.iter().any(|l| l.reason == reason) {
            return Ok(None);
        }

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            user_id,
            delta,
            reason: reason.to_string(),
            created_at: Utc::now(),
        };
        self.staged_ledger.push(entry.clone());
        Ok(Some(entry))
    }

    async fn persist_score(
        &mut self,
        organizer_id: Uuid,
        current: TrustScore,
        value: i32,
    ) -> StoreResult<TrustScore> {
        let stored = self
            .store
            .read(|s| s.organizers.get(&organizer_id).map(|o| o.trust_score))
            .await?;

        match stored {
            Some(score) if score.version() == current.version() => {
                let next = current.next(value);
                self.staged_score = Some((organizer_id, next));
                Ok(next)
            }
            _ => Err(StoreError::Conflict(format!(
                "organizer {} trust score changed since version {}",
                organizer_id,
                current.version()
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTrustSession {
            store,
            staged_ledger,
            staged_score,
            _guard,
            ..
        } = *self;

        store
            .write(move |s| {
                s.ledger.extend(staged_ledger);
                if let Some((organizer_id, score)) = staged_score {
                    if let Some(organizer) = s.organizers.get_mut(&organizer_id) {
                        organizer.trust_score = score;
                    }
                }
            })
            .await?;

        drop(_guard);
        Ok(())
    }
}

#[async_trait]
impl InteractionWriter for InMemorySignalStore {
    async fn record_interaction(
        &self,
        interaction: NewInteraction,
    ) -> StoreResult<EventInteraction> {
        self.write(|s| {
            let row = interaction.into_row(Utc::now());
            s.interactions.push(row.clone());
            row
        })
        .await
    }

    async fn upsert_rsvp(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RsvpStatus,
    ) -> StoreResult<RsvpWrite> {
        self.write(|s| {
            let now = Utc::now();
            let outcome = match s.rsvps.get_mut(&(user_id, event_id)) {
                None => {
                    s.rsvps.insert(
                        (user_id, event_id),
                        Rsvp {
                            user_id,
                            event_id,
                            status,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                    RsvpWrite::Created
                }
                Some(existing) if existing.status == status => RsvpWrite::Unchanged,
                Some(existing) => {
                    let previous = existing.status;
                    existing.status = status;
                    existing.updated_at = now;
                    RsvpWrite::Updated { previous }
                }
            };

            if outcome != RsvpWrite::Unchanged {
                s.interactions.push(
                    NewInteraction {
                        user_id,
                        event_id,
                        kind: InteractionKind::Rsvp,
                    }
                    .into_row(now),
                );
            }
            outcome
        })
        .await
    }

    async fn toggle_saved(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool> {
        self.write(|s| {
            if s.saved.remove(&(user_id, event_id)) {
                return false;
            }
            s.saved.insert((user_id, event_id));
            s.interactions.push(
                NewInteraction {
                    user_id,
                    event_id,
                    kind: InteractionKind::Saved,
                }
                .into_row(Utc::now()),
            );
            true
        })
        .await
    }

    async fn toggle_like(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool> {
        self.write(|s| {
            if s.likes.remove(&(user_id, event_id)) {
                false
            } else {
                s.likes.insert((user_id, event_id));
                true
            }
        })
        .await
    }
}
