//! PostgreSQL adapter for the signal store
//!
//! Trust sessions take a transaction-scoped advisory lock keyed by user id, so
//! the ledger check-then-append and the score write of concurrent recomputes
//! for the same user never interleave.

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AccountStatus, Event, EventInteraction, LedgerEntry, NewInteraction, Organizer, RsvpStatus,
    RsvpWrite, TrustScore, TrustSignals, User, UserProfile, UserRole, VerificationStatus,
};
use crate::store::{InteractionWriter, SignalStore, TrustSession};
use crate::EVENT_ENTITY_TYPE;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resilience::with_timeout_result;
use sqlx::migrate::Migrator;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Schema the adapter expects
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn timed<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout_result(limit, async { fut.await.map_err(StoreError::Database) })
        .await
        .map_err(|e| e.into_inner_or(StoreError::Timeout))
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    city: Option<String>,
    country: Option<String>,
    account_status: String,
    user_type: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            city: row.city,
            country: row.country,
            account_status: AccountStatus::parse_lenient(&row.account_status),
            role: UserRole::parse_lenient(&row.user_type),
        }
    }
}

#[derive(FromRow)]
struct OrganizerRow {
    id: Uuid,
    user_id: Uuid,
    verification_status: String,
    trust_score: i32,
    trust_score_version: i64,
}

impl From<OrganizerRow> for Organizer {
    fn from(row: OrganizerRow) -> Self {
        Organizer {
            id: row.id,
            user_id: row.user_id,
            verification_status: VerificationStatus::parse_lenient(&row.verification_status),
            trust_score: TrustScore::restore(row.trust_score, row.trust_score_version),
        }
    }
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    organizer_id: Uuid,
    name: String,
    category: Option<String>,
    location: Option<String>,
    celebrity: Option<String>,
    is_free: bool,
    is_paid: bool,
    max_capacity: Option<i32>,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            organizer_id: row.organizer_id,
            name: row.name,
            category: row.category,
            location: row.location,
            celebrity: row.celebrity,
            is_free: row.is_free,
            is_paid: row.is_paid,
            max_capacity: row.max_capacity,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct LedgerRow {
    id: Uuid,
    user_id: Uuid,
    score: i32,
    reason: String,
    created_at: DateTime<Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        LedgerEntry {
            id: row.id,
            user_id: row.user_id,
            delta: row.score,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct InteractionRow {
    id: Uuid,
    user_id: Uuid,
    event_id: Uuid,
    rsvp: bool,
    saved: bool,
    clicked: bool,
    interaction_date: DateTime<Utc>,
}

impl From<InteractionRow> for EventInteraction {
    fn from(row: InteractionRow) -> Self {
        EventInteraction {
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            rsvp: row.rsvp,
            saved: row.saved,
            clicked: row.clicked,
            interaction_date: row.interaction_date,
        }
    }
}

const USER_COLUMNS: &str = "id, city, country, account_status, user_type";
const ORGANIZER_COLUMNS: &str =
    "id, user_id, verification_status, trust_score, trust_score_version";
const EVENT_COLUMNS: &str = "id, organizer_id, name, category, location, celebrity, \
     is_free, is_paid, max_capacity, status, created_at";

/// PostgreSQL-backed signal store
#[derive(Clone)]
pub struct PgSignalStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgSignalStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, (Uuid, Option<Vec<String>>)>(
                "SELECT user_id, preferences FROM user_profiles WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|(user_id, preferences)| UserProfile {
            user_id,
            preferences: preferences.unwrap_or_default(),
        }))
    }

    async fn find_organizer(&self, organizer_id: Uuid) -> StoreResult<Option<Organizer>> {
        let sql = format!("SELECT {} FROM organizers WHERE id = $1", ORGANIZER_COLUMNS);
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, OrganizerRow>(&sql)
                .bind(organizer_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(Organizer::from))
    }

    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS);
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, EventRow>(&sql)
                .bind(event_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(Event::from))
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events ORDER BY created_at ASC, id ASC",
            EVENT_COLUMNS
        );
        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, EventRow>(&sql).fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn count_interactions(&self, user_id: Uuid) -> StoreResult<i64> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM event_interactions WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn followed_organizer_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT o.id
                FROM follows f
                JOIN organizers o ON o.user_id = f.followee_id
                WHERE f.follower_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn attended_categories(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT DISTINCT e.category
                FROM event_attendees a
                JOIN events e ON e.id = a.event_id
                WHERE a.user_id = $1
                  AND a.status <> 'cancelled'
                  AND e.category IS NOT NULL
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn confirmed_rsvp_counts(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, (Uuid, i64)>(
                r#"
                SELECT event_id, COUNT(*)
                FROM event_attendees
                WHERE event_id = ANY($1) AND status = 'confirmed'
                GROUP BY event_id
                "#,
            )
            .bind(event_ids)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn organizer_trust_scores(
        &self,
        organizer_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, i32>> {
        if organizer_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, (Uuid, i32)>(
                "SELECT id, trust_score FROM organizers WHERE id = ANY($1)",
            )
            .bind(organizer_ids)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn follower_count(&self, user_id: Uuid) -> StoreResult<i64> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE followee_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn organizer_user_ids(&self, after: Option<Uuid>, limit: i64) -> StoreResult<Vec<Uuid>> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT user_id
                FROM organizers
                WHERE $1::uuid IS NULL OR user_id > $1
                ORDER BY user_id ASC
                LIMIT $2
                "#,
            )
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn begin_trust_session(&self, user_id: Uuid) -> StoreResult<Box<dyn TrustSession>> {
        let mut tx = timed(self.timeout, self.pool.begin()).await?;

        timed(
            self.timeout,
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
                .bind(user_id)
                .execute(&mut *tx),
        )
        .await?;

        debug!(user_id = %user_id, "Trust session lock acquired");

        Ok(Box::new(PgTrustSession {
            tx,
            user_id,
            timeout: self.timeout,
        }))
    }
}

/// Transaction holding the per-user advisory lock until commit or drop
struct PgTrustSession {
    tx: Transaction<'static, Postgres>,
    user_id: Uuid,
    timeout: Duration,
}

impl PgTrustSession {
    async fn count(&mut self, sql: &str, id: Uuid) -> StoreResult<i64> {
        timed(
            self.timeout,
            sqlx::query_scalar::<_, i64>(sql)
                .bind(id)
                .fetch_one(&mut *self.tx),
        )
        .await
    }
}

#[async_trait]
impl TrustSession for PgTrustSession {
    async fn load_signals(
        &mut self,
        recent_since: DateTime<Utc>,
    ) -> StoreResult<Option<TrustSignals>> {
        let timeout = self.timeout;
        let user_id = self.user_id;

        let user_sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = timed(
            timeout,
            sqlx::query_as::<_, UserRow>(&user_sql)
                .bind(user_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;

        let organizer_sql = format!(
            "SELECT {} FROM organizers WHERE user_id = $1",
            ORGANIZER_COLUMNS
        );
        let organizer = timed(
            timeout,
            sqlx::query_as::<_, OrganizerRow>(&organizer_sql)
                .bind(user_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;

        let (user, organizer) = match (user, organizer) {
            (Some(u), Some(o)) => (User::from(u), Organizer::from(o)),
            _ => return Ok(None),
        };

        let ledger = timed(
            timeout,
            sqlx::query_as::<_, LedgerRow>(
                r#"
                SELECT id, user_id, score, reason, created_at
                FROM trust_scores
                WHERE user_id = $1
                ORDER BY created_at ASC, id ASC
                "#,
            )
            .bind(user_id)
            .fetch_all(&mut *self.tx),
        )
        .await?
        .into_iter()
        .map(LedgerEntry::from)
        .collect();

        let confirmed_attendances = self
            .count(
                "SELECT COUNT(*) FROM event_attendees WHERE user_id = $1 AND status = 'confirmed'",
                user_id,
            )
            .await?;

        let recent_rsvps = timed(
            timeout,
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM event_attendees WHERE user_id = $1 AND created_at >= $2",
            )
            .bind(user_id)
            .bind(recent_since)
            .fetch_one(&mut *self.tx),
        )
        .await?;

        let ratings = timed(
            timeout,
            sqlx::query_scalar::<_, i32>(
                "SELECT rating FROM event_reviews WHERE user_id = $1 AND rating IS NOT NULL",
            )
            .bind(user_id)
            .fetch_all(&mut *self.tx),
        )
        .await?;

        let likes_on_events = timed(
            timeout,
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM likes l
                JOIN events e ON e.id = l.entity_id
                WHERE e.organizer_id = $1 AND l.entity_type = $2
                "#,
            )
            .bind(organizer.id)
            .bind(EVENT_ENTITY_TYPE)
            .fetch_one(&mut *self.tx),
        )
        .await?;

        let cancelled_occurrences = self
            .count(
                r#"
                SELECT COUNT(*)
                FROM event_occurrences o
                JOIN events e ON e.id = o.event_id
                WHERE e.organizer_id = $1 AND o.is_cancelled
                "#,
                organizer.id,
            )
            .await?;

        let resolved_flags = self
            .count(
                r#"
                SELECT COUNT(*)
                FROM event_flags f
                JOIN events e ON e.id = f.event_id
                WHERE e.organizer_id = $1 AND f.status = 'resolved'
                "#,
                organizer.id,
            )
            .await?;

        Ok(Some(TrustSignals {
            user,
            organizer,
            ledger,
            confirmed_attendances,
            recent_rsvps,
            ratings,
            likes_on_events,
            cancelled_occurrences,
            resolved_flags,
        }))
    }

    async fn append_ledger_once(
        &mut self,
        reason: &str,
        delta: i32,
    ) -> StoreResult<Option<LedgerEntry>> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, LedgerRow>(
                r#"
                INSERT INTO trust_scores (id, user_id, score, reason, created_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (user_id, reason) DO NOTHING
                RETURNING id, user_id, score, reason, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(self.user_id)
            .bind(delta)
            .bind(reason)
            .fetch_optional(&mut *self.tx),
        )
        .await?;

        Ok(row.map(LedgerEntry::from))
    }

    async fn persist_score(
        &mut self,
        organizer_id: Uuid,
        current: TrustScore,
        value: i32,
    ) -> StoreResult<TrustScore> {
        let next = current.next(value);
        let updated = timed(
            self.timeout,
            sqlx::query_as::<_, (i32, i64)>(
                r#"
                UPDATE organizers
                SET trust_score = $1, trust_score_version = $2
                WHERE id = $3 AND trust_score_version = $4
                RETURNING trust_score, trust_score_version
                "#,
            )
            .bind(next.value())
            .bind(next.version())
            .bind(organizer_id)
            .bind(current.version())
            .fetch_optional(&mut *self.tx),
        )
        .await?;

        match updated {
            Some((value, version)) => Ok(TrustScore::restore(value, version)),
            None => Err(StoreError::Conflict(format!(
                "organizer {} trust score changed since version {}",
                organizer_id,
                current.version()
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let timeout = self.timeout;
        timed(timeout, self.tx.commit()).await
    }
}

#[async_trait]
impl InteractionWriter for PgSignalStore {
    async fn record_interaction(
        &self,
        interaction: NewInteraction,
    ) -> StoreResult<EventInteraction> {
        let mut tx = timed(self.timeout, self.pool.begin()).await?;
        let row = insert_interaction(&mut tx, self.timeout, interaction).await?;
        timed(self.timeout, tx.commit()).await?;
        Ok(row)
    }

    async fn upsert_rsvp(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        status: RsvpStatus,
    ) -> StoreResult<RsvpWrite> {
        let mut tx = timed(self.timeout, self.pool.begin()).await?;

        let inserted = timed(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO event_attendees (id, user_id, event_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW(), NOW())
                ON CONFLICT (user_id, event_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(event_id)
            .bind(status.as_str())
            .execute(&mut *tx),
        )
        .await?
        .rows_affected()
            > 0;

        let outcome = if inserted {
            RsvpWrite::Created
        } else {
            let existing = timed(
                self.timeout,
                sqlx::query_scalar::<_, String>(
                    "SELECT status FROM event_attendees WHERE user_id = $1 AND event_id = $2 FOR UPDATE",
                )
                .bind(user_id)
                .bind(event_id)
                .fetch_one(&mut *tx),
            )
            .await?;
            let previous = RsvpStatus::parse_lenient(&existing);

            if previous == status {
                RsvpWrite::Unchanged
            } else {
                timed(
                    self.timeout,
                    sqlx::query(
                        "UPDATE event_attendees SET status = $1, updated_at = NOW() WHERE user_id = $2 AND event_id = $3",
                    )
                    .bind(status.as_str())
                    .bind(user_id)
                    .bind(event_id)
                    .execute(&mut *tx),
                )
                .await?;
                RsvpWrite::Updated { previous }
            }
        };

        if outcome != RsvpWrite::Unchanged {
            insert_interaction(
                &mut tx,
                self.timeout,
                NewInteraction {
                    user_id,
                    event_id,
                    kind: crate::InteractionKind::Rsvp,
                },
            )
            .await?;
        }

        timed(self.timeout, tx.commit()).await?;
        Ok(outcome)
    }

    async fn toggle_saved(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool> {
        let mut tx = timed(self.timeout, self.pool.begin()).await?;
        let now_on = toggle_entity(&mut tx, self.timeout, "saved_items", user_id, event_id).await?;

        if now_on {
            insert_interaction(
                &mut tx,
                self.timeout,
                NewInteraction {
                    user_id,
                    event_id,
                    kind: crate::InteractionKind::Saved,
                },
            )
            .await?;
        }

        timed(self.timeout, tx.commit()).await?;
        Ok(now_on)
    }

    async fn toggle_like(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool> {
        let mut tx = timed(self.timeout, self.pool.begin()).await?;
        let now_on = toggle_entity(&mut tx, self.timeout, "likes", user_id, event_id).await?;
        timed(self.timeout, tx.commit()).await?;
        Ok(now_on)
    }
}

async fn insert_interaction(
    tx: &mut Transaction<'static, Postgres>,
    timeout: Duration,
    interaction: NewInteraction,
) -> StoreResult<EventInteraction> {
    let row = interaction.into_row(Utc::now());
    let stored = timed(
        timeout,
        sqlx::query_as::<_, InteractionRow>(
            r#"
            INSERT INTO event_interactions (id, user_id, event_id, rsvp, saved, clicked, interaction_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, event_id, rsvp, saved, clicked, interaction_date
            "#,
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.event_id)
        .bind(row.rsvp)
        .bind(row.saved)
        .bind(row.clicked)
        .bind(row.interaction_date)
        .fetch_one(&mut **tx),
    )
    .await?;
    Ok(stored.into())
}

/// Delete the (user, event) row from `table` if present, insert it otherwise.
/// Returns `true` when the row exists afterwards.
async fn toggle_entity(
    tx: &mut Transaction<'static, Postgres>,
    timeout: Duration,
    table: &'static str,
    user_id: Uuid,
    event_id: Uuid,
) -> StoreResult<bool> {
    let delete_sql = format!(
        "DELETE FROM {} WHERE user_id = $1 AND entity_id = $2 AND entity_type = $3",
        table
    );
    let deleted = timed(
        timeout,
        sqlx::query(&delete_sql)
            .bind(user_id)
            .bind(event_id)
            .bind(EVENT_ENTITY_TYPE)
            .execute(&mut **tx),
    )
    .await?
    .rows_affected();

    if deleted > 0 {
        return Ok(false);
    }

    let insert_sql = format!(
        "INSERT INTO {} (id, user_id, entity_id, entity_type, created_at) \
         VALUES ($1, $2, $3, $4, NOW()) ON CONFLICT DO NOTHING",
        table
    );
    timed(
        timeout,
        sqlx::query(&insert_sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(event_id)
            .bind(EVENT_ENTITY_TYPE)
            .execute(&mut **tx),
    )
    .await?;

    Ok(true)
}
