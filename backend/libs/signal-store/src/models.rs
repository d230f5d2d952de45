use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account lifecycle state of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Pending,
    Restricted,
    Banned,
    Deactivated,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Pending => "pending",
            AccountStatus::Restricted => "restricted",
            AccountStatus::Banned => "banned",
            AccountStatus::Deactivated => "deactivated",
        }
    }

    /// Unknown values carry no penalty, so they read as `Active`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => AccountStatus::Pending,
            "restricted" => AccountStatus::Restricted,
            "banned" => AccountStatus::Banned,
            "deactivated" => AccountStatus::Deactivated,
            _ => AccountStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Standard,
    Organizer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Standard => "standard",
            UserRole::Organizer => "organizer",
        }
    }

    pub fn parse_lenient(value: &str) -> Self {
        if value.eq_ignore_ascii_case("organizer") {
            UserRole::Organizer
        } else {
            UserRole::Standard
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub city: Option<String>,
    pub country: Option<String>,
    pub account_status: AccountStatus,
    pub role: UserRole,
}

/// Preference tags a user picked during onboarding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub preferences: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    BusinessVerified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::BusinessVerified => "business_verified",
        }
    }

    pub fn parse_lenient(value: &str) -> Self {
        if value.eq_ignore_ascii_case("business_verified") {
            VerificationStatus::BusinessVerified
        } else {
            VerificationStatus::Pending
        }
    }
}

/// Persisted trust score of an organizer.
///
/// Only a [`crate::TrustSession`] produces new values; `version` is the
/// optimistic concurrency token checked on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrustScore {
    value: i32,
    version: i64,
}

impl TrustScore {
    /// Rehydrate a stored value. Negative values are clamped to zero.
    pub fn restore(value: i32, version: i64) -> Self {
        Self {
            value: value.max(0),
            version,
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Successor value written by the trust session.
    pub(crate) fn next(&self, value: i32) -> Self {
        Self {
            value: value.max(0),
            version: self.version + 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organizer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub verification_status: VerificationStatus,
    pub trust_score: TrustScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub celebrity: Option<String>,
    pub is_free: bool,
    pub is_paid: bool,
    pub max_capacity: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only behavioural log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInteraction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub rsvp: bool,
    pub saved: bool,
    pub clicked: bool,
    pub interaction_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    Rsvp,
    Saved,
    Clicked,
}

#[derive(Debug, Clone, Copy)]
pub struct NewInteraction {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub kind: InteractionKind,
}

impl NewInteraction {
    pub fn into_row(self, now: DateTime<Utc>) -> EventInteraction {
        EventInteraction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            event_id: self.event_id,
            rsvp: self.kind == InteractionKind::Rsvp,
            saved: self.kind == InteractionKind::Saved,
            clicked: self.kind == InteractionKind::Clicked,
            interaction_date: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Confirmed,
    Pending,
    Cancelled,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Confirmed => "confirmed",
            RsvpStatus::Pending => "pending",
            RsvpStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => RsvpStatus::Pending,
            "cancelled" => RsvpStatus::Cancelled,
            _ => RsvpStatus::Confirmed,
        }
    }
}

/// Current-state RSVP for one (user, event) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rsvp {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: RsvpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an update-in-place RSVP write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpWrite {
    Created,
    Updated { previous: RsvpStatus },
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Pending,
    Resolved,
    Rejected,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Pending => "pending",
            FlagStatus::Resolved => "resolved",
            FlagStatus::Rejected => "rejected",
        }
    }
}

/// One awarded-once trust adjustment; `reason` is the idempotency key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub delta: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the trust score engine reads for one organizer, fetched inside
/// the same session that later persists the score.
#[derive(Debug, Clone)]
pub struct TrustSignals {
    pub user: User,
    pub organizer: Organizer,
    pub ledger: Vec<LedgerEntry>,
    /// Confirmed attendance rows where this user is the attendee
    pub confirmed_attendances: i64,
    /// RSVPs by this user created at or after the window start
    pub recent_rsvps: i64,
    /// Non-null star ratings the user has left
    pub ratings: Vec<i32>,
    /// Likes across all of the organizer's events
    pub likes_on_events: i64,
    pub cancelled_occurrences: i64,
    pub resolved_flags: i64,
}
