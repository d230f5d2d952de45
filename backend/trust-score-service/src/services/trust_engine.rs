// ============================================
// Trust Score Engine
// ============================================
//
// Additive reputation model over a base of 50:
//
//   base                        +50
//   one-time bonus              +delta, only in the call that awards it
//   confirmed attendances       +1 each
//   RSVPs in trailing 30 days   +1 each
//   mean review rating          +round(mean)
//   likes on own events         +1 per 10
//   cancelled occurrences       -10 each
//   resolved flags              -5 each
//   restricted / banned         -10 / -20
//
// The total is clamped at 0 and written back to the organizer inside the
// same per-user session that read the signals.

use crate::error::Result;
use crate::metrics::{record_bonus, record_outcome, TRUST_COMPUTE_DURATION_SECONDS};
use chrono::{DateTime, Duration, Utc};
use signal_store::{AccountStatus, SignalStore, TrustSignals, VerificationStatus};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const VERIFIED_BUSINESS_REASON: &str = "verified business";
pub const VERIFIED_BUSINESS_BONUS: i32 = 10;

const BASE_SCORE: i64 = 50;
const RECENT_RSVP_WINDOW_DAYS: i64 = 30;
const LIKES_PER_POINT: i64 = 10;
const CANCELLATION_PENALTY: i64 = 10;
const RESOLVED_FLAG_PENALTY: i64 = 5;

/// Per-signal contributions of one computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustBreakdown {
    pub base: i64,
    pub one_time_bonus: i64,
    pub attendance: i64,
    pub recent_rsvps: i64,
    pub rating: i64,
    pub likes: i64,
    pub cancellations: i64,
    pub resolved_flags: i64,
    pub account_status: i64,
}

impl TrustBreakdown {
    pub fn from_signals(signals: &TrustSignals, one_time_bonus: i64) -> Self {
        Self {
            base: BASE_SCORE,
            one_time_bonus,
            attendance: signals.confirmed_attendances,
            recent_rsvps: signals.recent_rsvps,
            rating: rounded_mean(&signals.ratings),
            likes: signals.likes_on_events / LIKES_PER_POINT,
            cancellations: -CANCELLATION_PENALTY * signals.cancelled_occurrences,
            resolved_flags: -RESOLVED_FLAG_PENALTY * signals.resolved_flags,
            account_status: account_penalty(signals.user.account_status),
        }
    }

    pub fn raw_total(&self) -> i64 {
        self.base
            + self.one_time_bonus
            + self.attendance
            + self.recent_rsvps
            + self.rating
            + self.likes
            + self.cancellations
            + self.resolved_flags
            + self.account_status
    }

    /// Clamped into `0..=i32::MAX`
    pub fn score(&self) -> i32 {
        self.raw_total().clamp(0, i32::MAX as i64) as i32
    }
}

fn account_penalty(status: AccountStatus) -> i64 {
    match status {
        AccountStatus::Restricted => -10,
        AccountStatus::Banned => -20,
        _ => 0,
    }
}

/// Mean of the ratings rounded half to even; 0 when there are none.
fn rounded_mean(ratings: &[i32]) -> i64 {
    if ratings.is_empty() {
        return 0;
    }

    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    let n = ratings.len() as i64;
    let (q, r) = (sum.div_euclid(n), sum.rem_euclid(n));

    match (2 * r).cmp(&n) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal if q % 2 != 0 => q + 1,
        _ => q,
    }
}

pub struct TrustScoreEngine {
    store: Arc<dyn SignalStore>,
}

impl TrustScoreEngine {
    pub fn new(store: Arc<dyn SignalStore>) -> Self {
        Self { store }
    }

    /// Recompute, persist and return the organizer trust score of `user_id`.
    ///
    /// Users without an organizer record score 0 and nothing is written.
    pub async fn compute(&self, user_id: Uuid) -> Result<i32> {
        self.compute_at(user_id, Utc::now()).await
    }

    /// [`Self::compute`] against an explicit reference time.
    pub async fn compute_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i32> {
        let timer = TRUST_COMPUTE_DURATION_SECONDS.start_timer();
        let result = self.compute_in_session(user_id, now).await;
        timer.observe_duration();

        match &result {
            Ok(Some(_)) => record_outcome("scored"),
            Ok(None) => record_outcome("missing"),
            Err(_) => record_outcome("error"),
        }

        result.map(|score| score.unwrap_or(0))
    }

    async fn compute_in_session(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Option<i32>> {
        let mut session = self.store.begin_trust_session(user_id).await?;

        let recent_since = now - Duration::days(RECENT_RSVP_WINDOW_DAYS);
        let signals = match session.load_signals(recent_since).await? {
            Some(signals) => signals,
            None => {
                debug!(user_id = %user_id, "No user or organizer, trust score is 0");
                return Ok(None);
            }
        };

        let already_verified = signals
            .ledger
            .iter()
            .any(|l| l.reason == VERIFIED_BUSINESS_REASON);

        let mut awarded = 0i64;
        if signals.organizer.verification_status == VerificationStatus::BusinessVerified
            && !already_verified
        {
            if let Some(entry) = session
                .append_ledger_once(VERIFIED_BUSINESS_REASON, VERIFIED_BUSINESS_BONUS)
                .await?
            {
                info!(
                    user_id = %user_id,
                    delta = entry.delta,
                    reason = %entry.reason,
                    "One-time trust bonus awarded"
                );
                record_bonus(VERIFIED_BUSINESS_REASON);
                awarded += entry.delta as i64;
            }
        }

        let breakdown = TrustBreakdown::from_signals(&signals, awarded);
        let score = breakdown.score();

        let organizer = &signals.organizer;
        let stored = session
            .persist_score(organizer.id, organizer.trust_score, score)
            .await?;
        session.commit().await?;

        debug!(
            user_id = %user_id,
            organizer_id = %organizer.id,
            raw_total = breakdown.raw_total(),
            score = stored.value(),
            version = stored.version(),
            "Trust score persisted"
        );

        Ok(Some(stored.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_store::{
        MockSignalStore, Organizer, StoreError, TrustScore, User, UserRole,
    };

    fn signals() -> TrustSignals {
        let user_id = Uuid::new_v4();
        TrustSignals {
            user: User {
                id: user_id,
                city: None,
                country: None,
                account_status: AccountStatus::Active,
                role: UserRole::Organizer,
            },
            organizer: Organizer {
                id: Uuid::new_v4(),
                user_id,
                verification_status: VerificationStatus::Pending,
                trust_score: TrustScore::default(),
            },
            ledger: Vec::new(),
            confirmed_attendances: 0,
            recent_rsvps: 0,
            ratings: Vec::new(),
            likes_on_events: 0,
            cancelled_occurrences: 0,
            resolved_flags: 0,
        }
    }

    #[test]
    fn test_base_only() {
        assert_eq!(TrustBreakdown::from_signals(&signals(), 0).score(), 50);
    }

    #[test]
    fn test_all_signals_add_up() {
        let mut s = signals();
        s.confirmed_attendances = 4;
        s.recent_rsvps = 2;
        s.ratings = vec![4, 5, 5];
        s.likes_on_events = 37;
        s.cancelled_occurrences = 1;
        s.resolved_flags = 1;
        s.user.account_status = AccountStatus::Restricted;

        // 50 + 10 + 4 + 2 + round(4.67) + 3 - 10 - 5 - 10
        assert_eq!(TrustBreakdown::from_signals(&s, 10).score(), 49);
    }

    #[test]
    fn test_clamped_at_zero() {
        let mut s = signals();
        s.cancelled_occurrences = 4;
        s.resolved_flags = 3;
        s.user.account_status = AccountStatus::Banned;

        let breakdown = TrustBreakdown::from_signals(&s, 0);
        assert!(breakdown.raw_total() < 0);
        assert_eq!(breakdown.score(), 0);
    }

    #[test]
    fn test_rating_rounds_half_to_even() {
        assert_eq!(rounded_mean(&[]), 0);
        assert_eq!(rounded_mean(&[2, 3]), 2);
        assert_eq!(rounded_mean(&[3, 4]), 4);
        assert_eq!(rounded_mean(&[1, 2, 2]), 2);
        assert_eq!(rounded_mean(&[5]), 5);
    }

    #[tokio::test]
    async fn test_store_failure_is_propagated() {
        let mut store = MockSignalStore::new();
        store
            .expect_begin_trust_session()
            .returning(|_| Err(StoreError::Timeout(std::time::Duration::from_secs(2))));

        let engine = TrustScoreEngine::new(Arc::new(store));
        let err = engine.compute(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
