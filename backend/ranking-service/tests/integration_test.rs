use chrono::{DateTime, Duration, Utc};
use ndarray::{Array1, Array2};
use ranking_service::services::ranking::{RelevanceModel, Result as RankingResult};
use ranking_service::{
    FeedRanker, ModelHandle, ModelScorer, RankScore, RankingConfig, RankingError,
};
use signal_store::{
    AccountStatus, Event, InMemorySignalStore, Organizer, RsvpStatus, SignalStore, StoreError,
    TrustScore, User, UserProfile, UserRole, VerificationStatus,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Relevance grows with organizer trust; records every row it sees.
#[derive(Default)]
struct TrustModel {
    seen: Mutex<Vec<[f32; 3]>>,
}

impl RelevanceModel for TrustModel {
    fn predict(&self, features: &Array2<f32>) -> RankingResult<Array1<f32>> {
        let mut seen = self.seen.lock().unwrap();
        Ok(features
            .rows()
            .into_iter()
            .map(|r| {
                seen.push([r[0], r[1], r[2]]);
                (0.1 * r[0] + 0.1 * r[1] + r[2] / 125.0).min(1.0)
            })
            .collect())
    }
}

struct Fixture {
    store: Arc<InMemorySignalStore>,
    model: Arc<TrustModel>,
    now: DateTime<Utc>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemorySignalStore::default()),
            model: Arc::new(TrustModel::default()),
            now: Utc::now(),
        }
    }

    fn ranker(&self) -> FeedRanker {
        FeedRanker::new(
            self.store.clone() as Arc<dyn SignalStore>,
            ModelScorer::new(ModelHandle::loaded(self.model.clone())),
            RankingConfig::default(),
        )
    }

    fn ranker_without_model(&self) -> FeedRanker {
        FeedRanker::new(
            self.store.clone() as Arc<dyn SignalStore>,
            ModelScorer::new(ModelHandle::load_onnx(Some("/nonexistent/relevance.onnx"))),
            RankingConfig::default(),
        )
    }

    async fn user(&self, city: &str, country: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_user(User {
                id,
                city: Some(city.into()),
                country: Some(country.into()),
                account_status: AccountStatus::Active,
                role: UserRole::Standard,
            })
            .await;
        id
    }

    async fn profile(&self, user_id: Uuid, preferences: &[&str]) {
        self.store
            .insert_profile(UserProfile {
                user_id,
                preferences: preferences.iter().map(|p| p.to_string()).collect(),
            })
            .await;
    }

    /// Organizer with a persisted trust score; returns (organizer user, organizer).
    async fn organizer(&self, trust: i32) -> (Uuid, Uuid) {
        let user_id = self.user("Accra", "Ghana").await;
        let organizer_id = Uuid::new_v4();
        self.store
            .insert_organizer(Organizer {
                id: organizer_id,
                user_id,
                verification_status: VerificationStatus::Pending,
                trust_score: TrustScore::restore(trust, 1),
            })
            .await;
        (user_id, organizer_id)
    }

    async fn event(
        &self,
        organizer_id: Uuid,
        category: &str,
        location: &str,
        age: Duration,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_event(Event {
                id,
                organizer_id,
                name: format!("{} in {}", category, location),
                category: Some(category.into()),
                location: Some(location.into()),
                celebrity: None,
                is_free: false,
                is_paid: true,
                max_capacity: None,
                status: "upcoming".into(),
                created_at: self.now - age,
            })
            .await;
        id
    }

    async fn confirmed_rsvps(&self, event_id: Uuid, count: usize) {
        for _ in 0..count {
            let attendee = self.user("Accra", "Ghana").await;
            self.store
                .add_rsvp(attendee, event_id, RsvpStatus::Confirmed, self.now)
                .await;
        }
    }
}

#[tokio::test]
async fn test_affinity_example_end_to_end() {
    let fx = Fixture::new();
    let user_id = fx.user("Cape Town", "South Africa").await;
    fx.profile(user_id, &["music"]).await;

    let (organizer_user, organizer_id) = fx.organizer(70).await;
    fx.store.add_follow(user_id, organizer_user).await;

    let featured = fx
        .event(organizer_id, "music", "cape town", Duration::hours(2))
        .await;
    fx.confirmed_rsvps(featured, 5).await;

    let (_, other_organizer) = fx.organizer(10).await;
    let filler = fx
        .event(other_organizer, "sports", "Lagos", Duration::days(20))
        .await;

    let ranked = fx
        .ranker()
        .rank_scored_at(user_id, None, fx.now)
        .await
        .unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].event.id, featured);
    assert_eq!(ranked[0].score, RankScore::Affinity(57));
    assert_eq!(ranked[1].event.id, filler);
    assert_eq!(ranked[1].score, RankScore::Affinity(0));

    let json = serde_json::to_value(ranked[0].score).unwrap();
    assert_eq!(json, serde_json::json!({"strategy": "affinity", "value": 57}));
}

#[tokio::test]
async fn test_cutover_is_inclusive_at_100() {
    let fx = Fixture::new();
    let user_id = fx.user("Kumasi", "Ghana").await;
    fx.profile(user_id, &["food"]).await;
    let (_, organizer_id) = fx.organizer(50).await;
    let event_id = fx
        .event(organizer_id, "food", "Kumasi", Duration::days(10))
        .await;

    fx.store.add_interactions(user_id, event_id, 99).await;
    let ranked = fx.ranker().rank_scored(user_id, None).await.unwrap();
    assert!(matches!(ranked[0].score, RankScore::Affinity(_)));
    assert!(fx.model.seen.lock().unwrap().is_empty());

    fx.store.add_interactions(user_id, event_id, 1).await;
    let ranked = fx.ranker().rank_scored(user_id, None).await.unwrap();
    assert!(matches!(ranked[0].score, RankScore::Relevance(_)));
    assert_eq!(*fx.model.seen.lock().unwrap(), vec![[1.0f32, 1.0, 50.0]]);
}

#[tokio::test]
async fn test_learned_ranking_orders_by_relevance() {
    let fx = Fixture::new();
    let user_id = fx.user("Kumasi", "Ghana").await;
    fx.profile(user_id, &["food"]).await;

    let (_, low) = fx.organizer(20).await;
    let (_, high) = fx.organizer(90).await;
    let weak = fx.event(low, "food", "Kumasi", Duration::days(1)).await;
    let strong = fx.event(high, "art", "Tamale", Duration::days(40)).await;
    fx.store.add_interactions(user_id, weak, 120).await;

    let ranked = fx.ranker().rank_scored(user_id, None).await.unwrap();

    assert_eq!(ranked[0].event.id, strong);
    assert_eq!(ranked[1].event.id, weak);
    for r in &ranked {
        match r.score {
            RankScore::Relevance(p) => assert!((0.0..=1.0).contains(&p)),
            other => panic!("expected relevance score, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_model_unavailable_is_an_error_for_learned_users_only() {
    let fx = Fixture::new();
    let user_id = fx.user("Kumasi", "Ghana").await;
    let (_, organizer_id) = fx.organizer(50).await;
    let event_id = fx
        .event(organizer_id, "food", "Kumasi", Duration::days(10))
        .await;

    fx.store.add_interactions(user_id, event_id, 99).await;
    let ranker = fx.ranker_without_model();
    assert_eq!(ranker.rank(user_id, None).await.unwrap().len(), 1);

    fx.store.add_interactions(user_id, event_id, 1).await;
    let err = ranker.rank(user_id, None).await.unwrap_err();
    assert!(matches!(err, RankingError::ModelUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_profile_uses_zero_vector() {
    let fx = Fixture::new();
    let user_id = fx.user("Kumasi", "Ghana").await;
    let (_, organizer_id) = fx.organizer(85).await;
    let event_id = fx
        .event(organizer_id, "food", "Kumasi", Duration::days(10))
        .await;
    fx.store.add_interactions(user_id, event_id, 100).await;

    let ranked = fx.ranker().rank_scored(user_id, None).await.unwrap();

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].score, RankScore::Relevance(0.0));
    assert_eq!(*fx.model.seen.lock().unwrap(), vec![[0.0f32; 3]]);
}

#[tokio::test]
async fn test_equal_scores_break_ties_by_event_id() {
    let fx = Fixture::new();
    let user_id = fx.user("Mombasa", "Kenya").await;
    let (_, organizer_id) = fx.organizer(0).await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(
            fx.event(organizer_id, "theatre", "Kisumu", Duration::days(9))
                .await,
        );
    }
    ids.sort();

    let ranked = fx.ranker().rank_at(user_id, None, fx.now).await.unwrap();
    let order: Vec<Uuid> = ranked.iter().map(|e| e.id).collect();
    assert_eq!(order, ids);

    let again: Vec<Uuid> = fx
        .ranker()
        .rank_at(user_id, None, fx.now)
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(again, order);
}

#[tokio::test]
async fn test_top_n_limits_results() {
    let fx = Fixture::new();
    let user_id = fx.user("Mombasa", "Kenya").await;
    let (_, organizer_id) = fx.organizer(40).await;
    for day in 0..12 {
        fx.event(organizer_id, "music", "Mombasa", Duration::days(day))
            .await;
    }

    let ranker = fx.ranker();
    assert_eq!(ranker.rank(user_id, None).await.unwrap().len(), 10);
    assert_eq!(ranker.rank(user_id, Some(3)).await.unwrap().len(), 3);
    assert_eq!(ranker.rank(user_id, Some(50)).await.unwrap().len(), 12);
    assert!(ranker.rank(user_id, Some(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_user() {
    let fx = Fixture::new();
    let (_, organizer_id) = fx.organizer(40).await;
    fx.event(organizer_id, "music", "Mombasa", Duration::days(1))
        .await;

    let err = fx.ranker().rank(Uuid::new_v4(), None).await.unwrap_err();
    assert!(matches!(err, RankingError::UserNotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let fx = Fixture::new();
    let user_id = fx.user("Mombasa", "Kenya").await;
    fx.store.set_available(false);

    let err = fx.ranker().rank(user_id, None).await.unwrap_err();
    assert!(matches!(err, RankingError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());
    assert_eq!(err.public_message(), "ranking unavailable");
}
