use super::affinity::AffinityScorer;
use super::features::{extract_features, FeatureVector};
use super::model::ModelScorer;
use super::strategy::{select_strategy, ScoringStrategy};
use super::{RankingError, Result};
use crate::config::RankingConfig;
use crate::metrics;
use crate::models::{EventAggregates, RankScore, RankedEvent, UserSnapshot};
use chrono::{DateTime, Utc};
use signal_store::{Event, SignalStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Hybrid "for you" ranker.
///
/// Users below the interaction threshold are ranked by the affinity rules,
/// everyone else by the relevance model. A missing model is an error for
/// learned users, never a silent switch back to the rules.
pub struct FeedRanker {
    store: Arc<dyn SignalStore>,
    scorer: ModelScorer,
    config: RankingConfig,
}

impl FeedRanker {
    pub fn new(store: Arc<dyn SignalStore>, scorer: ModelScorer, config: RankingConfig) -> Self {
        Self {
            store,
            scorer,
            config,
        }
    }

    /// Top events for `user_id`, best first. `None` uses the configured default.
    pub async fn rank(&self, user_id: Uuid, top_n: Option<usize>) -> Result<Vec<Event>> {
        self.rank_at(user_id, top_n, Utc::now()).await
    }

    pub async fn rank_at(
        &self,
        user_id: Uuid,
        top_n: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        Ok(self
            .rank_scored_at(user_id, top_n, now)
            .await?
            .into_iter()
            .map(|ranked| ranked.event)
            .collect())
    }

    /// Same ordering as [`Self::rank`], with each event's score attached.
    pub async fn rank_scored(
        &self,
        user_id: Uuid,
        top_n: Option<usize>,
    ) -> Result<Vec<RankedEvent>> {
        self.rank_scored_at(user_id, top_n, Utc::now()).await
    }

    pub async fn rank_scored_at(
        &self,
        user_id: Uuid,
        top_n: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedEvent>> {
        let started = Instant::now();
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        let mut strategy = None;

        let result = self.rank_inner(user_id, top_n, now, &mut strategy).await;

        let strategy_label = strategy.map_or("unknown", |s: ScoringStrategy| s.as_str());
        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(ranked) => {
                metrics::record_request(strategy_label, "ok", elapsed);
                debug!(
                    user_id = %user_id,
                    strategy = strategy_label,
                    returned = ranked.len(),
                    "Ranked feed"
                );
            }
            Err(e) => {
                metrics::record_request(strategy_label, e.kind(), elapsed);
                warn!(
                    user_id = %user_id,
                    strategy = strategy_label,
                    error = %e,
                    "Feed ranking failed"
                );
            }
        }

        result
    }

    async fn rank_inner(
        &self,
        user_id: Uuid,
        top_n: usize,
        now: DateTime<Utc>,
        strategy: &mut Option<ScoringStrategy>,
    ) -> Result<Vec<RankedEvent>> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(RankingError::UserNotFound(user_id))?;

        let interactions = self.store.count_interactions(user_id).await?;
        let chosen = select_strategy(interactions, self.config.learned_threshold);
        *strategy = Some(chosen);

        if chosen == ScoringStrategy::Learned {
            self.scorer.ensure_available()?;
        }

        if top_n == 0 {
            return Ok(Vec::new());
        }

        let events = self.store.list_events().await?;
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let aggregates = self.load_aggregates(&events).await?;
        let profile = self.store.find_profile(user_id).await?;
        let mut snapshot = UserSnapshot::new(&user, profile);

        let mut ranked = match chosen {
            ScoringStrategy::RuleBased => {
                let followed = self.store.followed_organizer_ids(user_id).await?;
                let attended = self.store.attended_categories(user_id).await?;
                snapshot = snapshot.with_history(followed, attended);

                let scorer = AffinityScorer::at(now);
                events
                    .into_iter()
                    .map(|event| {
                        let points = scorer.score(&snapshot, &event, aggregates_for(&aggregates, &event));
                        RankedEvent {
                            event,
                            score: RankScore::Affinity(points),
                        }
                    })
                    .collect::<Vec<_>>()
            }
            ScoringStrategy::Learned => {
                let features: Vec<FeatureVector> = events
                    .iter()
                    .map(|event| {
                        extract_features(&snapshot, event, aggregates_for(&aggregates, event))
                    })
                    .collect();
                let scores = self.scorer.predict_batch(&features)?;

                events
                    .into_iter()
                    .zip(scores)
                    .map(|(event, relevance)| RankedEvent {
                        event,
                        score: RankScore::Relevance(relevance),
                    })
                    .collect::<Vec<_>>()
            }
        };

        ranked.sort_by(|a, b| {
            a.score
                .cmp_desc(&b.score)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        ranked.truncate(top_n);

        Ok(ranked)
    }

    async fn load_aggregates(&self, events: &[Event]) -> Result<HashMap<Uuid, EventAggregates>> {
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let organizer_ids: Vec<Uuid> = events
            .iter()
            .map(|e| e.organizer_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let rsvps = self.store.confirmed_rsvp_counts(&event_ids).await?;
        let trust = self.store.organizer_trust_scores(&organizer_ids).await?;

        Ok(events
            .iter()
            .map(|event| {
                (
                    event.id,
                    EventAggregates {
                        confirmed_rsvps: rsvps.get(&event.id).copied().unwrap_or(0),
                        organizer_trust: trust.get(&event.organizer_id).copied(),
                    },
                )
            })
            .collect())
    }
}

const NO_AGGREGATES: EventAggregates = EventAggregates {
    confirmed_rsvps: 0,
    organizer_trust: None,
};

fn aggregates_for<'a>(
    aggregates: &'a HashMap<Uuid, EventAggregates>,
    event: &Event,
) -> &'a EventAggregates {
    aggregates.get(&event.id).unwrap_or(&NO_AGGREGATES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ranking::model::ModelHandle;
    use signal_store::{AccountStatus, MockSignalStore, StoreError, User, UserRole};
    use std::time::Duration;

    fn user(id: Uuid) -> User {
        User {
            id,
            city: Some("Nairobi".into()),
            country: Some("Kenya".into()),
            account_status: AccountStatus::Active,
            role: UserRole::Standard,
        }
    }

    fn ranker(store: MockSignalStore, scorer: ModelScorer) -> FeedRanker {
        FeedRanker::new(Arc::new(store), scorer, RankingConfig::default())
    }

    #[tokio::test]
    async fn test_missing_user_is_an_error() {
        let mut store = MockSignalStore::new();
        store.expect_find_user().returning(|_| Ok(None));

        let ranker = ranker(
            store,
            ModelScorer::new(ModelHandle::Unavailable("unused".into())),
        );
        let user_id = Uuid::new_v4();
        let result = ranker.rank(user_id, None).await;

        assert!(matches!(result, Err(RankingError::UserNotFound(id)) if id == user_id));
    }

    #[tokio::test]
    async fn test_unavailable_model_fails_before_fetching_candidates() {
        let user_id = Uuid::new_v4();
        let mut store = MockSignalStore::new();
        store
            .expect_find_user()
            .returning(move |id| Ok(Some(user(id))));
        store.expect_count_interactions().returning(|_| Ok(150));
        store.expect_list_events().never();

        let ranker = ranker(
            store,
            ModelScorer::new(ModelHandle::Unavailable("model file missing".into())),
        );
        let result = ranker.rank(user_id, Some(5)).await;

        match result {
            Err(e @ RankingError::ModelUnavailable(_)) => {
                assert!(e.is_retryable());
                assert_eq!(e.public_message(), "ranking unavailable");
            }
            other => panic!("expected ModelUnavailable, got {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn test_store_timeout_is_propagated() {
        let mut store = MockSignalStore::new();
        store
            .expect_find_user()
            .returning(|_| Err(StoreError::Timeout(Duration::from_millis(2000))));

        let ranker = ranker(
            store,
            ModelScorer::new(ModelHandle::Unavailable("unused".into())),
        );
        let err = ranker.rank(Uuid::new_v4(), None).await.unwrap_err();

        assert!(matches!(err, RankingError::Store(StoreError::Timeout(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_zero_top_n_returns_nothing() {
        let mut store = MockSignalStore::new();
        store
            .expect_find_user()
            .returning(move |id| Ok(Some(user(id))));
        store.expect_count_interactions().returning(|_| Ok(3));
        store.expect_list_events().never();

        let ranker = ranker(
            store,
            ModelScorer::new(ModelHandle::Unavailable("unused".into())),
        );
        assert!(ranker.rank(Uuid::new_v4(), Some(0)).await.unwrap().is_empty());
    }
}
