/// Affinity Scoring Module
///
/// Rule-based relevance of one event for one user. Rules live in ordered
/// groups; within a group the first rule that fires contributes and the rest
/// are skipped, so "else" branches (city before country, 80 before 60 trust)
/// are expressed by position instead of nested conditionals.
use crate::models::{non_blank, EventAggregates, UserSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use signal_store::Event;

const FRESH_EVENT_DAYS: i64 = 3;
const POPULARITY_CAP: i64 = 10;
const VIRAL_RSVP_COUNT: i64 = 50;

/// Everything a rule may look at
pub struct AffinityContext<'a> {
    pub user: &'a UserSnapshot,
    pub event: &'a Event,
    pub aggregates: &'a EventAggregates,
    pub now: DateTime<Utc>,
}

type Rule = fn(&AffinityContext<'_>) -> Option<i32>;

/// Top to bottom; at most one contribution per group
const RULE_GROUPS: &[&[(&str, Rule)]] = &[
    &[("exact_location", exact_location), ("coarse_location", coarse_location)],
    &[("category_preference", category_preference)],
    &[("followed_organizer", followed_organizer)],
    &[("category_history", category_history)],
    &[("popularity", popularity)],
    &[("freshness", freshness)],
    &[("viral", viral)],
    &[("notable_guest", notable_guest)],
    &[("free_admission", free_admission)],
    &[("high_trust_producer", high_trust), ("trusted_producer", trusted)],
];

fn exact_location(ctx: &AffinityContext<'_>) -> Option<i32> {
    ctx.user
        .lives_in(ctx.event.location.as_deref())
        .then_some(12)
}

fn coarse_location(ctx: &AffinityContext<'_>) -> Option<i32> {
    let country = non_blank(ctx.user.country.as_deref())?.to_lowercase();
    let location = non_blank(ctx.event.location.as_deref())?.to_lowercase();
    location.contains(&country).then_some(6)
}

fn category_preference(ctx: &AffinityContext<'_>) -> Option<i32> {
    let category = ctx.event.category.as_deref()?;
    ctx.user.prefers(category).then_some(15)
}

fn followed_organizer(ctx: &AffinityContext<'_>) -> Option<i32> {
    ctx.user
        .followed_organizers
        .contains(&ctx.event.organizer_id)
        .then_some(10)
}

fn category_history(ctx: &AffinityContext<'_>) -> Option<i32> {
    let category = ctx.event.category.as_deref()?;
    ctx.user.attended_categories.contains(category).then_some(8)
}

fn popularity(ctx: &AffinityContext<'_>) -> Option<i32> {
    let points = ctx.aggregates.confirmed_rsvps.clamp(0, POPULARITY_CAP) as i32;
    (points > 0).then_some(points)
}

fn freshness(ctx: &AffinityContext<'_>) -> Option<i32> {
    ((ctx.now - ctx.event.created_at).num_days() < FRESH_EVENT_DAYS).then_some(10)
}

fn viral(ctx: &AffinityContext<'_>) -> Option<i32> {
    (ctx.aggregates.confirmed_rsvps >= VIRAL_RSVP_COUNT).then_some(5)
}

fn notable_guest(ctx: &AffinityContext<'_>) -> Option<i32> {
    ctx.event
        .celebrity
        .as_deref()
        .map_or(false, |c| !c.trim().is_empty())
        .then_some(8)
}

fn free_admission(ctx: &AffinityContext<'_>) -> Option<i32> {
    ctx.event.is_free.then_some(5)
}

fn high_trust(ctx: &AffinityContext<'_>) -> Option<i32> {
    (ctx.aggregates.organizer_trust.unwrap_or(0) >= 80).then_some(10)
}

fn trusted(ctx: &AffinityContext<'_>) -> Option<i32> {
    (ctx.aggregates.organizer_trust.unwrap_or(0) >= 60).then_some(5)
}

/// One rule that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AffinityContribution {
    pub rule: &'static str,
    pub points: i32,
}

/// Pure affinity scorer pinned to a reference time
#[derive(Debug, Clone, Copy)]
pub struct AffinityScorer {
    now: DateTime<Utc>,
}

impl Default for AffinityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl AffinityScorer {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn score(&self, user: &UserSnapshot, event: &Event, aggregates: &EventAggregates) -> i32 {
        self.explain(user, event, aggregates)
            .iter()
            .map(|c| c.points)
            .sum()
    }

    /// Rules that fired, in evaluation order; their points sum to [`Self::score`].
    pub fn explain(
        &self,
        user: &UserSnapshot,
        event: &Event,
        aggregates: &EventAggregates,
    ) -> Vec<AffinityContribution> {
        let ctx = AffinityContext {
            user,
            event,
            aggregates,
            now: self.now,
        };

        RULE_GROUPS
            .iter()
            .filter_map(|group| {
                group.iter().find_map(|&(rule, eval)| {
                    eval(&ctx).map(|points| AffinityContribution { rule, points })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn event(now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            name: "Sunset Sessions".into(),
            category: Some("music".into()),
            location: Some("Cape Town".into()),
            celebrity: None,
            is_free: false,
            is_paid: true,
            max_capacity: None,
            status: "upcoming".into(),
            created_at: now - Duration::days(30),
        }
    }

    fn user() -> UserSnapshot {
        UserSnapshot {
            user_id: Uuid::new_v4(),
            city: Some("cape town".into()),
            country: Some("South Africa".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_example_scores_57() {
        let now = Utc::now();
        let mut e = event(now);
        e.created_at = now - Duration::hours(2);

        let mut u = user();
        u.preferences = Some(["music".to_string()].into_iter().collect());
        u.followed_organizers.insert(e.organizer_id);

        let aggregates = EventAggregates {
            confirmed_rsvps: 5,
            organizer_trust: Some(70),
        };

        let scorer = AffinityScorer::at(now);
        assert_eq!(scorer.score(&u, &e, &aggregates), 57);

        let rules: Vec<&str> = scorer
            .explain(&u, &e, &aggregates)
            .iter()
            .map(|c| c.rule)
            .collect();
        assert_eq!(
            rules,
            vec![
                "exact_location",
                "category_preference",
                "followed_organizer",
                "popularity",
                "freshness",
                "trusted_producer"
            ]
        );
    }

    #[test]
    fn test_location_groups_are_exclusive() {
        let now = Utc::now();
        let scorer = AffinityScorer::at(now);
        let aggregates = EventAggregates::default();

        // Exact city wins over the country substring
        let mut e = event(now);
        e.location = Some("Cape Town, South Africa".into());
        let mut u = user();
        u.city = Some("Cape Town, South Africa".into());
        assert_eq!(scorer.score(&u, &e, &aggregates), 12);

        u.city = Some("Durban".into());
        assert_eq!(scorer.score(&u, &e, &aggregates), 6);

        u.country = None;
        assert_eq!(scorer.score(&u, &e, &aggregates), 0);
    }

    #[test]
    fn test_blank_locations_score_nothing() {
        let now = Utc::now();
        let scorer = AffinityScorer::at(now);
        let aggregates = EventAggregates::default();

        let mut u = user();
        u.city = Some("".into());
        u.country = Some("".into());

        let mut e = event(now);
        e.location = Some("Lagos".into());
        assert_eq!(scorer.score(&u, &e, &aggregates), 0);

        e.location = None;
        assert_eq!(scorer.score(&u, &e, &aggregates), 0);

        e.location = Some("".into());
        assert_eq!(scorer.score(&u, &e, &aggregates), 0);

        // Real country against a blank event location
        u.country = Some("Nigeria".into());
        e.location = Some("   ".into());
        assert_eq!(scorer.score(&u, &e, &aggregates), 0);
    }

    #[test]
    fn test_trust_groups_are_exclusive() {
        let now = Utc::now();
        let scorer = AffinityScorer::at(now);
        let mut u = user();
        u.city = None;
        u.country = None;
        let e = event(now);

        let score_for = |trust: Option<i32>| {
            scorer.score(
                &u,
                &e,
                &EventAggregates {
                    confirmed_rsvps: 0,
                    organizer_trust: trust,
                },
            )
        };

        assert_eq!(score_for(Some(95)), 10);
        assert_eq!(score_for(Some(80)), 10);
        assert_eq!(score_for(Some(79)), 5);
        assert_eq!(score_for(Some(60)), 5);
        assert_eq!(score_for(Some(59)), 0);
        assert_eq!(score_for(None), 0);
    }

    #[test]
    fn test_popularity_cap_and_viral_bonus() {
        let now = Utc::now();
        let scorer = AffinityScorer::at(now);
        let mut u = user();
        u.city = None;
        u.country = None;
        let e = event(now);

        let busy = EventAggregates {
            confirmed_rsvps: 50,
            organizer_trust: Some(0),
        };
        assert_eq!(scorer.score(&u, &e, &busy), 15);

        let almost = EventAggregates {
            confirmed_rsvps: 49,
            organizer_trust: Some(0),
        };
        assert_eq!(scorer.score(&u, &e, &almost), 10);
    }

    #[test]
    fn test_independent_bonuses() {
        let now = Utc::now();
        let scorer = AffinityScorer::at(now);
        let mut u = user();
        u.city = None;
        u.country = None;
        u.attended_categories.insert("music".into());

        let mut e = event(now);
        e.celebrity = Some("Black Coffee".into());
        e.is_free = true;
        e.created_at = now - Duration::days(2);

        // history 8 + fresh 10 + guest 8 + free 5
        assert_eq!(scorer.score(&u, &e, &EventAggregates::default()), 31);

        e.celebrity = Some("  ".into());
        e.created_at = now - Duration::days(3);
        assert_eq!(scorer.score(&u, &e, &EventAggregates::default()), 13);
    }

    #[test]
    fn test_explain_sums_to_score() {
        let now = Utc::now();
        let scorer = AffinityScorer::at(now);
        let mut e = event(now);
        e.is_free = true;
        let u = user();
        let aggregates = EventAggregates {
            confirmed_rsvps: 7,
            organizer_trust: Some(85),
        };

        let total: i32 = scorer
            .explain(&u, &e, &aggregates)
            .iter()
            .map(|c| c.points)
            .sum();
        assert_eq!(total, scorer.score(&u, &e, &aggregates));
        assert_eq!(total, 12 + 7 + 5 + 10);
    }
}
