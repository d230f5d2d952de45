use serde::Serialize;
use signal_store::{Event, User, UserProfile};
use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

/// What the scorers know about the requesting user
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    pub user_id: Uuid,
    pub city: Option<String>,
    pub country: Option<String>,
    /// `None` when the user never created a profile
    pub preferences: Option<HashSet<String>>,
    pub followed_organizers: HashSet<Uuid>,
    /// Categories of events the user has RSVPed to
    pub attended_categories: HashSet<String>,
}

impl UserSnapshot {
    pub fn new(user: &User, profile: Option<UserProfile>) -> Self {
        Self {
            user_id: user.id,
            city: user.city.clone(),
            country: user.country.clone(),
            preferences: profile.map(|p| p.preferences.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_history(
        mut self,
        followed_organizers: impl IntoIterator<Item = Uuid>,
        attended_categories: impl IntoIterator<Item = String>,
    ) -> Self {
        self.followed_organizers = followed_organizers.into_iter().collect();
        self.attended_categories = attended_categories.into_iter().collect();
        self
    }

    pub fn prefers(&self, category: &str) -> bool {
        self.preferences
            .as_ref()
            .map_or(false, |p| p.contains(category))
    }

    /// Case-insensitive equality of the user's city and `location`.
    /// Blank values never match.
    pub fn lives_in(&self, location: Option<&str>) -> bool {
        match (non_blank(self.city.as_deref()), non_blank(location)) {
            (Some(city), Some(location)) => city.to_lowercase() == location.to_lowercase(),
            _ => false,
        }
    }
}

/// `None` for missing or whitespace-only text
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Per-event aggregates the scorers read
#[derive(Debug, Clone, Copy, Default)]
pub struct EventAggregates {
    pub confirmed_rsvps: i64,
    /// `None` when the organizer row is missing
    pub organizer_trust: Option<i32>,
}

/// Score produced by whichever strategy ranked the feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum RankScore {
    Affinity(i32),
    Relevance(f32),
}

impl RankScore {
    pub fn as_f64(&self) -> f64 {
        match self {
            RankScore::Affinity(points) => *points as f64,
            RankScore::Relevance(p) => *p as f64,
        }
    }

    /// Descending order; a single feed only ever holds one variant
    pub fn cmp_desc(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RankScore::Affinity(a), RankScore::Affinity(b)) => b.cmp(a),
            _ => other.as_f64().total_cmp(&self.as_f64()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedEvent {
    pub event: Event,
    pub score: RankScore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lives_in_ignores_case() {
        let snapshot = UserSnapshot {
            city: Some("Lagos".into()),
            ..Default::default()
        };
        assert!(snapshot.lives_in(Some("LAGOS")));
        assert!(!snapshot.lives_in(Some("Lagos Island")));
        assert!(!snapshot.lives_in(None));
    }

    #[test]
    fn test_blank_city_matches_nothing() {
        let snapshot = UserSnapshot {
            city: Some("".into()),
            ..Default::default()
        };
        assert!(!snapshot.lives_in(Some("")));
        assert!(!snapshot.lives_in(Some("  ")));

        let snapshot = UserSnapshot {
            city: Some("Lagos".into()),
            ..Default::default()
        };
        assert!(!snapshot.lives_in(Some(" ")));
    }

    #[test]
    fn test_missing_profile_prefers_nothing() {
        let snapshot = UserSnapshot::default();
        assert!(!snapshot.prefers("music"));
    }

    #[test]
    fn test_score_ordering() {
        let mut scores = vec![
            RankScore::Affinity(3),
            RankScore::Affinity(40),
            RankScore::Affinity(12),
        ];
        scores.sort_by(|a, b| a.cmp_desc(b));
        assert_eq!(scores[0], RankScore::Affinity(40));

        assert_eq!(
            RankScore::Relevance(0.9).cmp_desc(&RankScore::Relevance(0.2)),
            Ordering::Less
        );
    }
}
