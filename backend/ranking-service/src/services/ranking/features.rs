use super::model::FEATURE_VECTOR_SIZE;
use crate::models::{EventAggregates, UserSnapshot};
use signal_store::Event;

/// Relevance model input.
///
/// Layout: [category_match, location_match, organizer_trust_score]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector(pub [f32; FEATURE_VECTOR_SIZE]);

impl FeatureVector {
    pub const ZERO: FeatureVector = FeatureVector([0.0; FEATURE_VECTOR_SIZE]);
}

/// Build the model input for one (user, event) pair.
///
/// A user without a profile or an event without an organizer yields
/// [`FeatureVector::ZERO`].
pub fn extract_features(
    user: &UserSnapshot,
    event: &Event,
    aggregates: &EventAggregates,
) -> FeatureVector {
    let (Some(_), Some(trust)) = (user.preferences.as_ref(), aggregates.organizer_trust) else {
        return FeatureVector::ZERO;
    };

    let category_match = event
        .category
        .as_deref()
        .map_or(false, |c| user.prefers(c));
    let location_match = user.lives_in(event.location.as_deref());

    FeatureVector([
        if category_match { 1.0 } else { 0.0 },
        if location_match { 1.0 } else { 0.0 },
        trust as f32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event() -> Event {
        Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            name: "Harbour Food Market".into(),
            category: Some("food".into()),
            location: Some("Mombasa".into()),
            celebrity: None,
            is_free: true,
            is_paid: false,
            max_capacity: None,
            status: "upcoming".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_matching_user() {
        let user = UserSnapshot {
            city: Some("mombasa".into()),
            preferences: Some(["food".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let aggregates = EventAggregates {
            confirmed_rsvps: 3,
            organizer_trust: Some(64),
        };

        assert_eq!(
            extract_features(&user, &event(), &aggregates),
            FeatureVector([1.0, 1.0, 64.0])
        );
    }

    #[test]
    fn test_no_profile_is_zero_vector() {
        let user = UserSnapshot {
            city: Some("Mombasa".into()),
            preferences: None,
            ..Default::default()
        };
        let aggregates = EventAggregates {
            confirmed_rsvps: 0,
            organizer_trust: Some(90),
        };
        assert_eq!(
            extract_features(&user, &event(), &aggregates),
            FeatureVector::ZERO
        );
    }

    #[test]
    fn test_blank_city_is_no_location_match() {
        let user = UserSnapshot {
            city: Some("".into()),
            preferences: Some(["food".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let mut e = event();
        e.location = Some("".into());
        let aggregates = EventAggregates {
            confirmed_rsvps: 0,
            organizer_trust: Some(40),
        };

        assert_eq!(
            extract_features(&user, &e, &aggregates),
            FeatureVector([1.0, 0.0, 40.0])
        );
    }

    #[test]
    fn test_missing_organizer_is_zero_vector() {
        let user = UserSnapshot {
            preferences: Some(Default::default()),
            ..Default::default()
        };
        assert_eq!(
            extract_features(&user, &event(), &EventAggregates::default()),
            FeatureVector::ZERO
        );
    }
}
