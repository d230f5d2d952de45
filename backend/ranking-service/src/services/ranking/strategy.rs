/// Which scorer ranks a user's feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategy {
    /// Affinity rules; users below the interaction threshold
    RuleBased,
    /// Relevance model; users at or above the threshold
    Learned,
}

impl ScoringStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringStrategy::RuleBased => "rule_based",
            ScoringStrategy::Learned => "learned",
        }
    }
}

/// Inclusive at `threshold`: exactly `threshold` interactions selects the model.
pub fn select_strategy(interaction_count: i64, threshold: i64) -> ScoringStrategy {
    if interaction_count >= threshold {
        ScoringStrategy::Learned
    } else {
        ScoringStrategy::RuleBased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutover_is_inclusive() {
        assert_eq!(select_strategy(0, 100), ScoringStrategy::RuleBased);
        assert_eq!(select_strategy(99, 100), ScoringStrategy::RuleBased);
        assert_eq!(select_strategy(100, 100), ScoringStrategy::Learned);
        assert_eq!(select_strategy(5_000, 100), ScoringStrategy::Learned);
    }
}
