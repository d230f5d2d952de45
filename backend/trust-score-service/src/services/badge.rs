use serde::Serialize;
use std::fmt;

/// Qualitative label shown next to an organizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrustBadge {
    VerifiedElite,
    Trusted,
    Caution,
    Untrusted,
}

impl TrustBadge {
    pub fn label(&self) -> &'static str {
        match self {
            TrustBadge::VerifiedElite => "Verified Elite",
            TrustBadge::Trusted => "Trusted",
            TrustBadge::Caution => "Caution",
            TrustBadge::Untrusted => "Untrusted",
        }
    }
}

impl fmt::Display for TrustBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive lower bounds, highest first
const THRESHOLDS: [(i32, TrustBadge); 3] = [
    (90, TrustBadge::VerifiedElite),
    (60, TrustBadge::Trusted),
    (30, TrustBadge::Caution),
];

pub fn badge(score: i32) -> TrustBadge {
    THRESHOLDS
        .iter()
        .find(|(min, _)| score >= *min)
        .map(|(_, badge)| *badge)
        .unwrap_or(TrustBadge::Untrusted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(badge(90).label(), "Verified Elite");
        assert_eq!(badge(89).label(), "Trusted");
        assert_eq!(badge(60).label(), "Trusted");
        assert_eq!(badge(59).label(), "Caution");
        assert_eq!(badge(30).label(), "Caution");
        assert_eq!(badge(29).label(), "Untrusted");
    }

    #[test]
    fn test_extremes() {
        assert_eq!(badge(0), TrustBadge::Untrusted);
        assert_eq!(badge(-5), TrustBadge::Untrusted);
        assert_eq!(badge(250), TrustBadge::VerifiedElite);
        assert_eq!(badge(i32::MAX).to_string(), "Verified Elite");
    }
}
