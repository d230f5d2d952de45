pub mod badge;
pub mod interactions;
pub mod profile;
pub mod trust_engine;

pub use badge::{badge, TrustBadge};
pub use interactions::{InteractionService, LikeState, SaveState};
pub use profile::{OrganizerTrustProfile, TrustProfileService};
pub use trust_engine::{
    TrustBreakdown, TrustScoreEngine, VERIFIED_BUSINESS_BONUS, VERIFIED_BUSINESS_REASON,
};
