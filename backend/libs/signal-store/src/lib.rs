//! Signal store
//!
//! Storage-facing half of the feed: entity models, the query interface the
//! ranking and trust score engines read from, the trust score write path and
//! the interaction write paths. Ships a PostgreSQL adapter and an in-memory
//! adapter for tests and local development.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemorySignalStore;
pub use models::{
    AccountStatus, Event, EventInteraction, FlagStatus, InteractionKind, LedgerEntry,
    NewInteraction, Organizer, Rsvp, RsvpStatus, RsvpWrite, TrustScore, TrustSignals, User,
    UserProfile, UserRole, VerificationStatus,
};
pub use postgres::{PgSignalStore, MIGRATOR};
pub use store::{InteractionWriter, SignalStore, TrustSession};

#[cfg(any(test, feature = "mocks"))]
pub use store::{MockInteractionWriter, MockSignalStore};

/// Entity type tag used for likes and saved items on events
pub const EVENT_ENTITY_TYPE: &str = "event";
