// Financial Exorcist - Core Library
// Possession rules, rituals, audit ledger and soul purity scoring over a
// history of spending "offerings". Used by the CLI and by tests.

pub mod error;
pub mod clock;
pub mod config;
pub mod entities;   // Offering / Demon / AuditEvent value records
pub mod demons;     // The ordered demon registry
pub mod audit;      // Append-only ledger with read-time masking
pub mod possession; // First-match possession engine
pub mod ritual;     // Ritual state machine (MANTRA / MATH / WAIT / SHAME)
pub mod purity;     // Soul purity scoring
pub mod store;      // In-memory offering store
pub mod session;    // Per-player state machines + workflow
pub mod compliance; // Export / purge
pub mod money;

// Re-export commonly used types
pub use error::{ComplianceError, ExorcistError, RitualError, StoreError, ValidationError};
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock, Zone};
pub use config::{ExorcistConfig, Overrides};
pub use entities::{
    rule, AuditAction, AuditEvent, Demon, Offering, OfferingDraft, OfferingPatch,
    RitualConfig, RitualKind, SinCategory, Trigger,
};
pub use demons::DemonRegistry;
pub use audit::{mask_event, AuditFilter, AuditLogger, AuditRecord, MASKED_AMOUNT};
pub use possession::PossessionEngine;
pub use ritual::{
    generate_problem, MantraOutcome, MathOutcome, MathProblem, RitualService,
    RitualSnapshot, RitualState,
};
pub use purity::{Breakdown, SoulPurityCalculator, SoulReport};
pub use store::OfferingStore;
pub use session::{Recorded, Session, SessionRegistry, DEFAULT_SESSION};
pub use compliance::{DataExport, PurgeSummary};
pub use money::{to_cents, to_display};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
