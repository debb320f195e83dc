// Entity Models
// Immutable value records consumed by every engine above them.
//
// Each entity has:
// - Stable identity (UUID) that NEVER changes
// - Values that change only by building a new record

pub mod offering;
pub mod demon;
pub mod audit_event;

pub use offering::{Offering, OfferingDraft, OfferingPatch, SinCategory, MAX_DESCRIPTION_LEN};
pub use demon::{rule, Demon, RitualConfig, RitualKind, Trigger};
pub use audit_event::{AuditAction, AuditEvent};
