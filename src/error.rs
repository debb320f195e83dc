// ⚠️ Errors - typed failures for the exorcist engines
//
// Validation failures are surfaced to the caller, ritual usage errors are
// fatal to the call. Broken trigger rules and audit failures never reach
// here: they are recovered where they happen.

use thiserror::Error;

// ============================================================================
// VALIDATION
// ============================================================================

/// Malformed record construction (offering, demon, audit event)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be positive (> 0), got {0}")]
    NonPositiveAmount(i64),

    #[error("description is required and must be a non-empty string")]
    EmptyDescription,

    #[error("description must not exceed {max} characters (got {len})")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("timestamp must be a non-negative integer (unix milliseconds), got {0}")]
    NegativeTimestamp(i64),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("ritual config does not match ritual type {0}")]
    RitualConfigMismatch(String),

    #[error("invalid ritual config: {0}")]
    InvalidRitualConfig(String),

    #[error("invalid dollar amount: \"{0}\"")]
    InvalidMoney(String),
}

// ============================================================================
// RITUAL USAGE
// ============================================================================

/// Programmer errors when driving the ritual state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RitualError {
    #[error("a demon is required to start a ritual")]
    DemonRequired,

    #[error("no ritual in progress (state {0})")]
    NotInProgress(String),

    #[error("not in {expected} ritual (active ritual is {actual})")]
    WrongKind { expected: String, actual: String },

    #[error("not possessed: there is no demon to perform a ritual for")]
    NotPossessed,
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("offering with id \"{0}\" not found")]
    NotFound(String),

    #[error("offering with id \"{0}\" already exists")]
    Duplicate(String),

    #[error("{0} is immutable")]
    ImmutableField(&'static str),
}

// ============================================================================
// COMPLIANCE
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("purge requires explicit confirmation \"yes\"")]
    PurgeNotConfirmed,

    #[error("export serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// UMBRELLA
// ============================================================================

/// Error for session-level workflows that touch several engines
#[derive(Error, Debug)]
pub enum ExorcistError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ritual(#[from] RitualError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Compliance(#[from] ComplianceError),
}
