// 📜 Audit Event - an immutable fact in the ledger
// "Every change is an event"

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AUDIT ACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OfferingCreated,
    OfferingUpdated,
    OfferingDeleted,
    PossessionTriggered,
    PossessionCleared,
    RitualStarted,
    RitualCompleted,
    RitualFailed,
    DataExported,
    DataPurged,
}

impl AuditAction {
    pub const ALL: [AuditAction; 10] = [
        AuditAction::OfferingCreated,
        AuditAction::OfferingUpdated,
        AuditAction::OfferingDeleted,
        AuditAction::PossessionTriggered,
        AuditAction::PossessionCleared,
        AuditAction::RitualStarted,
        AuditAction::RitualCompleted,
        AuditAction::RitualFailed,
        AuditAction::DataExported,
        AuditAction::DataPurged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OfferingCreated => "OFFERING_CREATED",
            AuditAction::OfferingUpdated => "OFFERING_UPDATED",
            AuditAction::OfferingDeleted => "OFFERING_DELETED",
            AuditAction::PossessionTriggered => "POSSESSION_TRIGGERED",
            AuditAction::PossessionCleared => "POSSESSION_CLEARED",
            AuditAction::RitualStarted => "RITUAL_STARTED",
            AuditAction::RitualCompleted => "RITUAL_COMPLETED",
            AuditAction::RitualFailed => "RITUAL_FAILED",
            AuditAction::DataExported => "DATA_EXPORTED",
            AuditAction::DataPurged => "DATA_PURGED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "audit action",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// One fact in the audit ledger.
///
/// The ledger owns its events and never hands them out by reference. Every
/// value a caller sees is a copy (masked or raw), so editing its fields or
/// deserializing a new one leaves the ledger untouched. Only
/// `AuditLogger::log` appends facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_id: String,

    /// Unix milliseconds
    pub timestamp: i64,

    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,

    #[serde(default)]
    pub before_snapshot: Option<serde_json::Value>,

    #[serde(default)]
    pub after_snapshot: Option<serde_json::Value>,

    #[serde(default)]
    pub session_id: Option<String>,
}

impl AuditEvent {
    /// Validate and build an event. Only the audit logger calls this.
    pub(crate) fn new(
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        before_snapshot: Option<serde_json::Value>,
        after_snapshot: Option<serde_json::Value>,
        session_id: Option<String>,
        timestamp: i64,
    ) -> Result<Self, ValidationError> {
        if entity_type.trim().is_empty() {
            return Err(ValidationError::MissingField("entityType"));
        }
        if entity_id.trim().is_empty() {
            return Err(ValidationError::MissingField("entityId"));
        }
        if timestamp < 0 {
            return Err(ValidationError::NegativeTimestamp(timestamp));
        }

        Ok(AuditEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            before_snapshot,
            after_snapshot,
            session_id,
        })
    }
}
