// 📜 Audit Logger - append-only ledger of domain events
//
// Writes never fail the caller: a bad event is logged and dropped.
// Reads redact monetary fields unless the caller explicitly unmasks.
// Stored events keep full-fidelity values forever; masking is display-time only.

use crate::clock::{system_clock, SharedClock};
use crate::entities::{AuditAction, AuditEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Replacement shown instead of a monetary amount
pub const MASKED_AMOUNT: &str = "$**.**";

// ============================================================================
// AUDIT RECORD (write side)
// ============================================================================

/// One event to append, built fluently by the caller
#[derive(Debug, Clone)]
pub struct AuditRecord {
    action: AuditAction,
    entity_type: String,
    entity_id: String,
    before: Option<Value>,
    after: Option<Value>,
    session_id: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, entity_type: &str, entity_id: &str) -> Self {
        AuditRecord {
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            before: None,
            after: None,
            session_id: None,
        }
    }

    pub fn before(mut self, snapshot: Value) -> Self {
        self.before = Some(snapshot);
        self
    }

    pub fn after(mut self, snapshot: Value) -> Self {
        self.after = Some(snapshot);
        self
    }

    pub fn session(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }
}

// ============================================================================
// AUDIT FILTER (read side)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    #[serde(default)]
    pub action: Option<AuditAction>,

    #[serde(default)]
    pub entity_type: Option<String>,

    /// Inclusive lower bound, unix milliseconds
    #[serde(default)]
    pub from: Option<i64>,

    /// Inclusive upper bound, unix milliseconds
    #[serde(default)]
    pub to: Option<i64>,

    /// Show raw amounts. Off unless explicitly requested.
    #[serde(default)]
    pub unmask: bool,
}

impl AuditFilter {
    pub fn action(action: AuditAction) -> Self {
        AuditFilter {
            action: Some(action),
            ..Default::default()
        }
    }

    pub fn unmasked(mut self) -> Self {
        self.unmask = true;
        self
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(action) = self.action {
            if event.action != action {
                return false;
            }
        }
        if let Some(entity_type) = &self.entity_type {
            if &event.entity_type != entity_type {
                return false;
            }
        }
        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.timestamp > to {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// AUDIT LOGGER
// ============================================================================

/// Shared handle to the ledger. Clones append to the same ledger.
#[derive(Clone)]
pub struct AuditLogger {
    events: Arc<RwLock<Vec<AuditEvent>>>,
    clock: SharedClock,
}

impl AuditLogger {
    /// Create an empty ledger stamped by the wall clock
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        AuditLogger {
            events: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    /// Append an event. Construction failures are logged and swallowed.
    pub fn log(&self, record: AuditRecord) {
        let event = AuditEvent::new(
            record.action,
            &record.entity_type,
            &record.entity_id,
            record.before,
            record.after,
            record.session_id,
            self.clock.now_ms(),
        );

        match event {
            Ok(event) => {
                tracing::debug!(
                    action = %event.action,
                    entity_type = %event.entity_type,
                    entity_id = %event.entity_id,
                    "audit event recorded"
                );
                self.events
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event);
            }
            Err(err) => {
                tracing::error!(error = %err, action = %record.action, "failed to log audit event");
            }
        }
    }

    /// Append an event whose action arrives as text (e.g. from a request).
    /// Unknown action names are logged and dropped like any other bad event.
    pub fn log_named(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        before: Option<Value>,
        after: Option<Value>,
        session_id: Option<&str>,
    ) {
        let action = match action.parse::<AuditAction>() {
            Ok(action) => action,
            Err(err) => {
                tracing::error!(error = %err, "failed to log audit event");
                return;
            }
        };

        let mut record = AuditRecord::new(action, entity_type, entity_id).session(session_id);
        record.before = before;
        record.after = after;
        self.log(record);
    }

    /// Copies of the events matching the filter, oldest first, masked unless `filter.unmask`
    pub fn get_events(&self, filter: &AuditFilter) -> Vec<AuditEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events
            .iter()
            .filter(|e| filter.matches(e))
            .map(|e| project(e, filter.unmask))
            .collect()
    }

    /// All events about one entity, masked unless `unmask`
    pub fn get_events_by_entity(&self, entity_id: &str, unmask: bool) -> Vec<AuditEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| project(e, unmask))
            .collect()
    }

    /// Full ledger for export. Always masked.
    pub fn export_all(&self) -> Vec<AuditEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.iter().map(mask_event).collect()
    }

    pub fn count(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Erase the whole ledger. Only compliance purge calls this.
    pub(crate) fn purge(&self) -> usize {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let purged = events.len();
        events.clear();
        purged
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MASKING
// ============================================================================

fn project(event: &AuditEvent, unmask: bool) -> AuditEvent {
    if unmask {
        event.clone()
    } else {
        mask_event(event)
    }
}

/// Copy of the event with numeric `amount` fields redacted in both snapshots
pub fn mask_event(event: &AuditEvent) -> AuditEvent {
    let mut masked = event.clone();
    if let Some(snapshot) = masked.before_snapshot.as_mut() {
        mask_snapshot(snapshot);
    }
    if let Some(snapshot) = masked.after_snapshot.as_mut() {
        mask_snapshot(snapshot);
    }
    masked
}

/// Redact every numeric `amount`, at any depth, inside objects and arrays
fn mask_snapshot(snapshot: &mut Value) {
    match snapshot {
        Value::Object(fields) => {
            for (key, value) in fields.iter_mut() {
                if key == "amount" && value.is_number() {
                    *value = Value::String(MASKED_AMOUNT.to_string());
                } else {
                    mask_snapshot(value);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_snapshot),
        _ => {}
    }
}


// ============================================================================
// TESTS
// ============================================================================
