// 📦 Compliance - data portability (export) and erasure (purge)
//
// Export is masked like any other audit read and carries a SHA-256 digest of
// its payload so a downloaded file can be checked later. Purge is the one
// place the ledger is ever emptied; it records DATA_PURGED before clearing.

use crate::audit::{AuditLogger, AuditRecord};
use crate::entities::{AuditAction, AuditEvent, Offering};
use crate::error::ComplianceError;
use crate::store::OfferingStore;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const PURGE_CONFIRMATION: &str = "yes";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub offerings: Vec<Offering>,
    pub audit_events: Vec<AuditEvent>,
    /// RFC 3339, UTC
    pub exported_at: String,
    /// Hex SHA-256 of the JSON for `{offerings, auditEvents}`
    pub digest: String,
}

impl DataExport {
    /// Recompute the digest and compare it with the stored one
    pub fn verify(&self) -> Result<bool, ComplianceError> {
        Ok(payload_digest(&self.offerings, &self.audit_events)? == self.digest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSummary {
    pub offerings_purged: usize,
    /// Includes the DATA_PURGED event itself
    pub audit_events_purged: usize,
}

fn payload_digest(offerings: &[Offering], audit_events: &[AuditEvent]) -> Result<String, ComplianceError> {
    let payload = serde_json::json!({
        "offerings": offerings,
        "auditEvents": audit_events,
    });
    let bytes = serde_json::to_vec(&payload).map_err(|e| ComplianceError::Serialization(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Everything we hold about the user. Audit amounts are masked.
pub fn export(store: &OfferingStore, audit: &AuditLogger, now_ms: i64) -> Result<DataExport, ComplianceError> {
    let offerings = store.get_all();
    let audit_events = audit.export_all();
    let digest = payload_digest(&offerings, &audit_events)?;

    let exported_at = DateTime::from_timestamp_millis(now_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default();

    audit.log(
        AuditRecord::new(AuditAction::DataExported, "System", "export").after(serde_json::json!({
            "offeringCount": offerings.len(),
            "auditEventCount": audit_events.len(),
        })),
    );
    tracing::info!(offerings = offerings.len(), audit_events = audit_events.len(), "data exported");

    Ok(DataExport {
        offerings,
        audit_events,
        exported_at,
        digest,
    })
}

/// Irreversibly erase offerings and the audit ledger. `confirmation` must be "yes".
pub fn purge(store: &OfferingStore, audit: &AuditLogger, confirmation: &str) -> Result<PurgeSummary, ComplianceError> {
    if confirmation != PURGE_CONFIRMATION {
        return Err(ComplianceError::PurgeNotConfirmed);
    }

    let offering_count = store.count();
    let audit_event_count = audit.count();

    audit.log(
        AuditRecord::new(AuditAction::DataPurged, "System", "purge").before(serde_json::json!({
            "offeringCount": offering_count,
            "auditEventCount": audit_event_count,
        })),
    );

    store.clear();
    audit.purge();
    tracing::warn!(offerings = offering_count, audit_events = audit_event_count, "all data purged");

    Ok(PurgeSummary {
        offerings_purged: offering_count,
        audit_events_purged: audit_event_count + 1,
    })
}
