// 🧍 Sessions - one possession engine + one ritual per player
//
// Each Session owns its own state machines; the registry hands them out by
// id behind a Mutex so concurrent callers serialize per session. All sessions
// share the demon registry and the audit ledger.
//
// Workflow operations mirror what a request handler does around the core:
// store → audit → evaluate, patch → audit → maybe clear, delete → audit.

use crate::audit::{AuditLogger, AuditRecord};
use crate::clock::SharedClock;
use crate::demons::DemonRegistry;
use crate::entities::{AuditAction, Demon, Offering, OfferingDraft, OfferingPatch};
use crate::error::{ExorcistError, RitualError};
use crate::possession::PossessionEngine;
use crate::ritual::RitualService;
use crate::store::OfferingStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_SESSION: &str = "default";

/// Result of recording an offering
#[derive(Debug, Clone, Serialize)]
pub struct Recorded {
    pub offering: Offering,
    pub possession: Option<Demon>,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    id: String,
    audit: AuditLogger,
    clock: SharedClock,
    possession: PossessionEngine,
    ritual: RitualService,
}

impl Session {
    pub fn new(
        id: &str,
        demons: Arc<DemonRegistry>,
        audit: AuditLogger,
        clock: SharedClock,
        rng: StdRng,
    ) -> Self {
        Session {
            id: id.to_string(),
            possession: PossessionEngine::new(demons, audit.clone()).for_session(id),
            ritual: RitualService::new(audit.clone(), clock.clone(), rng).for_session(id),
            audit,
            clock,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn possession(&self) -> &PossessionEngine {
        &self.possession
    }

    pub fn ritual(&self) -> &RitualService {
        &self.ritual
    }

    pub fn ritual_mut(&mut self) -> &mut RitualService {
        &mut self.ritual
    }

    /// Validate, store, audit, then judge the offering against everything
    /// else already in the store
    pub fn record_offering(&mut self, store: &OfferingStore, draft: OfferingDraft) -> Result<Recorded, ExorcistError> {
        let offering = Offering::create(draft, self.clock.now_ms())?;
        store.create(offering.clone())?;

        self.audit.log(
            AuditRecord::new(AuditAction::OfferingCreated, "Offering", offering.id())
                .after(offering.snapshot())
                .session(Some(self.id.as_str())),
        );

        let history = store.history_excluding(offering.id());
        let possession = self.possession.evaluate(&offering, &history);

        Ok(Recorded { offering, possession })
    }

    /// Start the ritual for whichever demon currently possesses this session
    pub fn begin_ritual(&mut self) -> Result<Demon, ExorcistError> {
        let demon = self
            .possession
            .active()
            .cloned()
            .ok_or(RitualError::NotPossessed)?;
        self.ritual.start(Some(&demon))?;
        Ok(demon)
    }

    /// Patch the mutable fields of an offering. Exorcising while possessed
    /// lifts the possession and resets the ritual.
    pub fn amend_offering(
        &mut self,
        store: &OfferingStore,
        id: &str,
        patch: &OfferingPatch,
    ) -> Result<Offering, ExorcistError> {
        let (previous, updated) = store.update(id, patch)?;

        if patch.is_exorcised == Some(true) && self.possession.is_possessed() {
            self.possession.clear(id);
            self.ritual.reset();
        }

        self.audit.log(
            AuditRecord::new(AuditAction::OfferingUpdated, "Offering", id)
                .before(previous.snapshot())
                .after(updated.snapshot())
                .session(Some(self.id.as_str())),
        );

        Ok(updated)
    }

    pub fn remove_offering(&mut self, store: &OfferingStore, id: &str) -> Result<Offering, ExorcistError> {
        let removed = store.delete(id)?;
        self.audit.log(
            AuditRecord::new(AuditAction::OfferingDeleted, "Offering", id)
                .before(removed.snapshot())
                .session(Some(self.id.as_str())),
        );
        Ok(removed)
    }

    /// Debug reset of both state machines; writes nothing to the ledger
    pub fn reset(&mut self) {
        self.possession.reset();
        self.ritual.reset();
    }
}

// ============================================================================
// SESSION REGISTRY
// ============================================================================

/// Concurrency-safe map of session id → session, created on first use
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    demons: Arc<DemonRegistry>,
    audit: AuditLogger,
    clock: SharedClock,
    rng_seed: Option<u64>,
}

impl SessionRegistry {
    pub fn new(demons: Arc<DemonRegistry>, audit: AuditLogger, clock: SharedClock, rng_seed: Option<u64>) -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            demons,
            audit,
            clock,
            rng_seed,
        }
    }

    /// Session for `id`, created on first use
    pub fn session(&self, id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "session created");
                let rng = match self.rng_seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                Arc::new(Mutex::new(Session::new(
                    id,
                    self.demons.clone(),
                    self.audit.clone(),
                    self.clock.clone(),
                    rng,
                )))
            })
            .clone()
    }

    /// Run `f` with exclusive access to the session
    pub fn with_session<T>(&self, id: &str, f: impl FnOnce(&mut Session) -> T) -> T {
        let session = self.session(id);
        let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn demons(&self) -> &DemonRegistry {
        &self.demons
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::clock::{utc_ms, ManualClock, Zone};
    use crate::entities::SinCategory;
    use crate::error::StoreError;
    use crate::ritual::RitualState;
    use std::thread;

    fn registry() -> SessionRegistry {
        let clock = Arc::new(ManualClock::new(utc_ms(2024, 6, 1, 12, 0)));
        let demons = Arc::new(DemonRegistry::with_defaults(Zone::utc()).unwrap());
        SessionRegistry::new(demons, AuditLogger::with_clock(clock.clone()), clock, Some(42))
    }

    fn vanity(amount: i64) -> OfferingDraft {
        OfferingDraft::new(amount, "Designer scarf", SinCategory::Vanity)
    }

    #[test]
    fn test_record_offering_audits_and_possesses() {
        let sessions = registry();
        let store = OfferingStore::new();

        let recorded = sessions
            .with_session("alice", |s| s.record_offering(&store, vanity(10_001)))
            .unwrap();
        assert_eq!(recorded.possession.as_ref().unwrap().name(), "Vogue-Zul");
        assert_eq!(store.count(), 1);

        let created = sessions
            .audit()
            .get_events(&AuditFilter::action(AuditAction::OfferingCreated).unmasked());
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].after_snapshot.as_ref().unwrap()["amount"], 10_001);
        assert_eq!(created[0].session_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_invalid_draft_is_not_stored() {
        let sessions = registry();
        let store = OfferingStore::new();
        let result = sessions.with_session("alice", |s| s.record_offering(&store, vanity(0)));
        assert!(matches!(result, Err(ExorcistError::Validation(_))));
        assert_eq!(store.count(), 0);
        assert_eq!(sessions.audit().count(), 0);
    }

    #[test]
    fn test_history_excludes_new_offering() {
        // Sub-Succubus needs four LUST offerings before the current one
        let sessions = registry();
        let store = OfferingStore::new();
        let lust = || OfferingDraft::new(100, "Late night stream", SinCategory::Lust);

        for _ in 0..4 {
            let recorded = sessions.with_session("bob", |s| s.record_offering(&store, lust())).unwrap();
            assert!(recorded.possession.is_none());
        }
        let fifth = sessions.with_session("bob", |s| s.record_offering(&store, lust())).unwrap();
        assert_eq!(fifth.possession.unwrap().name(), "Sub-Succubus");
    }

    #[test]
    fn test_begin_ritual_requires_possession() {
        let sessions = registry();
        let err = sessions.with_session("carol", |s| s.begin_ritual()).unwrap_err();
        assert!(matches!(err, ExorcistError::Ritual(RitualError::NotPossessed)));
    }

    #[test]
    fn test_exorcise_clears_possession_and_ritual() {
        let sessions = registry();
        let store = OfferingStore::new();

        sessions.with_session("dave", |s| {
            let recorded = s.record_offering(&store, vanity(9_000)).unwrap();
            let demon = s.begin_ritual().unwrap();
            assert_eq!(demon.name(), "Vogue-Zul");
            assert_eq!(s.ritual().ritual_state(), RitualState::InProgress);

            let updated = s
                .amend_offering(&store, recorded.offering.id(), &OfferingPatch::exorcise())
                .unwrap();
            assert!(updated.is_exorcised());
            assert!(!s.possession().is_possessed());
            assert_eq!(s.ritual().ritual_state(), RitualState::Idle);
        });

        let audit = sessions.audit();
        assert_eq!(audit.get_events(&AuditFilter::action(AuditAction::PossessionCleared)).len(), 1);
        let updates = audit.get_events(&AuditFilter::action(AuditAction::OfferingUpdated));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].before_snapshot.as_ref().unwrap()["isExorcised"], false);
        assert_eq!(updates[0].after_snapshot.as_ref().unwrap()["isExorcised"], true);
    }

    #[test]
    fn test_amend_rejects_immutable_fields_without_side_effects() {
        let sessions = registry();
        let store = OfferingStore::new();

        sessions.with_session("erin", |s| {
            let recorded = s.record_offering(&store, vanity(9_000)).unwrap();
            let patch = OfferingPatch {
                is_exorcised: Some(true),
                amount: Some(1),
                ..Default::default()
            };
            let err = s.amend_offering(&store, recorded.offering.id(), &patch).unwrap_err();
            assert!(matches!(err, ExorcistError::Store(StoreError::ImmutableField("amount"))));
            // Rejected patch leaves the possession in place
            assert!(s.possession().is_possessed());
        });
    }

    #[test]
    fn test_remove_offering_audits_before_snapshot() {
        let sessions = registry();
        let store = OfferingStore::new();

        let id = sessions
            .with_session("fay", |s| s.record_offering(&store, vanity(100)))
            .unwrap()
            .offering
            .id()
            .to_string();
        sessions.with_session("fay", |s| s.remove_offering(&store, &id)).unwrap();

        assert_eq!(store.count(), 0);
        let deleted = sessions.audit().get_events_by_entity(&id, false);
        let last = deleted.last().unwrap();
        assert_eq!(last.action, AuditAction::OfferingDeleted);
        assert_eq!(last.before_snapshot.as_ref().unwrap()["amount"], "$**.**");

        let missing = sessions.with_session("fay", |s| s.remove_offering(&store, &id));
        assert!(matches!(missing, Err(ExorcistError::Store(StoreError::NotFound(_)))));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let sessions = registry();
        let store = OfferingStore::new();

        sessions.with_session("gina", |s| s.record_offering(&store, vanity(9_000))).unwrap();
        assert!(sessions.with_session("gina", |s| s.possession().is_possessed()));
        assert!(!sessions.with_session("hank", |s| s.possession().is_possessed()));
        assert_eq!(sessions.len(), 2);

        sessions.with_session("gina", |s| s.reset());
        assert!(!sessions.with_session("gina", |s| s.possession().is_possessed()));
        assert!(sessions.remove("gina"));
        assert!(!sessions.contains("gina"));
    }

    #[test]
    fn test_concurrent_sessions() {
        let sessions = Arc::new(registry());
        let store = OfferingStore::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sessions = sessions.clone();
                let store = store.clone();
                thread::spawn(move || {
                    let id = format!("player-{}", i);
                    sessions
                        .with_session(&id, |s| s.record_offering(&store, vanity(9_000)))
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().possession.is_some());
        }
        assert_eq!(store.count(), 8);
        assert_eq!(
            sessions
                .audit()
                .get_events(&AuditFilter::action(AuditAction::PossessionTriggered))
                .len(),
            8
        );
    }
}
