// 👁️ Possession Engine - first-match rule evaluation with sticky state
//
// At most one demon possesses at a time. Once possessed, new offerings never
// change or compound the possession until clear() is called.

use crate::audit::{AuditLogger, AuditRecord};
use crate::demons::DemonRegistry;
use crate::entities::{AuditAction, Demon, Offering};
use std::sync::Arc;

pub struct PossessionEngine {
    demons: Arc<DemonRegistry>,
    audit: AuditLogger,
    session_id: Option<String>,
    current: Option<Demon>,
}

impl PossessionEngine {
    pub fn new(demons: Arc<DemonRegistry>, audit: AuditLogger) -> Self {
        PossessionEngine {
            demons,
            audit,
            session_id: None,
            current: None,
        }
    }

    /// Tag every audit event written by this engine with a session id
    pub fn for_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Evaluate a new offering against the registry.
    ///
    /// `history` must not contain `offering`. If already possessed the active
    /// demon is returned without running any trigger.
    pub fn evaluate(&mut self, offering: &Offering, history: &[Offering]) -> Option<Demon> {
        if let Some(current) = &self.current {
            return Some(current.clone());
        }

        let matched = self.demons.iter().find(|demon| {
            match demon.triggers(offering, history) {
                Ok(hit) => hit,
                Err(err) => {
                    tracing::warn!(
                        demon = %demon.name(),
                        offering_id = %offering.id(),
                        error = %err,
                        "demon trigger failed, skipping"
                    );
                    false
                }
            }
        })?;

        let demon = matched.clone();
        tracing::info!(demon = %demon.name(), offering_id = %offering.id(), "possession triggered");

        self.audit.log(
            AuditRecord::new(AuditAction::PossessionTriggered, "Offering", offering.id())
                .after(demon.reference())
                .session(self.session_id.as_deref()),
        );
        self.current = Some(demon.clone());

        Some(demon)
    }

    /// Lift the active possession. No-op when not possessed.
    pub fn clear(&mut self, offering_id: &str) {
        let Some(demon) = self.current.take() else {
            return;
        };

        tracing::info!(demon = %demon.name(), offering_id = %offering_id, "possession cleared");
        self.audit.log(
            AuditRecord::new(AuditAction::PossessionCleared, "Offering", offering_id)
                .before(demon.reference())
                .session(self.session_id.as_deref()),
        );
    }

    pub fn is_possessed(&self) -> bool {
        self.current.is_some()
    }

    pub fn active(&self) -> Option<&Demon> {
        self.current.as_ref()
    }

    /// Forget the possession without auditing (tests / debug reset)
    pub fn reset(&mut self) {
        self.current = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::clock::{utc_ms, Zone};
    use crate::entities::{rule, OfferingDraft, RitualConfig, SinCategory};

    fn offering(amount: i64, category: SinCategory) -> Offering {
        let noon = utc_ms(2024, 6, 1, 12, 0);
        Offering::create(OfferingDraft::new(amount, "Purchase", category).at(noon), noon).unwrap()
    }

    fn engine() -> (PossessionEngine, AuditLogger) {
        let audit = AuditLogger::new();
        let registry = Arc::new(DemonRegistry::with_defaults(Zone::utc()).unwrap());
        (PossessionEngine::new(registry, audit.clone()), audit)
    }

    fn shame() -> RitualConfig {
        RitualConfig::Shame {
            message: "Explain yourself".to_string(),
        }
    }

    #[test]
    fn test_no_match_returns_none() {
        let (mut engine, audit) = engine();
        assert!(engine.evaluate(&offering(100, SinCategory::Vanity), &[]).is_none());
        assert!(!engine.is_possessed());
        assert_eq!(audit.count(), 0);
    }

    #[test]
    fn test_possession_is_sticky() {
        let (mut engine, audit) = engine();

        let first = offering(10001, SinCategory::Vanity);
        let demon = engine.evaluate(&first, &[]).unwrap();
        assert_eq!(demon.name(), "Vogue-Zul");
        assert!(engine.is_possessed());

        // A second VANITY offering of any amount still returns Vogue-Zul
        let second = offering(1, SinCategory::Vanity);
        let again = engine.evaluate(&second, std::slice::from_ref(&first)).unwrap();
        assert_eq!(again, demon);

        // Even one that would match a different demon
        let sloth = offering(100, SinCategory::Sloth);
        assert_eq!(engine.evaluate(&sloth, &[]).unwrap().name(), "Vogue-Zul");

        // Only one trigger was audited
        let triggered = audit.get_events(&AuditFilter::action(AuditAction::PossessionTriggered));
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].entity_id, first.id());
        assert_eq!(triggered[0].after_snapshot.as_ref().unwrap()["demonName"], "Vogue-Zul");
    }

    #[test]
    fn test_clear_audits_and_releases() {
        let (mut engine, audit) = engine();
        let o = offering(100, SinCategory::Sloth);
        engine.evaluate(&o, &[]).unwrap();

        engine.clear(o.id());
        assert!(!engine.is_possessed());
        assert!(engine.active().is_none());

        let cleared = audit.get_events(&AuditFilter::action(AuditAction::PossessionCleared));
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].before_snapshot.as_ref().unwrap()["demonName"], "Uber-Lich");

        // Clearing again is a no-op
        engine.clear(o.id());
        assert_eq!(audit.count(), 2);

        // A new offering can possess again
        assert!(engine.evaluate(&offering(9000, SinCategory::Vanity), &[]).is_some());
    }

    #[test]
    fn test_first_registered_wins() {
        let audit = AuditLogger::new();
        let d1 = Demon::new("D1", "first", rule(|_, _| Ok(true)), shame(), "m").unwrap();
        let d2 = Demon::new("D2", "second", rule(|_, _| Ok(true)), shame(), "m").unwrap();
        let registry = Arc::new(DemonRegistry::from_demons(vec![d1, d2]));

        let mut engine = PossessionEngine::new(registry, audit);
        let demon = engine.evaluate(&offering(1, SinCategory::Greed), &[]).unwrap();
        assert_eq!(demon.name(), "D1");
    }

    #[test]
    fn test_broken_trigger_is_skipped() {
        let audit = AuditLogger::new();
        let broken = Demon::new(
            "Glitch",
            "broken",
            rule(|_, _| Err(anyhow::anyhow!("rule exploded"))),
            shame(),
            "m",
        )
        .unwrap();
        let healthy = Demon::new("Steady", "works", rule(|_, _| Ok(true)), shame(), "m").unwrap();
        let registry = Arc::new(DemonRegistry::from_demons(vec![broken, healthy]));

        let mut engine = PossessionEngine::new(registry, audit);
        let demon = engine.evaluate(&offering(1, SinCategory::Wrath), &[]).unwrap();
        assert_eq!(demon.name(), "Steady");
    }

    #[test]
    fn test_session_tag_and_reset() {
        let (engine, audit) = engine();
        let mut engine = engine.for_session("player-1");
        engine.evaluate(&offering(100, SinCategory::Sloth), &[]).unwrap();

        let events = audit.get_events(&AuditFilter::default());
        assert_eq!(events[0].session_id.as_deref(), Some("player-1"));

        engine.reset();
        assert!(!engine.is_possessed());
        // Reset writes nothing
        assert_eq!(audit.count(), 1);
    }
}
