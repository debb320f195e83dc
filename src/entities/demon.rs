// 👹 Demon Entity - a named spending rule plus its punishment
//
// The trigger is a plain predicate behind a trait object, so any logic can be
// registered and tested in isolation. A trigger that returns Err is a broken
// rule; the possession engine skips it.

use crate::entities::offering::Offering;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// RITUAL KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RitualKind {
    Mantra,
    Math,
    Wait,
    Shame,
}

impl RitualKind {
    pub const ALL: [RitualKind; 4] = [
        RitualKind::Mantra,
        RitualKind::Math,
        RitualKind::Wait,
        RitualKind::Shame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RitualKind::Mantra => "MANTRA",
            RitualKind::Math => "MATH",
            RitualKind::Wait => "WAIT",
            RitualKind::Shame => "SHAME",
        }
    }
}

impl fmt::Display for RitualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RitualKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RitualKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "ritual type",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// RITUAL CONFIG
// ============================================================================

/// Kind-specific ritual parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RitualConfig {
    #[serde(rename_all = "camelCase")]
    Mantra { target_string: String, repetitions: u32 },

    #[serde(rename_all = "camelCase")]
    Math { difficulty: u8, problem_count: u32 },

    #[serde(rename_all = "camelCase")]
    Wait { duration_seconds: u64 },

    Shame { message: String },
}

impl RitualConfig {
    pub fn kind(&self) -> RitualKind {
        match self {
            RitualConfig::Mantra { .. } => RitualKind::Mantra,
            RitualConfig::Math { .. } => RitualKind::Math,
            RitualConfig::Wait { .. } => RitualKind::Wait,
            RitualConfig::Shame { .. } => RitualKind::Shame,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RitualConfig::Mantra {
                target_string,
                repetitions,
            } => {
                if target_string.trim().is_empty() {
                    return Err(ValidationError::InvalidRitualConfig(
                        "mantra target string is required".to_string(),
                    ));
                }
                if *repetitions == 0 {
                    return Err(ValidationError::InvalidRitualConfig(
                        "mantra repetitions must be at least 1".to_string(),
                    ));
                }
            }
            RitualConfig::Math {
                difficulty,
                problem_count,
            } => {
                if !(1..=3).contains(difficulty) {
                    return Err(ValidationError::InvalidRitualConfig(format!(
                        "math difficulty must be 1, 2 or 3 (got {})",
                        difficulty
                    )));
                }
                if *problem_count == 0 {
                    return Err(ValidationError::InvalidRitualConfig(
                        "math problem count must be at least 1".to_string(),
                    ));
                }
            }
            RitualConfig::Wait { .. } | RitualConfig::Shame { .. } => {}
        }
        Ok(())
    }
}

// ============================================================================
// TRIGGER
// ============================================================================

/// Spending rule evaluated against a new offering and its history
/// (history never contains the offering itself)
pub trait Trigger: Send + Sync {
    fn matches(&self, offering: &Offering, history: &[Offering]) -> anyhow::Result<bool>;
}

impl<F> Trigger for F
where
    F: Fn(&Offering, &[Offering]) -> anyhow::Result<bool> + Send + Sync,
{
    fn matches(&self, offering: &Offering, history: &[Offering]) -> anyhow::Result<bool> {
        self(offering, history)
    }
}

/// Pins a closure to the trigger signature so its argument lifetimes and
/// error type are inferred
pub fn rule<F>(predicate: F) -> F
where
    F: Fn(&Offering, &[Offering]) -> anyhow::Result<bool> + Send + Sync,
{
    predicate
}

// ============================================================================
// DEMON
// ============================================================================

/// Demon - static rule descriptor. Cheap to clone (trigger is shared).
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Demon {
    id: String,
    name: String,
    title: String,
    #[serde(skip)]
    trigger: Arc<dyn Trigger>,
    ritual_type: RitualKind,
    ritual_config: RitualConfig,
    punishment_message: String,
}

impl Demon {
    /// Validate and mint a demon with a fresh UUID
    pub fn new(
        name: &str,
        title: &str,
        trigger: impl Trigger + 'static,
        ritual_config: RitualConfig,
        punishment_message: &str,
    ) -> Result<Self, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("demon name"));
        }
        if title.trim().is_empty() {
            return Err(ValidationError::MissingField("demon title"));
        }
        if punishment_message.trim().is_empty() {
            return Err(ValidationError::MissingField("punishment message"));
        }
        ritual_config.validate()?;

        Ok(Demon {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            title: title.to_string(),
            trigger: Arc::new(trigger),
            ritual_type: ritual_config.kind(),
            ritual_config,
            punishment_message: punishment_message.to_string(),
        })
    }

    /// Like `new`, but with the ritual type stated explicitly (e.g. parsed from
    /// configuration); it must agree with the config variant.
    pub fn with_ritual_type(
        name: &str,
        title: &str,
        trigger: impl Trigger + 'static,
        ritual_type: RitualKind,
        ritual_config: RitualConfig,
        punishment_message: &str,
    ) -> Result<Self, ValidationError> {
        if ritual_config.kind() != ritual_type {
            return Err(ValidationError::RitualConfigMismatch(ritual_type.to_string()));
        }
        Demon::new(name, title, trigger, ritual_config, punishment_message)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn ritual_type(&self) -> RitualKind {
        self.ritual_type
    }

    pub fn ritual_config(&self) -> &RitualConfig {
        &self.ritual_config
    }

    pub fn punishment_message(&self) -> &str {
        &self.punishment_message
    }

    pub fn triggers(&self, offering: &Offering, history: &[Offering]) -> anyhow::Result<bool> {
        self.trigger.matches(offering, history)
    }

    /// Reference projection written into audit snapshots
    pub fn reference(&self) -> serde_json::Value {
        serde_json::json!({
            "demonId": self.id,
            "demonName": self.name,
        })
    }
}

impl PartialEq for Demon {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Demon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demon")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ritual_type", &self.ritual_type)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::offering::{OfferingDraft, SinCategory};

    fn always(_: &Offering, _: &[Offering]) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn mantra() -> RitualConfig {
        RitualConfig::Mantra {
            target_string: "test".to_string(),
            repetitions: 2,
        }
    }

    #[test]
    fn test_demon_creation() {
        let demon = Demon::new("Tester", "The Demon of Tests", always, mantra(), "Repent").unwrap();

        assert_eq!(demon.name(), "Tester");
        assert_eq!(demon.ritual_type(), RitualKind::Mantra);
        assert_eq!(demon.id().len(), 36);
        assert_eq!(demon.reference()["demonName"], "Tester");
    }

    #[test]
    fn test_demon_requires_fields() {
        assert_eq!(
            Demon::new(" ", "t", always, mantra(), "m").unwrap_err(),
            ValidationError::MissingField("demon name")
        );
        assert_eq!(
            Demon::new("n", "", always, mantra(), "m").unwrap_err(),
            ValidationError::MissingField("demon title")
        );
        assert_eq!(
            Demon::new("n", "t", always, mantra(), "").unwrap_err(),
            ValidationError::MissingField("punishment message")
        );
    }

    #[test]
    fn test_demon_rejects_bad_ritual_config() {
        let zero_reps = RitualConfig::Mantra {
            target_string: "x".to_string(),
            repetitions: 0,
        };
        assert!(Demon::new("n", "t", always, zero_reps, "m").is_err());

        let hard_math = RitualConfig::Math {
            difficulty: 4,
            problem_count: 1,
        };
        assert!(Demon::new("n", "t", always, hard_math, "m").is_err());
    }

    #[test]
    fn test_ritual_type_must_match_config() {
        let result = Demon::with_ritual_type("n", "t", always, RitualKind::Wait, mantra(), "m");
        assert_eq!(
            result.unwrap_err(),
            ValidationError::RitualConfigMismatch("WAIT".to_string())
        );
    }

    #[test]
    fn test_closure_trigger() {
        let demon = Demon::new(
            "Big Spender",
            "t",
            rule(|o, _| Ok(o.amount() > 100)),
            mantra(),
            "m",
        )
        .unwrap();

        let small = Offering::create(OfferingDraft::new(50, "x", SinCategory::Greed), 0).unwrap();
        let big = Offering::create(OfferingDraft::new(500, "x", SinCategory::Greed), 0).unwrap();

        assert!(!demon.triggers(&small, &[]).unwrap());
        assert!(demon.triggers(&big, &[]).unwrap());
    }

    #[test]
    fn test_ritual_config_serialization() {
        let json = serde_json::to_value(RitualConfig::Wait { duration_seconds: 60 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "WAIT", "durationSeconds": 60}));

        assert_eq!("SHAME".parse::<RitualKind>().unwrap(), RitualKind::Shame);
        assert!("PRAYER".parse::<RitualKind>().is_err());
    }
}
