// 👹 Demon Registry - the fixed, ordered rule set
//
// Registration order is evaluation order: the possession engine returns the
// FIRST demon whose trigger matches. Never sort, never dedupe.

use crate::clock::Zone;
use crate::entities::{rule, Demon, Offering, RitualConfig, SinCategory};
use crate::error::ValidationError;

// ============================================================================
// DEMON REGISTRY
// ============================================================================

/// Read-only ordered list of demons, built once at startup
#[derive(Debug, Clone, Default)]
pub struct DemonRegistry {
    demons: Vec<Demon>,
}

impl DemonRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        DemonRegistry { demons: Vec::new() }
    }

    /// Create a registry from demons in evaluation order
    pub fn from_demons(demons: Vec<Demon>) -> Self {
        DemonRegistry { demons }
    }

    /// The ten standard demons, hour rules read in the given zone
    pub fn with_defaults(zone: Zone) -> Result<Self, ValidationError> {
        Ok(DemonRegistry {
            demons: default_demons(zone)?,
        })
    }

    /// Append a demon at the end (lowest precedence)
    pub fn register(&mut self, demon: Demon) {
        self.demons.push(demon);
    }

    pub fn demons(&self) -> &[Demon] {
        &self.demons
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Demon> {
        self.demons.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Demon> {
        self.demons.iter().find(|d| d.name() == name)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Demon> {
        self.demons.iter().find(|d| d.id() == id)
    }

    pub fn len(&self) -> usize {
        self.demons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demons.is_empty()
    }
}

fn mentions(offering: &Offering, word: &str) -> bool {
    offering.description().to_lowercase().contains(word)
}

/// Standard demons in precedence order
///
/// 1. Vogue-Zul          VANITY over $50                    → MANTRA ×30
/// 2. Gluttonous Rex     GLUTTONY between 01:00 and 04:00   → MATH (×, 3 problems)
/// 3. Uber-Lich          SLOTH under $15                    → WAIT 5 min
/// 4. Latte-Lucifer      "coffee" over $6                   → MANTRA ×10
/// 5. Sub-Succubus       5th LUST offering                  → WAIT 60 s
/// 6. Amazonian Imp      GREED after 23:00                  → MATH (%, 1 problem)
/// 7. Stream-O-Phobia    LUST over $15                      → SHAME
/// 8. Hoard-Wraith       GLUTTONY over $200                 → MANTRA ×1
/// 9. Penny-Poltergeist  GREED ending in .99                → MATH (±, 5 problems)
/// 10. Debt-Diablo       WRATH mentioning "interest"        → MANTRA ×50
fn default_demons(zone: Zone) -> Result<Vec<Demon>, ValidationError> {
    Ok(vec![
        Demon::new(
            "Vogue-Zul",
            "The Demon of Vanity",
            rule(|o, _| Ok(o.category() == SinCategory::Vanity && o.amount() > 5000)),
            RitualConfig::Mantra {
                target_string: "I am not my fabric".to_string(),
                repetitions: 30,
            },
            "VOGUE-ZUL demands you face your vanity! Type the sacred mantra 30 times!",
        )?,
        Demon::new(
            "Gluttonous Rex",
            "The Demon of Gluttony",
            rule(move |o, _| {
                Ok(o.category() == SinCategory::Gluttony && zone.hour_in_range(o.timestamp(), 1, 4))
            }),
            RitualConfig::Math {
                difficulty: 2,
                problem_count: 3,
            },
            "GLUTTONOUS REX grinds his teeth! Solve these arithmetic problems to satiate him!",
        )?,
        Demon::new(
            "Uber-Lich",
            "The Demon of Sloth",
            rule(|o, _| Ok(o.category() == SinCategory::Sloth && o.amount() < 1500)),
            RitualConfig::Wait {
                duration_seconds: 300,
            },
            "UBER-LICH has cursed you to wait! You must sit in silence for 5 minutes.",
        )?,
        Demon::new(
            "Latte-Lucifer",
            "The Demon of Caffeine Addiction",
            rule(|o, _| Ok(mentions(o, "coffee") && o.amount() > 600)),
            RitualConfig::Mantra {
                target_string: "It is just bean water".to_string(),
                repetitions: 10,
            },
            "LATTE-LUCIFER hisses! Recite the truth about your bean water addiction!",
        )?,
        Demon::new(
            "Sub-Succubus",
            "The Demon of Lust",
            rule(|o, history| {
                let lust_count = history
                    .iter()
                    .filter(|h| h.category() == SinCategory::Lust)
                    .count();
                Ok(o.category() == SinCategory::Lust && lust_count >= 4)
            }),
            RitualConfig::Wait {
                duration_seconds: 60,
            },
            "SUB-SUCCUBUS emerges! Meditate for 60 seconds before you may proceed.",
        )?,
        Demon::new(
            "Amazonian Imp",
            "The Demon of Nocturnal Greed",
            rule(move |o, _| {
                Ok(o.category() == SinCategory::Greed && zone.hour_in_range(o.timestamp(), 23, 24))
            }),
            RitualConfig::Math {
                difficulty: 3,
                problem_count: 1,
            },
            "The AMAZONIAN IMP cackles in the darkness! Solve this fiendish puzzle!",
        )?,
        Demon::new(
            "Stream-O-Phobia",
            "The Demon of Streaming Services",
            rule(|o, _| Ok(o.category() == SinCategory::Lust && o.amount() > 1500)),
            RitualConfig::Shame {
                message: "Name a book you have not read".to_string(),
            },
            "STREAM-O-PHOBIA demands you name a book you swore to read but never did!",
        )?,
        Demon::new(
            "Hoard-Wraith",
            "The Demon of Excess",
            rule(|o, _| Ok(o.category() == SinCategory::Gluttony && o.amount() > 20000)),
            RitualConfig::Mantra {
                target_string: "List every item".to_string(),
                repetitions: 1,
            },
            "HOARD-WRAITH materialises! You must list every item you purchased!",
        )?,
        Demon::new(
            "Penny-Poltergeist",
            "The Demon of Psychological Pricing",
            rule(|o, _| Ok(o.category() == SinCategory::Greed && o.amount() % 100 == 99)),
            RitualConfig::Math {
                difficulty: 1,
                problem_count: 5,
            },
            "PENNY-POLTERGEIST clangs its coins! Five simple calculations await!",
        )?,
        Demon::new(
            "Debt-Diablo",
            "The Demon of Interest Payments",
            rule(|o, _| Ok(o.category() == SinCategory::Wrath && mentions(o, "interest"))),
            RitualConfig::Mantra {
                target_string: "I am a slave to APR".to_string(),
                repetitions: 50,
            },
            "DEBT-DIABLO rises from the abyss! Face your financial servitude!",
        )?,
    ])
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::utc_ms;
    use crate::entities::{OfferingDraft, RitualKind};

    fn noon() -> i64 {
        utc_ms(2024, 6, 1, 12, 0)
    }

    fn registry() -> DemonRegistry {
        DemonRegistry::with_defaults(Zone::utc()).unwrap()
    }

    fn offering(amount: i64, description: &str, category: SinCategory, ts: i64) -> Offering {
        Offering::create(OfferingDraft::new(amount, description, category).at(ts), ts).unwrap()
    }

    fn first_match(registry: &DemonRegistry, o: &Offering, history: &[Offering]) -> Option<String> {
        registry
            .iter()
            .find(|d| d.triggers(o, history).unwrap_or(false))
            .map(|d| d.name().to_string())
    }

    #[test]
    fn test_registry_order() {
        let registry = registry();
        let names: Vec<&str> = registry.iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec![
                "Vogue-Zul",
                "Gluttonous Rex",
                "Uber-Lich",
                "Latte-Lucifer",
                "Sub-Succubus",
                "Amazonian Imp",
                "Stream-O-Phobia",
                "Hoard-Wraith",
                "Penny-Poltergeist",
                "Debt-Diablo",
            ]
        );
    }

    #[test]
    fn test_register_appends_lowest_precedence() {
        let mut custom = DemonRegistry::new();
        assert!(custom.is_empty());

        let shame = || RitualConfig::Shame {
            message: "Explain the receipt".to_string(),
        };
        custom.register(Demon::new("First", "catches all", rule(|_, _| Ok(true)), shame(), "m").unwrap());
        custom.register(Demon::new("Second", "catches all", rule(|_, _| Ok(true)), shame(), "m").unwrap());

        assert_eq!(custom.demons().len(), 2);
        assert_eq!(custom.demons()[1].name(), "Second");
        let any = offering(1, "Anything", SinCategory::Wrath, noon());
        assert_eq!(first_match(&custom, &any, &[]).as_deref(), Some("First"));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        let rex = registry.find_by_name("Gluttonous Rex").unwrap();
        assert_eq!(rex.ritual_type(), RitualKind::Math);
        assert_eq!(registry.find_by_id(rex.id()).unwrap().name(), "Gluttonous Rex");
        assert!(registry.find_by_name("Envy-Eel").is_none());
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_vogue_zul_threshold() {
        let registry = registry();
        let at_limit = offering(5000, "Shoes", SinCategory::Vanity, noon());
        let over = offering(5001, "Shoes", SinCategory::Vanity, noon());

        assert_eq!(first_match(&registry, &at_limit, &[]), None);
        assert_eq!(first_match(&registry, &over, &[]).as_deref(), Some("Vogue-Zul"));
    }

    #[test]
    fn test_hour_rules_use_zone() {
        let registry = registry();
        let two_am = utc_ms(2024, 6, 1, 2, 0);
        let snack = offering(800, "Kebab", SinCategory::Gluttony, two_am);
        assert_eq!(first_match(&registry, &snack, &[]).as_deref(), Some("Gluttonous Rex"));

        // Same instant read in UTC+6 is 08:00: no match
        let shifted = DemonRegistry::with_defaults(Zone::Fixed(6 * 3600)).unwrap();
        assert_eq!(first_match(&shifted, &snack, &[]), None);

        let late_cart = offering(1000, "Gadget", SinCategory::Greed, utc_ms(2024, 6, 1, 23, 15));
        assert_eq!(first_match(&registry, &late_cart, &[]).as_deref(), Some("Amazonian Imp"));
    }

    #[test]
    fn test_sub_succubus_needs_four_prior_lust() {
        let registry = registry();
        let history: Vec<Offering> = (0..4)
            .map(|_| offering(100, "Date night", SinCategory::Lust, noon()))
            .collect();
        let fifth = offering(100, "Date night", SinCategory::Lust, noon());

        assert_eq!(first_match(&registry, &fifth, &history[..3]), None);
        assert_eq!(first_match(&registry, &fifth, &history).as_deref(), Some("Sub-Succubus"));
    }

    #[test]
    fn test_first_match_precedence() {
        let registry = registry();

        // Matches Gluttonous Rex (2) and Hoard-Wraith (8) → Rex wins
        let feast = offering(25000, "Feast", SinCategory::Gluttony, utc_ms(2024, 6, 1, 3, 0));
        assert_eq!(first_match(&registry, &feast, &[]).as_deref(), Some("Gluttonous Rex"));

        // Matches Amazonian Imp (6) and Penny-Poltergeist (9) → Imp wins
        let priced = offering(1999, "Gadget", SinCategory::Greed, utc_ms(2024, 6, 1, 23, 30));
        assert_eq!(first_match(&registry, &priced, &[]).as_deref(), Some("Amazonian Imp"));

        // Matches Latte-Lucifer (4) and Stream-O-Phobia (7) → Lucifer wins
        let odd = offering(2000, "Coffee with a date", SinCategory::Lust, noon());
        assert_eq!(first_match(&registry, &odd, &[]).as_deref(), Some("Latte-Lucifer"));
    }

    #[test]
    fn test_description_rules_are_case_insensitive() {
        let registry = registry();
        let latte = offering(650, "Oat COFFEE", SinCategory::Gluttony, noon());
        assert_eq!(first_match(&registry, &latte, &[]).as_deref(), Some("Latte-Lucifer"));

        let card = offering(3000, "Card Interest charge", SinCategory::Wrath, noon());
        assert_eq!(first_match(&registry, &card, &[]).as_deref(), Some("Debt-Diablo"));
    }

    #[test]
    fn test_penny_poltergeist() {
        let registry = registry();
        let priced = offering(1999, "Gadget", SinCategory::Greed, noon());
        assert_eq!(first_match(&registry, &priced, &[]).as_deref(), Some("Penny-Poltergeist"));

        let round = offering(2000, "Gadget", SinCategory::Greed, noon());
        assert_eq!(first_match(&registry, &round, &[]), None);
    }
}
