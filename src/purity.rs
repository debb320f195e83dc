// ⚖️ Soul Purity Calculator - pure scoring over offerings and audit history
//
// base 100
//   −5 per unexorcised offering, −2 per exorcised offering
//   −10 per offering above 10000 minor units
//   −15 per offering made between 23:00 and 04:00
//   +3 per RITUAL_COMPLETED
//   +5 if there are offerings and no POSSESSION_TRIGGERED in the last 7 days
// floored at 0, no ceiling

use crate::clock::Zone;
use crate::entities::{AuditAction, AuditEvent, Offering, SinCategory};
use serde::Serialize;
use std::collections::BTreeMap;

pub const BASE_PURITY: i64 = 100;
pub const UNEXORCISED_PENALTY: i64 = 5;
pub const EXORCISED_PENALTY: i64 = 2;
pub const LARGE_AMOUNT_THRESHOLD: i64 = 10_000;
pub const LARGE_AMOUNT_PENALTY: i64 = 10;
pub const LATE_NIGHT_PENALTY: i64 = 15;
pub const RITUAL_BONUS: i64 = 3;
pub const CLEAN_WEEK_BONUS: i64 = 5;
pub const CLEAN_WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const LATE_NIGHT_START: u32 = 23;
const LATE_NIGHT_END: u32 = 4;

/// Spend per category, every category present
pub type Breakdown = BTreeMap<SinCategory, i64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoulReport {
    pub soul_purity: i64,
    pub breakdown: Breakdown,
    pub total_offerings: usize,
    pub total_spend: i64,
    pub exorcised_count: usize,
    pub total_possessions: usize,
    /// Percentage 0-100; 0 when there are no offerings
    pub exorcism_success_rate: f64,
}

/// Stateless scorer. The zone decides what "late night" means.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoulPurityCalculator {
    zone: Zone,
}

impl SoulPurityCalculator {
    pub fn new(zone: Zone) -> Self {
        SoulPurityCalculator { zone }
    }

    pub fn calculate_purity(&self, offerings: &[Offering], events: &[AuditEvent], now_ms: i64) -> i64 {
        let mut score = BASE_PURITY;

        for offering in offerings {
            score -= if offering.is_exorcised() {
                EXORCISED_PENALTY
            } else {
                UNEXORCISED_PENALTY
            };

            if offering.amount() > LARGE_AMOUNT_THRESHOLD {
                score -= LARGE_AMOUNT_PENALTY;
            }

            if self
                .zone
                .hour_in_range(offering.timestamp(), LATE_NIGHT_START, LATE_NIGHT_END)
            {
                score -= LATE_NIGHT_PENALTY;
            }
        }

        score += RITUAL_BONUS * count_action(events, AuditAction::RitualCompleted) as i64;

        let window_start = now_ms - CLEAN_WEEK_MS;
        let recent_possession = events
            .iter()
            .any(|e| e.action == AuditAction::PossessionTriggered && e.timestamp >= window_start);
        if !offerings.is_empty() && !recent_possession {
            score += CLEAN_WEEK_BONUS;
        }

        score.max(0)
    }

    pub fn get_breakdown(&self, offerings: &[Offering]) -> Breakdown {
        let mut breakdown: Breakdown = SinCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for offering in offerings {
            let slot = breakdown.entry(offering.category()).or_insert(0);
            *slot = slot.saturating_add(offering.amount());
        }
        breakdown
    }

    pub fn get_report(&self, offerings: &[Offering], events: &[AuditEvent], now_ms: i64) -> SoulReport {
        let total_offerings = offerings.len();
        let exorcised_count = offerings.iter().filter(|o| o.is_exorcised()).count();

        let exorcism_success_rate = if total_offerings > 0 {
            exorcised_count as f64 / total_offerings as f64 * 100.0
        } else {
            0.0
        };

        SoulReport {
            soul_purity: self.calculate_purity(offerings, events, now_ms),
            breakdown: self.get_breakdown(offerings),
            total_offerings,
            total_spend: offerings.iter().fold(0i64, |acc, o| acc.saturating_add(o.amount())),
            exorcised_count,
            total_possessions: count_action(events, AuditAction::PossessionTriggered),
            exorcism_success_rate,
        }
    }
}

fn count_action(events: &[AuditEvent], action: AuditAction) -> usize {
    events.iter().filter(|e| e.action == action).count()
}

// ============================================================================
// TESTS
// ============================================================================
