// 🕯️ Ritual Service - the interactive state machine that clears a possession
//
// IDLE → start → IN_PROGRESS → complete → COMPLETED (terminal until reset)
//
// Failed submissions never change state: they emit RITUAL_FAILED and reset
// kind-specific progress where the ritual says so. Wrong ritual kind or no
// active ritual is a usage error (RitualError), not a ritual failure.

use crate::audit::{AuditLogger, AuditRecord};
use crate::clock::{system_clock, SharedClock};
use crate::entities::{AuditAction, Demon, RitualConfig, RitualKind};
use crate::error::RitualError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;

/// Minimum trimmed length of a SHAME confession
pub const MIN_SHAME_LEN: usize = 10;

// ============================================================================
// RITUAL STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RitualState {
    Idle,
    InProgress,
    Completed,
    /// Reserved. Failed submissions stay IN_PROGRESS, so this is never entered.
    Failed,
}

impl fmt::Display for RitualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RitualState::Idle => write!(f, "IDLE"),
            RitualState::InProgress => write!(f, "IN_PROGRESS"),
            RitualState::Completed => write!(f, "COMPLETED"),
            RitualState::Failed => write!(f, "FAILED"),
        }
    }
}

// ============================================================================
// MATH PROBLEMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Sub,
    Mul,
    PercentOf,
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "×",
            Operator::PercentOf => "% of",
        }
    }
}

/// One arithmetic challenge. Difficulty 1: a ± b with a, b in [0,100).
/// Difficulty 2: a × b with a, b in [0,13). Difficulty 3: p % of b with
/// p in [1,100], b in [100,10100), answer floored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MathProblem {
    pub problem: String,
    #[serde(skip)]
    pub answer: i64,
    #[serde(skip)]
    left: i64,
    #[serde(skip)]
    right: i64,
    #[serde(skip)]
    operator: Operator,
}

impl MathProblem {
    fn new(left: i64, operator: Operator, right: i64) -> Self {
        let answer = match operator {
            Operator::Add => left + right,
            Operator::Sub => left - right,
            Operator::Mul => left * right,
            // Integer floor of (p / 100) × b; both operands are positive
            Operator::PercentOf => left * right / 100,
        };

        MathProblem {
            problem: format!("{} {} {}", left, operator.symbol(), right),
            answer,
            left,
            right,
            operator,
        }
    }

    pub fn operands(&self) -> (i64, i64) {
        (self.left, self.right)
    }

    /// Same problem with the right operand stepped to the next value in range
    fn with_next_right(&self, difficulty: u8) -> Self {
        let right = match difficulty {
            2 => (self.right + 1) % 13,
            3 => 100 + (self.right - 100 + 1) % 10_000,
            _ => (self.right + 1) % 100,
        };
        MathProblem::new(self.left, self.operator, right)
    }
}

/// Generate a problem for difficulty 1-3 (anything else is treated as 1)
pub fn generate_problem<R: Rng + ?Sized>(difficulty: u8, rng: &mut R) -> MathProblem {
    match difficulty {
        2 => {
            let a = rng.gen_range(0..13);
            let b = rng.gen_range(0..13);
            MathProblem::new(a, Operator::Mul, b)
        }
        3 => {
            let percent = rng.gen_range(1..=100);
            let base = rng.gen_range(100..10_100);
            MathProblem::new(percent, Operator::PercentOf, base)
        }
        _ => {
            let a = rng.gen_range(0..100);
            let b = rng.gen_range(0..100);
            let operator = if rng.gen_bool(0.5) {
                Operator::Add
            } else {
                Operator::Sub
            };
            MathProblem::new(a, operator, b)
        }
    }
}

/// Fresh problem for a slot whose answer was wrong; operands always differ
/// from the previous attempt
fn regenerate_problem<R: Rng + ?Sized>(difficulty: u8, previous: &MathProblem, rng: &mut R) -> MathProblem {
    let next = generate_problem(difficulty, rng);
    if next.operands() == previous.operands() {
        next.with_next_right(difficulty)
    } else {
        next
    }
}

// ============================================================================
// SUBMISSION OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MantraOutcome {
    pub correct: bool,
    pub progress: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MathOutcome {
    pub correct: bool,
    pub progress: usize,
    pub total: usize,
    /// Next problem to show; None once every problem is solved
    pub problem: Option<String>,
}

/// Read-only projection of the ritual for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualSnapshot {
    pub state: RitualState,
    pub demon: Option<Demon>,
    pub ritual_type: Option<RitualKind>,
    pub started_at: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mantra_progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mantra_target: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub math_correct: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub math_total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_problem: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shame_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shame_text: Option<String>,
}

// ============================================================================
// RITUAL SERVICE
// ============================================================================

pub struct RitualService {
    audit: AuditLogger,
    clock: SharedClock,
    rng: StdRng,
    session_id: Option<String>,

    state: RitualState,
    demon: Option<Demon>,
    started_at: Option<i64>,

    mantra_progress: u32,
    mantra_target: u32,
    math_problems: Vec<MathProblem>,
    math_solved: usize,
    shame_text: String,
}

impl RitualService {
    pub fn new(audit: AuditLogger, clock: SharedClock, rng: StdRng) -> Self {
        RitualService {
            audit,
            clock,
            rng,
            session_id: None,
            state: RitualState::Idle,
            demon: None,
            started_at: None,
            mantra_progress: 0,
            mantra_target: 0,
            math_problems: Vec::new(),
            math_solved: 0,
            shame_text: String::new(),
        }
    }

    /// Wall clock, RNG from the seed when given, else from OS entropy
    pub fn with_seed(audit: AuditLogger, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(audit, system_clock(), rng)
    }

    /// Tag every audit event written by this service with a session id
    pub fn for_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Begin the ritual for `demon`, discarding any previous progress
    pub fn start(&mut self, demon: Option<&Demon>) -> Result<(), RitualError> {
        let demon = demon.ok_or(RitualError::DemonRequired)?.clone();

        self.clear_progress();
        match demon.ritual_config() {
            RitualConfig::Mantra { repetitions, .. } => {
                self.mantra_target = *repetitions;
            }
            RitualConfig::Math {
                difficulty,
                problem_count,
            } => {
                self.math_problems = (0..*problem_count)
                    .map(|_| generate_problem(*difficulty, &mut self.rng))
                    .collect();
            }
            RitualConfig::Wait { .. } | RitualConfig::Shame { .. } => {}
        }

        self.state = RitualState::InProgress;
        self.started_at = Some(self.clock.now_ms());

        tracing::info!(demon = %demon.name(), ritual = %demon.ritual_type(), "ritual started");
        self.audit_ritual(
            AuditAction::RitualStarted,
            &demon,
            serde_json::json!({
                "demonName": demon.name(),
                "ritualType": demon.ritual_type(),
            }),
        );
        self.demon = Some(demon);

        Ok(())
    }

    /// MANTRA: case-insensitive, trimmed exact match. A typo resets progress to 0.
    pub fn submit_mantra(&mut self, text: &str) -> Result<MantraOutcome, RitualError> {
        let demon = self.active_demon(RitualKind::Mantra)?;
        let RitualConfig::Mantra { target_string, .. } = demon.ritual_config() else {
            return Err(self.wrong_kind(RitualKind::Mantra));
        };

        if text.trim().to_lowercase() == target_string.trim().to_lowercase() {
            self.mantra_progress += 1;
            if self.mantra_progress >= self.mantra_target {
                self.complete(&demon);
            }
            return Ok(MantraOutcome {
                correct: true,
                progress: self.mantra_progress,
                target: self.mantra_target,
            });
        }

        self.mantra_progress = 0;
        self.fail(&demon, "Mantra typo");
        Ok(MantraOutcome {
            correct: false,
            progress: 0,
            target: self.mantra_target,
        })
    }

    /// MATH: answer the first unsolved problem. A wrong answer replaces only
    /// that problem with new operands of the same difficulty.
    pub fn submit_answer(&mut self, answer: i64) -> Result<MathOutcome, RitualError> {
        let demon = self.active_demon(RitualKind::Math)?;
        let RitualConfig::Math { difficulty, .. } = demon.ritual_config() else {
            return Err(self.wrong_kind(RitualKind::Math));
        };
        let difficulty = *difficulty;
        let total = self.math_problems.len();

        let Some(current) = self.math_problems.get(self.math_solved) else {
            return Err(RitualError::NotInProgress(self.state.to_string()));
        };

        if answer == current.answer {
            self.math_solved += 1;
            if self.math_solved >= total {
                self.complete(&demon);
            }
            return Ok(MathOutcome {
                correct: true,
                progress: self.math_solved,
                total,
                problem: self.current_problem(),
            });
        }

        self.fail(&demon, "Wrong math answer");
        let replacement = regenerate_problem(difficulty, current, &mut self.rng);
        self.math_problems[self.math_solved] = replacement;

        Ok(MathOutcome {
            correct: false,
            progress: self.math_solved,
            total,
            problem: self.current_problem(),
        })
    }

    /// WAIT: poll the clock. True once elapsed ≥ duration; completes the ritual
    /// on the first true poll.
    pub fn check_complete(&mut self) -> Result<bool, RitualError> {
        let demon = self.demon_of_kind(RitualKind::Wait)?;
        match self.state {
            RitualState::Completed => return Ok(true),
            RitualState::InProgress => {}
            other => return Err(RitualError::NotInProgress(other.to_string())),
        }

        if self.wait_remaining_ms()? > 0 {
            return Ok(false);
        }

        self.complete(&demon);
        Ok(true)
    }

    /// WAIT: milliseconds left, never negative
    pub fn wait_remaining_ms(&self) -> Result<i64, RitualError> {
        let demon = self.demon_of_kind(RitualKind::Wait)?;
        let RitualConfig::Wait { duration_seconds } = demon.ritual_config() else {
            return Err(self.wrong_kind(RitualKind::Wait));
        };

        let total_ms = i64::try_from(*duration_seconds)
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000);
        let elapsed_ms = self.clock.now_ms().saturating_sub(self.started_at.unwrap_or_default());

        Ok(total_ms.saturating_sub(elapsed_ms).max(0))
    }

    /// SHAME: a trimmed confession of at least ten characters completes the ritual
    pub fn submit_text(&mut self, text: &str) -> Result<bool, RitualError> {
        let demon = self.active_demon(RitualKind::Shame)?;
        let trimmed = text.trim();

        if trimmed.chars().count() >= MIN_SHAME_LEN {
            self.shame_text = trimmed.to_string();
            self.complete(&demon);
            return Ok(true);
        }

        self.fail(&demon, "Shame response too short");
        Ok(false)
    }

    /// Read-only view of the ritual (no side effects)
    pub fn state(&self) -> RitualSnapshot {
        let kind = self.demon.as_ref().map(|d| d.ritual_type());

        let mut snapshot = RitualSnapshot {
            state: self.state,
            demon: self.demon.clone(),
            ritual_type: kind,
            started_at: self.started_at,
            mantra_progress: None,
            mantra_target: None,
            math_correct: None,
            math_total: None,
            current_problem: None,
            remaining_ms: None,
            shame_prompt: None,
            shame_text: None,
        };

        match self.demon.as_ref().map(|d| d.ritual_config()) {
            Some(RitualConfig::Mantra { .. }) => {
                snapshot.mantra_progress = Some(self.mantra_progress);
                snapshot.mantra_target = Some(self.mantra_target);
            }
            Some(RitualConfig::Math { .. }) => {
                snapshot.math_correct = Some(self.math_solved);
                snapshot.math_total = Some(self.math_problems.len());
                snapshot.current_problem = self.current_problem();
            }
            Some(RitualConfig::Wait { .. }) => {
                snapshot.remaining_ms = self.wait_remaining_ms().ok();
            }
            Some(RitualConfig::Shame { message }) => {
                snapshot.shame_prompt = Some(message.clone());
                if !self.shame_text.is_empty() {
                    snapshot.shame_text = Some(self.shame_text.clone());
                }
            }
            None => {}
        }

        snapshot
    }

    pub fn ritual_state(&self) -> RitualState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == RitualState::Completed
    }

    pub fn demon(&self) -> Option<&Demon> {
        self.demon.as_ref()
    }

    /// Back to IDLE with no demon
    pub fn reset(&mut self) {
        self.state = RitualState::Idle;
        self.demon = None;
        self.started_at = None;
        self.clear_progress();
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    fn clear_progress(&mut self) {
        self.mantra_progress = 0;
        self.mantra_target = 0;
        self.math_problems.clear();
        self.math_solved = 0;
        self.shame_text.clear();
    }

    fn current_problem(&self) -> Option<String> {
        self.math_problems
            .get(self.math_solved)
            .map(|p| p.problem.clone())
    }

    fn wrong_kind(&self, expected: RitualKind) -> RitualError {
        RitualError::WrongKind {
            expected: expected.to_string(),
            actual: self
                .demon
                .as_ref()
                .map(|d| d.ritual_type().to_string())
                .unwrap_or_else(|| "none".to_string()),
        }
    }

    /// Bound demon of the expected kind, whatever the state
    fn demon_of_kind(&self, expected: RitualKind) -> Result<Demon, RitualError> {
        let demon = self
            .demon
            .as_ref()
            .ok_or_else(|| RitualError::NotInProgress(self.state.to_string()))?;
        if demon.ritual_type() != expected {
            return Err(self.wrong_kind(expected));
        }
        Ok(demon.clone())
    }

    /// Bound demon of the expected kind with the ritual IN_PROGRESS
    fn active_demon(&self, expected: RitualKind) -> Result<Demon, RitualError> {
        let demon = self.demon_of_kind(expected)?;
        if self.state != RitualState::InProgress {
            return Err(RitualError::NotInProgress(self.state.to_string()));
        }
        Ok(demon)
    }

    fn complete(&mut self, demon: &Demon) {
        self.state = RitualState::Completed;
        tracing::info!(demon = %demon.name(), ritual = %demon.ritual_type(), "ritual completed");
        self.audit_ritual(
            AuditAction::RitualCompleted,
            demon,
            serde_json::json!({
                "demonName": demon.name(),
                "ritualType": demon.ritual_type(),
            }),
        );
    }

    fn fail(&self, demon: &Demon, reason: &str) {
        tracing::debug!(demon = %demon.name(), reason, "ritual attempt failed");
        self.audit_ritual(
            AuditAction::RitualFailed,
            demon,
            serde_json::json!({
                "demonName": demon.name(),
                "reason": reason,
            }),
        );
    }

    fn audit_ritual(&self, action: AuditAction, demon: &Demon, after: serde_json::Value) {
        self.audit.log(
            AuditRecord::new(action, "Ritual", demon.id())
                .after(after)
                .session(self.session_id.as_deref()),
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
