// ⚙️ Configuration - defaults → JSON file → environment → command-line flags
//
// Environment:
//   EXORCIST_ZONE_OFFSET  fixed UTC offset in seconds, or "local"
//   EXORCIST_RNG_SEED     u64 seed for math problems
//   EXORCIST_LOG          tracing filter (e.g. "debug", "financial_exorcist=trace")
//   EXORCIST_SESSION      session id used when none is given

use crate::clock::Zone;
use crate::session::DEFAULT_SESSION;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_ZONE_OFFSET: &str = "EXORCIST_ZONE_OFFSET";
pub const ENV_RNG_SEED: &str = "EXORCIST_RNG_SEED";
pub const ENV_LOG: &str = "EXORCIST_LOG";
pub const ENV_SESSION: &str = "EXORCIST_SESSION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExorcistConfig {
    /// Zone used for hour-of-day rules and the late-night purity penalty
    pub zone: Zone,
    /// Seed for math problem generation; None draws from OS entropy
    pub rng_seed: Option<u64>,
    pub log_filter: String,
    pub default_session: String,
}

impl Default for ExorcistConfig {
    fn default() -> Self {
        ExorcistConfig {
            zone: Zone::Local,
            rng_seed: None,
            log_filter: "info".to_string(),
            default_session: DEFAULT_SESSION.to_string(),
        }
    }
}

/// Values from the command line; None leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub zone_offset: Option<i32>,
    pub rng_seed: Option<u64>,
    pub log_filter: Option<String>,
    pub session: Option<String>,
}

impl ExorcistConfig {
    /// Full layering: optional file, process environment, then overrides
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse config JSON")
    }

    /// Overlay environment values read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ZONE_OFFSET) {
            self.zone = parse_zone(&raw).with_context(|| format!("{}={}", ENV_ZONE_OFFSET, raw))?;
        }
        if let Some(raw) = lookup(ENV_RNG_SEED) {
            let seed = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{}={} is not a u64", ENV_RNG_SEED, raw))?;
            self.rng_seed = Some(seed);
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        if let Some(session) = lookup(ENV_SESSION) {
            if !session.trim().is_empty() {
                self.default_session = session.trim().to_string();
            }
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(offset) = overrides.zone_offset {
            self.zone = Zone::Fixed(offset);
        }
        if let Some(seed) = overrides.rng_seed {
            self.rng_seed = Some(seed);
        }
        if let Some(filter) = &overrides.log_filter {
            self.log_filter = filter.clone();
        }
        if let Some(session) = &overrides.session {
            self.default_session = session.clone();
        }
    }
}

fn parse_zone(raw: &str) -> Result<Zone> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("local") {
        return Ok(Zone::Local);
    }
    let secs = raw.parse::<i32>().context("zone offset must be seconds or \"local\"")?;
    // chrono accepts offsets strictly inside ±24h
    if secs.abs() >= 86_400 {
        anyhow::bail!("zone offset {} out of range", secs);
    }
    Ok(Zone::Fixed(secs))
}
