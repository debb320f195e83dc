// 👹 exorcist - command line front end for the Financial Exorcist engines
//
//   exorcist demons                      list the demon registry
//   exorcist judge <offerings.json>      replay offerings, print the soul report
//   exorcist purity <offerings.json>     replay offerings, print the score only

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use financial_exorcist::{
    system_clock, to_display, AuditFilter, AuditLogger, DemonRegistry, ExorcistConfig,
    OfferingDraft, OfferingPatch, OfferingStore, Overrides, RitualConfig, SessionRegistry,
    SoulPurityCalculator, SoulReport, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "exorcist", version, about = "Judge your spending before the demons do")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for math ritual problems
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Fixed UTC offset in seconds for hour-of-day rules (default: local time)
    #[arg(long, global = true, allow_hyphen_values = true)]
    zone_offset: Option<i32>,

    /// Tracing filter, e.g. "debug"
    #[arg(long, global = true)]
    log: Option<String>,

    /// Session id to record offerings under
    #[arg(long, global = true, env = "EXORCIST_SESSION")]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every demon in evaluation order
    Demons,

    /// Replay offerings and print the full soul report as JSON
    Judge {
        /// JSON array of offerings ({amount, description, category, timestamp?})
        offerings: PathBuf,
    },

    /// Replay offerings and print only the purity score
    Purity {
        offerings: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = Overrides {
        zone_offset: cli.zone_offset,
        rng_seed: cli.seed,
        log_filter: cli.log.clone(),
        session: cli.session.clone(),
    };

    let config = match ExorcistConfig::load(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::from(2);
        }
    };

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = VERSION, zone = %config.zone, "exorcist starting");

    let result = match &cli.command {
        Commands::Demons => run_demons(&config),
        Commands::Judge { offerings } => run_judge(&config, offerings),
        Commands::Purity { offerings } => run_purity(&config, offerings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_demons(config: &ExorcistConfig) -> Result<()> {
    let registry = DemonRegistry::with_defaults(config.zone)?;

    println!("👹 {} demons, first match wins\n", registry.len());
    for (i, demon) in registry.iter().enumerate() {
        println!("{:>2}. {} - {}", i + 1, demon.name(), demon.title());
        println!("    ritual: {}", describe_ritual(demon.ritual_config()));
    }
    Ok(())
}

fn run_judge(config: &ExorcistConfig, path: &Path) -> Result<()> {
    let drafts = load_drafts(path)?;
    let report = judge(config, drafts)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(total_spend = %to_display(report.total_spend), "judgement complete");
    Ok(())
}

fn run_purity(config: &ExorcistConfig, path: &Path) -> Result<()> {
    let drafts = load_drafts(path)?;
    let report = judge(config, drafts)?;
    println!("{}", report.soul_purity);
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

fn load_drafts(path: &Path) -> Result<Vec<OfferingDraft>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read offerings file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid offerings JSON: {}", path.display()))
}

/// Replay offerings through a fresh session. Any possession is exorcised on
/// the spot so the next offering is judged on its own.
fn judge(config: &ExorcistConfig, drafts: Vec<OfferingDraft>) -> Result<SoulReport> {
    let clock = system_clock();
    let audit = AuditLogger::with_clock(clock.clone());
    let demons = Arc::new(DemonRegistry::with_defaults(config.zone)?);
    let sessions = SessionRegistry::new(demons, audit.clone(), clock.clone(), config.rng_seed);
    let store = OfferingStore::new();

    for (index, draft) in drafts.into_iter().enumerate() {
        sessions.with_session(&config.default_session, |session| -> Result<()> {
            let recorded = session
                .record_offering(&store, draft)
                .with_context(|| format!("Offering #{} rejected", index + 1))?;

            if let Some(demon) = &recorded.possession {
                tracing::info!(
                    offering = index + 1,
                    demon = %demon.name(),
                    punishment = %demon.punishment_message(),
                    "possessed"
                );
                session.amend_offering(&store, recorded.offering.id(), &OfferingPatch::exorcise())?;
            }
            Ok(())
        })?;
    }

    let events = audit.get_events(&AuditFilter::default());
    let calculator = SoulPurityCalculator::new(config.zone);
    Ok(calculator.get_report(&store.get_all(), &events, clock.now_ms()))
}

fn describe_ritual(config: &RitualConfig) -> String {
    match config {
        RitualConfig::Mantra {
            target_string,
            repetitions,
        } => format!("MANTRA \"{}\" ×{}", target_string, repetitions),
        RitualConfig::Math {
            difficulty,
            problem_count,
        } => format!("MATH difficulty {}, {} problem(s)", difficulty, problem_count),
        RitualConfig::Wait { duration_seconds } => format!("WAIT {}s", duration_seconds),
        RitualConfig::Shame { message } => format!("SHAME \"{}\"", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use financial_exorcist::{SinCategory, Zone};

    fn config() -> ExorcistConfig {
        ExorcistConfig {
            zone: Zone::utc(),
            rng_seed: Some(1),
            ..ExorcistConfig::default()
        }
    }

    #[test]
    fn cli_parse_judge_with_globals() {
        let cli = Cli::try_parse_from([
            "exorcist",
            "judge",
            "offerings.json",
            "--seed",
            "9",
            "--zone-offset",
            "-3600",
        ])
        .unwrap();
        assert_eq!(cli.seed, Some(9));
        assert_eq!(cli.zone_offset, Some(-3600));
        assert!(matches!(cli.command, Commands::Judge { .. }));
    }

    #[test]
    fn cli_parse_demons() {
        let cli = Cli::try_parse_from(["exorcist", "demons"]).unwrap();
        assert!(matches!(cli.command, Commands::Demons));
        assert!(Cli::try_parse_from(["exorcist"]).is_err());
    }

    #[test]
    fn judge_exorcises_each_possession() {
        // 2024-06-01 12:00 UTC
        let noon = 1_717_243_200_000;
        let drafts = vec![
            OfferingDraft::new(9_000, "Designer coat", SinCategory::Vanity).at(noon),
            OfferingDraft::new(1_000, "Uber home", SinCategory::Sloth).at(noon),
            OfferingDraft::new(300, "Groceries", SinCategory::Gluttony).at(noon),
        ];

        let report = judge(&config(), drafts).unwrap();
        assert_eq!(report.total_offerings, 3);
        assert_eq!(report.total_possessions, 2);
        assert_eq!(report.exorcised_count, 2);
        // −2 −2 −5, recent possessions so no bonus
        assert_eq!(report.soul_purity, 91);
    }

    #[test]
    fn judge_rejects_invalid_offering() {
        let drafts = vec![OfferingDraft::new(-5, "Refund?", SinCategory::Greed)];
        let err = judge(&config(), drafts).unwrap_err();
        assert!(format!("{err:#}").contains("Offering #1 rejected"));
    }

    #[test]
    fn describe_every_ritual_kind() {
        let registry = DemonRegistry::with_defaults(Zone::utc()).unwrap();
        let described: Vec<String> = registry.iter().map(|d| describe_ritual(d.ritual_config())).collect();
        assert_eq!(described[0], "MANTRA \"I am not my fabric\" ×30");
        assert_eq!(described[2], "WAIT 300s");
        assert!(described.iter().any(|d| d.starts_with("SHAME")));
        assert!(described.iter().any(|d| d.starts_with("MATH")));
    }
}
