//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds across configurable fault rates, collecting pass/fail
//! results and identifying the first failing seed for replay.

use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::faults::FaultPlan;
use crate::oracle::InvariantViolation;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration controlling how many seeds to run and what
/// fault rates each seed's backends serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    /// Number of user operations per seed, launch round excluded.
    pub rounds: u64,
    /// Percentage of draft loads answered "no such entity" (0-100).
    pub fault_load_missing_percent: u8,
    /// Percentage of saves answered with an entity-vanished error (0-100).
    pub fault_save_vanish_percent: u8,
    /// Percentage of saves answered with a plain remote error (0-100).
    pub fault_save_fail_percent: u8,
    /// Percentage of issue creations that fail (0-100).
    pub fault_create_fail_percent: u8,
    /// Percentage of attachment uploads that fail (0-100).
    pub fault_attach_fail_percent: u8,
    /// Percentage of file acquisitions the user cancels (0-100).
    pub fault_acquire_cancel_percent: u8,
    /// Percentage of key-value store operations that fail (0-100).
    pub fault_store_fail_percent: u8,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            rounds: 24,
            fault_load_missing_percent: 10,
            fault_save_vanish_percent: 5,
            fault_save_fail_percent: 10,
            fault_create_fail_percent: 10,
            fault_attach_fail_percent: 10,
            fault_acquire_cancel_percent: 10,
            fault_store_fail_percent: 5,
        }
    }
}

impl CampaignConfig {
    /// Load a campaign configuration from a TOML file. Missing keys fall
    /// back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is not valid TOML, or
    /// fails [`CampaignConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading campaign config {}", path.display()))?;
        let config: Self = toml::from_str(&text).context("parsing campaign config")?;
        config.validate()?;
        Ok(config)
    }

    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            rounds: self.rounds,
            fault: self.fault_plan(),
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        if self.fault_plan().max_percent() > 100 {
            bail!("fault rates are percentages and must be <= 100");
        }
        Ok(())
    }

    fn fault_plan(&self) -> FaultPlan {
        FaultPlan {
            load_missing_percent: self.fault_load_missing_percent,
            save_vanish_percent: self.fault_save_vanish_percent,
            save_fail_percent: self.fault_save_fail_percent,
            create_fail_percent: self.fault_create_fail_percent,
            attach_fail_percent: self.fault_attach_fail_percent,
            acquire_cancel_percent: self.fault_acquire_cancel_percent,
            store_fail_percent: self.fault_store_fail_percent,
        }
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedFailure {
    /// The seed that failed.
    pub seed: u64,
    /// Invariant violations found, formatted for humans.
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Total seeds executed.
    pub seeds_run: usize,
    /// Seeds that passed all invariants.
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    /// All seed failures with violation details.
    pub failures: Vec<SeedFailure>,
    /// Seeds that reached an interesting state: an issue created under
    /// faults, or a missing-entity recovery.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Detailed trace produced by replaying a single seed.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    /// The simulation result including the full operation trace.
    pub result: SimulationResult,
    /// The oracle's findings, formatted for humans.
    pub violations: Vec<String>,
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters an
/// internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut seeds_run = 0_usize;
    let mut seeds_passed = 0_usize;
    let mut first_failure: Option<u64> = None;
    let mut failures = Vec::new();
    let mut interesting_states_reached = 0_usize;

    for seed in config.seed_range.clone() {
        seeds_run += 1;

        let result = run_seed(seed, config)?;
        if result.interesting_state_reached {
            interesting_states_reached += 1;
        }
        if result.violations.is_empty() {
            seeds_passed += 1;
        } else {
            if first_failure.is_none() {
                first_failure = Some(seed);
            }
            failures.push(SeedFailure {
                seed,
                violations: result.violations.iter().map(format_violation).collect(),
            });
        }
    }

    Ok(CampaignReport {
        seeds_run,
        seeds_passed,
        first_failure,
        failures,
        interesting_states_reached,
    })
}

/// Run a single seed and return `Ok(())` on pass, `Err(violations)` on
/// failure.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the simulation itself encounters an
/// internal error. The inner `Result` distinguishes pass from invariant
/// violations.
pub fn run_single_seed(
    seed: u64,
    config: &CampaignConfig,
) -> Result<std::result::Result<(), Vec<InvariantViolation>>> {
    let result = run_seed(seed, config)?;
    if result.violations.is_empty() {
        Ok(Ok(()))
    } else {
        Ok(Err(result.violations))
    }
}

/// Replay a single seed with full trace details for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    let result = run_seed(seed, config)?;
    let violations = result.violations.iter().map(format_violation).collect();
    Ok(DetailedTrace { result, violations })
}

fn run_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    let mut simulator = Simulator::new(config.sim_config_for_seed(seed));
    simulator.run()
}

/// Format an invariant violation into a human-readable string.
fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::ProcessingStuck { round } => {
            format!("ProcessingStuck: round {round} left the processing flag set")
        }
        InvariantViolation::AttachSlotOccupied { round } => {
            format!("AttachSlotOccupied: round {round} left an attachment marked in flight")
        }
        InvariantViolation::GateMismatch {
            round,
            gate_open,
            outcome,
        } => {
            format!(
                "GateMismatch: round {round} settled a submission as {outcome} \
                 with gate_open={gate_open}"
            )
        }
        InvariantViolation::NotificationMismatch {
            round,
            expected,
            actual,
        } => {
            format!(
                "NotificationMismatch: round {round} expected notifications \
                 {expected:?}, got {actual:?}"
            )
        }
        InvariantViolation::ProjectNotReset { round } => {
            format!(
                "ProjectNotReset: round {round} kept its project selection \
                 after a missing-entity save"
            )
        }
        InvariantViolation::AttachmentsMismatch {
            round,
            expected,
            actual,
        } => {
            format!(
                "AttachmentsMismatch: round {round} expected attachments \
                 {expected:?}, got {actual:?}"
            )
        }
        InvariantViolation::ScopeMismatch {
            round,
            expects_fields,
        } => {
            if *expects_fields {
                format!("ScopeMismatch: round {round} pushed without the fields list")
            } else {
                format!("ScopeMismatch: round {round} pushed a project change with stale fields")
            }
        }
        InvariantViolation::ProjectKeyNotPersisted {
            round,
            project,
            stored,
        } => {
            format!(
                "ProjectKeyNotPersisted: round {round} selected project {project} \
                 but the store holds {stored:?}"
            )
        }
        InvariantViolation::DraftKeyRetained { round, stored } => {
            format!(
                "DraftKeyRetained: round {round} created an issue but the store \
                 still holds draft id {stored:?}"
            )
        }
        InvariantViolation::DraftIdNotPersisted { round } => {
            format!(
                "DraftIdNotPersisted: round {round} saved a fresh draft without persisting its id"
            )
        }
        InvariantViolation::EditLost {
            round,
            target,
            expected,
            actual,
        } => {
            format!(
                "EditLost: round {round} edit of {target} expected {expected}, \
                 found {actual}"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_config_default_is_valid() {
        let config = CampaignConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn campaign_config_empty_seed_range_rejected() {
        let config = CampaignConfig {
            seed_range: 5..5,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn campaign_config_zero_rounds_rejected() {
        let config = CampaignConfig {
            rounds: 0,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn campaign_config_out_of_range_fault_rejected() {
        let config = CampaignConfig {
            fault_save_fail_percent: 101,
            ..CampaignConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sim_config_for_seed_uses_correct_seed() {
        let config = CampaignConfig::default();
        let sim = config.sim_config_for_seed(42);
        assert_eq!(sim.seed, 42);
        assert_eq!(sim.rounds, config.rounds);
        assert_eq!(
            sim.fault.save_fail_percent,
            config.fault_save_fail_percent
        );
    }

    #[test]
    fn config_loads_from_toml_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("campaign.toml");
        std::fs::write(
            &path,
            "rounds = 12\nseed_range = { start = 0, end = 3 }\nfault_save_fail_percent = 25\n",
        )
        .expect("write config");

        let config = CampaignConfig::load(&path).expect("load");
        assert_eq!(config.rounds, 12);
        assert_eq!(config.seed_range, 0..3);
        assert_eq!(config.fault_save_fail_percent, 25);
        assert_eq!(
            config.fault_load_missing_percent,
            CampaignConfig::default().fault_load_missing_percent
        );
    }

    #[test]
    fn config_load_rejects_out_of_range_rates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("campaign.toml");
        std::fs::write(&path, "fault_store_fail_percent = 250\n").expect("write config");
        assert!(CampaignConfig::load(&path).is_err());
    }

    #[test]
    fn run_single_seed_passes_with_default_faults() {
        let config = CampaignConfig {
            seed_range: 0..1,
            rounds: 24,
            ..CampaignConfig::default()
        };
        let result = run_single_seed(0, &config).expect("sim should not error");
        assert!(result.is_ok(), "seed 0 should pass: {result:?}");
    }

    #[test]
    fn run_campaign_all_seeds_pass() {
        // Full fault injection: every rule in the oracle states what the
        // composer must do GIVEN the faults, so nothing here is expected
        // to fail.
        let config = CampaignConfig {
            seed_range: 0..10,
            rounds: 16,
            ..CampaignConfig::default()
        };
        let report = run_campaign(&config).expect("campaign should not error");
        assert_eq!(report.seeds_run, 10);
        assert_eq!(report.seeds_passed, 10);
        assert!(report.all_passed());
        assert!(report.first_failure.is_none());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn run_campaign_100_seeds_pass() {
        // The acceptance criterion: 100+ seeds under full fault injection
        // without a single invariant violation.
        let config = CampaignConfig {
            seed_range: 0..100,
            rounds: 24,
            ..CampaignConfig::default()
        };
        let report = run_campaign(&config).expect("campaign should not error");
        assert_eq!(report.seeds_run, 100);
        assert!(
            report.all_passed(),
            "campaign failed: {} failures, first at seed {:?}: {:?}",
            report.failures.len(),
            report.first_failure,
            report.failures.first(),
        );
    }

    #[test]
    fn replay_seed_produces_detailed_trace() {
        let config = CampaignConfig {
            seed_range: 0..1,
            rounds: 12,
            ..CampaignConfig::default()
        };
        let trace = replay_seed(42, &config).expect("replay should not error");
        assert!(!trace.result.trace.is_empty());
        assert!(
            trace.violations.is_empty(),
            "oracle should pass: {:?}",
            trace.violations
        );
    }

    #[test]
    fn replay_is_deterministic() {
        let config = CampaignConfig {
            seed_range: 0..1,
            rounds: 16,
            ..CampaignConfig::default()
        };

        let trace1 = replay_seed(7, &config).expect("replay 1");
        let trace2 = replay_seed(7, &config).expect("replay 2");

        assert_eq!(trace1.result.trace, trace2.result.trace);
        assert_eq!(trace1.result.final_draft, trace2.result.final_draft);
        assert_eq!(trace1.violations, trace2.violations);
    }

    #[test]
    fn campaign_report_serializes_to_json() {
        let report = CampaignReport {
            seeds_run: 10,
            seeds_passed: 9,
            first_failure: Some(7),
            failures: vec![SeedFailure {
                seed: 7,
                violations: vec!["ProjectNotReset: round 3 kept its project selection".into()],
            }],
            interesting_states_reached: 5,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"seeds_run\":10"));
        assert!(json.contains("\"first_failure\":7"));
    }

    #[test]
    fn campaign_reaches_interesting_states() {
        let config = CampaignConfig {
            seed_range: 0..20,
            rounds: 24,
            ..CampaignConfig::default()
        };
        let report = run_campaign(&config).expect("campaign should not error");
        assert!(
            report.interesting_states_reached > 0,
            "expected some seeds to create an issue or recover from a vanish"
        );
    }

    #[test]
    fn format_violation_produces_readable_strings() {
        let v = InvariantViolation::EditLost {
            round: 4,
            target: "summary".to_string(),
            expected: "summary r4".to_string(),
            actual: "None".to_string(),
        };
        let s = format_violation(&v);
        assert!(s.contains("EditLost"));
        assert!(s.contains("round 4"));
    }
}
