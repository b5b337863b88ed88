//! Deterministic fault-injection simulator for the quill composer.
//!
//! One seed drives everything: the scripted user's operation mix, the remote
//! tracker's fault rolls, the device store's failures, and the picker's
//! cancellations. A run is a sequence of settled operations; after each one
//! the [`oracle::ComposerOracle`] audits the composer's visible state
//! against the call logs every simulated backend keeps.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at the harness boundary; the composer
//!   itself never returns errors.
//! - **Logging**: `tracing` macros; set `QUILL_LOG` to see per-round detail.

#![forbid(unsafe_code)]

pub mod campaign;
pub mod device;
pub mod faults;
pub mod oracle;
pub mod rng;
pub mod tracker;
pub mod user;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use quill_core::{
    AttachOutcome, Composer, DEFAULT_PROJECT_KEY, DRAFT_ID_KEY, Draft, DraftService, FileSource,
    KeyValueStore, Notifier, Project, PushOutcome, SubmitOutcome,
};

use crate::device::{RecordingNotifier, SimFiles, SimStore};
use crate::faults::FaultPlan;
use crate::oracle::{ComposerOracle, ComposerSnapshot, InvariantViolation, OpContext};
use crate::rng::DeterministicRng;
use crate::tracker::{FaultClass, SimTracker};
use crate::user::{SimUser, UserOp};

/// Parameters for a single simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Seed for both the operation mix and the fault rolls.
    pub seed: u64,
    /// Number of user operations after the launch round.
    pub rounds: u64,
    /// Fault rates served by the simulated backends.
    pub fault: FaultPlan,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rounds: 24,
            fault: FaultPlan::default(),
        }
    }
}

/// How one user operation settled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OpOutcome {
    /// A local text edit; no network involved.
    Edited,
    ProjectSet,
    FieldSet,
    Pushed(PushOutcome),
    Attach(AttachOutcome),
    Submitted(SubmitOutcome),
    /// The screen was left and re-entered through a fresh composer.
    Restarted,
}

/// One settled operation in a simulation trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub round: u64,
    pub op: UserOp,
    pub outcome: OpOutcome,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Seed the run was driven by.
    pub seed: u64,
    /// Every operation and how it settled, launch included.
    pub trace: Vec<TraceEvent>,
    /// Invariant violations found by the per-operation oracle.
    pub violations: Vec<InvariantViolation>,
    /// Backend calls that settled with an injected or organic fault.
    pub faults_seen: u64,
    /// Whether at least one issue was created.
    pub issue_created: bool,
    /// Whether the run reached an interesting state: an issue actually
    /// created, or a missing-entity recovery observed.
    pub interesting_state_reached: bool,
    /// The working draft when the run ended.
    pub final_draft: Draft,
}

impl SimulationResult {
    /// True when the oracle found nothing to complain about.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Single-run simulator. Create one per seed; [`Simulator::run`] owns its
/// own current-thread runtime so campaigns stay plain synchronous loops.
pub struct Simulator {
    config: SimulationConfig,
    user: SimUser,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        let user = SimUser::new(config.seed);
        Self { config, user }
    }

    /// Run the full simulation and audit every operation.
    ///
    /// # Errors
    ///
    /// Returns an error when the tokio runtime cannot be built. Invariant
    /// violations are data, not errors; see [`SimulationResult::violations`].
    pub fn run(&mut self) -> Result<SimulationResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .context("building simulation runtime")?;
        runtime.block_on(self.drive())
    }

    async fn drive(&mut self) -> Result<SimulationResult> {
        // The fault stream is offset from the op stream so both stay
        // deterministic per seed without feeding each other.
        let fault_rng = Arc::new(Mutex::new(DeterministicRng::new(
            self.config.seed.wrapping_add(0xFA),
        )));
        let tracker = Arc::new(SimTracker::new(self.config.fault, Arc::clone(&fault_rng)));
        let store = Arc::new(SimStore::new(self.config.fault, Arc::clone(&fault_rng)));
        let files = Arc::new(SimFiles::new(self.config.fault, Arc::clone(&fault_rng)));
        let notifier = Arc::new(RecordingNotifier::new());
        let mut auditor = Auditor::new(
            Arc::clone(&tracker),
            Arc::clone(&store),
            Arc::clone(&files),
            Arc::clone(&notifier),
        );

        info!(
            seed = self.config.seed,
            rounds = self.config.rounds,
            "simulation started"
        );

        let mut trace = Vec::new();
        let mut violations = Vec::new();
        let mut issue_created = false;

        // Round 0: app launch against whatever the device holds (nothing).
        let pre = ComposerSnapshot::default();
        let mut composer = new_composer(&tracker, &store, &files, &notifier);
        composer.initialize(None).await;
        let post = snapshot(&composer).await;
        violations.extend(auditor.check(0, &UserOp::Restart, &OpOutcome::Restarted, &pre, &post));
        trace.push(TraceEvent {
            round: 0,
            op: UserOp::Restart,
            outcome: OpOutcome::Restarted,
        });

        let mut pop_screen = false;
        for round in 1..=self.config.rounds {
            let draft = composer.draft().await;
            let op = if pop_screen {
                // The screen popped after a successful submission; the next
                // thing that can happen is coming back.
                UserOp::Restart
            } else {
                self.user.next_op(round, &draft)
            };
            pop_screen = false;

            let pre = snapshot(&composer).await;
            let outcome = match &op {
                UserOp::Restart => {
                    composer.flush().await;
                    composer = new_composer(&tracker, &store, &files, &notifier);
                    composer.initialize(None).await;
                    OpOutcome::Restarted
                }
                other => apply_op(&composer, other).await,
            };
            if matches!(outcome, OpOutcome::Submitted(SubmitOutcome::Created(_))) {
                issue_created = true;
                pop_screen = true;
            }
            let post = snapshot(&composer).await;

            debug!(round, op = %op, "operation settled");
            violations.extend(auditor.check(round, &op, &outcome, &pre, &post));
            trace.push(TraceEvent { round, op, outcome });
        }

        let faults_seen = count_faults(&tracker, &store, &files);
        let recovered_from_vanish = tracker
            .calls()
            .iter()
            .any(|c| c.fault == Some(FaultClass::Missing));
        let final_draft = composer.draft().await;

        info!(
            seed = self.config.seed,
            ops = trace.len(),
            faults = faults_seen,
            violations = violations.len(),
            "simulation finished"
        );

        Ok(SimulationResult {
            seed: self.config.seed,
            trace,
            violations,
            faults_seen,
            issue_created,
            interesting_state_reached: issue_created || recovered_from_vanish,
            final_draft,
        })
    }
}

/// Per-operation audit bookkeeping: remembers how far into each backend log
/// the previous operation reached and hands the oracle the fresh slice.
struct Auditor {
    tracker: Arc<SimTracker>,
    store: Arc<SimStore>,
    files: Arc<SimFiles>,
    notifier: Arc<RecordingNotifier>,
    tracker_mark: usize,
    store_mark: usize,
    files_mark: usize,
    notes_mark: usize,
}

impl Auditor {
    fn new(
        tracker: Arc<SimTracker>,
        store: Arc<SimStore>,
        files: Arc<SimFiles>,
        notifier: Arc<RecordingNotifier>,
    ) -> Self {
        Self {
            tracker,
            store,
            files,
            notifier,
            tracker_mark: 0,
            store_mark: 0,
            files_mark: 0,
            notes_mark: 0,
        }
    }

    fn check(
        &mut self,
        round: u64,
        op: &UserOp,
        outcome: &OpOutcome,
        pre: &ComposerSnapshot,
        post: &ComposerSnapshot,
    ) -> Vec<InvariantViolation> {
        let tracker_log = self.tracker.calls();
        let store_log = self.store.calls();
        let files_log = self.files.calls();
        let notes_log = self.notifier.messages();

        let ctx = OpContext {
            round,
            op,
            outcome,
            pre,
            post,
            tracker_calls: &tracker_log[self.tracker_mark..],
            store_calls: &store_log[self.store_mark..],
            acquire_calls: &files_log[self.files_mark..],
            notifications: &notes_log[self.notes_mark..],
            draft_key_truth: self.store.ground_truth(DRAFT_ID_KEY),
            project_key_truth: self.store.ground_truth(DEFAULT_PROJECT_KEY),
        };
        let result = ComposerOracle::check_op(&ctx);

        self.tracker_mark = tracker_log.len();
        self.store_mark = store_log.len();
        self.files_mark = files_log.len();
        self.notes_mark = notes_log.len();
        result.violations
    }
}

fn new_composer(
    tracker: &Arc<SimTracker>,
    store: &Arc<SimStore>,
    files: &Arc<SimFiles>,
    notifier: &Arc<RecordingNotifier>,
) -> Composer {
    Composer::new(
        Arc::clone(tracker) as Arc<dyn DraftService>,
        Arc::clone(store) as Arc<dyn KeyValueStore>,
        Arc::clone(files) as Arc<dyn FileSource>,
        Arc::clone(notifier) as Arc<dyn Notifier>,
    )
}

async fn snapshot(composer: &Composer) -> ComposerSnapshot {
    ComposerSnapshot {
        draft: composer.draft().await,
        processing: composer.is_processing().await,
        attaching: composer.attaching().await.map(|a| a.name),
    }
}

async fn apply_op(composer: &Composer, op: &UserOp) -> OpOutcome {
    match op {
        UserOp::EditSummary(text) => {
            composer.edit_summary(text.clone()).await;
            OpOutcome::Edited
        }
        UserOp::EditDescription(text) => {
            composer.edit_description(text.clone()).await;
            OpOutcome::Edited
        }
        UserOp::SetProject { id, name } => {
            composer
                .set_project(Project::new(id.as_str(), name.as_str()))
                .await;
            OpOutcome::ProjectSet
        }
        UserOp::SetFieldValue { index, value } => {
            let key = composer.draft().await.fields.get(*index).map(|f| f.key);
            if let Some(key) = key {
                composer.set_field_value(key, value.clone()).await;
            }
            OpOutcome::FieldSet
        }
        UserOp::AttachPhoto(origin) => OpOutcome::Attach(composer.attach_photo(*origin).await),
        UserOp::Submit => OpOutcome::Submitted(composer.submit().await),
        UserOp::Flush | UserOp::Restart => OpOutcome::Pushed(composer.flush().await),
    }
}

fn count_faults(tracker: &SimTracker, store: &SimStore, files: &SimFiles) -> u64 {
    let total = tracker
        .calls()
        .iter()
        .filter(|c| c.fault.is_some())
        .count()
        + store.calls().iter().filter(|c| c.faulted).count()
        + files.calls().iter().filter(|c| c.faulted).count();
    u64::try_from(total).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_is_deterministic() {
        let config = SimulationConfig {
            seed: 7,
            rounds: 32,
            fault: FaultPlan::default(),
        };
        let one = Simulator::new(config.clone()).run().expect("run 1");
        let two = Simulator::new(config).run().expect("run 2");
        assert_eq!(one.trace, two.trace);
        assert_eq!(one.final_draft, two.final_draft);
        assert_eq!(one.faults_seen, two.faults_seen);
    }

    #[test]
    fn clean_run_has_no_violations() {
        let mut sim = Simulator::new(SimulationConfig {
            seed: 3,
            rounds: 24,
            fault: FaultPlan::none(),
        });
        let result = sim.run().expect("run");
        assert!(result.passed(), "violations: {:?}", result.violations);
    }

    #[test]
    fn faulty_run_still_satisfies_the_oracle() {
        let mut sim = Simulator::new(SimulationConfig {
            seed: 1,
            rounds: 40,
            fault: FaultPlan::default(),
        });
        let result = sim.run().expect("run");
        assert!(result.passed(), "violations: {:?}", result.violations);
    }

    #[test]
    fn trace_starts_with_the_launch_round() {
        let mut sim = Simulator::new(SimulationConfig {
            seed: 5,
            rounds: 4,
            fault: FaultPlan::none(),
        });
        let result = sim.run().expect("run");
        assert_eq!(result.trace[0].round, 0);
        assert_eq!(result.trace[0].outcome, OpOutcome::Restarted);
        assert_eq!(result.trace.len(), 5);
    }
}
