//! Invariant oracle for the composer simulation.
//!
//! Checks run after every settled operation against before/after snapshots
//! and the per-operation slices of the backend call logs. Every rule is
//! fault-proof: it states what the composer must do GIVEN the faults the
//! backends actually served, so campaigns run with full fault injection and
//! still expect zero violations.

use quill_core::notify::{
    CANNOT_ATTACH_FILE, CANNOT_CREATE_ISSUE, CANNOT_UPDATE_DRAFT, PICKER_FAILED,
};
use quill_core::{
    AttachOutcome, DEFAULT_PROJECT_KEY, DRAFT_ID_KEY, Draft, ProjectSelection, SubmitOutcome,
};

use crate::device::{AcquireCall, StoreCall, StoreCallKind};
use crate::tracker::{FaultClass, TrackerCall, TrackerCallKind};
use crate::user::UserOp;
use crate::OpOutcome;

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for an invariant check.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    /// Detailed description of every invariant that was violated.
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    fn fail(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: false,
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

/// Diagnostic information for a single failed invariant check.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    /// The processing flag survived past the end of an operation.
    ProcessingStuck {
        /// Round the operation ran in.
        round: u64,
    },

    /// The attaching slot survived past the end of an operation.
    AttachSlotOccupied {
        /// Round the operation ran in.
        round: u64,
    },

    /// A submission was blocked with the gate open, or ran with it closed.
    GateMismatch {
        /// Round the operation ran in.
        round: u64,
        /// Whether the gate was open going into the operation.
        gate_open: bool,
        /// The outcome the submission actually settled with.
        outcome: String,
    },

    /// Notifications shown do not match the faults the backends served.
    NotificationMismatch {
        /// Round the operation ran in.
        round: u64,
        /// Notification summaries the fault record calls for.
        expected: Vec<String>,
        /// Notification summaries actually shown.
        actual: Vec<String>,
    },

    /// A save failed with a missing entity but the project selection
    /// survived.
    ProjectNotReset {
        /// Round the operation ran in.
        round: u64,
    },

    /// The attachment list does not match the settled upload outcome.
    AttachmentsMismatch {
        /// Round the operation ran in.
        round: u64,
        /// Attachment names the outcome calls for.
        expected: Vec<String>,
        /// Attachment names actually present.
        actual: Vec<String>,
    },

    /// A save payload carried the wrong shape for its trigger.
    ScopeMismatch {
        /// Round the operation ran in.
        round: u64,
        /// Whether payloads from this trigger must carry the fields list.
        expects_fields: bool,
    },

    /// A project selection did not persist the sticky default project id.
    ProjectKeyNotPersisted {
        /// Round the operation ran in.
        round: u64,
        /// The project id that was selected.
        project: String,
        /// What the store actually holds under the sticky key.
        stored: Option<String>,
    },

    /// Submission succeeded but the persisted draft id survived.
    DraftKeyRetained {
        /// Round the operation ran in.
        round: u64,
        /// What the store actually holds under the draft key.
        stored: Option<String>,
    },

    /// A fresh draft was saved but its id was never persisted.
    DraftIdNotPersisted {
        /// Round the operation ran in.
        round: u64,
    },

    /// A local edit disappeared without a server echo entitled to clobber it.
    EditLost {
        /// Round the operation ran in.
        round: u64,
        /// Which part of the draft lost the edit.
        target: String,
        /// The value the edit wrote.
        expected: String,
        /// The value found after the operation settled.
        actual: String,
    },
}

// ── Operation context ─────────────────────────────────────────────────────────

/// Composer state captured outside any operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposerSnapshot {
    /// The working draft.
    pub draft: Draft,
    /// Whether a submission is marked in flight.
    pub processing: bool,
    /// Name of the attachment marked in flight, if any.
    pub attaching: Option<String>,
}

/// Everything the oracle sees about one settled operation.
pub struct OpContext<'a> {
    /// Round the operation ran in.
    pub round: u64,
    /// The operation the user performed.
    pub op: &'a UserOp,
    /// How it settled.
    pub outcome: &'a OpOutcome,
    /// Composer state immediately before.
    pub pre: &'a ComposerSnapshot,
    /// Composer state immediately after.
    pub post: &'a ComposerSnapshot,
    /// Remote calls the operation made, in order.
    pub tracker_calls: &'a [TrackerCall],
    /// Store calls the operation made, in order.
    pub store_calls: &'a [StoreCall],
    /// Picker calls the operation made, in order.
    pub acquire_calls: &'a [AcquireCall],
    /// `(summary, cause)` notifications the operation showed.
    pub notifications: &'a [(String, String)],
    /// Ground truth under [`DRAFT_ID_KEY`] after the operation.
    pub draft_key_truth: Option<String>,
    /// Ground truth under [`DEFAULT_PROJECT_KEY`] after the operation.
    pub project_key_truth: Option<String>,
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Oracle verifying composer invariants operation by operation.
///
/// # Invariants checked
///
/// 1. **Settlement** (`check_settled`): processing and the attaching slot
///    are released by the time an operation resolves.
/// 2. **Submission gate** (`check_gate`): blocked exactly when the gate
///    was closed going in.
/// 3. **Notification accounting** (`check_notifications`): one notification
///    per reportable fault, none for silently recovered ones.
/// 4. **Vanish recovery** (`check_project_reset`): a missing-entity save
///    settles with the project selection reset.
/// 5. **Attachment integrity** (`check_attachments`): optimistic entries
///    stay on success and roll back on failure, touching nothing else.
/// 6. **Push scope** (`check_scope`): project changes push without the
///    fields list, every other trigger pushes with it.
/// 7. **Durable keys** (`check_store`): the sticky project id is persisted
///    on selection and the draft id is cleaned up on submission.
/// 8. **Edit retention** (`check_edits`): local edits survive their
///    operation unless a project switch regenerated the form.
pub struct ComposerOracle;

impl ComposerOracle {
    /// Run every check against one settled operation.
    #[must_use]
    pub fn check_op(ctx: &OpContext<'_>) -> OracleResult {
        Self::check_settled(ctx)
            .merge(Self::check_gate(ctx))
            .merge(Self::check_notifications(ctx))
            .merge(Self::check_project_reset(ctx))
            .merge(Self::check_attachments(ctx))
            .merge(Self::check_scope(ctx))
            .merge(Self::check_store(ctx))
            .merge(Self::check_edits(ctx))
    }

    // ── Invariant 1: Settlement ───────────────────────────────────────────────

    /// Processing and the attaching slot must be clear once the operation's
    /// future resolves.
    #[must_use]
    pub fn check_settled(ctx: &OpContext<'_>) -> OracleResult {
        let mut violations = Vec::new();
        if ctx.post.processing {
            violations.push(InvariantViolation::ProcessingStuck { round: ctx.round });
        }
        if ctx.post.attaching.is_some() {
            violations.push(InvariantViolation::AttachSlotOccupied { round: ctx.round });
        }
        if violations.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::fail(violations)
        }
    }

    // ── Invariant 2: Submission gate ─────────────────────────────────────────

    /// A submission is blocked iff the gate was closed when it started.
    #[must_use]
    pub fn check_gate(ctx: &OpContext<'_>) -> OracleResult {
        let OpOutcome::Submitted(outcome) = ctx.outcome else {
            return OracleResult::pass();
        };
        let gate_open = Self::gate_open(ctx.pre);
        let blocked = matches!(outcome, SubmitOutcome::Blocked);
        if gate_open == blocked {
            OracleResult::fail(vec![InvariantViolation::GateMismatch {
                round: ctx.round,
                gate_open,
                outcome: format!("{outcome:?}"),
            }])
        } else {
            OracleResult::pass()
        }
    }

    fn gate_open(snapshot: &ComposerSnapshot) -> bool {
        snapshot
            .draft
            .summary
            .as_deref()
            .is_some_and(|s| !s.is_empty())
            && snapshot.draft.project.project_id().is_some()
            && !snapshot.processing
            && snapshot.attaching.is_none()
    }

    // ── Invariant 3: Notification accounting ─────────────────────────────────

    /// Exactly one notification per reportable fault: remote save failures,
    /// creation failures, upload failures, and picker failures. Missing-
    /// entity saves, failed loads, and storage faults recover silently.
    #[must_use]
    pub fn check_notifications(ctx: &OpContext<'_>) -> OracleResult {
        let mut expected: Vec<String> = Vec::new();
        for call in ctx.tracker_calls {
            match (call.kind, call.fault) {
                (TrackerCallKind::Save, Some(FaultClass::Remote)) => {
                    expected.push(CANNOT_UPDATE_DRAFT.to_string());
                }
                (TrackerCallKind::Create, Some(_)) => {
                    expected.push(CANNOT_CREATE_ISSUE.to_string());
                }
                (TrackerCallKind::Attach, Some(_)) => {
                    expected.push(CANNOT_ATTACH_FILE.to_string());
                }
                _ => {}
            }
        }
        for call in ctx.acquire_calls {
            if call.faulted {
                expected.push(PICKER_FAILED.to_string());
            }
        }
        // An upload that failed without ever reaching the tracker: the draft
        // had no server id to address it to. Reported like any upload error.
        if matches!(ctx.outcome, OpOutcome::Attach(AttachOutcome::UploadFailed))
            && !ctx
                .tracker_calls
                .iter()
                .any(|c| c.kind == TrackerCallKind::Attach)
        {
            expected.push(CANNOT_ATTACH_FILE.to_string());
        }

        let mut actual: Vec<String> = ctx
            .notifications
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect();
        expected.sort_unstable();
        actual.sort_unstable();

        if expected == actual {
            OracleResult::pass()
        } else {
            OracleResult::fail(vec![InvariantViolation::NotificationMismatch {
                round: ctx.round,
                expected,
                actual,
            }])
        }
    }

    // ── Invariant 4: Vanish recovery ─────────────────────────────────────────

    /// When the operation's last word from the tracker about the draft was a
    /// missing-entity save, the selection must have been reset. Later loads
    /// supersede the reset because adoption replaces the whole draft.
    #[must_use]
    pub fn check_project_reset(ctx: &OpContext<'_>) -> OracleResult {
        let last = ctx.tracker_calls.iter().rev().find(|c| {
            matches!(c.kind, TrackerCallKind::Save | TrackerCallKind::Load)
        });
        let Some(call) = last else {
            return OracleResult::pass();
        };
        if call.kind == TrackerCallKind::Save
            && call.fault == Some(FaultClass::Missing)
            && !matches!(ctx.post.draft.project, ProjectSelection::NotSelected)
        {
            return OracleResult::fail(vec![InvariantViolation::ProjectNotReset {
                round: ctx.round,
            }]);
        }
        OracleResult::pass()
    }

    // ── Invariant 5: Attachment integrity ────────────────────────────────────

    /// An attach operation prepends exactly its candidate on success and
    /// leaves the list untouched on any failure. Other operations may reorder
    /// the list through adoption but never change its membership. Restarts
    /// may recover a different draft entirely and are exempt.
    #[must_use]
    pub fn check_attachments(ctx: &OpContext<'_>) -> OracleResult {
        let pre = attachment_names(&ctx.pre.draft);
        let post = attachment_names(&ctx.post.draft);

        match ctx.op {
            UserOp::Restart => OracleResult::pass(),
            UserOp::AttachPhoto(_) => {
                let expected = if matches!(ctx.outcome, OpOutcome::Attach(AttachOutcome::Attached))
                {
                    let Some(candidate) =
                        ctx.acquire_calls.iter().find_map(|a| a.name.clone())
                    else {
                        return OracleResult::pass();
                    };
                    let mut names = vec![candidate];
                    names.extend(pre);
                    names
                } else {
                    pre
                };
                if expected == post {
                    OracleResult::pass()
                } else {
                    OracleResult::fail(vec![InvariantViolation::AttachmentsMismatch {
                        round: ctx.round,
                        expected,
                        actual: post,
                    }])
                }
            }
            _ => {
                let mut expected = pre;
                let mut actual = post;
                expected.sort_unstable();
                actual.sort_unstable();
                if expected == actual {
                    OracleResult::pass()
                } else {
                    OracleResult::fail(vec![InvariantViolation::AttachmentsMismatch {
                        round: ctx.round,
                        expected,
                        actual,
                    }])
                }
            }
        }
    }

    // ── Invariant 6: Push scope ──────────────────────────────────────────────

    /// Project changes push without the fields list; every other trigger
    /// pushes with it.
    #[must_use]
    pub fn check_scope(ctx: &OpContext<'_>) -> OracleResult {
        let expects_fields = !matches!(ctx.op, UserOp::SetProject { .. });
        let mut violations = Vec::new();
        for call in ctx.tracker_calls {
            if call.kind != TrackerCallKind::Save {
                continue;
            }
            let Some(payload) = &call.payload else {
                continue;
            };
            if payload.get("fields").is_some() != expects_fields {
                violations.push(InvariantViolation::ScopeMismatch {
                    round: ctx.round,
                    expects_fields,
                });
            }
        }
        if violations.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::fail(violations)
        }
    }

    // ── Invariant 7: Durable keys ────────────────────────────────────────────

    /// Selecting a project persists the sticky default id whatever the push
    /// did; a created issue deletes the persisted draft id; a fresh draft's
    /// server id is persisted the moment the server assigns it.
    #[must_use]
    pub fn check_store(ctx: &OpContext<'_>) -> OracleResult {
        let mut violations = Vec::new();

        if let UserOp::SetProject { id, .. } = ctx.op {
            let set = ctx
                .store_calls
                .iter()
                .rev()
                .find(|c| c.kind == StoreCallKind::Set && c.key == DEFAULT_PROJECT_KEY);
            let persisted = match set {
                None => false,
                Some(call) if call.faulted => true,
                Some(_) => ctx.project_key_truth.as_deref() == Some(id),
            };
            if !persisted {
                violations.push(InvariantViolation::ProjectKeyNotPersisted {
                    round: ctx.round,
                    project: id.clone(),
                    stored: ctx.project_key_truth.clone(),
                });
            }
        }

        if matches!(
            ctx.outcome,
            OpOutcome::Submitted(SubmitOutcome::Created(_))
        ) {
            let delete = ctx
                .store_calls
                .iter()
                .rev()
                .find(|c| c.kind == StoreCallKind::Delete && c.key == DRAFT_ID_KEY);
            let cleaned = match delete {
                None => false,
                Some(call) if call.faulted => true,
                Some(_) => ctx.draft_key_truth.is_none(),
            };
            if !cleaned {
                violations.push(InvariantViolation::DraftKeyRetained {
                    round: ctx.round,
                    stored: ctx.draft_key_truth.clone(),
                });
            }
        }

        let fresh_save = ctx.tracker_calls.iter().any(|c| {
            c.kind == TrackerCallKind::Save
                && c.fault.is_none()
                && c.payload
                    .as_ref()
                    .is_some_and(|p| p.get("id").is_none())
        });
        if fresh_save
            && !ctx
                .store_calls
                .iter()
                .any(|c| c.kind == StoreCallKind::Set && c.key == DRAFT_ID_KEY)
        {
            violations.push(InvariantViolation::DraftIdNotPersisted { round: ctx.round });
        }

        if violations.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::fail(violations)
        }
    }

    // ── Invariant 8: Edit retention ──────────────────────────────────────────

    /// Text edits land verbatim. A field edit survives its own push unless
    /// the save switched projects, which regenerates the form server-side.
    #[must_use]
    pub fn check_edits(ctx: &OpContext<'_>) -> OracleResult {
        match ctx.op {
            UserOp::EditSummary(text) => {
                if ctx.post.draft.summary.as_deref() == Some(text.as_str()) {
                    OracleResult::pass()
                } else {
                    OracleResult::fail(vec![InvariantViolation::EditLost {
                        round: ctx.round,
                        target: "summary".to_string(),
                        expected: text.clone(),
                        actual: format!("{:?}", ctx.post.draft.summary),
                    }])
                }
            }
            UserOp::EditDescription(text) => {
                if ctx.post.draft.description.as_deref() == Some(text.as_str()) {
                    OracleResult::pass()
                } else {
                    OracleResult::fail(vec![InvariantViolation::EditLost {
                        round: ctx.round,
                        target: "description".to_string(),
                        expected: text.clone(),
                        actual: format!("{:?}", ctx.post.draft.description),
                    }])
                }
            }
            UserOp::SetFieldValue { index, value } => {
                if ctx.pre.draft.fields.get(*index).is_none() {
                    return OracleResult::pass();
                }
                if ctx.tracker_calls.iter().any(|c| c.form_reset) {
                    return OracleResult::pass();
                }
                let actual = ctx.post.draft.fields.get(*index).map(|f| &f.value);
                if actual == Some(value) {
                    OracleResult::pass()
                } else {
                    OracleResult::fail(vec![InvariantViolation::EditLost {
                        round: ctx.round,
                        target: format!("fields[{index}]"),
                        expected: value.to_string(),
                        actual: actual
                            .map_or_else(|| "entry gone".to_string(), ToString::to_string),
                    }])
                }
            }
            _ => OracleResult::pass(),
        }
    }
}

fn attachment_names(draft: &Draft) -> Vec<String> {
    draft.attachments.iter().map(|a| a.name.clone()).collect()
}
