//! In-memory remote tracker with fault injection and a full call log.
//!
//! One server-side draft slot, a small project directory, and per-call fault
//! rolls from the shared deterministic RNG. Every call is logged with its
//! wire payload and outcome class so the oracle can audit what the composer
//! did against what the tracker saw.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use quill_core::{
    CreatedIssue, CustomField, Draft, DraftId, DraftService, IssueId, Project, ProjectId,
    ProjectSelection, SavePayload, ServiceError,
};

use crate::faults::FaultPlan;
use crate::rng::DeterministicRng;

/// Kind of remote call the tracker received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCallKind {
    Load,
    Save,
    Create,
    Attach,
}

/// Error class a call settled with. Mirrors the composer's taxonomy: only
/// `Missing` drives silent recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Missing,
    Remote,
}

/// One logged remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerCall {
    pub kind: TrackerCallKind,
    /// Serialized save payload; `None` for non-save calls.
    pub payload: Option<Value>,
    /// `None` means the call succeeded.
    pub fault: Option<FaultClass>,
    /// True when this save switched the draft's project, which regenerates
    /// the form and discards field values sent against the old one.
    pub form_reset: bool,
}

struct TrackerState {
    draft: Option<Draft>,
    next_draft: u64,
    projects: BTreeMap<String, String>,
    calls: Vec<TrackerCall>,
}

/// Simulated remote draft service.
pub struct SimTracker {
    plan: FaultPlan,
    rng: Arc<Mutex<DeterministicRng>>,
    state: Mutex<TrackerState>,
}

impl SimTracker {
    #[must_use]
    pub fn new(plan: FaultPlan, rng: Arc<Mutex<DeterministicRng>>) -> Self {
        let mut projects = BTreeMap::new();
        projects.insert("1".to_string(), "ALPHA".to_string());
        projects.insert("2".to_string(), "BRAVO".to_string());
        projects.insert("3".to_string(), "CHARLIE".to_string());
        Self {
            plan,
            rng,
            state: Mutex::new(TrackerState {
                draft: None,
                next_draft: 0,
                projects,
                calls: Vec::new(),
            }),
        }
    }

    /// Ids the directory answers for; anything else vanishes on save.
    #[must_use]
    pub fn known_projects(&self) -> Vec<String> {
        self.lock().projects.keys().cloned().collect()
    }

    /// Full call log so far.
    #[must_use]
    pub fn calls(&self) -> Vec<TrackerCall> {
        self.lock().calls.clone()
    }

    /// Number of calls logged so far; oracle windows are slices of this.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Current server-side draft, if any.
    #[must_use]
    pub fn server_draft(&self) -> Option<Draft> {
        self.lock().draft.clone()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll(&self, percent: u8) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hit_rate_percent(percent)
    }

    fn log(&self, kind: TrackerCallKind, payload: Option<Value>, fault: Option<FaultClass>) {
        self.lock().calls.push(TrackerCall {
            kind,
            payload,
            fault,
            form_reset: false,
        });
    }

    fn missing(id: &str) -> ServiceError {
        ServiceError::not_found(format!("Can't find entity with id: {id}"))
    }

    /// The form every project serves: a priority and a type field.
    fn template_fields(project_id: &str) -> Vec<CustomField> {
        vec![
            CustomField::new(
                serde_json::json!({"id": format!("{project_id}-priority"), "name": "Priority"}),
                serde_json::json!("Normal"),
            ),
            CustomField::new(
                serde_json::json!({"id": format!("{project_id}-type"), "name": "Type"}),
                serde_json::json!("Task"),
            ),
        ]
    }
}

#[async_trait]
impl DraftService for SimTracker {
    async fn load_draft(&self, id: &DraftId) -> Result<Draft, ServiceError> {
        if self.roll(self.plan.load_missing_percent) {
            self.log(TrackerCallKind::Load, None, Some(FaultClass::Missing));
            return Err(Self::missing(id.as_str()));
        }

        let found = self.lock().draft.clone().filter(|d| d.id.as_ref() == Some(id));
        match found {
            Some(draft) => {
                self.log(TrackerCallKind::Load, None, None);
                Ok(draft)
            }
            None => {
                self.log(TrackerCallKind::Load, None, Some(FaultClass::Missing));
                Err(Self::missing(id.as_str()))
            }
        }
    }

    async fn save_draft(&self, payload: SavePayload<'_>) -> Result<Draft, ServiceError> {
        let recorded = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => return Err(ServiceError::remote(err.to_string())),
        };

        if self.roll(self.plan.save_vanish_percent) {
            self.log(
                TrackerCallKind::Save,
                Some(recorded),
                Some(FaultClass::Missing),
            );
            return Err(Self::missing("0-7"));
        }
        if self.roll(self.plan.save_fail_percent) {
            self.log(
                TrackerCallKind::Save,
                Some(recorded),
                Some(FaultClass::Remote),
            );
            return Err(ServiceError::remote("simulated tracker outage"));
        }

        let mut state = self.lock();
        let payload_id = recorded
            .get("id")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let mut draft = match payload_id {
            Some(id) => {
                let found = state
                    .draft
                    .clone()
                    .filter(|d| d.id.as_ref().is_some_and(|known| known.as_str() == id));
                match found {
                    Some(draft) => draft,
                    None => {
                        state.calls.push(TrackerCall {
                            kind: TrackerCallKind::Save,
                            payload: Some(recorded),
                            fault: Some(FaultClass::Missing),
                            form_reset: false,
                        });
                        return Err(Self::missing(&id));
                    }
                }
            }
            None => {
                state.next_draft += 1;
                Draft {
                    id: Some(DraftId::from(format!("d-{}", state.next_draft))),
                    ..Draft::default()
                }
            }
        };

        if let Some(summary) = recorded.get("summary").and_then(Value::as_str) {
            draft.summary = Some(summary.to_string());
        }
        if let Some(description) = recorded.get("description").and_then(Value::as_str) {
            draft.description = Some(description.to_string());
        }
        let mut project_changed = false;
        let payload_project = recorded
            .pointer("/project/id")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        if let Some(project_id) = payload_project {
            let Some(name) = state.projects.get(&project_id).cloned() else {
                state.calls.push(TrackerCall {
                    kind: TrackerCallKind::Save,
                    payload: Some(recorded),
                    fault: Some(FaultClass::Missing),
                    form_reset: false,
                });
                return Err(Self::missing(&project_id));
            };
            project_changed = draft
                .project
                .project_id()
                .is_none_or(|known| known.as_str() != project_id.as_str());
            draft.project = ProjectSelection::Selected(Project::new(project_id, name));
        }
        // A project change regenerates the form; field values sent against
        // the old form are discarded along with it.
        if project_changed {
            draft.fields = Self::template_fields(
                draft.project.project_id().map_or("", ProjectId::as_str),
            );
        } else if let Some(fields) = recorded.get("fields") {
            match serde_json::from_value(fields.clone()) {
                Ok(parsed) => draft.fields = parsed,
                Err(err) => return Err(ServiceError::remote(err.to_string())),
            }
        }

        state.draft = Some(draft.clone());
        state.calls.push(TrackerCall {
            kind: TrackerCallKind::Save,
            payload: Some(recorded),
            fault: None,
            form_reset: project_changed,
        });
        trace!(draft = ?draft.id, "simulated save applied");
        Ok(draft)
    }

    async fn create_issue(&self, draft: &Draft) -> Result<CreatedIssue, ServiceError> {
        if self.roll(self.plan.create_fail_percent) {
            self.log(TrackerCallKind::Create, None, Some(FaultClass::Remote));
            return Err(ServiceError::remote("simulated creation failure"));
        }
        self.log(TrackerCallKind::Create, None, None);
        Ok(CreatedIssue {
            id: IssueId::from("2-100"),
            summary: draft.summary.clone(),
        })
    }

    async fn attach_file(
        &self,
        draft: &DraftId,
        url: &str,
        name: &str,
    ) -> Result<(), ServiceError> {
        if self.roll(self.plan.attach_fail_percent) {
            self.log(TrackerCallKind::Attach, None, Some(FaultClass::Remote));
            return Err(ServiceError::remote("simulated upload failure"));
        }

        let mut state = self.lock();
        let matches = state
            .draft
            .as_ref()
            .is_some_and(|d| d.id.as_ref() == Some(draft));
        if !matches {
            state.calls.push(TrackerCall {
                kind: TrackerCallKind::Attach,
                payload: None,
                fault: Some(FaultClass::Missing),
                form_reset: false,
            });
            return Err(Self::missing(draft.as_str()));
        }
        if let Some(server) = state.draft.as_mut() {
            server.attachments.push(quill_core::Attachment::new(url, name));
        }
        state.calls.push(TrackerCall {
            kind: TrackerCallKind::Attach,
            payload: None,
            fault: None,
            form_reset: false,
        });
        Ok(())
    }
}
