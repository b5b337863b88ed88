//! Scripted composer user.
//!
//! Each round rolls one operation from a weighted mix covering every
//! composer entry point, including hostile picks: empty summaries that close
//! the submission gate, a ghost project the tracker will reject, and app
//! restarts that exercise draft recovery mid-session.

use serde::Serialize;
use std::fmt;

use quill_core::{Draft, FileOrigin};

use crate::rng::DeterministicRng;

/// One user-level operation against the composer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UserOp {
    EditSummary(String),
    EditDescription(String),
    SetProject { id: String, name: String },
    /// Replace the value of the field at this position in the working draft.
    SetFieldValue { index: usize, value: serde_json::Value },
    AttachPhoto(FileOrigin),
    Submit,
    Flush,
    /// Leave the screen (flushing edits) and come back: the app restarts and
    /// recovery runs from persisted state.
    Restart,
}

impl fmt::Display for UserOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EditSummary(text) => write!(f, "edit_summary({text:?})"),
            Self::EditDescription(text) => write!(f, "edit_description({text:?})"),
            Self::SetProject { id, name } => write!(f, "set_project({id}, {name})"),
            Self::SetFieldValue { index, value } => write!(f, "set_field_value(#{index}, {value})"),
            Self::AttachPhoto(origin) => write!(f, "attach_photo({origin})"),
            Self::Submit => f.write_str("submit"),
            Self::Flush => f.write_str("flush"),
            Self::Restart => f.write_str("restart"),
        }
    }
}

/// Deterministic operation picker.
pub struct SimUser {
    rng: DeterministicRng,
}

impl SimUser {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
        }
    }

    /// Pick the next operation given the current working draft.
    pub fn next_op(&mut self, round: u64, draft: &Draft) -> UserOp {
        match self.rng.next_bounded(100) {
            0..=19 => Self::summary_edit(round),
            20..=29 => UserOp::EditDescription(format!("steps to reproduce r{round}")),
            30..=44 => self.project_pick(),
            45..=54 => self.field_edit(round, draft),
            55..=69 => UserOp::AttachPhoto(if round % 2 == 0 {
                FileOrigin::Library
            } else {
                FileOrigin::Camera
            }),
            70..=79 => UserOp::Submit,
            80..=91 => UserOp::Flush,
            _ => UserOp::Restart,
        }
    }

    fn summary_edit(round: u64) -> UserOp {
        // An empty summary closes the submission gate until a later edit.
        if round % 5 == 0 {
            UserOp::EditSummary(String::new())
        } else {
            UserOp::EditSummary(format!("summary r{round}"))
        }
    }

    fn project_pick(&mut self) -> UserOp {
        match self.rng.next_bounded(5) {
            // A project the tracker has never heard of.
            0 => UserOp::SetProject {
                id: "9".to_string(),
                name: "GHOST".to_string(),
            },
            1 => UserOp::SetProject {
                id: "1".to_string(),
                name: "ALPHA".to_string(),
            },
            2 => UserOp::SetProject {
                id: "2".to_string(),
                name: "BRAVO".to_string(),
            },
            _ => UserOp::SetProject {
                id: "3".to_string(),
                name: "CHARLIE".to_string(),
            },
        }
    }

    fn field_edit(&mut self, round: u64, draft: &Draft) -> UserOp {
        if draft.fields.is_empty() {
            // Nothing to edit yet; the form only exists once a project stuck.
            return Self::summary_edit(round);
        }
        let bound = u64::try_from(draft.fields.len()).unwrap_or(1);
        UserOp::SetFieldValue {
            index: usize::try_from(self.rng.next_bounded(bound)).unwrap_or(0),
            value: serde_json::json!(format!("v{round}")),
        }
    }
}
