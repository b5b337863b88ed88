//! End-to-end composer flows against an in-memory tracker fake.
//!
//! Covers:
//!   - screen-entry recovery (persisted draft, vanished draft, sticky project)
//!   - push scoping, skipping, failure taxonomy, and serialization
//!   - optimistic attachment add with rollback and the single-flight slot
//!   - submission gating, processing cleanup, and draft-key lifecycle

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use quill_core::{
    AcquireError, AttachOutcome, CandidateFile, Composer, CreatedIssue, CustomField,
    DEFAULT_PROJECT_KEY, DRAFT_ID_KEY, Draft, DraftId, DraftService, FileOrigin, FileSource,
    IssueId, KeyValueStore, MemoryStore, Notifier, Project, ProjectSelection, PushOutcome,
    SavePayload, ServiceError, SubmitOutcome,
};

// ---------------------------------------------------------------------------
// Tracker fake: one server-side draft, a project directory, a call log
// ---------------------------------------------------------------------------

struct TrackerState {
    draft: Option<Draft>,
    next_draft: u64,
    projects: HashMap<String, String>,
    saves: Vec<Value>,
    created: Vec<Draft>,
    uploads: Vec<(String, String)>,
}

struct FakeTracker {
    state: Mutex<TrackerState>,
    fail_saves: AtomicBool,
    fail_creates: AtomicBool,
    fail_attach: AtomicBool,
    /// Park saves/uploads on a few yield points so tests can interleave a
    /// second operation while the first is in flight.
    stall_saves: AtomicBool,
    stall_attach: AtomicBool,
}

impl FakeTracker {
    fn new() -> Self {
        let mut projects = HashMap::new();
        projects.insert("42".to_string(), "DEMO".to_string());
        projects.insert("7".to_string(), "OPS".to_string());
        Self {
            state: Mutex::new(TrackerState {
                draft: None,
                next_draft: 0,
                projects,
                saves: Vec::new(),
                created: Vec::new(),
                uploads: Vec::new(),
            }),
            fail_saves: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            fail_attach: AtomicBool::new(false),
            stall_saves: AtomicBool::new(false),
            stall_attach: AtomicBool::new(false),
        }
    }

    async fn seed_draft(&self, draft: Draft) {
        self.state.lock().await.draft = Some(draft);
    }

    async fn forget_project(&self, id: &str) {
        self.state.lock().await.projects.remove(id);
    }

    async fn saves(&self) -> Vec<Value> {
        self.state.lock().await.saves.clone()
    }

    async fn created(&self) -> Vec<Draft> {
        self.state.lock().await.created.clone()
    }

    async fn uploads(&self) -> Vec<(String, String)> {
        self.state.lock().await.uploads.clone()
    }

    async fn server_draft(&self) -> Option<Draft> {
        self.state.lock().await.draft.clone()
    }
}

async fn stall(flag: &AtomicBool) {
    if flag.load(Ordering::SeqCst) {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }
}

fn missing(id: &str) -> ServiceError {
    ServiceError::not_found(format!("Can't find entity with id: {id}"))
}

#[async_trait]
impl DraftService for FakeTracker {
    async fn load_draft(&self, id: &DraftId) -> Result<Draft, ServiceError> {
        let state = self.state.lock().await;
        state
            .draft
            .clone()
            .filter(|d| d.id.as_ref() == Some(id))
            .ok_or_else(|| missing(id.as_str()))
    }

    async fn save_draft(&self, payload: SavePayload<'_>) -> Result<Draft, ServiceError> {
        let recorded = serde_json::to_value(payload).expect("payload serializes");
        stall(&self.stall_saves).await;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ServiceError::remote("internal server error"));
        }

        let mut state = self.state.lock().await;
        state.saves.push(recorded.clone());

        let mut draft = match recorded.get("id").and_then(Value::as_str) {
            Some(id) => state
                .draft
                .clone()
                .filter(|d| d.id.as_ref().is_some_and(|known| known.as_str() == id))
                .ok_or_else(|| missing(id))?,
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
        if let Some(project_id) = recorded.pointer("/project/id").and_then(Value::as_str) {
            let name = state
                .projects
                .get(project_id)
                .ok_or_else(|| missing(project_id))?;
            draft.project = ProjectSelection::Selected(Project::new(project_id, name.clone()));
        }
        if let Some(fields) = recorded.get("fields") {
            draft.fields = serde_json::from_value(fields.clone()).expect("fields deserialize");
        }

        state.draft = Some(draft.clone());
        Ok(draft)
    }

    async fn create_issue(&self, draft: &Draft) -> Result<CreatedIssue, ServiceError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ServiceError::remote("Summary is required"));
        }
        let mut state = self.state.lock().await;
        state.created.push(draft.clone());
        Ok(CreatedIssue {
            id: IssueId::from("2-543"),
            summary: draft.summary.clone(),
        })
    }

    async fn attach_file(
        &self,
        draft: &DraftId,
        url: &str,
        name: &str,
    ) -> Result<(), ServiceError> {
        stall(&self.stall_attach).await;
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(ServiceError::remote("Attachment upload failed"));
        }
        let mut state = self.state.lock().await;
        if state
            .draft
            .as_ref()
            .is_none_or(|d| d.id.as_ref() != Some(draft))
        {
            return Err(missing(draft.as_str()));
        }
        state.uploads.push((url.to_string(), name.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Picker and notifier fakes
// ---------------------------------------------------------------------------

struct StubPicker {
    fail: AtomicBool,
    counter: AtomicU64,
}

impl StubPicker {
    fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl FileSource for StubPicker {
    async fn acquire(&self, _origin: FileOrigin) -> Result<CandidateFile, AcquireError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AcquireError::new("user cancelled"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CandidateFile {
            url: format!("file:///tmp/photo-{n}.jpg"),
            name: format!("photo-{n}.jpg"),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: std::sync::Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn summaries(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("notifier lock")
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, summary: &str, cause: &dyn std::fmt::Display) {
        self.messages
            .lock()
            .expect("notifier lock")
            .push((summary.to_string(), cause.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

struct Rig {
    tracker: Arc<FakeTracker>,
    store: Arc<MemoryStore>,
    picker: Arc<StubPicker>,
    notifier: Arc<RecordingNotifier>,
    composer: Composer,
}

fn rig() -> Rig {
    let tracker = Arc::new(FakeTracker::new());
    let store = Arc::new(MemoryStore::new());
    let picker = Arc::new(StubPicker::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let composer = Composer::new(
        Arc::clone(&tracker) as Arc<dyn DraftService>,
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::clone(&picker) as Arc<dyn FileSource>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    Rig {
        tracker,
        store,
        picker,
        notifier,
        composer,
    }
}

async fn stored(rig: &Rig, key: &str) -> Option<String> {
    rig.store.get(key).await.expect("store get")
}

fn seeded_draft() -> Draft {
    Draft {
        id: Some(DraftId::from("d-7")),
        summary: Some("Stored summary".to_string()),
        description: None,
        project: ProjectSelection::Selected(Project::new("42", "DEMO")),
        fields: vec![
            CustomField::new(
                json!({"$type": "SingleEnumIssueCustomField", "name": "Priority"}),
                json!({"name": "Normal"}),
            ),
            CustomField::new(
                json!({"$type": "SingleEnumIssueCustomField", "name": "Priority"}),
                json!({"name": "Normal"}),
            ),
        ],
        attachments: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Screen entry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_screen_submits_end_to_end() {
    let rig = rig();
    rig.composer.initialize(None).await;
    assert!(rig.tracker.saves().await.is_empty());

    rig.composer.set_project(Project::new("42", "DEMO")).await;
    assert_eq!(stored(&rig, DRAFT_ID_KEY).await.as_deref(), Some("d-1"));
    assert_eq!(stored(&rig, DEFAULT_PROJECT_KEY).await.as_deref(), Some("42"));

    rig.composer.edit_summary("Bug").await;
    let outcome = rig.composer.submit().await;

    let SubmitOutcome::Created(issue) = outcome else {
        panic!("expected creation, got {outcome:?}");
    };
    assert_eq!(issue.summary.as_deref(), Some("Bug"));

    let saves = rig.tracker.saves().await;
    assert_eq!(saves.len(), 2, "project push plus the pre-create push");
    assert_eq!(saves[0].get("fields"), None, "project change omits fields");
    assert_eq!(saves[0].get("id"), None, "first push has no draft id yet");
    assert_eq!(saves[1]["id"], json!("d-1"));
    assert_eq!(saves[1]["summary"], json!("Bug"));
    assert_eq!(saves[1]["fields"], json!([]));

    let created = rig.tracker.created().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id.as_ref().map(DraftId::as_str), Some("d-1"));
    assert_eq!(created[0].summary.as_deref(), Some("Bug"));

    assert_eq!(stored(&rig, DRAFT_ID_KEY).await, None, "draft key cleaned up");
    assert_eq!(stored(&rig, DEFAULT_PROJECT_KEY).await.as_deref(), Some("42"));
    assert!(!rig.composer.is_processing().await);
    assert!(rig.notifier.summaries().is_empty());
}

#[tokio::test]
async fn initialize_recovers_persisted_draft() {
    let rig = rig();
    rig.tracker.seed_draft(seeded_draft()).await;
    rig.store.set(DRAFT_ID_KEY, "d-7").await.expect("seed key");

    rig.composer.initialize(None).await;

    let draft = rig.composer.draft().await;
    assert_eq!(draft.id.as_ref().map(DraftId::as_str), Some("d-7"));
    assert_eq!(draft.summary.as_deref(), Some("Stored summary"));
    assert!(draft.project.is_selected());
    assert!(
        rig.tracker.saves().await.is_empty(),
        "recovery adopts without pushing"
    );
}

#[tokio::test]
async fn initialize_prefers_entry_draft_over_stored_key() {
    let rig = rig();
    rig.tracker.seed_draft(seeded_draft()).await;
    rig.store.set(DRAFT_ID_KEY, "d-9").await.expect("seed key");

    rig.composer.initialize(Some(DraftId::from("d-7"))).await;

    let draft = rig.composer.draft().await;
    assert_eq!(draft.id.as_ref().map(DraftId::as_str), Some("d-7"));
}

#[tokio::test]
async fn initialize_recovers_silently_from_vanished_draft() {
    let rig = rig();
    rig.store.set(DRAFT_ID_KEY, "d-9").await.expect("seed key");
    rig.store
        .set(DEFAULT_PROJECT_KEY, "42")
        .await
        .expect("seed key");

    rig.composer.initialize(None).await;

    let draft = rig.composer.draft().await;
    assert_eq!(
        draft.id.as_ref().map(DraftId::as_str),
        Some("d-1"),
        "push-on-load created a fresh draft"
    );
    assert_eq!(draft.project.project_id().map(|id| id.as_str()), Some("42"));
    match &draft.project {
        ProjectSelection::Selected(project) => assert_eq!(project.short_name, "DEMO"),
        ProjectSelection::NotSelected => panic!("project should be bound"),
    }
    assert_eq!(
        stored(&rig, DRAFT_ID_KEY).await.as_deref(),
        Some("d-1"),
        "stale key replaced by the fresh draft's id"
    );
    assert!(rig.notifier.summaries().is_empty(), "recovery is silent");
}

#[tokio::test]
async fn initialize_without_keys_stays_fresh() {
    let rig = rig();
    rig.composer.initialize(None).await;

    let draft = rig.composer.draft().await;
    assert_eq!(draft.id, None);
    assert!(!draft.project.is_selected());
    assert!(rig.tracker.saves().await.is_empty());
    assert_eq!(rig.composer.flush().await, PushOutcome::NoProject);
}

// ---------------------------------------------------------------------------
// Push behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn push_failure_keeps_edits_for_manual_retry() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;

    rig.tracker.fail_saves.store(true, Ordering::SeqCst);
    rig.composer.edit_summary("typed text").await;
    assert_eq!(rig.composer.flush().await, PushOutcome::Failed);

    let draft = rig.composer.draft().await;
    assert_eq!(draft.summary.as_deref(), Some("typed text"));
    assert_eq!(draft.id.as_ref().map(DraftId::as_str), Some("d-1"));
    assert_eq!(
        rig.notifier.summaries(),
        vec!["Cannot update issue draft".to_string()]
    );

    rig.tracker.fail_saves.store(false, Ordering::SeqCst);
    assert_eq!(rig.composer.flush().await, PushOutcome::Saved);
    let server = rig.tracker.server_draft().await.expect("server draft");
    assert_eq!(server.summary.as_deref(), Some("typed text"));
}

#[tokio::test]
async fn vanished_project_resets_selection_without_noise() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    rig.tracker.forget_project("42").await;

    rig.composer.edit_summary("still here").await;
    assert_eq!(rig.composer.flush().await, PushOutcome::ProjectVanished);

    let draft = rig.composer.draft().await;
    assert_eq!(draft.project, ProjectSelection::NotSelected);
    assert_eq!(draft.summary.as_deref(), Some("still here"));
    assert!(rig.notifier.summaries().is_empty(), "correction is silent");
}

#[tokio::test]
async fn flush_without_new_edits_skips_the_network() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    let before = rig.tracker.saves().await.len();

    assert_eq!(rig.composer.flush().await, PushOutcome::AlreadyCurrent);
    assert_eq!(rig.composer.flush().await, PushOutcome::AlreadyCurrent);
    assert_eq!(rig.tracker.saves().await.len(), before);

    rig.composer.edit_summary("now dirty").await;
    assert_eq!(rig.composer.flush().await, PushOutcome::Saved);
    assert_eq!(rig.tracker.saves().await.len(), before + 1);
}

#[tokio::test]
async fn concurrent_flushes_collapse_into_one_save() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    rig.composer.edit_summary("one edit").await;

    rig.tracker.stall_saves.store(true, Ordering::SeqCst);
    let (first, second) = tokio::join!(rig.composer.flush(), rig.composer.flush());

    assert_eq!(first, PushOutcome::Saved);
    assert_eq!(second, PushOutcome::AlreadyCurrent);
    let saves = rig.tracker.saves().await;
    assert_eq!(saves.len(), 2, "project push plus exactly one flush");
    assert_eq!(saves[1]["summary"], json!("one edit"));
}

#[tokio::test]
async fn project_change_pushes_without_fields_but_field_edit_pushes_them() {
    let rig = rig();
    rig.tracker.seed_draft(seeded_draft()).await;
    rig.composer.initialize(Some(DraftId::from("d-7"))).await;

    rig.composer.set_project(Project::new("7", "OPS")).await;
    let saves = rig.tracker.saves().await;
    let project_push = saves.last().expect("project push recorded");
    assert_eq!(project_push.get("fields"), None);
    assert_eq!(project_push.pointer("/project/id"), Some(&json!("7")));

    let key = rig.composer.draft().await.fields[1].key;
    rig.composer
        .set_field_value(key, json!({"name": "Critical"}))
        .await;
    let saves = rig.tracker.saves().await;
    let field_push = saves.last().expect("field push recorded");
    let fields = field_push.get("fields").expect("field push carries fields");
    assert_eq!(fields[1]["value"], json!({"name": "Critical"}));
}

#[tokio::test]
async fn sticky_project_key_is_written_even_when_the_push_fails() {
    let rig = rig();
    rig.tracker.fail_saves.store(true, Ordering::SeqCst);

    rig.composer.set_project(Project::new("42", "DEMO")).await;

    assert_eq!(stored(&rig, DEFAULT_PROJECT_KEY).await.as_deref(), Some("42"));
    assert_eq!(
        rig.notifier.summaries(),
        vec!["Cannot update issue draft".to_string()]
    );
}

#[tokio::test]
async fn field_edit_targets_one_entry_even_when_values_are_equal() {
    let rig = rig();
    rig.tracker.seed_draft(seeded_draft()).await;
    rig.composer.initialize(Some(DraftId::from("d-7"))).await;

    let draft = rig.composer.draft().await;
    assert_eq!(draft.fields[0].value, draft.fields[1].value);
    let second = draft.fields[1].key;
    assert_ne!(draft.fields[0].key, second);

    rig.composer
        .set_field_value(second, json!({"name": "High"}))
        .await;

    let draft = rig.composer.draft().await;
    assert_eq!(draft.fields.len(), 2);
    assert_eq!(draft.fields[0].value, json!({"name": "Normal"}));
    assert_eq!(draft.fields[1].value, json!({"name": "High"}));
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn attach_prepends_and_clears_the_slot() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;

    let outcome = rig.composer.attach_photo(FileOrigin::Library).await;

    assert_eq!(outcome, AttachOutcome::Attached);
    let draft = rig.composer.draft().await;
    assert_eq!(draft.attachments.len(), 1);
    assert_eq!(draft.attachments[0].name, "photo-1.jpg");
    assert_eq!(rig.composer.attaching().await, None);
    assert_eq!(
        rig.tracker.uploads().await,
        vec![("file:///tmp/photo-1.jpg".to_string(), "photo-1.jpg".to_string())]
    );
}

#[tokio::test]
async fn failed_upload_rolls_back_exactly_the_candidate() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    assert_eq!(
        rig.composer.attach_photo(FileOrigin::Library).await,
        AttachOutcome::Attached
    );

    rig.tracker.fail_attach.store(true, Ordering::SeqCst);
    let outcome = rig.composer.attach_photo(FileOrigin::Camera).await;

    assert_eq!(outcome, AttachOutcome::UploadFailed);
    let draft = rig.composer.draft().await;
    assert_eq!(draft.attachments.len(), 1, "only the candidate was removed");
    assert_eq!(draft.attachments[0].name, "photo-1.jpg");
    assert_eq!(rig.composer.attaching().await, None);
    assert_eq!(
        rig.notifier.summaries(),
        vec!["Cannot attach file".to_string()]
    );
}

#[tokio::test]
async fn second_attach_is_rejected_while_one_is_in_flight() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;

    rig.tracker.stall_attach.store(true, Ordering::SeqCst);
    let (first, second) = tokio::join!(
        rig.composer.attach_photo(FileOrigin::Library),
        rig.composer.attach_photo(FileOrigin::Library)
    );

    assert_eq!(first, AttachOutcome::Attached);
    assert_eq!(second, AttachOutcome::AlreadyAttaching);
    assert_eq!(rig.composer.draft().await.attachments.len(), 1);
    assert_eq!(rig.tracker.uploads().await.len(), 1);
}

#[tokio::test]
async fn attach_against_an_unsaved_draft_fails_and_rolls_back() {
    let rig = rig();

    let outcome = rig.composer.attach_photo(FileOrigin::Library).await;

    assert_eq!(outcome, AttachOutcome::UploadFailed);
    assert!(rig.composer.draft().await.attachments.is_empty());
    assert_eq!(rig.composer.attaching().await, None);
    assert!(rig.tracker.uploads().await.is_empty());
    assert_eq!(
        rig.notifier.summaries(),
        vec!["Cannot attach file".to_string()]
    );
}

#[tokio::test]
async fn cancelled_picker_mutates_nothing() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    rig.picker.fail.store(true, Ordering::SeqCst);

    let outcome = rig.composer.attach_photo(FileOrigin::Camera).await;

    assert_eq!(outcome, AttachOutcome::AcquireFailed);
    assert!(rig.composer.draft().await.attachments.is_empty());
    assert_eq!(rig.composer.attaching().await, None);
    assert_eq!(
        rig.notifier.summaries(),
        vec!["ImagePicker error".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_is_blocked_until_the_gate_opens() {
    let rig = rig();
    rig.composer.initialize(None).await;

    assert_eq!(rig.composer.submit().await, SubmitOutcome::Blocked);

    rig.composer.edit_summary("Bug").await;
    assert_eq!(
        rig.composer.submit().await,
        SubmitOutcome::Blocked,
        "summary alone is not enough"
    );

    rig.composer.set_project(Project::new("42", "DEMO")).await;
    assert!(rig.composer.can_submit().await);
    assert!(rig.tracker.created().await.is_empty());
}

#[tokio::test]
async fn submit_is_blocked_while_an_attachment_is_in_flight() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    rig.composer.edit_summary("Bug").await;

    rig.tracker.stall_attach.store(true, Ordering::SeqCst);
    let (attach, submit) = tokio::join!(
        rig.composer.attach_photo(FileOrigin::Library),
        rig.composer.submit()
    );

    assert_eq!(attach, AttachOutcome::Attached);
    assert_eq!(submit, SubmitOutcome::Blocked);
    assert!(rig.tracker.created().await.is_empty());
}

#[tokio::test]
async fn failed_creation_keeps_the_draft_recoverable() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    rig.composer.edit_summary("Bug").await;

    rig.tracker.fail_creates.store(true, Ordering::SeqCst);
    assert_eq!(rig.composer.submit().await, SubmitOutcome::Failed);

    assert!(!rig.composer.is_processing().await);
    assert_eq!(
        stored(&rig, DRAFT_ID_KEY).await.as_deref(),
        Some("d-1"),
        "draft stays recoverable after a failed creation"
    );
    assert_eq!(
        rig.notifier.summaries(),
        vec!["Cannot create issue".to_string()]
    );

    rig.tracker.fail_creates.store(false, Ordering::SeqCst);
    let outcome = rig.composer.submit().await;
    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    assert!(!rig.composer.is_processing().await);
    assert_eq!(stored(&rig, DRAFT_ID_KEY).await, None);
}

#[tokio::test]
async fn submit_pushes_pending_edits_before_creating() {
    let rig = rig();
    rig.composer.set_project(Project::new("42", "DEMO")).await;
    rig.composer.edit_summary("First title").await;
    rig.composer.flush().await;
    rig.composer.edit_summary("Final title").await;

    let outcome = rig.composer.submit().await;

    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    let created = rig.tracker.created().await;
    assert_eq!(created[0].summary.as_deref(), Some("Final title"));
    let server = rig.tracker.server_draft().await.expect("server draft");
    assert_eq!(server.summary.as_deref(), Some("Final title"));
}
