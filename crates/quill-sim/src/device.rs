//! Simulated device backends: durable store, image picker, notifier.
//!
//! Each backend rolls its own fault knob from the shared deterministic RNG
//! and logs every call so the oracle can compare what the composer attempted
//! against what the device actually holds. The store additionally exposes
//! ground-truth accessors that bypass fault injection entirely.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use quill_core::{
    AcquireError, CandidateFile, FileOrigin, FileSource, KeyValueStore, Notifier, StoreError,
};

use crate::faults::FaultPlan;
use crate::rng::DeterministicRng;

/// Kind of store call the device received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCallKind {
    Get,
    Set,
    Delete,
}

/// One logged store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub kind: StoreCallKind,
    pub key: String,
    pub faulted: bool,
}

struct StoreState {
    entries: BTreeMap<String, String>,
    calls: Vec<StoreCall>,
}

/// Key-value store with injectable backend failures.
pub struct SimStore {
    plan: FaultPlan,
    rng: Arc<Mutex<DeterministicRng>>,
    state: Mutex<StoreState>,
}

impl SimStore {
    #[must_use]
    pub fn new(plan: FaultPlan, rng: Arc<Mutex<DeterministicRng>>) -> Self {
        Self {
            plan,
            rng,
            state: Mutex::new(StoreState {
                entries: BTreeMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// What the store actually holds, fault rolls and log aside.
    #[must_use]
    pub fn ground_truth(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    /// Seed a value directly, as a previous app run would have left it.
    pub fn seed(&self, key: &str, value: &str) {
        self.lock().entries.insert(key.to_string(), value.to_string());
    }

    /// Full call log so far.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Number of calls logged so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll(&self) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hit_rate_percent(self.plan.store_fail_percent)
    }
}

#[async_trait]
impl KeyValueStore for SimStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let faulted = self.roll();
        let mut state = self.lock();
        state.calls.push(StoreCall {
            kind: StoreCallKind::Get,
            key: key.to_string(),
            faulted,
        });
        if faulted {
            return Err(StoreError::new("simulated storage read failure"));
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let faulted = self.roll();
        let mut state = self.lock();
        state.calls.push(StoreCall {
            kind: StoreCallKind::Set,
            key: key.to_string(),
            faulted,
        });
        if faulted {
            return Err(StoreError::new("simulated storage write failure"));
        }
        state.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let faulted = self.roll();
        let mut state = self.lock();
        state.calls.push(StoreCall {
            kind: StoreCallKind::Delete,
            key: key.to_string(),
            faulted,
        });
        if faulted {
            return Err(StoreError::new("simulated storage delete failure"));
        }
        state.entries.remove(key);
        Ok(())
    }
}

/// One logged picker call. `name` is `None` when the pick was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireCall {
    pub name: Option<String>,
    pub faulted: bool,
}

struct FilesState {
    served: u64,
    calls: Vec<AcquireCall>,
}

/// Image picker that serves numbered photos and sometimes cancels.
pub struct SimFiles {
    plan: FaultPlan,
    rng: Arc<Mutex<DeterministicRng>>,
    state: Mutex<FilesState>,
}

impl SimFiles {
    #[must_use]
    pub fn new(plan: FaultPlan, rng: Arc<Mutex<DeterministicRng>>) -> Self {
        Self {
            plan,
            rng,
            state: Mutex::new(FilesState {
                served: 0,
                calls: Vec::new(),
            }),
        }
    }

    /// Full call log so far.
    #[must_use]
    pub fn calls(&self) -> Vec<AcquireCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FilesState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FileSource for SimFiles {
    async fn acquire(&self, _origin: FileOrigin) -> Result<CandidateFile, AcquireError> {
        let faulted = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hit_rate_percent(self.plan.acquire_cancel_percent);
        let mut state = self.lock();
        if faulted {
            state.calls.push(AcquireCall {
                name: None,
                faulted: true,
            });
            return Err(AcquireError::new("simulated picker cancellation"));
        }
        state.served += 1;
        let name = format!("sim-photo-{}.jpg", state.served);
        state.calls.push(AcquireCall {
            name: Some(name.clone()),
            faulted: false,
        });
        Ok(CandidateFile {
            url: format!("file:///sim/{name}"),
            name,
        })
    }
}

/// Captures notifications so the oracle can count them per operation.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(summary, cause)` pairs recorded so far.
    #[must_use]
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications recorded so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, summary: &str, cause: &dyn fmt::Display) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((summary.to_string(), cause.to_string()));
    }
}
