use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinSet;

use crate::capture::{CaptureEngine, ReplaceMethod};
use crate::config::{CredentialStore, MAX_VERSIONS, ProviderConfig};
use crate::dispatch::{ProviderClient, ProviderRequest};
use crate::error::ReformatError;
use crate::modes::{Mode, ModeBook};
use crate::prompt::build_system_prompt;
use crate::selection::{CandidatePicker, Selection};

/// Where the current reformat cycle is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    Capturing,
    Transforming,
    Replacing,
    PresentingCandidates,
    /// Holds the user-facing message until the error is cleared.
    Error(String),
}

impl ProcessingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Error(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Capturing => "Capturing text...",
            Self::Transforming => "Reformatting...",
            Self::Replacing => "Replacing text...",
            Self::PresentingCandidates => "Choose a version",
            Self::Error(_) => "Error",
        }
    }
}

/// The single revert slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastChange {
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The selection was replaced with `text`.
    Replaced { text: String, method: ReplaceMethod },
    /// The user dismissed the candidate picker.
    Cancelled,
    /// Another cycle was running; the trigger was dropped.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    Reverted,
    /// A cycle was running; the trigger was dropped.
    Busy,
}

/// Drives capture → transform → replace.
///
/// Owns the processing state and the last-change record. Only one cycle runs
/// at a time: a trigger that arrives while a cycle is in flight is dropped.
pub struct Orchestrator {
    engine: CaptureEngine,
    picker: CandidatePicker,
    credentials: Arc<CredentialStore>,
    client: RwLock<Option<Arc<ProviderClient>>>,
    modes: Mutex<ModeBook>,
    knowledge: RwLock<String>,
    candidate_count: AtomicUsize,
    error_hold: Mutex<Duration>,
    state: Arc<Mutex<ProcessingState>>,
    /// Bumped on every failure so a stale auto-clear does not wipe a newer error.
    error_epoch: Arc<AtomicU64>,
    last_change: Mutex<Option<LastChange>>,
}

impl Orchestrator {
    pub fn new(
        engine: CaptureEngine,
        picker: CandidatePicker,
        credentials: Arc<CredentialStore>,
        modes: ModeBook,
    ) -> Self {
        Self {
            engine,
            picker,
            credentials,
            client: RwLock::new(None),
            modes: Mutex::new(modes),
            knowledge: RwLock::new(String::new()),
            candidate_count: AtomicUsize::new(1),
            error_hold: Mutex::new(Duration::from_secs(3)),
            state: Arc::new(Mutex::new(ProcessingState::Idle)),
            error_epoch: Arc::new(AtomicU64::new(0)),
            last_change: Mutex::new(None),
        }
    }

    /// (Re)build the provider client from `config`. The credential is read
    /// once here. On failure the orchestrator is left unconfigured and
    /// cycles fail with `NotConfigured`. A running cycle keeps the client it
    /// started with.
    pub fn configure(&self, config: ProviderConfig) -> Result<(), ReformatError> {
        let built = ProviderClient::from_config(config, &self.credentials);
        let mut slot = self.client.write().unwrap_or_else(|e| e.into_inner());
        match built {
            Ok(client) => {
                *slot = Some(Arc::new(client));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("provider not configured: {e}");
                *slot = None;
                Err(e)
            }
        }
    }

    /// Number of candidates per cycle. 1 means replace directly; larger
    /// values are capped at `MAX_VERSIONS`.
    pub fn set_candidate_count(&self, n: usize) {
        self.candidate_count
            .store(n.clamp(1, MAX_VERSIONS), Ordering::Relaxed);
    }

    pub fn candidate_count(&self) -> usize {
        self.candidate_count.load(Ordering::Relaxed)
    }

    pub fn set_knowledge(&self, knowledge: String) {
        *self.knowledge.write().unwrap_or_else(|e| e.into_inner()) = knowledge;
    }

    /// How long the Error state is displayed before returning to Idle.
    pub fn set_error_hold(&self, hold: Duration) {
        *self.error_hold.lock().unwrap_or_else(|e| e.into_inner()) = hold;
    }

    pub fn state(&self) -> ProcessingState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_change(&self) -> Option<LastChange> {
        self.last_change
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn can_revert(&self) -> bool {
        self.last_change().is_some()
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.modes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current()
            .cloned()
    }

    pub fn cycle_mode(&self) -> Option<Mode> {
        let mode = self
            .modes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cycle_next()
            .cloned();
        if let Some(ref m) = mode {
            tracing::info!(mode = %m.id, "mode changed");
        }
        mode
    }

    /// Select a mode by id. Returns the new mode, or None for an unknown id.
    pub fn switch_mode(&self, id: &str) -> Option<Mode> {
        let mut book = self.modes.lock().unwrap_or_else(|e| e.into_inner());
        if book.switch_to(id) {
            let mode = book.current().cloned();
            tracing::info!(mode = id, "mode changed");
            mode
        } else {
            tracing::warn!(mode = id, "unknown mode");
            None
        }
    }

    /// Leave the Error state immediately.
    pub fn clear_error(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, ProcessingState::Error(_)) {
            *state = ProcessingState::Idle;
        }
    }

    /// Run one reformat cycle on the current selection.
    pub async fn reformat(&self) -> Result<CycleOutcome, ReformatError> {
        if !self.try_begin() {
            tracing::debug!("reformat trigger dropped, cycle in progress");
            return Ok(CycleOutcome::Busy);
        }

        let result = self.run_cycle().await;
        match &result {
            Ok(outcome) => {
                tracing::info!(outcome = ?outcome_name(outcome), "cycle finished");
                self.set_state(ProcessingState::Idle);
            }
            Err(e) => self.fail(e),
        }
        result
    }

    /// Undo the last replace through the target application's own undo.
    ///
    /// Holds `Replacing` for the duration, so a reformat cannot start while
    /// the undo is still being delivered. Allowed while an error is on
    /// display; the error is cleared.
    pub async fn revert(&self) -> Result<RevertOutcome, ReformatError> {
        if !self.try_enter(ProcessingState::Replacing, true) {
            tracing::debug!("revert trigger dropped, cycle in progress");
            return Ok(RevertOutcome::Busy);
        }
        // A pending error auto-clear must not fire mid-revert.
        self.error_epoch.fetch_add(1, Ordering::SeqCst);

        if !self.can_revert() {
            self.set_state(ProcessingState::Idle);
            return Err(ReformatError::NothingToRevert);
        }

        self.engine.revert().await;
        *self.last_change.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_state(ProcessingState::Idle);
        tracing::info!("reverted last change");
        Ok(RevertOutcome::Reverted)
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, ReformatError> {
        // Snapshot everything the cycle reads; edits mid-cycle apply to the next one.
        let client = self
            .client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ReformatError::NotConfigured)?;
        let mode = self.current_mode().ok_or(ReformatError::NoMode)?;
        let knowledge = self
            .knowledge
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let count = self.candidate_count();

        tracing::info!(mode = %mode.id, candidates = count, "cycle started");

        let original = self.engine.capture().await?;

        self.set_state(ProcessingState::Transforming);
        let request = ProviderRequest::new(
            original.clone(),
            build_system_prompt(&mode.instruction, &knowledge),
        );

        let replacement = if count <= 1 {
            client.send(&request).await?
        } else {
            let candidates = generate_candidates(client, request, count).await?;
            self.set_state(ProcessingState::PresentingCandidates);
            match self.picker.present(candidates, original.clone()).await {
                Selection::Chosen(text) => text,
                Selection::Cancelled => {
                    tracing::info!("candidate selection cancelled");
                    return Ok(CycleOutcome::Cancelled);
                }
            }
        };

        self.set_state(ProcessingState::Replacing);
        *self.last_change.lock().unwrap_or_else(|e| e.into_inner()) = Some(LastChange {
            original,
            replacement: replacement.clone(),
        });
        let method = self.engine.replace(&replacement).await?;

        Ok(CycleOutcome::Replaced {
            text: replacement,
            method,
        })
    }

    /// Idle → Capturing, atomically. False when a cycle is already running
    /// or an error is still on display.
    fn try_begin(&self) -> bool {
        self.try_enter(ProcessingState::Capturing, false)
    }

    /// Move into `next` unless something is in flight. `from_error` also
    /// permits leaving the Error state.
    fn try_enter(&self, next: ProcessingState, from_error: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let free = state.is_idle() || (from_error && matches!(*state, ProcessingState::Error(_)));
        if !free {
            return false;
        }
        *state = next;
        true
    }

    fn set_state(&self, next: ProcessingState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    fn fail(&self, e: &ReformatError) {
        let message = e.user_message();
        tracing::warn!(kind = ?e.kind(), "cycle failed: {e}");
        self.set_state(ProcessingState::Error(message));

        let epoch = self.error_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let hold = *self.error_hold.lock().unwrap_or_else(|e| e.into_inner());
        let state = Arc::clone(&self.state);
        let error_epoch = Arc::clone(&self.error_epoch);
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            if error_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*state, ProcessingState::Error(_)) {
                *state = ProcessingState::Idle;
            }
        });
    }
}

fn outcome_name(outcome: &CycleOutcome) -> &'static str {
    match outcome {
        CycleOutcome::Replaced { .. } => "replaced",
        CycleOutcome::Cancelled => "cancelled",
        CycleOutcome::Busy => "busy",
    }
}

/// Issue `count` identical requests concurrently and collect every answer.
///
/// All-or-nothing: the first failure aborts the remaining tasks and is
/// returned on its own; successful siblings are discarded. Aborting only
/// stops waiting on the requests, it does not cancel them server-side.
/// Order of the returned candidates follows completion order.
pub async fn generate_candidates(
    client: Arc<ProviderClient>,
    request: ProviderRequest,
    count: usize,
) -> Result<Vec<String>, ReformatError> {
    let request = Arc::new(request);
    let mut set = JoinSet::new();
    for _ in 0..count {
        let client = Arc::clone(&client);
        let request = Arc::clone(&request);
        set.spawn(async move { client.send(&request).await });
    }

    let mut candidates = Vec::with_capacity(count);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(text)) => candidates.push(text),
            Ok(Err(e)) => {
                set.abort_all();
                tracing::debug!(
                    completed = candidates.len(),
                    "candidate failed, abandoning siblings"
                );
                return Err(e);
            }
            Err(join_err) if join_err.is_panic() => {
                set.abort_all();
                tracing::error!("candidate task panicked: {join_err}");
                return Err(ReformatError::invalid_response(format!(
                    "candidate task panicked: {join_err}"
                )));
            }
            // Cancelled: only happens after abort_all, which returns first
            Err(_) => {}
        }
    }

    if candidates.len() != count {
        return Err(ReformatError::invalid_response(format!(
            "expected {count} candidates, got {}",
            candidates.len()
        )));
    }
    Ok(candidates)
}
