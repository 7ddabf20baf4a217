//! Lifecycle controller.
//!
//! Owns the editor state (files, stdin, mode, split) and turns run requests
//! into documents for the execution host. Every run replaces the hosted
//! content unconditionally; there is no queue. Time is always passed in, so
//! the dwell and the persistence debounce are deterministic under test.

use crate::config::{Config, RuntimeConfig};
use crate::download::Download;
use crate::host::ExecutionHost;
use crate::persist::{clamp_split_ratio, Debouncer, PersistedState};
use crate::storage::Storage;
use sandpit_render::DocumentBuilder;
use sandpit_runtime::RuntimeResult;
use sandpit_types::{files, ExecutionMode, Generation, RunTrigger, SourceFileSet, StdinBuffer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    Building,
}

/// Running indicator held for a minimum dwell after each run
#[derive(Debug, Clone)]
pub struct RunIndicator {
    dwell: Duration,
    since: Option<Instant>,
}

impl RunIndicator {
    pub fn new(dwell: Duration) -> Self {
        Self { dwell, since: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.since = Some(now);
    }

    pub fn is_running(&self, now: Instant) -> bool {
        self.since
            .map(|since| now.saturating_duration_since(since) < self.dwell)
            .unwrap_or(false)
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }
}

/// One-shot latch for the automatic first run
#[derive(Debug, Clone, Default)]
pub struct AutoRunGuard {
    fired: bool,
}

impl AutoRunGuard {
    /// True exactly once
    pub fn try_fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

/// Parameters supplied with the page load, e.g. `/?code=...&run=1`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LaunchParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub run: Option<String>,
}

impl LaunchParams {
    pub fn auto_run(&self) -> bool {
        self.run.as_deref() == Some("1")
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.run.is_none()
    }
}

/// A key press as reported by the editing surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    /// Ctrl+Enter or Cmd+Enter
    pub fn is_run_shortcut(&self) -> bool {
        (self.ctrl || self.meta) && self.key == "Enter"
    }
}

/// What a run request produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReceipt {
    pub generation: Generation,
    pub trigger: RunTrigger,
    pub mode: ExecutionMode,
    pub bytes: usize,
}

/// Serializable view of the editor state
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub mode: ExecutionMode,
    pub route: String,
    pub active_file: String,
    pub files: BTreeMap<String, String>,
    pub stdin: String,
    pub split_ratio: f64,
    pub generation: Option<Generation>,
    pub running: bool,
    pub state: LifecycleState,
}

pub struct Lifecycle<H: ExecutionHost, S: Storage> {
    host: H,
    persisted: PersistedState<S>,
    builder: DocumentBuilder,

    files: SourceFileSet,
    stdin: StdinBuffer,
    mode: ExecutionMode,
    active_file: String,
    split_ratio: f64,

    state: LifecycleState,
    generation: Generation,
    indicator: RunIndicator,
    auto_run: AutoRunGuard,
    launch_consumed: bool,

    debounce: Debouncer,
    files_dirty: bool,
    stdin_dirty: bool,
    split_dirty: bool,
}

impl<H: ExecutionHost, S: Storage> Lifecycle<H, S> {
    /// Restore persisted state and start idle in `mode`
    pub fn new(host: H, storage: S, mode: ExecutionMode, runtime: &RuntimeConfig) -> Self {
        let persisted = PersistedState::new(storage);
        let files = persisted.load_files();
        let stdin = persisted.load_stdin();
        let split_ratio = persisted.load_split_ratio();

        Self {
            host,
            persisted,
            builder: DocumentBuilder::new(),
            files,
            stdin,
            mode,
            active_file: mode.active_file().to_string(),
            split_ratio,
            state: LifecycleState::Idle,
            generation: Generation::new(0),
            indicator: RunIndicator::new(runtime.dwell()),
            auto_run: AutoRunGuard::default(),
            launch_consumed: false,
            debounce: Debouncer::new(runtime.persist_debounce()),
            files_dirty: false,
            stdin_dirty: false,
            split_dirty: false,
        }
    }

    pub fn from_config(host: H, storage: S, config: &Config) -> Self {
        Self::new(host, storage, config.default_mode, &config.runtime)
    }

    /// Replace the editor contents, e.g. with files loaded from disk
    pub fn with_sources(mut self, files: SourceFileSet, stdin: StdinBuffer) -> Self {
        self.files = files;
        self.stdin = stdin;
        self
    }

    /// Apply launch parameters after the initial mount
    ///
    /// Parameters are consumed on the first call only. `code` replaces the
    /// entry script; `run=1` triggers the one-shot automatic run.
    pub fn mount(&mut self, params: LaunchParams, now: Instant) -> RuntimeResult<Option<RunReceipt>> {
        if std::mem::replace(&mut self.launch_consumed, true) {
            return Ok(None);
        }
        if let Some(code) = params.code.as_deref() {
            tracing::info!(bytes = code.len(), "Loading launch code into {}", files::ENTRY);
            self.edit_file(files::ENTRY, code, now);
        }
        if params.auto_run() && self.auto_run.try_fire() {
            return self.request_run(RunTrigger::AutoRun, now).map(Some);
        }
        Ok(None)
    }

    /// Start a new page load: launch parameters and the auto-run apply again
    pub fn reload(&mut self) {
        self.launch_consumed = false;
        self.auto_run = AutoRunGuard::default();
    }

    /// Build a document for the current state and hand it to the host
    pub fn request_run(&mut self, trigger: RunTrigger, now: Instant) -> RuntimeResult<RunReceipt> {
        self.state = LifecycleState::Building;
        let generation = self.generation.next();

        let document = self.builder.build(self.mode, &self.files, &self.stdin);
        let bytes = document.len();
        let result = self.host.replace(generation, document);
        self.state = LifecycleState::Idle;
        result?;

        self.generation = generation;
        self.indicator.start(now);

        tracing::info!(
            generation = %self.generation,
            mode = %self.mode,
            ?trigger,
            "Run requested"
        );
        Ok(RunReceipt {
            generation: self.generation,
            trigger,
            mode: self.mode,
            bytes,
        })
    }

    /// Run on Ctrl/Cmd+Enter, ignore everything else
    pub fn handle_key(&mut self, chord: &KeyChord, now: Instant) -> RuntimeResult<Option<RunReceipt>> {
        if chord.is_run_shortcut() {
            self.request_run(RunTrigger::Shortcut, now).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Switch mode; the active file follows and the new route is returned
    pub fn set_mode(&mut self, mode: ExecutionMode) -> &'static str {
        if mode != self.mode {
            tracing::debug!(from = %self.mode, to = %mode, "Switching mode");
        }
        self.mode = mode;
        self.active_file = mode.active_file().to_string();
        mode.route()
    }

    /// Select a tab of the current mode
    pub fn select_file(&mut self, name: &str) -> bool {
        if self.mode.files().contains(&name) {
            self.active_file = name.to_string();
            true
        } else {
            false
        }
    }

    /// Overwrite a well-known file; unknown names are refused
    pub fn edit_file(&mut self, name: &str, content: &str, now: Instant) -> bool {
        if !is_known_file(name) {
            tracing::debug!("Refusing edit of unknown file {:?}", name);
            return false;
        }
        self.files.set(name, content);
        self.files_dirty = true;
        self.debounce.touch(now);
        true
    }

    pub fn set_stdin(&mut self, raw: &str, now: Instant) {
        self.stdin.replace(raw);
        self.stdin_dirty = true;
        self.debounce.touch(now);
    }

    pub fn reset_stdin(&mut self, now: Instant) {
        self.stdin.reset();
        self.stdin_dirty = true;
        self.debounce.touch(now);
    }

    /// Store a new split ratio, clamped; non-finite values are rejected
    pub fn set_split_ratio(&mut self, ratio: f64, now: Instant) -> Option<f64> {
        if !ratio.is_finite() {
            return None;
        }
        self.split_ratio = clamp_split_ratio(ratio);
        self.split_dirty = true;
        self.debounce.touch(now);
        Some(self.split_ratio)
    }

    /// Persist once the debounce delay has passed without edits
    pub fn poll_persistence(&mut self, now: Instant) -> bool {
        if self.debounce.due(now) {
            self.flush_persistence()
        } else {
            false
        }
    }

    /// Persist every dirty part immediately; returns whether anything was written
    pub fn flush_persistence(&mut self) -> bool {
        self.debounce.cancel();
        let mut wrote = false;
        if std::mem::take(&mut self.files_dirty) {
            wrote |= self.persisted.save_files(&self.files);
        }
        if std::mem::take(&mut self.stdin_dirty) {
            wrote |= self.persisted.save_stdin(&self.stdin);
        }
        if std::mem::take(&mut self.split_dirty) {
            wrote |= self.persisted.save_split_ratio(self.split_ratio);
        }
        if wrote {
            tracing::debug!("Persisted editor state");
        }
        wrote
    }

    pub fn is_dirty(&self) -> bool {
        self.files_dirty || self.stdin_dirty || self.split_dirty
    }

    pub fn download(&self) -> Download {
        Download::for_mode(&self.builder, self.mode, &self.files, &self.stdin)
    }

    pub fn snapshot(&self, now: Instant) -> StateSnapshot {
        StateSnapshot {
            mode: self.mode,
            route: self.mode.route().to_string(),
            active_file: self.active_file.clone(),
            files: self.files.as_map().clone(),
            stdin: self.stdin.raw().to_string(),
            split_ratio: self.split_ratio,
            generation: self.host.current_generation(),
            running: self.is_running(now),
            state: self.state,
        }
    }

    pub fn is_running(&self, now: Instant) -> bool {
        self.state == LifecycleState::Building || self.indicator.is_running(now)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn files(&self) -> &SourceFileSet {
        &self.files
    }

    pub fn stdin(&self) -> &StdinBuffer {
        &self.stdin
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn active_file(&self) -> &str {
        &self.active_file
    }

    pub fn split_ratio(&self) -> f64 {
        self.split_ratio
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn persisted(&self) -> &PersistedState<S> {
        &self.persisted
    }
}

/// One of the well-known filenames of either mode
pub fn is_known_file(name: &str) -> bool {
    ExecutionMode::Markup.files().contains(&name) || ExecutionMode::Script.files().contains(&name)
}
