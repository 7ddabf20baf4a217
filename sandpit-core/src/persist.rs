//! Best-effort persistence of the editor state.
//!
//! Nothing here ever fails the caller: a read that fails falls back to the
//! default, a write that fails is logged and dropped.

use crate::storage::Storage;
use sandpit_types::{SourceFileSet, StdinBuffer};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Storage key of the source file set (flat JSON record)
pub const FILES_KEY: &str = "sandpit:snippet_files";

/// Storage key of the raw stdin text
pub const STDIN_KEY: &str = "sandpit:stdin";

/// Storage key of the editor/preview split ratio
pub const SPLIT_KEY: &str = "sandpit:split_ratio";

pub const DEFAULT_SPLIT_RATIO: f64 = 0.5;

/// Editor state stored under well-known keys
#[derive(Debug, Clone)]
pub struct PersistedState<S: Storage> {
    storage: S,
}

impl<S: Storage> PersistedState<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Saved files layered over the defaults
    pub fn load_files(&self) -> SourceFileSet {
        let raw = match self.storage.get_item(FILES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SourceFileSet::with_defaults(),
            Err(e) => {
                tracing::warn!("Failed to read saved files: {}", e);
                return SourceFileSet::with_defaults();
            }
        };
        match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(saved) => SourceFileSet::merged_over_defaults(saved),
            Err(e) => {
                tracing::warn!("Ignoring malformed saved files: {}", e);
                SourceFileSet::with_defaults()
            }
        }
    }

    pub fn load_stdin(&self) -> StdinBuffer {
        match self.storage.get_item(STDIN_KEY) {
            Ok(raw) => StdinBuffer::new(raw.unwrap_or_default()),
            Err(e) => {
                tracing::warn!("Failed to read saved stdin: {}", e);
                StdinBuffer::default()
            }
        }
    }

    pub fn load_split_ratio(&self) -> f64 {
        match self.storage.get_item(SPLIT_KEY) {
            Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(ratio) if ratio.is_finite() => clamp_split_ratio(ratio),
                _ => {
                    tracing::warn!("Ignoring malformed split ratio {:?}", raw);
                    DEFAULT_SPLIT_RATIO
                }
            },
            Ok(None) => DEFAULT_SPLIT_RATIO,
            Err(e) => {
                tracing::warn!("Failed to read split ratio: {}", e);
                DEFAULT_SPLIT_RATIO
            }
        }
    }

    /// Returns whether the write reached storage
    pub fn save_files(&mut self, files: &SourceFileSet) -> bool {
        let raw = match serde_json::to_string(files.as_map()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize files: {}", e);
                return false;
            }
        };
        self.write(FILES_KEY, &raw)
    }

    pub fn save_stdin(&mut self, stdin: &StdinBuffer) -> bool {
        self.write(STDIN_KEY, stdin.raw())
    }

    pub fn save_split_ratio(&mut self, ratio: f64) -> bool {
        self.write(SPLIT_KEY, &ratio.to_string())
    }

    fn write(&mut self, key: &str, value: &str) -> bool {
        match self.storage.set_item(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to persist {}: {}", key, e);
                false
            }
        }
    }
}

/// Keep the split between 10% and 90%
pub fn clamp_split_ratio(ratio: f64) -> f64 {
    ratio.clamp(0.1, 0.9)
}

/// Trailing-edge debounce on an explicit clock
///
/// Each `touch` pushes the deadline back; `due` fires once the deadline has
/// passed and disarms until the next touch.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
