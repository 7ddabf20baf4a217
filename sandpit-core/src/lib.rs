//! # sandpit-core
//!
//! Core library for the sandpit playground.
//!
//! This crate holds everything around a run: configuration, best-effort
//! persistence of the editor state, the execution host seam, the lifecycle
//! controller that turns run requests into hosted documents, the download
//! surface, and the on-disk workspace used by the CLI.

pub mod config;
pub mod download;
pub mod host;
pub mod lifecycle;
pub mod persist;
pub mod storage;
pub mod workspace;

pub use config::{Config, ConfigError, ConfigResult, CONFIG_FILENAME};
pub use download::Download;
pub use host::{ExecutionHost, FrameHost, FrameLookup, HostedFrame};
pub use lifecycle::{
    is_known_file, AutoRunGuard, KeyChord, LaunchParams, Lifecycle, LifecycleState, RunIndicator,
    RunReceipt, StateSnapshot,
};
pub use persist::{
    clamp_split_ratio, Debouncer, PersistedState, DEFAULT_SPLIT_RATIO, FILES_KEY, SPLIT_KEY,
    STDIN_KEY,
};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageResult};
pub use workspace::{Workspace, WorkspaceError, WorkspaceResult, STDIN_FILENAME, WORKSPACE_FILES};
