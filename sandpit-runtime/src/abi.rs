//! Runtime boundary type definitions
//!
//! This module defines the types that cross the boundary between the host and
//! the executed content: console levels, fault locations, the sandbox policy
//! of the execution host, and runtime errors.

use serde::{Deserialize, Serialize};
use sandpit_types::Generation;
use std::fmt;

/// Console emission level
///
/// Each level maps to one overridden output primitive and to the CSS class of
/// the rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Debug,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
    ];

    /// Name of the console method and of the line's CSS class
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location of a fault (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Permissions a sandboxed execution host may grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SandboxPermission {
    /// Run scripts
    Scripts,
    /// Keep the host page's origin (storage, cookies)
    SameOrigin,
    /// Show blocking dialogs
    Modals,
    /// Submit forms
    Forms,
    /// Open new windows
    Popups,
    /// Navigate the parent page
    TopNavigation,
}

impl SandboxPermission {
    /// Token used in the iframe `sandbox` attribute and the CSP directive
    pub fn token(&self) -> &'static str {
        match self {
            SandboxPermission::Scripts => "allow-scripts",
            SandboxPermission::SameOrigin => "allow-same-origin",
            SandboxPermission::Modals => "allow-modals",
            SandboxPermission::Forms => "allow-forms",
            SandboxPermission::Popups => "allow-popups",
            SandboxPermission::TopNavigation => "allow-top-navigation",
        }
    }
}

/// Permission set of an execution host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub scripts: bool,
    pub same_origin: bool,
    pub modals: bool,
    pub forms: bool,
    pub popups: bool,
    pub top_navigation: bool,
}

impl SandboxPolicy {
    /// Deny everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts allowed, no same-origin or navigation privileges
    pub fn playground() -> Self {
        Self::new().with_scripts()
    }

    pub fn with_scripts(mut self) -> Self {
        self.scripts = true;
        self
    }

    pub fn has(&self, permission: SandboxPermission) -> bool {
        match permission {
            SandboxPermission::Scripts => self.scripts,
            SandboxPermission::SameOrigin => self.same_origin,
            SandboxPermission::Modals => self.modals,
            SandboxPermission::Forms => self.forms,
            SandboxPermission::Popups => self.popups,
            SandboxPermission::TopNavigation => self.top_navigation,
        }
    }

    /// Granted permissions in a stable order
    pub fn granted(&self) -> Vec<SandboxPermission> {
        [
            SandboxPermission::Scripts,
            SandboxPermission::SameOrigin,
            SandboxPermission::Modals,
            SandboxPermission::Forms,
            SandboxPermission::Popups,
            SandboxPermission::TopNavigation,
        ]
        .into_iter()
        .filter(|p| self.has(*p))
        .collect()
    }

    /// Value for the iframe `sandbox` attribute
    pub fn attribute_value(&self) -> String {
        self.granted()
            .iter()
            .map(|p| p.token())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value for a `Content-Security-Policy` header enforcing the same sandbox
    pub fn csp_header(&self) -> String {
        let tokens = self.attribute_value();
        if tokens.is_empty() {
            "sandbox".to_string()
        } else {
            format!("sandbox {}", tokens)
        }
    }
}

/// Error types for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Sandbox denies {0:?}")]
    PermissionDenied(SandboxPermission),

    #[error("Generation {captured} was superseded by {live}")]
    Superseded {
        captured: Generation,
        live: Generation,
    },

    #[error("No program is loaded")]
    NothingLoaded,

    #[error("Invalid stdin payload: {0}")]
    StdinDecode(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
