//! Shared types for sandpit
//!
//! This crate provides the data model shared across the sandpit workspace:
//! execution modes, the well-known source filenames, the source file set,
//! the stdin buffer, run generations and assembled documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known logical filenames
pub mod files {
    /// Markup file in markup-hosted mode
    pub const MARKUP: &str = "index.html";
    /// Style file inlined into the markup head
    pub const STYLE: &str = "styles.css";
    /// Script file appended before the closing body
    pub const SCRIPT: &str = "script.js";
    /// Entry script in script-only mode
    pub const ENTRY: &str = "main.js";
}

const DEFAULT_MARKUP: &str = "<!doctype html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n  <title>Preview</title>\n  <link rel=\"stylesheet\" href=\"styles.css\">\n</head>\n<body>\n  <div id=\"app\">Hello from index.html</div>\n  <script src=\"script.js\"></script>\n</body>\n</html>";

const DEFAULT_STYLE: &str = "/* styles.css */\nbody{font-family:Inter,system-ui;margin:20px;color:#111}#app{padding:12px;border:1px solid #eee;border-radius:8px}";

const DEFAULT_SCRIPT: &str = "// script.js\nconsole.log('hello from script.js')";

const DEFAULT_ENTRY: &str = "// main.js (single-file JS mode)\nconsole.log('hello from main.js')";

/// Run generation identifier
///
/// Every run request issues a new generation. Only the current generation may
/// produce visible output; anything captured by an older one is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The generation following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for Generation {
    fn from(id: u64) -> Self {
        Generation(id)
    }
}

impl From<Generation> for u64 {
    fn from(id: Generation) -> Self {
        id.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which document template a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Markup + style + script triad
    #[default]
    #[serde(rename = "html")]
    Markup,
    /// A single entry script
    #[serde(rename = "js")]
    Script,
}

impl ExecutionMode {
    /// Filenames read by this mode, in editor tab order
    pub fn files(&self) -> &'static [&'static str] {
        match self {
            ExecutionMode::Markup => &[files::MARKUP, files::STYLE, files::SCRIPT],
            ExecutionMode::Script => &[files::ENTRY],
        }
    }

    /// File selected when switching into this mode
    pub fn active_file(&self) -> &'static str {
        match self {
            ExecutionMode::Markup => files::MARKUP,
            ExecutionMode::Script => files::ENTRY,
        }
    }

    /// Navigation route for this mode
    pub fn route(&self) -> &'static str {
        match self {
            ExecutionMode::Markup => "/html",
            ExecutionMode::Script => "/javascript",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Markup => "html",
            ExecutionMode::Script => "js",
        }
    }

    /// Parse a mode from its short name or route segment
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "html" | "markup" => Some(ExecutionMode::Markup),
            "js" | "javascript" | "script" => Some(ExecutionMode::Script),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editor language for a filename, derived from its extension
pub fn language_for(name: &str) -> &'static str {
    match name.rsplit('.').next().unwrap_or("") {
        "html" => "html",
        "css" => "css",
        _ => "javascript",
    }
}

/// Mapping of logical filenames to their text content
///
/// Entries are only ever overwritten, never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFileSet {
    files: BTreeMap<String, String>,
}

impl SourceFileSet {
    /// An empty set with no files at all
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    /// The built-in starter files for both modes
    pub fn with_defaults() -> Self {
        let mut set = Self::empty();
        set.set(files::MARKUP, DEFAULT_MARKUP);
        set.set(files::STYLE, DEFAULT_STYLE);
        set.set(files::SCRIPT, DEFAULT_SCRIPT);
        set.set(files::ENTRY, DEFAULT_ENTRY);
        set
    }

    /// Defaults with previously saved entries layered on top
    pub fn merged_over_defaults(saved: BTreeMap<String, String>) -> Self {
        let mut set = Self::with_defaults();
        set.files.extend(saved);
        set
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Content of a file, or the empty string when it is missing
    pub fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn set(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.files
    }
}

impl Default for SourceFileSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Pre-recorded answers for simulated interactive input
///
/// Stored as one newline-delimited string and consumed line by line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StdinBuffer {
    raw: String,
}

impl StdinBuffer {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Discrete lines in consumption order
    pub fn lines(&self) -> Vec<String> {
        self.raw.lines().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn replace(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
    }

    pub fn reset(&mut self) {
        self.raw.clear();
    }
}

/// What caused a run request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// Run button
    Manual,
    /// Ctrl/Cmd + Enter
    Shortcut,
    /// One-shot run after mount for externally supplied starter code
    AutoRun,
}

/// A fully assembled, self-contained document for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableDocument {
    pub mode: ExecutionMode,
    pub text: String,
}

impl ExecutableDocument {
    pub fn new(mode: ExecutionMode, text: String) -> Self {
        Self { mode, text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_both_modes() {
        let set = SourceFileSet::with_defaults();
        for mode in [ExecutionMode::Markup, ExecutionMode::Script] {
            for name in mode.files() {
                assert!(set.contains(name), "missing {}", name);
            }
        }
    }

    #[test]
    fn test_saved_entries_override_defaults() {
        let mut saved = BTreeMap::new();
        saved.insert(files::ENTRY.to_string(), "console.log(1)".to_string());

        let set = SourceFileSet::merged_over_defaults(saved);
        assert_eq!(set.text(files::ENTRY), "console.log(1)");
        assert!(set.text(files::MARKUP).contains("Hello from index.html"));
    }

    #[test]
    fn test_mode_routes_and_active_files() {
        assert_eq!(ExecutionMode::Markup.route(), "/html");
        assert_eq!(ExecutionMode::Script.route(), "/javascript");
        assert_eq!(ExecutionMode::Script.active_file(), "main.js");
        assert_eq!(ExecutionMode::parse("JavaScript"), Some(ExecutionMode::Script));
        assert_eq!(ExecutionMode::parse("python"), None);
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&ExecutionMode::Script).unwrap();
        assert_eq!(json, "\"js\"");
        let mode: ExecutionMode = serde_json::from_str("\"html\"").unwrap();
        assert_eq!(mode, ExecutionMode::Markup);
    }

    #[test]
    fn test_stdin_lines() {
        let stdin = StdinBuffer::new("Chandan\r\n26\n");
        assert_eq!(stdin.lines(), vec!["Chandan", "26"]);
        assert!(StdinBuffer::default().lines().is_empty());
        assert_eq!(StdinBuffer::new("a\n\nb").lines(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_language_for() {
        assert_eq!(language_for("index.html"), "html");
        assert_eq!(language_for("styles.css"), "css");
        assert_eq!(language_for("main.js"), "javascript");
    }

    #[test]
    fn test_generation_ordering() {
        let g = Generation::new(1);
        assert!(g.next() > g);
        assert_eq!(u64::from(g.next()), 2);
    }
}
