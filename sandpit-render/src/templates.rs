use askama::Template;
use serde::Serialize;

/// Loader that decodes the entry script and runs it as an async unit
pub const SCRIPT_RUNNER_SOURCE: &str = include_str!("../assets/runner.js");

/// Self-invoking runner for a base64-encoded entry script
pub fn script_runner(payload: &str) -> String {
    format!("{}(\"{}\");", SCRIPT_RUNNER_SOURCE.trim_end(), payload)
}

/// HTML escape function to prevent XSS
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Serialize state for a `<script type="application/json">` block
///
/// Every `<` is written as `\u003c`, so the payload cannot close its element.
pub fn json_for_script<T: Serialize>(value: &T) -> serde_json::Result<String> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}

/// Shell document for script-only mode
#[derive(Template)]
#[template(path = "script.html")]
pub struct ScriptDocumentTemplate {
    pub title: String,
    pub console_id: String,

    // Pre-rendered scripts, inserted verbatim
    pub instrumentation: String,
    pub runner: String,
}

/// An editor tab
#[derive(Debug, Clone)]
pub struct EditorTab {
    pub name: String,
    pub language: String,
    pub active: bool,
}

/// Editor page template
#[derive(Template)]
#[template(path = "playground.html")]
pub struct PlaygroundTemplate {
    pub title: String,
    pub mode: String,
    pub html_route: String,
    pub js_route: String,
    pub is_markup: bool,

    pub tabs: Vec<EditorTab>,
    pub active_file: String,
    pub active_content: String,
    pub stdin: String,

    /// Editor pane share of the width, in percent
    pub split_percent: String,

    /// Value of the preview frame's `sandbox` attribute
    pub sandbox: String,

    /// Frame to show on load, or `about:blank`
    pub frame_src: String,

    /// Client state, already made safe by [`json_for_script`]
    pub state_json: String,
}

/// Page served for an unknown route or a superseded frame
#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub title: String,
    pub message: String,
}
