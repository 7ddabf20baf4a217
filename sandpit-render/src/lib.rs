//! # sandpit-render
//!
//! Document assembly and page templates for sandpit.
//!
//! This crate turns a source file set into the self-contained document a run
//! executes, and renders the editor page using Askama.

pub mod builder;
pub mod templates;

pub use builder::{escape_script_body, escape_style_body, strip_script_reference, DocumentBuilder};
pub use templates::{
    html_escape, json_for_script, script_runner, EditorTab, NotFoundTemplate, PlaygroundTemplate,
    ScriptDocumentTemplate,
};
