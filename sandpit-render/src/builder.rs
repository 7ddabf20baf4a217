//! Executable document assembly
//!
//! Turns the source file set, the execution mode and the stdin buffer into a
//! single self-contained document. Instrumentation always comes first so user
//! code never sees the original console or fault handlers.

use crate::templates::{html_escape, script_runner, ScriptDocumentTemplate};
use askama::Template;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use sandpit_runtime::InstrumentationTemplate;
use sandpit_types::{files, ExecutableDocument, ExecutionMode, SourceFileSet, StdinBuffer};

/// External reference to the script file, which gets inlined instead
static SCRIPT_REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<script\b[^>]*?\ssrc\s*=\s*["']?(?:\./)?script\.js(?:[?#][^"'\s>]*)?["']?(?:\s[^>]*)?/?>(?:\s*</script\s*>)?"#,
    )
    .expect("valid script reference regex")
});

static HEAD_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid head regex"));

static HEAD_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</head\s*>").expect("valid head close regex"));

static HTML_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<html(?:\s[^>]*)?>").expect("valid html regex"));

static DOCTYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*<!doctype[^>]*>").expect("valid doctype regex"));

/// First element that can carry script text; head markers past it are not markup
static CONTENT_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(?:body|script)\b").expect("valid content start regex"));

static BODY_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<body\b").expect("valid body open regex"));

static BODY_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</body\s*>").expect("valid body close regex"));

static SCRIPT_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(script)").expect("valid script close regex"));

static STYLE_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(style)").expect("valid style close regex"));

/// Keep inlined script text from terminating its element early
pub fn escape_script_body(source: &str) -> String {
    let closed = SCRIPT_CLOSE_RE.replace_all(source, r"<\/$1");
    closed.replace("<!--", r"<\!--")
}

/// Keep inlined style text from terminating its element early
pub fn escape_style_body(source: &str) -> String {
    STYLE_CLOSE_RE.replace_all(source, r"<\/$1").into_owned()
}

/// Remove external references to `script.js` from markup
pub fn strip_script_reference(markup: &str) -> String {
    SCRIPT_REFERENCE_RE.replace_all(markup, "").into_owned()
}

const SCRIPT_DOCUMENT_TITLE: &str = "Sandpit";

/// Assembles executable documents
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    instrumentation: InstrumentationTemplate,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            instrumentation: InstrumentationTemplate::new(),
        }
    }

    /// Build the document for `mode`; never fails
    pub fn build(
        &self,
        mode: ExecutionMode,
        files: &SourceFileSet,
        stdin: &StdinBuffer,
    ) -> ExecutableDocument {
        let text = match mode {
            ExecutionMode::Markup => self.build_markup(files, stdin),
            ExecutionMode::Script => self.build_script(files, stdin),
        };
        tracing::debug!(%mode, bytes = text.len(), "Built document");
        ExecutableDocument::new(mode, text)
    }

    /// Markup with the style inlined in its head and the script before its closing body
    pub fn build_markup(&self, files: &SourceFileSet, stdin: &StdinBuffer) -> String {
        let doc = strip_script_reference(files.text(files::MARKUP));
        let instrumentation = self.instrumentation.script_element(stdin);
        let style = format!(
            "<style>\n{}\n</style>\n",
            escape_style_body(files.text(files::STYLE))
        );
        let script = format!(
            "<script>\ntry {{\n{}\n}} catch (e) {{\n  console.error(e);\n}}\n</script>\n",
            escape_script_body(files.text(files::SCRIPT))
        );

        let content_start = CONTENT_START_RE
            .find(&doc)
            .map(|m| m.start())
            .unwrap_or(doc.len());
        let prologue = &doc[..content_start];
        let preamble_at = HEAD_OPEN_RE
            .find(prologue)
            .or_else(|| HTML_OPEN_RE.find(prologue))
            .or_else(|| DOCTYPE_RE.find(prologue))
            .map(|m| m.end())
            .unwrap_or(0);
        let body_open = BODY_OPEN_RE
            .find_at(&doc, preamble_at)
            .map(|m| m.start())
            .unwrap_or(doc.len());
        let head_close = HEAD_CLOSE_RE
            .find_at(&doc, preamble_at)
            .map(|m| m.start())
            .filter(|at| *at < body_open);
        let body_close = BODY_CLOSE_RE
            .find_iter(&doc)
            .last()
            .map(|m| m.start())
            .filter(|at| *at >= head_close.unwrap_or(preamble_at));

        let mut insertions: Vec<(usize, String)> = Vec::with_capacity(3);
        match head_close {
            Some(at) => {
                insertions.push((preamble_at, instrumentation));
                insertions.push((at, style));
            }
            None => insertions.push((preamble_at, format!("{}{}", instrumentation, style))),
        }
        insertions.push((body_close.unwrap_or(doc.len()), script));

        splice(&doc, &insertions)
    }

    /// Shell document that runs `main.js` as an async unit
    pub fn build_script(&self, files: &SourceFileSet, stdin: &StdinBuffer) -> String {
        let payload = STANDARD.encode(files.text(files::ENTRY).as_bytes());
        let template = ScriptDocumentTemplate {
            title: SCRIPT_DOCUMENT_TITLE.to_string(),
            console_id: sandpit_runtime::CONSOLE_ELEMENT_ID.to_string(),
            instrumentation: self.instrumentation.render(stdin),
            runner: script_runner(&payload),
        };
        match template.render() {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Script document template failed, using plain shell: {}", e);
                format!(
                    "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<script>\n{}\n</script>\n</head>\n<body>\n<div id=\"{}\"></div>\n<script>\n{}\n</script>\n</body>\n</html>\n",
                    html_escape(&template.title),
                    template.instrumentation,
                    template.console_id,
                    template.runner,
                )
            }
        }
    }
}

/// Insert text at byte offsets; insertions must be sorted by offset
fn splice(doc: &str, insertions: &[(usize, String)]) -> String {
    let extra: usize = insertions.iter().map(|(_, s)| s.len()).sum();
    let mut out = String::with_capacity(doc.len() + extra);
    let mut cursor = 0;
    for (at, text) in insertions {
        let at = (*at).clamp(cursor, doc.len());
        out.push_str(&doc[cursor..at]);
        out.push_str(text);
        cursor = at;
    }
    out.push_str(&doc[cursor..]);
    out
}
