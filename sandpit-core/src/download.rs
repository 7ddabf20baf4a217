//! Download surface: the file a user takes away from a session.

use sandpit_render::DocumentBuilder;
use sandpit_types::{files, ExecutionMode, SourceFileSet, StdinBuffer};
use serde::Serialize;

/// A file ready to be saved by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    pub filename: String,
    pub content_type: String,
    pub body: String,
}

impl Download {
    /// Script mode exports the entry script as-is; markup mode exports the
    /// assembled document
    pub fn for_mode(
        builder: &DocumentBuilder,
        mode: ExecutionMode,
        files: &SourceFileSet,
        stdin: &StdinBuffer,
    ) -> Self {
        match mode {
            ExecutionMode::Script => Self {
                filename: files::ENTRY.to_string(),
                content_type: "text/javascript".to_string(),
                body: files.text(files::ENTRY).to_string(),
            },
            ExecutionMode::Markup => Self {
                filename: files::MARKUP.to_string(),
                content_type: "text/html".to_string(),
                body: builder.build(mode, files, stdin).text,
            },
        }
    }

    /// `Content-Disposition` value for serving this file
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename.replace('"', ""))
    }
}
