//! On-disk workspace: the well-known source files plus `stdin.txt`.

use sandpit_types::{files, SourceFileSet, StdinBuffer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File holding the stdin buffer next to the sources
pub const STDIN_FILENAME: &str = "stdin.txt";

/// Every filename a workspace may hold
pub const WORKSPACE_FILES: [&str; 4] = [files::MARKUP, files::STYLE, files::SCRIPT, files::ENTRY];

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// A directory of source files
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Files on disk layered over the defaults
    pub fn load_files(&self) -> WorkspaceResult<SourceFileSet> {
        let mut set = SourceFileSet::with_defaults();
        for name in WORKSPACE_FILES {
            if let Some(content) = self.read_optional(name)? {
                set.set(name, content);
            }
        }
        Ok(set)
    }

    /// `stdin.txt`, or an empty buffer when absent
    pub fn load_stdin(&self) -> WorkspaceResult<StdinBuffer> {
        Ok(StdinBuffer::new(
            self.read_optional(STDIN_FILENAME)?.unwrap_or_default(),
        ))
    }

    /// Write the files of `set` that belong in a workspace
    pub fn write_files(&self, set: &SourceFileSet) -> WorkspaceResult<Vec<PathBuf>> {
        self.ensure_root()?;
        let mut written = Vec::new();
        for name in WORKSPACE_FILES {
            if let Some(content) = set.get(name) {
                written.push(self.write(name, content)?);
            }
        }
        Ok(written)
    }

    /// Write starter files, leaving existing ones untouched
    pub fn init_defaults(&self) -> WorkspaceResult<Vec<PathBuf>> {
        self.ensure_root()?;
        let defaults = SourceFileSet::with_defaults();
        let mut written = Vec::new();
        for name in WORKSPACE_FILES {
            let path = self.path_of(name);
            if path.exists() {
                tracing::debug!("Keeping existing {:?}", path);
                continue;
            }
            written.push(self.write(name, defaults.text(name))?);
        }
        if !self.path_of(STDIN_FILENAME).exists() {
            written.push(self.write(STDIN_FILENAME, "")?);
        }
        Ok(written)
    }

    fn ensure_root(&self) -> WorkspaceResult<()> {
        fs::create_dir_all(&self.root).map_err(|source| WorkspaceError::Io {
            path: self.root.clone(),
            source,
        })
    }

    fn read_optional(&self, name: &str) -> WorkspaceResult<Option<String>> {
        let path = self.path_of(name);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WorkspaceError::Io { path, source }),
        }
    }

    fn write(&self, name: &str, content: &str) -> WorkspaceResult<PathBuf> {
        let path = self.path_of(name);
        fs::write(&path, content).map_err(|source| WorkspaceError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
