//! Execution host seam.
//!
//! The lifecycle hands every assembled document to an [`ExecutionHost`].
//! Replacing the hosted content is the only way a run is cancelled.

use sandpit_runtime::{RuntimeError, RuntimeResult, SandboxPermission, SandboxPolicy};
use sandpit_types::{ExecutableDocument, Generation};

/// Disposable, privilege-restricted context receiving built documents
pub trait ExecutionHost {
    fn policy(&self) -> &SandboxPolicy;

    /// Discard whatever is hosted and host `document` as `generation`
    fn replace(&mut self, generation: Generation, document: ExecutableDocument) -> RuntimeResult<()>;

    fn current_generation(&self) -> Option<Generation>;
}

/// Document currently hosted by a [`FrameHost`]
#[derive(Debug, Clone)]
pub struct HostedFrame {
    pub generation: Generation,
    pub document: ExecutableDocument,
}

/// Result of looking up a frame by generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLookup<'a> {
    Current(&'a ExecutableDocument),
    /// The requested generation was replaced by a newer one
    Superseded { live: Generation },
    /// Nothing has been hosted yet, or the generation is from the future
    Empty,
}

/// Host that keeps only the latest document, for serving into a sandboxed frame
#[derive(Debug, Clone)]
pub struct FrameHost {
    policy: SandboxPolicy,
    current: Option<HostedFrame>,
}

impl Default for FrameHost {
    fn default() -> Self {
        Self::new(SandboxPolicy::playground())
    }
}

impl FrameHost {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&HostedFrame> {
        self.current.as_ref()
    }

    pub fn frame(&self, generation: Generation) -> FrameLookup<'_> {
        match &self.current {
            Some(frame) if frame.generation == generation => FrameLookup::Current(&frame.document),
            Some(frame) if generation < frame.generation => FrameLookup::Superseded {
                live: frame.generation,
            },
            _ => FrameLookup::Empty,
        }
    }
}

impl ExecutionHost for FrameHost {
    fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    fn replace(&mut self, generation: Generation, document: ExecutableDocument) -> RuntimeResult<()> {
        if !self.policy.has(SandboxPermission::Scripts) {
            return Err(RuntimeError::PermissionDenied(SandboxPermission::Scripts));
        }
        if let Some(previous) = self.current.take() {
            tracing::debug!(
                previous = %previous.generation,
                next = %generation,
                "Discarding hosted frame"
            );
        }
        self.current = Some(HostedFrame {
            generation,
            document,
        });
        Ok(())
    }

    fn current_generation(&self) -> Option<Generation> {
        self.current.as_ref().map(|frame| frame.generation)
    }
}
