//! Native execution host
//!
//! Runs [`Program`]s against an instrumented [`ExecutionContext`] with the
//! same ordering and fault semantics as the sandboxed frame. Loading a new
//! program discards the previous context and clears the output log before
//! anything of the new generation runs.

use crate::abi::{RuntimeError, RuntimeResult, SandboxPermission, SandboxPolicy};
use crate::console::{OutputLine, OutputLog};
use crate::context::{ExecutionContext, GenerationGuard, Program};
use crate::stdin::StdinSimulator;
use sandpit_types::{ExecutionMode, Generation, StdinBuffer};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct NativeHost {
    policy: SandboxPolicy,
    live: Rc<Cell<Generation>>,
    output: Rc<RefCell<OutputLog>>,
    current: Option<ExecutionContext>,
}

impl NativeHost {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            live: Rc::new(Cell::new(Generation::new(0))),
            output: Rc::new(RefCell::new(OutputLog::new())),
            current: None,
        }
    }

    /// Host with the playground policy (scripts only)
    pub fn with_default_policy() -> Self {
        Self::new(SandboxPolicy::playground())
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    fn check_permission(&self, permission: SandboxPermission) -> RuntimeResult<()> {
        if self.policy.has(permission) {
            Ok(())
        } else {
            Err(RuntimeError::PermissionDenied(permission))
        }
    }

    /// Replace whatever is running with `program` and run its synchronous part
    pub fn load(
        &mut self,
        mode: ExecutionMode,
        program: &dyn Program,
        stdin: &StdinBuffer,
    ) -> RuntimeResult<Generation> {
        self.check_permission(SandboxPermission::Scripts)?;

        let generation = self.live.get().next();
        if let Some(mut previous) = self.current.take() {
            previous.teardown();
        }
        self.live.set(generation);
        if let Ok(mut log) = self.output.try_borrow_mut() {
            log.clear();
        }

        let mut cx = ExecutionContext::new(
            GenerationGuard::new(generation, Rc::clone(&self.live)),
            Rc::clone(&self.output),
            StdinSimulator::from_buffer(stdin),
        );
        cx.install_instrumentation();
        tracing::info!(%generation, %mode, "Loading program");

        match mode {
            ExecutionMode::Script if program.is_empty() => {
                cx.log(&["(empty code)".into()]);
                cx.checkpoint();
            }
            ExecutionMode::Script => cx.evaluate_async_unit(program),
            ExecutionMode::Markup => cx.evaluate_guarded(program),
        }

        self.current = Some(cx);
        Ok(generation)
    }

    /// Advance virtual time by `ms`, running due timers
    pub fn advance(&mut self, ms: u64) -> RuntimeResult<()> {
        self.current_mut()?.run_for(ms);
        Ok(())
    }

    /// Run all remaining work of the current generation
    pub fn run_until_idle(&mut self) -> RuntimeResult<()> {
        self.current_mut()?.run_until_idle();
        Ok(())
    }

    fn current_mut(&mut self) -> RuntimeResult<&mut ExecutionContext> {
        self.current.as_mut().ok_or(RuntimeError::NothingLoaded)
    }

    /// Context of `generation`, if it is still the live one
    pub fn context_for(&mut self, generation: Generation) -> RuntimeResult<&mut ExecutionContext> {
        let live = self.live.get();
        if generation != live {
            return Err(RuntimeError::Superseded {
                captured: generation,
                live,
            });
        }
        self.current_mut()
    }

    pub fn generation(&self) -> Option<Generation> {
        self.current.as_ref().map(|cx| cx.generation())
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.output
            .try_borrow()
            .map(|log| log.lines().to_vec())
            .unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.text).collect()
    }
}

impl Default for NativeHost {
    fn default() -> Self {
        Self::with_default_policy()
    }
}
