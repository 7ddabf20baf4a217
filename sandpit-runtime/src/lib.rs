//! Sandpit Runtime - instrumentation and execution of user programs
//!
//! This crate provides everything that happens inside a run. It includes:
//!
//! - **Instrumentation**: The script injected ahead of user code in every
//!   document, overriding the console, `prompt` and the global fault handlers
//! - **Value formatting**: Human-readable rendering of arbitrary values,
//!   including cyclic structures and promises observed out of band
//! - **Output log**: Ordered console lines for the current generation
//! - **Stdin simulation**: Pre-recorded answers consumed by `prompt`
//! - **Native host**: A cooperative event loop that runs programs with the
//!   same ordering and fault semantics as the sandboxed frame
//!
//! ## Generations
//!
//! Every load issues a new [`Generation`](sandpit_types::Generation). A context
//! only writes output while its captured generation is the live one, so
//! timers or promises left behind by a superseded run never show up in the
//! next run's log.
//!
//! ## Example
//!
//! ```rust
//! use sandpit_runtime::{ExecutionContext, NativeHost, Value};
//! use sandpit_types::{ExecutionMode, StdinBuffer};
//!
//! let mut host = NativeHost::with_default_policy();
//! let program = |cx: &mut ExecutionContext| -> Result<(), Value> {
//!     let name = cx.prompt("Name?", None);
//!     cx.log(&["hello".into(), name.into()]);
//!     Ok(())
//! };
//!
//! host.load(ExecutionMode::Script, &program, &StdinBuffer::new("Ada")).unwrap();
//! host.run_until_idle().unwrap();
//! assert_eq!(host.texts(), vec!["hello Ada"]);
//! ```

pub mod abi;
pub mod console;
pub mod context;
pub mod event_loop;
pub mod format;
pub mod host;
pub mod promise;
pub mod stdin;
pub mod template;
pub mod value;

#[cfg(test)]
mod tests;

// Re-export main types
pub use abi::{ConsoleLevel, Location, RuntimeError, RuntimeResult, SandboxPermission, SandboxPolicy};

pub use console::{OutputLine, OutputLog};

pub use context::{ExecutionContext, GenerationGuard, Handler, Program};

pub use event_loop::{EventLoop, Task, TimerId};

pub use format::{format_number, format_value, Formatter};

pub use host::NativeHost;

pub use promise::{Observed, Promise, PromiseId, PromiseObservations, Settlement};

pub use stdin::{decode_payload, encode_payload, StdinSimulator};

pub use template::{InstrumentationTemplate, CONSOLE_ELEMENT_ID, INSTRUMENTATION_SOURCE};

pub use value::{ErrorValue, HostObject, TypedArrayKind, Value};
