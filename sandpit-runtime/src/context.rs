//! Execution context of one run
//!
//! The context is the only channel between executed content and the output
//! log. It owns the overridden console, the stdin simulator, the task queues
//! and the fault handlers. Every append is checked against the live
//! generation, so a superseded context can never write into a newer run.

use crate::abi::ConsoleLevel;
use crate::console::{OutputLine, OutputLog};
use crate::event_loop::{EventLoop, Task, TimerId};
use crate::format::Formatter;
use crate::promise::{Promise, PromiseState, Reaction, Settlement};
use crate::stdin::StdinSimulator;
use crate::value::{ErrorValue, Value};
use sandpit_types::{Generation, StdinBuffer};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Promise callback: receives the settled value, returns the derived outcome
pub type Handler = Box<dyn FnOnce(Value, &mut ExecutionContext) -> Result<Value, Value>>;

/// Executable content
///
/// A program runs synchronously against the context and schedules any
/// deferred work through it. Returning `Err` is a thrown fault.
pub trait Program {
    fn run(&self, cx: &mut ExecutionContext) -> Result<(), Value>;

    /// Whether the program has no code at all
    fn is_empty(&self) -> bool {
        false
    }
}

impl<F> Program for F
where
    F: Fn(&mut ExecutionContext) -> Result<(), Value>,
{
    fn run(&self, cx: &mut ExecutionContext) -> Result<(), Value> {
        self(cx)
    }
}

/// Generation captured by a context, compared against the live one
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    captured: Generation,
    live: Rc<Cell<Generation>>,
}

impl GenerationGuard {
    pub fn new(captured: Generation, live: Rc<Cell<Generation>>) -> Self {
        Self { captured, live }
    }

    /// A guard that is its own live generation
    pub fn detached(generation: Generation) -> Self {
        Self::new(generation, Rc::new(Cell::new(generation)))
    }

    pub fn captured(&self) -> Generation {
        self.captured
    }

    pub fn live(&self) -> Generation {
        self.live.get()
    }

    pub fn is_current(&self) -> bool {
        self.live.get() == self.captured
    }
}

pub struct ExecutionContext {
    guard: GenerationGuard,
    output: Rc<RefCell<OutputLog>>,
    formatter: Formatter,
    stdin: StdinSimulator,
    event_loop: EventLoop,
    maybe_unhandled: Vec<Promise>,
    instrumented: bool,
}

impl ExecutionContext {
    pub fn new(guard: GenerationGuard, output: Rc<RefCell<OutputLog>>, stdin: StdinSimulator) -> Self {
        Self {
            guard,
            output,
            formatter: Formatter::new(),
            stdin,
            event_loop: EventLoop::new(),
            maybe_unhandled: Vec::new(),
            instrumented: false,
        }
    }

    /// Standalone, already instrumented context with its own output log
    pub fn detached(stdin: &StdinBuffer) -> Self {
        let mut cx = Self::new(
            GenerationGuard::detached(Generation::new(1)),
            Rc::new(RefCell::new(OutputLog::new())),
            StdinSimulator::from_buffer(stdin),
        );
        cx.install_instrumentation();
        cx
    }

    /// Route output primitives into the log; returns false if already installed
    pub fn install_instrumentation(&mut self) -> bool {
        if self.instrumented {
            return false;
        }
        self.instrumented = true;
        tracing::debug!(generation = %self.guard.captured(), "Installed instrumentation");
        true
    }

    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    pub fn generation(&self) -> Generation {
        self.guard.captured()
    }

    pub fn is_current(&self) -> bool {
        self.guard.is_current()
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn now_ms(&self) -> u64 {
        self.event_loop.now_ms()
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

    // Console

    /// Format arguments and append one line at the given level
    pub fn emit(&mut self, level: ConsoleLevel, args: &[Value]) {
        let text = self.formatter.format_args(args);
        self.append(level, text);
        self.attach_observers();
    }

    pub fn log(&mut self, args: &[Value]) {
        self.emit(ConsoleLevel::Log, args);
    }

    pub fn info(&mut self, args: &[Value]) {
        self.emit(ConsoleLevel::Info, args);
    }

    pub fn debug(&mut self, args: &[Value]) {
        self.emit(ConsoleLevel::Debug, args);
    }

    pub fn warn(&mut self, args: &[Value]) {
        self.emit(ConsoleLevel::Warn, args);
    }

    pub fn error(&mut self, args: &[Value]) {
        self.emit(ConsoleLevel::Error, args);
    }

    fn append(&mut self, level: ConsoleLevel, text: String) {
        let generation = self.guard.captured();
        tracing::debug!(target: "sandpit::console", %generation, %level, "{}", text);

        if !self.instrumented {
            return;
        }
        if !self.guard.is_current() {
            tracing::debug!(%generation, live = %self.guard.live(), "Dropping output from stale generation");
            return;
        }
        match self.output.try_borrow_mut() {
            Ok(mut log) => {
                log.push(level, text);
            }
            Err(_) => tracing::warn!("Output log busy, dropping line"),
        }
    }

    /// Attach settlement observers to promises the formatter met for the first time
    fn attach_observers(&mut self) {
        let table = self.formatter.observations();
        let fresh = match table.try_borrow_mut() {
            Ok(mut t) => t.take_unattached(),
            Err(_) => return,
        };
        for promise in fresh {
            let table = Rc::clone(&table);
            let id = promise.id();
            promise.mark_handled();
            self.subscribe(
                &promise,
                Box::new(move |settlement, _cx| {
                    if let Ok(mut t) = table.try_borrow_mut() {
                        t.record(id, settlement);
                    }
                    Ok(())
                }),
            );
        }
    }

    // Input

    /// Answer an interactive prompt from the stdin buffer
    pub fn prompt(&mut self, message: &str, default: Option<&str>) -> String {
        let answer = self.stdin.prompt(default);
        tracing::debug!(target: "sandpit::stdin", prompt = message, answer = %answer, "Answered prompt");
        answer
    }

    // Scheduling

    pub fn set_timeout<F>(&mut self, delay_ms: u64, f: F) -> TimerId
    where
        F: FnOnce(&mut ExecutionContext) -> Result<(), Value> + 'static,
    {
        self.event_loop.schedule(delay_ms, Box::new(f))
    }

    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        self.event_loop.cancel(id)
    }

    pub fn queue_microtask<F>(&mut self, f: F)
    where
        F: FnOnce(&mut ExecutionContext) -> Result<(), Value> + 'static,
    {
        self.event_loop.queue_microtask(Box::new(f));
    }

    // Promises

    pub fn new_promise(&mut self) -> Promise {
        Promise::new()
    }

    pub fn resolved(&mut self, value: Value) -> Promise {
        let p = Promise::new();
        self.settle(&p, Ok(value));
        p
    }

    pub fn rejected(&mut self, reason: Value) -> Promise {
        let p = Promise::new();
        self.settle(&p, Err(reason));
        p
    }

    pub fn resolve(&mut self, promise: &Promise, value: Value) {
        self.settle(promise, Ok(value));
    }

    pub fn reject(&mut self, promise: &Promise, reason: Value) {
        self.settle(promise, Err(reason));
    }

    /// Promise fulfilled with `value` after `delay_ms`
    pub fn delay(&mut self, delay_ms: u64, value: Value) -> Promise {
        let p = Promise::new();
        let target = p.clone();
        self.set_timeout(delay_ms, move |cx| {
            cx.resolve(&target, value);
            Ok(())
        });
        p
    }

    pub fn then<F>(&mut self, promise: &Promise, on_fulfilled: F) -> Promise
    where
        F: FnOnce(Value, &mut ExecutionContext) -> Result<Value, Value> + 'static,
    {
        self.then_with(promise, Some(Box::new(on_fulfilled)), None)
    }

    pub fn catch<F>(&mut self, promise: &Promise, on_rejected: F) -> Promise
    where
        F: FnOnce(Value, &mut ExecutionContext) -> Result<Value, Value> + 'static,
    {
        self.then_with(promise, None, Some(Box::new(on_rejected)))
    }

    /// Chain handlers onto a promise and return the derived promise
    pub fn then_with(
        &mut self,
        promise: &Promise,
        on_fulfilled: Option<Handler>,
        on_rejected: Option<Handler>,
    ) -> Promise {
        let derived = Promise::new();
        let target = derived.clone();
        promise.mark_handled();
        self.subscribe(
            promise,
            Box::new(move |settlement, cx| {
                let next = match settlement {
                    Ok(v) => match on_fulfilled {
                        Some(f) => f(v, cx),
                        None => Ok(v),
                    },
                    Err(r) => match on_rejected {
                        Some(g) => g(r, cx),
                        None => Err(r),
                    },
                };
                cx.settle(&target, next);
                Ok(())
            }),
        );
        derived
    }

    fn subscribe(&mut self, promise: &Promise, reaction: Reaction) {
        if let Some((reaction, settlement)) = promise.add_reaction(reaction) {
            self.event_loop
                .queue_microtask(Box::new(move |cx| reaction(settlement, cx)));
        }
    }

    fn settle(&mut self, promise: &Promise, settlement: Settlement) {
        // A promise resolved with another promise follows it
        if let Ok(Value::Promise(inner)) = &settlement {
            if inner.ptr_eq(promise) {
                let cycle = Value::fault(ErrorValue::new(
                    "TypeError",
                    "Chaining cycle detected for promise",
                ));
                self.settle(promise, Err(cycle));
                return;
            }
            let outer = promise.clone();
            inner.mark_handled();
            self.subscribe(
                &inner.clone(),
                Box::new(move |s, cx| {
                    cx.settle(&outer, s);
                    Ok(())
                }),
            );
            return;
        }

        let rejected = settlement.is_err();
        if let Some(reactions) = promise.settle(settlement.clone()) {
            for reaction in reactions {
                let s = settlement.clone();
                self.event_loop
                    .queue_microtask(Box::new(move |cx| reaction(s, cx)));
            }
            if rejected && !promise.is_handled() {
                self.maybe_unhandled.push(promise.clone());
            }
        }
    }

    // Faults

    /// Diagnostic text for a fault: its stack, else its message and line
    pub fn fault_text(&self, fault: &Value) -> String {
        match fault {
            Value::Error(e) => match (&e.stack, e.location) {
                (Some(stack), _) => stack.clone(),
                (None, Some(loc)) => format!("{} at line {}", e.message, loc.line),
                (None, None) => e.message.clone(),
            },
            other => self.formatter.format(other),
        }
    }

    /// Global fault handler: one error line, and the fault is suppressed
    pub fn report_fault(&mut self, fault: &Value) {
        let text = self.fault_text(fault);
        self.append(ConsoleLevel::Error, text);
        self.attach_observers();
    }

    fn report_unhandled_rejections(&mut self) {
        for promise in std::mem::take(&mut self.maybe_unhandled) {
            if promise.is_handled() || !promise.mark_reported() {
                continue;
            }
            if let PromiseState::Rejected(reason) = promise.state() {
                let text = format!(
                    "Unhandled Promise Rejection: {}",
                    self.formatter.format(&reason)
                );
                self.append(ConsoleLevel::Error, text);
                self.attach_observers();
            }
        }
    }

    // Running

    fn run_task(&mut self, task: Task) {
        if let Err(fault) = task(self) {
            self.report_fault(&fault);
        }
    }

    /// Drain the microtask queue, then report rejections nobody handled
    pub fn checkpoint(&mut self) {
        loop {
            while let Some(task) = self.event_loop.pop_microtask() {
                if !self.guard.is_current() {
                    self.teardown();
                    return;
                }
                self.run_task(task);
            }
            self.report_unhandled_rejections();
            if self.event_loop.pending_microtasks() == 0 {
                break;
            }
        }
    }

    /// Run the synchronous body of a program; a throw reaches the fault handler
    pub fn evaluate(&mut self, program: &dyn Program) {
        if let Err(fault) = program.run(self) {
            self.report_fault(&fault);
        }
        self.checkpoint();
    }

    /// Run a program wrapped in try/catch, logging the caught fault
    pub fn evaluate_guarded(&mut self, program: &dyn Program) {
        if let Err(fault) = program.run(self) {
            self.error(&[fault]);
        }
        self.checkpoint();
    }

    /// Run a program as an async unit; a throw rejects the unit and is logged
    /// with a `Runtime error: ` prefix
    pub fn evaluate_async_unit(&mut self, program: &dyn Program) {
        let unit = Promise::new();
        match program.run(self) {
            Ok(()) => self.resolve(&unit, Value::Undefined),
            Err(fault) => self.reject(&unit, fault),
        }
        self.catch(&unit, |reason, cx| {
            let text = format!("Runtime error: {}", cx.fault_text(&reason));
            cx.error(&[Value::String(text)]);
            Ok(Value::Undefined)
        });
        self.checkpoint();
    }

    /// Run timers due within the next `ms` of virtual time
    pub fn run_for(&mut self, ms: u64) {
        let limit = self.event_loop.now_ms().saturating_add(ms);
        self.drain_timers(limit);
        if self.guard.is_current() {
            self.event_loop.advance_to(limit);
        }
    }

    /// Run until no microtasks or timers remain
    ///
    /// A program that keeps rescheduling itself never goes idle; drive those
    /// with [`run_for`](Self::run_for) instead.
    pub fn run_until_idle(&mut self) {
        self.drain_timers(u64::MAX);
    }

    fn drain_timers(&mut self, limit_ms: u64) {
        self.checkpoint();
        while let Some(task) = self.event_loop.pop_timer_until(limit_ms) {
            if !self.guard.is_current() {
                self.teardown();
                return;
            }
            self.run_task(task);
            self.checkpoint();
        }
    }

    pub fn is_idle(&self) -> bool {
        self.event_loop.is_idle()
    }

    /// Drop all pending work
    pub fn teardown(&mut self) {
        self.event_loop.clear();
        self.maybe_unhandled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx() -> ExecutionContext {
        ExecutionContext::detached(&StdinBuffer::default())
    }

    #[test]
    fn test_timer_runs_after_sync_code() {
        let mut cx = cx();
        cx.evaluate(&|cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.log(&["A".into()]);
            cx.set_timeout(0, |cx| {
                cx.log(&["B".into()]);
                Ok(())
            });
            cx.log(&["C".into()]);
            Ok(())
        });
        cx.run_until_idle();
        assert_eq!(cx.texts(), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_long_timer_chain_runs_to_completion() {
        fn tick(cx: &mut ExecutionContext, n: u32) -> Result<(), Value> {
            if n >= 100_003 {
                cx.log(&[Value::Number(n as f64)]);
            }
            if n < 100_005 {
                cx.set_timeout(0, move |cx| tick(cx, n + 1));
            }
            Ok(())
        }

        let mut cx = cx();
        cx.evaluate(&|cx: &mut ExecutionContext| -> Result<(), Value> { tick(cx, 0) });
        cx.run_until_idle();
        assert_eq!(cx.texts(), vec!["100003", "100004", "100005"]);
        assert!(cx.is_idle());
    }

    #[test]
    fn test_microtasks_before_timers() {
        let mut cx = cx();
        cx.evaluate(&|cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.set_timeout(0, |cx| {
                cx.log(&["timer".into()]);
                Ok(())
            });
            let p = cx.resolved(Value::from("micro"));
            cx.then(&p, |v, cx| {
                cx.log(&[v]);
                Ok(Value::Undefined)
            });
            Ok(())
        });
        cx.run_until_idle();
        assert_eq!(cx.texts(), vec!["micro", "timer"]);
    }

    #[test]
    fn test_clear_timeout_cancels() {
        let mut cx = cx();
        let id = cx.set_timeout(5, |cx| {
            cx.log(&["never".into()]);
            Ok(())
        });
        assert!(cx.clear_timeout(id));
        cx.run_until_idle();
        assert!(cx.texts().is_empty());
    }

    #[test]
    fn test_uncaught_timer_fault_reports_once() {
        let mut cx = cx();
        cx.set_timeout(0, |_| Err(Value::fault(ErrorValue::new("Error", "boom").at(3, 1))));
        cx.run_until_idle();

        let lines = cx.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, ConsoleLevel::Error);
        assert_eq!(lines[0].text, "boom at line 3");
    }

    #[test]
    fn test_unhandled_rejection_reported() {
        let mut cx = cx();
        cx.evaluate(&|cx: &mut ExecutionContext| -> Result<(), Value> {
            cx.rejected(Value::error("nope"));
            Ok(())
        });
        assert_eq!(cx.texts(), vec!["Unhandled Promise Rejection: nope"]);
    }

    #[test]
    fn test_handled_rejection_not_reported() {
        let mut cx = cx();
        cx.evaluate(&|cx: &mut ExecutionContext| -> Result<(), Value> {
            let p = cx.rejected(Value::from("nope"));
            cx.catch(&p, |r, cx| {
                cx.warn(&["caught".into(), r]);
                Ok(Value::Undefined)
            });
            Ok(())
        });
        assert_eq!(cx.texts(), vec!["caught nope"]);
    }

    #[test]
    fn test_async_unit_prefixes_runtime_error() {
        let mut cx = cx();
        cx.evaluate_async_unit(&|_: &mut ExecutionContext| -> Result<(), Value> {
            Err(Value::error("bad input"))
        });
        assert_eq!(cx.texts(), vec!["Runtime error: bad input"]);
    }

    #[test]
    fn test_guarded_logs_fault() {
        let mut cx = cx();
        cx.evaluate_guarded(&|_: &mut ExecutionContext| -> Result<(), Value> {
            Err(Value::error("oops"))
        });
        let lines = cx.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, ConsoleLevel::Error);
        assert_eq!(lines[0].text, "oops");
    }

    #[test]
    fn test_promise_adopts_inner_promise() {
        let mut cx = cx();
        let inner = cx.delay(10, Value::from(7));
        let outer = cx.resolved(Value::Promise(inner));
        cx.then(&outer, |v, cx| {
            cx.log(&["got".into(), v]);
            Ok(Value::Undefined)
        });
        cx.run_until_idle();
        assert_eq!(cx.texts(), vec!["got 7"]);
        assert_eq!(cx.now_ms(), 10);
    }

    #[test]
    fn test_stale_generation_writes_nothing() {
        let live = Rc::new(Cell::new(Generation::new(1)));
        let log = Rc::new(RefCell::new(OutputLog::new()));
        let mut cx = ExecutionContext::new(
            GenerationGuard::new(Generation::new(1), Rc::clone(&live)),
            Rc::clone(&log),
            StdinSimulator::new(),
        );
        cx.install_instrumentation();
        cx.set_timeout(0, |cx| {
            cx.log(&["late".into()]);
            Ok(())
        });

        live.set(Generation::new(2));
        cx.run_until_idle();
        assert!(log.borrow().is_empty());
        assert!(cx.is_idle());
    }

    #[test]
    fn test_instrumentation_is_idempotent() {
        let mut cx = cx();
        assert!(!cx.install_instrumentation());
        cx.log(&["once".into()]);
        assert_eq!(cx.texts(), vec!["once"]);
    }
}
