//! Promises and the out-of-band observation table
//!
//! A promise's state is private to the event loop. The formatter learns about
//! settlement only through observers it attaches the first time it meets a
//! promise; the observers record the outcome in [`PromiseObservations`].

use crate::context::ExecutionContext;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a promise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(pub u64);

/// Outcome delivered to reactions
pub type Settlement = Result<Value, Value>;

/// Callback run as a microtask once the promise settles
pub(crate) type Reaction = Box<dyn FnOnce(Settlement, &mut ExecutionContext) -> Result<(), Value>>;

#[derive(Clone)]
pub(crate) enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

struct PromiseInner {
    id: PromiseId,
    state: RefCell<PromiseState>,
    reactions: RefCell<Vec<Reaction>>,
    handled: Cell<bool>,
    reported: Cell<bool>,
}

/// A deferred value
#[derive(Clone)]
pub struct Promise(Rc<PromiseInner>);

impl Promise {
    pub(crate) fn new() -> Self {
        Promise(Rc::new(PromiseInner {
            id: PromiseId(NEXT_PROMISE_ID.fetch_add(1, Ordering::SeqCst)),
            state: RefCell::new(PromiseState::Pending),
            reactions: RefCell::new(Vec::new()),
            handled: Cell::new(false),
            reported: Cell::new(false),
        }))
    }

    pub fn id(&self) -> PromiseId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakPromise {
        WeakPromise(Rc::downgrade(&self.0))
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn state(&self) -> PromiseState {
        self.0.state.borrow().clone()
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(*self.0.state.borrow(), PromiseState::Pending)
    }

    pub(crate) fn is_handled(&self) -> bool {
        self.0.handled.get()
    }

    pub(crate) fn mark_handled(&self) {
        self.0.handled.set(true);
    }

    /// Flag the rejection as reported; returns false if it already was
    pub(crate) fn mark_reported(&self) -> bool {
        !self.0.reported.replace(true)
    }

    /// Move to a final state and hand back the queued reactions.
    ///
    /// Returns `None` when the promise has already settled.
    pub(crate) fn settle(&self, settlement: Settlement) -> Option<Vec<Reaction>> {
        {
            let mut state = self.0.state.borrow_mut();
            if !matches!(*state, PromiseState::Pending) {
                return None;
            }
            *state = match settlement {
                Ok(v) => PromiseState::Fulfilled(v),
                Err(r) => PromiseState::Rejected(r),
            };
        }
        Some(std::mem::take(&mut *self.0.reactions.borrow_mut()))
    }

    /// Queue a reaction while pending, or return it with the settlement to run now
    pub(crate) fn add_reaction(&self, reaction: Reaction) -> Option<(Reaction, Settlement)> {
        match self.state() {
            PromiseState::Pending => {
                self.0.reactions.borrow_mut().push(reaction);
                None
            }
            PromiseState::Fulfilled(v) => Some((reaction, Ok(v))),
            PromiseState::Rejected(r) => Some((reaction, Err(r))),
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise(#{})", self.0.id.0)
    }
}

/// Non-owning handle that does not keep a promise alive
#[derive(Clone)]
pub struct WeakPromise(Weak<PromiseInner>);

impl WeakPromise {
    pub fn upgrade(&self) -> Option<Promise> {
        self.0.upgrade().map(Promise)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// What the formatter knows about a promise
#[derive(Clone)]
pub enum Observed {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

impl Observed {
    pub fn is_pending(&self) -> bool {
        matches!(self, Observed::Pending)
    }
}

struct ObservationRecord {
    promise: WeakPromise,
    observed: Observed,
}

/// Side table of observed promise states, keyed weakly by promise identity
///
/// Records move from pending to settled at most once and never back.
#[derive(Default)]
pub struct PromiseObservations {
    records: HashMap<PromiseId, ObservationRecord>,
    unattached: Vec<Promise>,
}

impl PromiseObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded state of a promise, if it has been seen before
    pub fn lookup(&self, promise: &Promise) -> Option<Observed> {
        self.records
            .get(&promise.id())
            .filter(|record| record.promise.is_alive())
            .map(|record| record.observed.clone())
    }

    /// Start tracking a promise; its observer still needs attaching
    pub fn register(&mut self, promise: &Promise) -> Observed {
        if let Some(observed) = self.lookup(promise) {
            return observed;
        }
        self.prune();
        self.records.insert(
            promise.id(),
            ObservationRecord {
                promise: promise.downgrade(),
                observed: Observed::Pending,
            },
        );
        self.unattached.push(promise.clone());
        Observed::Pending
    }

    /// Record a settlement; later settlements of the same promise are ignored
    pub fn record(&mut self, id: PromiseId, settlement: Settlement) {
        if let Some(record) = self.records.get_mut(&id) {
            if record.observed.is_pending() {
                record.observed = match settlement {
                    Ok(v) => Observed::Fulfilled(v),
                    Err(r) => Observed::Rejected(r),
                };
            }
        }
    }

    pub(crate) fn take_unattached(&mut self) -> Vec<Promise> {
        std::mem::take(&mut self.unattached)
    }

    /// Drop records whose promise no longer exists
    pub fn prune(&mut self) {
        self.records.retain(|_, record| record.promise.is_alive());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
