//! Execution context for calls into generated code
//!
//! One `ExecutionContext` stands in for the runtime state a test calls into.
//! Every call helper built against it borrows it; the context counts calls
//! and tracks how deeply generated code is currently nested on this thread.
//! It is `!Sync`; nothing here locks.

use std::cell::Cell;
use std::marker::PhantomData;

use log::trace;

use crate::code::Address;

/// Runtime context shared by all call helpers of one test
#[derive(Debug)]
pub struct ExecutionContext {
    name: String,
    depth: Cell<u32>,
    invocations: Cell<u64>,
    // Single-threaded: keep the context off other threads
    _not_sync: PhantomData<*const ()>,
}

impl ExecutionContext {
    /// Create a new context
    pub fn new(name: impl Into<String>) -> Self {
        ExecutionContext {
            name: name.into(),
            depth: Cell::new(0),
            invocations: Cell::new(0),
            _not_sync: PhantomData,
        }
    }

    /// Context name (for diagnostics)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of calls into generated code currently on the stack
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Total number of calls made through this context
    pub fn invocations(&self) -> u64 {
        self.invocations.get()
    }

    /// Enter generated code at `entry`. The returned scope leaves it on drop.
    pub fn enter(&self, entry: Address) -> CallScope<'_> {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        self.invocations.set(self.invocations.get() + 1);
        trace!("[{}] enter {} (depth {})", self.name, entry, depth);
        CallScope { context: self, entry }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::new("default")
    }
}

/// An active call into generated code
#[derive(Debug)]
pub struct CallScope<'a> {
    context: &'a ExecutionContext,
    entry: Address,
}

impl CallScope<'_> {
    /// Entry address being executed
    pub fn entry(&self) -> Address {
        self.entry
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        let depth = self.context.depth.get() - 1;
        self.context.depth.set(depth);
        trace!("[{}] leave {} (depth {})", self.context.name, self.entry, depth);
    }
}
