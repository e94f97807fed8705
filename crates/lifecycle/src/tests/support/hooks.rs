//! Scriptable managed component used to observe and steer hook execution.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::{HookError, LifecycleHooks, Operation};

/// Hook call captured by [`ScriptedHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCall {
    /// Operation whose hook ran.
    pub operation: Operation,
    /// Name of the thread the hook ran on.
    pub thread: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<HookCall>,
    failures: HashSet<Operation>,
    panics: HashSet<Operation>,
    blocked: HashSet<Operation>,
}

/// Managed component whose hooks can be told to fail, panic or block.
#[derive(Debug, Default)]
pub struct ScriptedHooks {
    script: Mutex<Script>,
    changed: Condvar,
}

impl ScriptedHooks {
    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script mutex poisoned")
    }

    /// Makes the hook for `operation` return an error.
    pub fn fail_on(&self, operation: Operation) {
        self.script().failures.insert(operation);
    }

    /// Makes the hook for `operation` panic.
    pub fn panic_on(&self, operation: Operation) {
        self.script().panics.insert(operation);
    }

    /// Makes the hook for `operation` block until [`ScriptedHooks::release`].
    pub fn block_on(&self, operation: Operation) {
        self.script().blocked.insert(operation);
    }

    /// Unblocks every blocked hook.
    pub fn release(&self) {
        self.script().blocked.clear();
        self.changed.notify_all();
    }

    /// Hooks recorded so far, in call order.
    pub fn calls(&self) -> Vec<HookCall> {
        self.script().calls.clone()
    }

    /// Operations recorded so far, in call order.
    pub fn operations(&self) -> Vec<Operation> {
        self.script()
            .calls
            .iter()
            .map(|call| call.operation)
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.script().calls.clear();
    }

    /// Waits until the hook for `operation` has been entered.
    pub fn wait_entered(&self, operation: Operation, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut script = self.script();
        loop {
            if script.calls.iter().any(|call| call.operation == operation) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            script = self
                .changed
                .wait_timeout(script, remaining)
                .expect("script mutex poisoned")
                .0;
        }
    }

    fn run(&self, operation: Operation) -> Result<(), HookError> {
        let mut script = self.script();
        script.calls.push(HookCall {
            operation,
            thread: thread::current().name().map(ToOwned::to_owned),
        });
        self.changed.notify_all();
        while script.blocked.contains(&operation) {
            script = self.changed.wait(script).expect("script mutex poisoned");
        }
        let panics = script.panics.contains(&operation);
        let fails = script.failures.contains(&operation);
        drop(script);
        if panics {
            panic!("scripted {operation} panic");
        }
        if fails {
            return Err(format!("scripted {operation} failure").into());
        }
        Ok(())
    }
}

impl LifecycleHooks for ScriptedHooks {
    fn do_init(&self) -> Result<(), HookError> {
        self.run(Operation::Init)
    }

    fn do_start(&self) -> Result<(), HookError> {
        self.run(Operation::Start)
    }

    fn do_pause(&self) -> Result<(), HookError> {
        self.run(Operation::Pause)
    }

    fn do_resume(&self) -> Result<(), HookError> {
        self.run(Operation::Resume)
    }

    fn do_stop(&self) -> Result<(), HookError> {
        self.run(Operation::Stop)
    }
}
