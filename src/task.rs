//! Cooperative task state machine
//!
//! A task moves `Ready -> Executing -> Finished`. Cancelling a task that has
//! not been dispatched sends it straight to `Finished` on its next dispatch
//! attempt, so no pipeline stage ever runs for it. `Suspended` is a side-state
//! that remembers where it was entered from; `resume` restores exactly that.
//!
//! All state lives behind one mutex so "is it executing" and "is it finished"
//! are always read from the same snapshot.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for a pool slot
    Ready,
    /// Running the pipeline
    Executing,
    /// Terminal
    Finished,
    /// Parked; the remembered state is restored on resume
    Suspended,
}

/// Outcome of a dispatch attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The task is now executing and the caller must run its body
    Started,
    /// The task had been cancelled; it is now finished and ran nothing
    Cancelled,
    /// Suspended, or the pool's readiness predicate is false; try again later
    NotReady,
    /// The task already finished; nothing to do
    AlreadyFinished,
}

#[derive(Debug)]
struct Inner {
    state: TaskState,
    before_suspend: Option<TaskState>,
    cancelled: bool,
}

/// Shared handle to one task's state.
///
/// Clones observe and mutate the same task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    inner: Arc<Mutex<Inner>>,
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHandle {
    /// New task in `Ready`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: TaskState::Ready,
                before_suspend: None,
                cancelled: false,
            })),
        }
    }

    // A panic while holding the lock cannot leave Inner half-written: every
    // critical section is a handful of field assignments.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    /// Whether `cancel` was called before dispatch
    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Attempt `Ready -> Executing`.
    ///
    /// `ready` is the pool's readiness predicate; it is evaluated while the
    /// state lock is held so the check and the transition are one step.
    pub fn try_start(&self, ready: impl FnOnce() -> bool) -> Dispatch {
        let mut inner = self.lock();
        match inner.state {
            TaskState::Finished => Dispatch::AlreadyFinished,
            TaskState::Executing => Dispatch::NotReady,
            TaskState::Suspended => Dispatch::NotReady,
            TaskState::Ready if inner.cancelled => {
                inner.state = TaskState::Finished;
                Dispatch::Cancelled
            }
            TaskState::Ready => {
                if !ready() {
                    return Dispatch::NotReady;
                }
                inner.state = TaskState::Executing;
                Dispatch::Started
            }
        }
    }

    /// `Executing -> Finished` once the body returns, whatever its outcome
    pub fn finish(&self) {
        let mut inner = self.lock();
        inner.state = TaskState::Finished;
        inner.before_suspend = None;
    }

    /// Request cancellation.
    ///
    /// Only honored before dispatch; an executing task runs its current body
    /// to completion. Returns false when the task is already executing or
    /// finished.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        let pending = matches!(inner.state, TaskState::Ready)
            || matches!(inner.before_suspend, Some(TaskState::Ready));
        if pending && inner.state != TaskState::Finished {
            inner.cancelled = true;
        }
        pending
    }

    /// Park the task. No-op when finished or already suspended.
    pub fn suspend(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            TaskState::Finished | TaskState::Suspended => false,
            current => {
                inner.before_suspend = Some(current);
                inner.state = TaskState::Suspended;
                true
            }
        }
    }

    /// Restore the state recorded by `suspend`. No-op when not suspended.
    pub fn resume(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != TaskState::Suspended {
            return false;
        }
        inner.state = inner.before_suspend.take().unwrap_or(TaskState::Ready);
        true
    }
}
