//! Pending queue / in-flight set bookkeeping for one fetch run.
//!
//! Pure and synchronous: the async driver feeds completions in one at a time
//! and executes the returned steps. Every transition is a single `&mut self`
//! call, so a pop, an insert and the completion check can never interleave
//! with another completion.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use super::FileRef;

/// Lifecycle of one run: `Idle → Dispatching → Draining → Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    /// Created, nothing dispatched yet.
    Idle,
    /// Pool is full and the pending queue still has work.
    Dispatching,
    /// Pending queue is empty; the pool shrinks as fetches complete.
    Draining,
    /// Terminal. Entered exactly once.
    Complete,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Invoke the executor for this file (already recorded as in flight).
    Dispatch(FileRef),
    /// Other fetches are still in flight; nothing to do.
    Wait,
    /// Queue and in-flight set are empty: raise the terminal signal.
    Finished,
}

/// Transition rejected; state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    AlreadyStarted,
    NotStarted,
    AlreadyFinished,
    /// Completion for an id that is not currently in flight.
    NotInFlight(String),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::AlreadyStarted => write!(f, "fetch run already started"),
            StateError::NotStarted => write!(f, "fetch run not started"),
            StateError::AlreadyFinished => write!(f, "fetch run already finished"),
            StateError::NotInFlight(id) => write!(f, "file {} is not in flight", id),
        }
    }
}

impl std::error::Error for StateError {}

#[derive(Debug)]
pub struct SchedulerState {
    limit: usize,
    pending: VecDeque<FileRef>,
    in_flight: HashSet<String>,
    dispatched: usize,
    finished: bool,
    phase: FetchPhase,
}

impl SchedulerState {
    /// Builds the pending queue in the given order. `limit` is clamped to at
    /// least 1. Later duplicates of an id are dropped.
    pub fn new(files: Vec<FileRef>, limit: usize) -> Self {
        let mut seen = HashSet::with_capacity(files.len());
        let mut pending = VecDeque::with_capacity(files.len());
        for file in files {
            if seen.insert(file.id.clone()) {
                pending.push_back(file);
            } else {
                tracing::warn!(id = %file.id, "duplicate attachment id dropped from fetch queue");
            }
        }
        Self {
            limit: limit.max(1),
            pending,
            in_flight: HashSet::new(),
            dispatched: 0,
            finished: false,
            phase: FetchPhase::Idle,
        }
    }

    /// Initial fill: dispatches `min(limit, queued)` files, or finishes
    /// immediately when there is nothing to fetch.
    pub fn start(&mut self) -> Result<Vec<Step>, StateError> {
        if self.phase != FetchPhase::Idle {
            return Err(StateError::AlreadyStarted);
        }
        if self.pending.is_empty() {
            self.finish();
            return Ok(vec![Step::Finished]);
        }
        let k = self.limit.min(self.pending.len());
        let mut steps = Vec::with_capacity(k);
        for _ in 0..k {
            if let Some(file) = self.take_next() {
                steps.push(Step::Dispatch(file));
            }
        }
        self.phase = if self.pending.is_empty() {
            FetchPhase::Draining
        } else {
            FetchPhase::Dispatching
        };
        Ok(steps)
    }

    /// Records the completion of `id` (success or failure) and returns the
    /// single follow-up step: refill, wait, or finish.
    pub fn complete(&mut self, id: &str) -> Result<Step, StateError> {
        match self.phase {
            FetchPhase::Idle => return Err(StateError::NotStarted),
            FetchPhase::Complete => return Err(StateError::AlreadyFinished),
            FetchPhase::Dispatching | FetchPhase::Draining => {}
        }
        if !self.in_flight.remove(id) {
            return Err(StateError::NotInFlight(id.to_string()));
        }
        if let Some(next) = self.take_next() {
            if self.pending.is_empty() {
                self.phase = FetchPhase::Draining;
            }
            return Ok(Step::Dispatch(next));
        }
        if self.in_flight.is_empty() {
            self.finish();
            return Ok(Step::Finished);
        }
        self.phase = FetchPhase::Draining;
        Ok(Step::Wait)
    }

    fn take_next(&mut self) -> Option<FileRef> {
        let file = self.pending.pop_front()?;
        self.in_flight.insert(file.id.clone());
        self.dispatched += 1;
        Some(file)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.phase = FetchPhase::Complete;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Number of files handed to the executor so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True when the pool is full or there is nothing left to queue.
    pub fn is_saturated(&self) -> bool {
        self.pending.is_empty() || self.in_flight.len() == self.limit
    }
}
