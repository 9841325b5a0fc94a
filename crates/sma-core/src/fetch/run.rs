//! Async driver for a fetch run.
//!
//! One coordinating task owns the `SchedulerState`. Each dispatched file runs
//! on tokio's blocking pool inside a `JoinSet`; the coordinator reads
//! completions back one at a time and feeds them into the state machine, so
//! refill and the completion check are never raced by another completion.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{Id, JoinSet};

use super::state::{SchedulerState, Step};
use super::{FetchError, FetchExecutor, FileRef};

type Completion = (FileRef, Result<u64, FetchError>);

/// Observation of the run, for progress output and invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// File handed to the executor. Counts are taken after it was marked in flight.
    Dispatched {
        id: String,
        in_flight: usize,
        pending: usize,
    },
    /// Executor returned for this file.
    Completed { id: String, error: Option<String> },
    /// Terminal signal. Sent once per run.
    Finished { completed: usize, failed: usize },
}

/// Outcome of a fetch run. Failed files still count as completed.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub completed: usize,
    pub bytes: u64,
    pub written: BTreeMap<String, u64>,
    pub failures: BTreeMap<String, FetchError>,
}

impl FetchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn error_for(&self, id: &str) -> Option<&FetchError> {
        self.failures.get(id)
    }

    pub fn bytes_for(&self, id: &str) -> Option<u64> {
        self.written.get(id).copied()
    }
}

/// Runs up to `limit` fetches at once until every file has been attempted.
pub struct FetchScheduler<E> {
    executor: Arc<E>,
    limit: usize,
    events: Option<UnboundedSender<FetchEvent>>,
}

impl<E> FetchScheduler<E>
where
    E: FetchExecutor + 'static,
{
    pub fn new(executor: Arc<E>, limit: usize) -> Self {
        Self {
            executor,
            limit: limit.max(1),
            events: None,
        }
    }

    /// Send a `FetchEvent` for every dispatch, completion and the final signal.
    pub fn with_events(mut self, tx: UnboundedSender<FetchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fetches `files` in queue order with at most `limit` in flight.
    ///
    /// `on_complete` is invoked exactly once, after the last executor call
    /// has returned (immediately for an empty list). The returned report is
    /// the one passed to `on_complete`.
    pub async fn run<F>(&self, files: Vec<FileRef>, on_complete: F) -> FetchReport
    where
        F: FnOnce(&FetchReport) + Send,
    {
        let mut state = SchedulerState::new(files, self.limit);
        let mut report = FetchReport::default();
        let mut on_complete = Some(on_complete);
        let mut join_set: JoinSet<Completion> = JoinSet::new();
        // Maps each running task back to its file so a task that dies without
        // returning still completes that file.
        let mut tasks: HashMap<Id, FileRef> = HashMap::new();

        tracing::debug!(
            queued = state.pending_len(),
            limit = state.limit(),
            "starting attachment fetch"
        );
        let mut steps = state.start().unwrap_or_default();

        loop {
            for step in steps.drain(..) {
                match step {
                    Step::Dispatch(file) => self.dispatch(file, &state, &mut join_set, &mut tasks),
                    Step::Wait => {}
                    Step::Finished => {
                        tracing::info!(
                            completed = report.completed,
                            failed = report.failed(),
                            bytes = report.bytes,
                            "finished downloading"
                        );
                        self.emit(FetchEvent::Finished {
                            completed: report.completed,
                            failed: report.failed(),
                        });
                        if let Some(f) = on_complete.take() {
                            f(&report);
                        }
                    }
                }
            }

            let Some(joined) = join_set.join_next_with_id().await else {
                break;
            };
            let (file, result) = match joined {
                Ok((task, done)) => {
                    tasks.remove(&task);
                    done
                }
                Err(e) => match tasks.remove(&e.id()) {
                    Some(file) => {
                        tracing::error!(id = %file.id, "fetch task join: {}", e);
                        (file, Err(FetchError::Lost(e.to_string())))
                    }
                    None => {
                        tracing::error!("fetch task join for unknown task: {}", e);
                        continue;
                    }
                },
            };

            self.record(&mut report, &file, result);
            match state.complete(&file.id) {
                Ok(step) => steps.push(step),
                Err(e) => tracing::warn!(id = %file.id, "ignored completion: {}", e),
            }
        }

        if !state.is_finished() {
            tracing::error!(
                in_flight = state.in_flight_len(),
                pending = state.pending_len(),
                "fetch run ended without completing"
            );
        }
        report
    }

    fn dispatch(
        &self,
        file: FileRef,
        state: &SchedulerState,
        join_set: &mut JoinSet<Completion>,
        tasks: &mut HashMap<Id, FileRef>,
    ) {
        tracing::debug!(
            id = %file.id,
            in_flight = state.in_flight_len(),
            pending = state.pending_len(),
            "dispatching attachment fetch"
        );
        self.emit(FetchEvent::Dispatched {
            id: file.id.clone(),
            in_flight: state.in_flight_len(),
            pending: state.pending_len(),
        });

        let executor = Arc::clone(&self.executor);
        let tracked = file.clone();
        let handle = join_set.spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| executor.fetch(&file)))
                .unwrap_or_else(|payload| Err(FetchError::Panicked(panic_message(payload.as_ref()))));
            (file, result)
        });
        tasks.insert(handle.id(), tracked);
    }

    fn record(&self, report: &mut FetchReport, file: &FileRef, result: Result<u64, FetchError>) {
        report.completed += 1;
        let error = match result {
            Ok(bytes) => {
                tracing::debug!(id = %file.id, bytes, "attachment fetched");
                report.bytes += bytes;
                report.written.insert(file.id.clone(), bytes);
                None
            }
            Err(e) => {
                tracing::warn!(id = %file.id, url = %file.source_url, "attachment fetch failed: {}", e);
                let msg = e.to_string();
                report.failures.insert(file.id.clone(), e);
                Some(msg)
            }
        };
        self.emit(FetchEvent::Completed {
            id: file.id.clone(),
            error,
        });
    }

    fn emit(&self, event: FetchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
