pub mod signal;

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError},
    thread::{self, JoinHandle},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::TopicJobConfig,
    error::{Result, TopicError},
    job::signal::{CancellationToken, ProgressCell},
    topic::{
        cluster::cluster,
        oracle::{SimilarityMemo, TermSource},
        TopicSet,
    },
};

/// Identifier of one topic run. Starts at 1 and grows with every run.
pub type RunId = u64;

const NO_RUN_TO_CANCEL: &str = "no running process to cancel";

/// Answer to [`TopicJob::request_status`].
///
/// Serialized with a `status` tag:
/// `{"status": "running", "run_id": 3, "progress": 0.42}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    /// A new run was launched by this request
    Started { run_id: RunId, progress: f64 },
    /// A run is in flight
    Running { run_id: RunId, progress: f64 },
    /// The cached result of a completed run
    Done { run_id: RunId, result: Arc<TopicSet> },
    /// The run was cancelled
    Cancelled { run_id: RunId },
    /// The request was rejected or the run failed
    Error { message: String },
}

/// Side-effect free view of the controller state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobPhase {
    Idle,
    Running { run_id: RunId, progress: f64 },
    Done { run_id: RunId },
    Cancelled { run_id: RunId },
}

struct ActiveRun {
    run_id: RunId,
    cancel: CancellationToken,
    progress: ProgressCell,
    outcome: Outcome,
}

struct CompletedRun {
    run_id: RunId,
    generation: u64,
    topics: Arc<TopicSet>,
}

enum JobState {
    Idle,
    Running(ActiveRun),
    Done(CompletedRun),
    Cancelled { run_id: RunId },
}

/// How a run ended, kept for callers blocked on that run.
enum Settled {
    Done(Arc<TopicSet>),
    Cancelled,
    Failed(String),
}

/// Written once by the run's worker, under the slot lock.
type Outcome = Arc<OnceLock<Settled>>;

struct Slot {
    state: JobState,
    worker: Option<(RunId, JoinHandle<()>)>,
    last_run_id: RunId,
}

impl Slot {
    fn is_running(&self, run_id: RunId) -> bool {
        matches!(&self.state, JobState::Running(run) if run.run_id == run_id)
    }
}

struct Shared {
    slot: Mutex<Slot>,
    settled: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // every critical section leaves the slot consistent, so a poisoned
        // lock still guards valid data
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Action {
    Reply(JobStatus),
    Cancel(RunId, Outcome),
    Start,
}

/// Single-flight controller of the background topic synthesis job.
///
/// At most one run exists at a time. `request_status(false)` starts a run when
/// none is active and otherwise reports on the current one;
/// `request_status(true)` cancels the active run and blocks until its worker
/// has exited. A completed result is cached and returned on every later call
/// until it is invalidated.
///
/// All state lives in one mutex-guarded slot. The worker thread only takes
/// that mutex to publish its terminal state, and never while it is inside an
/// oracle call.
pub struct TopicJob<S> {
    source: Arc<S>,
    config: TopicJobConfig,
    shared: Arc<Shared>,
}

impl<S> TopicJob<S>
where
    S: TermSource + 'static,
{
    pub fn new(source: Arc<S>, config: TopicJobConfig) -> Self {
        Self {
            source,
            config,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: JobState::Idle,
                    worker: None,
                    last_run_id: 0,
                }),
                settled: Condvar::new(),
            }),
        }
    }

    pub fn with_defaults(source: Arc<S>) -> Self {
        Self::new(source, TopicJobConfig::default())
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn config(&self) -> &TopicJobConfig {
        &self.config
    }

    /// Start, poll or cancel the topic run.
    ///
    /// | state     | `cancel = false`        | `cancel = true`                     |
    /// |-----------|-------------------------|-------------------------------------|
    /// | Idle      | start, `Started`        | `Error`, no transition              |
    /// | Running   | `Running(progress)`     | cancel and block until settled      |
    /// | Done      | `Done(result)`          | `Done(result)`                      |
    /// | Cancelled | start, `Started`        | `Cancelled`                         |
    ///
    /// Only the cancel of a running job blocks. When the run completes
    /// naturally while the cancellation is in flight, whatever the worker
    /// stored (`Done` or `Cancelled`) is returned.
    ///
    /// A blocked canceller's reply describes the run it cancelled, not the
    /// controller state at the time it wakes. Other clients may already have
    /// expired that result or started the next run.
    pub fn request_status(&self, cancel: bool) -> JobStatus {
        let mut slot = self.shared.lock();
        self.expire_stale(&mut slot);

        let action = match &slot.state {
            JobState::Done(done) => Action::Reply(JobStatus::Done {
                run_id: done.run_id,
                result: Arc::clone(&done.topics),
            }),
            JobState::Running(run) if cancel => {
                run.cancel.cancel();
                info!(run_id = run.run_id, "topic run cancellation requested");
                Action::Cancel(run.run_id, Arc::clone(&run.outcome))
            }
            JobState::Running(run) => Action::Reply(JobStatus::Running {
                run_id: run.run_id,
                progress: run.progress.get(),
            }),
            JobState::Cancelled { run_id } if cancel => Action::Reply(JobStatus::Cancelled { run_id: *run_id }),
            JobState::Idle if cancel => Action::Reply(JobStatus::Error {
                message: TopicError::InvalidRequest(NO_RUN_TO_CANCEL.to_string()).to_string(),
            }),
            JobState::Idle | JobState::Cancelled { .. } => Action::Start,
        };

        match action {
            Action::Reply(status) => status,
            Action::Cancel(run_id, outcome) => self.wait_for_settle(slot, run_id, &outcome),
            Action::Start => self.start(slot),
        }
    }

    /// Snapshot of the current state
    pub fn phase(&self) -> JobPhase {
        match &self.shared.lock().state {
            JobState::Idle => JobPhase::Idle,
            JobState::Running(run) => JobPhase::Running {
                run_id: run.run_id,
                progress: run.progress.get(),
            },
            JobState::Done(done) => JobPhase::Done { run_id: done.run_id },
            JobState::Cancelled { run_id } => JobPhase::Cancelled { run_id: *run_id },
        }
    }

    /// The cached result, if a completed run is held
    pub fn cached_result(&self) -> Option<Arc<TopicSet>> {
        match &self.shared.lock().state {
            JobState::Done(done) => Some(Arc::clone(&done.topics)),
            _ => None,
        }
    }

    /// Drop a cached `Done` or `Cancelled` state back to `Idle`.
    /// A running job is left alone. Returns whether anything was dropped.
    pub fn invalidate(&self) -> bool {
        let mut slot = self.shared.lock();
        if matches!(slot.state, JobState::Done(_) | JobState::Cancelled { .. }) {
            slot.state = JobState::Idle;
            info!("cached topic result invalidated");
            true
        } else {
            false
        }
    }

    fn expire_stale(&self, slot: &mut Slot) {
        if !self.config.invalidate_on_change {
            return;
        }
        let (run_id, cached) = match &slot.state {
            JobState::Done(done) => (done.run_id, done.generation),
            _ => return,
        };
        let current = self.source.generation();
        if current != cached {
            info!(run_id, cached, current, "documents changed, dropping cached topics");
            slot.state = JobState::Idle;
        }
    }

    fn start(&self, mut slot: MutexGuard<'_, Slot>) -> JobStatus {
        // the previous worker has settled, only the thread exit is left
        if let Some((_, handle)) = slot.worker.take() {
            join_worker(handle);
        }

        slot.last_run_id += 1;
        let run_id = slot.last_run_id;
        let generation = self.source.generation();
        let run = ActiveRun {
            run_id,
            cancel: CancellationToken::new(),
            progress: ProgressCell::new(),
            outcome: Arc::new(OnceLock::new()),
        };
        let worker = Worker {
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            run_id,
            generation,
            cancel: run.cancel.clone(),
            progress: run.progress.clone(),
            outcome: Arc::clone(&run.outcome),
            log_step: self.config.progress_log_step,
        };

        // the worker cannot settle before we release the slot
        let spawned = thread::Builder::new()
            .name(self.config.worker_name.clone())
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                slot.state = JobState::Running(run);
                slot.worker = Some((run_id, handle));
                info!(run_id, generation, "topic run started");
                JobStatus::Started { run_id, progress: 0.0 }
            }
            Err(err) => {
                let err = TopicError::Spawn(err);
                warn!(run_id, error = %err, "topic run could not start");
                slot.state = JobState::Idle;
                JobStatus::Error { message: err.to_string() }
            }
        }
    }

    fn wait_for_settle(&self, slot: MutexGuard<'_, Slot>, run_id: RunId, outcome: &Outcome) -> JobStatus {
        let mut slot = self
            .shared
            .settled
            .wait_while(slot, |_| outcome.get().is_none())
            .unwrap_or_else(PoisonError::into_inner);

        let status = match outcome.get() {
            Some(Settled::Done(topics)) => JobStatus::Done {
                run_id,
                result: Arc::clone(topics),
            },
            Some(Settled::Cancelled) => JobStatus::Cancelled { run_id },
            Some(Settled::Failed(message)) => JobStatus::Error { message: message.clone() },
            // the wait only ends once the outcome is written
            None => JobStatus::Error {
                message: TopicError::WorkerPanicked.to_string(),
            },
        };

        let handle = match slot.worker.take() {
            Some((id, handle)) if id == run_id => Some(handle),
            other => {
                slot.worker = other;
                None
            }
        };
        drop(slot);
        if let Some(handle) = handle {
            join_worker(handle);
        }
        status
    }
}

impl<S> Drop for TopicJob<S> {
    fn drop(&mut self) {
        // let a detached worker wind down instead of running to completion
        if let JobState::Running(run) = &self.shared.lock().state {
            run.cancel.cancel();
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        // already settled by the worker's guard
        debug!("topic worker exited by panic");
    }
}

/// State moved into the background thread of one run.
struct Worker<S> {
    source: Arc<S>,
    shared: Arc<Shared>,
    run_id: RunId,
    generation: u64,
    cancel: CancellationToken,
    progress: ProgressCell,
    outcome: Outcome,
    log_step: f64,
}

impl<S> Worker<S>
where
    S: TermSource,
{
    fn run(self) {
        let started = Instant::now();
        let mut guard = SettleGuard {
            shared: &*self.shared,
            outcome: &self.outcome,
            run_id: self.run_id,
            generation: self.generation,
            started,
            settled: false,
        };
        let outcome = self.compute();
        guard.settle(outcome);
    }

    fn compute(&self) -> Result<TopicSet> {
        let run_id = self.run_id;
        let source = &*self.source;
        let terms = source.terms()?;
        info!(run_id, terms = terms.len(), "clustering terms");

        let mut memo = SimilarityMemo::new(|a: &str, b: &str| source.similarity(a, b));
        let mut next_log = self.log_step;
        let result = cluster(
            &terms,
            |a, b| memo.get(a, b),
            |term| source.significance(term),
            |p| {
                self.progress.publish(p);
                if p >= next_log {
                    debug!(run_id, progress = p, "topic run progress");
                    next_log = p + self.log_step;
                }
            },
            || self.cancel.is_cancelled(),
        );
        debug!(
            run_id,
            oracle_calls = memo.oracle_calls(),
            lookups = memo.lookups(),
            "similarity memo stats"
        );
        result
    }
}

/// Publishes the terminal state of a run exactly once, also when the
/// worker unwinds from a panic.
struct SettleGuard<'a> {
    shared: &'a Shared,
    outcome: &'a Outcome,
    run_id: RunId,
    generation: u64,
    started: Instant,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(&mut self, outcome: Result<TopicSet>) {
        if self.settled {
            return;
        }
        self.settled = true;

        let run_id = self.run_id;
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let (next, settled) = match outcome {
            Ok(topics) => {
                info!(run_id, topics = topics.len(), elapsed_ms, "topic run done");
                let topics = Arc::new(topics);
                let done = CompletedRun {
                    run_id,
                    generation: self.generation,
                    topics: Arc::clone(&topics),
                };
                (JobState::Done(done), Settled::Done(topics))
            }
            Err(TopicError::CancellationRequested) => {
                info!(run_id, elapsed_ms, "topic run cancelled");
                (JobState::Cancelled { run_id }, Settled::Cancelled)
            }
            Err(err) => {
                warn!(run_id, elapsed_ms, error = %err, "topic run failed");
                (JobState::Idle, Settled::Failed(err.to_string()))
            }
        };

        let mut slot = self.shared.lock();
        // a second write cannot happen, `settled` guards re-entry
        let _ = self.outcome.set(settled);
        if slot.is_running(run_id) {
            slot.state = next;
        } else {
            warn!(run_id, "topic run settled after the controller moved on");
        }
        drop(slot);
        self.shared.settled.notify_all();
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(Err(TopicError::WorkerPanicked));
        }
    }
}
