//! Pool: task registry, worker lifecycle, and the controller loop.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, Instant};

use crate::domain::{PoolEvent, StatusSnapshot, TaskFn, TaskId, TaskStatus};
use crate::error::PoolError;
use crate::queue::DispatchQueue;
use crate::sink::LogSink;
use crate::worker::{TaskDefs, WorkerConfig, WorkerGroup};

/// Pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers to spawn.
    pub workers: usize,
    /// Capture poll cadence for the drain loop.
    pub poll_interval: Duration,
    /// How long a worker waits on an empty dispatch queue before exiting.
    pub idle_wait: Duration,
    /// Optional directory where captured output is persisted per task.
    pub log_dir: Option<PathBuf>,
    /// Optional upper bound on `listen()`. `None` blocks until completion,
    /// which also means a worker dying externally hangs the listen forever.
    pub listen_deadline: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval: Duration::from_millis(50),
            idle_wait: Duration::from_millis(100),
            log_dir: None,
            listen_deadline: None,
        }
    }
}

/// Local job-execution pool.
///
/// Lifecycle: construct → `submit` tasks → `start()` → `listen()`. The pool
/// is terminal once `listen()` returns and is not meant to be reused.
///
/// Design:
/// - Statuses are private to the pool and mutated only from events; workers
///   get an immutable snapshot of the callables at spawn time and nothing
///   else.
/// - The dispatch queue (ids down) and the event channel (status + logs up)
///   are the only coordination points. The pool holds the sole receiver,
///   workers hold sender clones.
pub struct Pool {
    defs: Vec<Arc<dyn TaskFn>>,
    statuses: Vec<TaskStatus>,
    dispatch: Arc<DispatchQueue>,
    events_tx: UnboundedSender<PoolEvent>,
    events_rx: UnboundedReceiver<PoolEvent>,
    workers: Option<WorkerGroup>,
    sink: Option<LogSink>,
    started: bool,
    config: PoolConfig,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let sink = config.log_dir.clone().map(LogSink::new);
        Self {
            defs: Vec::new(),
            statuses: Vec::new(),
            dispatch: Arc::new(DispatchQueue::new()),
            events_tx,
            events_rx,
            workers: None,
            sink,
            started: false,
            config,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Submit a callable. Ids are handed out as 0, 1, 2, ... in call order.
    ///
    /// Must be called before `start()`: a worker that already observed an
    /// empty queue has exited, so a later submission has no pickup
    /// guarantee. This fails fast instead.
    pub async fn submit(&mut self, func: impl TaskFn + 'static) -> Result<TaskId, PoolError> {
        if self.started {
            return Err(PoolError::SubmitAfterStart);
        }

        let id = TaskId::new(self.defs.len() as u64);
        self.defs.push(Arc::new(func));
        self.statuses.push(TaskStatus::Waiting);
        self.dispatch.push(id).await;
        Ok(id)
    }

    /// Spawn the worker group over a snapshot of the submitted tasks.
    /// Irrevocable; a second call is an error rather than a duplicate set of
    /// workers.
    pub fn start(&mut self) -> Result<(), PoolError> {
        if self.started {
            return Err(PoolError::AlreadyStarted);
        }
        self.started = true;

        tracing::info!(
            tasks = self.defs.len(),
            workers = self.config.workers,
            status = %self.status(),
            "starting pool"
        );

        let defs: TaskDefs = Arc::new(self.defs.clone());
        let worker_config = WorkerConfig {
            poll_interval: self.config.poll_interval,
            idle_wait: self.config.idle_wait,
        };
        self.workers = Some(WorkerGroup::spawn(
            self.config.workers,
            defs,
            Arc::clone(&self.dispatch),
            self.events_tx.clone(),
            worker_config,
        ));
        Ok(())
    }

    /// Drain events until every task is terminal and the event queue is
    /// empty, then return the final snapshot.
    ///
    /// The compound condition matters: the completion predicate can become
    /// true while late events are still queued, and those must be consumed.
    pub async fn listen(&mut self) -> Result<StatusSnapshot, PoolError> {
        if !self.started {
            return Err(PoolError::ListenBeforeStart);
        }

        let deadline = self
            .config
            .listen_deadline
            .map(|limit| (limit, Instant::now() + limit));

        loop {
            if self.status().is_complete() {
                // drain what is already queued without blocking
                match self.events_rx.try_recv() {
                    Ok(event) => self.process(event),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            } else {
                let event = match deadline {
                    Some((limit, at)) => {
                        match tokio::time::timeout_at(at, self.events_rx.recv()).await {
                            Ok(event) => event,
                            // in-flight statuses stay as last reported
                            Err(_) => return Err(PoolError::DeadlineExceeded(limit)),
                        }
                    }
                    None => self.events_rx.recv().await,
                };
                match event {
                    Some(event) => self.process(event),
                    // the pool keeps a sender alive, so this arm is
                    // unreachable in practice; break instead of hanging if
                    // that ever changes
                    None => break,
                }
            }
        }

        let snapshot = self.status();
        tracing::info!(%snapshot, "all tasks finished");
        Ok(snapshot)
    }

    fn process(&mut self, event: PoolEvent) {
        match event {
            PoolEvent::TaskRunning(id) => {
                self.set_status(id, TaskStatus::Running);
                tracing::info!(task_id = %id, status = %self.status(), "task started");
            }
            PoolEvent::TaskFinished(id) => self.set_status(id, TaskStatus::Finished),
            PoolEvent::TaskFailed(id) => self.set_status(id, TaskStatus::Failed),
            PoolEvent::Log { owner, chunk } => {
                tracing::info!(owner = %owner, "{}", chunk.trim_end());
                if let Some(sink) = &mut self.sink {
                    // sink trouble must never disturb scheduling
                    if let Err(err) = sink.append(&owner, &chunk) {
                        tracing::warn!(owner = %owner, %err, "log sink write failed");
                    }
                }
            }
            PoolEvent::Message(text) => tracing::info!("{text}"),
        }
    }

    fn set_status(&mut self, id: TaskId, status: TaskStatus) {
        match self.statuses.get_mut(id.index()) {
            // terminal statuses never change again
            Some(slot) if !slot.is_terminal() => *slot = status,
            Some(_) => tracing::warn!(task_id = %id, ?status, "event for already-terminal task"),
            None => tracing::warn!(task_id = %id, "event for unknown task"),
        }
    }

    /// Snapshot of per-status counts at this moment. Safe to call anytime.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::from_statuses(&self.statuses)
    }

    /// Force-stop all workers, best-effort. Workers that already exited are
    /// unaffected; in-flight task statuses stay as last reported.
    pub fn terminate(&mut self) {
        if let Some(workers) = self.workers.take() {
            tracing::info!("terminating pool workers");
            workers.terminate();
        }
    }
}
