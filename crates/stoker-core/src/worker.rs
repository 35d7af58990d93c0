//! Worker group: pulls task ids and executes callables under capture.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::capture::{CaptureBuffer, Console, drain_until_marker};
use crate::domain::{LogOwner, PoolEvent, TaskFn};
use crate::queue::DispatchQueue;

/// Immutable view of the submitted callables, shared with every worker at
/// spawn time.
///
/// Workers only ever read callables from this snapshot; task status lives
/// with the controller and changes exclusively through events.
pub type TaskDefs = Arc<Vec<Arc<dyn TaskFn>>>;

/// Per-worker tuning, copied from the pool settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Capture poll cadence for the drain loop.
    pub poll_interval: Duration,
    /// How long a pop waits on an empty dispatch queue before the worker
    /// exits.
    pub idle_wait: Duration,
}

/// Worker group handle.
/// - `terminate()` は全ワーカーを止める（best-effort）
/// - `join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers over a snapshot of the task definitions.
    pub fn spawn(
        n: usize,
        defs: TaskDefs,
        queue: Arc<DispatchQueue>,
        events: UnboundedSender<PoolEvent>,
        config: WorkerConfig,
    ) -> Self {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let defs = Arc::clone(&defs);
            let queue = Arc::clone(&queue);
            let events = events.clone();
            let config = config.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, defs, queue, events, config).await;
            }));
        }

        Self { joins }
    }

    /// Force-stop all workers. In-flight tasks keep whatever status was last
    /// reported; workers that already exited are unaffected.
    pub fn terminate(&self) {
        for join in &self.joins {
            join.abort();
        }
    }

    /// Wait for every worker to run to completion.
    pub async fn join(self) {
        for join in self.joins {
            let _ = join.await;
        }
    }
}

/// Join handle that aborts its task when dropped.
///
/// The worker loop owns its capture reader and in-flight callable through
/// this guard, so aborting the worker at any await point also stops both
/// instead of leaving them running detached.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn worker_loop(
    worker_id: usize,
    defs: TaskDefs,
    queue: Arc<DispatchQueue>,
    events: UnboundedSender<PoolEvent>,
    config: WorkerConfig,
) {
    // send errors are ignored throughout: a dropped receiver just means
    // nobody is listening any more
    let _ = events.send(PoolEvent::Message(format!("worker {worker_id} started")));
    tracing::debug!(worker_id, "worker started");

    while let Some(task_id) = queue.pop(config.idle_wait).await {
        let Some(func) = defs.get(task_id.index()).cloned() else {
            // an id outside the snapshot cannot happen through Pool::submit;
            // skip rather than take the worker down
            tracing::warn!(%task_id, worker_id, "dispatched id has no definition");
            continue;
        };

        let _ = events.send(PoolEvent::TaskRunning(task_id));

        let buffer = CaptureBuffer::new();
        let mut reader = AbortOnDrop(drain_until_marker(
            LogOwner::Task(task_id),
            buffer.clone(),
            config.poll_interval,
            events.clone(),
        ));

        let outcome = run_task(func, Console::new(buffer.clone())).await;
        if let Err(trace) = &outcome {
            // the failure detail goes through the captured stream, like any
            // other task output
            buffer.append(trace);
        }
        buffer.finish();

        // joining the reader guarantees every log event for this task is
        // enqueued before its terminal event
        let _ = (&mut reader.0).await;

        match outcome {
            Ok(()) => {
                tracing::info!(%task_id, worker_id, "task finished");
                let _ = events.send(PoolEvent::TaskFinished(task_id));
            }
            Err(_) => {
                tracing::info!(%task_id, worker_id, "task failed");
                let _ = events.send(PoolEvent::TaskFailed(task_id));
            }
        }
    }

    let _ = events.send(PoolEvent::Message(format!("worker {worker_id} terminated")));
    tracing::debug!(worker_id, "worker terminated");
}

/// Run one callable with panic containment.
///
/// The callable gets its own tokio task so that a panic is absorbed by the
/// join instead of tearing down the worker loop. The guard ties the
/// callable's lifetime to this future, so a worker abort cancels it too.
/// Failures come back as rendered trace text, ready for the captured stream.
async fn run_task(func: Arc<dyn TaskFn>, console: Console) -> Result<(), String> {
    let mut handle = AbortOnDrop(tokio::spawn(async move { func.run(console).await }));

    match (&mut handle.0).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(render_trace(&*err)),
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(format!("task panicked: {message}\n"))
        }
        Err(_) => Err("task was cancelled\n".to_string()),
    }
}

/// Render an error and its source chain, the captured equivalent of a
/// stack trace.
fn render_trace(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = format!("task failed: {err}\n");
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!("  caused by: {cause}\n"));
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::domain::{TaskError, TaskId};

    #[derive(Debug, thiserror::Error)]
    #[error("outer context")]
    struct Outer {
        #[source]
        inner: Inner,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("inner cause")]
    struct Inner;

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(5),
            idle_wait: Duration::from_millis(20),
        }
    }

    async fn filled_queue(n: u64) -> Arc<DispatchQueue> {
        let queue = Arc::new(DispatchQueue::new());
        for id in 0..n {
            queue.push(TaskId::new(id)).await;
        }
        queue
    }

    fn collect(rx: &mut UnboundedReceiver<PoolEvent>) -> Vec<PoolEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn logs_for(events: &[PoolEvent], id: TaskId) -> String {
        events
            .iter()
            .filter_map(|event| match event {
                PoolEvent::Log {
                    owner: LogOwner::Task(owner),
                    chunk,
                } if *owner == id => Some(chunk.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn success_emits_running_logs_then_finished() {
        let queue = filled_queue(1).await;
        let defs: TaskDefs = Arc::new(vec![Arc::new(|console: Console| async move {
            console.println("hi");
            Ok::<(), TaskError>(())
        })]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        WorkerGroup::spawn(1, defs, queue, tx, test_config())
            .join()
            .await;

        let events = collect(&mut rx);
        let running = events
            .iter()
            .position(|e| matches!(e, PoolEvent::TaskRunning(_)))
            .unwrap();
        let log = events
            .iter()
            .position(|e| matches!(e, PoolEvent::Log { .. }))
            .unwrap();
        let finished = events
            .iter()
            .position(|e| matches!(e, PoolEvent::TaskFinished(_)))
            .unwrap();

        assert!(running < log && log < finished);
        assert_eq!(logs_for(&events, TaskId::new(0)), "hi\n");
        assert!(matches!(events.first(), Some(PoolEvent::Message(m)) if m.contains("started")));
        assert!(matches!(events.last(), Some(PoolEvent::Message(m)) if m.contains("terminated")));
    }

    #[tokio::test]
    async fn failure_captures_trace_and_worker_continues() {
        let queue = filled_queue(2).await;
        let failing = Arc::new(|_console: Console| async move {
            Err::<(), TaskError>(Box::new(Outer { inner: Inner }))
        });
        let ok = Arc::new(|console: Console| async move {
            console.println("second task ran");
            Ok::<(), TaskError>(())
        });
        let defs: TaskDefs = Arc::new(vec![failing, ok]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        WorkerGroup::spawn(1, defs, queue, tx, test_config())
            .join()
            .await;

        let events = collect(&mut rx);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PoolEvent::TaskFailed(id) if *id == TaskId::new(0)))
        );
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PoolEvent::TaskFinished(id) if *id == TaskId::new(1)))
        );

        let trace = logs_for(&events, TaskId::new(0));
        assert!(trace.contains("task failed: outer context"));
        assert!(trace.contains("caused by: inner cause"));
    }

    #[tokio::test]
    async fn panic_is_contained_to_the_task() {
        let queue = filled_queue(2).await;
        let panicking = |_console: Console| async move { panic!("boom") };
        let ok = |_console: Console| async move { Ok::<(), TaskError>(()) };
        let defs: TaskDefs = Arc::new(vec![Arc::new(panicking), Arc::new(ok)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        WorkerGroup::spawn(1, defs, queue, tx, test_config())
            .join()
            .await;

        let events = collect(&mut rx);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PoolEvent::TaskFailed(id) if *id == TaskId::new(0)))
        );
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PoolEvent::TaskFinished(id) if *id == TaskId::new(1)))
        );
        assert!(logs_for(&events, TaskId::new(0)).contains("task panicked: boom"));
    }

    #[tokio::test]
    async fn single_worker_runs_tasks_in_submission_order() {
        let queue = filled_queue(3).await;
        let task = |_console: Console| async move { Ok::<(), TaskError>(()) };
        let defs: TaskDefs = Arc::new(vec![Arc::new(task), Arc::new(task), Arc::new(task)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        WorkerGroup::spawn(1, defs, queue, tx, test_config())
            .join()
            .await;

        let order: Vec<_> = collect(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                PoolEvent::TaskRunning(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![TaskId::new(0), TaskId::new(1), TaskId::new(2)]);
    }

    #[tokio::test]
    async fn terminate_cancels_the_in_flight_callable_and_its_reader() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let queue = filled_queue(1).await;
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let slow = move |_console: Console| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<(), TaskError>(())
            }
        };
        let defs: TaskDefs = Arc::new(vec![Arc::new(slow)]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let group = WorkerGroup::spawn(1, defs, queue, tx, test_config());
        tokio::time::sleep(Duration::from_millis(50)).await;
        group.terminate();
        group.join().await;

        // if the callable had been left running detached it would finish
        // (and its reader would still be polling) well within this window
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!completed.load(Ordering::SeqCst));

        let events = collect(&mut rx);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PoolEvent::TaskRunning(id) if *id == TaskId::new(0)))
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, PoolEvent::TaskFinished(_) | PoolEvent::TaskFailed(_)))
        );
    }

    #[test]
    fn render_trace_walks_the_source_chain() {
        let trace = render_trace(&Outer { inner: Inner });
        assert_eq!(trace, "task failed: outer context\n  caused by: inner cause\n");
    }
}
