//! Task callables.

use async_trait::async_trait;
use std::future::Future;

use crate::capture::Console;

/// Failure detail a task reports back. Boxed so callables can surface any
/// error type; the worker renders the source chain into the captured stream.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// One unit of submitted work.
///
/// Arguments travel inside the callable (closure capture), which keeps the
/// definition immutable once submitted. The `Console` is the task's only
/// output channel; whatever it writes is observed by the controller as log
/// events.
#[async_trait]
pub trait TaskFn: Send + Sync {
    async fn run(&self, console: Console) -> Result<(), TaskError>;
}

/// Any `Fn(Console) -> Future` closure is a task.
#[async_trait]
impl<F, Fut> TaskFn for F
where
    F: Fn(Console) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, console: Console) -> Result<(), TaskError> {
        (self)(console).await
    }
}
