use std::time::Duration;

use thiserror::Error;

/// Pool-level and bootstrap errors.
///
/// Task failures are not represented here: a failing callable becomes a
/// `Failed` status plus captured trace text, never an error out of the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("tasks cannot be submitted after start()")]
    SubmitAfterStart,

    #[error("start() called twice")]
    AlreadyStarted,

    #[error("listen() called before start()")]
    ListenBeforeStart,

    #[error("listen() did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("server at {addr} not reachable after {attempts} attempts")]
    ServerUnavailable { addr: String, attempts: u32 },

    #[error("failed to spawn server process: {0}")]
    Spawn(#[source] std::io::Error),
}
