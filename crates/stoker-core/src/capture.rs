//! Output capture bridge: task console output → log events.
//!
//! Design:
//! - A task writes into a shared append-only buffer through its `Console`.
//! - A reader polls the buffer and forwards newly appended text as `Log`
//!   events.
//! - Completion is signalled in-band: `finish()` appends a fixed marker and
//!   the reader stops once it sees the marker at the tail of a read. There
//!   is no side channel, so the poll interval bounds the stop latency.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::domain::{LogOwner, PoolEvent};

/// Marker appended once a callable is done. Private so callers only ever see
/// `finish()` and `drain_until_marker`; a hardened close/EOF signal can
/// replace the string without touching the worker loop.
const MARKER: &str = "____FINISHED____";

/// Shared append-only text buffer for one task's console output.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    // std mutex: writers are synchronous and the lock is never held across
    // an await
    inner: Arc<Mutex<String>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, text: &str) {
        self.lock().push_str(text);
    }

    /// Append the completion marker. The drain loop stops at its next poll.
    pub fn finish(&self) {
        self.append(MARKER);
    }

    /// Text appended since byte offset `from`, plus the new offset.
    /// Offsets are taken at append boundaries, so slicing is always valid.
    fn read_from(&self, from: usize) -> (String, usize) {
        let buffer = self.lock();
        if buffer.len() <= from {
            return (String::new(), from);
        }
        (buffer[from..].to_string(), buffer.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        // a poisoned lock only means a writer panicked mid-append; the text
        // so far is still usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> String {
        self.lock().clone()
    }
}

/// Handle handed to a task callable for console-style output.
#[derive(Clone)]
pub struct Console {
    buffer: CaptureBuffer,
}

impl Console {
    pub fn new(buffer: CaptureBuffer) -> Self {
        Self { buffer }
    }

    pub fn print(&self, text: impl AsRef<str>) {
        self.buffer.append(text.as_ref());
    }

    pub fn println(&self, line: impl AsRef<str>) {
        self.buffer.append(line.as_ref());
        self.buffer.append("\n");
    }
}

/// Spawn the reader half of the bridge.
///
/// Every `interval` the reader takes the text appended since its last
/// position and forwards it as a `Log` event owned by `owner`, stopping once
/// the tail of a read is the completion marker. The marker itself is
/// stripped from the forwarded text.
pub fn drain_until_marker(
    owner: LogOwner,
    buffer: CaptureBuffer,
    interval: Duration,
    events: UnboundedSender<PoolEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut position = 0;
        loop {
            tokio::time::sleep(interval).await;

            let (chunk, next) = buffer.read_from(position);
            position = next;
            if chunk.is_empty() {
                continue;
            }

            let done = tail_is_marker(&chunk);
            let text = if done {
                &chunk[..chunk.len() - MARKER.len()]
            } else {
                chunk.as_str()
            };
            if !text.is_empty() {
                // a dropped receiver is fine; keep draining to the marker so
                // the worker's join still completes
                let _ = events.send(PoolEvent::Log {
                    owner,
                    chunk: text.to_string(),
                });
            }

            if done {
                break;
            }
        }
    })
}

/// Tail comparison guarded by length: a chunk shorter than the marker can
/// never be a match and must not trip up the reader. Byte-wise so a
/// multibyte character before the marker cannot cause a boundary panic.
fn tail_is_marker(chunk: &str) -> bool {
    let (chunk, marker) = (chunk.as_bytes(), MARKER.as_bytes());
    if chunk.len() < marker.len() {
        return false;
    }
    &chunk[chunk.len() - marker.len()..] == marker
}
