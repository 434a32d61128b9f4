//! Caller-side handle for a sequenced operation.

use crate::error::{MapError, MapResult};
use futures_channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future for the Nth operation submitted to a [`Sequencer`](super::Sequencer).
///
/// Resolves with the operation's own result, but never before the ticket
/// submitted ahead of it on the same sequencer has resolved. Dropping a
/// ticket does not cancel the operation and does not hold up later tickets.
#[must_use = "tickets only report results; the operation runs either way"]
pub struct Ticket<T> {
    position: u64,
    receiver: oneshot::Receiver<MapResult<T>>,
}

impl<T> Ticket<T> {
    pub(super) fn new(position: u64, receiver: oneshot::Receiver<MapResult<T>>) -> Self {
        Self { position, receiver }
    }

    /// Zero-based submission position on the owning sequencer.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Non-blocking check for the result.
    ///
    /// Returns `None` while the operation is still waiting for its turn.
    pub fn try_recv(&mut self) -> Option<MapResult<T>> {
        match self.receiver.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(MapError::Abandoned)),
        }
    }
}

impl<T> Future for Ticket<T> {
    type Output = MapResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(MapError::Abandoned)))
    }
}

impl<T> std::fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
