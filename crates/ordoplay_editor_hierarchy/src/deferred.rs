// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred template restoration.
//!
//! Re-attaching a restored entity to its template instance needs the
//! template asset to be resident. When it is not, the request waits in the
//! [`DeferredRestoreQueue`] until an asset-ready event for that asset arrives.
//!
//! Every restore call hands back a [`RestoreTicket`]. The ticket is a future
//! that resolves once all requests it covers have drained (or were
//! cancelled), so asynchronous callers can poll it and synchronous callers
//! can block on it through `EditorState::wait_for_restore`.

use crate::ids::{AssetId, EntityId};
use crate::template::RestoreInfo;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Final state of a restore ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStatus {
    /// Every request drained; `failed` lists entities destroyed because
    /// re-attachment was rejected
    Completed {
        /// Entities destroyed during the drain
        failed: Vec<EntityId>,
    },
    /// The ticket was cancelled before every request drained
    Cancelled,
}

#[derive(Debug, Default)]
struct TicketState {
    outstanding: usize,
    failed: Vec<EntityId>,
    cancelled: bool,
    waker: Option<Waker>,
}

impl TicketState {
    fn status(&self) -> Option<RestoreStatus> {
        if self.cancelled {
            Some(RestoreStatus::Cancelled)
        } else if self.outstanding == 0 {
            Some(RestoreStatus::Completed {
                failed: self.failed.clone(),
            })
        } else {
            None
        }
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Completion handle for a (possibly deferred) restore
#[derive(Debug, Clone, Default)]
pub struct RestoreTicket {
    state: Arc<Mutex<TicketState>>,
}

impl RestoreTicket {
    /// Create a ticket with nothing outstanding
    pub fn new() -> Self {
        Self::default()
    }

    fn add_outstanding(&self) {
        self.state.lock().outstanding += 1;
    }

    fn resolve(&self, failed: Option<EntityId>) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if let Some(entity) = failed {
            state.failed.push(entity);
        }
        if state.outstanding == 0 {
            state.wake();
        }
    }

    /// Cancel the ticket; its queued requests are dropped on the next drain
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        state.wake();
    }

    /// Check if the ticket was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Check if the ticket has resolved
    pub fn is_finished(&self) -> bool {
        self.state.lock().status().is_some()
    }

    /// Number of requests still waiting on an asset
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Final status, if resolved
    pub fn status(&self) -> Option<RestoreStatus> {
        self.state.lock().status()
    }
}

impl Future for RestoreTicket {
    type Output = RestoreStatus;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock();
        match state.status() {
            Some(status) => Poll::Ready(status),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// A restore waiting for a template asset
#[derive(Debug)]
pub struct DeferredRestoreRequest {
    /// Entity to re-attach
    pub entity: EntityId,
    /// Instance linkage to restore
    pub restore_info: RestoreInfo,
    /// Asset that must become resident first
    pub pending_asset: AssetId,
    ticket: RestoreTicket,
}

impl DeferredRestoreRequest {
    /// Check if the owning ticket was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.ticket.is_cancelled()
    }

    /// Mark the request as drained; `failed` when the entity had to be destroyed
    pub fn complete(self, failed: bool) {
        self.ticket.resolve(failed.then_some(self.entity));
    }
}

/// Queue of restores blocked on template assets
#[derive(Debug, Default)]
pub struct DeferredRestoreQueue {
    requests: Vec<DeferredRestoreRequest>,
}

impl DeferredRestoreQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a restore until `restore_info.asset` becomes resident
    pub fn enqueue(&mut self, entity: EntityId, restore_info: RestoreInfo, ticket: &RestoreTicket) {
        ticket.add_outstanding();
        tracing::debug!(
            "Deferring template restore of {entity} until asset {} is ready",
            restore_info.asset
        );
        self.requests.push(DeferredRestoreRequest {
            entity,
            restore_info,
            pending_asset: restore_info.asset,
            ticket: ticket.clone(),
        });
    }

    /// Check if any request is still waiting
    pub fn has_pending_requests(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Number of waiting requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Distinct assets the queue is waiting on
    pub fn pending_assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<AssetId> = Vec::new();
        for request in &self.requests {
            if !assets.contains(&request.pending_asset) {
                assets.push(request.pending_asset);
            }
        }
        assets
    }

    /// Remove and return every request waiting on `asset`, in queue order
    pub fn take_ready(&mut self, asset: AssetId) -> Vec<DeferredRestoreRequest> {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.requests)
            .into_iter()
            .partition(|r| r.pending_asset == asset);
        self.requests = waiting;
        ready
    }

    /// Drop every request, cancelling their tickets; returns the number dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.requests.len();
        for request in self.requests.drain(..) {
            request.ticket.cancel();
        }
        if dropped > 0 {
            tracing::info!("Dropped {dropped} deferred template restore(s)");
        }
        dropped
    }
}
