//! Live query subscriptions.
//!
//! A [`Subscription`] is a stream of [`QuerySnapshot`]s: the current result
//! set first, then a fresh one after every committed write to the watched
//! collection. It ends when cancelled, when dropped, or after yielding an
//! error.

use crate::document::Document;
use crate::error::Result;
use crate::query::Query;
use chrono::{DateTime, Utc};
use dishpatch_core::Collection;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Kind of committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Document created
    Added,
    /// Document updated
    Modified,
    /// Document deleted
    Removed,
}

/// Notification of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Collection written
    pub collection: Collection,
    /// Document written
    pub id: String,
    /// What happened
    pub kind: ChangeKind,
}

/// Result set of a watched query at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    /// Documents in query order
    pub documents: Vec<Document>,
    /// When the snapshot was read
    pub read_time: DateTime<Utc>,
}

impl QuerySnapshot {
    /// Decode every document into a model.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.documents.iter().map(Document::decode).collect()
    }
}

/// Cancels a [`Subscription`] from elsewhere.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    /// End the subscription.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// A live query. Dropping it cancels it.
pub struct Subscription {
    inner: BoxStream<'static, Result<QuerySnapshot>>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Wrap a snapshot stream; the stream must end once `token` is cancelled.
    #[must_use]
    pub fn new(inner: BoxStream<'static, Result<QuerySnapshot>>, token: CancellationToken) -> Self {
        let guard = token.clone().drop_guard();
        Self {
            inner,
            token,
            _guard: guard,
        }
    }

    /// End the subscription. Pending snapshots are discarded.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A handle that can cancel this subscription from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.token.clone())
    }

    /// Whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for Subscription {
    type Item = Result<QuerySnapshot>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        this.inner.poll_next_unpin(cx)
    }
}

struct WatchState<F> {
    query: Query,
    receiver: broadcast::Receiver<ChangeEvent>,
    token: CancellationToken,
    fetch: F,
    started: bool,
    failed: bool,
}

impl<F> WatchState<F> {
    /// Wait for a write that concerns the watched collection.
    ///
    /// Returns `false` once the subscription is over.
    async fn wait_for_change(&mut self) -> bool {
        loop {
            let event = tokio::select! {
                biased;
                () = self.token.cancelled() => return false,
                event = self.receiver.recv() => event,
            };

            match event {
                Ok(change) if change.collection != self.query.collection => {}
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    self.drain();
                    return true;
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }

    // Coalesce writes that are already queued into one snapshot.
    fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

/// Build a subscription that re-runs `fetch` after every relevant change.
///
/// `receiver` must be subscribed before the caller reads anything, so no
/// write between the first snapshot and the first change can be missed.
pub fn subscribe<F, Fut>(
    query: Query,
    receiver: broadcast::Receiver<ChangeEvent>,
    fetch: F,
) -> Subscription
where
    F: Fn(Query) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<Document>>> + Send + 'static,
{
    let token = CancellationToken::new();
    let state = WatchState {
        query,
        receiver,
        token: token.clone(),
        fetch,
        started: false,
        failed: false,
    };

    let snapshots = stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        if state.started {
            if !state.wait_for_change().await {
                return None;
            }
        } else {
            state.started = true;
        }

        let snapshot = (state.fetch)(state.query.clone())
            .await
            .map(|documents| QuerySnapshot {
                documents,
                read_time: Utc::now(),
            });
        if let Err(e) = &snapshot {
            tracing::warn!(collection = %state.query.collection, "subscription failed: {}", e);
            state.failed = true;
        }
        Some((snapshot, state))
    });

    Subscription::new(snapshots.boxed(), token)
}
