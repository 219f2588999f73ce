use indexmap::IndexSet;
use request_key::RequestKey;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// Tracks the entries that have dropped to zero references and may be torn down by the
/// next [`SubscriptionCache::prune`](crate::SubscriptionCache::prune).
///
/// Keys are kept in the order they became eligible.
#[derive(Debug, Default)]
pub struct PruneScheduler {
    scheduled: IndexSet<RequestKey>,
}

impl PruneScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the entry for `key` became eligible for release.
    ///
    /// Returns `false` if it was already scheduled.
    pub fn schedule(&mut self, key: RequestKey) -> bool {
        self.scheduled.insert(key)
    }

    /// Forgets `key`, because its entry was reclaimed before it was pruned.
    pub fn unschedule(&mut self, key: &str) -> bool {
        self.scheduled.shift_remove(key)
    }

    /// Whether `key` is waiting to be pruned.
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.scheduled.contains(key)
    }

    /// The number of scheduled keys.
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// Removes and yields every scheduled key, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = RequestKey> + '_ {
        self.scheduled.drain(..)
    }
}

/// Completes on its second poll, giving the executor one chance to run other work first.
#[derive(Debug, Default)]
pub(crate) struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
