use crate::{
    cache::SubscriptionCache,
    entry::{Entry, ListenerId, ResolvedFuture},
    errors::DoubleReleaseError,
    log_warning,
    state::{Emission, EntryInfo, RequestState},
};
use futures::channel::mpsc::{self, UnboundedReceiver};
use request_key::RequestKey;
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

/// A consumer's share of a cached subscription.
///
/// Every handle counts as one reference to its entry. Call [`Handle::release`] (or drop the
/// handle) when the consumer is no longer interested; the subscription itself is only torn
/// down once every handle is gone and the cache is pruned.
pub struct Handle<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    cache: SubscriptionCache<T, E>,
    entry: Arc<Entry<T, E>>,
    listeners: Vec<ListenerId>,
    released: bool,
}

impl<T, E> Handle<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(
        cache: SubscriptionCache<T, E>,
        entry: Arc<Entry<T, E>>,
    ) -> Self {
        Self {
            cache,
            entry,
            listeners: Vec::new(),
            released: false,
        }
    }

    /// The key of the entry this handle shares.
    pub fn key(&self) -> &RequestKey {
        self.entry.key()
    }

    /// Whether [`Handle::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The current bookkeeping of this handle's entry.
    pub fn entry_info(&self) -> Option<EntryInfo> {
        self.cache.entry_info(self.key().as_str())
    }

    /// Removes a listener registered through this handle.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.retain(|l| *l != id);
        self.entry.remove_listener(id)
    }

    /// Gives up this handle's reference to the entry.
    ///
    /// When the last reference is released, the entry becomes pending release and is
    /// scheduled for pruning. Listeners registered through this handle stop receiving
    /// emissions. Releasing twice is an error and leaves the reference count alone.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn release(&mut self) -> Result<(), DoubleReleaseError> {
        if self.released {
            log_warning(format_args!(
                "handle for {} was released more than once",
                self.key()
            ));
            return Err(DoubleReleaseError {
                key: self.key().clone(),
            });
        }
        self.released = true;
        self.detach_listeners();
        self.cache.release_entry(&self.entry);
        Ok(())
    }

    fn detach_listeners(&mut self) {
        for id in self.listeners.drain(..) {
            self.entry.remove_listener(id);
        }
    }
}

impl<T, E> Handle<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Whether the source has emitted yet, and what.
    pub fn state(&self) -> RequestState<T, E> {
        self.entry.state()
    }

    /// The most recent value, even if the source has since failed.
    pub fn last_value(&self) -> Option<T> {
        self.entry.last_value()
    }

    /// The error the source failed with, if it has.
    pub fn last_error(&self) -> Option<E> {
        self.entry.last_error()
    }

    /// A future that resolves with the first value or error, or immediately if there
    /// already is one.
    ///
    /// A host that suspends while a request is [`Pending`](RequestState::Pending) awaits
    /// this to know when to try again.
    pub fn resolved(&self) -> ResolvedFuture<T, E> {
        ResolvedFuture {
            entry: Arc::clone(&self.entry),
        }
    }

    /// Calls `listener` with every emission of the source from now on.
    ///
    /// The latest value (and then the error, if the source failed) is replayed to the
    /// listener right away. Earlier values are not.
    pub fn on_emission(
        &mut self,
        listener: impl Fn(&Emission<T, E>) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.entry.listen(Arc::new(listener));
        self.listeners.push(id);
        id
    }

    /// A stream of every emission of the source from now on, starting with a replay of
    /// the latest state as in [`Handle::on_emission`].
    ///
    /// The stream ends when the handle is released.
    pub fn emissions(&mut self) -> UnboundedReceiver<Emission<T, E>> {
        let (tx, rx) = mpsc::unbounded();
        self.on_emission(move |emission| {
            _ = tx.unbounded_send(emission.clone());
        });
        rx
    }
}

impl<T, E> Debug for Handle<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("key", self.key())
            .field("released", &self.released)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T, E> Drop for Handle<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.released {
            self.detach_listeners();
        } else {
            _ = self.release();
        }
    }
}
