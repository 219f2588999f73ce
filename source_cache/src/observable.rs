use crate::{entry::Entry, state::Emission};
use futures::{
    future::{AbortHandle, Abortable},
    pin_mut, Stream, StreamExt,
};
use std::{
    fmt::{self, Debug},
    sync::{Arc, Weak},
};

/// Something that can be subscribed to, producing zero or more values and at most one error.
///
/// This is the contract a data source has to meet to be cached: `subscribe` hands the
/// source an observer and gets back the teardown that cancels the subscription.
///
/// Any `FnOnce(SourceObserver<T, E>) -> Unsubscribe` is an observable, as is any
/// [`Stream`] of `Result`s wrapped in a [`StreamSource`].
pub trait Observable<T, E> {
    /// Starts the subscription.
    ///
    /// The source may emit synchronously, before this returns.
    fn subscribe(self, observer: SourceObserver<T, E>) -> Unsubscribe;
}

impl<F, T, E> Observable<T, E> for F
where
    F: FnOnce(SourceObserver<T, E>) -> Unsubscribe,
{
    fn subscribe(self, observer: SourceObserver<T, E>) -> Unsubscribe {
        self(observer)
    }
}

/// The sink a source emits into.
///
/// Emissions go to the cache entry the subscription belongs to. Once the entry has been
/// pruned, they are dropped.
pub struct SourceObserver<T, E> {
    entry: Weak<Entry<T, E>>,
}

impl<T, E> SourceObserver<T, E> {
    pub(crate) fn new(entry: &Arc<Entry<T, E>>) -> Self {
        Self {
            entry: Arc::downgrade(entry),
        }
    }

    /// Whether the entry this observer feeds has been removed from the cache.
    pub fn is_closed(&self) -> bool {
        self.entry.upgrade().is_none_or(|entry| entry.is_closed())
    }
}

impl<T, E> SourceObserver<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Emits a value to every consumer of the entry.
    pub fn next(&self, value: T) {
        if let Some(entry) = self.entry.upgrade() {
            entry.emit(Emission::Next(value));
        }
    }

    /// Emits a terminal error to every consumer of the entry.
    ///
    /// The latest value is kept. Emissions after an error are ignored.
    pub fn error(&self, error: E) {
        if let Some(entry) = self.entry.upgrade() {
            entry.emit(Emission::Error(error));
        }
    }

    /// Signals that the source is done. Cached state is left as it is.
    pub fn complete(&self) {
        #[cfg(feature = "tracing")]
        {
            if let Some(entry) = self.entry.upgrade() {
                tracing::trace!(key = %entry.key(), "source completed");
            }
        }
    }
}

impl<T, E> Clone for SourceObserver<T, E> {
    fn clone(&self) -> Self {
        Self {
            entry: Weak::clone(&self.entry),
        }
    }
}

impl<T, E> Debug for SourceObserver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceObserver")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Tears down a subscription to a source.
///
/// Dropping an `Unsubscribe` without calling [`Unsubscribe::run`] leaves the subscription
/// running.
#[must_use = "the subscription is only cancelled by calling `run`"]
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    /// Wraps a teardown function.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(teardown)))
    }

    /// A teardown that does nothing, for sources with nothing to cancel.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Runs the teardown.
    pub fn run(mut self) {
        if let Some(teardown) = self.0.take() {
            teardown();
        }
    }
}

impl Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unsubscribe")
            .field(&self.0.as_ref().map(|_| "FnOnce"))
            .finish()
    }
}

/// Adapts a [`Stream`] of `Result`s into an [`Observable`].
///
/// Subscribing spawns a task on the [`any_spawner`] executor that forwards each `Ok` as a
/// value. The first `Err` is forwarded as the terminal error and ends the task. Tearing the
/// subscription down aborts the task.
#[derive(Debug)]
pub struct StreamSource<S>(S);

impl<S> StreamSource<S> {
    /// Wraps a stream.
    pub fn new(stream: S) -> Self {
        Self(stream)
    }
}

/// Shorthand for [`StreamSource::new`].
pub fn from_stream<S>(stream: S) -> StreamSource<S> {
    StreamSource::new(stream)
}

impl<S, T, E> Observable<T, E> for StreamSource<S>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn subscribe(self, observer: SourceObserver<T, E>) -> Unsubscribe {
        let (abort, registration) = AbortHandle::new_pair();
        let stream = self.0;
        let forward = Abortable::new(
            async move {
                pin_mut!(stream);
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(value) => observer.next(value),
                        Err(error) => {
                            observer.error(error);
                            return;
                        }
                    }
                }
                observer.complete();
            },
            registration,
        );
        crate::spawn(async move {
            _ = forward.await;
        });
        Unsubscribe::new(move || abort.abort())
    }
}
