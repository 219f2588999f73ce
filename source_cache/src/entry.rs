use crate::state::{Emission, RequestState};
use or_poisoned::OrPoisoned;
use parking_lot::ReentrantMutex;
use request_key::RequestKey;
use slotmap::SlotMap;
use std::{
    future::Future,
    mem,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

slotmap::new_key_type! {
    /// Identifies a listener registered with [`Handle::on_emission`](crate::Handle::on_emission).
    pub struct ListenerId;
}

pub(crate) type Listener<T, E> = Arc<dyn Fn(&Emission<T, E>) + Send + Sync>;

/// The part of a cache entry shared between the cache, its handles and the source's observer.
pub(crate) struct Entry<T, E> {
    key: RequestKey,
    state: Mutex<EntryState<T, E>>,
    // held while emissions and replays are delivered, so each listener sees
    // them in order; reentrant so a listener may emit on the same thread
    delivery: ReentrantMutex<()>,
}

struct EntryState<T, E> {
    closed: bool,
    last_value: Option<T>,
    last_error: Option<E>,
    listeners: SlotMap<ListenerId, Listener<T, E>>,
    // futures waiting for the first value or error
    wakers: Vec<Waker>,
}

impl<T, E> Entry<T, E> {
    pub fn new(key: RequestKey) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState {
                closed: false,
                last_value: None,
                last_error: None,
                listeners: SlotMap::with_key(),
                wakers: Vec::new(),
            }),
            delivery: ReentrantMutex::new(()),
        }
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.lock().or_poisoned().listeners.remove(id).is_some()
    }

    /// Whether the entry has been pruned from its cache.
    pub fn is_closed(&self) -> bool {
        self.state.lock().or_poisoned().closed
    }

    /// Marks the entry as pruned. Later emissions are ignored, and every
    /// listener is dropped.
    pub fn close(&self) {
        let listeners = {
            let mut state = self.state.lock().or_poisoned();
            state.closed = true;
            mem::take(&mut state.listeners)
        };
        drop(listeners);
    }
}

impl<T, E> Entry<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Stores the emission as the latest state, then notifies every current listener.
    ///
    /// Listeners and wakers run after the state lock is released, so a listener may read
    /// the entry (or release its handle) without deadlocking. Emissions from different
    /// threads are delivered one at a time.
    pub fn emit(&self, emission: Emission<T, E>) {
        let _delivery = self.delivery.lock();
        let (listeners, wakers) = {
            let mut state = self.state.lock().or_poisoned();
            if state.closed {
                return;
            }
            if state.last_error.is_some() {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    key = %self.key,
                    "ignoring emission after the source failed"
                );
                return;
            }
            match &emission {
                Emission::Next(value) => {
                    state.last_value = Some(value.clone());
                }
                Emission::Error(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(key = %self.key, "source failed");
                    state.last_error = Some(error.clone());
                }
            }
            (
                state.listeners.values().cloned().collect::<Vec<_>>(),
                mem::take(&mut state.wakers),
            )
        };

        for listener in listeners {
            listener(&emission);
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Registers a listener, then replays the latest value and error to it.
    ///
    /// No emission reaches the listener before the replay does.
    pub fn listen(&self, listener: Listener<T, E>) -> ListenerId {
        let _delivery = self.delivery.lock();
        let (id, value, error) = {
            let mut state = self.state.lock().or_poisoned();
            let id = state.listeners.insert(Arc::clone(&listener));
            (id, state.last_value.clone(), state.last_error.clone())
        };

        if let Some(value) = value {
            listener(&Emission::Next(value));
        }
        if let Some(error) = error {
            listener(&Emission::Error(error));
        }
        id
    }

    pub fn state(&self) -> RequestState<T, E> {
        let state = self.state.lock().or_poisoned();
        match (&state.last_value, &state.last_error) {
            (_, Some(error)) => RequestState::Failed(error.clone()),
            (Some(value), None) => RequestState::Resolved(value.clone()),
            (None, None) => RequestState::Pending,
        }
    }

    pub fn last_value(&self) -> Option<T> {
        self.state.lock().or_poisoned().last_value.clone()
    }

    pub fn last_error(&self) -> Option<E> {
        self.state.lock().or_poisoned().last_error.clone()
    }
}

/// A [`Future`] that is ready once an entry holds a value or an error.
///
/// Resolves immediately if the source has already emitted. An error takes precedence over an
/// earlier value.
pub struct ResolvedFuture<T, E> {
    pub(crate) entry: Arc<Entry<T, E>>,
}

impl<T, E> Future for ResolvedFuture<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.entry.state.lock().or_poisoned();
        if let Some(error) = &state.last_error {
            return Poll::Ready(Err(error.clone()));
        }
        if let Some(value) = &state.last_value {
            return Poll::Ready(Ok(value.clone()));
        }

        let waker = cx.waker();
        if !state.wakers.iter().any(|w| w.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
        Poll::Pending
    }
}
