use crate::{
    entry::Entry,
    errors::AcquireError,
    handle::Handle,
    log_warning,
    observable::{Observable, SourceObserver, Unsubscribe},
    options::{CacheOptions, PrunePolicy},
    scheduler::{PruneScheduler, YieldNow},
    state::EntryInfo,
};
use or_poisoned::OrPoisoned;
use request_key::RequestKey;
use rustc_hash::FxHashMap;
use std::{
    fmt::{self, Debug},
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError, Weak},
    thread,
};

/// A cache of subscriptions to observable sources, keyed by [`RequestKey`].
///
/// Every key has at most one underlying subscription. Each [`acquire`](Self::acquire) of a
/// key returns a [`Handle`] sharing that subscription; releasing the last handle does not
/// tear it down, but marks the entry *pending release* and hands it to the prune scheduler.
/// Acquiring the key again before the next [`prune`](Self::prune) reuses the entry as if
/// it had never been released. This is what keeps a consumer that detaches and immediately
/// reattaches (as happens across a re-render) from reopening its source.
///
/// Cloning the cache is cheap and gives another reference to the same entries. When the
/// last clone and the last handle are dropped, any remaining subscriptions are torn down.
pub struct SubscriptionCache<T, E> {
    inner: Arc<CacheInner<T, E>>,
}

struct CacheInner<T, E> {
    options: CacheOptions,
    table: Mutex<Table<T, E>>,
}

struct Table<T, E> {
    slots: FxHashMap<RequestKey, Slot<T, E>>,
    scheduler: PruneScheduler,
    prune_queued: bool,
}

struct Slot<T, E> {
    entry: Arc<Entry<T, E>>,
    ref_count: usize,
    pending_release: bool,
    unsubscribe: Unsubscribe,
}

impl<T, E> SubscriptionCache<T, E> {
    /// Creates an empty cache.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                options,
                table: Mutex::new(Table {
                    slots: FxHashMap::default(),
                    scheduler: PruneScheduler::new(),
                    prune_queued: false,
                }),
            }),
        }
    }

    /// The options the cache was created with.
    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    /// Reference count and release state of the entry for `key`, if there is one.
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let table = self.inner.table.lock().or_poisoned();
        table.slots.get(key).map(|slot| EntryInfo {
            ref_count: slot.ref_count,
            pending_release: slot.pending_release,
        })
    }

    /// Whether there is an entry (active or pending release) for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.table.lock().or_poisoned().slots.contains_key(key)
    }

    /// The number of entries, including those pending release.
    pub fn len(&self) -> usize {
        self.inner.table.lock().or_poisoned().slots.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of entries waiting to be pruned.
    pub fn pending_release_count(&self) -> usize {
        self.inner.table.lock().or_poisoned().scheduler.len()
    }

    /// Tears down every entry that is still pending release, and returns how many there
    /// were.
    ///
    /// Entries that were acquired again since they were scheduled are skipped. Each
    /// underlying subscription is torn down at most once, so calling this again right away
    /// does nothing.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn prune(&self) -> usize {
        let torn_down = {
            let mut table = self.inner.table.lock().or_poisoned();
            table.prune_queued = false;
            let Table {
                slots, scheduler, ..
            } = &mut *table;
            scheduler
                .drain()
                .filter_map(|key| {
                    let eligible = slots.get(&key).is_some_and(|slot| {
                        slot.ref_count == 0 && slot.pending_release
                    });
                    if !eligible {
                        return None;
                    }
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        cache = self.label(),
                        key = %key,
                        "pruning entry"
                    );
                    slots.remove(&key)
                })
                .collect::<Vec<_>>()
        };

        // entries are closed and dropped outside the lock
        let count = torn_down.len();
        for slot in torn_down {
            slot.entry.close();
            slot.unsubscribe.run();
        }
        count
    }

    #[cfg(feature = "tracing")]
    fn label(&self) -> &str {
        self.inner.options.label.as_deref().unwrap_or("default")
    }
}

impl<T, E> SubscriptionCache<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn release_entry(&self, entry: &Arc<Entry<T, E>>) -> bool {
        let key = entry.key();
        let mut table = self.inner.table.lock().or_poisoned();
        let Some(slot) = table
            .slots
            .get_mut(key)
            .filter(|slot| Arc::ptr_eq(&slot.entry, entry))
        else {
            log_warning(format_args!(
                "released a handle for {key}, which is no longer cached"
            ));
            return false;
        };
        if slot.ref_count == 0 {
            log_warning(format_args!(
                "released a handle for {key}, which has no references"
            ));
            return false;
        }

        slot.ref_count -= 1;
        if slot.ref_count > 0 {
            return true;
        }

        slot.pending_release = true;
        table.scheduler.schedule(key.clone());
        #[cfg(feature = "tracing")]
        tracing::debug!(
            cache = self.label(),
            key = %key,
            "entry pending release"
        );

        // nothing can be spawned while this thread is unwinding
        let queue_prune = self.inner.options.prune == PrunePolicy::NextTick
            && !thread::panicking()
            && !mem::replace(&mut table.prune_queued, true);
        drop(table);
        if queue_prune {
            self.queue_prune();
        }
        true
    }

    fn queue_prune(&self) {
        let task = QueuedPrune {
            cache: Arc::downgrade(&self.inner),
            ran: false,
        };
        let spawned = panic::catch_unwind(AssertUnwindSafe(|| {
            crate::spawn(async move {
                let mut task = task;
                YieldNow::default().await;
                task.ran = true;
                if let Some(inner) = task.cache.upgrade() {
                    SubscriptionCache { inner }.prune();
                }
            })
        }));
        if spawned.is_err() {
            log_warning(format_args!(
                "could not queue a prune, because no executor is                  initialized; call `prune` directly instead"
            ));
        }
    }
}

impl<T, E> SubscriptionCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Returns a handle to the entry for `key`, creating it if needed.
    ///
    /// If the key is already cached (even if pending release), its reference count goes up
    /// and `factory` is not called. The new handle sees the latest value or error at once.
    ///
    /// Otherwise `factory` is called exactly once, and the observable it returns is
    /// subscribed. If `factory` fails, the error is returned and nothing is cached.
    ///
    /// The factory and the observable's `subscribe` run while the cache is locked, so they
    /// must not call back into this cache.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn acquire<O>(
        &self,
        key: impl Into<RequestKey>,
        factory: impl FnOnce() -> Result<O, E>,
    ) -> Result<Handle<T, E>, AcquireError<E>>
    where
        O: Observable<T, E>,
    {
        let key = key.into();
        // declared before the guard, so it runs after the guard poisons the lock
        let _recover = ClearPoisonOnPanic(&self.inner.table);
        let mut table = self.inner.table.lock().or_poisoned();

        if let Some(slot) = table.slots.get_mut(&key) {
            slot.ref_count += 1;
            let reclaimed = mem::take(&mut slot.pending_release);
            let entry = Arc::clone(&slot.entry);
            if reclaimed {
                table.scheduler.unschedule(key.as_str());
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    cache = self.label(),
                    key = %key,
                    "reclaimed entry pending release"
                );
            }
            drop(table);
            return Ok(Handle::new(self.clone(), entry));
        }

        let observable = factory().map_err(AcquireError::Source)?;
        let entry = Arc::new(Entry::new(key.clone()));
        let unsubscribe = observable.subscribe(SourceObserver::new(&entry));
        #[cfg(feature = "tracing")]
        tracing::debug!(
            cache = self.label(),
            key = %key,
            "subscribed to source"
        );
        table.slots.insert(
            key,
            Slot {
                entry: Arc::clone(&entry),
                ref_count: 1,
                pending_release: false,
                unsubscribe,
            },
        );
        drop(table);
        Ok(Handle::new(self.clone(), entry))
    }
}

impl<T, E> Default for SubscriptionCache<T, E> {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl<T, E> Clone for SubscriptionCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Debug for SubscriptionCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionCache")
            .field("options", &self.inner.options)
            .field("len", &self.len())
            .finish()
    }
}

impl<T, E> Drop for CacheInner<T, E> {
    fn drop(&mut self) {
        let table = self
            .table
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        table.scheduler.drain().for_each(drop);
        for (_, slot) in table.slots.drain() {
            slot.entry.close();
            slot.unsubscribe.run();
        }
    }
}

/// The task behind [`PrunePolicy::NextTick`]. If it is dropped without having
/// run (no executor, or the executor shut down), another prune may be queued.
struct QueuedPrune<T, E> {
    cache: Weak<CacheInner<T, E>>,
    ran: bool,
}

impl<T, E> Drop for QueuedPrune<T, E> {
    fn drop(&mut self) {
        if self.ran {
            return;
        }
        if let Some(inner) = self.cache.upgrade() {
            inner
                .table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .prune_queued = false;
        }
    }
}

/// Clears the poison left on the table when a source factory panics.
///
/// The table is not written to before the factory runs, so it is still
/// consistent afterwards.
struct ClearPoisonOnPanic<'a, T>(&'a Mutex<T>);

impl<T> Drop for ClearPoisonOnPanic<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.clear_poison();
        }
    }
}
