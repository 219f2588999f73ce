//! A cache of subscriptions to observable data sources, keyed by request.
//!
//! UI code usually wants to say "I need the stream for `/users?page=2`" from many places at
//! once, without opening the stream once per place. [`SubscriptionCache`] keeps exactly one
//! subscription per [`RequestKey`](request_key::RequestKey) and hands out reference-counted
//! [`Handle`]s to it:
//! - every handle sees the latest value or error the source emitted ([`Handle::state`]),
//!   gets every later emission ([`Handle::on_emission`]), and can wait for the first one
//!   ([`Handle::resolved`]);
//! - releasing the last handle only marks the entry *pending release*; it is torn down by
//!   the next [`SubscriptionCache::prune`], unless it was acquired again in the meantime.
//!
//! ```rust
//! use source_cache::{RequestState, SourceObserver, SubscriptionCache, Unsubscribe};
//! use std::sync::{Arc, Mutex};
//!
//! let cache = SubscriptionCache::<u32, String>::default();
//! let sink = Arc::new(Mutex::new(None));
//!
//! let mut handle = cache
//!     .acquire("/count", || {
//!         let sink = Arc::clone(&sink);
//!         Ok(move |observer: SourceObserver<u32, String>| {
//!             *sink.lock().unwrap() = Some(observer);
//!             Unsubscribe::noop()
//!         })
//!     })
//!     .unwrap();
//! assert_eq!(handle.state(), RequestState::Pending);
//!
//! sink.lock().unwrap().as_ref().unwrap().next(1);
//! assert_eq!(handle.state(), RequestState::Resolved(1));
//!
//! handle.release().unwrap();
//! assert_eq!(cache.prune(), 1);
//! assert!(cache.is_empty());
//! ```
//!
//! [`RequestClient`] puts the pieces together: it turns a path and params into a
//! [`Request`](request_key::Request), runs it through a
//! [`Pipeline`](request_key::Pipeline), and acquires it from the cache using the data
//! source it was given.
//!
//! Nothing here suspends or re-renders by itself. The host decides what to do with
//! [`RequestState::Pending`], and when to call [`SubscriptionCache::prune`] (or asks the
//! cache to do it on the next tick with [`PrunePolicy::NextTick`]).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::{fmt::Arguments, future::Future};

mod cache;
mod client;
mod entry;
mod errors;
mod handle;
mod observable;
mod options;
mod scheduler;
mod state;

pub use cache::*;
pub use client::*;
pub use entry::{ListenerId, ResolvedFuture};
pub use errors::*;
pub use handle::*;
pub use observable::*;
pub use options::*;
pub use scheduler::PruneScheduler;
pub use state::*;

#[doc(hidden)]
pub fn log_warning(text: Arguments) {
    #[cfg(feature = "tracing")]
    {
        tracing::warn!("{text}");
    }
    #[cfg(not(feature = "tracing"))]
    {
        eprintln!("{text}");
    }
}

/// Calls [`Executor::spawn`](any_spawner::Executor::spawn).
pub(crate) fn spawn(task: impl Future<Output = ()> + Send + 'static) {
    any_spawner::Executor::spawn(task);
}
