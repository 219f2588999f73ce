#![allow(dead_code)]

use source_cache::{SourceObserver, Unsubscribe};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// The observable a [`Probe`] opens.
pub type ProbeSource =
    Box<dyn FnOnce(SourceObserver<u32, String>) -> Unsubscribe + Send>;

/// A hand-driven source that counts how often it is opened and torn down.
#[derive(Clone, Default)]
pub struct Probe {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    observers: Arc<Mutex<Vec<SourceObserver<u32, String>>>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the source; meant to be called from an `acquire` factory.
    pub fn open(&self) -> Result<ProbeSource, String> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let observers = Arc::clone(&self.observers);
        let closed = Arc::clone(&self.closed);
        Ok(Box::new(move |observer: SourceObserver<u32, String>| {
            observers.lock().unwrap().push(observer);
            Unsubscribe::new(move || {
                closed.fetch_add(1, Ordering::SeqCst);
            })
        }))
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn next(&self, value: u32) {
        for observer in self.observers.lock().unwrap().iter() {
            observer.next(value);
        }
    }

    pub fn error(&self, error: &str) {
        for observer in self.observers.lock().unwrap().iter() {
            observer.error(error.to_string());
        }
    }
}
