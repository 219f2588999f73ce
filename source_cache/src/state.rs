/// The resolution state of a cached request, as seen by a consumer.
///
/// A host that renders asynchronously reacts to [`RequestState::Pending`] by suspending
/// (for example by awaiting [`Handle::resolved`](crate::Handle::resolved)) and renders once
/// the state is [`Resolved`](RequestState::Resolved) or [`Failed`](RequestState::Failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState<T, E> {
    /// The source has not emitted anything yet.
    Pending,
    /// The most recent value emitted by the source.
    Resolved(T),
    /// The source emitted an error. Any earlier value is still available from
    /// [`Handle::last_value`](crate::Handle::last_value).
    Failed(E),
}

impl<T, E> RequestState<T, E> {
    /// Whether nothing has been emitted yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            RequestState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// The error, if the source failed.
    pub fn error(&self) -> Option<&E> {
        match self {
            RequestState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Converts into a `Result`, or `None` while pending.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            RequestState::Pending => None,
            RequestState::Resolved(value) => Some(Ok(value)),
            RequestState::Failed(error) => Some(Err(error)),
        }
    }
}

/// A single notification fanned out to the consumers of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission<T, E> {
    /// The source produced a value.
    Next(T),
    /// The source failed. No further values follow.
    Error(E),
}

/// Bookkeeping for a single cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    /// The number of live handles sharing the entry.
    pub ref_count: usize,
    /// Whether the entry has no handles and is waiting to be pruned.
    pub pending_release: bool,
}
