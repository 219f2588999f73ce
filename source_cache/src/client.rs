use crate::{
    cache::SubscriptionCache, errors::RequestError, handle::Handle,
    observable::Observable,
};
use request_key::{Pipeline, Request};
use serde_json::Value;
use std::fmt::{self, Debug};

/// Opens requests against a data source, sharing subscriptions through a
/// [`SubscriptionCache`].
///
/// The source, the middleware pipeline and the cache are all passed in explicitly, so
/// independent clients (and tests) never share state by accident.
///
/// The source is any `Fn(&Request) -> Result<O, E>` where `O` is an
/// [`Observable`]. It is only called for requests whose key is not already cached.
pub struct RequestClient<T, E, S> {
    source: S,
    pipeline: Pipeline,
    cache: SubscriptionCache<T, E>,
}

impl<T, E, S> RequestClient<T, E, S> {
    /// Creates a client using [`Pipeline::standard`].
    pub fn new(source: S, cache: SubscriptionCache<T, E>) -> Self {
        Self {
            source,
            pipeline: Pipeline::standard(),
            cache,
        }
    }

    /// Replaces the middleware pipeline.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// The middleware pipeline requests pass through.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The cache this client acquires from.
    pub fn cache(&self) -> &SubscriptionCache<T, E> {
        &self.cache
    }

    /// Tears down every entry pending release. See [`SubscriptionCache::prune`].
    pub fn prune(&self) -> usize {
        self.cache.prune()
    }

    /// Builds the request for `path` and `params`, and runs it through the pipeline.
    pub fn prepare(
        &self,
        path: impl Into<String>,
        params: Value,
    ) -> Result<Request, RequestError<E>> {
        let request = Request::from_value(path, params)?;
        Ok(self.pipeline.apply(request)?)
    }
}

impl<T, E, S> RequestClient<T, E, S>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Returns a handle to the stream for `path` and `params`.
    ///
    /// `params` must be `null` or an object. The source is only opened if no equivalent
    /// request is already cached.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn request<O>(
        &self,
        path: impl Into<String>,
        params: Value,
    ) -> Result<Handle<T, E>, RequestError<E>>
    where
        S: Fn(&Request) -> Result<O, E>,
        O: Observable<T, E>,
    {
        let request = self.prepare(path, params)?;
        self.acquire(request)
    }

    /// Returns a handle for each of several requests, in order.
    ///
    /// Either every request succeeds, or none does: on the first failure, the handles
    /// acquired so far are released and the error is returned.
    pub fn request_many<O, P>(
        &self,
        requests: impl IntoIterator<Item = (P, Value)>,
    ) -> Result<Vec<Handle<T, E>>, RequestError<E>>
    where
        S: Fn(&Request) -> Result<O, E>,
        O: Observable<T, E>,
        P: Into<String>,
    {
        requests
            .into_iter()
            .map(|(path, params)| self.request(path, params))
            .collect()
    }

    /// Returns a handle for an already-built request, after running it through the
    /// pipeline.
    pub fn request_with<O>(
        &self,
        request: Request,
    ) -> Result<Handle<T, E>, RequestError<E>>
    where
        S: Fn(&Request) -> Result<O, E>,
        O: Observable<T, E>,
    {
        let request = self.pipeline.apply(request)?;
        self.acquire(request)
    }

    fn acquire<O>(
        &self,
        request: Request,
    ) -> Result<Handle<T, E>, RequestError<E>>
    where
        S: Fn(&Request) -> Result<O, E>,
        O: Observable<T, E>,
    {
        let key = request.key();
        Ok(self.cache.acquire(key, || (self.source)(&request))?)
    }
}

impl<T, E, S> Debug for RequestClient<T, E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClient")
            .field("pipeline", &self.pipeline)
            .field("cache", &self.cache)
            .finish()
    }
}
