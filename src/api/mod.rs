//! Typed client for the catalog REST API.
//!
//! Reads go through the [`cache::QueryCache`]: identical concurrent reads
//! share one transport call, and results stay cached until a mutation
//! invalidates one of their tags. Writes always hit the transport and, on
//! success, invalidate the tags listed in [`tags::Endpoint::invalidates`].

pub mod books;
pub mod borrows;
pub mod cache;
pub mod tags;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::{
    config::{self, AppConfig, CacheConfig},
    error::{AppError, AppResult},
};

use self::cache::{Lookup, Outcome, QueryCache, QueryKey};
use self::tags::{Endpoint, Tag};
use self::transport::{ApiRequest, HttpTransport, Transport};

/// Cheap to clone; clones share the transport and the cache
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    cache: QueryCache,
}

/// A read: which endpoint, which resource id (for tags), which request
#[derive(Debug, Clone)]
pub(crate) struct QueryDef {
    endpoint: Endpoint,
    id: Option<String>,
    request: ApiRequest,
}

impl QueryDef {
    pub(crate) fn new(endpoint: Endpoint, id: Option<&str>, request: ApiRequest) -> Self {
        Self {
            endpoint,
            id: id.map(str::to_string),
            request,
        }
    }

    fn key(&self) -> QueryKey {
        QueryKey::new(self.endpoint, self.request.signature())
    }

    fn tags(&self) -> Vec<Tag> {
        self.endpoint.provides(self.id.as_deref())
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, cache: &CacheConfig) -> Self {
        Self {
            transport,
            cache: QueryCache::new(cache.keep_unused()),
        }
    }

    /// HTTP client against the process-wide base URL
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let transport = HttpTransport::new(config::base_url(&config.api), config.api.timeout())?;
        Ok(Self::new(Arc::new(transport), &config.cache))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Serve a read from cache, an in-flight fetch, or a new fetch
    async fn run_query(&self, def: &QueryDef) -> AppResult<Value> {
        let key = def.key();
        match self.cache.lookup(&key, &def.tags()) {
            Lookup::Fresh(value) => Ok(value),
            Lookup::Join(receiver) => wait_for(receiver).await,
            Lookup::Fetch(id, receiver) => {
                // The fetch outlives a caller that stops waiting, so the
                // result still reaches the cache and the other waiters
                let transport = Arc::clone(&self.transport);
                let cache = self.cache.clone();
                let request = def.request.clone();
                tokio::spawn(async move {
                    let outcome = execute(transport.as_ref(), request).await;
                    cache.complete(&key, id, outcome);
                });
                wait_for(receiver).await
            }
        }
    }

    pub(crate) async fn query<T: DeserializeOwned>(&self, def: QueryDef) -> AppResult<T> {
        decode(self.run_query(&def).await?)
    }

    /// Run a write and invalidate its tags on success
    pub(crate) async fn mutate(&self, endpoint: Endpoint, id: Option<&str>, request: ApiRequest) -> AppResult<Value> {
        let value = execute(self.transport.as_ref(), request).await?;
        let tags = endpoint.invalidates(id);
        self.cache.invalidate(&tags);
        tracing::info!("{} succeeded", endpoint);
        Ok(value)
    }

    pub(crate) fn subscribe<T>(&self, def: QueryDef, extract: fn(Value) -> AppResult<T>) -> QuerySubscription<T> {
        let version = self.cache.subscribe(&def.key(), &def.tags());
        QuerySubscription {
            client: self.clone(),
            def,
            version,
            extract,
        }
    }
}

/// A live consumer of one cached read.
///
/// While it exists the entry is kept; [`QuerySubscription::invalidated`]
/// resolves when a mutation marks the entry stale, after which
/// [`QuerySubscription::current`] refetches.
pub struct QuerySubscription<T> {
    client: ApiClient,
    def: QueryDef,
    version: watch::Receiver<u64>,
    extract: fn(Value) -> AppResult<T>,
}

impl<T> QuerySubscription<T> {
    /// Current value, refetched first if stale or not yet loaded
    pub async fn current(&mut self) -> AppResult<T> {
        let _ = self.version.borrow_and_update();
        let value = self.client.run_query(&self.def).await?;
        (self.extract)(value)
    }

    /// Wait until the entry is invalidated
    pub async fn invalidated(&mut self) -> AppResult<()> {
        self.version
            .changed()
            .await
            .map_err(|_| AppError::Transport("cache entry was dropped".to_string()))
    }

    pub fn is_stale(&self) -> bool {
        self.client.cache.is_stale(&self.def.key()).unwrap_or(true)
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.client.cache.release(&self.def.key());
    }
}

/// Send one request and turn the response into a JSON value or an error
async fn execute(transport: &dyn Transport, request: ApiRequest) -> Outcome {
    let signature = request.signature();
    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("{} failed: {}", signature, e);
            return Err(e);
        }
    };

    if !response.is_success() {
        let error = AppError::from_response(response.status, &response.body);
        tracing::warn!("{} failed: {}", signature, error);
        return Err(error);
    }

    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body)
        .map_err(|e| AppError::Decode(format!("{}: {}", signature, e)))
}

async fn wait_for(mut receiver: broadcast::Receiver<Outcome>) -> Outcome {
    receiver
        .recv()
        .await
        .map_err(|_| AppError::Transport("request ended without a response".to_string()))?
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::Decode(e.to_string()))
}
