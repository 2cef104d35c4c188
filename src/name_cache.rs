//! Tokio-backed display-name cache.
//!
//! Lookups run as spawned tasks. Each finished lookup is cached and posted
//! back to the anti-spam actor as [`AntispamEvent::NameResolved`] through a
//! weak sender, so an outstanding lookup never keeps the actor alive. The
//! registry releases every request it issued; releasing aborts a task that
//! has not finished yet.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::actor::AntispamEvent;
use crate::antispam::{NameCache, NameResolution, RequestId, SourceId};

/// Source of display names (a web service, a legacy name cache, ...).
#[async_trait]
pub trait NameResolver: Send + Sync + 'static {
    async fn resolve(&self, id: SourceId) -> Option<String>;
}

/// [`NameCache`] that resolves misses on the Tokio runtime.
pub struct AsyncNameCache<R: NameResolver> {
    resolver: Arc<R>,
    names: Arc<DashMap<SourceId, String>>,
    inflight: DashMap<RequestId, AbortHandle>,
    events: mpsc::WeakSender<AntispamEvent>,
}

impl<R: NameResolver> AsyncNameCache<R> {
    pub fn new(resolver: Arc<R>, events: mpsc::WeakSender<AntispamEvent>) -> Self {
        Self {
            resolver,
            names: Arc::new(DashMap::new()),
            inflight: DashMap::new(),
            events,
        }
    }

    /// Seed the cache with a known name.
    pub fn remember(&self, id: SourceId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Lookups started and not yet released.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }
}

impl<R: NameResolver> NameCache for AsyncNameCache<R> {
    fn cached_name(&self, id: &SourceId) -> Option<String> {
        self.names.get(id).map(|name| name.value().clone())
    }

    fn request_name(&self, id: SourceId, request: RequestId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(id = %id, request = %request, "no Tokio runtime; name lookup skipped");
            return;
        };

        let resolver = Arc::clone(&self.resolver);
        let names = Arc::clone(&self.names);
        let events = self.events.clone();
        let task = runtime.spawn(async move {
            let name = resolver.resolve(id).await;
            if let Some(name) = &name {
                names.insert(id, name.clone());
            }
            let Some(tx) = events.upgrade() else {
                debug!(id = %id, "anti-spam actor gone; dropping name resolution");
                return;
            };
            let _ = tx
                .send(AntispamEvent::NameResolved(NameResolution { id, name, request }))
                .await;
        });
        self.inflight.insert(request, task.abort_handle());
    }

    fn release(&self, request: RequestId) {
        if let Some((_, handle)) = self.inflight.remove(&request) {
            handle.abort();
        }
    }
}

/// In-memory resolver with optional simulated latency.
#[derive(Debug, Default)]
pub struct DirectoryResolver {
    names: DashMap<SourceId, String>,
    latency: Duration,
}

impl DirectoryResolver {
    pub fn new(latency: Duration) -> Self {
        Self {
            names: DashMap::new(),
            latency,
        }
    }

    pub fn insert(&self, id: SourceId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }
}

#[async_trait]
impl NameResolver for DirectoryResolver {
    async fn resolve(&self, id: SourceId) -> Option<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.names.get(&id).map(|name| name.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn resolved_names_are_posted_and_cached() {
        let (tx, mut rx) = mpsc::channel(8);
        let resolver = Arc::new(DirectoryResolver::default());
        let id = Uuid::new_v4();
        resolver.insert(id, "Jane Resident");

        let cache = AsyncNameCache::new(resolver, tx.downgrade());
        let request = Uuid::new_v4();
        cache.request_name(id, request);

        match rx.recv().await {
            Some(AntispamEvent::NameResolved(resolution)) => {
                assert_eq!(resolution.id, id);
                assert_eq!(resolution.request, request);
                assert_eq!(resolution.name.as_deref(), Some("Jane Resident"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(cache.cached_name(&id).as_deref(), Some("Jane Resident"));

        cache.release(request);
        assert_eq!(cache.inflight(), 0);
    }

    #[tokio::test]
    async fn released_lookup_never_reports() {
        let (tx, mut rx) = mpsc::channel(8);
        let resolver = Arc::new(DirectoryResolver::new(Duration::from_secs(3600)));
        let cache = AsyncNameCache::new(resolver, tx.downgrade());

        let request = Uuid::new_v4();
        cache.request_name(Uuid::new_v4(), request);
        assert_eq!(cache.inflight(), 1);
        cache.release(request);
        assert_eq!(cache.inflight(), 0);

        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn remembered_names_are_cached() {
        let (tx, _rx) = mpsc::channel(1);
        let cache = AsyncNameCache::new(Arc::new(DirectoryResolver::default()), tx.downgrade());
        let id = Uuid::new_v4();
        assert!(cache.cached_name(&id).is_none());
        cache.remember(id, "Bob");
        assert_eq!(cache.cached_name(&id).as_deref(), Some("Bob"));
    }

    #[test]
    fn request_without_runtime_is_skipped() {
        let (tx, _rx) = mpsc::channel(1);
        let cache = AsyncNameCache::new(Arc::new(DirectoryResolver::default()), tx.downgrade());
        cache.request_name(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(cache.inflight(), 0);
    }
}
