// Copyright 2023 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Memoization of resource listings with per-kind expiration.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::resource::ResourceKind;
use crate::Error;

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    expires: Instant,
}

type Region = Arc<Mutex<HashMap<String, Entry>>>;

/// Cache regions, one per resource kind.
///
/// A zero expiration time disables caching for the kind.
pub struct ResourceCache {
    default_expiration: Duration,
    expirations: HashMap<ResourceKind, Duration>,
    regions: RwLock<HashMap<ResourceKind, Region>>,
}

/// Build a cache key from a method name and its arguments.
pub fn cache_key<A: Debug + ?Sized>(method: &str, arguments: &A) -> String {
    format!("{}{:?}", method, arguments)
}

impl ResourceCache {
    /// Create a cache with the default expiration and per-kind overrides.
    pub fn new(
        default_expiration: Duration,
        expirations: HashMap<ResourceKind, Duration>,
    ) -> ResourceCache {
        ResourceCache {
            default_expiration,
            expirations,
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> ResourceCache {
        ResourceCache::new(Duration::ZERO, HashMap::new())
    }

    /// Expiration time of the kind.
    pub fn expiration(&self, kind: ResourceKind) -> Duration {
        self.expirations
            .get(&kind)
            .copied()
            .unwrap_or(self.default_expiration)
    }

    async fn region(&self, kind: ResourceKind) -> Region {
        if let Some(region) = self.regions.read().await.get(&kind) {
            return Arc::clone(region);
        }

        Arc::clone(self.regions.write().await.entry(kind).or_default())
    }

    /// Return a live cached value or fetch, store and return a new one.
    ///
    /// Callers in the same region wait for each other, so a value is fetched once.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        kind: ResourceKind,
        key: &str,
        fetch: F,
    ) -> Result<T, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let expiration = self.expiration(kind);
        if expiration.is_zero() {
            return fetch().await;
        }

        let region = self.region(kind).await;
        let mut entries = region.lock().await;
        let now = Instant::now();
        if let Some(entry) = entries.get(key) {
            if entry.expires > now {
                if let Some(value) = entry.value.downcast_ref::<T>() {
                    trace!("Cache hit for {} in region {}", key, kind);
                    return Ok(value.clone());
                }
            }
        }

        trace!("Cache miss for {} in region {}", key, kind);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires > now);
        if entries.len() < before {
            trace!(
                "Dropped {} expired entries from region {}",
                before - entries.len(),
                kind
            );
        }
        let value = fetch().await?;
        let _ = entries.insert(
            key.to_string(),
            Entry {
                value: Arc::new(value.clone()),
                expires: Instant::now() + expiration,
            },
        );
        Ok(value)
    }

    /// Drop all entries of the kind.
    pub async fn invalidate(&self, kind: ResourceKind) {
        if self.regions.write().await.remove(&kind).is_some() {
            trace!("Invalidated cache region {}", kind);
        }
    }

    /// Drop all entries.
    pub async fn invalidate_all(&self) {
        self.regions.write().await.clear();
    }
}

impl Default for ResourceCache {
    fn default() -> ResourceCache {
        ResourceCache::disabled()
    }
}

impl Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("default_expiration", &self.default_expiration)
            .field("expirations", &self.expirations)
            .finish()
    }
}

#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use maplit::hashmap;

    use super::{cache_key, ResourceCache};
    use crate::resource::ResourceKind;
    use crate::{Error, ErrorKind};

    async fn fetch_counting(counter: &AtomicUsize) -> Result<Vec<String>, Error> {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![format!("item{}", n)])
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_expires() {
        let cache = ResourceCache::new(Duration::from_secs(10), HashMap::new());
        let counter = AtomicUsize::new(0);
        let key = cache_key("list_servers", &(None::<String>,));

        let first = cache
            .get_or_fetch(ResourceKind::Server, &key, || fetch_counting(&counter))
            .await
            .unwrap();
        let second = cache
            .get_or_fetch(ResourceKind::Server, &key, || fetch_counting(&counter))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        let third = cache
            .get_or_fetch(ResourceKind::Server, &key, || fetch_counting(&counter))
            .await
            .unwrap();
        assert_eq!(third, vec!["item1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_dropped() {
        let cache = ResourceCache::new(Duration::from_secs(10), HashMap::new());
        let counter = AtomicUsize::new(0);
        for key in &["a", "b"] {
            let _ = cache
                .get_or_fetch(ResourceKind::Server, key, || fetch_counting(&counter))
                .await
                .unwrap();
        }

        tokio::time::advance(Duration::from_secs(5)).await;
        let _ = cache
            .get_or_fetch(ResourceKind::Server, "c", || fetch_counting(&counter))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        let _ = cache
            .get_or_fetch(ResourceKind::Server, "d", || fetch_counting(&counter))
            .await
            .unwrap();

        let region = cache.region(ResourceKind::Server).await;
        let entries = region.lock().await;
        let mut keys: Vec<&str> = entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_disabled_kind() {
        let cache = ResourceCache::new(
            Duration::from_secs(60),
            hashmap! { ResourceKind::FloatingIp => Duration::ZERO },
        );
        let counter = AtomicUsize::new(0);
        for _ in 0..3 {
            let _ = cache
                .get_or_fetch(ResourceKind::FloatingIp, "list", || fetch_counting(&counter))
                .await
                .unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(cache.expiration(ResourceKind::Server), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = ResourceCache::new(Duration::from_secs(60), HashMap::new());
        let counter = AtomicUsize::new(0);
        let _ = cache
            .get_or_fetch(ResourceKind::Server, "list", || fetch_counting(&counter))
            .await
            .unwrap();
        let _ = cache
            .get_or_fetch(ResourceKind::Flavor, "list", || fetch_counting(&counter))
            .await
            .unwrap();
        cache.invalidate(ResourceKind::Server).await;
        let _ = cache
            .get_or_fetch(ResourceKind::Server, "list", || fetch_counting(&counter))
            .await
            .unwrap();
        let _ = cache
            .get_or_fetch(ResourceKind::Flavor, "list", || fetch_counting(&counter))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        cache.invalidate_all().await;
        let _ = cache
            .get_or_fetch(ResourceKind::Flavor, "list", || fetch_counting(&counter))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache = ResourceCache::new(Duration::from_secs(60), HashMap::new());
        let err = cache
            .get_or_fetch::<Vec<String>, _, _>(ResourceKind::Image, "list", || async {
                Err(Error::new(ErrorKind::InternalServerError, "oops"))
            })
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
        let counter = AtomicUsize::new(0);
        let _ = cache
            .get_or_fetch(ResourceKind::Image, "list", || fetch_counting(&counter))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(
            cache_key("get_server", &("abcd", true)),
            "get_server(\"abcd\", true)"
        );
    }
}
