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

//! High-level cloud API returning normalized documents.
//!
//! The [Cloud](struct.Cloud.html) object combines the per-service proxies with a cache of
//! listings, a normalizer and a task manager:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), oscloud::Error> {
//! let cloud = oscloud::Cloud::from_env().await?;
//! for server in cloud.search_servers(Some("web-*"), None).await? {
//!     println!("{} {:?}", server.name, server.interface_ip);
//! }
//! # Ok(()) }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use glob::Pattern;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::auth_from_env;
use crate::memoize::{cache_key, ResourceCache};
use crate::normalize::Normalizer;
use crate::object_store::ObjectStoreProxy;
use crate::resource::ResourceKind;
use crate::resources::block_storage::BlockStorageProxy;
use crate::resources::compute::ComputeProxy;
use crate::resources::identity::IdentityProxy;
use crate::resources::image::ImageProxy;
use crate::resources::network::NetworkProxy;
use crate::task::TaskManager;
use crate::{CloudConfig, Error, ErrorKind, Session};

mod compute;
mod floating_ips;
mod identity;
mod network;
mod objects;
mod security_groups;
mod storage;

pub use self::compute::ServerOptions;
pub use self::floating_ips::select_nat_port;
pub use self::security_groups::SecurityGroupRuleOptions;

/// Default timeout for waiting operations.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(180);

/// A cloud connection with a high-level API.
#[derive(Debug, Clone)]
pub struct Cloud {
    session: Session,
    config: CloudConfig,
    compute: ComputeProxy,
    network: NetworkProxy,
    identity: IdentityProxy,
    image: ImageProxy,
    block_storage: BlockStorageProxy,
    object_store: ObjectStoreProxy,
    tasks: TaskManager,
    cache: Arc<ResourceCache>,
    normalizer: Normalizer,
}

impl Cloud {
    /// Create a cloud object from a session and a configuration.
    ///
    /// Queries the authentication scope to build resource locations.
    pub async fn new(session: Session, config: CloudConfig) -> Result<Cloud, Error> {
        let scope = session.scope().await?;
        let location =
            Normalizer::current_location(config.name.clone(), config.region.clone(), &scope);
        let tasks = TaskManager::new(
            config.name.clone().unwrap_or_else(|| "oscloud".into()),
            config.max_concurrency,
        );
        let cache = ResourceCache::new(config.cache_expiration, config.cache_expirations.clone());
        debug!(
            "Created cloud {:?} in region {:?}",
            config.name, config.region
        );
        Ok(Cloud {
            compute: ComputeProxy::new(session.clone()),
            network: NetworkProxy::new(session.clone()),
            identity: IdentityProxy::new(session.clone()),
            image: ImageProxy::new(session.clone()),
            block_storage: BlockStorageProxy::new(session.clone()),
            object_store: ObjectStoreProxy::new(session.clone(), tasks.clone()),
            normalizer: Normalizer::new(config.strict, location),
            cache: Arc::new(cache),
            tasks,
            session,
            config,
        })
    }

    /// Create a cloud object from `OS_*` environment variables.
    pub async fn from_env() -> Result<Cloud, Error> {
        let config = CloudConfig::from_env()?;
        let auth = auth_from_env()?;
        let session = config.create_shared_session(auth).await?;
        Cloud::new(session, config).await
    }

    /// Session in use.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Configuration in use.
    #[inline]
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Compute proxy.
    #[inline]
    pub fn compute(&self) -> &ComputeProxy {
        &self.compute
    }

    /// Network proxy.
    #[inline]
    pub fn network(&self) -> &NetworkProxy {
        &self.network
    }

    /// Identity proxy.
    #[inline]
    pub fn identity(&self) -> &IdentityProxy {
        &self.identity
    }

    /// Image proxy.
    #[inline]
    pub fn image(&self) -> &ImageProxy {
        &self.image
    }

    /// Block storage proxy.
    #[inline]
    pub fn block_storage(&self) -> &BlockStorageProxy {
        &self.block_storage
    }

    /// Object storage proxy.
    #[inline]
    pub fn object_store(&self) -> &ObjectStoreProxy {
        &self.object_store
    }

    /// Task manager running background work.
    #[inline]
    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Cache of listings.
    #[inline]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Normalizer of resources.
    #[inline]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    async fn cached<T, F, Fut>(
        &self,
        kind: ResourceKind,
        method: &str,
        fetch: F,
    ) -> Result<T, Error>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let key = cache_key(method, &());
        self.cache
            .get_or_fetch(kind, &key, || self.tasks.submit_task(method, fetch()))
            .await
    }

    async fn invalidate(&self, kinds: &[ResourceKind]) {
        for kind in kinds {
            self.cache.invalidate(*kind).await;
        }
    }
}

fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::Object(actual)), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| value_matches(actual.get(key), value)),
        (Some(actual), expected) => actual == expected,
        (None, Value::Null) => true,
        (None, _) => false,
    }
}

/// How a document matches the requested name or ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameMatch {
    None,
    Glob,
    Exact,
}

fn match_name_or_id(
    item: &Map<String, Value>,
    name_or_id: &str,
    pattern: Option<&Pattern>,
) -> NameMatch {
    let values = ["id", "name"].iter().filter_map(|key| match item.get(*key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    });
    let mut result = NameMatch::None;
    for value in values {
        if value == name_or_id {
            return NameMatch::Exact;
        }
        if pattern.map(|p| p.matches(value)).unwrap_or(false) {
            result = NameMatch::Glob;
        }
    }
    result
}

/// Filter a list of documents by name or ID and by field values.
///
/// `name_or_id` is matched exactly or as a shell glob against both `id` and `name`. When some
/// documents match exactly, only they are returned. A value that is not a valid glob is only
/// matched exactly. Every filter must match the serialized document, objects are matched
/// recursively.
pub fn filter_list<T: Serialize + Clone>(
    items: &[T],
    name_or_id: Option<&str>,
    filters: Option<&Map<String, Value>>,
) -> Result<Vec<T>, Error> {
    let pattern = match name_or_id.map(Pattern::new) {
        Some(Ok(pattern)) => Some(pattern),
        Some(Err(e)) => {
            debug!("{:?} is not a valid glob ({}), matching it exactly", name_or_id, e);
            None
        }
        None => None,
    };

    let mut exact = Vec::new();
    let mut globbed = Vec::new();
    for item in items {
        let serialized = match serde_json::to_value(item)? {
            Value::Object(map) => map,
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Only objects can be filtered",
                ))
            }
        };

        let matched = match name_or_id {
            Some(name_or_id) => match_name_or_id(&serialized, name_or_id, pattern.as_ref()),
            None => NameMatch::Exact,
        };
        if matched == NameMatch::None {
            continue;
        }

        if let Some(filters) = filters {
            if !filters
                .iter()
                .all(|(key, value)| value_matches(serialized.get(key), value))
            {
                continue;
            }
        }

        if matched == NameMatch::Exact {
            exact.push(item.clone());
        } else {
            globbed.push(item.clone());
        }
    }

    Ok(if exact.is_empty() { globbed } else { exact })
}

/// Pick the only item of a search result.
///
/// Fails with `TooManyItems` when more than one item matched.
pub fn get_entity<T>(mut items: Vec<T>, name_or_id: &str) -> Result<Option<T>, Error> {
    match items.len() {
        0 => Ok(None),
        1 => Ok(items.pop()),
        count => Err(Error::new(
            ErrorKind::TooManyItems,
            format!("{} resources match {}", count, name_or_id),
        )),
    }
}

#[cfg(test)]
pub mod test {
    use serde::Serialize;
    use serde_json::json;

    use super::{filter_list, get_entity};
    use crate::ErrorKind;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct Item {
        id: String,
        name: String,
        status: String,
        location: serde_json::Value,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: "1".into(),
                name: "web-1".into(),
                status: "ACTIVE".into(),
                location: json!({"zone": "az1", "project": {"id": "p1"}}),
            },
            Item {
                id: "2".into(),
                name: "web-2".into(),
                status: "ERROR".into(),
                location: json!({"zone": "az2", "project": {"id": "p1"}}),
            },
            Item {
                id: "3".into(),
                name: "db".into(),
                status: "ACTIVE".into(),
                location: json!({"zone": "az1", "project": {"id": "p2"}}),
            },
        ]
    }

    #[test]
    fn test_filter_by_name_or_id() {
        assert_eq!(filter_list(&items(), None, None).unwrap().len(), 3);
        let result = filter_list(&items(), Some("db"), None).unwrap();
        assert_eq!(result[0].id, "3");
        let result = filter_list(&items(), Some("2"), None).unwrap();
        assert_eq!(result[0].name, "web-2");
        let result = filter_list(&items(), Some("web-*"), None).unwrap();
        assert_eq!(result.len(), 2);
        assert!(filter_list(&items(), Some("nope"), None).unwrap().is_empty());
    }

    #[test]
    fn test_filter_by_fields() {
        let filters = json!({"status": "ACTIVE"}).as_object().cloned().unwrap();
        let result = filter_list(&items(), None, Some(&filters)).unwrap();
        assert_eq!(result.len(), 2);

        let filters = json!({"location": {"project": {"id": "p1"}}, "status": "ACTIVE"})
            .as_object()
            .cloned()
            .unwrap();
        let result = filter_list(&items(), Some("web-*"), Some(&filters)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "1");

        let filters = json!({"missing": "value"}).as_object().cloned().unwrap();
        assert!(filter_list(&items(), None, Some(&filters))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_filter_invalid_pattern_matches_exactly() {
        let mut items = items();
        items[2].name = "web-[".into();
        let result = filter_list(&items, Some("web-["), None).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "3");
        assert!(filter_list(&items, Some("db-["), None).unwrap().is_empty());
    }

    #[test]
    fn test_filter_prefers_exact_match() {
        let mut items = items();
        items[0].name = "db*".into();
        items[1].name = "db1".into();
        let result = filter_list(&items, Some("db*"), None).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "1");
        assert_eq!(
            get_entity(result, "db*").unwrap().map(|item| item.id),
            Some("1".to_string())
        );

        // Without an exact match every glob match is returned.
        let result = filter_list(&items, Some("db?"), None).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_get_entity() {
        assert_eq!(get_entity(Vec::<u8>::new(), "x").unwrap(), None);
        assert_eq!(get_entity(vec![1], "x").unwrap(), Some(1));
        let err = get_entity(vec![1, 2], "x").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::TooManyItems);
    }
}
