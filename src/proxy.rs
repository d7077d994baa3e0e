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

//! Generic operations on resources.

use std::time::Duration;

use async_stream::try_stream;
use futures::pin_mut;
use futures::stream::{Stream, TryStreamExt};
use log::{debug, trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::client::{RequestBuilder, NO_PATH};
use crate::resource::{Operation, Resource, UriParams};
use crate::stream::paginated;
use crate::{Error, ErrorKind, Query, QueryItem, RawFilter, Session};

/// Default interval between polls when waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Generic CRUD operations bound to a session.
///
/// Every operation checks the resource capabilities before sending anything.
#[derive(Debug, Clone)]
pub struct Proxy {
    session: Session,
}

fn wrap_body<T: Resource, B: Serialize + ?Sized>(body: &B) -> Result<Value, Error> {
    let value = serde_json::to_value(body)?;
    Ok(match T::RESOURCE_KEY {
        Some(key) => {
            let mut map = serde_json::Map::with_capacity(1);
            let _ = map.insert(key.to_string(), value);
            Value::Object(map)
        }
        None => value,
    })
}

fn unwrap_body<T: Resource>(body: Value) -> Result<T, Error> {
    let value = match (T::RESOURCE_KEY, body) {
        (Some(key), Value::Object(mut map)) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        (_, body) => body,
    };
    serde_json::from_value(value).map_err(Error::from)
}

impl Proxy {
    /// Create a proxy for the session.
    #[inline]
    pub fn new(session: Session) -> Proxy {
        Proxy { session }
    }

    /// Session in use.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// URL of the resource collection.
    pub async fn collection_url<T: Resource>(&self, params: &UriParams) -> Result<Url, Error> {
        let path = params.render(T::BASE_PATH)?;
        self.session.get_endpoint(T::SERVICE, path).await
    }

    /// URL of one resource.
    pub async fn resource_url<T: Resource>(
        &self,
        params: &UriParams,
        id: &str,
    ) -> Result<Url, Error> {
        if id.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Empty ID for {}", T::KIND),
            ));
        }
        let mut path = params.render(T::BASE_PATH)?;
        path.push(id.to_string());
        self.session.get_endpoint(T::SERVICE, path).await
    }

    /// Start a request for the resource type.
    pub fn start<T: Resource>(&self, method: Method, url: Url) -> RequestBuilder<T::Service> {
        self.session
            .client()
            .request_service(T::SERVICE, method, url)
            .maybe_api_version(T::MICROVERSION)
    }

    /// Create a resource.
    pub async fn create<T, B>(&self, params: &UriParams, body: &B) -> Result<T, Error>
    where
        T: Resource,
        B: Serialize + ?Sized,
    {
        T::check_capability(Operation::Create)?;
        let url = self.collection_url::<T>(params).await?;
        debug!("Creating a {} at {}", T::KIND, url);
        let body = wrap_body::<T, _>(body)?;
        let result: Value = self.start::<T>(Method::POST, url).json(&body).fetch_json().await?;
        let created = unwrap_body::<T>(result)?;
        debug!("Created {} {}", T::KIND, created.id());
        Ok(created)
    }

    /// Get a resource by its ID.
    pub async fn get<T: Resource>(&self, params: &UriParams, id: &str) -> Result<T, Error> {
        T::check_capability(Operation::Fetch)?;
        let url = self.resource_url::<T>(params, id).await?;
        trace!("Fetching {} {}", T::KIND, id);
        let result: Value = self.start::<T>(Method::GET, url).fetch_json().await?;
        unwrap_body(result)
    }

    /// Find a resource by its ID or name.
    ///
    /// Fails with `TooManyItems` if several resources have the same name.
    pub async fn find<T: Resource>(
        &self,
        params: &UriParams,
        name_or_id: &str,
    ) -> Result<T, Error> {
        match self.get::<T>(params, name_or_id).await {
            Ok(found) => Ok(found),
            Err(err) if err.is_not_found() => self.find_by_name(params, name_or_id).await,
            Err(err) => Err(err),
        }
    }

    /// Find a resource by its unique name.
    pub async fn find_by_name<T: Resource>(
        &self,
        params: &UriParams,
        name: &str,
    ) -> Result<T, Error> {
        let query = Query::default().with(RawFilter::new("name", name));
        let mut found = self
            .list::<T, _>(params, &query)
            .await?
            .into_iter()
            .filter(|item| item.name() == Some(name));
        match (found.next(), found.next()) {
            (Some(item), None) => Ok(item),
            (None, _) => Err(Error::new(
                ErrorKind::ResourceNotFound,
                format!("No {} with name or ID {}", T::KIND, name),
            )),
            (Some(_), Some(_)) => Err(Error::new(
                ErrorKind::TooManyItems,
                format!("Several {} resources found with name {}", T::KIND, name),
            )),
        }
    }

    /// List resources as a lazy stream following pagination.
    pub fn list_stream<T, Q>(
        &self,
        params: &UriParams,
        query: &Query<Q>,
    ) -> impl Stream<Item = Result<T, Error>>
    where
        T: Resource,
        Q: QueryItem,
    {
        let session = self.session.clone();
        let path = params.render(T::LIST_PATH.unwrap_or(T::BASE_PATH));
        let pairs = query.to_pairs();

        try_stream! {
            T::check_capability(Operation::List)?;
            let path = path?;
            let pairs = pairs?;
            let root = session.get_endpoint(T::SERVICE, NO_PATH).await?;
            let url = crate::url::extend(root.clone(), path);
            debug!("Listing {} at {} with {:?}", T::KIND, url, pairs);
            let iter = paginated::<T>(session, root, url, pairs);
            pin_mut!(iter);
            while let Some(item) = iter.try_next().await? {
                yield item;
            }
        }
    }

    /// List all resources.
    pub async fn list<T, Q>(&self, params: &UriParams, query: &Query<Q>) -> Result<Vec<T>, Error>
    where
        T: Resource,
        Q: QueryItem,
    {
        self.list_stream::<T, Q>(params, query).try_collect().await
    }

    /// Update a resource.
    ///
    /// The body is wrapped into the resource key, if the resource has one.
    pub async fn update<T, B>(&self, params: &UriParams, id: &str, body: &B) -> Result<T, Error>
    where
        T: Resource,
        B: Serialize + ?Sized,
    {
        T::check_capability(Operation::Commit)?;
        let url = self.resource_url::<T>(params, id).await?;
        debug!("Updating {} {} with {:?}", T::KIND, id, T::COMMIT_METHOD);
        let body = serde_json::to_vec(&wrap_body::<T, _>(body)?)?;
        let result: Value = self
            .start::<T>(T::COMMIT_METHOD.into(), url)
            .header(CONTENT_TYPE, T::COMMIT_CONTENT_TYPE)
            .body(body)
            .fetch_json()
            .await?;
        unwrap_body(result)
    }

    /// Delete a resource.
    ///
    /// With `ignore_missing` a resource that does not exist is not an error.
    pub async fn delete<T: Resource>(
        &self,
        params: &UriParams,
        id: &str,
        ignore_missing: bool,
    ) -> Result<(), Error> {
        T::check_capability(Operation::Delete)?;
        let url = self.resource_url::<T>(params, id).await?;
        debug!("Deleting {} {}", T::KIND, id);
        match self.start::<T>(Method::DELETE, url).send().await {
            Ok(_) => Ok(()),
            Err(err) if ignore_missing && err.is_not_found() => {
                debug!("{} {} was already deleted", T::KIND, id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Run an action on a resource (`POST <resource>/action`).
    pub async fn action<T, B>(&self, params: &UriParams, id: &str, body: &B) -> Result<(), Error>
    where
        T: Resource,
        B: Serialize + ?Sized,
    {
        let mut url = self.resource_url::<T>(params, id).await?;
        url = crate::url::extend(url, &["action"]);
        debug!("Running an action on {} {}", T::KIND, id);
        let _ = self
            .start::<T>(Method::POST, url)
            .retry_on_conflict()
            .json(body)
            .send()
            .await?;
        Ok(())
    }

    /// Wait for a resource to reach the status.
    ///
    /// Statuses are compared case-insensitively. Reaching one of `failures` is an
    /// `OperationFailed` error, not reaching the status in time is `OperationTimedOut`.
    pub async fn wait_for_status<T: Resource>(
        &self,
        params: &UriParams,
        id: &str,
        status: &str,
        failures: &[&str],
        interval: Duration,
        timeout: Duration,
    ) -> Result<T, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.get::<T>(params, id).await?;
            let current_status = current.status().ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("The {} resource has no status", T::KIND),
                )
            })?;

            if current_status.eq_ignore_ascii_case(status) {
                debug!("{} {} reached status {}", T::KIND, id, status);
                return Ok(current);
            }

            if failures
                .iter()
                .any(|failure| current_status.eq_ignore_ascii_case(failure))
            {
                return Err(Error::new(
                    ErrorKind::OperationFailed,
                    format!(
                        "{} {} reached failure status {} while waiting for {}",
                        T::KIND,
                        id,
                        current_status,
                        status
                    ),
                ));
            }

            if Instant::now() + interval > deadline {
                return Err(Error::new(
                    ErrorKind::OperationTimedOut,
                    format!(
                        "Timeout waiting for {} {} to reach {}, current status is {}",
                        T::KIND,
                        id,
                        status,
                        current_status
                    ),
                ));
            }

            trace!(
                "Still waiting for {} {} to reach {}, current status is {}",
                T::KIND,
                id,
                status,
                current_status
            );
            sleep(interval).await;
        }
    }

    /// Wait for a resource to disappear.
    pub async fn wait_for_delete<T: Resource>(
        &self,
        params: &UriParams,
        id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.get::<T>(params, id).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!("{} {} was deleted", T::KIND, id);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }

            if Instant::now() + interval > deadline {
                return Err(Error::new(
                    ErrorKind::OperationTimedOut,
                    format!("Timeout waiting for {} {} to be deleted", T::KIND, id),
                ));
            }
            sleep(interval).await;
        }
    }
}

#[cfg(test)]
pub mod test {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::{unwrap_body, wrap_body, Proxy};
    use crate::resource::{Capabilities, Resource, ResourceKind, UriParams};
    use crate::services::{GenericService, NETWORK};
    use crate::session::test::new_session;
    use crate::ErrorKind;

    #[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
    struct Thing {
        id: String,
        name: Option<String>,
    }

    impl Resource for Thing {
        type Service = GenericService;
        const SERVICE: GenericService = NETWORK;
        const KIND: ResourceKind = ResourceKind::Network;
        const BASE_PATH: &'static str = "things";
        const RESOURCE_KEY: Option<&'static str> = Some("thing");
        const RESOURCES_KEY: &'static str = "things";
        const CAPABILITIES: Capabilities = Capabilities::READ_ONLY;

        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }
    }

    #[test]
    fn test_wrap_unwrap() {
        let body = wrap_body::<Thing, _>(&json!({"name": "x"})).unwrap();
        assert_eq!(body, json!({"thing": {"name": "x"}}));
        let thing: Thing = unwrap_body(json!({"thing": {"id": "1", "name": "x"}})).unwrap();
        assert_eq!(thing.id, "1");
        let thing: Thing = unwrap_body(json!({"id": "2"})).unwrap();
        assert_eq!(thing.id, "2");
    }

    #[tokio::test]
    async fn test_capabilities_enforced() {
        // The endpoint is never contacted.
        let session = new_session("http://127.0.0.1:1/").await;
        let proxy = Proxy::new(session);
        let err = proxy
            .create::<Thing, _>(&UriParams::new(), &json!({}))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = proxy
            .delete::<Thing>(&UriParams::new(), "1", true)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = proxy
            .update::<Thing, _>(&UriParams::new(), "1", &json!({}))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
