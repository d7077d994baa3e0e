// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Session structure definition.

use std::sync::Arc;

use log::trace;
use reqwest::{Client, Method, Url};

use crate::cache::EndpointCache;
use crate::client::{AuthenticatedClient, RequestBuilder};
use crate::protocol::ServiceInfo;
use crate::services::ServiceType;
use crate::url;
use crate::{ApiVersion, AuthScope, AuthType, EndpointFilters, Error, RetryPolicy};

/// An OpenStack API session.
///
/// The session object serves as a wrapper around an [authentication type](trait.AuthType.html),
/// providing convenient methods to make HTTP requests and work with microversions.
///
/// # Note
///
/// All clones of one session share the same authentication and endpoint cache. Changing
/// endpoint filters or overrides detaches the endpoint cache of this session.
#[derive(Debug, Clone)]
pub struct Session {
    client: AuthenticatedClient,
    endpoint_cache: Arc<EndpointCache>,
}

impl Session {
    /// Create a new session with a given authentication plugin.
    ///
    /// Authenticates immediately.
    pub async fn new<Auth: AuthType + 'static>(auth_type: Auth) -> Result<Session, Error> {
        Session::new_with_client(Client::new(), auth_type).await
    }

    /// Create a new session with a given authentication plugin and an HTTP client.
    pub async fn new_with_client<Auth: AuthType + 'static>(
        client: Client,
        auth_type: Auth,
    ) -> Result<Session, Error> {
        let client = AuthenticatedClient::new(client, auth_type).await?;
        Ok(Session::new_with_authenticated_client(client))
    }

    /// Create a new session from an already authenticated client.
    #[inline]
    pub fn new_with_authenticated_client(client: AuthenticatedClient) -> Session {
        Session {
            client,
            endpoint_cache: Arc::new(EndpointCache::default()),
        }
    }

    pub(crate) async fn new_shared(
        client: Client,
        auth_type: Arc<dyn AuthType>,
    ) -> Result<Session, Error> {
        auth_type.refresh(&client).await?;
        Ok(Session::new_with_authenticated_client(
            AuthenticatedClient::new_internal(client, auth_type),
        ))
    }

    /// Create a `Session` from `OS_*` environment variables.
    #[inline]
    pub async fn from_env() -> Result<Session, Error> {
        crate::config::from_env().await
    }

    /// Get a reference to the authentication type in use.
    #[inline]
    pub fn auth_type(&self) -> &dyn AuthType {
        self.client.auth_type()
    }

    /// Get a reference to the authenticated client.
    #[inline]
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Endpoint filters in use.
    #[inline]
    pub fn endpoint_filters(&self) -> &EndpointFilters {
        &self.endpoint_cache.filters
    }

    /// Modify endpoint filters.
    ///
    /// This call clears the endpoint cache of this `Session` (but not its clones).
    pub fn endpoint_filters_mut(&mut self) -> &mut EndpointFilters {
        let cache = Arc::make_mut(&mut self.endpoint_cache);
        cache.clear();
        &mut cache.filters
    }

    /// Set endpoint filters.
    #[inline]
    pub fn set_endpoint_filters(&mut self, filters: EndpointFilters) {
        *self.endpoint_filters_mut() = filters;
    }

    /// Convert this session into one using the given endpoint filters.
    #[inline]
    pub fn with_endpoint_filters(mut self, filters: EndpointFilters) -> Session {
        self.set_endpoint_filters(filters);
        self
    }

    /// Use the given URL for the service type instead of the catalog.
    #[inline]
    pub fn set_endpoint_override<S: Into<String>>(&mut self, service_type: S, url: Url) {
        Arc::make_mut(&mut self.endpoint_cache).set_override(service_type, url);
    }

    /// Convert this session into one using the given endpoint override.
    #[inline]
    pub fn with_endpoint_override<S: Into<String>>(mut self, service_type: S, url: Url) -> Session {
        self.set_endpoint_override(service_type, url);
        self
    }

    /// Retry policy of this session.
    #[inline]
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.client.retry_policy()
    }

    /// Set the retry policy for all requests made with this session.
    #[inline]
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.client.set_retry_policy(policy);
    }

    /// Convert this session into one using the given retry policy.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Session {
        self.set_retry_policy(policy);
        self
    }

    /// Update the authentication and purge the endpoint cache.
    ///
    /// # Warning
    ///
    /// Authentication will also be updated for clones of this `Session`, since they share the same
    /// authentication object.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        Arc::make_mut(&mut self.endpoint_cache).clear();
        self.client.refresh().await
    }

    /// Set a new authentication for this `Session`.
    ///
    /// This call clears the endpoint cache for this `Session`.
    /// It does not, however, affect clones of this `Session`.
    pub fn set_auth_type<Auth: AuthType + 'static>(&mut self, auth_type: Auth) {
        Arc::make_mut(&mut self.endpoint_cache).clear();
        self.client.set_auth_type(auth_type);
    }

    /// Project and user the session is authenticated for.
    #[inline]
    pub async fn scope(&self) -> Result<AuthScope, Error> {
        self.client.scope().await
    }

    /// Get minimum/maximum API (micro)version information.
    ///
    /// Returns `None` if the range cannot be determined, which usually means
    /// that microversioning is not supported.
    ///
    /// ```rust,no_run
    /// # async fn example() -> Result<(), oscloud::Error> {
    /// let session = oscloud::Session::from_env().await?;
    /// if let Some((min, max)) = session.get_api_versions(oscloud::services::COMPUTE).await? {
    ///     println!("The compute service supports versions {} to {}", min, max);
    /// } else {
    ///     println!("The compute service does not support microversioning");
    /// }
    /// # Ok(()) }
    /// ```
    pub async fn get_api_versions<Srv: ServiceType>(
        &self,
        service: Srv,
    ) -> Result<Option<(ApiVersion, ApiVersion)>, Error> {
        self.extract_service_info(service, |info| {
            match (info.minimum_version, info.current_version) {
                (Some(min), Some(max)) => Some((min, max)),
                _ => None,
            }
        })
        .await
    }

    /// Construct an endpoint for the given service from the path.
    ///
    /// You won't need to use this call most of the time, since all request calls can fetch the
    /// endpoint automatically.
    pub async fn get_endpoint<Srv, I>(&self, service: Srv, path: I) -> Result<Url, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let endpoint = self
            .extract_service_info(service, |info| info.root_url.clone())
            .await?;
        Ok(url::extend(endpoint, path))
    }

    /// Get the currently used major version from the given service.
    ///
    /// Can return `None` if the service does not support API version discovery at all.
    pub async fn get_major_version<Srv: ServiceType>(
        &self,
        service: Srv,
    ) -> Result<Option<ApiVersion>, Error> {
        self.extract_service_info(service, |info| info.major_version)
            .await
    }

    /// Pick the highest API version supported by the service.
    ///
    /// Returns `None` if none of the requested versions are available.
    ///
    /// ```rust,no_run
    /// # async fn example() -> Result<(), oscloud::Error> {
    /// let session = oscloud::Session::from_env().await?;
    /// let candidates = [oscloud::ApiVersion(2, 1), oscloud::ApiVersion(2, 42)];
    /// let maybe_version = session
    ///     .pick_api_version(oscloud::services::COMPUTE, candidates)
    ///     .await?;
    ///
    /// let mut request = session.get(oscloud::services::COMPUTE, &["servers"]).await?;
    /// if let Some(version) = maybe_version {
    ///     println!("Using version {}", version);
    ///     request = request.api_version(version);
    /// }
    /// let response = request.send().await?;
    /// # Ok(()) }
    /// ```
    pub async fn pick_api_version<Srv, I>(
        &self,
        service: Srv,
        versions: I,
    ) -> Result<Option<ApiVersion>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator<Item = ApiVersion>,
        I::IntoIter: Send,
    {
        let mut versions = versions.into_iter().peekable();
        if versions.peek().is_none() {
            return Ok(None);
        }

        self.extract_service_info(service, move |info| {
            versions.filter(|item| info.supports_api_version(*item)).max()
        })
        .await
    }

    /// Check if the service supports the API version.
    pub async fn supports_api_version<Srv: ServiceType>(
        &self,
        service: Srv,
        version: ApiVersion,
    ) -> Result<bool, Error> {
        self.extract_service_info(service, |info| info.supports_api_version(version))
            .await
    }

    /// Make an HTTP request to the given service.
    ///
    /// The `service` argument is an object implementing the
    /// [ServiceType](services/trait.ServiceType.html) trait. Some known service types are available
    /// in the [services](services/index.html) module.
    ///
    /// The `path` argument is a URL path without the service endpoint (e.g. `/servers/1234`).
    ///
    /// The result is a `RequestBuilder` that can be customized further, e.g. with an API version
    /// or a query.
    ///
    /// ```rust,no_run
    /// use reqwest::Method;
    ///
    /// # async fn example() -> Result<(), oscloud::Error> {
    /// let session = oscloud::Session::from_env().await?;
    /// let response = session
    ///     .request(oscloud::services::COMPUTE, Method::HEAD, &["servers", "1234"])
    ///     .await?
    ///     .send()
    ///     .await?;
    /// println!("Response: {:?}", response);
    /// # Ok(()) }
    /// ```
    ///
    /// This is the most generic call to make a request. You may prefer to use more specific `get`,
    /// `post`, `put` or `delete` calls instead.
    pub async fn request<Srv, I>(
        &self,
        service: Srv,
        method: Method,
        path: I,
    ) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let url = self.get_endpoint(service, path).await?;
        trace!(
            "Starting {} request to {} for service {}",
            method,
            url,
            service.catalog_type()
        );
        Ok(self.client.request_service(service, method, url))
    }

    /// Start a GET request.
    #[inline]
    pub async fn get<Srv, I>(&self, service: Srv, path: I) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(service, Method::GET, path).await
    }

    /// Start a HEAD request.
    #[inline]
    pub async fn head<Srv, I>(&self, service: Srv, path: I) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(service, Method::HEAD, path).await
    }

    /// Start a POST request.
    #[inline]
    pub async fn post<Srv, I>(&self, service: Srv, path: I) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(service, Method::POST, path).await
    }

    /// Start a PUT request.
    #[inline]
    pub async fn put<Srv, I>(&self, service: Srv, path: I) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(service, Method::PUT, path).await
    }

    /// Start a PATCH request.
    #[inline]
    pub async fn patch<Srv, I>(&self, service: Srv, path: I) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(service, Method::PATCH, path).await
    }

    /// Start a DELETE request.
    #[inline]
    pub async fn delete<Srv, I>(&self, service: Srv, path: I) -> Result<RequestBuilder<Srv>, Error>
    where
        Srv: ServiceType,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(service, Method::DELETE, path).await
    }

    /// Whether the service is present in the catalog (or overridden).
    ///
    /// Discovery failures other than a missing endpoint are returned as errors.
    pub async fn has_service<Srv: ServiceType>(&self, service: Srv) -> Result<bool, Error> {
        match self.extract_service_info(service, |_| ()).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == crate::ErrorKind::EndpointNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[inline]
    async fn extract_service_info<Srv, F, T>(&self, service: Srv, filter: F) -> Result<T, Error>
    where
        Srv: ServiceType,
        F: FnOnce(&ServiceInfo) -> T + Send,
        T: Send,
    {
        self.endpoint_cache
            .extract_service_info(&self.client, service, filter)
            .await
    }

    #[cfg(test)]
    pub(crate) fn cache_fake_service(&mut self, service_type: &'static str, info: ServiceInfo) {
        let cache = Arc::make_mut(&mut self.endpoint_cache);
        take_mut::take(cache, |cache| cache.with_info(service_type, info));
    }
}

#[cfg(test)]
pub(crate) mod test {
    use reqwest::Url;

    use crate::client::AuthenticatedClient;
    use crate::protocol::ServiceInfo;
    use crate::services::{COMPUTE, NETWORK};
    use crate::{ApiVersion, EndpointFilters, InterfaceType};

    use super::Session;

    pub const URL: &str = "http://127.0.0.1:5000/";

    pub async fn new_session(url: &str) -> Session {
        let client = AuthenticatedClient::new_noauth(url).await;
        let mut session = Session::new_with_authenticated_client(client);
        session.cache_fake_service(
            "compute",
            ServiceInfo {
                root_url: Url::parse(url).unwrap(),
                major_version: Some(ApiVersion(2, 0)),
                minimum_version: Some(ApiVersion(2, 1)),
                current_version: Some(ApiVersion(2, 42)),
            },
        );
        session
    }

    #[tokio::test]
    async fn test_get_endpoint() {
        let s = new_session(URL).await;
        let ep = s.get_endpoint(COMPUTE, &[""]).await.unwrap();
        assert_eq!(&ep.to_string(), URL);
        let ep = s.get_endpoint(COMPUTE, &["servers", "1234"]).await.unwrap();
        assert_eq!(&ep.to_string(), "http://127.0.0.1:5000/servers/1234");
    }

    #[tokio::test]
    async fn test_get_major_version() {
        let s = new_session(URL).await;
        let res = s.get_major_version(COMPUTE).await.unwrap();
        assert_eq!(res, Some(ApiVersion(2, 0)));
    }

    #[tokio::test]
    async fn test_get_api_versions() {
        let s = new_session(URL).await;
        let (min, max) = s.get_api_versions(COMPUTE).await.unwrap().unwrap();
        assert_eq!(min, ApiVersion(2, 1));
        assert_eq!(max, ApiVersion(2, 42));
    }

    #[tokio::test]
    async fn test_pick_api_version() {
        let s = new_session(URL).await;
        let choice = s
            .pick_api_version(
                COMPUTE,
                vec![
                    ApiVersion(2, 0),
                    ApiVersion(2, 2),
                    ApiVersion(2, 30),
                    ApiVersion(2, 50),
                ],
            )
            .await
            .unwrap();
        assert_eq!(choice, Some(ApiVersion(2, 30)));
    }

    #[tokio::test]
    async fn test_pick_api_version_empty() {
        let s = new_session(URL).await;
        let choice = s
            .pick_api_version(NETWORK, Vec::<ApiVersion>::new())
            .await
            .unwrap();
        assert!(choice.is_none());
    }

    #[tokio::test]
    async fn test_pick_api_version_none() {
        let s = new_session(URL).await;
        let choice = s
            .pick_api_version(COMPUTE, vec![ApiVersion(2, 0), ApiVersion(2, 50)])
            .await
            .unwrap();
        assert!(choice.is_none());
    }

    #[tokio::test]
    async fn test_supports_api_version() {
        let s = new_session(URL).await;
        assert!(s.supports_api_version(COMPUTE, ApiVersion(2, 2)).await.unwrap());
        assert!(!s.supports_api_version(COMPUTE, ApiVersion(2, 50)).await.unwrap());
    }

    #[tokio::test]
    async fn test_filters_detach_cache() {
        let s = new_session(URL).await;
        let mut detached = s.clone();
        detached.set_endpoint_filters(
            EndpointFilters::default().with_interfaces(InterfaceType::Internal),
        );
        assert_eq!(*detached.endpoint_filters().interfaces, [InterfaceType::Internal]);
        assert_eq!(*s.endpoint_filters().interfaces, [InterfaceType::Public]);
        // The original still has the cached compute endpoint.
        assert!(s.get_major_version(COMPUTE).await.is_ok());
    }
}
