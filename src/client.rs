// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Low-level authenticated client.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Error as HttpError;
use log::{debug, trace, warn};
use reqwest::{Body, Client, Method, RequestBuilder as HttpRequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;

use crate::retry::{RetryPolicy, RetryReason};
use crate::services::{ServiceType, VersionedService};
use crate::{ApiVersion, AuthScope, AuthType, EndpointFilters, Error};

/// A properly typed constant for use with root paths.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), oscloud::Error> {
/// let session = oscloud::Session::from_env().await?;
/// let response = session
///     .get(oscloud::services::OBJECT_STORAGE, oscloud::NO_PATH)
///     .await?
///     .send()
///     .await?;
/// # Ok(()) }
/// ```
pub const NO_PATH: Option<&'static str> = None;

/// Authenticated HTTP client.
///
/// Uses `Arc` internally and should be reused when possible by cloning it.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    client: Client,
    auth: Arc<dyn AuthType>,
    retry: RetryPolicy,
}

assert_eq_size!(AuthenticatedClient, Option<AuthenticatedClient>);

impl AuthenticatedClient {
    /// Create a new authenticated client.
    ///
    /// Authenticates immediately.
    pub async fn new<Auth: AuthType + 'static>(
        client: Client,
        auth_type: Auth,
    ) -> Result<AuthenticatedClient, Error> {
        auth_type.refresh(&client).await?;
        Ok(AuthenticatedClient::new_internal(
            client,
            Arc::new(auth_type),
        ))
    }

    #[inline]
    pub(crate) fn new_internal(client: Client, auth: Arc<dyn AuthType>) -> AuthenticatedClient {
        AuthenticatedClient {
            client,
            auth,
            retry: RetryPolicy::default(),
        }
    }

    /// Get a reference to the authentication type in use.
    #[inline]
    pub fn auth_type(&self) -> &dyn AuthType {
        self.auth.as_ref()
    }

    /// Get a URL for the requested service.
    #[inline]
    pub async fn get_endpoint(
        &self,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        self.auth
            .get_endpoint(&self.client, service_type, filters)
            .await
    }

    /// Project and user of the current authentication.
    #[inline]
    pub async fn scope(&self) -> Result<AuthScope, Error> {
        self.auth.scope(&self.client).await
    }

    /// Get a reference to the inner (non-authenticated) client.
    #[inline]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Update the authentication.
    ///
    /// Clones of this client share the authentication object and see the new token too.
    #[inline]
    pub async fn refresh(&self) -> Result<(), Error> {
        self.auth.refresh(&self.client).await
    }

    /// Retry policy for requests made by this client.
    #[inline]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Set the retry policy.
    #[inline]
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry = policy;
    }

    /// Set a new authentication for this client.
    #[inline]
    pub fn set_auth_type<Auth: AuthType + 'static>(&mut self, auth_type: Auth) {
        self.auth = Arc::new(auth_type);
    }

    /// Start an authenticated request.
    #[inline]
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request_service((), method, url)
    }

    /// Start an authenticated request for a service.
    pub(crate) fn request_service<S>(
        &self,
        service: S,
        method: Method,
        url: Url,
    ) -> RequestBuilder<S> {
        RequestBuilder {
            inner: self.client.request(method, url),
            client: self.clone(),
            service,
            retry_on_conflict: false,
        }
    }

    async fn execute(&self, request: HttpRequestBuilder) -> Result<Response, RetryError> {
        let req = self
            .auth
            .authenticate(&self.client, request)
            .await
            .map_err(RetryError::Fatal)?
            .build()
            .map_err(|e| RetryError::Fatal(e.into()))?;
        trace!("Sending HTTP {} request to {}", req.method(), req.url());
        self.client.execute(req).await.map_err(RetryError::Http)
    }

    #[cfg(test)]
    pub(crate) async fn new_noauth(endpoint: &str) -> AuthenticatedClient {
        use crate::NoAuth;
        AuthenticatedClient::new(Client::new(), NoAuth::new(endpoint).unwrap())
            .await
            .unwrap()
    }
}

impl From<AuthenticatedClient> for Client {
    fn from(value: AuthenticatedClient) -> Client {
        value.client
    }
}

enum RetryError {
    Fatal(Error),
    Http(reqwest::Error),
}

impl From<RetryError> for Error {
    fn from(value: RetryError) -> Error {
        match value {
            RetryError::Fatal(err) => err,
            RetryError::Http(err) => err.into(),
        }
    }
}

/// A request builder with error handling and retries.
///
/// If the type parameter `S` is a service, additional functionality is available.
#[derive(Debug)]
#[must_use = "preparing a request is not enough to run it"]
pub struct RequestBuilder<S = ()> {
    inner: HttpRequestBuilder,
    client: AuthenticatedClient,
    service: S,
    retry_on_conflict: bool,
}

#[derive(Debug, Deserialize)]
struct Message {
    message: Option<String>,
    faultstring: Option<String>,
    title: Option<String>,
    // Ironic legacy format: JSON inside JSON.
    error_message: Option<String>,
}

impl Message {
    fn convert(self, recursive: bool) -> Option<String> {
        if let Some(value) = self.message.or(self.faultstring).or(self.title) {
            Some(value)
        } else if recursive {
            self.error_message
                .and_then(|json| serde_json::from_str::<Message>(&json).ok())
                .and_then(|msg| msg.convert(false))
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Map(HashMap<String, Message>),
    Message(Message),
}

fn extract_message(text: String) -> String {
    serde_json::from_str::<ErrorResponse>(&text)
        .ok()
        .and_then(|body| match body {
            ErrorResponse::Map(map) => map.into_iter().next().and_then(|(_k, v)| v.convert(true)),
            ErrorResponse::Message(msg) => msg.convert(true),
        })
        .unwrap_or(text)
}

/// Check for OpenStack errors in the response.
pub async fn check(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let url = response.url().clone();
        let message = extract_message(response.text().await?);
        debug!("HTTP request to {} returned {}; error: {}", url, status, message);
        Err(Error::new(status.into(), message).with_status(status))
    } else {
        trace!(
            "HTTP request to {} returned {}",
            response.url(),
            response.status()
        );
        Ok(response)
    }
}

impl<S> RequestBuilder<S> {
    /// Add a body to the request.
    pub fn body<T: Into<Body>>(self, body: T) -> RequestBuilder<S> {
        RequestBuilder {
            inner: self.inner.body(body),
            ..self
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(self, key: K, value: V) -> RequestBuilder<S>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<HttpError>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<HttpError>,
    {
        RequestBuilder {
            inner: self.inner.header(key, value),
            ..self
        }
    }

    /// Add headers to a request.
    pub fn headers(self, headers: HeaderMap) -> RequestBuilder<S> {
        RequestBuilder {
            inner: self.inner.headers(headers),
            ..self
        }
    }

    /// Add a JSON body to the request.
    pub fn json<T: Serialize + ?Sized>(self, json: &T) -> RequestBuilder<S> {
        RequestBuilder {
            inner: self.inner.json(json),
            ..self
        }
    }

    /// Send a query with the request.
    pub fn query<T: Serialize + ?Sized>(self, query: &T) -> RequestBuilder<S> {
        RequestBuilder {
            inner: self.inner.query(query),
            ..self
        }
    }

    /// Override the timeout for the request.
    pub fn timeout(self, timeout: Duration) -> RequestBuilder<S> {
        RequestBuilder {
            inner: self.inner.timeout(timeout),
            ..self
        }
    }

    /// Also retry on HTTP 409 Conflict (if the retry policy allows status code retries).
    pub fn retry_on_conflict(self) -> RequestBuilder<S> {
        RequestBuilder {
            retry_on_conflict: true,
            ..self
        }
    }

    /// Send the request and receive JSON in response.
    pub async fn fetch_json<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        self.send().await?.json::<T>().await.map_err(Error::from)
    }

    /// Send the request and check for errors, retrying according to the client's policy.
    ///
    /// Requests with streaming bodies cannot be cloned and are sent exactly once.
    pub async fn send(self) -> Result<Response, Error> {
        let RequestBuilder {
            inner,
            client,
            retry_on_conflict,
            ..
        } = self;
        let policy = client.retry;
        if !policy.is_enabled() {
            return check(client.execute(inner).await?).await;
        }

        let mut connect_retries = 0;
        let mut status_retries = 0;
        loop {
            let attempt = match inner.try_clone() {
                Some(attempt) => attempt,
                None => {
                    debug!("Request body is a stream, not retrying");
                    return check(client.execute(inner).await?).await;
                }
            };

            let reason = match client.execute(attempt).await {
                Ok(resp) => match policy.status_reason(resp.status(), retry_on_conflict) {
                    Some(reason) if policy.allows(reason, status_retries) => reason,
                    _ => return check(resp).await,
                },
                Err(RetryError::Http(err)) => match policy.error_reason(&err) {
                    Some(reason) if policy.allows(reason, connect_retries) => {
                        warn!("Request failed with {}", err);
                        reason
                    }
                    _ => return Err(err.into()),
                },
                Err(RetryError::Fatal(err)) => return Err(err),
            };

            let backoff = match reason {
                RetryReason::Connection => {
                    connect_retries += 1;
                    policy.backoff(connect_retries - 1)
                }
                RetryReason::Status(status) => {
                    status_retries += 1;
                    warn!("Request returned {}, retrying", status);
                    policy.backoff(status_retries - 1)
                }
            };
            debug!("Retrying the request in {:?}", backoff);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Send the request without checking for HTTP and OpenStack errors.
    ///
    /// Not retried.
    pub async fn send_unchecked(self) -> Result<Response, Error> {
        self.client.execute(self.inner).await.map_err(Error::from)
    }
}

impl<S> RequestBuilder<S>
where
    S: ServiceType,
{
    /// Request the API version if one is given and the service supports microversions.
    pub fn maybe_api_version(self, version: Option<ApiVersion>) -> RequestBuilder<S> {
        match version.and_then(|v| self.service.version_header(v)) {
            Some((name, value)) => RequestBuilder {
                inner: self.inner.header(name, value),
                ..self
            },
            None => self,
        }
    }
}

impl<S> RequestBuilder<S>
where
    S: VersionedService,
{
    /// Add an API version to this request.
    pub fn api_version<A: Into<ApiVersion>>(self, version: A) -> RequestBuilder<S> {
        let (name, value) = self.service.get_version_header(version.into());
        RequestBuilder {
            inner: self.inner.header(name, value),
            ..self
        }
    }

    /// Set the API version on the request.
    pub fn set_api_version<A: Into<ApiVersion>>(&mut self, version: A) {
        take_mut::take(self, |rb| rb.api_version(version));
    }
}

impl<S> RequestBuilder<S>
where
    S: Clone,
{
    /// Attempt to clone this request builder.
    pub fn try_clone(&self) -> Option<RequestBuilder<S>> {
        self.inner.try_clone().map(|inner| RequestBuilder {
            inner,
            client: self.client.clone(),
            service: self.service.clone(),
            retry_on_conflict: self.retry_on_conflict,
        })
    }
}


#[cfg(test)]
mod test_extract_message {
    use super::extract_message;

    #[test]
    fn test_plain() {
        let msg = "<html><body>I failed</body></html>";
        assert_eq!(extract_message(msg.to_string()), msg);
    }

    #[test]
    fn test_simple_message() {
        let msg = r#"{"message": "I failed"}"#;
        assert_eq!(extract_message(msg.to_string()), "I failed");
    }

    #[test]
    fn test_nested_message() {
        let msg = r#"{"itemNotFound": {"message": "Server abcd could not be found.", "code": 404}}"#;
        assert_eq!(
            extract_message(msg.to_string()),
            "Server abcd could not be found."
        );
    }

    #[test]
    fn test_neutron_fault() {
        let msg = r#"{"NeutronError": {"type": "PortNotFound", "message": "Port 1 not found", "detail": ""}}"#;
        assert_eq!(extract_message(msg.to_string()), "Port 1 not found");
    }

    #[test]
    fn test_title() {
        let msg = r#"{"title": "Conflict"}"#;
        assert_eq!(extract_message(msg.to_string()), "Conflict");
    }

    #[test]
    fn test_ironic_legacy() {
        let msg = r#"{"error_message": "{\"faultstring\": \"I failed\"}"}"#;
        assert_eq!(extract_message(msg.to_string()), "I failed");
    }
}
