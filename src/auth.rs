// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Base code for authentication.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use static_assertions::{assert_impl_all, assert_obj_safe};

use super::{EndpointFilters, Error, ErrorKind};

/// Project and user the authentication is scoped to.
///
/// Used to fill the `location` of normalized resources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthScope {
    /// Project ID.
    pub project_id: Option<String>,
    /// Project name.
    pub project_name: Option<String>,
    /// ID of the project's domain.
    pub domain_id: Option<String>,
    /// Name of the project's domain.
    pub domain_name: Option<String>,
    /// User ID.
    pub user_id: Option<String>,
}

/// Trait for an authentication type.
///
/// An authentication type obtains a token (caching it while it is valid) and resolves service
/// endpoints.
#[async_trait]
pub trait AuthType: Debug + Sync + Send {
    /// Authenticate a request.
    async fn authenticate(
        &self,
        client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error>;

    /// Get a URL for the requested service.
    async fn get_endpoint(
        &self,
        client: &Client,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error>;

    /// Refresh the authentication (renew the token, etc).
    async fn refresh(&self, client: &Client) -> Result<(), Error>;

    /// Project and user of the current authentication.
    async fn scope(&self, _client: &Client) -> Result<AuthScope, Error> {
        Ok(AuthScope::default())
    }
}

assert_obj_safe!(AuthType);

/// Authentication type that provides no authentication.
///
/// Always uses a pre-defined endpoint and sends no credentials, which makes it suitable for
/// standalone services and for tests:
///
/// ```rust,no_run
/// # async fn example() -> Result<(), oscloud::Error> {
/// let auth = oscloud::NoAuth::new("http://127.0.0.1:6385")?;
/// let session = oscloud::Session::new(auth).await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct NoAuth {
    endpoint: Option<Url>,
    scope: AuthScope,
}

assert_impl_all!(NoAuth: Send, Sync);

impl NoAuth {
    /// Create a new fake authentication method using a fixed endpoint.
    ///
    /// This endpoint is returned for every service type.
    #[inline]
    pub fn new<U>(endpoint: U) -> Result<NoAuth, Error>
    where
        U: AsRef<str>,
    {
        let endpoint = Url::parse(endpoint.as_ref())
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
        Ok(NoAuth {
            endpoint: Some(endpoint),
            scope: AuthScope::default(),
        })
    }

    /// Create a new fake authentication method without an endpoint.
    ///
    /// All calls to `get_endpoint` will fail. This option is only useful with endpoint overrides.
    #[inline]
    pub fn new_without_endpoint() -> NoAuth {
        NoAuth {
            endpoint: None,
            scope: AuthScope::default(),
        }
    }

    /// Report the given scope from `scope` calls.
    #[inline]
    pub fn with_scope(mut self, scope: AuthScope) -> NoAuth {
        self.scope = scope;
        self
    }
}

#[async_trait]
impl AuthType for NoAuth {
    async fn authenticate(
        &self,
        _client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        Ok(request)
    }

    async fn get_endpoint(
        &self,
        _client: &Client,
        service_type: &str,
        _filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        self.endpoint.clone().ok_or_else(|| {
            Error::new(
                ErrorKind::EndpointNotFound,
                format!(
                    "None authentication without an endpoint, use an override for {}",
                    service_type
                ),
            )
        })
    }

    async fn refresh(&self, _client: &Client) -> Result<(), Error> {
        Ok(())
    }

    async fn scope(&self, _client: &Client) -> Result<AuthScope, Error> {
        Ok(self.scope.clone())
    }
}

#[cfg(test)]
pub mod test {
    use reqwest::Client;

    use super::{AuthScope, AuthType, NoAuth};
    use crate::ErrorKind;

    #[test]
    fn test_noauth_new() {
        let a = NoAuth::new("http://127.0.0.1:8080/v1").unwrap();
        let e = a.endpoint.unwrap();
        assert_eq!(e.host_str().unwrap(), "127.0.0.1");
        assert_eq!(e.port().unwrap(), 8080u16);
        assert_eq!(e.path(), "/v1");
    }

    #[test]
    fn test_noauth_new_fail() {
        let err = NoAuth::new("foo bar").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_noauth_get_endpoint() {
        let a = NoAuth::new("http://127.0.0.1:8080/v1").unwrap();
        let e = a
            .get_endpoint(&Client::new(), "compute", &Default::default())
            .await
            .unwrap();
        assert_eq!(e.as_str(), "http://127.0.0.1:8080/v1");
    }

    #[tokio::test]
    async fn test_noauth_without_endpoint() {
        let a = NoAuth::new_without_endpoint();
        let err = a
            .get_endpoint(&Client::new(), "compute", &Default::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
    }

    #[tokio::test]
    async fn test_noauth_scope() {
        let scope = AuthScope {
            project_id: Some("p1".into()),
            ..Default::default()
        };
        let a = NoAuth::new_without_endpoint().with_scope(scope.clone());
        assert_eq!(a.scope(&Client::new()).await.unwrap(), scope);
    }
}
