// Copyright 2019-2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Token authentication.

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, RequestBuilder, Url};

use super::internal::Internal;
use super::protocol;
use super::{IdOrName, Identity, Scope};
use crate::{AuthScope, AuthType, EndpointFilters, Error};

/// Token authentication using Identity API V3.
///
/// Exchanges an existing token for a new (usually project-scoped) one:
///
/// ```rust,no_run
/// use oscloud::identity::IdOrName;
///
/// # async fn example() -> Result<(), oscloud::Error> {
/// let auth = oscloud::identity::Token::new("https://cloud.local/identity", "<a token>")?
///     .with_project_scope(IdOrName::from_id("abcd"), None);
/// let session = oscloud::Session::new(auth).await?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct Token {
    inner: Internal,
}

impl Identity for Token {
    fn auth_url(&self) -> &Url {
        self.inner.auth_url()
    }
}

impl Token {
    /// Create a token authentication.
    pub fn new<U, S>(auth_url: U, token: S) -> Result<Self, Error>
    where
        U: IntoUrl,
        S: Into<String>,
    {
        let auth_url = auth_url.into_url()?;
        let body = protocol::AuthRoot {
            auth: protocol::Auth {
                identity: protocol::Identity::Token(token.into()),
                scope: None,
            },
        };
        Ok(Self {
            inner: Internal::new(auth_url, body)?,
        })
    }

    /// Add a scope to the authentication.
    #[inline]
    pub fn set_scope(&mut self, scope: Scope) {
        self.inner.set_scope(scope);
    }

    /// Scope authentication to the given project.
    #[inline]
    pub fn with_project_scope(
        mut self,
        project: IdOrName,
        domain: impl Into<Option<IdOrName>>,
    ) -> Token {
        self.set_scope(Scope::Project {
            project,
            domain: domain.into(),
        });
        self
    }

    /// Set a region for endpoint lookups.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.inner.filters.region = Some(region.into());
        self
    }

    /// Add endpoint filters.
    #[inline]
    pub fn with_endpoint_filters(mut self, filters: EndpointFilters) -> Self {
        self.inner.filters = filters;
        self
    }

    /// Project name or ID (if project scoped).
    #[inline]
    pub fn project(&self) -> Option<&IdOrName> {
        self.inner.project()
    }
}

#[async_trait]
impl AuthType for Token {
    async fn authenticate(
        &self,
        client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        self.inner.authenticate(client, request).await
    }

    async fn get_endpoint(
        &self,
        client: &Client,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        self.inner.get_endpoint(client, service_type, filters).await
    }

    async fn refresh(&self, client: &Client) -> Result<(), Error> {
        self.inner.refresh(client, true).await
    }

    async fn scope(&self, client: &Client) -> Result<AuthScope, Error> {
        self.inner.scope(client).await
    }
}

#[cfg(test)]
pub mod test {
    use super::Token;
    use crate::identity::{IdOrName, Identity};

    #[test]
    fn test_token_new() {
        let id = Token::new("http://127.0.0.1:8080/identity/", "abcd")
            .unwrap()
            .with_project_scope(IdOrName::from_id("p1"), None);
        assert_eq!(id.auth_url().as_str(), "http://127.0.0.1:8080/identity");
        assert_eq!(id.project(), Some(&IdOrName::from_id("p1")));
        assert_eq!(
            id.inner.token_endpoint(),
            "http://127.0.0.1:8080/identity/v3/auth/tokens"
        );
    }
}
