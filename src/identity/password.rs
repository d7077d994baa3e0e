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

//! Password authentication.

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, RequestBuilder, Url};

use super::internal::Internal;
use super::protocol;
use super::{IdOrName, Identity, Scope};
use crate::{AuthScope, AuthType, EndpointFilters, Error};

/// Password authentication using Identity API V3.
///
/// You need the `auth_url` of the Identity service, a user name (or ID), a password and
/// usually the user's domain. Most clouds also require a project scope:
///
/// ```rust,no_run
/// use oscloud::identity::IdOrName;
///
/// # async fn example() -> Result<(), oscloud::Error> {
/// let auth = oscloud::identity::Password::new(
///     "https://cloud.local/identity",
///     IdOrName::from_name("admin"),
///     "pa$$w0rd",
///     IdOrName::from_name("Default"),
/// )?
/// .with_project_scope(IdOrName::from_name("demo"), IdOrName::from_name("Default"))
/// .with_region("RegionOne");
///
/// let session = oscloud::Session::new(auth).await?;
/// # Ok(()) }
/// ```
///
/// The token is cached until it is about to expire or until `refresh` is called.
/// Clones of a `Password` start with an empty cache.
#[derive(Debug, Clone)]
pub struct Password {
    inner: Internal,
}

impl Identity for Password {
    fn auth_url(&self) -> &Url {
        self.inner.auth_url()
    }
}

impl Password {
    /// Create a password authentication.
    pub fn new<U, S>(
        auth_url: U,
        user: IdOrName,
        password: S,
        user_domain: impl Into<Option<IdOrName>>,
    ) -> Result<Password, Error>
    where
        U: IntoUrl,
        S: Into<String>,
    {
        let auth_url = auth_url.into_url()?;
        let pw = protocol::UserAndPassword {
            user,
            password: password.into(),
            domain: user_domain.into(),
        };
        let body = protocol::AuthRoot {
            auth: protocol::Auth {
                identity: protocol::Identity::Password(pw),
                scope: None,
            },
        };
        Ok(Password {
            inner: Internal::new(auth_url, body)?,
        })
    }

    /// Endpoint filters used when the session provides none.
    #[inline]
    pub fn endpoint_filters(&self) -> &EndpointFilters {
        &self.inner.filters
    }

    /// Set endpoint filters.
    #[inline]
    pub fn set_endpoint_filters(&mut self, filters: EndpointFilters) {
        self.inner.filters = filters;
    }

    /// Add a scope to the authentication.
    #[inline]
    pub fn set_scope(&mut self, scope: Scope) {
        self.inner.set_scope(scope);
    }

    /// Add endpoint filters.
    #[inline]
    pub fn with_endpoint_filters(mut self, filters: EndpointFilters) -> Self {
        self.set_endpoint_filters(filters);
        self
    }

    /// Scope authentication to the given project.
    #[inline]
    pub fn with_project_scope(
        mut self,
        project: IdOrName,
        domain: impl Into<Option<IdOrName>>,
    ) -> Password {
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

    /// User name or ID.
    #[inline]
    pub fn user(&self) -> Option<&IdOrName> {
        self.inner.user()
    }

    /// Project name or ID (if project scoped).
    #[inline]
    pub fn project(&self) -> Option<&IdOrName> {
        self.inner.project()
    }
}

#[async_trait]
impl AuthType for Password {
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
    use super::Password;
    use crate::identity::{IdOrName, Identity};

    fn password(url: &str) -> Password {
        Password::new(
            url,
            IdOrName::from_name("user"),
            "pa$$w0rd",
            IdOrName::from_name("example.com"),
        )
        .unwrap()
        .with_project_scope(
            IdOrName::from_name("cool project"),
            IdOrName::from_name("example.com"),
        )
    }

    #[test]
    fn test_identity_new_invalid() {
        assert!(Password::new(
            "http://127.0.0.1 8080/",
            IdOrName::from_name("admin"),
            "pa$$w0rd",
            None
        )
        .is_err());
    }

    #[test]
    fn test_token_endpoint() {
        for url in &[
            "http://127.0.0.1:8080/identity",
            "http://127.0.0.1:8080/identity/",
            "http://127.0.0.1:8080/identity/v3",
            "http://127.0.0.1:8080/identity/v3/",
        ] {
            let id = password(url);
            assert_eq!(
                id.inner.token_endpoint(),
                "http://127.0.0.1:8080/identity/v3/auth/tokens"
            );
            assert!(!id.auth_url().as_str().ends_with('/'));
        }
    }

    #[test]
    fn test_user_and_project() {
        let id = password("http://127.0.0.1:8080/identity").with_region("RegionTwo");
        assert_eq!(id.user(), Some(&IdOrName::from_name("user")));
        assert_eq!(id.project(), Some(&IdOrName::from_name("cool project")));
        assert_eq!(id.endpoint_filters().region.as_deref(), Some("RegionTwo"));
    }
}
