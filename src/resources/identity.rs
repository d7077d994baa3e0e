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

//! Identity resources: projects, users and domains.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::proxy::Proxy;
use crate::resource::{Capabilities, CommitMethod, Resource, ResourceKind, UriParams};
use crate::services::{GenericService, IDENTITY};
use crate::{Error, Query, QueryItem, Session};

fn default_true() -> bool {
    true
}

/// A project.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Project {
    /// Project ID.
    pub id: String,
    /// Project name.
    #[serde(default)]
    pub name: String,
    /// Domain of the project.
    #[serde(default)]
    pub domain_id: Option<String>,
    /// Parent project.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the project is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the project acts as a domain.
    #[serde(default)]
    pub is_domain: bool,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Project {
    type Service = GenericService;
    const SERVICE: GenericService = IDENTITY;
    const KIND: ResourceKind = ResourceKind::Project;
    const BASE_PATH: &'static str = "projects";
    const RESOURCE_KEY: Option<&'static str> = Some("project");
    const RESOURCES_KEY: &'static str = "projects";
    const CAPABILITIES: Capabilities = Capabilities::ALL;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Patch;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Filters for listing projects.
#[derive(Debug, Clone, QueryItem)]
pub enum ProjectFilter {
    /// Exact name.
    Name(String),
    /// Domain ID.
    DomainId(String),
    /// Parent project ID.
    ParentId(String),
    /// Enabled or disabled projects.
    Enabled(bool),
}

/// Request to create a project.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectCreate {
    /// Project name.
    pub name: String,
    /// Domain to create the project in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    /// Parent project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the project is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// A user.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct User {
    /// User ID.
    pub id: String,
    /// User name.
    #[serde(default)]
    pub name: String,
    /// Domain of the user.
    #[serde(default)]
    pub domain_id: Option<String>,
    /// Default project.
    #[serde(default)]
    pub default_project_id: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the user is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for User {
    type Service = GenericService;
    const SERVICE: GenericService = IDENTITY;
    const KIND: ResourceKind = ResourceKind::User;
    const BASE_PATH: &'static str = "users";
    const RESOURCE_KEY: Option<&'static str> = Some("user");
    const RESOURCES_KEY: &'static str = "users";
    const CAPABILITIES: Capabilities = Capabilities::ALL;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Patch;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Filters for listing users.
#[derive(Debug, Clone, QueryItem)]
pub enum UserFilter {
    /// Exact name.
    Name(String),
    /// Domain ID.
    DomainId(String),
    /// Enabled or disabled users.
    Enabled(bool),
}

/// Request to create a user.
#[derive(Clone, Default, Serialize)]
pub struct UserCreate {
    /// User name.
    pub name: String,
    /// Domain to create the user in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    /// Default project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    /// Password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the user is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl std::fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreate")
            .field("name", &self.name)
            .field("domain_id", &self.domain_id)
            .field("default_project_id", &self.default_project_id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("email", &self.email)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A domain.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Domain {
    /// Domain ID.
    pub id: String,
    /// Domain name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the domain is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Resource for Domain {
    type Service = GenericService;
    const SERVICE: GenericService = IDENTITY;
    const KIND: ResourceKind = ResourceKind::Domain;
    const BASE_PATH: &'static str = "domains";
    const RESOURCE_KEY: Option<&'static str> = Some("domain");
    const RESOURCES_KEY: &'static str = "domains";
    const CAPABILITIES: Capabilities = Capabilities::ALL;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Patch;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Filters for listing domains.
#[derive(Debug, Clone, QueryItem)]
pub enum DomainFilter {
    /// Exact name.
    Name(String),
    /// Enabled or disabled domains.
    Enabled(bool),
}

/// Identity service proxy.
#[derive(Debug, Clone)]
pub struct IdentityProxy {
    proxy: Proxy,
}

impl IdentityProxy {
    /// Create a proxy for the session.
    pub fn new(session: Session) -> IdentityProxy {
        IdentityProxy {
            proxy: Proxy::new(session),
        }
    }

    /// The generic proxy.
    #[inline]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// List projects.
    pub async fn projects(&self, query: &Query<ProjectFilter>) -> Result<Vec<Project>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a project by ID.
    pub async fn get_project(&self, id: &str) -> Result<Project, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a project by ID or name.
    pub async fn find_project(&self, name_or_id: &str) -> Result<Project, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a project.
    pub async fn create_project(&self, request: &ProjectCreate) -> Result<Project, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a project with the given fields.
    pub async fn update_project<B>(&self, id: &str, fields: &B) -> Result<Project, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a project.
    pub async fn delete_project(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Project>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List users.
    pub async fn users(&self, query: &Query<UserFilter>) -> Result<Vec<User>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a user by ID or name.
    pub async fn find_user(&self, name_or_id: &str) -> Result<User, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a user.
    pub async fn create_user(&self, request: &UserCreate) -> Result<User, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a user with the given fields.
    pub async fn update_user<B>(&self, id: &str, fields: &B) -> Result<User, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a user.
    pub async fn delete_user(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<User>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List domains.
    pub async fn domains(&self, query: &Query<DomainFilter>) -> Result<Vec<Domain>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a domain by ID.
    pub async fn get_domain(&self, id: &str) -> Result<Domain, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a domain by ID or name.
    pub async fn find_domain(&self, name_or_id: &str) -> Result<Domain, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a domain.
    pub async fn create_domain(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Domain, Error> {
        let body = serde_json::json!({"name": name, "description": description});
        self.proxy.create(&UriParams::new(), &body).await
    }

    /// Update a domain with the given fields.
    pub async fn update_domain<B>(&self, id: &str, fields: &B) -> Result<Domain, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a domain.
    ///
    /// Domains must be disabled before deleting.
    pub async fn delete_domain(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Domain>(&UriParams::new(), id, ignore_missing)
            .await
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_project_defaults() {
        let project: Project =
            serde_json::from_value(json!({"id": "p1", "name": "demo", "tags": ["a"]})).unwrap();
        assert!(project.enabled);
        assert!(!project.is_domain);
        assert_eq!(project.extra["tags"], json!(["a"]));
    }

    #[test]
    fn test_user_create_hides_password() {
        let request = UserCreate {
            name: "admin".into(),
            password: Some("secret".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", request);
        assert!(!debug.contains("secret"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"name": "admin", "password": "secret"})
        );
    }
}
