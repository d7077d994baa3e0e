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

//! Declarative description of REST resources.

use std::fmt::{self, Debug};

use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::services::ServiceType;
use crate::{protocol_enum, ApiVersion, Error, ErrorKind};

protocol_enum! {
    #[doc = "Kind of a resource, also the name of its cache region."]
    enum ResourceKind {
        Server = "server",
        Flavor = "flavor",
        KeyPair = "keypair",
        NovaFloatingIp = "nova_floating_ip",
        NovaSecurityGroup = "nova_security_group",
        NovaSecurityGroupRule = "nova_security_group_rule",
        Network = "network",
        Subnet = "subnet",
        Port = "port",
        Router = "router",
        FloatingIp = "floating_ip",
        SecurityGroup = "security_group",
        SecurityGroupRule = "security_group_rule",
        Project = "project",
        User = "user",
        Domain = "domain",
        Image = "image",
        Volume = "volume",
        Snapshot = "snapshot",
        Container = "container",
        Object = "object"
    }
}

/// Operation on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a new resource.
    Create,
    /// Fetch one resource.
    Fetch,
    /// Update (commit) a resource.
    Commit,
    /// Delete a resource.
    Delete,
    /// List resources.
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Fetch => "fetch",
            Operation::Commit => "commit",
            Operation::Delete => "delete",
            Operation::List => "list",
        })
    }
}

/// Operations allowed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Creating is allowed.
    pub create: bool,
    /// Fetching one item is allowed.
    pub fetch: bool,
    /// Updating is allowed.
    pub commit: bool,
    /// Deleting is allowed.
    pub delete: bool,
    /// Listing is allowed.
    pub list: bool,
}

impl Capabilities {
    /// Everything is allowed.
    pub const ALL: Capabilities = Capabilities {
        create: true,
        fetch: true,
        commit: true,
        delete: true,
        list: true,
    };

    /// Only fetching and listing.
    pub const READ_ONLY: Capabilities = Capabilities {
        create: false,
        fetch: true,
        commit: false,
        delete: false,
        list: true,
    };

    /// Everything except for updates.
    pub const NO_COMMIT: Capabilities = Capabilities {
        create: true,
        fetch: true,
        commit: false,
        delete: true,
        list: true,
    };

    /// Whether the operation is allowed.
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Create => self.create,
            Operation::Fetch => self.fetch,
            Operation::Commit => self.commit,
            Operation::Delete => self.delete,
            Operation::List => self.list,
        }
    }
}

/// HTTP method used to update a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitMethod {
    /// Full or partial update with PUT.
    Put,
    /// Partial update with PATCH.
    Patch,
    /// Update with POST (e.g. metadata).
    Post,
}

impl From<CommitMethod> for Method {
    fn from(value: CommitMethod) -> Method {
        match value {
            CommitMethod::Put => Method::PUT,
            CommitMethod::Patch => Method::PATCH,
            CommitMethod::Post => Method::POST,
        }
    }
}

/// A REST resource type.
///
/// Body fields are the serde fields of the implementing structure. The path is relative to the
/// service root and may contain `{param}` placeholders filled from [UriParams](struct.UriParams.html).
pub trait Resource: DeserializeOwned + Debug + Clone + Send + Sync + Unpin + 'static {
    /// Service type of the resource.
    type Service: ServiceType;

    /// Service the resource belongs to.
    const SERVICE: Self::Service;

    /// Kind of the resource.
    const KIND: ResourceKind;

    /// Path of the collection relative to the service root.
    const BASE_PATH: &'static str;

    /// Path of the detailed listing, if different from `BASE_PATH` (e.g. `servers/detail`).
    const LIST_PATH: Option<&'static str> = None;

    /// Key wrapping a single resource in requests and responses (e.g. `server`).
    const RESOURCE_KEY: Option<&'static str>;

    /// Key wrapping a list of resources (e.g. `servers`).
    const RESOURCES_KEY: &'static str;

    /// Key wrapping every item of a list, if any.
    const LIST_ITEM_KEY: Option<&'static str> = None;

    /// Allowed operations.
    const CAPABILITIES: Capabilities;

    /// Method used for updates.
    const COMMIT_METHOD: CommitMethod = CommitMethod::Put;

    /// Content type of update requests.
    const COMMIT_CONTENT_TYPE: &'static str = "application/json";

    /// API version to request, if any.
    const MICROVERSION: Option<ApiVersion> = None;

    /// Resource ID.
    fn id(&self) -> &str;

    /// Resource name, if the resource has names.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Resource status, if the resource has one.
    fn status(&self) -> Option<&str> {
        None
    }

    /// Fail with `InvalidInput` if the operation is not allowed.
    fn check_capability(operation: Operation) -> Result<(), Error> {
        if Self::CAPABILITIES.allows(operation) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                format!("The {} resource does not support {}", Self::KIND, operation),
            ))
        }
    }
}

/// Values for `{param}` placeholders in resource paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParams(Vec<(&'static str, String)>);

impl UriParams {
    /// No parameters.
    #[inline]
    pub fn new() -> UriParams {
        UriParams::default()
    }

    /// Add a parameter.
    #[inline]
    pub fn with<S: Into<String>>(mut self, name: &'static str, value: S) -> UriParams {
        self.0.push((name, value.into()));
        self
    }

    /// Value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Fill placeholders in the path template and split it into segments.
    pub fn render(&self, template: &str) -> Result<Vec<String>, Error> {
        template
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.render_segment(segment))
            .collect()
    }

    fn render_segment(&self, segment: &str) -> Result<String, Error> {
        let mut result = String::with_capacity(segment.len());
        let mut rest = segment;
        while let Some(start) = rest.find('{') {
            let end = rest[start..].find('}').map(|x| x + start).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("Unterminated placeholder in {}", segment),
                )
            })?;
            let name = &rest[start + 1..end];
            let value = self.get(name).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("Missing value for URI parameter {}", name),
                )
            })?;
            if value.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("Empty value for URI parameter {}", name),
                ));
            }
            result.push_str(&rest[..start]);
            result.push_str(value);
            rest = &rest[end + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_render_plain() {
        let params = UriParams::new();
        assert_eq!(params.render("servers").unwrap(), vec!["servers"]);
        assert_eq!(
            params.render("/os-volumes_boot/").unwrap(),
            vec!["os-volumes_boot"]
        );
    }

    #[test]
    fn test_render_placeholders() {
        let params = UriParams::new()
            .with("flavor_id", "42")
            .with("container", "backups");
        assert_eq!(
            params.render("flavors/{flavor_id}/os-extra_specs").unwrap(),
            vec!["flavors", "42", "os-extra_specs"]
        );
        assert_eq!(
            params.render("{container}/prefix-{flavor_id}").unwrap(),
            vec!["backups", "prefix-42"]
        );
    }

    #[test]
    fn test_render_missing() {
        let err = UriParams::new()
            .render("flavors/{flavor_id}/os-extra_specs")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = UriParams::new()
            .with("flavor_id", "")
            .render("flavors/{flavor_id}")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(UriParams::new().render("flavors/{oops").is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(Capabilities::ALL.allows(Operation::Commit));
        assert!(!Capabilities::READ_ONLY.allows(Operation::Create));
        assert!(Capabilities::NO_COMMIT.allows(Operation::Delete));
        assert!(!Capabilities::NO_COMMIT.allows(Operation::Commit));
        assert_eq!(Method::from(CommitMethod::Patch), Method::PATCH);
    }

    #[test]
    fn test_resource_kind() {
        assert_eq!(ResourceKind::FloatingIp.as_str(), "floating_ip");
        assert_eq!(ResourceKind::KeyPair.to_string(), "keypair");
    }
}
