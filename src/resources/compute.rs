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

//! Compute resources: servers, flavors, key pairs and legacy networking.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::Stream;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::common::{empty_as_default, null_as_default, number_or_string, Ref};
use crate::proxy::Proxy;
use crate::resource::{Capabilities, Resource, ResourceKind, UriParams};
use crate::services::{ComputeService, COMPUTE};
use crate::{protocol_enum, Error, NoFilter, Query, QueryItem, Session};

fn default_true() -> bool {
    true
}

protocol_enum! {
    #[doc = "Type of a server address."]
    enum AddressType = Unknown {
        Fixed = "fixed",
        Floating = "floating",
        Unknown = "unknown"
    }
}

protocol_enum! {
    #[doc = "Type of a reboot."]
    enum RebootType {
        Hard = "HARD",
        Soft = "SOFT"
    }
}

/// An address of a server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerAddress {
    /// IP address.
    pub addr: String,
    /// IP version (4 or 6).
    #[serde(default)]
    pub version: u8,
    /// Address type (fixed or floating).
    #[serde(rename = "OS-EXT-IPS:type", default)]
    pub addr_type: AddressType,
    /// MAC address of the port.
    #[serde(rename = "OS-EXT-IPS-MAC:mac_addr", default)]
    pub mac_addr: Option<String>,
}

/// A flavor as embedded into a server.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerFlavor {
    /// Flavor ID (older API versions).
    #[serde(default)]
    pub id: Option<String>,
    /// Flavor name (newer API versions).
    #[serde(default)]
    pub original_name: Option<String>,
    /// RAM in MiB.
    #[serde(default)]
    pub ram: Option<u64>,
    /// Number of virtual CPUs.
    #[serde(default)]
    pub vcpus: Option<u32>,
    /// Root disk in GiB.
    #[serde(default)]
    pub disk: Option<u64>,
}

/// A named reference (e.g. a security group of a server).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NameRef {
    /// Name of the referenced resource.
    pub name: String,
}

/// A server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Server {
    /// Server ID.
    pub id: String,
    /// Server name.
    #[serde(default)]
    pub name: String,
    /// Server status.
    #[serde(default)]
    pub status: Option<String>,
    /// Addresses per network name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub addresses: HashMap<String, Vec<ServerAddress>>,
    /// IPv4 address to access the server.
    #[serde(rename = "accessIPv4", default, deserialize_with = "empty_as_default")]
    pub access_ipv4: Option<String>,
    /// IPv6 address to access the server.
    #[serde(rename = "accessIPv6", default, deserialize_with = "empty_as_default")]
    pub access_ipv6: Option<String>,
    /// Flavor of the server.
    #[serde(default)]
    pub flavor: Option<ServerFlavor>,
    /// Image of the server, `None` for servers booted from volumes.
    #[serde(default, deserialize_with = "empty_as_default")]
    pub image: Option<Ref>,
    /// Key pair name.
    #[serde(default)]
    pub key_name: Option<String>,
    /// Server metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    /// Security groups.
    #[serde(default, deserialize_with = "null_as_default")]
    pub security_groups: Vec<NameRef>,
    /// Availability zone.
    #[serde(rename = "OS-EXT-AZ:availability_zone", default)]
    pub availability_zone: Option<String>,
    /// Volumes attached to the server.
    #[serde(
        rename = "os-extended-volumes:volumes_attached",
        default,
        deserialize_with = "null_as_default"
    )]
    pub volumes_attached: Vec<Ref>,
    /// Project (tenant) ID.
    #[serde(rename = "tenant_id", default)]
    pub project_id: Option<String>,
    /// User ID.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Creation date.
    #[serde(default)]
    pub created: Option<String>,
    /// Last update date.
    #[serde(default)]
    pub updated: Option<String>,
    /// Administrator password (only after creation).
    #[serde(rename = "adminPass", default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Server {
    type Service = ComputeService;
    const SERVICE: ComputeService = COMPUTE;
    const KIND: ResourceKind = ResourceKind::Server;
    const BASE_PATH: &'static str = "servers";
    const LIST_PATH: Option<&'static str> = Some("servers/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("server");
    const RESOURCES_KEY: &'static str = "servers";
    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// Filters for listing servers.
#[derive(Debug, Clone, QueryItem)]
pub enum ServerFilter {
    /// Name (a regular expression on the server side).
    Name(String),
    /// Server status.
    Status(String),
    /// Flavor ID.
    Flavor(String),
    /// Image ID.
    Image(String),
    /// Compute host.
    Host(String),
    /// IPv4 address (a regular expression on the server side).
    #[query_item = "ip"]
    IpAddress(String),
    /// Servers of all projects (administrators only).
    AllTenants(bool),
    /// Changed since the date.
    #[query_item = "changes-since"]
    ChangesSince(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// A network to create a server on.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ServerNetwork {
    /// Network ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Port ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Fixed IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip: Option<String>,
}

/// Request to create a server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCreate {
    /// Server name.
    pub name: String,
    /// Image ID.
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Flavor ID.
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    /// Key pair name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Networks to connect to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<ServerNetwork>,
    /// Security groups.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<NameRef>,
    /// Metadata.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Availability zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Base64-encoded user data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    /// Whether to use a configuration drive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_drive: Option<bool>,
}

/// Request to update a server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerUpdate {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New IPv4 access address.
    #[serde(rename = "accessIPv4", skip_serializing_if = "Option::is_none")]
    pub access_ipv4: Option<String>,
    /// New IPv6 access address.
    #[serde(rename = "accessIPv6", skip_serializing_if = "Option::is_none")]
    pub access_ipv6: Option<String>,
}

/// A flavor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Flavor {
    /// Flavor ID.
    pub id: String,
    /// Flavor name.
    #[serde(default)]
    pub name: String,
    /// RAM in MiB.
    #[serde(default, deserialize_with = "number_or_string")]
    pub ram: u64,
    /// Number of virtual CPUs.
    #[serde(default, deserialize_with = "number_or_string")]
    pub vcpus: u64,
    /// Root disk in GiB.
    #[serde(default, deserialize_with = "number_or_string")]
    pub disk: u64,
    /// Swap in MiB (an empty string means no swap).
    #[serde(default, deserialize_with = "number_or_string")]
    pub swap: u64,
    /// Ephemeral disk in GiB.
    #[serde(
        rename = "OS-FLV-EXT-DATA:ephemeral",
        default,
        deserialize_with = "number_or_string"
    )]
    pub ephemeral: u64,
    /// Whether the flavor is public.
    #[serde(rename = "os-flavor-access:is_public", default = "default_true")]
    pub is_public: bool,
    /// Whether the flavor is disabled.
    #[serde(rename = "OS-FLV-DISABLED:disabled", default)]
    pub is_disabled: bool,
    /// RX/TX factor.
    #[serde(default)]
    pub rxtx_factor: Option<f64>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Extra specs (if returned by the API version).
    #[serde(default, deserialize_with = "null_as_default")]
    pub extra_specs: HashMap<String, String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Flavor {
    type Service = ComputeService;
    const SERVICE: ComputeService = COMPUTE;
    const KIND: ResourceKind = ResourceKind::Flavor;
    const BASE_PATH: &'static str = "flavors";
    const LIST_PATH: Option<&'static str> = Some("flavors/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("flavor");
    const RESOURCES_KEY: &'static str = "flavors";
    const CAPABILITIES: Capabilities = Capabilities::NO_COMMIT;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Filters for listing flavors.
#[derive(Debug, Clone, QueryItem)]
pub enum FlavorFilter {
    /// Minimum RAM in MiB.
    #[query_item = "minRam"]
    MinRam(u64),
    /// Minimum disk in GiB.
    #[query_item = "minDisk"]
    MinDisk(u64),
    /// Public or private flavors.
    IsPublic(bool),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

#[derive(Debug, Deserialize)]
struct ExtraSpecsRoot {
    #[serde(default, deserialize_with = "null_as_default")]
    extra_specs: HashMap<String, String>,
}

/// A key pair.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KeyPair {
    /// Key pair name (also its ID).
    pub name: String,
    /// Public key.
    #[serde(default)]
    pub public_key: String,
    /// Key fingerprint.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Key type (`ssh` or `x509`).
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    /// Private key (only when generated by the server).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Owner of the key pair.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Resource for KeyPair {
    type Service = ComputeService;
    const SERVICE: ComputeService = COMPUTE;
    const KIND: ResourceKind = ResourceKind::KeyPair;
    const BASE_PATH: &'static str = "os-keypairs";
    const RESOURCE_KEY: Option<&'static str> = Some("keypair");
    const RESOURCES_KEY: &'static str = "keypairs";
    const LIST_ITEM_KEY: Option<&'static str> = Some("keypair");
    const CAPABILITIES: Capabilities = Capabilities::NO_COMMIT;

    fn id(&self) -> &str {
        &self.name
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Request to create or import a key pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyPairCreate {
    /// Key pair name.
    pub name: String,
    /// Public key to import, generated by the server if not provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// A floating IP from legacy Compute networking.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NovaFloatingIp {
    /// Floating IP ID.
    pub id: String,
    /// Floating IP address.
    pub ip: String,
    /// Fixed IP address it is mapped to.
    #[serde(default)]
    pub fixed_ip: Option<String>,
    /// Server it is attached to.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Pool (network) name.
    #[serde(default)]
    pub pool: Option<String>,
}

impl Resource for NovaFloatingIp {
    type Service = ComputeService;
    const SERVICE: ComputeService = COMPUTE;
    const KIND: ResourceKind = ResourceKind::NovaFloatingIp;
    const BASE_PATH: &'static str = "os-floating-ips";
    const RESOURCE_KEY: Option<&'static str> = Some("floating_ip");
    const RESOURCES_KEY: &'static str = "floating_ips";
    const CAPABILITIES: Capabilities = Capabilities::NO_COMMIT;

    fn id(&self) -> &str {
        &self.id
    }
}

/// IP range of a legacy security group rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NovaIpRange {
    /// CIDR of the range.
    #[serde(default)]
    pub cidr: Option<String>,
}

/// Group referenced by a legacy security group rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NovaGroupRef {
    /// Group name.
    #[serde(default)]
    pub name: Option<String>,
    /// Group project.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// A rule of a legacy Compute security group.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NovaSecurityGroupRule {
    /// Rule ID.
    pub id: String,
    /// Security group the rule belongs to.
    #[serde(default)]
    pub parent_group_id: Option<String>,
    /// IP protocol.
    #[serde(default)]
    pub ip_protocol: Option<String>,
    /// First port, `-1` means any.
    #[serde(default)]
    pub from_port: Option<i32>,
    /// Last port, `-1` means any.
    #[serde(default)]
    pub to_port: Option<i32>,
    /// Remote IP range.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip_range: NovaIpRange,
    /// Remote security group.
    #[serde(default, deserialize_with = "null_as_default")]
    pub group: NovaGroupRef,
}

impl Resource for NovaSecurityGroupRule {
    type Service = ComputeService;
    const SERVICE: ComputeService = COMPUTE;
    const KIND: ResourceKind = ResourceKind::NovaSecurityGroupRule;
    const BASE_PATH: &'static str = "os-security-group-rules";
    const RESOURCE_KEY: Option<&'static str> = Some("security_group_rule");
    const RESOURCES_KEY: &'static str = "security_group_rules";
    const CAPABILITIES: Capabilities = Capabilities {
        create: true,
        fetch: false,
        commit: false,
        delete: true,
        list: false,
    };

    fn id(&self) -> &str {
        &self.id
    }
}

/// Request to create a legacy security group rule.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NovaSecurityGroupRuleCreate {
    /// Security group to add the rule to.
    pub parent_group_id: String,
    /// IP protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_protocol: Option<String>,
    /// First port, `-1` for any.
    pub from_port: i32,
    /// Last port, `-1` for any.
    pub to_port: i32,
    /// Remote IP range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    /// Remote security group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// A legacy Compute security group.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NovaSecurityGroup {
    /// Security group ID.
    pub id: String,
    /// Security group name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Rules of the group.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<NovaSecurityGroupRule>,
}

impl Resource for NovaSecurityGroup {
    type Service = ComputeService;
    const SERVICE: ComputeService = COMPUTE;
    const KIND: ResourceKind = ResourceKind::NovaSecurityGroup;
    const BASE_PATH: &'static str = "os-security-groups";
    const RESOURCE_KEY: Option<&'static str> = Some("security_group");
    const RESOURCES_KEY: &'static str = "security_groups";
    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Compute service proxy.
#[derive(Debug, Clone)]
pub struct ComputeProxy {
    proxy: Proxy,
}

impl ComputeProxy {
    /// Create a proxy for the session.
    pub fn new(session: Session) -> ComputeProxy {
        ComputeProxy {
            proxy: Proxy::new(session),
        }
    }

    /// The generic proxy.
    #[inline]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// List servers with details.
    pub async fn servers(&self, query: &Query<ServerFilter>) -> Result<Vec<Server>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Stream servers with details.
    pub fn servers_stream(
        &self,
        query: &Query<ServerFilter>,
    ) -> impl Stream<Item = Result<Server, Error>> {
        self.proxy.list_stream(&UriParams::new(), query)
    }

    /// Get a server by ID.
    pub async fn get_server(&self, id: &str) -> Result<Server, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a server by ID or name.
    pub async fn find_server(&self, name_or_id: &str) -> Result<Server, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a server.
    ///
    /// The result only contains the ID, links and possibly the administrator password.
    pub async fn create_server(&self, request: &ServerCreate) -> Result<Server, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a server.
    pub async fn update_server(&self, id: &str, request: &ServerUpdate) -> Result<Server, Error> {
        self.proxy.update(&UriParams::new(), id, request).await
    }

    /// Delete a server.
    pub async fn delete_server(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Server>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// Wait for a server to reach the status, `ERROR` is a failure.
    pub async fn wait_for_server(
        &self,
        id: &str,
        status: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Server, Error> {
        self.proxy
            .wait_for_status(&UriParams::new(), id, status, &["ERROR"], interval, timeout)
            .await
    }

    /// Wait for a server to be deleted.
    pub async fn wait_for_server_delete(
        &self,
        id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.proxy
            .wait_for_delete::<Server>(&UriParams::new(), id, interval, timeout)
            .await
    }

    async fn server_action(&self, id: &str, body: Value) -> Result<(), Error> {
        self.proxy
            .action::<Server, _>(&UriParams::new(), id, &body)
            .await
    }

    /// Reboot a server.
    pub async fn reboot_server(&self, id: &str, reboot_type: RebootType) -> Result<(), Error> {
        self.server_action(id, json!({"reboot": {"type": reboot_type}}))
            .await
    }

    /// Power on a server.
    pub async fn start_server(&self, id: &str) -> Result<(), Error> {
        self.server_action(id, json!({"os-start": null})).await
    }

    /// Power off a server.
    pub async fn stop_server(&self, id: &str) -> Result<(), Error> {
        self.server_action(id, json!({"os-stop": null})).await
    }

    /// Add a security group to a server.
    pub async fn add_security_group_to_server(&self, id: &str, group: &str) -> Result<(), Error> {
        self.server_action(id, json!({"addSecurityGroup": {"name": group}}))
            .await
    }

    /// Remove a security group from a server.
    pub async fn remove_security_group_from_server(
        &self,
        id: &str,
        group: &str,
    ) -> Result<(), Error> {
        self.server_action(id, json!({"removeSecurityGroup": {"name": group}}))
            .await
    }

    /// Attach a legacy floating IP to a server.
    pub async fn add_floating_ip_to_server(
        &self,
        id: &str,
        address: &str,
        fixed_address: Option<&str>,
    ) -> Result<(), Error> {
        let mut args = json!({ "address": address });
        if let Some(fixed) = fixed_address {
            args["fixed_address"] = json!(fixed);
        }
        self.server_action(id, json!({ "addFloatingIp": args })).await
    }

    /// Detach a legacy floating IP from a server.
    pub async fn remove_floating_ip_from_server(
        &self,
        id: &str,
        address: &str,
    ) -> Result<(), Error> {
        self.server_action(id, json!({"removeFloatingIp": {"address": address}}))
            .await
    }

    /// List flavors with details.
    pub async fn flavors(&self, query: &Query<FlavorFilter>) -> Result<Vec<Flavor>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a flavor by ID.
    pub async fn get_flavor(&self, id: &str) -> Result<Flavor, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a flavor by ID or name.
    pub async fn find_flavor(&self, name_or_id: &str) -> Result<Flavor, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Extra specs of a flavor.
    pub async fn flavor_extra_specs(&self, id: &str) -> Result<HashMap<String, String>, Error> {
        let params = UriParams::new().with("flavor_id", id);
        let url = self
            .proxy
            .session()
            .get_endpoint(COMPUTE, params.render("flavors/{flavor_id}/os-extra_specs")?)
            .await?;
        let root: ExtraSpecsRoot = self
            .proxy
            .start::<Flavor>(reqwest::Method::GET, url)
            .fetch_json()
            .await?;
        Ok(root.extra_specs)
    }

    /// List key pairs.
    pub async fn keypairs(&self) -> Result<Vec<KeyPair>, Error> {
        self.proxy
            .list::<KeyPair, NoFilter>(&UriParams::new(), &Query::default())
            .await
    }

    /// Get a key pair by name.
    pub async fn get_keypair(&self, name: &str) -> Result<KeyPair, Error> {
        self.proxy.get(&UriParams::new(), name).await
    }

    /// Create or import a key pair.
    pub async fn create_keypair(&self, request: &KeyPairCreate) -> Result<KeyPair, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Delete a key pair.
    pub async fn delete_keypair(&self, name: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<KeyPair>(&UriParams::new(), name, ignore_missing)
            .await
    }

    /// List legacy floating IPs.
    pub async fn nova_floating_ips(&self) -> Result<Vec<NovaFloatingIp>, Error> {
        self.proxy
            .list::<NovaFloatingIp, NoFilter>(&UriParams::new(), &Query::default())
            .await
    }

    /// Allocate a legacy floating IP from the pool.
    pub async fn create_nova_floating_ip(
        &self,
        pool: Option<&str>,
    ) -> Result<NovaFloatingIp, Error> {
        let body = json!({ "pool": pool });
        let url = self.proxy.collection_url::<NovaFloatingIp>(&UriParams::new()).await?;
        debug!("Allocating a legacy floating IP from pool {:?}", pool);
        // The body is not wrapped into the resource key.
        let root: Value = self
            .proxy
            .start::<NovaFloatingIp>(reqwest::Method::POST, url)
            .json(&body)
            .fetch_json()
            .await?;
        let value = root.get("floating_ip").cloned().unwrap_or(root);
        serde_json::from_value(value).map_err(Error::from)
    }

    /// Release a legacy floating IP.
    pub async fn delete_nova_floating_ip(
        &self,
        id: &str,
        ignore_missing: bool,
    ) -> Result<(), Error> {
        self.proxy
            .delete::<NovaFloatingIp>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List legacy security groups.
    pub async fn nova_security_groups(&self) -> Result<Vec<NovaSecurityGroup>, Error> {
        self.proxy
            .list::<NovaSecurityGroup, NoFilter>(&UriParams::new(), &Query::default())
            .await
    }

    /// Create a legacy security group.
    pub async fn create_nova_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<NovaSecurityGroup, Error> {
        self.proxy
            .create(
                &UriParams::new(),
                &json!({"name": name, "description": description}),
            )
            .await
    }

    /// Delete a legacy security group.
    pub async fn delete_nova_security_group(
        &self,
        id: &str,
        ignore_missing: bool,
    ) -> Result<(), Error> {
        self.proxy
            .delete::<NovaSecurityGroup>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// Create a legacy security group rule.
    pub async fn create_nova_security_group_rule(
        &self,
        request: &NovaSecurityGroupRuleCreate,
    ) -> Result<NovaSecurityGroupRule, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Delete a legacy security group rule.
    pub async fn delete_nova_security_group_rule(
        &self,
        id: &str,
        ignore_missing: bool,
    ) -> Result<(), Error> {
        self.proxy
            .delete::<NovaSecurityGroupRule>(&UriParams::new(), id, ignore_missing)
            .await
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_server_booted_from_volume() {
        let server: Server = serde_json::from_value(json!({
            "id": "1",
            "name": "test",
            "status": "ACTIVE",
            "image": "",
            "accessIPv4": "",
            "addresses": {
                "private": [
                    {"addr": "10.0.0.3", "version": 4, "OS-EXT-IPS:type": "fixed",
                     "OS-EXT-IPS-MAC:mac_addr": "fa:16:3e:00:00:01"},
                    {"addr": "172.24.4.10", "version": 4, "OS-EXT-IPS:type": "floating"}
                ]
            },
            "OS-EXT-STS:vm_state": "active",
            "os-extended-volumes:volumes_attached": [{"id": "vol1"}]
        }))
        .unwrap();
        assert!(server.image.is_none());
        assert!(server.access_ipv4.is_none());
        assert_eq!(server.addresses["private"][1].addr_type, AddressType::Floating);
        assert_eq!(server.volumes_attached[0].id, "vol1");
        assert_eq!(server.extra["OS-EXT-STS:vm_state"], "active");
        assert_eq!(server.status(), Some("ACTIVE"));
    }

    #[test]
    fn test_flavor_extensions() {
        let flavor: Flavor = serde_json::from_value(json!({
            "id": "42",
            "name": "m1.small",
            "ram": 2048,
            "vcpus": 1,
            "disk": 20,
            "swap": "",
            "OS-FLV-EXT-DATA:ephemeral": 5,
            "os-flavor-access:is_public": false,
            "OS-FLV-DISABLED:disabled": true
        }))
        .unwrap();
        assert_eq!(flavor.swap, 0);
        assert_eq!(flavor.ephemeral, 5);
        assert!(!flavor.is_public);
        assert!(flavor.is_disabled);
    }

    #[test]
    fn test_flavor_defaults() {
        let flavor: Flavor =
            serde_json::from_value(json!({"id": "1", "name": "tiny", "swap": 512})).unwrap();
        assert_eq!(flavor.swap, 512);
        assert!(flavor.is_public);
        assert!(!flavor.is_disabled);
    }

    #[test]
    fn test_server_create_body() {
        let request = ServerCreate {
            name: "test".into(),
            image_ref: Some("img".into()),
            flavor_ref: "42".into(),
            networks: vec![ServerNetwork {
                uuid: Some("net".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"name": "test", "imageRef": "img", "flavorRef": "42",
                   "networks": [{"uuid": "net"}]})
        );
    }

    #[test]
    fn test_server_filters() {
        let query = Query::default()
            .with(ServerFilter::ChangesSince("2020-01-01".into()))
            .with(ServerFilter::IpAddress("10.0.0.1".into()))
            .with(ServerFilter::AllTenants(true));
        assert_eq!(
            serde_urlencoded::to_string(query).unwrap(),
            "changes-since=2020-01-01&ip=10.0.0.1&all_tenants=true"
        );
    }

    #[test]
    fn test_nova_security_group_rule() {
        let rule: NovaSecurityGroupRule = serde_json::from_value(json!({
            "id": "r1",
            "parent_group_id": "g1",
            "ip_protocol": null,
            "from_port": null,
            "to_port": null,
            "ip_range": {},
            "group": {"name": "default", "tenant_id": "p1"}
        }))
        .unwrap();
        assert!(rule.ip_range.cidr.is_none());
        assert_eq!(rule.group.name.as_deref(), Some("default"));
    }
}
