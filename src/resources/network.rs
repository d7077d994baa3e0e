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

//! Networking resources.

use std::time::Duration;

use futures::stream::Stream;
use log::debug;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::common::null_as_default;
use crate::proxy::Proxy;
use crate::resource::{Capabilities, Resource, ResourceKind, UriParams};
use crate::services::{GenericService, NETWORK};
use crate::{protocol_enum, Error, Query, QueryItem, Session};

protocol_enum! {
    #[doc = "Direction of a security group rule."]
    enum Direction {
        Ingress = "ingress",
        Egress = "egress"
    }
}

protocol_enum! {
    #[doc = "IP protocol version of a security group rule."]
    enum EtherType {
        Ipv4 = "IPv4",
        Ipv6 = "IPv6"
    }
}

/// A network.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Network {
    /// Network ID.
    pub id: String,
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Network status.
    #[serde(default)]
    pub status: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Administrative state.
    #[serde(default)]
    pub admin_state_up: bool,
    /// Whether the network is shared between projects.
    #[serde(default)]
    pub shared: bool,
    /// Whether the network is external (can be used for floating IPs).
    #[serde(rename = "router:external", default)]
    pub is_external: bool,
    /// MTU of the network.
    #[serde(default)]
    pub mtu: Option<u32>,
    /// IDs of the subnets.
    #[serde(default, deserialize_with = "null_as_default")]
    pub subnets: Vec<String>,
    /// Whether port security is enabled by default.
    #[serde(default)]
    pub port_security_enabled: Option<bool>,
    /// Provider network type.
    #[serde(rename = "provider:network_type", default)]
    pub provider_network_type: Option<String>,
    /// Provider physical network.
    #[serde(rename = "provider:physical_network", default)]
    pub provider_physical_network: Option<String>,
    /// Provider segmentation ID.
    #[serde(rename = "provider:segmentation_id", default)]
    pub provider_segmentation_id: Option<u32>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Network {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::Network;
    const BASE_PATH: &'static str = "networks";
    const RESOURCE_KEY: Option<&'static str> = Some("network");
    const RESOURCES_KEY: &'static str = "networks";
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

/// Filters for listing networks.
#[derive(Debug, Clone, QueryItem)]
pub enum NetworkFilter {
    /// Exact name.
    Name(String),
    /// Network status.
    Status(String),
    /// Shared networks.
    Shared(bool),
    /// External networks.
    #[query_item = "router:external"]
    IsExternal(bool),
    /// Project ID.
    ProjectId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create a network.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkCreate {
    /// Network name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Administrative state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
    /// Whether the network is shared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    /// Whether the network is external.
    #[serde(rename = "router:external", skip_serializing_if = "Option::is_none")]
    pub is_external: Option<bool>,
    /// MTU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// Project to create the network in (administrators only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// An allocation pool of a subnet.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AllocationPool {
    /// First IP address.
    pub start: String,
    /// Last IP address.
    pub end: String,
}

/// A static route of a subnet.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HostRoute {
    /// Destination CIDR.
    pub destination: String,
    /// Next hop address.
    pub nexthop: String,
}

/// A subnet.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Subnet {
    /// Subnet ID.
    pub id: String,
    /// Subnet name.
    #[serde(default)]
    pub name: String,
    /// Network the subnet belongs to.
    pub network_id: String,
    /// CIDR of the subnet.
    pub cidr: String,
    /// IP version (4 or 6).
    #[serde(default)]
    pub ip_version: u8,
    /// Gateway IP, `None` if there is no gateway.
    #[serde(default)]
    pub gateway_ip: Option<String>,
    /// Whether DHCP is enabled.
    #[serde(default)]
    pub enable_dhcp: bool,
    /// DNS name servers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dns_nameservers: Vec<String>,
    /// Allocation pools.
    #[serde(default, deserialize_with = "null_as_default")]
    pub allocation_pools: Vec<AllocationPool>,
    /// Static routes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub host_routes: Vec<HostRoute>,
    /// IPv6 router advertisement mode.
    #[serde(default)]
    pub ipv6_ra_mode: Option<String>,
    /// IPv6 address mode.
    #[serde(default)]
    pub ipv6_address_mode: Option<String>,
    /// Subnet pool.
    #[serde(default)]
    pub subnetpool_id: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Subnet {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::Subnet;
    const BASE_PATH: &'static str = "subnets";
    const RESOURCE_KEY: Option<&'static str> = Some("subnet");
    const RESOURCES_KEY: &'static str = "subnets";
    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Filters for listing subnets.
#[derive(Debug, Clone, QueryItem)]
pub enum SubnetFilter {
    /// Exact name.
    Name(String),
    /// Network ID.
    NetworkId(String),
    /// IP version.
    IpVersion(u8),
    /// CIDR.
    Cidr(String),
    /// Project ID.
    ProjectId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create a subnet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubnetCreate {
    /// Network to create the subnet on.
    pub network_id: String,
    /// CIDR of the subnet.
    pub cidr: String,
    /// IP version.
    pub ip_version: u8,
    /// Subnet name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Gateway IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    /// Whether DHCP is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_dhcp: Option<bool>,
    /// DNS name servers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_nameservers: Vec<String>,
    /// Allocation pools.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allocation_pools: Vec<AllocationPool>,
    /// Static routes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host_routes: Vec<HostRoute>,
    /// IPv6 router advertisement mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_ra_mode: Option<String>,
    /// IPv6 address mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_address_mode: Option<String>,
}

/// A fixed IP of a port.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FixedIp {
    /// Subnet of the address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// A port.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Port {
    /// Port ID.
    pub id: String,
    /// Port name.
    #[serde(default)]
    pub name: String,
    /// Network of the port.
    pub network_id: String,
    /// Device (e.g. server) the port is attached to.
    #[serde(default)]
    pub device_id: String,
    /// Owner of the device (e.g. `compute:nova`).
    #[serde(default)]
    pub device_owner: String,
    /// MAC address.
    #[serde(default)]
    pub mac_address: String,
    /// Fixed IPs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixed_ips: Vec<FixedIp>,
    /// Port status.
    #[serde(default)]
    pub status: Option<String>,
    /// Administrative state.
    #[serde(default)]
    pub admin_state_up: bool,
    /// Security group IDs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub security_groups: Vec<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Port {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::Port;
    const BASE_PATH: &'static str = "ports";
    const RESOURCE_KEY: Option<&'static str> = Some("port");
    const RESOURCES_KEY: &'static str = "ports";
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

/// Filters for listing ports.
#[derive(Debug, Clone, QueryItem)]
pub enum PortFilter {
    /// Exact name.
    Name(String),
    /// Device ID.
    DeviceId(String),
    /// Device owner.
    DeviceOwner(String),
    /// Network ID.
    NetworkId(String),
    /// MAC address.
    MacAddress(String),
    /// Port status.
    Status(String),
    /// Project ID.
    ProjectId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create a port.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortCreate {
    /// Network to create the port on.
    pub network_id: String,
    /// Port name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fixed IPs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixed_ips: Vec<FixedIp>,
    /// Security groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
    /// Device ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Device owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_owner: Option<String>,
    /// Administrative state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

/// External gateway of a router.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExternalGateway {
    /// External network ID.
    pub network_id: String,
    /// Whether SNAT is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_snat: Option<bool>,
    /// External fixed IPs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_fixed_ips: Vec<FixedIp>,
}

/// A router.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Router {
    /// Router ID.
    pub id: String,
    /// Router name.
    #[serde(default)]
    pub name: String,
    /// Router status.
    #[serde(default)]
    pub status: Option<String>,
    /// Administrative state.
    #[serde(default)]
    pub admin_state_up: bool,
    /// External gateway.
    #[serde(default)]
    pub external_gateway_info: Option<ExternalGateway>,
    /// Static routes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub routes: Vec<HostRoute>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Router {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::Router;
    const BASE_PATH: &'static str = "routers";
    const RESOURCE_KEY: Option<&'static str> = Some("router");
    const RESOURCES_KEY: &'static str = "routers";
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

/// Request to create a router.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterCreate {
    /// Router name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Administrative state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
    /// External gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_gateway_info: Option<ExternalGateway>,
}

/// Result of adding or removing a router interface.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouterInterface {
    /// Router ID.
    pub id: String,
    /// Subnet of the interface.
    pub subnet_id: String,
    /// Port of the interface.
    pub port_id: String,
}

/// A floating IP.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FloatingIp {
    /// Floating IP ID.
    pub id: String,
    /// Floating IP address.
    pub floating_ip_address: String,
    /// External network of the address.
    pub floating_network_id: String,
    /// Fixed IP address it is associated with.
    #[serde(default)]
    pub fixed_ip_address: Option<String>,
    /// Port it is associated with.
    #[serde(default)]
    pub port_id: Option<String>,
    /// Router handling the address.
    #[serde(default)]
    pub router_id: Option<String>,
    /// Status (`ACTIVE`, `DOWN` or `ERROR`).
    #[serde(default)]
    pub status: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for FloatingIp {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::FloatingIp;
    const BASE_PATH: &'static str = "floatingips";
    const RESOURCE_KEY: Option<&'static str> = Some("floatingip");
    const RESOURCES_KEY: &'static str = "floatingips";
    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// Filters for listing floating IPs.
#[derive(Debug, Clone, QueryItem)]
pub enum FloatingIpFilter {
    /// Floating IP address.
    FloatingIpAddress(String),
    /// External network.
    FloatingNetworkId(String),
    /// Fixed IP address.
    FixedIpAddress(String),
    /// Port ID.
    PortId(String),
    /// Router ID.
    RouterId(String),
    /// Status.
    Status(String),
    /// Project ID.
    ProjectId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create a floating IP.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FloatingIpCreate {
    /// External network to allocate from.
    pub floating_network_id: String,
    /// Port to associate with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    /// Fixed IP of the port to associate with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip_address: Option<String>,
    /// Specific address to allocate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floating_ip_address: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A security group rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityGroupRule {
    /// Rule ID.
    pub id: String,
    /// Security group of the rule.
    pub security_group_id: String,
    /// Direction of traffic.
    pub direction: Direction,
    /// IP version.
    #[serde(default = "default_ethertype")]
    pub ethertype: EtherType,
    /// IP protocol, `None` for any.
    #[serde(default)]
    pub protocol: Option<String>,
    /// First port, `None` for any.
    #[serde(default)]
    pub port_range_min: Option<u16>,
    /// Last port, `None` for any.
    #[serde(default)]
    pub port_range_max: Option<u16>,
    /// Remote CIDR.
    #[serde(default)]
    pub remote_ip_prefix: Option<String>,
    /// Remote security group.
    #[serde(default)]
    pub remote_group_id: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_ethertype() -> EtherType {
    EtherType::Ipv4
}

impl Resource for SecurityGroupRule {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::SecurityGroupRule;
    const BASE_PATH: &'static str = "security-group-rules";
    const RESOURCE_KEY: Option<&'static str> = Some("security_group_rule");
    const RESOURCES_KEY: &'static str = "security_group_rules";
    const CAPABILITIES: Capabilities = Capabilities::NO_COMMIT;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Filters for listing security group rules.
#[derive(Debug, Clone, QueryItem)]
pub enum SecurityGroupRuleFilter {
    /// Security group ID.
    SecurityGroupId(String),
    /// Direction.
    Direction(Direction),
    /// Project ID.
    ProjectId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create a security group rule.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityGroupRuleCreate {
    /// Security group to add the rule to.
    pub security_group_id: String,
    /// Direction of traffic.
    pub direction: Direction,
    /// IP version.
    pub ethertype: EtherType,
    /// IP protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// First port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,
    /// Last port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,
    /// Remote CIDR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,
    /// Remote security group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,
    /// Project to create the rule in (administrators only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl SecurityGroupRuleCreate {
    /// An ingress IPv4 rule for any protocol.
    pub fn new<S: Into<String>>(security_group_id: S) -> SecurityGroupRuleCreate {
        SecurityGroupRuleCreate {
            security_group_id: security_group_id.into(),
            direction: Direction::Ingress,
            ethertype: EtherType::Ipv4,
            protocol: None,
            port_range_min: None,
            port_range_max: None,
            remote_ip_prefix: None,
            remote_group_id: None,
            project_id: None,
        }
    }
}

/// A security group.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityGroup {
    /// Security group ID.
    pub id: String,
    /// Security group name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Rules of the group.
    #[serde(default, deserialize_with = "null_as_default")]
    pub security_group_rules: Vec<SecurityGroupRule>,
    /// Whether the group is stateful.
    #[serde(default)]
    pub stateful: Option<bool>,
    /// Project ID.
    #[serde(default)]
    pub project_id: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for SecurityGroup {
    type Service = GenericService;
    const SERVICE: GenericService = NETWORK;
    const KIND: ResourceKind = ResourceKind::SecurityGroup;
    const BASE_PATH: &'static str = "security-groups";
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

/// Filters for listing security groups.
#[derive(Debug, Clone, QueryItem)]
pub enum SecurityGroupFilter {
    /// Exact name.
    Name(String),
    /// Project ID.
    ProjectId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Networking service proxy.
#[derive(Debug, Clone)]
pub struct NetworkProxy {
    proxy: Proxy,
}

impl NetworkProxy {
    /// Create a proxy for the session.
    pub fn new(session: Session) -> NetworkProxy {
        NetworkProxy {
            proxy: Proxy::new(session),
        }
    }

    /// The generic proxy.
    #[inline]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// List networks.
    pub async fn networks(&self, query: &Query<NetworkFilter>) -> Result<Vec<Network>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Stream networks.
    pub fn networks_stream(
        &self,
        query: &Query<NetworkFilter>,
    ) -> impl Stream<Item = Result<Network, Error>> {
        self.proxy.list_stream(&UriParams::new(), query)
    }

    /// Get a network by ID.
    pub async fn get_network(&self, id: &str) -> Result<Network, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a network by ID or name.
    pub async fn find_network(&self, name_or_id: &str) -> Result<Network, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a network.
    pub async fn create_network(&self, request: &NetworkCreate) -> Result<Network, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a network with the given fields.
    pub async fn update_network<B>(&self, id: &str, fields: &B) -> Result<Network, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a network.
    pub async fn delete_network(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Network>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List subnets.
    pub async fn subnets(&self, query: &Query<SubnetFilter>) -> Result<Vec<Subnet>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a subnet by ID.
    pub async fn get_subnet(&self, id: &str) -> Result<Subnet, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a subnet by ID or name.
    pub async fn find_subnet(&self, name_or_id: &str) -> Result<Subnet, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a subnet.
    pub async fn create_subnet(&self, request: &SubnetCreate) -> Result<Subnet, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a subnet with the given fields.
    pub async fn update_subnet<B>(&self, id: &str, fields: &B) -> Result<Subnet, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a subnet.
    pub async fn delete_subnet(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Subnet>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List ports.
    pub async fn ports(&self, query: &Query<PortFilter>) -> Result<Vec<Port>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a port by ID.
    pub async fn get_port(&self, id: &str) -> Result<Port, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a port by ID or name.
    pub async fn find_port(&self, name_or_id: &str) -> Result<Port, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a port.
    pub async fn create_port(&self, request: &PortCreate) -> Result<Port, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a port with the given fields.
    pub async fn update_port<B>(&self, id: &str, fields: &B) -> Result<Port, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a port.
    pub async fn delete_port(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Port>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List routers.
    pub async fn routers(&self) -> Result<Vec<Router>, Error> {
        self.proxy
            .list::<Router, crate::NoFilter>(&UriParams::new(), &Query::default())
            .await
    }

    /// Get a router by ID.
    pub async fn get_router(&self, id: &str) -> Result<Router, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a router by ID or name.
    pub async fn find_router(&self, name_or_id: &str) -> Result<Router, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a router.
    pub async fn create_router(&self, request: &RouterCreate) -> Result<Router, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update a router with the given fields.
    pub async fn update_router<B>(&self, id: &str, fields: &B) -> Result<Router, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a router.
    pub async fn delete_router(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Router>(&UriParams::new(), id, ignore_missing)
            .await
    }

    async fn router_interface(
        &self,
        id: &str,
        action: &str,
        subnet_id: Option<&str>,
        port_id: Option<&str>,
    ) -> Result<RouterInterface, Error> {
        let body = match (subnet_id, port_id) {
            (Some(subnet), None) => json!({ "subnet_id": subnet }),
            (None, Some(port)) => json!({ "port_id": port }),
            _ => {
                return Err(Error::new(
                    crate::ErrorKind::InvalidInput,
                    "Exactly one of subnet ID and port ID is required",
                ))
            }
        };
        let url = self.proxy.resource_url::<Router>(&UriParams::new(), id).await?;
        let url = crate::url::extend(url, &[action]);
        debug!("Calling {} on router {} with {}", action, id, body);
        self.proxy
            .start::<Router>(Method::PUT, url)
            .json(&body)
            .fetch_json()
            .await
    }

    /// Attach a subnet or a port to a router.
    pub async fn add_router_interface(
        &self,
        id: &str,
        subnet_id: Option<&str>,
        port_id: Option<&str>,
    ) -> Result<RouterInterface, Error> {
        self.router_interface(id, "add_router_interface", subnet_id, port_id)
            .await
    }

    /// Detach a subnet or a port from a router.
    pub async fn remove_router_interface(
        &self,
        id: &str,
        subnet_id: Option<&str>,
        port_id: Option<&str>,
    ) -> Result<RouterInterface, Error> {
        self.router_interface(id, "remove_router_interface", subnet_id, port_id)
            .await
    }

    /// List floating IPs.
    pub async fn floating_ips(
        &self,
        query: &Query<FloatingIpFilter>,
    ) -> Result<Vec<FloatingIp>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a floating IP by ID.
    pub async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Allocate a floating IP.
    pub async fn create_floating_ip(
        &self,
        request: &FloatingIpCreate,
    ) -> Result<FloatingIp, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Associate a floating IP with a port, or disassociate it with `None`.
    pub async fn associate_floating_ip(
        &self,
        id: &str,
        port_id: Option<&str>,
        fixed_ip_address: Option<&str>,
    ) -> Result<FloatingIp, Error> {
        let mut body = json!({ "port_id": port_id });
        if let Some(fixed) = fixed_ip_address {
            body["fixed_ip_address"] = json!(fixed);
        }
        self.proxy.update(&UriParams::new(), id, &body).await
    }

    /// Release a floating IP.
    pub async fn delete_floating_ip(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<FloatingIp>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// Wait for a floating IP to reach the status, `ERROR` is a failure.
    pub async fn wait_for_floating_ip(
        &self,
        id: &str,
        status: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<FloatingIp, Error> {
        self.proxy
            .wait_for_status(&UriParams::new(), id, status, &["ERROR"], interval, timeout)
            .await
    }

    /// List security groups.
    pub async fn security_groups(
        &self,
        query: &Query<SecurityGroupFilter>,
    ) -> Result<Vec<SecurityGroup>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a security group by ID.
    pub async fn get_security_group(&self, id: &str) -> Result<SecurityGroup, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a security group by ID or name.
    pub async fn find_security_group(&self, name_or_id: &str) -> Result<SecurityGroup, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a security group.
    pub async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        project_id: Option<&str>,
    ) -> Result<SecurityGroup, Error> {
        let mut body = json!({"name": name, "description": description});
        if let Some(project) = project_id {
            body["project_id"] = json!(project);
        }
        self.proxy.create(&UriParams::new(), &body).await
    }

    /// Update a security group with the given fields.
    pub async fn update_security_group<B>(
        &self,
        id: &str,
        fields: &B,
    ) -> Result<SecurityGroup, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a security group.
    pub async fn delete_security_group(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<SecurityGroup>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// List security group rules.
    pub async fn security_group_rules(
        &self,
        query: &Query<SecurityGroupRuleFilter>,
    ) -> Result<Vec<SecurityGroupRule>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Create a security group rule.
    pub async fn create_security_group_rule(
        &self,
        request: &SecurityGroupRuleCreate,
    ) -> Result<SecurityGroupRule, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Delete a security group rule.
    pub async fn delete_security_group_rule(
        &self,
        id: &str,
        ignore_missing: bool,
    ) -> Result<(), Error> {
        self.proxy
            .delete::<SecurityGroupRule>(&UriParams::new(), id, ignore_missing)
            .await
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_network_external() {
        let net: Network = serde_json::from_value(json!({
            "id": "n1",
            "name": "public",
            "status": "ACTIVE",
            "router:external": true,
            "subnets": null,
            "tenant_id": "p1",
            "project_id": "p1"
        }))
        .unwrap();
        assert!(net.is_external);
        assert!(net.subnets.is_empty());
        assert_eq!(net.project_id.as_deref(), Some("p1"));
        assert_eq!(net.extra["tenant_id"], "p1");
    }

    #[test]
    fn test_security_group_rule_any() {
        let rule: SecurityGroupRule = serde_json::from_value(json!({
            "id": "r1",
            "security_group_id": "g1",
            "direction": "egress",
            "ethertype": "IPv6",
            "protocol": null,
            "port_range_min": null,
            "port_range_max": null,
            "remote_ip_prefix": null
        }))
        .unwrap();
        assert_eq!(rule.direction, Direction::Egress);
        assert_eq!(rule.ethertype, EtherType::Ipv6);
        assert!(rule.protocol.is_none());
    }

    #[test]
    fn test_rule_create_body() {
        let mut request = SecurityGroupRuleCreate::new("g1");
        request.protocol = Some("tcp".into());
        request.port_range_min = Some(22);
        request.port_range_max = Some(22);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"security_group_id": "g1", "direction": "ingress", "ethertype": "IPv4",
                   "protocol": "tcp", "port_range_min": 22, "port_range_max": 22})
        );
    }

    #[test]
    fn test_network_filters() {
        let query = Query::default()
            .with(NetworkFilter::IsExternal(true))
            .with(NetworkFilter::Name("public".into()));
        assert_eq!(
            serde_urlencoded::to_string(query).unwrap(),
            "router%3Aexternal=true&name=public"
        );
    }

    #[test]
    fn test_router_gateway() {
        let router: Router = serde_json::from_value(json!({
            "id": "r1",
            "name": "router",
            "external_gateway_info": {
                "network_id": "n1",
                "enable_snat": true,
                "external_fixed_ips": [{"subnet_id": "s1", "ip_address": "172.24.4.1"}]
            }
        }))
        .unwrap();
        let gw = router.external_gateway_info.unwrap();
        assert_eq!(gw.network_id, "n1");
        assert_eq!(gw.external_fixed_ips[0].ip_address.as_deref(), Some("172.24.4.1"));
    }
}
