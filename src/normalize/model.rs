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

//! Normalized documents.
//!
//! Documents have the same shape regardless of the service (or its extension) that produced
//! them. Fields that are not part of the model end up in `properties` unless the normalizer is
//! strict.

#![allow(missing_docs)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resources::block_storage::VolumeAttachment;
use crate::resources::compute::ServerAddress;

/// Project part of a location.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectLocation {
    /// Project ID.
    pub id: Option<String>,
    /// Project name.
    pub name: Option<String>,
    /// Domain ID of the project.
    pub domain_id: Option<String>,
    /// Domain name of the project.
    pub domain_name: Option<String>,
}

/// Where a resource lives.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Location {
    /// Cloud name.
    pub cloud: Option<String>,
    /// Region name.
    pub region_name: Option<String>,
    /// Availability zone.
    pub zone: Option<String>,
    /// Owning project.
    pub project: ProjectLocation,
}

/// A flavor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub ram: u64,
    pub vcpus: u64,
    pub disk: u64,
    pub swap: u64,
    pub ephemeral: u64,
    pub is_public: bool,
    pub is_disabled: bool,
    pub rxtx_factor: f64,
    pub description: Option<String>,
    pub extra_specs: HashMap<String, String>,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// A server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    /// VM state (from `OS-EXT-STS:vm_state`).
    pub vm_state: Option<String>,
    /// Task state (from `OS-EXT-STS:task_state`).
    pub task_state: Option<String>,
    /// Power state (from `OS-EXT-STS:power_state`).
    pub power_state: Option<u64>,
    /// Compute host (from `OS-EXT-SRV-ATTR:host`).
    pub host: Option<String>,
    /// Hypervisor host name (from `OS-EXT-SRV-ATTR:hypervisor_hostname`).
    pub hypervisor_hostname: Option<String>,
    /// Libvirt instance name (from `OS-EXT-SRV-ATTR:instance_name`).
    pub instance_name: Option<String>,
    /// Flavor ID or name, depending on the API version.
    pub flavor: Option<String>,
    /// Image ID, `None` for servers booted from volumes.
    pub image_id: Option<String>,
    pub key_name: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Names of the security groups.
    pub security_groups: Vec<String>,
    pub addresses: HashMap<String, Vec<ServerAddress>>,
    pub private_v4: Option<String>,
    pub public_v4: Option<String>,
    pub public_v6: Option<String>,
    /// The address to use for connecting to the server.
    pub interface_ip: Option<String>,
    /// IDs of the attached volumes.
    pub volumes: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub admin_password: Option<String>,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// A security group rule (from Networking or nova-network).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SecurityGroupRule {
    pub id: String,
    pub security_group_id: Option<String>,
    /// `ingress` or `egress`.
    pub direction: String,
    /// `IPv4` or `IPv6`.
    pub ethertype: String,
    pub protocol: Option<String>,
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
    pub remote_ip_prefix: Option<String>,
    pub remote_group_id: Option<String>,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// A security group (from Networking or nova-network).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub security_group_rules: Vec<SecurityGroupRule>,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// A floating IP (from Networking or nova-network).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FloatingIp {
    pub id: String,
    pub floating_ip_address: String,
    /// Network ID (pool name for nova-network).
    pub network: Option<String>,
    pub fixed_ip_address: Option<String>,
    pub port_id: Option<String>,
    pub router_id: Option<String>,
    pub status: Option<String>,
    /// Whether the IP is associated with anything.
    pub attached: bool,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// An image.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub visibility: String,
    pub is_public: bool,
    pub container_format: Option<String>,
    pub disk_format: Option<String>,
    pub size: Option<u64>,
    pub virtual_size: Option<u64>,
    pub min_disk: u64,
    pub min_ram: u64,
    pub checksum: Option<String>,
    pub owner: Option<String>,
    pub is_protected: bool,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// A volume.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub size: u64,
    pub volume_type: Option<String>,
    pub is_bootable: bool,
    pub is_multiattach: bool,
    pub is_encrypted: bool,
    pub attachments: Vec<VolumeAttachment>,
    pub metadata: HashMap<String, String>,
    pub snapshot_id: Option<String>,
    pub source_volume_id: Option<String>,
    pub created_at: Option<String>,
    pub location: Location,
    pub properties: Map<String, Value>,
}

/// A project.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub domain_id: Option<String>,
    pub parent_id: Option<String>,
    pub is_enabled: bool,
    pub is_domain: bool,
    pub location: Location,
    pub properties: Map<String, Value>,
}
