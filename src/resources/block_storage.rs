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

//! Block storage resources: volumes and snapshots.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::common::{bool_or_string, null_as_default};
use crate::proxy::Proxy;
use crate::resource::{Capabilities, Resource, ResourceKind, UriParams};
use crate::services::{BlockStorageService, BLOCK_STORAGE};
use crate::{Error, Query, QueryItem, Session};

/// An attachment of a volume.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VolumeAttachment {
    /// Attachment ID.
    #[serde(default)]
    pub attachment_id: Option<String>,
    /// Server the volume is attached to.
    #[serde(default)]
    pub server_id: Option<String>,
    /// Device name in the server.
    #[serde(default)]
    pub device: Option<String>,
}

/// A volume.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Volume {
    /// Volume ID.
    pub id: String,
    /// Volume name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Volume status.
    #[serde(default)]
    pub status: Option<String>,
    /// Size in GiB.
    #[serde(default)]
    pub size: u64,
    /// Volume type.
    #[serde(default)]
    pub volume_type: Option<String>,
    /// Availability zone.
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Whether the volume is bootable (sent as a string).
    #[serde(default, deserialize_with = "bool_or_string")]
    pub bootable: bool,
    /// Whether the volume can be attached to several servers.
    #[serde(default)]
    pub multiattach: bool,
    /// Whether the volume is encrypted.
    #[serde(default)]
    pub encrypted: bool,
    /// Attachments.
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<VolumeAttachment>,
    /// Metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    /// Source snapshot.
    #[serde(default)]
    pub snapshot_id: Option<String>,
    /// Source volume.
    #[serde(default)]
    pub source_volid: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project ID.
    #[serde(rename = "os-vol-tenant-attr:tenant_id", default)]
    pub project_id: Option<String>,
    /// Creation date.
    #[serde(default)]
    pub created_at: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Volume {
    type Service = BlockStorageService;
    const SERVICE: BlockStorageService = BLOCK_STORAGE;
    const KIND: ResourceKind = ResourceKind::Volume;
    const BASE_PATH: &'static str = "volumes";
    const LIST_PATH: Option<&'static str> = Some("volumes/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("volume");
    const RESOURCES_KEY: &'static str = "volumes";
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

/// Filters for listing volumes.
#[derive(Debug, Clone, QueryItem)]
pub enum VolumeFilter {
    /// Exact name.
    Name(String),
    /// Volume status.
    Status(String),
    /// Volumes of all projects (administrators only).
    AllTenants(bool),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create a volume.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VolumeCreate {
    /// Size in GiB.
    pub size: u64,
    /// Volume name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Volume type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    /// Availability zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Image to create the volume from.
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Snapshot to create the volume from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    /// Volume to clone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_volid: Option<String>,
    /// Metadata.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A volume snapshot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Snapshot {
    /// Snapshot ID.
    pub id: String,
    /// Snapshot name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Snapshot status.
    #[serde(default)]
    pub status: Option<String>,
    /// Source volume.
    pub volume_id: String,
    /// Size in GiB.
    #[serde(default)]
    pub size: u64,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    /// Creation date.
    #[serde(default)]
    pub created_at: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Snapshot {
    type Service = BlockStorageService;
    const SERVICE: BlockStorageService = BLOCK_STORAGE;
    const KIND: ResourceKind = ResourceKind::Snapshot;
    const BASE_PATH: &'static str = "snapshots";
    const LIST_PATH: Option<&'static str> = Some("snapshots/detail");
    const RESOURCE_KEY: Option<&'static str> = Some("snapshot");
    const RESOURCES_KEY: &'static str = "snapshots";
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

/// Filters for listing snapshots.
#[derive(Debug, Clone, QueryItem)]
pub enum SnapshotFilter {
    /// Exact name.
    Name(String),
    /// Snapshot status.
    Status(String),
    /// Source volume.
    VolumeId(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Block storage service proxy.
#[derive(Debug, Clone)]
pub struct BlockStorageProxy {
    proxy: Proxy,
}

impl BlockStorageProxy {
    /// Create a proxy for the session.
    pub fn new(session: Session) -> BlockStorageProxy {
        BlockStorageProxy {
            proxy: Proxy::new(session),
        }
    }

    /// The generic proxy.
    #[inline]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// List volumes with details.
    pub async fn volumes(&self, query: &Query<VolumeFilter>) -> Result<Vec<Volume>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a volume by ID.
    pub async fn get_volume(&self, id: &str) -> Result<Volume, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find a volume by ID or name.
    pub async fn find_volume(&self, name_or_id: &str) -> Result<Volume, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create a volume.
    pub async fn create_volume(&self, request: &VolumeCreate) -> Result<Volume, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Update name, description or metadata of a volume.
    pub async fn update_volume<B>(&self, id: &str, fields: &B) -> Result<Volume, Error>
    where
        B: Serialize + ?Sized,
    {
        self.proxy.update(&UriParams::new(), id, fields).await
    }

    /// Delete a volume.
    pub async fn delete_volume(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Volume>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// Extend a volume to the new size.
    pub async fn extend_volume(&self, id: &str, new_size: u64) -> Result<(), Error> {
        let body = json!({"os-extend": {"new_size": new_size}});
        self.proxy
            .action::<Volume, _>(&UriParams::new(), id, &body)
            .await
    }

    /// Wait for a volume to reach the status, `error` is a failure.
    pub async fn wait_for_volume(
        &self,
        id: &str,
        status: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Volume, Error> {
        self.proxy
            .wait_for_status(
                &UriParams::new(),
                id,
                status,
                &["error", "error_extending", "error_restoring"],
                interval,
                timeout,
            )
            .await
    }

    /// Wait for a volume to be deleted.
    pub async fn wait_for_volume_delete(
        &self,
        id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<(), Error> {
        self.proxy
            .wait_for_delete::<Volume>(&UriParams::new(), id, interval, timeout)
            .await
    }

    /// List snapshots with details.
    pub async fn snapshots(&self, query: &Query<SnapshotFilter>) -> Result<Vec<Snapshot>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Get a snapshot by ID.
    pub async fn get_snapshot(&self, id: &str) -> Result<Snapshot, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Create a snapshot of a volume.
    pub async fn create_snapshot(
        &self,
        volume_id: &str,
        name: Option<&str>,
        force: bool,
    ) -> Result<Snapshot, Error> {
        let body = json!({"volume_id": volume_id, "name": name, "force": force});
        self.proxy.create(&UriParams::new(), &body).await
    }

    /// Delete a snapshot.
    pub async fn delete_snapshot(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Snapshot>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// Wait for a snapshot to reach the status, `error` is a failure.
    pub async fn wait_for_snapshot(
        &self,
        id: &str,
        status: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Snapshot, Error> {
        self.proxy
            .wait_for_status(&UriParams::new(), id, status, &["error"], interval, timeout)
            .await
    }
}
