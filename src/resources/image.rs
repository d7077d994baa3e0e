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

//! Image resources.

use std::time::Duration;

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::proxy::Proxy;
use crate::resource::{Capabilities, CommitMethod, Resource, ResourceKind, UriParams};
use crate::services::{GenericService, IMAGE};
use crate::{Error, Query, QueryItem, Session};

/// An image.
///
/// Custom image properties end up in `extra`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Image {
    /// Image ID.
    pub id: String,
    /// Image name.
    #[serde(default)]
    pub name: Option<String>,
    /// Image status.
    #[serde(default)]
    pub status: Option<String>,
    /// Visibility (`public`, `private`, `shared` or `community`).
    #[serde(default)]
    pub visibility: Option<String>,
    /// Container format.
    #[serde(default)]
    pub container_format: Option<String>,
    /// Disk format.
    #[serde(default)]
    pub disk_format: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Virtual size in bytes.
    #[serde(default)]
    pub virtual_size: Option<u64>,
    /// Minimum disk in GiB.
    #[serde(default)]
    pub min_disk: u64,
    /// Minimum RAM in MiB.
    #[serde(default)]
    pub min_ram: u64,
    /// Checksum of the data.
    #[serde(default)]
    pub checksum: Option<String>,
    /// Owner project.
    #[serde(default)]
    pub owner: Option<String>,
    /// Whether the image is protected from deletion.
    #[serde(default)]
    pub protected: bool,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation date.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update date.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// All other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Image {
    type Service = GenericService;
    const SERVICE: GenericService = IMAGE;
    const KIND: ResourceKind = ResourceKind::Image;
    const BASE_PATH: &'static str = "images";
    const RESOURCE_KEY: Option<&'static str> = None;
    const RESOURCES_KEY: &'static str = "images";
    const CAPABILITIES: Capabilities = Capabilities::ALL;
    const COMMIT_METHOD: CommitMethod = CommitMethod::Patch;
    const COMMIT_CONTENT_TYPE: &'static str = "application/openstack-images-v2.1-json-patch";

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// Filters for listing images.
#[derive(Debug, Clone, QueryItem)]
pub enum ImageFilter {
    /// Exact name.
    Name(String),
    /// Image status.
    Status(String),
    /// Visibility.
    Visibility(String),
    /// Owner project.
    Owner(String),
    /// Tag.
    Tag(String),
    /// Sort key and direction, e.g. `name:asc`.
    Sort(String),
    /// Page size.
    Limit(usize),
    /// Pagination marker.
    Marker(String),
}

/// Request to create an image record (without data).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageCreate {
    /// Image name.
    pub name: String,
    /// Container format.
    pub container_format: String,
    /// Disk format.
    pub disk_format: String,
    /// Visibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Minimum disk in GiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_disk: Option<u64>,
    /// Minimum RAM in MiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ram: Option<u64>,
    /// Tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Custom properties.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// One JSON patch operation on an image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePatch {
    /// Set (add or replace) a property.
    Set(String, Value),
    /// Remove a property.
    Remove(String),
}

impl ImagePatch {
    fn to_json(&self) -> Value {
        match self {
            ImagePatch::Set(name, value) => {
                json!({"op": "add", "path": format!("/{}", name), "value": value})
            }
            ImagePatch::Remove(name) => json!({"op": "remove", "path": format!("/{}", name)}),
        }
    }
}

/// Image service proxy.
#[derive(Debug, Clone)]
pub struct ImageProxy {
    proxy: Proxy,
}

impl ImageProxy {
    /// Create a proxy for the session.
    pub fn new(session: Session) -> ImageProxy {
        ImageProxy {
            proxy: Proxy::new(session),
        }
    }

    /// The generic proxy.
    #[inline]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// List images.
    pub async fn images(&self, query: &Query<ImageFilter>) -> Result<Vec<Image>, Error> {
        self.proxy.list(&UriParams::new(), query).await
    }

    /// Stream images.
    pub fn images_stream(
        &self,
        query: &Query<ImageFilter>,
    ) -> impl Stream<Item = Result<Image, Error>> {
        self.proxy.list_stream(&UriParams::new(), query)
    }

    /// Get an image by ID.
    pub async fn get_image(&self, id: &str) -> Result<Image, Error> {
        self.proxy.get(&UriParams::new(), id).await
    }

    /// Find an image by ID or name.
    pub async fn find_image(&self, name_or_id: &str) -> Result<Image, Error> {
        self.proxy.find(&UriParams::new(), name_or_id).await
    }

    /// Create an image record.
    pub async fn create_image(&self, request: &ImageCreate) -> Result<Image, Error> {
        self.proxy.create(&UriParams::new(), request).await
    }

    /// Upload image data.
    pub async fn upload_image_data<B>(&self, id: &str, data: B) -> Result<(), Error>
    where
        B: Into<reqwest::Body>,
    {
        let url = self.proxy.resource_url::<Image>(&UriParams::new(), id).await?;
        let url = crate::url::extend(url, &["file"]);
        let _ = self
            .proxy
            .start::<Image>(reqwest::Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        Ok(())
    }

    /// Update image properties with a JSON patch.
    pub async fn update_image(&self, id: &str, patch: &[ImagePatch]) -> Result<Image, Error> {
        let body: Vec<Value> = patch.iter().map(ImagePatch::to_json).collect();
        self.proxy.update(&UriParams::new(), id, &body).await
    }

    /// Delete an image.
    pub async fn delete_image(&self, id: &str, ignore_missing: bool) -> Result<(), Error> {
        self.proxy
            .delete::<Image>(&UriParams::new(), id, ignore_missing)
            .await
    }

    /// Wait for an image to become active, `killed` is a failure.
    pub async fn wait_for_image(
        &self,
        id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Image, Error> {
        self.proxy
            .wait_for_status(&UriParams::new(), id, "active", &["killed"], interval, timeout)
            .await
    }
}
