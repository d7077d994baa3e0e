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

//! Images and volumes.

use std::time::Duration;

use log::{debug, info};
use serde_json::{Map, Value};

use super::{filter_list, get_entity, Cloud};
use crate::normalize::model;
use crate::proxy::DEFAULT_POLL_INTERVAL;
use crate::resource::ResourceKind;
use crate::resources::block_storage::VolumeCreate;
use crate::{Error, Query, ResultExt};

impl Cloud {
    /// List all images visible to the project.
    pub async fn list_images(&self) -> Result<Vec<model::Image>, Error> {
        self.cached(ResourceKind::Image, "list_images", || async {
            let images = self.image.images(&Query::default()).await?;
            Ok(images
                .into_iter()
                .map(|image| self.normalizer.normalize_image(image))
                .collect::<Vec<_>>())
        })
        .await
    }

    /// Search images by name or ID (globs allowed) and field values.
    pub async fn search_images(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::Image>, Error> {
        filter_list(&self.list_images().await?, name_or_id, filters)
    }

    /// Get an image by name or ID.
    pub async fn get_image(&self, name_or_id: &str) -> Result<Option<model::Image>, Error> {
        get_entity(self.search_images(Some(name_or_id), None).await?, name_or_id)
    }

    /// Get an image by ID bypassing the cache.
    pub async fn get_image_by_id(&self, id: &str) -> Result<Option<model::Image>, Error> {
        self.image
            .get_image(id)
            .await
            .map(|image| Some(self.normalizer.normalize_image(image)))
            .if_not_found_then(|| Ok(None))
    }

    /// List all volumes.
    pub async fn list_volumes(&self) -> Result<Vec<model::Volume>, Error> {
        self.cached(ResourceKind::Volume, "list_volumes", || async {
            let volumes = self.block_storage.volumes(&Query::default()).await?;
            Ok(volumes
                .into_iter()
                .map(|volume| self.normalizer.normalize_volume(volume))
                .collect::<Vec<_>>())
        })
        .await
    }

    /// Search volumes by name or ID (globs allowed) and field values.
    pub async fn search_volumes(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::Volume>, Error> {
        filter_list(&self.list_volumes().await?, name_or_id, filters)
    }

    /// Get a volume by name or ID.
    pub async fn get_volume(&self, name_or_id: &str) -> Result<Option<model::Volume>, Error> {
        get_entity(self.search_volumes(Some(name_or_id), None).await?, name_or_id)
    }

    /// Create a volume, optionally waiting for it to become `available`.
    pub async fn create_volume(
        &self,
        request: &VolumeCreate,
        wait: bool,
        timeout: Duration,
    ) -> Result<model::Volume, Error> {
        let mut volume = self.block_storage.create_volume(request).await?;
        self.invalidate(&[ResourceKind::Volume]).await;
        info!("Created volume {}", volume.id);
        if wait {
            volume = self
                .block_storage
                .wait_for_volume(&volume.id, "available", DEFAULT_POLL_INTERVAL, timeout)
                .await?;
            self.invalidate(&[ResourceKind::Volume]).await;
        }
        Ok(self.normalizer.normalize_volume(volume))
    }

    /// Delete a volume by name or ID, returns `false` if it does not exist.
    pub async fn delete_volume(
        &self,
        name_or_id: &str,
        wait: bool,
        timeout: Duration,
    ) -> Result<bool, Error> {
        let volume = match self.get_volume(name_or_id).await? {
            Some(volume) => volume,
            None => {
                debug!("Volume {} does not exist, nothing to delete", name_or_id);
                return Ok(false);
            }
        };

        self.block_storage.delete_volume(&volume.id, true).await?;
        if wait {
            self.block_storage
                .wait_for_volume_delete(&volume.id, DEFAULT_POLL_INTERVAL, timeout)
                .await?;
        }
        self.invalidate(&[ResourceKind::Volume]).await;
        info!("Deleted volume {} ({})", volume.name, volume.id);
        Ok(true)
    }
}
