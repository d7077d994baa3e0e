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

use serde_json::Value;

use super::model;
use super::{take_string, Normalizer};
use crate::resources::block_storage::Volume;
use crate::resources::image::Image;

impl Normalizer {
    /// Normalize an image.
    ///
    /// Either `visibility` or the legacy `is_public` flag is used to fill both fields.
    pub fn normalize_image(&self, image: Image) -> model::Image {
        let mut extra = image.extra;
        let legacy_public = match extra.remove("is_public") {
            Some(Value::Bool(value)) => Some(value),
            Some(Value::String(value)) => Some(value.eq_ignore_ascii_case("true")),
            _ => None,
        };
        let visibility = match (image.visibility, legacy_public) {
            (Some(visibility), _) => visibility,
            (None, Some(true)) => "public".to_string(),
            (None, _) => "private".to_string(),
        };
        let is_public = visibility == "public";

        model::Image {
            location: self.location_for(image.owner.as_deref(), None),
            id: image.id,
            name: image.name.unwrap_or_default(),
            status: image.status,
            visibility,
            is_public,
            container_format: image.container_format,
            disk_format: image.disk_format,
            size: image.size,
            virtual_size: image.virtual_size,
            min_disk: image.min_disk,
            min_ram: image.min_ram,
            checksum: image.checksum,
            owner: image.owner,
            is_protected: image.protected,
            tags: image.tags,
            created_at: image.created_at,
            updated_at: image.updated_at,
            properties: self.properties(extra),
        }
    }

    /// Normalize a volume.
    ///
    /// Old Block Storage versions use `display_name` and `display_description`.
    pub fn normalize_volume(&self, volume: Volume) -> model::Volume {
        let mut extra = volume.extra;
        let display_name = take_string(&mut extra, "display_name");
        let display_description = take_string(&mut extra, "display_description");
        let name = if volume.name.is_empty() {
            display_name.unwrap_or_default()
        } else {
            volume.name
        };

        model::Volume {
            location: self.location_for(
                volume.project_id.as_deref(),
                volume.availability_zone.as_deref(),
            ),
            id: volume.id,
            name,
            description: volume.description.or(display_description),
            status: volume.status,
            size: volume.size,
            volume_type: volume.volume_type,
            is_bootable: volume.bootable,
            is_multiattach: volume.multiattach,
            is_encrypted: volume.encrypted,
            attachments: volume.attachments,
            metadata: volume.metadata,
            snapshot_id: volume.snapshot_id,
            source_volume_id: volume.source_volid,
            created_at: volume.created_at,
            properties: self.properties(extra),
        }
    }
}
