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

//! Containers and objects.

use std::path::Path;

use super::Cloud;
use crate::object_store::{
    Container, ContainerAccess, ContainerInfo, Object, ObjectInfo, UploadOptions, UploadOutcome,
};
use crate::resource::ResourceKind;
use crate::{Error, ResultExt};

impl Cloud {
    /// List all containers.
    pub async fn list_containers(&self) -> Result<Vec<Container>, Error> {
        self.cached(ResourceKind::Container, "list_containers", || {
            self.object_store.containers()
        })
        .await
    }

    /// Get container information, `None` if it does not exist.
    pub async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, Error> {
        self.object_store
            .get_container(name)
            .await
            .map(Some)
            .if_not_found_then(|| Ok(None))
    }

    /// Create a container, optionally readable by everyone.
    pub async fn create_container(&self, name: &str, public: bool) -> Result<ContainerInfo, Error> {
        self.object_store.create_container(name, public).await?;
        self.invalidate(&[ResourceKind::Container]).await;
        self.object_store.get_container(name).await
    }

    /// Delete an empty container, returns `false` if it does not exist.
    pub async fn delete_container(&self, name: &str) -> Result<bool, Error> {
        let result = self
            .object_store
            .delete_container(name, false)
            .await
            .map(|_| true)
            .if_not_found_then(|| Ok(false));
        self.invalidate(&[ResourceKind::Container, ResourceKind::Object])
            .await;
        result
    }

    /// Make a container public or private.
    pub async fn set_container_access(
        &self,
        name: &str,
        access: ContainerAccess,
    ) -> Result<(), Error> {
        self.object_store.set_container_access(name, access).await
    }

    /// Whether a container is public or private.
    pub async fn get_container_access(&self, name: &str) -> Result<ContainerAccess, Error> {
        self.object_store.get_container_access(name).await
    }

    /// List objects in a container.
    pub async fn list_objects(
        &self,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<Object>, Error> {
        self.object_store.objects(container, prefix).await
    }

    /// Get object metadata, `None` if it does not exist.
    pub async fn get_object_metadata(
        &self,
        container: &str,
        name: &str,
    ) -> Result<Option<ObjectInfo>, Error> {
        self.object_store
            .get_object_metadata(container, name)
            .await
            .map(Some)
            .if_not_found_then(|| Ok(None))
    }

    /// Download an object into memory, `None` if it does not exist.
    pub async fn get_object(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>, Error> {
        self.object_store
            .download_object(container, name)
            .await
            .map(Some)
            .if_not_found_then(|| Ok(None))
    }

    /// Upload an object from a file.
    ///
    /// Uses the configured segment size unless the options specify one.
    pub async fn create_object<P: AsRef<Path>>(
        &self,
        container: &str,
        name: &str,
        path: P,
        options: &UploadOptions,
    ) -> Result<UploadOutcome, Error> {
        let mut options = options.clone();
        if options.segment_size.is_none() {
            options.segment_size = self.config.segment_size;
        }
        let result = self
            .object_store
            .create_object(container, name, path, &options)
            .await;
        self.invalidate(&[ResourceKind::Container, ResourceKind::Object])
            .await;
        result
    }

    /// Delete an object and its segments, returns `false` if it does not exist.
    pub async fn delete_object(&self, container: &str, name: &str) -> Result<bool, Error> {
        let result = self
            .object_store
            .delete_object(container, name, false)
            .await
            .map(|_| true)
            .if_not_found_then(|| Ok(false));
        self.invalidate(&[ResourceKind::Container, ResourceKind::Object])
            .await;
        result
    }
}
