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

//! Projects.

use serde_json::{Map, Value};

use super::{filter_list, get_entity, Cloud};
use crate::normalize::model;
use crate::resource::ResourceKind;
use crate::{Error, Query};

impl Cloud {
    /// List projects visible to the user.
    pub async fn list_projects(&self) -> Result<Vec<model::Project>, Error> {
        self.cached(ResourceKind::Project, "list_projects", || async {
            let projects = self.identity.projects(&Query::default()).await?;
            Ok(projects
                .into_iter()
                .map(|project| self.normalizer.normalize_project(project))
                .collect::<Vec<_>>())
        })
        .await
    }

    /// Search projects by name or ID (globs allowed) and field values.
    pub async fn search_projects(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::Project>, Error> {
        filter_list(&self.list_projects().await?, name_or_id, filters)
    }

    /// Get a project by name or ID.
    pub async fn get_project(&self, name_or_id: &str) -> Result<Option<model::Project>, Error> {
        get_entity(self.search_projects(Some(name_or_id), None).await?, name_or_id)
    }
}
