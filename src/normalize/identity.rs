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

use super::model;
use super::Normalizer;
use crate::resources::identity::Project;

impl Normalizer {
    /// Normalize a project.
    pub fn normalize_project(&self, project: Project) -> model::Project {
        let mut location = self.location_for(None, None);
        // A project is located in its parent (or its domain for top-level projects).
        location.project = model::ProjectLocation {
            id: project.parent_id.clone().or_else(|| project.domain_id.clone()),
            name: None,
            domain_id: project.domain_id.clone(),
            domain_name: None,
        };
        model::Project {
            id: project.id,
            name: project.name,
            description: project.description,
            domain_id: project.domain_id,
            parent_id: project.parent_id,
            is_enabled: project.enabled,
            is_domain: project.is_domain,
            location,
            properties: self.properties(project.extra),
        }
    }
}
