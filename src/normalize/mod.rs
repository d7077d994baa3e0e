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

//! Conversion of service resources into normalized documents.

use serde_json::{Map, Value};

use crate::AuthScope;

mod compute;
mod identity;
pub mod model;
mod network;
mod storage;

pub use self::model::{Location, ProjectLocation};

/// Converts resources of different services into one document model.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    strict: bool,
    location: Location,
}

impl Normalizer {
    /// Create a normalizer.
    ///
    /// In strict mode fields that are not part of the model are dropped instead of being
    /// collected in `properties`.
    pub fn new(strict: bool, location: Location) -> Normalizer {
        Normalizer { strict, location }
    }

    /// Build the current location from the cloud, region and authentication scope.
    pub fn current_location(
        cloud: Option<String>,
        region_name: Option<String>,
        scope: &AuthScope,
    ) -> Location {
        Location {
            cloud,
            region_name,
            zone: None,
            project: ProjectLocation {
                id: scope.project_id.clone(),
                name: scope.project_name.clone(),
                domain_id: scope.domain_id.clone(),
                domain_name: scope.domain_name.clone(),
            },
        }
    }

    /// Whether unknown fields are dropped.
    #[inline]
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// The current location.
    #[inline]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Location of a resource in the given project and zone.
    ///
    /// A project other than the current one is reported only by its ID.
    pub fn location_for(&self, project_id: Option<&str>, zone: Option<&str>) -> Location {
        let mut location = self.location.clone();
        location.zone = zone.map(From::from);
        if let Some(project_id) = project_id {
            if location.project.id.as_deref() != Some(project_id) {
                location.project = ProjectLocation {
                    id: Some(project_id.to_string()),
                    ..ProjectLocation::default()
                };
            }
        }
        location
    }

    fn properties(&self, extra: Map<String, Value>) -> Map<String, Value> {
        if self.strict {
            Map::new()
        } else {
            extra
        }
    }
}

fn take_string(extra: &mut Map<String, Value>, key: &str) -> Option<String> {
    match extra.remove(key)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn take_u64(extra: &mut Map<String, Value>, key: &str) -> Option<u64> {
    match extra.remove(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::*;

    pub fn location() -> Location {
        Location {
            cloud: Some("mycloud".into()),
            region_name: Some("RegionOne".into()),
            zone: None,
            project: ProjectLocation {
                id: Some("p1".into()),
                name: Some("demo".into()),
                domain_id: Some("default".into()),
                domain_name: None,
            },
        }
    }

    #[test]
    fn test_current_location() {
        let scope = AuthScope {
            project_id: Some("p1".into()),
            project_name: Some("demo".into()),
            domain_id: Some("default".into()),
            ..Default::default()
        };
        let loc = Normalizer::current_location(
            Some("mycloud".into()),
            Some("RegionOne".into()),
            &scope,
        );
        assert_eq!(loc, location());
    }

    #[test]
    fn test_location_for() {
        let normalizer = Normalizer::new(false, location());
        let same = normalizer.location_for(Some("p1"), Some("nova"));
        assert_eq!(same.zone.as_deref(), Some("nova"));
        assert_eq!(same.project.name.as_deref(), Some("demo"));
        let other = normalizer.location_for(Some("p2"), None);
        assert_eq!(other.project.id.as_deref(), Some("p2"));
        assert!(other.project.name.is_none());
        assert_eq!(other.region_name.as_deref(), Some("RegionOne"));
    }

    #[test]
    fn test_take_helpers() {
        let mut extra = json!({"a": "x", "b": "", "c": 3, "d": "4", "e": null})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(take_string(&mut extra, "a").as_deref(), Some("x"));
        assert_eq!(take_string(&mut extra, "b"), None);
        assert_eq!(take_u64(&mut extra, "c"), Some(3));
        assert_eq!(take_u64(&mut extra, "d"), Some(4));
        assert_eq!(take_string(&mut extra, "e"), None);
        assert!(extra.is_empty());
    }

    #[test]
    fn test_strict_properties() {
        let extra = json!({"a": 1}).as_object().cloned().unwrap();
        assert!(Normalizer::new(true, location())
            .properties(extra.clone())
            .is_empty());
        assert_eq!(Normalizer::new(false, location()).properties(extra).len(), 1);
    }
}
