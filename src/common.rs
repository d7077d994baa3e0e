// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Reusable JSON structures, coercions and protocol bits.

use std::cmp::Ordering;
use std::fmt;

use reqwest::Url;
use serde::de::{DeserializeOwned, Error as DeserError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ApiVersion;

/// A link to a resource.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Link {
    /// Resource URL.
    pub href: String,
    /// Relationship between the referencing and the referenced object.
    pub rel: String,
}

/// A reference to a resource by its ID with links.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ref {
    /// Identity of the referenced resource.
    pub id: String,
    /// A set of links to the resource.
    #[serde(default)]
    pub links: Vec<Link>,
}

/// A reference to an ID and name.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IdAndName {
    /// Resource ID.
    pub id: String,
    /// Resource name.
    pub name: String,
}

/// A reference to a resource by either its ID or name.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum IdOrName {
    /// Resource ID.
    #[serde(rename = "id")]
    Id(String),
    /// Resource name.
    #[serde(rename = "name")]
    Name(String),
}

impl IdOrName {
    /// Create an ID reference.
    #[inline]
    pub fn from_id<T: Into<String>>(value: T) -> IdOrName {
        IdOrName::Id(value.into())
    }

    /// Create a name reference.
    #[inline]
    pub fn from_name<T: Into<String>>(value: T) -> IdOrName {
        IdOrName::Name(value.into())
    }

    /// The ID or the name, whichever is set.
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            IdOrName::Id(value) | IdOrName::Name(value) => value,
        }
    }
}

impl fmt::Display for IdOrName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdOrName::Id(id) => write!(f, "id={}", id),
            IdOrName::Name(name) => write!(f, "name={}", name),
        }
    }
}

/// Status of a major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VersionStatus {
    /// The current version.
    Current,
    /// Supported version (that is not current).
    Supported,
    /// Deprecated version.
    Deprecated,
    /// Unknown version status.
    #[default]
    Unknown,
}

impl VersionStatus {
    /// If the version is considered stable.
    ///
    /// Unknown statuses are also treated as stable.
    #[inline]
    pub fn is_stable(&self) -> bool {
        !matches!(self, VersionStatus::Deprecated)
    }
}

impl<T> From<T> for VersionStatus
where
    T: Into<String>,
{
    fn from(value: T) -> VersionStatus {
        match value.into().to_uppercase().as_ref() {
            "CURRENT" => VersionStatus::Current,
            "SUPPORTED" | "STABLE" => VersionStatus::Supported,
            "DEPRECATED" => VersionStatus::Deprecated,
            _ => VersionStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for VersionStatus {
    fn deserialize<D>(deserializer: D) -> Result<VersionStatus, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        Ok(value.into())
    }
}

/// A single API version as returned by a version discovery endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct Version {
    /// Major version ID.
    pub id: ApiVersion,
    /// Links to subresources of this API version.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Version status.
    #[serde(deserialize_with = "empty_as_default", default)]
    pub status: VersionStatus,
    /// Current API version (also known as microversion).
    #[serde(deserialize_with = "empty_as_default", default)]
    pub version: Option<ApiVersion>,
    /// Minimal supported API version (also known as microversion).
    #[serde(deserialize_with = "empty_as_default", default)]
    pub min_version: Option<ApiVersion>,
}

impl Version {
    /// Whether a version is considered stable according to its status.
    #[inline]
    pub fn is_stable(&self) -> bool {
        self.status.is_stable()
    }

    /// The `self` link of this version.
    pub fn self_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "self")
            .map(|link| link.href.as_str())
    }

    /// Parse the `self` link of this version.
    pub fn self_url(&self) -> Option<Url> {
        self.self_link().and_then(|href| Url::parse(href).ok())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// Deserialize a value where empty string is replaced by `Default` value.
pub fn empty_as_default<'de, D, T>(des: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(des)?;
    match value {
        Value::String(ref s) if s.is_empty() => Ok(T::default()),
        _ => serde_json::from_value(value).map_err(D::Error::custom),
    }
}

/// Deserialize a value where `null` is replaced by `Default` value.
pub fn null_as_default<'de, D, T>(des: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(des)?.unwrap_or_default())
}

/// Deserialize a number that may be sent as a string (or an empty string meaning zero).
pub fn number_or_string<'de, D>(des: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(des)? {
        Value::Number(num) => num
            .as_u64()
            .or_else(|| num.as_f64().map(|f| f as u64))
            .ok_or_else(|| D::Error::custom(format!("{} is not a non-negative number", num))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s
            .parse()
            .map_err(|_| D::Error::custom(format!("{} is not a number", s))),
        Value::Null => Ok(0),
        other => Err(D::Error::custom(format!("expected a number, got {}", other))),
    }
}

/// Deserialize a boolean that may be sent as a string.
pub fn bool_or_string<'de, D>(des: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(des)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.to_lowercase().as_ref() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(D::Error::custom(format!("{} is not a boolean", other))),
        },
        Value::Null => Ok(false),
        other => Err(D::Error::custom(format!("expected a boolean, got {}", other))),
    }
}
