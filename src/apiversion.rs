// Copyright 2018 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! API versions and microversions.

use std::fmt;
use std::str::FromStr;

use serde::de::{Error as DeserError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Error, ErrorKind};

/// API version (major, minor).
///
/// For services with microversions the minor component is the microversion, e.g. `2.79` for
/// Compute.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ApiVersion(pub u16, pub u16);

impl ApiVersion {
    /// Major component.
    #[inline]
    pub fn major(&self) -> u16 {
        self.0
    }

    /// Minor component (microversion).
    #[inline]
    pub fn minor(&self) -> u16 {
        self.1
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

impl From<(u16, u16)> for ApiVersion {
    fn from(value: (u16, u16)) -> ApiVersion {
        ApiVersion(value.0, value.1)
    }
}

fn parse_component(value: &str, full: &str) -> Result<u16, Error> {
    value.parse().map_err(|_| {
        Error::new(
            ErrorKind::InvalidResponse,
            format!("Invalid API version {}: {} is not a number", full, value),
        )
    })
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<ApiVersion, Error> {
        let version = s.strip_prefix('v').unwrap_or(s);
        let mut parts = version.split('.');

        let major = match parts.next() {
            Some(value) if !value.is_empty() => parse_component(value, s)?,
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidResponse,
                    format!("Empty API version {:?}", s),
                ))
            }
        };
        let minor = match parts.next() {
            Some(value) => parse_component(value, s)?,
            None => 0,
        };

        if parts.next().is_some() {
            return Err(Error::new(
                ErrorKind::InvalidResponse,
                format!("Invalid API version: expected X.Y or X, got {}", s),
            ));
        }

        Ok(ApiVersion(major, minor))
    }
}

impl Serialize for ApiVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

struct ApiVersionVisitor;

impl<'de> Visitor<'de> for ApiVersionVisitor {
    type Value = ApiVersion;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string in format X.Y or X")
    }

    fn visit_str<E>(self, value: &str) -> Result<ApiVersion, E>
    where
        E: DeserError,
    {
        ApiVersion::from_str(value).map_err(DeserError::custom)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D>(deserializer: D) -> Result<ApiVersion, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(ApiVersionVisitor)
    }
}
