// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Endpoint filters for looking up endpoints.

use std::fmt;
use std::iter::FromIterator;
use std::ops::Deref;
use std::str::FromStr;

use super::{Error, ErrorKind};

/// Interface type: public, internal or admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterfaceType {
    /// Public interface (used by default).
    #[default]
    Public,
    /// Internal interface.
    Internal,
    /// Administrator interface.
    Admin,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            InterfaceType::Public => "public",
            InterfaceType::Internal => "internal",
            InterfaceType::Admin => "admin",
        })
    }
}

impl FromStr for InterfaceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" | "publicURL" => Ok(InterfaceType::Public),
            "internal" | "internalURL" => Ok(InterfaceType::Internal),
            "admin" | "adminURL" => Ok(InterfaceType::Admin),
            other => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Unknown interface type: {}", other),
            )),
        }
    }
}

/// Acceptable interface types in the priority order, without duplicates.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidInterfaces {
    items: [InterfaceType; 3],
    len: u8,
}

impl ValidInterfaces {
    /// One valid interface.
    #[inline]
    pub fn one(item: InterfaceType) -> ValidInterfaces {
        ValidInterfaces {
            items: [item; 3],
            len: 1,
        }
    }

    /// Add an item to the end.
    ///
    /// Returns `false` on duplicate.
    pub fn push(&mut self, item: InterfaceType) -> bool {
        // Only three interface types exist, so a non-duplicate always fits.
        if self.contains(&item) {
            false
        } else {
            self.items[self.len as usize] = item;
            self.len += 1;
            true
        }
    }

    /// Priority of the interface: lower is better, `None` if not acceptable.
    pub fn priority(&self, interface: &str) -> Option<usize> {
        let parsed = InterfaceType::from_str(interface).ok()?;
        self.iter().position(|x| *x == parsed)
    }

    fn empty() -> ValidInterfaces {
        ValidInterfaces {
            items: [InterfaceType::Public; 3],
            len: 0,
        }
    }
}

impl Default for ValidInterfaces {
    /// Defaults to "public".
    fn default() -> ValidInterfaces {
        ValidInterfaces::one(InterfaceType::Public)
    }
}

impl fmt::Debug for ValidInterfaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Deref for ValidInterfaces {
    type Target = [InterfaceType];

    fn deref(&self) -> &Self::Target {
        &self.items[..self.len as usize]
    }
}

impl From<InterfaceType> for ValidInterfaces {
    fn from(value: InterfaceType) -> ValidInterfaces {
        ValidInterfaces::one(value)
    }
}

impl From<Vec<InterfaceType>> for ValidInterfaces {
    fn from(value: Vec<InterfaceType>) -> ValidInterfaces {
        value.into_iter().collect()
    }
}

impl FromIterator<InterfaceType> for ValidInterfaces {
    /// Duplicates are ignored.
    fn from_iter<T: IntoIterator<Item = InterfaceType>>(iter: T) -> Self {
        let mut result = ValidInterfaces::empty();
        for item in iter {
            let _ = result.push(item);
        }
        result
    }
}

impl FromStr for ValidInterfaces {
    type Err = Error;

    /// Parse a comma-separated list of interfaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let items = s
            .split(',')
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
            .map(InterfaceType::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if items.is_empty() {
            Err(Error::new(ErrorKind::InvalidInput, "Empty interface list"))
        } else {
            Ok(items.into())
        }
    }
}

/// Endpoint filters for looking up endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EndpointFilters {
    /// Acceptable endpoint interfaces in the priority order.
    pub interfaces: ValidInterfaces,
    /// Cloud region.
    pub region: Option<String>,
}

impl EndpointFilters {
    /// Create filters with interfaces and region.
    pub fn new<I, S>(interfaces: I, region: S) -> EndpointFilters
    where
        I: IntoIterator<Item = InterfaceType>,
        S: Into<String>,
    {
        EndpointFilters {
            interfaces: interfaces.into_iter().collect(),
            region: Some(region.into()),
        }
    }

    /// Set one or more valid interfaces.
    #[inline]
    pub fn with_interfaces<T: Into<ValidInterfaces>>(mut self, value: T) -> Self {
        self.interfaces = value.into();
        self
    }

    /// Set a region.
    #[inline]
    pub fn with_region<T: Into<String>>(mut self, value: T) -> Self {
        self.region = Some(value.into());
        self
    }

    /// Whether the region matches (any region matches when not set).
    #[inline]
    pub fn region_matches(&self, region: &str) -> bool {
        match self.region {
            Some(ref expected) => expected == region,
            None => true,
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::str::FromStr;

    use super::{EndpointFilters, InterfaceType, ValidInterfaces};
    use InterfaceType::*;

    #[test]
    fn test_valid_interfaces_default() {
        let default = ValidInterfaces::default();
        assert_eq!(*default, [Public]);
        assert_eq!(format!("{:?}", default), "[Public]");
    }

    #[test]
    fn test_valid_interfaces_push() {
        let mut vi = ValidInterfaces::one(Internal);
        assert!(!vi.push(Internal));
        assert!(vi.push(Public));
        assert!(vi.push(Admin));
        assert!(!vi.push(Public));
        assert_eq!(*vi, [Internal, Public, Admin]);
    }

    #[test]
    fn test_valid_interfaces_priority() {
        let vi: ValidInterfaces = vec![Internal, Public, Internal].into();
        assert_eq!(*vi, [Internal, Public]);
        assert_eq!(vi.priority("internal"), Some(0));
        assert_eq!(vi.priority("publicURL"), Some(1));
        assert_eq!(vi.priority("admin"), None);
        assert_eq!(vi.priority("banana"), None);
    }

    #[test]
    fn test_valid_interfaces_from_str() {
        let vi = ValidInterfaces::from_str("internal, public").unwrap();
        assert_eq!(*vi, [Internal, Public]);
        assert!(ValidInterfaces::from_str("").is_err());
        assert!(ValidInterfaces::from_str("public,private").is_err());
    }

    #[test]
    fn test_filters_region() {
        let filters = EndpointFilters::default();
        assert!(filters.region_matches("RegionOne"));
        let filters = filters.with_region("RegionTwo").with_interfaces(Admin);
        assert!(!filters.region_matches("RegionOne"));
        assert!(filters.region_matches("RegionTwo"));
        assert_eq!(*filters.interfaces, [Admin]);
    }
}
