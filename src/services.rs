// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
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

//! OpenStack service types.

use std::fmt::Debug;

use http::header::{HeaderName, HeaderValue};

use super::ApiVersion;

/// Trait representing a service type.
pub trait ServiceType: Debug + Copy + Send + Sync + 'static {
    /// Service type to pass to the catalog.
    fn catalog_type(&self) -> &'static str;

    /// Check whether this service type is compatible with the given major version.
    fn major_version_supported(&self, _version: ApiVersion) -> bool {
        true
    }

    /// Whether this service supports version discovery at all.
    fn version_discovery_supported(&self) -> bool {
        true
    }

    /// Header to request the API version with, if the service supports microversions.
    fn version_header(&self, _version: ApiVersion) -> Option<(HeaderName, HeaderValue)> {
        None
    }
}

/// A service that supports API versions (microversions) passed in a header.
pub trait VersionedService: ServiceType {
    /// Return a header name and value for the given API version.
    fn get_version_header(&self, version: ApiVersion) -> (HeaderName, HeaderValue);
}

/// Which major versions a service accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VersionSelector {
    /// Only the given major version.
    Major(u16),
    /// Any version.
    Any,
}

/// A generic service without microversions.
#[derive(Copy, Clone, Debug)]
pub struct GenericService {
    catalog_type: &'static str,
    selector: VersionSelector,
    discovery: bool,
}

impl GenericService {
    /// Create a new generic service.
    pub const fn new(catalog_type: &'static str, selector: VersionSelector) -> GenericService {
        GenericService {
            catalog_type,
            selector,
            discovery: true,
        }
    }

    /// Create a service that does not support version discovery.
    pub const fn without_discovery(catalog_type: &'static str) -> GenericService {
        GenericService {
            catalog_type,
            selector: VersionSelector::Any,
            discovery: false,
        }
    }
}

impl ServiceType for GenericService {
    fn catalog_type(&self) -> &'static str {
        self.catalog_type
    }

    fn major_version_supported(&self, version: ApiVersion) -> bool {
        match self.selector {
            VersionSelector::Major(major) => version.0 == major,
            VersionSelector::Any => true,
        }
    }

    fn version_discovery_supported(&self) -> bool {
        self.discovery
    }
}

/// The Compute service.
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct ComputeService;

impl ServiceType for ComputeService {
    fn catalog_type(&self) -> &'static str {
        "compute"
    }

    fn major_version_supported(&self, version: ApiVersion) -> bool {
        version.0 == 2
    }

    fn version_header(&self, version: ApiVersion) -> Option<(HeaderName, HeaderValue)> {
        Some(self.get_version_header(version))
    }
}

impl VersionedService for ComputeService {
    fn get_version_header(&self, version: ApiVersion) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-openstack-nova-api-version"),
            version_value(version.to_string()),
        )
    }
}

/// The Block Storage service.
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct BlockStorageService;

impl ServiceType for BlockStorageService {
    fn catalog_type(&self) -> &'static str {
        "block-storage"
    }

    fn major_version_supported(&self, version: ApiVersion) -> bool {
        version.0 == 3
    }

    // Catalog endpoints carry the project ID that version documents drop.
    fn version_discovery_supported(&self) -> bool {
        false
    }

    fn version_header(&self, version: ApiVersion) -> Option<(HeaderName, HeaderValue)> {
        Some(self.get_version_header(version))
    }
}

impl VersionedService for BlockStorageService {
    fn get_version_header(&self, version: ApiVersion) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("openstack-api-version"),
            version_value(format!("volume {}", version)),
        )
    }
}

fn version_value(value: String) -> HeaderValue {
    // Versions only consist of digits, dots and known service names.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Block Storage service (v3).
pub const BLOCK_STORAGE: BlockStorageService = BlockStorageService;

/// Compute service (v2 with microversions).
pub const COMPUTE: ComputeService = ComputeService;

/// Identity service (v3).
pub const IDENTITY: GenericService = GenericService::new("identity", VersionSelector::Major(3));

/// Image service (v2).
pub const IMAGE: GenericService = GenericService::new("image", VersionSelector::Major(2));

/// Network service (v2).
pub const NETWORK: GenericService = GenericService::new("network", VersionSelector::Major(2));

/// Object Storage service.
///
/// The catalog endpoint already contains the account, so no version discovery is done.
pub const OBJECT_STORAGE: GenericService = GenericService::without_discovery("object-store");

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_major_versions() {
        assert!(COMPUTE.major_version_supported(ApiVersion(2, 1)));
        assert!(!COMPUTE.major_version_supported(ApiVersion(1, 1)));
        assert!(IDENTITY.major_version_supported(ApiVersion(3, 14)));
        assert!(!IDENTITY.major_version_supported(ApiVersion(2, 0)));
        assert!(OBJECT_STORAGE.major_version_supported(ApiVersion(1, 0)));
        assert!(!OBJECT_STORAGE.version_discovery_supported());
        assert!(!BLOCK_STORAGE.version_discovery_supported());
        assert!(NETWORK.version_discovery_supported());
    }

    #[test]
    fn test_version_headers() {
        let (name, value) = BLOCK_STORAGE.get_version_header(ApiVersion(3, 0));
        assert_eq!(name.as_str(), "openstack-api-version");
        assert_eq!(value.to_str().unwrap(), "volume 3.0");
        assert!(NETWORK.version_header(ApiVersion(2, 0)).is_none());
        let (name, _) = COMPUTE.version_header(ApiVersion(2, 1)).unwrap();
        assert_eq!(name.as_str(), "x-openstack-nova-api-version");
    }
}
