// Copyright 2017 Dmitry Tantsur <divius.inside@gmail.com>
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

//! API version discovery.

use log::{debug, trace, warn};
use reqwest::{Method, Url};
use serde::Deserialize;

use crate::client::AuthenticatedClient;
use crate::common::Version;
use crate::services::ServiceType;
use crate::url;
use crate::{ApiVersion, Error, ErrorKind};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Root {
    MultipleVersions { versions: Versions },
    OneVersion { version: Version },
}

/// Identity wraps the version list into `values`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Versions {
    Plain(Vec<Version>),
    Wrapped { values: Vec<Version> },
}

/// Information about API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Root endpoint.
    pub root_url: Url,
    /// Major API version.
    pub major_version: Option<ApiVersion>,
    /// Current API version (if supported).
    pub current_version: Option<ApiVersion>,
    /// Minimum API version (if supported).
    pub minimum_version: Option<ApiVersion>,
}

fn service_info_from_version(ver: Version) -> Result<ServiceInfo, Error> {
    let root_url = ver.self_url().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidResponse,
            "Invalid version - missing or malformed self link",
        )
    })?;
    Ok(ServiceInfo {
        root_url,
        major_version: Some(ver.id),
        current_version: ver.version,
        minimum_version: ver.min_version,
    })
}

impl Root {
    async fn fetch(client: &AuthenticatedClient, endpoint: Url) -> Result<Root, Error> {
        debug!("Fetching service info from {}", endpoint);
        client.request(Method::GET, endpoint).fetch_json().await
    }

    /// Extract `ServiceInfo` from a version discovery root.
    pub fn into_service_info<Srv: ServiceType>(self, service: Srv) -> Result<ServiceInfo, Error> {
        trace!(
            "Available major versions for {} service: {:?}",
            service.catalog_type(),
            self
        );

        match self {
            Root::OneVersion { version: ver } => {
                if service.major_version_supported(ver.id) {
                    if !ver.is_stable() {
                        warn!(
                            "Using version {:?} of {} API that is not marked as stable",
                            ver,
                            service.catalog_type()
                        );
                    }

                    service_info_from_version(ver)
                } else {
                    Err(Error::new(
                        ErrorKind::EndpointNotFound,
                        format!(
                            "Major version {} of {} is not supported",
                            ver.id,
                            service.catalog_type()
                        ),
                    ))
                }
            }
            Root::MultipleVersions { versions } => {
                let mut vers = match versions {
                    Versions::Plain(v) => v,
                    Versions::Wrapped { values } => values,
                };
                vers.sort_unstable();
                match vers
                    .into_iter()
                    .rfind(|x| x.is_stable() && service.major_version_supported(x.id))
                {
                    Some(ver) => service_info_from_version(ver),
                    None => Err(Error::new_endpoint_not_found(service.catalog_type())),
                }
            }
        }
    }
}

impl ServiceInfo {
    /// Whether this service supports the given API version.
    ///
    /// Defaults to false if cannot be determined.
    #[inline]
    pub fn supports_api_version(&self, version: ApiVersion) -> bool {
        match (self.minimum_version, self.current_version) {
            (Some(min), Some(max)) => min <= version && max >= version,
            (None, Some(current)) => current == version,
            (Some(min), None) => version >= min,
            _ => false,
        }
    }

    /// Discover the service information starting with the catalog endpoint.
    pub async fn fetch<Srv: ServiceType>(
        service: Srv,
        endpoint: Url,
        client: &AuthenticatedClient,
    ) -> Result<ServiceInfo, Error> {
        if !service.version_discovery_supported() {
            debug!(
                "Service {} does not support version discovery, using {}",
                service.catalog_type(),
                endpoint
            );
            return Ok(ServiceInfo {
                root_url: url::with_trailing_slash(endpoint),
                major_version: None,
                current_version: None,
                minimum_version: None,
            });
        }

        // Older services return insecure URLs even when accessed via HTTPS.
        let secure = endpoint.scheme() == "https";
        let catalog_type = service.catalog_type();

        let root = match Root::fetch(client, endpoint.clone()).await {
            Ok(root) => root,
            Err(e) if e.kind() == ErrorKind::ResourceNotFound => {
                if url::is_root(&endpoint) {
                    return Err(Error::new_endpoint_not_found(catalog_type));
                }
                debug!("Got HTTP 404 from {}, trying parent endpoint", endpoint);
                Root::fetch(client, url::pop(endpoint, true)).await?
            }
            Err(e) => return Err(e),
        };

        let mut info = root.into_service_info(service)?;
        if secure && info.root_url.scheme() == "http" {
            info.root_url.set_scheme("https").map_err(|_| {
                Error::new(
                    ErrorKind::InvalidResponse,
                    format!("Cannot upgrade {} to HTTPS", info.root_url),
                )
            })?;
        }
        info.root_url = url::with_trailing_slash(info.root_url);

        debug!("Received {:?} for {} service", info, catalog_type);
        Ok(info)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use reqwest::Url;

    use super::{Root, ServiceInfo};
    use crate::services::{GenericService, VersionSelector};
    use crate::{ApiVersion, ErrorKind};

    const SERVICE: GenericService = GenericService::new("test", VersionSelector::Major(1));

    #[test]
    fn test_one_version() {
        let root: Root = serde_json::from_str(
            r#"{"version": {"id": "v1.2", "status": "STABLE",
                "links": [{"rel": "self", "href": "https://example.com/v1.2"}]}}"#,
        )
        .unwrap();
        let info = root.into_service_info(SERVICE).unwrap();
        assert_eq!(info.root_url.as_str(), "https://example.com/v1.2");
        assert_eq!(info.major_version, Some(ApiVersion(1, 2)));
    }

    #[test]
    fn test_one_version_unsupported() {
        let root: Root = serde_json::from_str(
            r#"{"version": {"id": "v2.0",
                "links": [{"rel": "self", "href": "https://example.com/v2"}]}}"#,
        )
        .unwrap();
        let err = root.into_service_info(SERVICE).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
    }

    #[test]
    fn test_no_self_link() {
        let root: Root = serde_json::from_str(
            r#"{"version": {"id": "v1.0",
                "links": [{"rel": "describedby", "href": "https://docs"}]}}"#,
        )
        .unwrap();
        let err = root.into_service_info(SERVICE).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_multiple_versions_picks_highest_stable() {
        let root: Root = serde_json::from_str(
            r#"{"versions": [
                {"id": "v1.0", "status": "SUPPORTED",
                 "links": [{"rel": "self", "href": "https://example.com/v1.0"}]},
                {"id": "v1.1", "status": "CURRENT",
                 "links": [{"rel": "self", "href": "https://example.com/v1.1"}]},
                {"id": "v1.2", "status": "DEPRECATED",
                 "links": [{"rel": "self", "href": "https://example.com/v1.2"}]},
                {"id": "v2.0", "status": "CURRENT",
                 "links": [{"rel": "self", "href": "https://example.com/v2.0"}]}
            ]}"#,
        )
        .unwrap();
        let info = root.into_service_info(SERVICE).unwrap();
        assert_eq!(info.major_version, Some(ApiVersion(1, 1)));
    }

    #[test]
    fn test_identity_wrapped_versions() {
        let root: Root = serde_json::from_str(
            r#"{"versions": {"values": [
                {"id": "v3.14", "status": "stable",
                 "links": [{"rel": "self", "href": "https://example.com/identity/v3/"}]}
            ]}}"#,
        )
        .unwrap();
        let info = root
            .into_service_info(crate::services::IDENTITY)
            .unwrap();
        assert_eq!(info.root_url.as_str(), "https://example.com/identity/v3/");
    }

    #[test]
    fn test_supports_api_version() {
        let info = ServiceInfo {
            root_url: Url::parse("https://example.com/v2.1/").unwrap(),
            major_version: Some(ApiVersion(2, 1)),
            minimum_version: Some(ApiVersion(2, 1)),
            current_version: Some(ApiVersion(2, 42)),
        };
        assert!(info.supports_api_version(ApiVersion(2, 1)));
        assert!(info.supports_api_version(ApiVersion(2, 42)));
        assert!(!info.supports_api_version(ApiVersion(2, 43)));
        assert!(!info.supports_api_version(ApiVersion(2, 0)));
    }
}
