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

//! Low-level code to work with the service catalog.

use log::{debug, error};
use reqwest::Url;

use crate::identity::protocol::{CatalogRecord, Endpoint};
use crate::{EndpointFilters, Error, ErrorKind};

/// Find an endpoint in the service catalog.
///
/// Among endpoints in the requested region the one with the most preferred interface wins.
pub fn find_endpoint<'c>(
    catalog: &'c [CatalogRecord],
    service_type: &str,
    filters: &EndpointFilters,
) -> Result<&'c Endpoint, Error> {
    let svc = catalog
        .iter()
        .find(|x| x.service_type == service_type)
        .ok_or_else(|| Error::new_endpoint_not_found(service_type))?;

    svc.endpoints
        .iter()
        .filter(|x| filters.region_matches(&x.region))
        .filter_map(|x| filters.interfaces.priority(&x.interface).map(|p| (p, x)))
        .min_by_key(|(p, _)| *p)
        .map(|(_, x)| x)
        .ok_or_else(|| Error::new_endpoint_not_found(service_type))
}

/// Extract a URL from the service catalog.
pub fn extract_url(
    catalog: &[CatalogRecord],
    service_type: &str,
    filters: &EndpointFilters,
) -> Result<Url, Error> {
    let endp = find_endpoint(catalog, service_type, filters)?;
    debug!("Received {:?} for {}", endp, service_type);
    Url::parse(&endp.url).map_err(|e| {
        error!(
            "Invalid URL {} received from service catalog for service '{}', filters {:?}: {}",
            endp.url, service_type, filters, e
        );
        Error::new(
            ErrorKind::InvalidResponse,
            format!("Invalid URL {} for {} - {}", endp.url, service_type, e),
        )
    })
}

#[cfg(test)]
pub mod test {
    use crate::identity::protocol::{CatalogRecord, Endpoint};
    use crate::{EndpointFilters, ErrorKind, InterfaceType};

    fn endpoint(interface: &str, region: &str, url: &str) -> Endpoint {
        Endpoint {
            interface: interface.into(),
            region: region.into(),
            url: url.into(),
        }
    }

    pub fn demo_catalog() -> Vec<CatalogRecord> {
        vec![
            CatalogRecord {
                service_type: "network".into(),
                endpoints: vec![
                    endpoint("public", "RegionOne", "https://host.one/network"),
                    endpoint("internal", "RegionOne", "http://192.168.22.1:9696"),
                    endpoint("public", "RegionTwo", "https://host.two:9696"),
                ],
            },
            CatalogRecord {
                service_type: "object-store".into(),
                endpoints: vec![endpoint(
                    "internal",
                    "RegionOne",
                    "http://192.168.22.1:8080/v1/AUTH_abcd",
                )],
            },
        ]
    }

    #[test]
    fn test_extract_url_default() {
        let url = super::extract_url(&demo_catalog(), "network", &Default::default()).unwrap();
        assert_eq!(url.as_str(), "https://host.one/network");
    }

    #[test]
    fn test_extract_url_region() {
        let filters = EndpointFilters::default().with_region("RegionTwo");
        let url = super::extract_url(&demo_catalog(), "network", &filters).unwrap();
        assert_eq!(url.as_str(), "https://host.two:9696/");
    }

    #[test]
    fn test_extract_url_interface_priority() {
        let filters = EndpointFilters::default()
            .with_interfaces(vec![InterfaceType::Internal, InterfaceType::Public]);
        let url = super::extract_url(&demo_catalog(), "network", &filters).unwrap();
        assert_eq!(url.as_str(), "http://192.168.22.1:9696/");

        let url = super::extract_url(&demo_catalog(), "object-store", &filters).unwrap();
        assert_eq!(url.as_str(), "http://192.168.22.1:8080/v1/AUTH_abcd");
    }

    #[test]
    fn test_not_found() {
        let cat = demo_catalog();
        for (service, filters) in &[
            ("compute", EndpointFilters::default()),
            ("object-store", EndpointFilters::default()),
            ("network", EndpointFilters::default().with_region("RegionThree")),
        ] {
            let err = super::find_endpoint(&cat, service, filters).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
        }
    }
}
