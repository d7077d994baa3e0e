// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Per-service endpoint information.

use std::collections::HashMap;

use log::debug;
use reqwest::Url;
use tokio::sync::RwLock;

use crate::client::AuthenticatedClient;
use crate::protocol::ServiceInfo;
use crate::services::ServiceType;
use crate::{EndpointFilters, Error, ErrorKind};

/// Discovered service information, endpoint overrides and filters.
#[derive(Debug)]
pub struct EndpointCache {
    info: RwLock<HashMap<&'static str, ServiceInfo>>,
    pub filters: EndpointFilters,
    overrides: HashMap<String, Url>,
}

impl Clone for EndpointCache {
    /// Clone the cache removing the discovered information but keeping filters and overrides.
    fn clone(&self) -> EndpointCache {
        EndpointCache {
            info: RwLock::new(HashMap::new()),
            filters: self.filters.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

impl Default for EndpointCache {
    fn default() -> EndpointCache {
        EndpointCache::new(EndpointFilters::default())
    }
}

fn check_endpoint(url: &Url, catalog_type: &str) -> Result<(), Error> {
    if url.cannot_be_a_base() || !url.has_host() {
        Err(Error::new(
            ErrorKind::InvalidResponse,
            format!("Invalid URL {} received for service {}", url, catalog_type),
        ))
    } else {
        Ok(())
    }
}

impl EndpointCache {
    /// Create a new empty cache with the given filters.
    #[inline]
    pub fn new(filters: EndpointFilters) -> EndpointCache {
        EndpointCache {
            info: RwLock::new(HashMap::new()),
            filters,
            overrides: HashMap::new(),
        }
    }

    /// Use the given URL for the service instead of the catalog.
    ///
    /// Discovery still runs against the override.
    pub fn set_override<S: Into<String>>(&mut self, catalog_type: S, url: Url) {
        let catalog_type = catalog_type.into();
        debug!("Using endpoint override {} for {}", url, catalog_type);
        let _ = self.info.get_mut().remove(catalog_type.as_str());
        let _ = self.overrides.insert(catalog_type, url);
    }

    /// Endpoint override for the service (if any).
    #[inline]
    pub fn get_override(&self, catalog_type: &str) -> Option<&Url> {
        self.overrides.get(catalog_type)
    }

    /// Forget everything discovered so far.
    #[inline]
    pub fn clear(&mut self) {
        self.info.get_mut().clear();
    }

    /// Run `filter` on the service information, discovering it first if needed.
    pub async fn extract_service_info<Srv, F, T>(
        &self,
        client: &AuthenticatedClient,
        service: Srv,
        filter: F,
    ) -> Result<T, Error>
    where
        Srv: ServiceType,
        F: FnOnce(&ServiceInfo) -> T + Send,
        T: Send,
    {
        let catalog_type = service.catalog_type();
        if let Some(info) = self.info.read().await.get(catalog_type) {
            return Ok(filter(info));
        }

        debug!("No information for service {}, discovering", catalog_type);

        let mut lock = self.info.write().await;
        // Another task may have finished discovery while we were waiting for the lock.
        if let Some(info) = lock.get(catalog_type) {
            return Ok(filter(info));
        }

        let endpoint = match self.get_override(catalog_type) {
            Some(found) => found.clone(),
            None => client.get_endpoint(catalog_type, &self.filters).await?,
        };
        check_endpoint(&endpoint, catalog_type)?;

        let info = ServiceInfo::fetch(service, endpoint, client).await?;
        let value = filter(&info);
        let _ = lock.insert(catalog_type, info);
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn with_info(mut self, catalog_type: &'static str, info: ServiceInfo) -> Self {
        let _ = self.info.get_mut().insert(catalog_type, info);
        self
    }
}
