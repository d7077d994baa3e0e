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

//! Networks, subnets, ports and routers.

use log::warn;
use serde_json::{Map, Value};

use super::{filter_list, get_entity, Cloud};
use crate::resource::ResourceKind;
use crate::resources::network::{Network, Port, PortFilter, Router, Subnet};
use crate::{Error, Query};

impl Cloud {
    /// List all networks.
    pub async fn list_networks(&self) -> Result<Vec<Network>, Error> {
        self.cached(ResourceKind::Network, "list_networks", || async {
            self.network.networks(&Query::default()).await
        })
        .await
    }

    /// Search networks by name or ID and field values.
    pub async fn search_networks(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<Network>, Error> {
        filter_list(&self.list_networks().await?, name_or_id, filters)
    }

    /// Get a network by name or ID.
    pub async fn get_network(&self, name_or_id: &str) -> Result<Option<Network>, Error> {
        get_entity(self.search_networks(Some(name_or_id), None).await?, name_or_id)
    }

    /// Networks that can provide floating IPs.
    ///
    /// Networks from the configuration take precedence over the `router:external` flag.
    pub async fn get_external_networks(&self) -> Result<Vec<Network>, Error> {
        let networks = self.list_networks().await?;
        let configured = &self.config.external_networks;
        if !configured.is_empty() {
            let result: Vec<Network> = networks
                .iter()
                .filter(|net| configured.contains(&net.id) || configured.contains(&net.name))
                .cloned()
                .collect();
            if !result.is_empty() {
                return Ok(result);
            }
            warn!(
                "None of the configured external networks {:?} exist, using router:external",
                configured
            );
        }
        Ok(networks.into_iter().filter(|net| net.is_external).collect())
    }

    /// List all subnets.
    pub async fn list_subnets(&self) -> Result<Vec<Subnet>, Error> {
        self.cached(ResourceKind::Subnet, "list_subnets", || async {
            self.network.subnets(&Query::default()).await
        })
        .await
    }

    /// Get a subnet by name or ID.
    pub async fn get_subnet(&self, name_or_id: &str) -> Result<Option<Subnet>, Error> {
        get_entity(
            filter_list(&self.list_subnets().await?, Some(name_or_id), None)?,
            name_or_id,
        )
    }

    /// List all ports.
    pub async fn list_ports(&self) -> Result<Vec<Port>, Error> {
        self.cached(ResourceKind::Port, "list_ports", || async {
            self.network.ports(&Query::default()).await
        })
        .await
    }

    /// Ports of a device (e.g. a server), bypassing the cache.
    pub async fn list_device_ports(&self, device_id: &str) -> Result<Vec<Port>, Error> {
        let query = Query::default().with(PortFilter::DeviceId(device_id.into()));
        self.network.ports(&query).await
    }

    /// List all routers.
    pub async fn list_routers(&self) -> Result<Vec<Router>, Error> {
        self.cached(ResourceKind::Router, "list_routers", || {
            self.network.routers()
        })
        .await
    }

    /// Get a router by name or ID.
    pub async fn get_router(&self, name_or_id: &str) -> Result<Option<Router>, Error> {
        get_entity(
            filter_list(&self.list_routers().await?, Some(name_or_id), None)?,
            name_or_id,
        )
    }
}
