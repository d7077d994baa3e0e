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

//! Servers, flavors and key pairs.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use serde_json::{Map, Value};

use super::{filter_list, get_entity, Cloud, DEFAULT_WAIT_TIMEOUT};
use crate::normalize::model;
use crate::proxy::DEFAULT_POLL_INTERVAL;
use crate::resource::ResourceKind;
use crate::resources::compute::{
    AddressType, KeyPair, KeyPairCreate, NameRef, ServerCreate, ServerFilter, ServerNetwork,
};
use crate::{Error, ErrorKind, Query, ResultExt};

/// Parameters of a new server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Server name.
    pub name: String,
    /// Image name or ID, `None` when booting from a volume.
    pub image: Option<String>,
    /// Flavor name or ID.
    pub flavor: String,
    /// Key pair name.
    pub key_name: Option<String>,
    /// Network names or IDs.
    pub networks: Vec<String>,
    /// Security group names.
    pub security_groups: Vec<String>,
    /// Metadata.
    pub metadata: HashMap<String, String>,
    /// Availability zone.
    pub availability_zone: Option<String>,
    /// Base64-encoded user data.
    pub user_data: Option<String>,
    /// Wait for the server to become `ACTIVE`.
    pub wait: bool,
    /// How long to wait.
    pub timeout: Duration,
    /// Attach a floating IP (requires `wait`).
    pub auto_ip: bool,
    /// Reuse unattached floating IPs with `auto_ip`.
    pub reuse_ips: bool,
}

impl ServerOptions {
    /// Options with the name and the flavor, everything else is default.
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, flavor: S2) -> ServerOptions {
        ServerOptions {
            name: name.into(),
            image: None,
            flavor: flavor.into(),
            key_name: None,
            networks: Vec::new(),
            security_groups: Vec::new(),
            metadata: HashMap::new(),
            availability_zone: None,
            user_data: None,
            wait: false,
            timeout: DEFAULT_WAIT_TIMEOUT,
            auto_ip: false,
            reuse_ips: true,
        }
    }

    /// Set the image.
    #[inline]
    pub fn with_image<S: Into<String>>(mut self, value: S) -> ServerOptions {
        self.image = Some(value.into());
        self
    }

    /// Add a network.
    #[inline]
    pub fn with_network<S: Into<String>>(mut self, value: S) -> ServerOptions {
        self.networks.push(value.into());
        self
    }

    /// Wait for the server to become active.
    #[inline]
    pub fn with_wait(mut self, timeout: Duration) -> ServerOptions {
        self.wait = true;
        self.timeout = timeout;
        self
    }

    /// Attach a floating IP after the server becomes active.
    #[inline]
    pub fn with_auto_ip(mut self, reuse_ips: bool) -> ServerOptions {
        self.auto_ip = true;
        self.reuse_ips = reuse_ips;
        self
    }
}

impl Cloud {
    /// List all servers.
    pub async fn list_servers(&self) -> Result<Vec<model::Server>, Error> {
        self.cached(ResourceKind::Server, "list_servers", || async {
            let servers = self.compute.servers(&Query::default()).await?;
            Ok(servers
                .into_iter()
                .map(|server| self.normalizer.normalize_server(server))
                .collect::<Vec<_>>())
        })
        .await
    }

    /// Search servers by name or ID (globs allowed) and field values.
    pub async fn search_servers(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::Server>, Error> {
        filter_list(&self.list_servers().await?, name_or_id, filters)
    }

    /// Get a server by name or ID.
    pub async fn get_server(&self, name_or_id: &str) -> Result<Option<model::Server>, Error> {
        get_entity(self.search_servers(Some(name_or_id), None).await?, name_or_id)
    }

    /// Get a server by ID, bypassing the cache.
    pub async fn get_server_by_id(&self, id: &str) -> Result<Option<model::Server>, Error> {
        self.compute
            .get_server(id)
            .await
            .map(|server| Some(self.normalizer.normalize_server(server)))
            .if_not_found_then(|| Ok(None))
    }

    /// Servers with the given status (using server-side filtering).
    pub async fn list_servers_with_status(
        &self,
        status: &str,
    ) -> Result<Vec<model::Server>, Error> {
        let query = Query::default().with(ServerFilter::Status(status.into()));
        Ok(self
            .compute
            .servers(&query)
            .await?
            .into_iter()
            .map(|server| self.normalizer.normalize_server(server))
            .collect())
    }

    /// Create a server.
    ///
    /// Image, flavor and networks are resolved by name or ID.
    pub async fn create_server(&self, options: &ServerOptions) -> Result<model::Server, Error> {
        let image_ref = match options.image {
            Some(ref image) => Some(
                self.get_image(image)
                    .await?
                    .ok_or_else(|| not_found("image", image))?
                    .id,
            ),
            None => None,
        };
        let flavor = self
            .get_flavor(&options.flavor)
            .await?
            .ok_or_else(|| not_found("flavor", &options.flavor))?;

        let mut networks = Vec::with_capacity(options.networks.len());
        for name in &options.networks {
            let network = self
                .get_network(name)
                .await?
                .ok_or_else(|| not_found("network", name))?;
            networks.push(ServerNetwork {
                uuid: Some(network.id),
                ..ServerNetwork::default()
            });
        }

        let request = ServerCreate {
            name: options.name.clone(),
            image_ref,
            flavor_ref: flavor.id,
            key_name: options.key_name.clone(),
            networks,
            security_groups: options
                .security_groups
                .iter()
                .map(|name| NameRef { name: name.clone() })
                .collect(),
            metadata: options.metadata.clone(),
            availability_zone: options.availability_zone.clone(),
            user_data: options.user_data.clone(),
            config_drive: None,
        };
        let created = self.compute.create_server(&request).await?;
        self.invalidate(&[ResourceKind::Server]).await;
        info!("Created server {} ({})", options.name, created.id);

        if !options.wait {
            let admin_password = created.admin_password.clone();
            let mut server = self.normalizer.normalize_server(created);
            server.admin_password = admin_password;
            return Ok(server);
        }

        let active = self
            .compute
            .wait_for_server(&created.id, "ACTIVE", DEFAULT_POLL_INTERVAL, options.timeout)
            .await?;
        let mut server = self.normalizer.normalize_server(active);
        server.admin_password = created.admin_password;

        if options.auto_ip && server.public_v4.is_none() && server.public_v6.is_none() {
            server = self
                .add_auto_ip(&server, true, options.timeout, options.reuse_ips)
                .await?;
        }
        Ok(server)
    }

    /// Delete a server by name or ID.
    ///
    /// Returns `false` if the server does not exist. With `delete_ips` the floating IPs of the
    /// server are deleted as well.
    pub async fn delete_server(
        &self,
        name_or_id: &str,
        delete_ips: bool,
        wait: bool,
        timeout: Duration,
    ) -> Result<bool, Error> {
        let server = match self.get_server(name_or_id).await? {
            Some(server) => server,
            None => {
                debug!("Server {} does not exist, nothing to delete", name_or_id);
                return Ok(false);
            }
        };

        if delete_ips {
            self.delete_server_ips(&server).await?;
        }

        self.compute.delete_server(&server.id, true).await?;
        if wait {
            self.compute
                .wait_for_server_delete(&server.id, DEFAULT_POLL_INTERVAL, timeout)
                .await?;
        }
        self.invalidate(&[ResourceKind::Server, ResourceKind::FloatingIp])
            .await;
        info!("Deleted server {} ({})", server.name, server.id);
        Ok(true)
    }

    async fn delete_server_ips(&self, server: &model::Server) -> Result<(), Error> {
        let floating: Vec<String> = server
            .addresses
            .values()
            .flatten()
            .filter(|addr| addr.addr_type == AddressType::Floating)
            .map(|addr| addr.addr.clone())
            .collect();
        if floating.is_empty() {
            return Ok(());
        }

        for ip in self.list_floating_ips().await? {
            if floating.contains(&ip.floating_ip_address) {
                debug!(
                    "Deleting floating IP {} of server {}",
                    ip.floating_ip_address, server.id
                );
                let _ = self.delete_floating_ip(&ip.id, 2).await?;
            }
        }
        Ok(())
    }

    /// List all flavors.
    pub async fn list_flavors(&self) -> Result<Vec<model::Flavor>, Error> {
        self.cached(ResourceKind::Flavor, "list_flavors", || async {
            let flavors = self.compute.flavors(&Query::default()).await?;
            Ok(flavors
                .into_iter()
                .map(|flavor| self.normalizer.normalize_flavor(flavor))
                .collect::<Vec<_>>())
        })
        .await
    }

    /// Search flavors by name or ID and field values.
    pub async fn search_flavors(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::Flavor>, Error> {
        filter_list(&self.list_flavors().await?, name_or_id, filters)
    }

    /// Get a flavor by name or ID.
    pub async fn get_flavor(&self, name_or_id: &str) -> Result<Option<model::Flavor>, Error> {
        get_entity(self.search_flavors(Some(name_or_id), None).await?, name_or_id)
    }

    /// The smallest flavor with at least this much RAM (in MiB).
    pub async fn get_flavor_by_ram(&self, ram: u64) -> Result<model::Flavor, Error> {
        let mut flavors: Vec<_> = self
            .list_flavors()
            .await?
            .into_iter()
            .filter(|flavor| flavor.ram >= ram && !flavor.is_disabled)
            .collect();
        flavors.sort_by_key(|flavor| flavor.ram);
        flavors.into_iter().next().ok_or_else(|| {
            Error::new(
                ErrorKind::ResourceNotFound,
                format!("No flavor with at least {} MiB of RAM", ram),
            )
        })
    }

    /// List key pairs.
    pub async fn list_keypairs(&self) -> Result<Vec<KeyPair>, Error> {
        self.cached(ResourceKind::KeyPair, "list_keypairs", || {
            self.compute.keypairs()
        })
        .await
    }

    /// Get a key pair by name.
    pub async fn get_keypair(&self, name: &str) -> Result<Option<KeyPair>, Error> {
        get_entity(filter_list(&self.list_keypairs().await?, Some(name), None)?, name)
    }

    /// Create or import a key pair.
    pub async fn create_keypair(
        &self,
        name: &str,
        public_key: Option<&str>,
    ) -> Result<KeyPair, Error> {
        let request = KeyPairCreate {
            name: name.into(),
            public_key: public_key.map(From::from),
        };
        let result = self.compute.create_keypair(&request).await?;
        self.invalidate(&[ResourceKind::KeyPair]).await;
        Ok(result)
    }

    /// Delete a key pair, returns `false` if it does not exist.
    pub async fn delete_keypair(&self, name: &str) -> Result<bool, Error> {
        let result = self
            .compute
            .delete_keypair(name, false)
            .await
            .map(|_| true)
            .if_not_found_then(|| Ok(false))?;
        self.invalidate(&[ResourceKind::KeyPair]).await;
        Ok(result)
    }
}

fn not_found(kind: &str, name_or_id: &str) -> Error {
    Error::new(
        ErrorKind::ResourceNotFound,
        format!("No {} with name or ID {}", kind, name_or_id),
    )
}

#[cfg(test)]
pub mod test {
    use std::time::Duration;

    use super::ServerOptions;

    #[test]
    fn test_server_options() {
        let options = ServerOptions::new("web", "m1.small")
            .with_image("cirros")
            .with_network("private")
            .with_wait(Duration::from_secs(60))
            .with_auto_ip(false);
        assert_eq!(options.image.as_deref(), Some("cirros"));
        assert_eq!(options.networks, vec!["private"]);
        assert!(options.wait);
        assert!(options.auto_ip);
        assert!(!options.reuse_ips);
        assert_eq!(options.timeout, Duration::from_secs(60));
    }
}
