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

//! Floating IPs from Networking or nova-network.

use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio::time::{sleep, Instant};

use super::{filter_list, Cloud};
use crate::config::FloatingIpSource;
use crate::normalize::model;
use crate::proxy::DEFAULT_POLL_INTERVAL;
use crate::resource::ResourceKind;
use crate::resources::network::{FloatingIpCreate, Port};
use crate::services::NETWORK;
use crate::{Error, ErrorKind, Query, ResultExt};

/// Pick the port and the fixed IPv4 address to map a floating IP to.
///
/// With `network_id` only ports on this network are considered. An explicit `fixed_address`
/// must belong to one of the ports. Otherwise the first IPv4 fixed address wins.
pub fn select_nat_port(
    ports: Vec<Port>,
    fixed_address: Option<&str>,
    network_id: Option<&str>,
) -> Result<(Port, String), Error> {
    if ports.is_empty() {
        return Err(Error::new(
            ErrorKind::OperationFailed,
            "The server has no ports to attach a floating IP to",
        ));
    }

    let ports: Vec<Port> = match network_id {
        Some(network_id) => {
            let on_network: Vec<Port> = ports
                .into_iter()
                .filter(|port| port.network_id == network_id)
                .collect();
            if on_network.is_empty() {
                return Err(Error::new(
                    ErrorKind::OperationFailed,
                    format!(
                        "The server has no ports on the NAT destination network {}",
                        network_id
                    ),
                ));
            }
            on_network
        }
        None => ports,
    };

    if let Some(fixed_address) = fixed_address {
        return ports
            .into_iter()
            .find(|port| {
                port.fixed_ips
                    .iter()
                    .any(|ip| ip.ip_address.as_deref() == Some(fixed_address))
            })
            .map(|port| (port, fixed_address.to_string()))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::OperationFailed,
                    format!("No port of the server has fixed address {}", fixed_address),
                )
            });
    }

    let mut candidates: Vec<(Port, String)> = Vec::new();
    for port in ports {
        let addresses: Vec<String> = port
            .fixed_ips
            .iter()
            .filter_map(|ip| ip.ip_address.as_deref())
            .filter(|ip| ip.parse::<Ipv4Addr>().is_ok())
            .map(From::from)
            .collect();
        for address in addresses {
            candidates.push((port.clone(), address));
        }
    }

    if candidates.len() > 1 {
        warn!(
            "Several fixed IPv4 addresses can receive a floating IP, using {} of port {}",
            candidates[0].1, candidates[0].0.id
        );
    }
    candidates.into_iter().next().ok_or_else(|| {
        Error::new(
            ErrorKind::OperationFailed,
            "The server has no fixed IPv4 addresses to attach a floating IP to",
        )
    })
}

impl Cloud {
    /// Where floating IPs come from, resolving `Auto`.
    pub async fn floating_ip_source(&self) -> Result<FloatingIpSource, Error> {
        match self.config.floating_ip_source {
            FloatingIpSource::Auto => {
                if self.session.has_service(NETWORK).await? {
                    Ok(FloatingIpSource::Neutron)
                } else {
                    Ok(FloatingIpSource::Nova)
                }
            }
            other => Ok(other),
        }
    }

    /// List all floating IPs.
    pub async fn list_floating_ips(&self) -> Result<Vec<model::FloatingIp>, Error> {
        let source = self.floating_ip_source().await?;
        self.cached(ResourceKind::FloatingIp, "list_floating_ips", || async {
            let result = if source == FloatingIpSource::Nova {
                self.compute
                    .nova_floating_ips()
                    .await?
                    .into_iter()
                    .map(|ip| self.normalizer.normalize_nova_floating_ip(ip))
                    .collect::<Vec<_>>()
            } else {
                self.network
                    .floating_ips(&Query::default())
                    .await?
                    .into_iter()
                    .map(|ip| self.normalizer.normalize_floating_ip(ip))
                    .collect::<Vec<_>>()
            };
            Ok(result)
        })
        .await
    }

    /// Search floating IPs by field values.
    pub async fn search_floating_ips(
        &self,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::FloatingIp>, Error> {
        filter_list(&self.list_floating_ips().await?, None, filters)
    }

    /// Get a floating IP by ID or address.
    pub async fn get_floating_ip(
        &self,
        id_or_address: &str,
    ) -> Result<Option<model::FloatingIp>, Error> {
        Ok(self
            .list_floating_ips()
            .await?
            .into_iter()
            .find(|ip| ip.id == id_or_address || ip.floating_ip_address == id_or_address))
    }

    async fn floating_ip_exists(&self, source: FloatingIpSource, id: &str) -> Result<bool, Error> {
        if source == FloatingIpSource::Nova {
            Ok(self
                .compute
                .nova_floating_ips()
                .await?
                .iter()
                .any(|ip| ip.id == id))
        } else {
            self.network
                .get_floating_ip(id)
                .await
                .map(|_| true)
                .if_not_found_then(|| Ok(false))
        }
    }

    async fn resolve_floating_network(&self, network: Option<&str>) -> Result<String, Error> {
        match network {
            Some(name_or_id) => self
                .get_network(name_or_id)
                .await?
                .map(|net| net.id)
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::ResourceNotFound,
                        format!("Network {} was not found", name_or_id),
                    )
                }),
            None => self
                .get_external_networks()
                .await?
                .into_iter()
                .next()
                .map(|net| net.id)
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::ResourceNotFound,
                        "No external networks to allocate floating IPs from",
                    )
                }),
        }
    }

    /// Create a floating IP on the network (or the first external one).
    ///
    /// Ports and fixed addresses are only supported by the Networking service.
    pub async fn create_floating_ip(
        &self,
        network: Option<&str>,
        port_id: Option<&str>,
        fixed_address: Option<&str>,
    ) -> Result<model::FloatingIp, Error> {
        let result = if self.floating_ip_source().await? == FloatingIpSource::Nova {
            if port_id.is_some() || fixed_address.is_some() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "nova-network floating IPs cannot be created on a port",
                ));
            }
            let ip = self.compute.create_nova_floating_ip(network).await?;
            self.normalizer.normalize_nova_floating_ip(ip)
        } else {
            let request = FloatingIpCreate {
                floating_network_id: self.resolve_floating_network(network).await?,
                port_id: port_id.map(From::from),
                fixed_ip_address: fixed_address.map(From::from),
                ..FloatingIpCreate::default()
            };
            let ip = self.network.create_floating_ip(&request).await?;
            self.normalizer.normalize_floating_ip(ip)
        };
        self.invalidate(&[ResourceKind::FloatingIp, ResourceKind::Server])
            .await;
        info!(
            "Created floating IP {} ({})",
            result.floating_ip_address, result.id
        );
        Ok(result)
    }

    async fn find_or_create_floating_ip(
        &self,
        network: Option<&str>,
    ) -> Result<(model::FloatingIp, bool), Error> {
        let source = self.floating_ip_source().await?;
        let network_id = if source == FloatingIpSource::Nova {
            network.map(From::from)
        } else {
            Some(self.resolve_floating_network(network).await?)
        };
        let project_id = self.normalizer.location().project.id.clone();

        let existing = self.list_floating_ips().await?.into_iter().find(|ip| {
            !ip.attached
                && (network_id.is_none() || ip.network == network_id)
                && (project_id.is_none() || ip.location.project.id == project_id)
        });
        if let Some(ip) = existing {
            debug!("Reusing floating IP {}", ip.floating_ip_address);
            return Ok((ip, false));
        }

        let ip = self
            .create_floating_ip(network_id.as_deref(), None, None)
            .await?;
        Ok((ip, true))
    }

    /// An unattached floating IP on the network, created if none exists.
    pub async fn available_floating_ip(
        &self,
        network: Option<&str>,
    ) -> Result<model::FloatingIp, Error> {
        self.find_or_create_floating_ip(network)
            .await
            .map(|(ip, _)| ip)
    }

    /// Port and fixed address of the server to map a floating IP to.
    ///
    /// Without an explicit `nat_destination` the configured one is used.
    pub async fn nat_destination_port(
        &self,
        server: &model::Server,
        fixed_address: Option<&str>,
        nat_destination: Option<&str>,
    ) -> Result<(Port, String), Error> {
        let ports = self.list_device_ports(&server.id).await?;
        let nat_destination = nat_destination
            .map(From::from)
            .or_else(|| self.config.nat_destination.clone());
        let network_id = match nat_destination {
            Some(name_or_id) => Some(
                self.get_network(&name_or_id)
                    .await?
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::InvalidInput,
                            format!("NAT destination network {} was not found", name_or_id),
                        )
                    })?
                    .id,
            ),
            None => None,
        };
        select_nat_port(ports, fixed_address, network_id.as_deref())
    }

    /// Attach a floating IP to a server.
    ///
    /// With `wait` the call returns once the server reports the address.
    pub async fn attach_ip_to_server(
        &self,
        server: &model::Server,
        floating_ip: &model::FloatingIp,
        fixed_address: Option<&str>,
        nat_destination: Option<&str>,
        wait: bool,
        timeout: Duration,
    ) -> Result<model::Server, Error> {
        if self.floating_ip_source().await? == FloatingIpSource::Nova {
            self.compute
                .add_floating_ip_to_server(
                    &server.id,
                    &floating_ip.floating_ip_address,
                    fixed_address,
                )
                .await?;
        } else {
            let (port, fixed) = self
                .nat_destination_port(server, fixed_address, nat_destination)
                .await?;
            debug!(
                "Attaching floating IP {} to port {} ({}) of server {}",
                floating_ip.floating_ip_address, port.id, fixed, server.id
            );
            let _ = self
                .network
                .associate_floating_ip(&floating_ip.id, Some(&port.id), Some(&fixed))
                .await?;
        }
        self.invalidate(&[ResourceKind::FloatingIp, ResourceKind::Server])
            .await;

        if !wait {
            return self.refreshed_server(&server.id).await;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let current = self.refreshed_server(&server.id).await?;
            let attached = current
                .addresses
                .values()
                .flatten()
                .any(|addr| addr.addr == floating_ip.floating_ip_address);
            if attached {
                return Ok(current);
            }
            if Instant::now() >= deadline {
                return Err(Error::new(
                    ErrorKind::OperationTimedOut,
                    format!(
                        "Timeout waiting for floating IP {} to appear on server {}",
                        floating_ip.floating_ip_address, server.id
                    ),
                ));
            }
            sleep(DEFAULT_POLL_INTERVAL).await;
        }
    }

    async fn refreshed_server(&self, id: &str) -> Result<model::Server, Error> {
        self.get_server_by_id(id).await?.ok_or_else(|| {
            Error::new(
                ErrorKind::ResourceNotFound,
                format!("Server {} disappeared", id),
            )
        })
    }

    /// Detach a floating IP from a server, returns `false` if it was not attached.
    pub async fn detach_ip_from_server(
        &self,
        server_id: &str,
        floating_ip_id: &str,
    ) -> Result<bool, Error> {
        let ip = match self.get_floating_ip(floating_ip_id).await? {
            Some(ip) if ip.attached => ip,
            _ => return Ok(false),
        };

        if self.floating_ip_source().await? == FloatingIpSource::Nova {
            self.compute
                .remove_floating_ip_from_server(server_id, &ip.floating_ip_address)
                .await?;
        } else {
            let _ = self
                .network
                .associate_floating_ip(&ip.id, None, None)
                .await?;
        }
        self.invalidate(&[ResourceKind::FloatingIp, ResourceKind::Server])
            .await;
        info!(
            "Detached floating IP {} from server {}",
            ip.floating_ip_address, server_id
        );
        Ok(true)
    }

    /// Delete a floating IP, verifying that it is gone.
    ///
    /// Returns `false` if it did not exist. Deletion is repeated up to `retry` times.
    pub async fn delete_floating_ip(&self, id: &str, retry: u32) -> Result<bool, Error> {
        let source = self.floating_ip_source().await?;
        for attempt in 0..=retry {
            let result = if source == FloatingIpSource::Nova {
                self.compute.delete_nova_floating_ip(id, false).await
            } else {
                self.network.delete_floating_ip(id, false).await
            };
            let deleted = result.map(|_| true).if_not_found_then(|| Ok(false))?;
            self.invalidate(&[ResourceKind::FloatingIp, ResourceKind::Server])
                .await;

            if !deleted {
                return Ok(attempt > 0);
            }
            if !self.floating_ip_exists(source, id).await? {
                return Ok(true);
            }
            warn!(
                "Floating IP {} still exists after deletion (attempt {} of {})",
                id,
                attempt + 1,
                retry + 1
            );
        }

        Err(Error::new(
            ErrorKind::OperationFailed,
            format!(
                "Floating IP {} still exists after {} deletion attempts",
                id,
                retry + 1
            ),
        ))
    }

    /// Attach a floating IP from the default external network to the server.
    ///
    /// A newly created IP is deleted again if attaching it fails.
    pub async fn add_auto_ip(
        &self,
        server: &model::Server,
        wait: bool,
        timeout: Duration,
        reuse: bool,
    ) -> Result<model::Server, Error> {
        let (ip, created) = if reuse {
            self.find_or_create_floating_ip(None).await?
        } else if self.floating_ip_source().await? == FloatingIpSource::Nova {
            (self.create_floating_ip(None, None, None).await?, true)
        } else {
            let (port, fixed) = self.nat_destination_port(server, None, None).await?;
            let ip = self
                .create_floating_ip(None, Some(&port.id), Some(&fixed))
                .await?;
            if !wait {
                return self.refreshed_server(&server.id).await;
            }
            return self
                .attach_ip_to_server(server, &ip, Some(&fixed), None, wait, timeout)
                .await;
        };

        match self
            .attach_ip_to_server(server, &ip, None, None, wait, timeout)
            .await
        {
            Ok(server) => Ok(server),
            Err(err) if created => {
                warn!(
                    "Attaching floating IP {} to server {} failed, deleting it: {}",
                    ip.floating_ip_address, server.id, err
                );
                if let Err(cleanup) = self.delete_floating_ip(&ip.id, 0).await {
                    warn!(
                        "Could not delete floating IP {}: {}",
                        ip.floating_ip_address, cleanup
                    );
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::select_nat_port;
    use crate::resources::network::Port;
    use crate::ErrorKind;

    fn ports() -> Vec<Port> {
        serde_json::from_value(json!([
            {
                "id": "port1",
                "network_id": "private",
                "fixed_ips": [
                    {"subnet_id": "s6", "ip_address": "fd00::5"},
                    {"subnet_id": "s4", "ip_address": "10.0.0.5"}
                ]
            },
            {
                "id": "port2",
                "network_id": "storage",
                "fixed_ips": [{"subnet_id": "s5", "ip_address": "192.168.10.5"}]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_first_ipv4_wins() {
        let (port, address) = select_nat_port(ports(), None, None).unwrap();
        assert_eq!(port.id, "port1");
        assert_eq!(address, "10.0.0.5");
    }

    #[test]
    fn test_nat_destination() {
        let (port, address) = select_nat_port(ports(), None, Some("storage")).unwrap();
        assert_eq!(port.id, "port2");
        assert_eq!(address, "192.168.10.5");
        let err = select_nat_port(ports(), None, Some("missing")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
    }

    #[test]
    fn test_fixed_address() {
        let (port, address) = select_nat_port(ports(), Some("192.168.10.5"), None).unwrap();
        assert_eq!(port.id, "port2");
        assert_eq!(address, "192.168.10.5");
        assert!(select_nat_port(ports(), Some("192.168.10.5"), Some("private")).is_err());
        assert!(select_nat_port(ports(), Some("10.9.9.9"), None).is_err());
    }

    #[test]
    fn test_no_candidates() {
        assert!(select_nat_port(Vec::new(), None, None).is_err());
        let v6_only: Vec<Port> = serde_json::from_value(json!([{
            "id": "port1",
            "network_id": "private",
            "fixed_ips": [{"ip_address": "fd00::5"}]
        }]))
        .unwrap();
        let err = select_nat_port(v6_only, None, None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
    }
}
