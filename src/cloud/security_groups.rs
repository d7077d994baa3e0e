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

//! Security groups from Networking or nova-network.

use log::info;
use serde_json::{Map, Value};

use super::{filter_list, get_entity, Cloud};
use crate::config::SecurityGroupSource;
use crate::normalize::model;
use crate::resource::ResourceKind;
use crate::resources::compute::NovaSecurityGroupRuleCreate;
use crate::resources::network::{Direction, EtherType, SecurityGroupRuleCreate};
use crate::services::NETWORK;
use crate::{Error, ErrorKind, Query, ResultExt};

/// A security group rule to create.
#[derive(Debug, Clone)]
pub struct SecurityGroupRuleOptions {
    /// Name or ID of the security group.
    pub group: String,
    /// First port of the range.
    pub port_range_min: Option<u16>,
    /// Last port of the range.
    pub port_range_max: Option<u16>,
    /// IP protocol (`tcp`, `udp`, `icmp`), any if not set.
    pub protocol: Option<String>,
    /// Remote CIDR.
    pub remote_ip_prefix: Option<String>,
    /// Name or ID of the remote security group.
    pub remote_group: Option<String>,
    /// Direction of traffic.
    pub direction: Direction,
    /// IP version.
    pub ethertype: EtherType,
    /// Project to create the rule in (administrators only).
    pub project_id: Option<String>,
}

impl SecurityGroupRuleOptions {
    /// Ingress IPv4 rule for any protocol.
    pub fn new<S: Into<String>>(group: S) -> SecurityGroupRuleOptions {
        SecurityGroupRuleOptions {
            group: group.into(),
            port_range_min: None,
            port_range_max: None,
            protocol: None,
            remote_ip_prefix: None,
            remote_group: None,
            direction: Direction::Ingress,
            ethertype: EtherType::Ipv4,
            project_id: None,
        }
    }

    /// Set the protocol and the port range.
    pub fn with_ports<S: Into<String>>(mut self, protocol: S, min: u16, max: u16) -> Self {
        self.protocol = Some(protocol.into());
        self.port_range_min = Some(min);
        self.port_range_max = Some(max);
        self
    }

    /// Set the remote CIDR.
    pub fn with_remote_ip_prefix<S: Into<String>>(mut self, value: S) -> Self {
        self.remote_ip_prefix = Some(value.into());
        self
    }

    fn check_range(&self) -> Result<(), Error> {
        if let (Some(min), Some(max)) = (self.port_range_min, self.port_range_max) {
            if min > max {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("Invalid port range {}-{}", min, max),
                ));
            }
        }
        Ok(())
    }
}

fn neutron_rule(
    options: &SecurityGroupRuleOptions,
    group_id: String,
    remote_group_id: Option<String>,
) -> Result<SecurityGroupRuleCreate, Error> {
    options.check_range()?;
    let has_ports = options.port_range_min.is_some() || options.port_range_max.is_some();
    if has_ports && options.protocol.is_none() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "A protocol is required when a port range is specified",
        ));
    }

    let mut request = SecurityGroupRuleCreate::new(group_id);
    request.direction = options.direction;
    request.ethertype = options.ethertype;
    request.protocol = options.protocol.clone();
    request.port_range_min = options.port_range_min;
    request.port_range_max = options.port_range_max;
    request.remote_ip_prefix = options.remote_ip_prefix.clone();
    request.remote_group_id = remote_group_id;
    request.project_id = options.project_id.clone();
    Ok(request)
}

fn nova_rule(
    options: &SecurityGroupRuleOptions,
    group_id: String,
    remote_group_id: Option<String>,
) -> Result<NovaSecurityGroupRuleCreate, Error> {
    options.check_range()?;
    if options.direction != Direction::Ingress {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "nova-network only supports ingress security group rules",
        ));
    }

    let protocol = options.protocol.clone().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            "nova-network security group rules require a protocol",
        )
    })?;

    let (from_port, to_port) = match (options.port_range_min, options.port_range_max) {
        (Some(min), Some(max)) => (i32::from(min), i32::from(max)),
        (None, None) if protocol == "icmp" => (-1, -1),
        (None, None) if protocol == "tcp" || protocol == "udp" => (1, 65535),
        (None, None) => (-1, -1),
        _ => {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "nova-network requires either both or none of the ports",
            ))
        }
    };

    Ok(NovaSecurityGroupRuleCreate {
        parent_group_id: group_id,
        ip_protocol: Some(protocol),
        from_port,
        to_port,
        cidr: options.remote_ip_prefix.clone(),
        group_id: remote_group_id,
    })
}

impl Cloud {
    /// Where security groups come from, resolving `Auto`.
    pub async fn security_group_source(&self) -> Result<SecurityGroupSource, Error> {
        match self.config.security_group_source {
            SecurityGroupSource::Auto => {
                if self.session.has_service(NETWORK).await? {
                    Ok(SecurityGroupSource::Neutron)
                } else {
                    Ok(SecurityGroupSource::Nova)
                }
            }
            other => Ok(other),
        }
    }

    async fn require_security_groups(&self) -> Result<SecurityGroupSource, Error> {
        match self.security_group_source().await? {
            SecurityGroupSource::None => Err(Error::new(
                ErrorKind::OperationFailed,
                "Security groups are not supported by this cloud",
            )),
            other => Ok(other),
        }
    }

    /// List all security groups.
    pub async fn list_security_groups(&self) -> Result<Vec<model::SecurityGroup>, Error> {
        let source = self.require_security_groups().await?;
        self.cached(
            ResourceKind::SecurityGroup,
            "list_security_groups",
            || async {
                let result = if source == SecurityGroupSource::Nova {
                    self.compute
                        .nova_security_groups()
                        .await?
                        .into_iter()
                        .map(|group| self.normalizer.normalize_nova_security_group(group))
                        .collect::<Vec<_>>()
                } else {
                    self.network
                        .security_groups(&Query::default())
                        .await?
                        .into_iter()
                        .map(|group| self.normalizer.normalize_security_group(group))
                        .collect::<Vec<_>>()
                };
                Ok(result)
            },
        )
        .await
    }

    /// Search security groups by name or ID (globs allowed) and field values.
    pub async fn search_security_groups(
        &self,
        name_or_id: Option<&str>,
        filters: Option<&Map<String, Value>>,
    ) -> Result<Vec<model::SecurityGroup>, Error> {
        filter_list(&self.list_security_groups().await?, name_or_id, filters)
    }

    /// Get a security group by name or ID.
    pub async fn get_security_group(
        &self,
        name_or_id: &str,
    ) -> Result<Option<model::SecurityGroup>, Error> {
        get_entity(self.search_security_groups(Some(name_or_id), None).await?, name_or_id)
    }

    async fn security_group_id(&self, name_or_id: &str) -> Result<String, Error> {
        self.get_security_group(name_or_id)
            .await?
            .map(|group| group.id)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::ResourceNotFound,
                    format!("Security group {} was not found", name_or_id),
                )
            })
    }

    /// Create a security group.
    ///
    /// A project can only be requested from the Networking service.
    pub async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        project_id: Option<&str>,
    ) -> Result<model::SecurityGroup, Error> {
        let result = if self.require_security_groups().await? == SecurityGroupSource::Nova {
            if project_id.is_some() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "nova-network cannot create security groups in other projects",
                ));
            }
            let group = self
                .compute
                .create_nova_security_group(name, description)
                .await?;
            self.normalizer.normalize_nova_security_group(group)
        } else {
            let group = self
                .network
                .create_security_group(name, description, project_id)
                .await?;
            self.normalizer.normalize_security_group(group)
        };
        self.invalidate(&[ResourceKind::SecurityGroup]).await;
        info!("Created security group {} ({})", result.name, result.id);
        Ok(result)
    }

    /// Delete a security group, returns `false` if it does not exist.
    pub async fn delete_security_group(&self, name_or_id: &str) -> Result<bool, Error> {
        let source = self.require_security_groups().await?;
        let group = match self.get_security_group(name_or_id).await? {
            Some(group) => group,
            None => return Ok(false),
        };

        let result = if source == SecurityGroupSource::Nova {
            self.compute
                .delete_nova_security_group(&group.id, false)
                .await
        } else {
            self.network.delete_security_group(&group.id, false).await
        };
        let deleted = result.map(|_| true).if_not_found_then(|| Ok(false))?;
        self.invalidate(&[
            ResourceKind::SecurityGroup,
            ResourceKind::SecurityGroupRule,
        ])
        .await;
        if deleted {
            info!("Deleted security group {} ({})", group.name, group.id);
        }
        Ok(deleted)
    }

    /// Add a rule to a security group.
    pub async fn create_security_group_rule(
        &self,
        options: &SecurityGroupRuleOptions,
    ) -> Result<model::SecurityGroupRule, Error> {
        let source = self.require_security_groups().await?;
        let group_id = self.security_group_id(&options.group).await?;
        let remote_group_id = match options.remote_group {
            Some(ref remote) => Some(self.security_group_id(remote).await?),
            None => None,
        };

        let result = if source == SecurityGroupSource::Nova {
            let request = nova_rule(options, group_id, remote_group_id)?;
            let rule = self
                .compute
                .create_nova_security_group_rule(&request)
                .await?;
            self.normalizer.normalize_nova_security_group_rule(rule)
        } else {
            let request = neutron_rule(options, group_id, remote_group_id)?;
            let rule = self.network.create_security_group_rule(&request).await?;
            self.normalizer.normalize_security_group_rule(rule)
        };
        self.invalidate(&[
            ResourceKind::SecurityGroup,
            ResourceKind::SecurityGroupRule,
        ])
        .await;
        Ok(result)
    }

    /// Delete a security group rule, returns `false` if it does not exist.
    pub async fn delete_security_group_rule(&self, id: &str) -> Result<bool, Error> {
        let result = if self.require_security_groups().await? == SecurityGroupSource::Nova {
            self.compute
                .delete_nova_security_group_rule(id, false)
                .await
        } else {
            self.network.delete_security_group_rule(id, false).await
        };
        let deleted = result.map(|_| true).if_not_found_then(|| Ok(false))?;
        self.invalidate(&[
            ResourceKind::SecurityGroup,
            ResourceKind::SecurityGroupRule,
        ])
        .await;
        Ok(deleted)
    }
}
