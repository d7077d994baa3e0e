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

//! Security groups and floating IPs from both Networking and nova-network.

use std::convert::TryFrom;

use serde_json::{Map, Value};

use super::model;
use super::Normalizer;
use crate::resources::compute::{NovaFloatingIp, NovaSecurityGroup, NovaSecurityGroupRule};
use crate::resources::network::{FloatingIp, SecurityGroup, SecurityGroupRule};

// nova-network uses -1 for "any port".
fn nova_port(port: Option<i32>) -> Option<u16> {
    port.and_then(|p| u16::try_from(p).ok())
}

impl Normalizer {
    /// Normalize a Networking security group rule.
    pub fn normalize_security_group_rule(
        &self,
        rule: SecurityGroupRule,
    ) -> model::SecurityGroupRule {
        model::SecurityGroupRule {
            location: self.location_for(rule.project_id.as_deref(), None),
            id: rule.id,
            security_group_id: Some(rule.security_group_id),
            direction: rule.direction.as_str().to_string(),
            ethertype: rule.ethertype.as_str().to_string(),
            protocol: rule.protocol,
            port_range_min: rule.port_range_min,
            port_range_max: rule.port_range_max,
            remote_ip_prefix: rule.remote_ip_prefix,
            remote_group_id: rule.remote_group_id,
            properties: Map::new(),
        }
    }

    /// Normalize a nova-network security group rule.
    ///
    /// nova-network only has ingress rules.
    pub fn normalize_nova_security_group_rule(
        &self,
        rule: NovaSecurityGroupRule,
    ) -> model::SecurityGroupRule {
        let ethertype = match rule.ip_range.cidr {
            Some(ref cidr) if cidr.contains(':') => "IPv6",
            _ => "IPv4",
        };
        let mut extra = Map::new();
        if let Some(name) = rule.group.name {
            let _ = extra.insert("group".into(), Value::String(name));
        }
        model::SecurityGroupRule {
            location: self.location_for(rule.group.tenant_id.as_deref(), None),
            id: rule.id,
            security_group_id: rule.parent_group_id,
            direction: "ingress".into(),
            ethertype: ethertype.into(),
            protocol: rule.ip_protocol,
            port_range_min: nova_port(rule.from_port),
            port_range_max: nova_port(rule.to_port),
            remote_ip_prefix: rule.ip_range.cidr,
            remote_group_id: None,
            properties: self.properties(extra),
        }
    }

    /// Normalize a Networking security group.
    pub fn normalize_security_group(&self, group: SecurityGroup) -> model::SecurityGroup {
        let mut extra = group.extra;
        if let Some(stateful) = group.stateful {
            let _ = extra.insert("stateful".into(), Value::Bool(stateful));
        }
        model::SecurityGroup {
            location: self.location_for(group.project_id.as_deref(), None),
            id: group.id,
            name: group.name,
            description: group.description,
            security_group_rules: group
                .security_group_rules
                .into_iter()
                .map(|rule| self.normalize_security_group_rule(rule))
                .collect(),
            properties: self.properties(extra),
        }
    }

    /// Normalize a nova-network security group.
    pub fn normalize_nova_security_group(&self, group: NovaSecurityGroup) -> model::SecurityGroup {
        model::SecurityGroup {
            location: self.location_for(group.tenant_id.as_deref(), None),
            id: group.id,
            name: group.name,
            description: group.description,
            security_group_rules: group
                .rules
                .into_iter()
                .map(|rule| self.normalize_nova_security_group_rule(rule))
                .collect(),
            properties: Map::new(),
        }
    }

    /// Normalize a Networking floating IP.
    pub fn normalize_floating_ip(&self, ip: FloatingIp) -> model::FloatingIp {
        let attached = ip.port_id.as_deref().map(|p| !p.is_empty()).unwrap_or(false);
        model::FloatingIp {
            location: self.location_for(ip.project_id.as_deref(), None),
            id: ip.id,
            floating_ip_address: ip.floating_ip_address,
            network: Some(ip.floating_network_id),
            fixed_ip_address: ip.fixed_ip_address,
            port_id: ip.port_id,
            router_id: ip.router_id,
            status: ip.status,
            attached,
            properties: self.properties(ip.extra),
        }
    }

    /// Normalize a nova-network floating IP.
    ///
    /// Such IPs are always active, they are attached when mapped to a server.
    pub fn normalize_nova_floating_ip(&self, ip: NovaFloatingIp) -> model::FloatingIp {
        let mut extra = Map::new();
        if let Some(ref instance_id) = ip.instance_id {
            let _ = extra.insert("instance_id".into(), Value::String(instance_id.clone()));
        }
        model::FloatingIp {
            location: self.location_for(None, None),
            id: ip.id,
            floating_ip_address: ip.ip,
            network: ip.pool,
            fixed_ip_address: ip.fixed_ip,
            port_id: None,
            router_id: None,
            status: Some("ACTIVE".into()),
            attached: ip.instance_id.is_some(),
            properties: self.properties(extra),
        }
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::super::test::location;
    use super::*;

    #[test]
    fn test_nova_port() {
        assert_eq!(nova_port(Some(-1)), None);
        assert_eq!(nova_port(None), None);
        assert_eq!(nova_port(Some(22)), Some(22));
    }

    #[test]
    fn test_nova_security_group() {
        let group: NovaSecurityGroup = serde_json::from_value(json!({
            "id": "1",
            "name": "default",
            "description": "Default group",
            "tenant_id": "p1",
            "rules": [
                {
                    "id": "r1",
                    "parent_group_id": "1",
                    "ip_protocol": "tcp",
                    "from_port": 22,
                    "to_port": 22,
                    "ip_range": {"cidr": "0.0.0.0/0"},
                    "group": {}
                },
                {
                    "id": "r2",
                    "parent_group_id": "1",
                    "ip_protocol": "icmp",
                    "from_port": -1,
                    "to_port": -1,
                    "ip_range": {"cidr": "::/0"},
                    "group": {"name": "other", "tenant_id": "p2"}
                }
            ]
        }))
        .unwrap();
        let result = Normalizer::new(false, location()).normalize_nova_security_group(group);
        assert_eq!(result.name, "default");
        assert_eq!(result.location.project.name.as_deref(), Some("demo"));
        let rules = &result.security_group_rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].direction, "ingress");
        assert_eq!(rules[0].ethertype, "IPv4");
        assert_eq!(rules[0].port_range_min, Some(22));
        assert_eq!(rules[1].ethertype, "IPv6");
        assert_eq!(rules[1].port_range_min, None);
        assert_eq!(rules[1].port_range_max, None);
        assert_eq!(rules[1].properties.get("group"), Some(&json!("other")));
        assert_eq!(rules[1].location.project.id.as_deref(), Some("p2"));
    }

    #[test]
    fn test_neutron_security_group() {
        let group: SecurityGroup = serde_json::from_value(json!({
            "id": "g1",
            "name": "web",
            "project_id": "p1",
            "security_group_rules": [{
                "id": "r1",
                "security_group_id": "g1",
                "direction": "egress",
                "ethertype": "IPv6",
                "protocol": null
            }],
            "revision_number": 3
        }))
        .unwrap();
        let result = Normalizer::new(false, location()).normalize_security_group(group);
        assert_eq!(result.security_group_rules[0].direction, "egress");
        assert_eq!(result.security_group_rules[0].ethertype, "IPv6");
        assert!(result.security_group_rules[0].protocol.is_none());
        assert_eq!(result.properties.get("revision_number"), Some(&json!(3)));
    }

    #[test]
    fn test_floating_ips() {
        let normalizer = Normalizer::new(false, location());
        let neutron: FloatingIp = serde_json::from_value(json!({
            "id": "f1",
            "floating_ip_address": "172.24.4.3",
            "floating_network_id": "ext",
            "port_id": "port1",
            "status": "ACTIVE"
        }))
        .unwrap();
        let result = normalizer.normalize_floating_ip(neutron);
        assert!(result.attached);
        assert_eq!(result.network.as_deref(), Some("ext"));

        let nova: NovaFloatingIp = serde_json::from_value(json!({
            "id": "1",
            "ip": "172.24.4.4",
            "pool": "public",
            "instance_id": null,
            "fixed_ip": null
        }))
        .unwrap();
        let result = normalizer.normalize_nova_floating_ip(nova);
        assert!(!result.attached);
        assert_eq!(result.network.as_deref(), Some("public"));
        assert_eq!(result.status.as_deref(), Some("ACTIVE"));
    }
}
