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

//! Flavors and servers.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::model;
use super::{take_string, take_u64, Normalizer};
use crate::resources::compute::{AddressType, Flavor, Server, ServerAddress};

#[derive(Debug, Default, PartialEq, Eq)]
struct ServerIps {
    private_v4: Option<String>,
    public_v4: Option<String>,
    public_v6: Option<String>,
}

fn is_global_v6(addr: &Ipv6Addr) -> bool {
    let first = addr.segments()[0];
    // Neither link-local (fe80::/10) nor unique local (fc00::/7).
    !addr.is_loopback() && (first & 0xffc0) != 0xfe80 && (first & 0xfe00) != 0xfc00
}

fn infer_ips(
    addresses: &HashMap<String, Vec<ServerAddress>>,
    access_ipv4: Option<&str>,
    access_ipv6: Option<&str>,
) -> ServerIps {
    let mut networks: Vec<_> = addresses.iter().collect();
    networks.sort_by(|(a, _), (b, _)| a.cmp(b));
    let all: Vec<&ServerAddress> = networks
        .into_iter()
        .flat_map(|(_, addrs)| addrs.iter())
        .collect();

    let v4 = |addr: &&ServerAddress| -> Option<Ipv4Addr> {
        if addr.version == 6 {
            None
        } else {
            addr.addr.parse().ok()
        }
    };

    let fixed_v4: Vec<Ipv4Addr> = all
        .iter()
        .filter(|a| a.addr_type != AddressType::Floating)
        .filter_map(v4)
        .collect();
    let private_v4 = fixed_v4
        .iter()
        .find(|ip| ip.is_private())
        .or_else(|| fixed_v4.first())
        .map(|ip| ip.to_string());

    let public_v4 = access_ipv4.map(From::from).or_else(|| {
        all.iter()
            .filter(|a| a.addr_type == AddressType::Floating)
            .find_map(v4)
            .or_else(|| {
                fixed_v4
                    .iter()
                    .find(|ip| !ip.is_private() && !ip.is_loopback() && !ip.is_link_local())
                    .copied()
            })
            .map(|ip| ip.to_string())
    });

    let public_v6 = access_ipv6.map(From::from).or_else(|| {
        all.iter()
            .filter(|a| a.version == 6)
            .filter_map(|a| a.addr.parse::<Ipv6Addr>().ok())
            .find(is_global_v6)
            .map(|ip| ip.to_string())
    });

    ServerIps {
        private_v4,
        public_v4,
        public_v6,
    }
}

impl Normalizer {
    /// Normalize a flavor.
    pub fn normalize_flavor(&self, flavor: Flavor) -> model::Flavor {
        model::Flavor {
            id: flavor.id,
            name: flavor.name,
            ram: flavor.ram,
            vcpus: flavor.vcpus,
            disk: flavor.disk,
            swap: flavor.swap,
            ephemeral: flavor.ephemeral,
            is_public: flavor.is_public,
            is_disabled: flavor.is_disabled,
            rxtx_factor: flavor.rxtx_factor.unwrap_or(1.0),
            description: flavor.description,
            extra_specs: flavor.extra_specs,
            location: self.location_for(None, None),
            properties: self.properties(flavor.extra),
        }
    }

    /// Normalize a server.
    pub fn normalize_server(&self, server: Server) -> model::Server {
        let mut extra = server.extra;
        let ips = infer_ips(
            &server.addresses,
            server.access_ipv4.as_deref(),
            server.access_ipv6.as_deref(),
        );
        let interface_ip = ips
            .public_v4
            .clone()
            .or_else(|| ips.public_v6.clone())
            .or_else(|| ips.private_v4.clone());
        let location = self.location_for(
            server.project_id.as_deref(),
            server.availability_zone.as_deref(),
        );

        model::Server {
            vm_state: take_string(&mut extra, "OS-EXT-STS:vm_state"),
            task_state: take_string(&mut extra, "OS-EXT-STS:task_state"),
            power_state: take_u64(&mut extra, "OS-EXT-STS:power_state"),
            host: take_string(&mut extra, "OS-EXT-SRV-ATTR:host"),
            hypervisor_hostname: take_string(&mut extra, "OS-EXT-SRV-ATTR:hypervisor_hostname"),
            instance_name: take_string(&mut extra, "OS-EXT-SRV-ATTR:instance_name"),
            id: server.id,
            name: server.name,
            status: server.status,
            flavor: server
                .flavor
                .and_then(|flavor| flavor.original_name.or(flavor.id)),
            image_id: server.image.map(|image| image.id),
            key_name: server.key_name,
            metadata: server.metadata,
            security_groups: server
                .security_groups
                .into_iter()
                .map(|group| group.name)
                .collect(),
            addresses: server.addresses,
            private_v4: ips.private_v4,
            public_v4: ips.public_v4,
            public_v6: ips.public_v6,
            interface_ip,
            volumes: server
                .volumes_attached
                .into_iter()
                .map(|volume| volume.id)
                .collect(),
            created: server.created,
            updated: server.updated,
            admin_password: server.admin_password,
            location,
            properties: self.properties(extra),
        }
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::super::test::location;
    use super::*;

    fn server_json() -> serde_json::Value {
        json!({
            "id": "s1",
            "name": "web",
            "status": "ACTIVE",
            "tenant_id": "p1",
            "OS-EXT-AZ:availability_zone": "nova",
            "OS-EXT-STS:vm_state": "active",
            "OS-EXT-STS:task_state": null,
            "OS-EXT-STS:power_state": 1,
            "OS-EXT-SRV-ATTR:host": "compute-1",
            "image": "",
            "flavor": {"original_name": "m1.small", "ram": 2048},
            "addresses": {
                "private": [
                    {"addr": "10.0.0.5", "version": 4, "OS-EXT-IPS:type": "fixed"},
                    {"addr": "172.24.4.10", "version": 4, "OS-EXT-IPS:type": "floating"},
                    {"addr": "fe80::1", "version": 6, "OS-EXT-IPS:type": "fixed"},
                    {"addr": "2001:db8::5", "version": 6, "OS-EXT-IPS:type": "fixed"}
                ]
            },
            "security_groups": [{"name": "default"}],
            "os-extended-volumes:volumes_attached": [{"id": "v1"}],
            "hostId": "abcd"
        })
    }

    #[test]
    fn test_normalize_server() {
        let server: Server = serde_json::from_value(server_json()).unwrap();
        let result = Normalizer::new(false, location()).normalize_server(server);
        assert_eq!(result.vm_state.as_deref(), Some("active"));
        assert!(result.task_state.is_none());
        assert_eq!(result.power_state, Some(1));
        assert_eq!(result.host.as_deref(), Some("compute-1"));
        assert!(result.image_id.is_none());
        assert_eq!(result.flavor.as_deref(), Some("m1.small"));
        assert_eq!(result.private_v4.as_deref(), Some("10.0.0.5"));
        assert_eq!(result.public_v4.as_deref(), Some("172.24.4.10"));
        assert_eq!(result.public_v6.as_deref(), Some("2001:db8::5"));
        assert_eq!(result.interface_ip.as_deref(), Some("172.24.4.10"));
        assert_eq!(result.security_groups, vec!["default"]);
        assert_eq!(result.volumes, vec!["v1"]);
        assert_eq!(result.location.zone.as_deref(), Some("nova"));
        assert_eq!(result.location.project.name.as_deref(), Some("demo"));
        assert_eq!(result.properties.get("hostId"), Some(&json!("abcd")));
        assert!(!result.properties.contains_key("OS-EXT-STS:vm_state"));
    }

    #[test]
    fn test_normalize_server_strict() {
        let server: Server = serde_json::from_value(server_json()).unwrap();
        let result = Normalizer::new(true, location()).normalize_server(server);
        assert!(result.properties.is_empty());
    }

    #[test]
    fn test_infer_ips_public_fixed() {
        let addresses: HashMap<String, Vec<ServerAddress>> = serde_json::from_value(json!({
            "public": [{"addr": "203.0.113.7", "version": 4}],
            "private": [{"addr": "192.168.1.4", "version": 4}]
        }))
        .unwrap();
        let ips = infer_ips(&addresses, None, None);
        assert_eq!(ips.private_v4.as_deref(), Some("192.168.1.4"));
        assert_eq!(ips.public_v4.as_deref(), Some("203.0.113.7"));
        assert!(ips.public_v6.is_none());

        let ips = infer_ips(&addresses, Some("198.51.100.1"), Some("2001:db8::1"));
        assert_eq!(ips.public_v4.as_deref(), Some("198.51.100.1"));
        assert_eq!(ips.public_v6.as_deref(), Some("2001:db8::1"));
    }

    #[test]
    fn test_infer_ips_empty() {
        assert_eq!(
            infer_ips(&HashMap::new(), None, None),
            ServerIps::default()
        );
    }

    #[test]
    fn test_normalize_flavor() {
        let flavor: Flavor = serde_json::from_value(json!({
            "id": "1",
            "name": "m1.tiny",
            "ram": 512,
            "vcpus": 1,
            "disk": 1,
            "swap": "",
            "OS-FLV-EXT-DATA:ephemeral": 0,
            "os-flavor-access:is_public": false,
            "OS-FLV-DISABLED:disabled": false,
            "links": []
        }))
        .unwrap();
        let result = Normalizer::new(false, location()).normalize_flavor(flavor);
        assert_eq!(result.swap, 0);
        assert!(!result.is_public);
        assert_eq!(result.rxtx_factor, 1.0);
        assert!(result.location.zone.is_none());
        assert!(result.properties.contains_key("links"));
    }
}
