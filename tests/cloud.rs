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

use std::time::Duration;

use oscloud::{CloudConfig, ErrorKind, FloatingIpSource, SecurityGroupSource};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::{mock_cloud, PROJECT_ID};

fn server_doc(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "status": "ACTIVE",
        "tenant_id": PROJECT_ID,
        "OS-EXT-AZ:availability_zone": "nova",
        "OS-EXT-STS:vm_state": "active",
        "OS-EXT-STS:power_state": 1,
        "flavor": {"original_name": "m1.small"},
        "image": {"id": "img1"},
        "addresses": {
            "private": [
                {"addr": "10.0.0.5", "version": 4, "OS-EXT-IPS:type": "fixed"},
                {"addr": "172.24.4.10", "version": 4, "OS-EXT-IPS:type": "floating"}
            ]
        },
        "metadata": {"role": "web"}
    })
}

#[tokio::test]
async fn test_list_servers_normalized_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "servers": [server_doc("srv1", "web-1"), server_doc("srv2", "db-1")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = CloudConfig::default().with_cache_expiration(Duration::from_secs(60));
    let cloud = mock_cloud(&server, config).await;

    let servers = cloud.list_servers().await.unwrap();
    assert_eq!(servers.len(), 2);
    let web = &servers[0];
    assert_eq!(web.id, "srv1");
    assert_eq!(web.private_v4.as_deref(), Some("10.0.0.5"));
    assert_eq!(web.public_v4.as_deref(), Some("172.24.4.10"));
    assert_eq!(web.interface_ip.as_deref(), Some("172.24.4.10"));
    assert_eq!(web.vm_state.as_deref(), Some("active"));
    assert_eq!(web.power_state, Some(1));
    assert_eq!(web.location.zone.as_deref(), Some("nova"));
    assert_eq!(web.location.project.id.as_deref(), Some(PROJECT_ID));
    assert_eq!(web.location.project.name.as_deref(), Some("demo"));

    // Served from the cache.
    let found = cloud.search_servers(Some("web-*"), None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "web-1");
    let found = cloud.get_server("srv2").await.unwrap().unwrap();
    assert_eq!(found.name, "db-1");
    assert!(cloud.get_server("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_server_ambiguous() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "servers": [server_doc("srv1", "web"), server_doc("srv2", "web")]
        })))
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let err = cloud.get_server("web").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::TooManyItems);
}

#[tokio::test]
async fn test_nova_floating_ips() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/os-floating-ips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floating_ips": [
                {"id": "1", "ip": "172.24.4.10", "fixed_ip": "10.0.0.5",
                 "instance_id": "srv1", "pool": "public"},
                {"id": "2", "ip": "172.24.4.11", "fixed_ip": null,
                 "instance_id": null, "pool": "public"}
            ]
        })))
        .mount(&server)
        .await;

    let config = CloudConfig {
        floating_ip_source: FloatingIpSource::Nova,
        ..CloudConfig::default()
    };
    let cloud = mock_cloud(&server, config).await;

    let ips = cloud.list_floating_ips().await.unwrap();
    assert_eq!(ips.len(), 2);
    assert!(ips[0].attached);
    assert_eq!(ips[0].network.as_deref(), Some("public"));
    assert!(!ips[1].attached);

    let available = cloud.available_floating_ip(Some("public")).await.unwrap();
    assert_eq!(available.floating_ip_address, "172.24.4.11");
}

#[tokio::test]
async fn test_delete_floating_ip_verified() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/network/v2.0/floatingips/fip1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/v2.0/floatingips/fip1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    assert!(cloud.delete_floating_ip("fip1", 2).await.unwrap());
}

#[tokio::test]
async fn test_delete_floating_ip_stays() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/network/v2.0/floatingips/fip1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/v2.0/floatingips/fip1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floatingip": {
                "id": "fip1",
                "floating_ip_address": "172.24.4.10",
                "floating_network_id": "ext"
            }
        })))
        .mount(&server)
        .await;

    let config = CloudConfig {
        floating_ip_source: FloatingIpSource::Neutron,
        ..CloudConfig::default()
    };
    let cloud = mock_cloud(&server, config).await;
    let err = cloud.delete_floating_ip("fip1", 1).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::OperationFailed);
}

#[tokio::test]
async fn test_delete_missing_floating_ip() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/network/v2.0/floatingips/fip1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    assert!(!cloud.delete_floating_ip("fip1", 2).await.unwrap());
}

#[tokio::test]
async fn test_attach_floating_ip_neutron() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/srv1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"server": server_doc("srv1", "web")})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/v2.0/floatingips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floatingips": [{
                "id": "fip1",
                "floating_ip_address": "172.24.4.10",
                "floating_network_id": "ext",
                "project_id": PROJECT_ID
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/v2.0/ports"))
        .and(query_param("device_id", "srv1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [{
                "id": "port1",
                "network_id": "private",
                "fixed_ips": [{"subnet_id": "s1", "ip_address": "10.0.0.5"}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/network/v2.0/floatingips/fip1"))
        .and(body_partial_json(json!({
            "floatingip": {"port_id": "port1", "fixed_ip_address": "10.0.0.5"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floatingip": {
                "id": "fip1",
                "floating_ip_address": "172.24.4.10",
                "floating_network_id": "ext",
                "port_id": "port1",
                "fixed_ip_address": "10.0.0.5"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let srv = cloud.get_server_by_id("srv1").await.unwrap().unwrap();
    let ip = cloud.get_floating_ip("172.24.4.10").await.unwrap().unwrap();
    assert!(!ip.attached);

    let updated = cloud
        .attach_ip_to_server(&srv, &ip, None, None, true, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(updated.public_v4.as_deref(), Some("172.24.4.10"));
}

#[tokio::test]
async fn test_security_groups_disabled() {
    let server = MockServer::start().await;
    let config = CloudConfig {
        security_group_source: SecurityGroupSource::None,
        ..CloudConfig::default()
    };
    let cloud = mock_cloud(&server, config).await;
    let err = cloud.list_security_groups().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::OperationFailed);
}

#[tokio::test]
async fn test_nova_security_groups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/os-security-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_groups": [{
                "id": "sg1",
                "name": "default",
                "description": "Default group",
                "tenant_id": PROJECT_ID,
                "rules": [{
                    "id": "r1",
                    "parent_group_id": "sg1",
                    "ip_protocol": "tcp",
                    "from_port": 22,
                    "to_port": 22,
                    "ip_range": {"cidr": "0.0.0.0/0"},
                    "group": {}
                }]
            }]
        })))
        .mount(&server)
        .await;

    let config = CloudConfig {
        security_group_source: SecurityGroupSource::Nova,
        ..CloudConfig::default()
    };
    let cloud = mock_cloud(&server, config).await;
    let group = cloud.get_security_group("default").await.unwrap().unwrap();
    assert_eq!(group.id, "sg1");
    assert_eq!(group.security_group_rules.len(), 1);
    let rule = &group.security_group_rules[0];
    assert_eq!(rule.direction, "ingress");
    assert_eq!(rule.ethertype, "IPv4");
    assert_eq!(rule.port_range_min, Some(22));
}

#[tokio::test]
async fn test_create_floating_ip_invalidates_servers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v2.1/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "servers": [server_doc("srv1", "web-1")]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network/v2.0/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "networks": [
                {"id": "private", "name": "private"},
                {"id": "ext", "name": "public", "router:external": true}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/network/v2.0/floatingips"))
        .and(body_partial_json(json!({
            "floatingip": {"floating_network_id": "ext"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "floatingip": {
                "id": "fip1",
                "floating_ip_address": "172.24.4.20",
                "floating_network_id": "ext",
                "project_id": PROJECT_ID,
                "status": "DOWN"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = CloudConfig::default().with_cache_expiration(Duration::from_secs(60));
    let cloud = mock_cloud(&server, config).await;

    assert_eq!(cloud.list_servers().await.unwrap().len(), 1);
    assert_eq!(cloud.list_servers().await.unwrap().len(), 1);
    assert_eq!(cloud.list_networks().await.unwrap().len(), 2);

    let ip = cloud.create_floating_ip(None, None, None).await.unwrap();
    assert_eq!(ip.id, "fip1");
    assert_eq!(ip.floating_ip_address, "172.24.4.20");
    assert_eq!(ip.network.as_deref(), Some("ext"));

    // The server listing is fetched again, networks are still cached.
    assert_eq!(cloud.list_servers().await.unwrap().len(), 1);
    assert_eq!(cloud.list_networks().await.unwrap().len(), 2);
}
