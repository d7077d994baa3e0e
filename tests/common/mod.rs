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

#![allow(dead_code)]

use oscloud::{AuthScope, Cloud, CloudConfig, NoAuth, Session};
use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_ID: &str = "3d1a8ea6";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn mount_discovery(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/compute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": {
                "id": "v2.1",
                "status": "CURRENT",
                "version": "2.42",
                "min_version": "2.1",
                "links": [{"rel": "self", "href": format!("{}/compute/v2.1/", uri)}]
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "versions": [{
                "id": "v2.0",
                "status": "CURRENT",
                "links": [{"rel": "self", "href": format!("{}/network/v2.0/", uri)}]
            }]
        })))
        .mount(server)
        .await;
}

/// A session talking to the mock server, one path prefix per service.
pub async fn mock_session(server: &MockServer) -> Session {
    mount_discovery(server).await;
    let uri = server.uri();
    let scope = AuthScope {
        project_id: Some(PROJECT_ID.into()),
        project_name: Some("demo".into()),
        domain_id: Some("default".into()),
        ..AuthScope::default()
    };
    let auth = NoAuth::new(&uri).unwrap().with_scope(scope);
    Session::new(auth)
        .await
        .unwrap()
        .with_endpoint_override("compute", Url::parse(&format!("{}/compute", uri)).unwrap())
        .with_endpoint_override("network", Url::parse(&format!("{}/network", uri)).unwrap())
        .with_endpoint_override(
            "object-store",
            Url::parse(&format!("{}/v1/AUTH_{}", uri, PROJECT_ID)).unwrap(),
        )
}

pub async fn mock_cloud(server: &MockServer, config: CloudConfig) -> Cloud {
    init_logging();
    let session = mock_session(server).await;
    Cloud::new(session, config).await.unwrap()
}
