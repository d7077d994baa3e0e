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

use std::io::Write;

use oscloud::object_store::{ContainerAccess, UploadOptions, UploadOutcome};
use oscloud::{CloudConfig, ErrorKind};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::mock_cloud;

const ROOT: &str = "/v1/AUTH_3d1a8ea6";

async fn mount_info(server: &MockServer, slo: bool) {
    let body = if slo {
        json!({"swift": {"max_file_size": 5368709122u64}, "slo": {"min_segment_size": 1}})
    } else {
        json!({"swift": {"max_file_size": 5368709122u64}})
    };
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_missing_object(server: &MockServer, name: &str) {
    Mock::given(method("HEAD"))
        .and(path(format!("{}/backups/{}", ROOT, name)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_list_containers_paginated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ROOT))
        .and(query_param("marker", "b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ROOT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "a", "count": 1, "bytes": 10},
            {"name": "b", "count": 0, "bytes": 0}
        ])))
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let containers = cloud.list_containers().await.unwrap();
    let names: Vec<&str> = containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_container_access() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("{}/public", ROOT)))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("x-container-read", ".r:*,.rlistings")
                .insert_header("x-container-object-count", "3")
                .insert_header("x-container-meta-owner", "ops"),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(format!("{}/weird", ROOT)))
        .respond_with(ResponseTemplate::new(204).insert_header("x-container-read", "alice"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(format!("{}/missing", ROOT)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    assert_eq!(
        cloud.get_container_access("public").await.unwrap(),
        ContainerAccess::Public
    );
    let info = cloud.get_container("public").await.unwrap().unwrap();
    assert_eq!(info.object_count, 3);
    assert_eq!(info.metadata.get("owner").map(String::as_str), Some("ops"));
    assert!(cloud.get_container_access("weird").await.is_err());
    assert!(cloud.get_container("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_small_object() {
    let server = MockServer::start().await;
    mount_info(&server, true).await;
    mount_missing_object(&server, "small.txt").await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/small.txt", ROOT)))
        .and(header(
            "x-object-meta-x-sdk-md5",
            "5d41402abc4b2a76b9719d911017c592",
        ))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let outcome = cloud
        .object_store()
        .create_object_from_data(
            "backups",
            "small.txt",
            b"hello".to_vec(),
            &UploadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Uploaded);
}

#[tokio::test]
async fn test_upload_unchanged_object() {
    let server = MockServer::start().await;
    mount_info(&server, true).await;
    Mock::given(method("HEAD"))
        .and(path(format!("{}/backups/small.txt", ROOT)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-object-meta-x-sdk-md5", "5d41402abc4b2a76b9719d911017c592")
                .insert_header(
                    "x-object-meta-x-sdk-sha256",
                    "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let outcome = cloud
        .object_store()
        .create_object_from_data(
            "backups",
            "small.txt",
            b"hello".to_vec(),
            &UploadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Unchanged);
}

#[tokio::test]
async fn test_upload_static_large_object() {
    let server = MockServer::start().await;
    mount_info(&server, true).await;
    mount_missing_object(&server, "big.bin").await;
    for index in 0..3 {
        Mock::given(method("PUT"))
            .and(path(format!("{}/backups/big.bin/{:06}", ROOT, index)))
            .respond_with(
                ResponseTemplate::new(201).insert_header("etag", format!("\"etag{}\"", index)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .and(query_param("multipart-manifest", "put"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"0123456789").unwrap();
    file.flush().unwrap();

    let config = CloudConfig {
        segment_size: Some(4),
        ..CloudConfig::default()
    };
    let cloud = mock_cloud(&server, config).await;
    let outcome = cloud
        .create_object("backups", "big.bin", file.path(), &UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Segmented(3));

    let requests = server.received_requests().await.unwrap();
    let manifest = requests
        .iter()
        .find(|r| r.url.query() == Some("multipart-manifest=put"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&manifest.body).unwrap();
    assert_eq!(
        body,
        json!([
            {"path": "/backups/big.bin/000000", "etag": "etag0", "size_bytes": 4},
            {"path": "/backups/big.bin/000001", "etag": "etag1", "size_bytes": 4},
            {"path": "/backups/big.bin/000002", "etag": "etag2", "size_bytes": 2}
        ])
    );
    let last = requests
        .iter()
        .find(|r| r.url.path().ends_with("/big.bin/000002"))
        .unwrap();
    assert_eq!(last.body, b"89".to_vec());
}

#[tokio::test]
async fn test_upload_small_file() {
    let server = MockServer::start().await;
    mount_info(&server, true).await;
    mount_missing_object(&server, "small.txt").await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/small.txt", ROOT)))
        .and(header("content-length", "5"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"hello").unwrap();
    file.flush().unwrap();

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let outcome = cloud
        .create_object("backups", "small.txt", file.path(), &UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Uploaded);
}

#[tokio::test]
async fn test_upload_segment_retried_once() {
    let server = MockServer::start().await;
    mount_info(&server, true).await;
    mount_missing_object(&server, "big.bin").await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin/000001", ROOT)))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/backups/big\.bin/\d{6}$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .and(query_param("multipart-manifest", "put"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let options = UploadOptions {
        segment_size: Some(5),
        ..UploadOptions::default()
    };
    let outcome = cloud
        .object_store()
        .create_object_from_data("backups", "big.bin", b"0123456789".to_vec(), &options)
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Segmented(2));
}

#[tokio::test]
async fn test_upload_segment_fails_twice() {
    let server = MockServer::start().await;
    mount_info(&server, true).await;
    mount_missing_object(&server, "big.bin").await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin/000001", ROOT)))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin/000000", ROOT)))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let options = UploadOptions {
        segment_size: Some(5),
        ..UploadOptions::default()
    };
    let err = cloud
        .object_store()
        .create_object_from_data("backups", "big.bin", b"0123456789".to_vec(), &options)
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InternalServerError);
}

#[tokio::test]
async fn test_upload_dynamic_large_object() {
    let server = MockServer::start().await;
    mount_info(&server, false).await;
    mount_missing_object(&server, "big.bin").await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/backups/big\.bin/\d{6}$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .and(header("x-object-manifest", "backups/big.bin/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    let options = UploadOptions {
        segment_size: Some(5),
        ..UploadOptions::default()
    };
    let outcome = cloud
        .object_store()
        .create_object_from_data("backups", "big.bin", b"0123456789".to_vec(), &options)
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Segmented(2));
}

#[tokio::test]
async fn test_delete_static_large_object() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .respond_with(
            ResponseTemplate::new(200).insert_header("x-static-large-object", "True"),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .and(query_param("multipart-manifest", "delete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    assert!(cloud.delete_object("backups", "big.bin").await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_object() {
    let server = MockServer::start().await;
    mount_missing_object(&server, "gone").await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    assert!(!cloud.delete_object("backups", "gone").await.unwrap());
}

#[tokio::test]
async fn test_delete_dynamic_large_object() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .respond_with(
            ResponseTemplate::new(200).insert_header("x-object-manifest", "backups_segments/big.bin/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/backups/big.bin", ROOT)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/backups_segments", ROOT)))
        .and(query_param("marker", "big.bin/000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/backups_segments", ROOT)))
        .and(query_param("prefix", "big.bin/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "big.bin/000000", "bytes": 5},
            {"name": "big.bin/000001", "bytes": 5}
        ])))
        .mount(&server)
        .await;
    for index in 0..2 {
        Mock::given(method("DELETE"))
            .and(path(format!("{}/backups_segments/big.bin/{:06}", ROOT, index)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path_regex(r"/backups/big\.bin/\d{6}$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let cloud = mock_cloud(&server, CloudConfig::default()).await;
    assert!(cloud.delete_object("backups", "big.bin").await.unwrap());
}
