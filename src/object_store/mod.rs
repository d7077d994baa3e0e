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

//! Object storage: containers, objects and large object uploads.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::client::{RequestBuilder, NO_PATH};
use crate::services::{GenericService, OBJECT_STORAGE};
use crate::task::{wait_for_futures, TaskManager};
use crate::{Error, ErrorKind, Session};

mod segments;

pub use self::segments::{
    ObjectHashes, SloInfo, StorageInfo, SwiftInfo, DEFAULT_MAX_FILE_SIZE, DEFAULT_SEGMENT_SIZE,
};
use self::segments::{plan_segments, segment_name, ManifestEntry, ObjectSource, Segment};

/// Metadata key with the MD5 hash of the uploaded data.
pub const MD5_METADATA: &str = "x-sdk-md5";
/// Metadata key with the SHA-256 hash of the uploaded data.
pub const SHA256_METADATA: &str = "x-sdk-sha256";

const PUBLIC_READ_ACL: &str = ".r:*,.rlistings";
const CONTAINER_META: &str = "x-container-meta-";
const OBJECT_META: &str = "x-object-meta-";

// Everything except for unreserved characters and slashes.
const MANIFEST_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A container in a listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Container {
    /// Container name.
    pub name: String,
    /// Number of objects.
    #[serde(default)]
    pub count: u64,
    /// Total size of objects.
    #[serde(default)]
    pub bytes: u64,
    /// Last modification date.
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// An object in a listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Object {
    /// Object name.
    pub name: String,
    /// MD5 hash (ETag) of the object.
    #[serde(default)]
    pub hash: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// Content type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Last modification date.
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// Container details (from headers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Container name.
    pub name: String,
    /// Number of objects.
    pub object_count: u64,
    /// Total size of objects.
    pub bytes_used: u64,
    /// Read ACL.
    pub read_acl: Option<String>,
    /// Write ACL.
    pub write_acl: Option<String>,
    /// Custom metadata (keys without the prefix, lower case).
    pub metadata: HashMap<String, String>,
}

/// Object details (from headers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Container name.
    pub container: String,
    /// Object name.
    pub name: String,
    /// Size in bytes.
    pub content_length: u64,
    /// Content type.
    pub content_type: Option<String>,
    /// ETag (MD5 of the data or of the manifest).
    pub etag: Option<String>,
    /// Last modification date.
    pub last_modified: Option<String>,
    /// Custom metadata (keys without the prefix, lower case).
    pub metadata: HashMap<String, String>,
    /// Whether this is a static large object manifest.
    pub is_static_large_object: bool,
    /// Segment prefix of a dynamic large object manifest.
    pub manifest: Option<String>,
}

/// Container access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerAccess {
    /// Anyone can read and list.
    Public,
    /// Only the owner has access.
    Private,
}

impl ContainerAccess {
    fn read_acl(self) -> &'static str {
        match self {
            ContainerAccess::Public => PUBLIC_READ_ACL,
            ContainerAccess::Private => "",
        }
    }
}

/// Options for uploading an object.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Known MD5 of the data (computed if not provided).
    pub md5: Option<String>,
    /// Known SHA-256 of the data (computed if not provided).
    pub sha256: Option<String>,
    /// Requested segment size for large objects.
    pub segment_size: Option<u64>,
    /// Use static large objects (dynamic otherwise).
    pub use_slo: bool,
    /// Content type.
    pub content_type: Option<String>,
    /// Custom metadata.
    pub metadata: HashMap<String, String>,
}

impl Default for UploadOptions {
    fn default() -> UploadOptions {
        UploadOptions {
            md5: None,
            sha256: None,
            segment_size: None,
            use_slo: true,
            content_type: None,
            metadata: HashMap::new(),
        }
    }
}

/// What happened during an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The object already had the same content.
    Unchanged,
    /// The object was uploaded in one request.
    Uploaded,
    /// The object was uploaded as a large object with this number of segments.
    Segmented(usize),
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(From::from)
}

fn header_u64(headers: &HeaderMap, name: &str) -> u64 {
    header_str(headers, name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn metadata_from_headers(headers: &HeaderMap, prefix: &str) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(prefix)?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

// Pseudo-directories in object names become path segments.
fn object_path<'a>(container: &'a str, name: &'a str) -> Vec<&'a str> {
    std::iter::once(container).chain(name.split('/')).collect()
}

fn info_url(root: &Url) -> Result<Url, Error> {
    let path = root.path();
    let prefix = match path.find("/v1") {
        Some(idx) => &path[..idx],
        None => path.trim_end_matches('/'),
    };
    root.join(&format!("{}/info", prefix)).map_err(Error::from)
}

/// Object storage proxy.
#[derive(Debug, Clone)]
pub struct ObjectStoreProxy {
    session: Session,
    tasks: TaskManager,
}

impl ObjectStoreProxy {
    /// Create a proxy with a task manager for segment uploads.
    pub fn new(session: Session, tasks: TaskManager) -> ObjectStoreProxy {
        ObjectStoreProxy { session, tasks }
    }

    /// Session in use.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn start<I>(
        &self,
        method: Method,
        path: I,
    ) -> Result<RequestBuilder<GenericService>, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.session.request(OBJECT_STORAGE, method, path).await
    }

    async fn listing<T, F>(
        &self,
        path: &[&str],
        prefix: Option<&str>,
        name_of: F,
    ) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> &str,
    {
        let mut result = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut query = vec![("format", "json".to_string())];
            if let Some(prefix) = prefix {
                query.push(("prefix", prefix.to_string()));
            }
            if let Some(marker) = marker.take() {
                query.push(("marker", marker));
            }

            let response = self.start(Method::GET, path).await?.query(&query).send().await?;
            if response.status() == StatusCode::NO_CONTENT {
                break;
            }
            let page: Vec<T> = response.json().await?;
            match page.last() {
                Some(last) => marker = Some(name_of(last).to_string()),
                None => break,
            }
            result.extend(page);
        }
        Ok(result)
    }

    /// Capabilities of the cluster.
    ///
    /// Clusters that do not publish them (HTTP 412) get the defaults.
    pub async fn storage_info(&self) -> Result<StorageInfo, Error> {
        let root = self.session.get_endpoint(OBJECT_STORAGE, NO_PATH).await?;
        let url = info_url(&root)?;
        match self
            .session
            .client()
            .request_service(OBJECT_STORAGE, Method::GET, url)
            .fetch_json()
            .await
        {
            Ok(info) => Ok(info),
            Err(err) if err.status() == Some(StatusCode::PRECONDITION_FAILED) => {
                debug!("Object storage capabilities are not available, using defaults");
                Ok(StorageInfo::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Segment size for large objects: requested or default, within the cluster limits.
    pub async fn segment_size(&self, requested: Option<u64>) -> Result<u64, Error> {
        Ok(self.storage_info().await?.segment_size(requested))
    }

    /// List containers.
    pub async fn containers(&self) -> Result<Vec<Container>, Error> {
        self.listing(&[], None, |c: &Container| &c.name).await
    }

    /// Get container details.
    pub async fn get_container(&self, name: &str) -> Result<ContainerInfo, Error> {
        let response = self.start(Method::HEAD, &[name]).await?.send().await?;
        let headers = response.headers();
        Ok(ContainerInfo {
            name: name.to_string(),
            object_count: header_u64(headers, "x-container-object-count"),
            bytes_used: header_u64(headers, "x-container-bytes-used"),
            read_acl: header_str(headers, "x-container-read"),
            write_acl: header_str(headers, "x-container-write"),
            metadata: metadata_from_headers(headers, CONTAINER_META),
        })
    }

    /// Create a container, optionally with public read access.
    pub async fn create_container(&self, name: &str, public: bool) -> Result<(), Error> {
        debug!("Creating container {}", name);
        let mut builder = self.start(Method::PUT, &[name]).await?;
        if public {
            builder = builder.header("x-container-read", PUBLIC_READ_ACL);
        }
        let _ = builder.send().await?;
        Ok(())
    }

    /// Delete an empty container.
    pub async fn delete_container(&self, name: &str, ignore_missing: bool) -> Result<(), Error> {
        debug!("Deleting container {}", name);
        match self.start(Method::DELETE, &[name]).await?.send().await {
            Ok(_) => Ok(()),
            Err(err) if ignore_missing && err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Set container access.
    pub async fn set_container_access(
        &self,
        name: &str,
        access: ContainerAccess,
    ) -> Result<(), Error> {
        debug!("Setting {:?} access to container {}", access, name);
        let _ = self
            .start(Method::POST, &[name])
            .await?
            .header("x-container-read", access.read_acl())
            .send()
            .await?;
        Ok(())
    }

    /// Get container access.
    ///
    /// Fails with `InvalidResponse` for ACLs other than public and private.
    pub async fn get_container_access(&self, name: &str) -> Result<ContainerAccess, Error> {
        let info = self.get_container(name).await?;
        match info.read_acl.as_deref() {
            None | Some("") => Ok(ContainerAccess::Private),
            Some(acl) if acl == PUBLIC_READ_ACL => Ok(ContainerAccess::Public),
            Some(acl) => Err(Error::new(
                ErrorKind::InvalidResponse,
                format!("Could not determine access of container {} from ACL {}", name, acl),
            )),
        }
    }

    /// List objects, optionally with the prefix.
    pub async fn objects(
        &self,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<Object>, Error> {
        self.listing(&[container], prefix, |o: &Object| &o.name).await
    }

    /// Get object details without downloading it.
    pub async fn get_object_metadata(
        &self,
        container: &str,
        name: &str,
    ) -> Result<ObjectInfo, Error> {
        let response = self
            .start(Method::HEAD, object_path(container, name))
            .await?
            .send()
            .await?;
        let headers = response.headers();
        Ok(ObjectInfo {
            container: container.to_string(),
            name: name.to_string(),
            content_length: header_u64(headers, CONTENT_LENGTH.as_str()),
            content_type: header_str(headers, CONTENT_TYPE.as_str()),
            etag: header_str(headers, ETAG.as_str()).map(|e| e.trim_matches('"').to_string()),
            last_modified: header_str(headers, LAST_MODIFIED.as_str()),
            metadata: metadata_from_headers(headers, OBJECT_META),
            is_static_large_object: header_str(headers, "x-static-large-object")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            manifest: header_str(headers, "x-object-manifest"),
        })
    }

    /// Download an object into memory.
    pub async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .start(Method::GET, object_path(container, name))
            .await?
            .send()
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download an object into a file.
    pub async fn download_object_to_file<P: AsRef<Path>>(
        &self,
        container: &str,
        name: &str,
        path: P,
    ) -> Result<u64, Error> {
        let mut response = self
            .start(Method::GET, object_path(container, name))
            .await?
            .send()
            .await?;
        let mut file = tokio::fs::File::create(path.as_ref()).await?;
        let mut written = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        debug!("Downloaded {} bytes of {}/{}", written, container, name);
        Ok(written)
    }

    /// Update custom metadata of an object (replacing the existing metadata).
    pub async fn update_object_metadata(
        &self,
        container: &str,
        name: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), Error> {
        let mut builder = self.start(Method::POST, object_path(container, name)).await?;
        for (key, value) in metadata {
            builder = builder.header(format!("{}{}", OBJECT_META, key), value.as_str());
        }
        let _ = builder.send().await?;
        Ok(())
    }

    /// Delete an object, including segments of large objects.
    pub async fn delete_object(
        &self,
        container: &str,
        name: &str,
        ignore_missing: bool,
    ) -> Result<(), Error> {
        let info = match self.get_object_metadata(container, name).await {
            Ok(info) => info,
            Err(err) if ignore_missing && err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        let mut builder = self.start(Method::DELETE, object_path(container, name)).await?;
        if info.is_static_large_object {
            debug!("Deleting static large object {}/{} with segments", container, name);
            builder = builder.query(&[("multipart-manifest", "delete")]);
        }
        match builder.send().await {
            Ok(_) => {}
            Err(err) if ignore_missing && err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }

        if let Some((segments_container, prefix)) =
            info.manifest.as_deref().and_then(parse_manifest)
        {
            debug!(
                "Deleting segments of dynamic large object {}/{} from {}/{}",
                container, name, segments_container, prefix
            );
            for segment in self.objects(&segments_container, Some(&prefix)).await? {
                self.delete_plain_object(&segments_container, &segment.name).await?;
            }
        }
        Ok(())
    }

    async fn delete_plain_object(&self, container: &str, name: &str) -> Result<(), Error> {
        match self.start(Method::DELETE, object_path(container, name)).await?.send().await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Whether the object is missing or has different hashes.
    pub async fn is_object_stale(
        &self,
        container: &str,
        name: &str,
        hashes: &ObjectHashes,
    ) -> Result<bool, Error> {
        let info = match self.get_object_metadata(container, name).await {
            Ok(info) => info,
            Err(err) if err.is_not_found() => {
                debug!("Object {}/{} does not exist yet", container, name);
                return Ok(true);
            }
            Err(err) => return Err(err),
        };

        if info.metadata.get(SHA256_METADATA) != Some(&hashes.sha256) {
            debug!("SHA-256 of {}/{} does not match", container, name);
            return Ok(true);
        }
        if info.metadata.get(MD5_METADATA) != Some(&hashes.md5) {
            debug!("MD5 of {}/{} does not match", container, name);
            return Ok(true);
        }
        Ok(false)
    }

    /// Upload an object from a file, splitting it into segments if it is large.
    ///
    /// The upload is skipped if the object exists with the same hashes.
    pub async fn create_object<P: AsRef<Path>>(
        &self,
        container: &str,
        name: &str,
        path: P,
        options: &UploadOptions,
    ) -> Result<UploadOutcome, Error> {
        let source = ObjectSource::File(path.as_ref().to_path_buf());
        self.upload(container, name, source, options).await
    }

    /// Upload an object from memory, splitting it into segments if it is large.
    ///
    /// The upload is skipped if the object exists with the same hashes.
    pub async fn create_object_from_data(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        options: &UploadOptions,
    ) -> Result<UploadOutcome, Error> {
        let source = ObjectSource::Data(Arc::new(data));
        self.upload(container, name, source, options).await
    }

    async fn upload(
        &self,
        container: &str,
        name: &str,
        source: ObjectSource,
        options: &UploadOptions,
    ) -> Result<UploadOutcome, Error> {
        let hashes = match (&options.md5, &options.sha256) {
            (Some(md5), Some(sha256)) => ObjectHashes {
                md5: md5.clone(),
                sha256: sha256.clone(),
            },
            _ => source.hashes().await?,
        };

        if !self.is_object_stale(container, name, &hashes).await? {
            info!("Object {}/{} is up to date, not uploading", container, name);
            return Ok(UploadOutcome::Unchanged);
        }

        let mut headers = HeaderMap::new();
        let mut add_header = |key: String, value: &str| -> Result<(), Error> {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
            let _ = headers.insert(name, value);
            Ok(())
        };
        for (key, value) in &options.metadata {
            add_header(format!("{}{}", OBJECT_META, key.to_lowercase()), value)?;
        }
        add_header(format!("{}{}", OBJECT_META, MD5_METADATA), &hashes.md5)?;
        add_header(format!("{}{}", OBJECT_META, SHA256_METADATA), &hashes.sha256)?;
        if let Some(content_type) = &options.content_type {
            add_header(CONTENT_TYPE.as_str().to_string(), content_type)?;
        }

        let size = source.size().await?;
        let info = self.storage_info().await?;
        let segment_size = info.segment_size(options.segment_size);
        if size <= segment_size {
            debug!("Uploading {}/{} ({} bytes) in one request", container, name, size);
            let body = source.body(0, size).await?;
            let _ = self
                .start(Method::PUT, object_path(container, name))
                .await?
                .headers(headers)
                .header(CONTENT_LENGTH, size)
                .body(body)
                .send()
                .await?;
            return Ok(UploadOutcome::Uploaded);
        }

        let segments = plan_segments(size, segment_size);
        let count = segments.len();
        debug!(
            "Uploading {}/{} ({} bytes) as {} segments of {} bytes",
            container, name, size, count, segment_size
        );
        let mut entries = self.upload_segments(container, name, &source, segments).await?;
        entries.sort_by_key(|(index, _)| *index);

        let use_slo = options.use_slo && info.slo.is_some();
        let builder = self.start(Method::PUT, object_path(container, name)).await?.headers(headers);
        let _ = if use_slo {
            let manifest: Vec<ManifestEntry> = entries.into_iter().map(|(_, e)| e).collect();
            builder
                .query(&[("multipart-manifest", "put")])
                .json(&manifest)
                .send()
                .await?
        } else {
            let target = format!("{}/{}/", container, name);
            let manifest = utf8_percent_encode(&target, MANIFEST_ENCODE_SET).to_string();
            builder
                .header("x-object-manifest", manifest)
                .body(Vec::new())
                .send()
                .await?
        };
        Ok(UploadOutcome::Segmented(count))
    }

    async fn upload_segments(
        &self,
        container: &str,
        name: &str,
        source: &ObjectSource,
        segments: Vec<Segment>,
    ) -> Result<Vec<(usize, ManifestEntry)>, Error> {
        let by_name: HashMap<String, Segment> = segments
            .iter()
            .map(|segment| (segment_name(name, segment.index), *segment))
            .collect();

        let tasks = segments
            .into_iter()
            .map(|segment| self.submit_segment(container, name, source, segment))
            .collect();
        let first = wait_for_futures(tasks, false).await?;
        let mut entries = first.successes;
        if first.failures.is_empty() {
            return Ok(entries);
        }

        warn!(
            "{} segment(s) of {}/{} failed, retrying once",
            first.failures.len(),
            container,
            name
        );
        let retries = first
            .failures
            .iter()
            .filter_map(|failure| by_name.get(&failure.name))
            .map(|segment| self.submit_segment(container, name, source, *segment))
            .collect();
        let second = wait_for_futures(retries, true).await?;
        entries.extend(second.successes);
        Ok(entries)
    }

    fn submit_segment(
        &self,
        container: &str,
        name: &str,
        source: &ObjectSource,
        segment: Segment,
    ) -> crate::task::Task<(usize, ManifestEntry)> {
        let session = self.session.clone();
        let source = source.clone();
        let container = container.to_string();
        let object = segment_name(name, segment.index);
        let task_name = object.clone();
        self.tasks.submit_async(task_name, async move {
            let body = source.body(segment.offset, segment.length).await?;
            let response = session
                .put(OBJECT_STORAGE, object_path(&container, &object))
                .await?
                .header(CONTENT_LENGTH, segment.length)
                .body(body)
                .send()
                .await?;
            let etag = match header_str(response.headers(), ETAG.as_str()) {
                Some(etag) => etag.trim_matches('"').to_string(),
                None => source.range_md5(segment.offset, segment.length).await?,
            };
            Ok((
                segment.index,
                ManifestEntry {
                    path: format!("/{}/{}", container, object),
                    etag,
                    size_bytes: segment.length,
                },
            ))
        })
    }
}

/// Split an `X-Object-Manifest` value into the segments container and prefix.
fn parse_manifest(manifest: &str) -> Option<(String, String)> {
    let (container, prefix) = manifest.split_once('/')?;
    let container = percent_decode_str(container).decode_utf8().ok()?;
    let prefix = percent_decode_str(prefix).decode_utf8().ok()?;
    if container.is_empty() || prefix.is_empty() {
        None
    } else {
        Some((container.into_owned(), prefix.into_owned()))
    }
}
