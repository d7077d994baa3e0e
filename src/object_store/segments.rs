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

//! Splitting large objects into segments.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use reqwest::Body;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, Take};

use crate::{Error, ErrorKind};

/// Default segment size: 1 GiB.
pub const DEFAULT_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Maximum object size when the cluster does not report it: 5 GiB + 2 bytes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024 * 1024 + 2;

const READ_BUFFER: usize = 64 * 1024;

/// General capabilities of the object storage cluster.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SwiftInfo {
    /// Maximum size of one object.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for SwiftInfo {
    fn default() -> SwiftInfo {
        SwiftInfo {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Static large object capabilities.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SloInfo {
    /// Minimum size of a segment (except for the last one).
    #[serde(default = "default_min_segment_size")]
    pub min_segment_size: u64,
    /// Maximum number of segments in a manifest.
    #[serde(default)]
    pub max_manifest_segments: Option<u64>,
}

fn default_min_segment_size() -> u64 {
    1
}

impl Default for SloInfo {
    fn default() -> SloInfo {
        SloInfo {
            min_segment_size: 1,
            max_manifest_segments: None,
        }
    }
}

/// Capabilities document of the object storage (`/info`).
///
/// The default value is used when the cluster does not publish its capabilities and assumes
/// support for static large objects.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StorageInfo {
    /// General capabilities.
    #[serde(default)]
    pub swift: SwiftInfo,
    /// Static large objects, `None` if not supported.
    #[serde(default)]
    pub slo: Option<SloInfo>,
}

impl Default for StorageInfo {
    fn default() -> StorageInfo {
        StorageInfo {
            swift: SwiftInfo::default(),
            slo: Some(SloInfo::default()),
        }
    }
}

impl StorageInfo {
    /// Segment size to use: the requested one or the default, within the cluster limits.
    pub fn segment_size(&self, requested: Option<u64>) -> u64 {
        let min = self
            .slo
            .as_ref()
            .map(|slo| slo.min_segment_size)
            .unwrap_or(1);
        let max = self.swift.max_file_size.max(min);
        requested.unwrap_or(DEFAULT_SEGMENT_SIZE).clamp(min, max)
    }
}

/// One segment of a large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub index: usize,
    pub offset: u64,
    pub length: u64,
}

/// Split the object into segments of at most `segment_size` bytes.
pub(crate) fn plan_segments(total: u64, segment_size: u64) -> Vec<Segment> {
    let segment_size = segment_size.max(1);
    let mut result = Vec::new();
    let mut offset = 0;
    while offset < total {
        let length = segment_size.min(total - offset);
        result.push(Segment {
            index: result.len(),
            offset,
            length,
        });
        offset += length;
    }
    result
}

/// Name of a segment object.
pub(crate) fn segment_name(name: &str, index: usize) -> String {
    format!("{}/{:06}", name, index)
}

/// Entry of a static large object manifest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ManifestEntry {
    pub path: String,
    pub etag: String,
    pub size_bytes: u64,
}

/// MD5 and SHA-256 of the data as lowercase hex strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHashes {
    /// MD5 hash.
    pub md5: String,
    /// SHA-256 hash.
    pub sha256: String,
}

struct Hasher {
    md5: md5::Context,
    sha256: Sha256,
}

impl Hasher {
    fn new() -> Hasher {
        Hasher {
            md5: md5::Context::new(),
            sha256: Sha256::new(),
        }
    }

    fn update(&mut self, data: &[u8]) {
        self.md5.consume(data);
        self.sha256.update(data);
    }

    fn finish(self) -> ObjectHashes {
        ObjectHashes {
            md5: format!("{:x}", self.md5.compute()),
            sha256: hex::encode(self.sha256.finalize()),
        }
    }
}

/// Source of object data.
#[derive(Debug, Clone)]
pub(crate) enum ObjectSource {
    File(PathBuf),
    Data(Arc<Vec<u8>>),
}

impl ObjectSource {
    /// Total size in bytes.
    pub async fn size(&self) -> Result<u64, Error> {
        match self {
            ObjectSource::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
            ObjectSource::Data(data) => Ok(data.len() as u64),
        }
    }

    /// Compute the hashes of the whole source.
    pub async fn hashes(&self) -> Result<ObjectHashes, Error> {
        let mut hasher = Hasher::new();
        match self {
            ObjectSource::File(path) => {
                let file = File::open(path).await?;
                read_chunks(file, |chunk| hasher.update(chunk)).await?;
            }
            ObjectSource::Data(data) => hasher.update(data),
        }
        Ok(hasher.finish())
    }

    /// MD5 of one range, read in chunks.
    pub async fn range_md5(&self, offset: u64, length: u64) -> Result<String, Error> {
        match self {
            ObjectSource::File(path) => {
                let file = open_range(path, offset, length).await?;
                let mut context = md5::Context::new();
                read_chunks(file, |chunk| context.consume(chunk)).await?;
                Ok(format!("{:x}", context.compute()))
            }
            ObjectSource::Data(data) => {
                Ok(format!("{:x}", md5::compute(data_range(data, offset, length)?)))
            }
        }
    }

    /// Request body with one range of the source.
    ///
    /// Files are streamed from disk, only in-memory data is copied.
    pub async fn body(&self, offset: u64, length: u64) -> Result<Body, Error> {
        match self {
            ObjectSource::File(path) => {
                let file = open_range(path, offset, length).await?;
                Ok(Body::wrap_stream(chunk_stream(file)))
            }
            ObjectSource::Data(data) => Ok(Body::from(data_range(data, offset, length)?.to_vec())),
        }
    }
}

async fn open_range(path: &Path, offset: u64, length: u64) -> Result<Take<File>, Error> {
    let mut file = File::open(path).await?;
    let _ = file.seek(SeekFrom::Start(offset)).await?;
    Ok(file.take(length))
}

async fn read_chunks<R, F>(mut reader: R, mut consume: F) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]),
{
    let mut buffer = vec![0u8; READ_BUFFER];
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        consume(&buffer[..read]);
    }
}

fn chunk_stream(mut reader: Take<File>) -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    try_stream! {
        loop {
            let mut buffer = vec![0u8; READ_BUFFER];
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            buffer.truncate(read);
            yield buffer;
        }
    }
}

fn data_range(data: &[u8], offset: u64, length: u64) -> Result<&[u8], Error> {
    let start = offset as usize;
    let end = start + length as usize;
    data.get(start..end).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Range {}..{} is outside of the data", start, end),
        )
    })
}
