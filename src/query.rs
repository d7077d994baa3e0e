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

//! Typed query strings.

use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::ser::{Error as SerError, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::Error;

/// An item in a query.
pub trait QueryItem {
    /// Represent the item as a key and its value.
    fn query_item(&self) -> Result<(&str, Cow<str>), Error>;
}

/// A list of query items serialized as repeated `key=value` pairs.
///
/// ```rust
/// use oscloud::{Query, QueryItem};
///
/// #[derive(Debug, QueryItem)]
/// enum PortFilter {
///     DeviceId(String),
///     #[query_item = "network_id"]
///     Network(String),
///     Limit(usize),
/// }
///
/// let query = Query::default()
///     .with(PortFilter::DeviceId("1234".into()))
///     .with(PortFilter::Network("abcd".into()))
///     .with(PortFilter::Limit(10));
/// assert_eq!(query.value_of("limit").unwrap().as_deref(), Some("10"));
/// let query_string = serde_urlencoded::to_string(query).expect("invalid query");
/// assert_eq!(&query_string, "device_id=1234&network_id=abcd&limit=10");
/// ```
#[derive(Clone)]
pub struct Query<T>(pub Vec<T>);

impl<T> Default for Query<T> {
    fn default() -> Query<T> {
        Query(Vec::new())
    }
}

impl<T> Query<T> {
    /// Add a query item.
    #[inline]
    pub fn with(mut self, item: T) -> Self {
        self.0.push(item);
        self
    }
}

impl<T: QueryItem> Query<T> {
    /// Value of the first item with the given key.
    pub fn value_of(&self, key: &str) -> Result<Option<String>, Error> {
        for item in &self.0 {
            let (name, value) = item.query_item()?;
            if name == key {
                return Ok(Some(value.into_owned()));
            }
        }
        Ok(None)
    }

    /// Convert into owned key-value pairs.
    pub fn to_pairs(&self) -> Result<Vec<(String, String)>, Error> {
        self.0
            .iter()
            .map(|item| {
                item.query_item()
                    .map(|(k, v)| (k.to_string(), v.into_owned()))
            })
            .collect()
    }
}

impl<T: QueryItem> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut list = f.debug_list();
        for item in &self.0 {
            match item.query_item() {
                Ok((k, v)) => list.entry(&format_args!("{}={}", k, v)),
                Err(e) => list.entry(&format_args!("<{}>", e)),
            };
        }
        list.finish()
    }
}

impl<T> Deref for Query<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> DerefMut for Query<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> Serialize for Query<T>
where
    T: QueryItem,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for e in &self.0 {
            let item = e.query_item().map_err(SerError::custom)?;
            seq.serialize_element(&item)?;
        }
        seq.end()
    }
}

/// Query with no items, for resources without typed filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFilter {}

impl QueryItem for NoFilter {
    fn query_item(&self) -> Result<(&str, Cow<str>), Error> {
        match *self {}
    }
}

/// Untyped query item: an arbitrary key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFilter(pub String, pub String);

impl RawFilter {
    /// Create a new raw item.
    pub fn new<K: Into<String>, V: ToString>(key: K, value: V) -> RawFilter {
        RawFilter(key.into(), value.to_string())
    }
}

impl QueryItem for RawFilter {
    fn query_item(&self) -> Result<(&str, Cow<str>), Error> {
        Ok((&self.0, Cow::Borrowed(&self.1)))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::ErrorKind;

    #[derive(Debug)]
    enum FlavorFilter {
        MinRam(u64),
        IsPublic(bool),
        Broken,
    }

    impl QueryItem for FlavorFilter {
        fn query_item(&self) -> Result<(&str, Cow<str>), Error> {
            Ok(match self {
                FlavorFilter::MinRam(v) => ("minRam", v.to_string().into()),
                FlavorFilter::IsPublic(v) => ("is_public", v.to_string().into()),
                FlavorFilter::Broken => {
                    return Err(Error::new(ErrorKind::InvalidInput, "broken"))
                }
            })
        }
    }

    #[test]
    fn test_query() {
        let q = Query::default()
            .with(FlavorFilter::IsPublic(true))
            .with(FlavorFilter::MinRam(512))
            .with(FlavorFilter::MinRam(1024));
        let s = serde_urlencoded::to_string(&q).unwrap();
        assert_eq!(&s, "is_public=true&minRam=512&minRam=1024");
        assert_eq!(q.value_of("minRam").unwrap().as_deref(), Some("512"));
        assert!(q.value_of("limit").unwrap().is_none());
        assert_eq!(q.to_pairs().unwrap().len(), 3);
    }

    #[test]
    fn test_query_empty() {
        let q: Query<NoFilter> = Query::default();
        let s = serde_urlencoded::to_string(q).unwrap();
        assert_eq!(&s, "");
    }

    #[test]
    fn test_query_error() {
        let q = Query::default().with(FlavorFilter::Broken);
        assert!(serde_urlencoded::to_string(&q).is_err());
        assert!(q.to_pairs().is_err());
    }

    #[test]
    fn test_raw_filter() {
        let q = Query::default()
            .with(RawFilter::new("status", "ACTIVE"))
            .with(RawFilter::new("limit", 5));
        assert_eq!(
            serde_urlencoded::to_string(&q).unwrap(),
            "status=ACTIVE&limit=5"
        );
        assert_eq!(format!("{:?}", q), "[status=ACTIVE, limit=5]");
    }
}
