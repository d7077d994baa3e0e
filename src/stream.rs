// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! A stream of resources.

use async_stream::try_stream;
use futures::pin_mut;
use futures::stream::{Stream, TryStreamExt};
use log::{debug, error, trace};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::resource::Resource;
use crate::{Error, ErrorKind, Session};

/// Where to get the next page from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NextPage {
    /// Follow a link.
    Link(Url),
    /// Repeat the query with this marker.
    Marker(String),
    /// No more pages.
    Done,
}

/// Extract the `next` link from a listing body.
///
/// Supports `<resources>_links` (Compute, Network, Block Storage), `links.next` (Identity) and
/// a top-level `next` (Image).
pub(crate) fn next_link(body: &Value, resources_key: &str) -> Option<String> {
    let links_key = format!("{}_links", resources_key);
    if let Some(Value::Array(links)) = body.get(&links_key) {
        return links
            .iter()
            .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))
            .and_then(|link| link.get("href"))
            .and_then(Value::as_str)
            .map(From::from);
    }

    if let Some(next) = body
        .get("links")
        .and_then(|links| links.get("next"))
        .and_then(Value::as_str)
    {
        return Some(next.to_string());
    }

    body.get("next").and_then(Value::as_str).map(From::from)
}

/// Resolve a `next` link against the service root.
///
/// Relative links may repeat a part of the root path (e.g. `/v2/images?marker=...` for a root
/// of `https://cloud/image/v2/`), the overlapping part is only used once.
pub(crate) fn resolve_link(root: &Url, link: &str) -> Result<Url, Error> {
    if let Ok(url) = Url::parse(link) {
        return Ok(url);
    }

    let root_path = root.path();
    let overlap = (0..root_path.len())
        .filter(|idx| root_path.is_char_boundary(*idx))
        .map(|idx| &root_path[idx..])
        .find(|suffix| suffix.ends_with('/') && link.starts_with(suffix));
    let relative = match overlap {
        Some(suffix) => &link[suffix.len()..],
        None => link.trim_start_matches('/'),
    };
    root.join(relative).map_err(|e| {
        Error::new(
            ErrorKind::InvalidResponse,
            format!("Invalid next link {}: {}", link, e),
        )
    })
}

/// Extract items from a listing body.
pub(crate) fn extract_items<T: Resource>(body: Value) -> Result<Vec<T>, Error> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(T::RESOURCES_KEY) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                error!(
                    "Expected a list in {}, got {}",
                    T::RESOURCES_KEY,
                    other
                );
                return Err(Error::new(
                    ErrorKind::InvalidResponse,
                    format!("{} is not a list", T::RESOURCES_KEY),
                ));
            }
        },
        other => {
            return Err(Error::new(
                ErrorKind::InvalidResponse,
                format!("Unexpected listing body: {}", other),
            ))
        }
    };

    items
        .into_iter()
        .map(|item| {
            let item = match (T::LIST_ITEM_KEY, item) {
                (Some(key), Value::Object(mut map)) => map.remove(key).unwrap_or(Value::Null),
                (_, item) => item,
            };
            serde_json::from_value(item).map_err(Error::from)
        })
        .collect()
}

/// Decide how to fetch the next page.
pub(crate) fn next_page<T: Resource>(
    body: &Value,
    root: &Url,
    items: &[T],
    limit: Option<usize>,
) -> Result<NextPage, Error> {
    if items.is_empty() {
        return Ok(NextPage::Done);
    }

    if let Some(link) = next_link(body, T::RESOURCES_KEY) {
        return resolve_link(root, &link).map(NextPage::Link);
    }

    match (limit, items.last()) {
        (Some(limit), Some(last)) if limit > 0 && items.len() >= limit => {
            Ok(NextPage::Marker(last.id().to_string()))
        }
        _ => Ok(NextPage::Done),
    }
}

async fn fetch_page<T: Resource>(
    session: &Session,
    url: Url,
    query: &[(String, String)],
) -> Result<Value, Error> {
    trace!("Fetching a page of {} from {}", T::KIND, url);
    session
        .client()
        .request_service(T::SERVICE, Method::GET, url)
        .maybe_api_version(T::MICROVERSION)
        .query(query)
        .fetch_json()
        .await
}

fn chunks<T: Resource>(
    session: Session,
    root: Url,
    url: Url,
    query: Vec<(String, String)>,
) -> impl Stream<Item = Result<Vec<T>, Error>> {
    let limit = query
        .iter()
        .find(|(key, _)| key == "limit")
        .and_then(|(_, value)| value.parse::<usize>().ok());

    try_stream! {
        let mut body = fetch_page::<T>(&session, url.clone(), &query).await?;
        loop {
            let items: Vec<T> = extract_items(body.clone())?;
            let next = next_page(&body, &root, &items, limit)?;
            if !items.is_empty() {
                yield items;
            }

            body = match next {
                NextPage::Link(link) => {
                    debug!("Following the next link {}", link);
                    fetch_page::<T>(&session, link, &[]).await?
                }
                NextPage::Marker(marker) => {
                    debug!("Fetching the next page of {} after {}", T::KIND, marker);
                    let mut next_query: Vec<(String, String)> = query
                        .iter()
                        .filter(|(key, _)| key != "marker")
                        .cloned()
                        .collect();
                    next_query.push(("marker".into(), marker));
                    fetch_page::<T>(&session, url.clone(), &next_query).await?
                }
                NextPage::Done => break,
            };
        }
    }
}

/// Creates a lazy paginated resource stream.
///
/// `url` is the collection URL, `root` is the service root used to resolve relative links.
pub(crate) fn paginated<T: Resource>(
    session: Session,
    root: Url,
    url: Url,
    query: Vec<(String, String)>,
) -> impl Stream<Item = Result<T, Error>> {
    try_stream! {
        let iter = chunks::<T>(session, root, url, query);
        pin_mut!(iter);
        while let Some(chunk) = iter.try_next().await? {
            for item in chunk {
                yield item;
            }
        }
    }
}

#[cfg(test)]
pub mod test {
    use reqwest::Url;
    use serde_json::json;

    use super::{next_link, resolve_link};

    #[test]
    fn test_next_link_compute() {
        let body = json!({
            "servers": [],
            "servers_links": [
                {"rel": "next", "href": "https://cloud/compute/v2.1/servers?marker=1"}
            ]
        });
        assert_eq!(
            next_link(&body, "servers").as_deref(),
            Some("https://cloud/compute/v2.1/servers?marker=1")
        );
        let body = json!({"servers": [], "servers_links": []});
        assert!(next_link(&body, "servers").is_none());
    }

    #[test]
    fn test_next_link_identity() {
        let body = json!({
            "projects": [],
            "links": {"self": "x", "next": "https://cloud/identity/v3/projects?marker=p", "previous": null}
        });
        assert_eq!(
            next_link(&body, "projects").as_deref(),
            Some("https://cloud/identity/v3/projects?marker=p")
        );
        let body = json!({"projects": [], "links": {"next": null}});
        assert!(next_link(&body, "projects").is_none());
    }

    #[test]
    fn test_next_link_image() {
        let body = json!({"images": [], "next": "/v2/images?marker=abcd"});
        assert_eq!(
            next_link(&body, "images").as_deref(),
            Some("/v2/images?marker=abcd")
        );
    }

    #[test]
    fn test_resolve_link() {
        let root = Url::parse("https://cloud/image/v2/").unwrap();
        assert_eq!(
            resolve_link(&root, "/v2/images?marker=abcd").unwrap().as_str(),
            "https://cloud/image/v2/images?marker=abcd"
        );
        assert_eq!(
            resolve_link(&root, "https://other/v2/images").unwrap().as_str(),
            "https://other/v2/images"
        );
        let root = Url::parse("https://cloud:9292/v2/").unwrap();
        assert_eq!(
            resolve_link(&root, "/v2/images?marker=abcd").unwrap().as_str(),
            "https://cloud:9292/v2/images?marker=abcd"
        );
    }
}
