// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Handy primitives for working with URLs.

use reqwest::Url;

/// Whether the URL has no path (only a host).
#[inline]
pub fn is_root(url: &Url) -> bool {
    match url.path_segments() {
        Some(mut segments) => segments.all(|x| x.is_empty()),
        None => true,
    }
}

/// Append path segments, dropping an empty trailing segment first.
///
/// URLs that cannot be a base are returned unchanged.
#[inline]
pub fn extend<I>(mut url: Url, segments: I) -> Url
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if let Ok(mut path) = url.path_segments_mut() {
        let _ = path.pop_if_empty().extend(segments);
    }
    url
}

/// Remove the last non-empty path segment.
#[inline]
pub fn pop(mut url: Url, keep_slash: bool) -> Url {
    if let Ok(mut path) = url.path_segments_mut() {
        let _ = path.pop_if_empty().pop();
        if keep_slash {
            let _ = path.pop_if_empty().push("");
        }
    }
    url
}

/// Make sure the URL ends with a slash so that relative joins keep the last segment.
#[inline]
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        if let Ok(mut path) = url.path_segments_mut() {
            let _ = path.push("");
        }
    }
    url
}

#[cfg(test)]
pub mod test {
    use reqwest::Url;

    use super::*;

    #[test]
    fn test_is_root() {
        assert!(is_root(&Url::parse("https://example.com").unwrap()));
        assert!(is_root(&Url::parse("https://example.com/").unwrap()));
        assert!(!is_root(&Url::parse("https://example.com/v2.1").unwrap()));
    }

    #[test]
    fn test_extend() {
        let url = Url::parse("https://example.com/compute/").unwrap();
        assert_eq!(
            extend(url, &["servers", "abcd"]).as_str(),
            "https://example.com/compute/servers/abcd"
        );
        let url = Url::parse("https://example.com/v1/AUTH_x").unwrap();
        assert_eq!(
            extend(url, &["con tainer"]).as_str(),
            "https://example.com/v1/AUTH_x/con%20tainer"
        );
    }

    #[test]
    fn test_pop() {
        let url = Url::parse("https://example.com/identity/v3/").unwrap();
        assert_eq!(
            pop(url.clone(), false).as_str(),
            "https://example.com/identity"
        );
        assert_eq!(pop(url, true).as_str(), "https://example.com/identity/");
    }

    #[test]
    fn test_with_trailing_slash() {
        let url = Url::parse("https://example.com/v2.0").unwrap();
        assert_eq!(
            with_trailing_slash(url).as_str(),
            "https://example.com/v2.0/"
        );
        let url = Url::parse("https://example.com/v2.0/").unwrap();
        assert_eq!(
            with_trailing_slash(url).as_str(),
            "https://example.com/v2.0/"
        );
    }
}
