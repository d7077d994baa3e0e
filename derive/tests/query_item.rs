use std::fmt;

use oscloud::{Query, QueryItem};

#[derive(Debug, Clone, Copy)]
enum Visibility {
    Public,
    Shared,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Public => "public",
            Visibility::Shared => "shared",
        })
    }
}

#[derive(Debug, QueryItem)]
enum ImageFilter {
    Name(String),
    Limit(usize),
    IsPublic(bool),
    Visibility(Visibility),
    #[query_item = "owner"]
    ProjectId(String),
}

fn pair(item: ImageFilter) -> (String, String) {
    let (key, value) = item.query_item().unwrap();
    (key.to_string(), value.into_owned())
}

#[test]
fn test_keys_are_snake_case() {
    assert_eq!(pair(ImageFilter::Name("cirros".into())), ("name".into(), "cirros".into()));
    assert_eq!(pair(ImageFilter::Limit(20)), ("limit".into(), "20".into()));
    assert_eq!(pair(ImageFilter::IsPublic(false)), ("is_public".into(), "false".into()));
}

#[test]
fn test_display_values() {
    assert_eq!(
        pair(ImageFilter::Visibility(Visibility::Shared)),
        ("visibility".into(), "shared".into())
    );
    assert_eq!(
        pair(ImageFilter::Visibility(Visibility::Public)).1,
        "public"
    );
}

#[test]
fn test_renamed_key() {
    assert_eq!(
        pair(ImageFilter::ProjectId("3d1a8ea6".into())),
        ("owner".into(), "3d1a8ea6".into())
    );
}

#[test]
fn test_query_string() {
    let query = Query::default()
        .with(ImageFilter::Limit(1))
        .with(ImageFilter::ProjectId("a b".into()));
    assert_eq!(query.value_of("owner").unwrap().as_deref(), Some("a b"));
    assert_eq!(
        serde_urlencoded::to_string(query).unwrap(),
        "limit=1&owner=a+b"
    );
}
