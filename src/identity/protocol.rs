// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! JSON structures of the Identity V3 token API.

#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::common::IdOrName;

#[derive(Clone, Serialize)]
pub struct UserAndPassword {
    #[serde(flatten)]
    pub user: IdOrName,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<IdOrName>,
}

#[derive(Clone, Debug, Serialize)]
struct PasswordBody<'a> {
    user: &'a UserAndPassword,
}

#[derive(Clone, Debug, Serialize)]
struct TokenBody<'a> {
    id: &'a str,
}

impl fmt::Debug for UserAndPassword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UserAndPassword")
            .field("user", &self.user)
            .field("password", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Authentication method with its credentials.
#[derive(Clone)]
pub enum Identity {
    Password(UserAndPassword),
    Token(String),
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identity::Password(user) => f.debug_tuple("Password").field(user).finish(),
            Identity::Token(_) => f.write_str("Token(***)"),
        }
    }
}

impl Serialize for Identity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = serializer.serialize_struct("Identity", 2)?;
        match self {
            Identity::Password(ref user) => {
                st.serialize_field("methods", &["password"])?;
                st.serialize_field("password", &PasswordBody { user })?;
            }
            Identity::Token(ref token) => {
                st.serialize_field("methods", &["token"])?;
                st.serialize_field("token", &TokenBody { id: token })?;
            }
        }
        st.end()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Project {
    #[serde(flatten)]
    pub project: IdOrName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<IdOrName>,
}

#[derive(Clone, Debug, Serialize)]
pub enum Scope {
    #[serde(rename = "project")]
    Project(Project),
}

#[derive(Clone, Debug, Serialize)]
pub struct Auth {
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthRoot {
    pub auth: Auth,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: String,
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CatalogRecord {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DomainRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: Option<String>,
    pub domain: Option<DomainRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Token {
    pub expires_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub catalog: Vec<CatalogRecord>,
    pub project: Option<ProjectRef>,
    pub user: Option<UserRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenRoot {
    pub token: Token,
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_password_body() {
        let body = AuthRoot {
            auth: Auth {
                identity: Identity::Password(UserAndPassword {
                    user: IdOrName::from_name("admin"),
                    password: "pa$$w0rd".into(),
                    domain: Some(IdOrName::from_id("default")),
                }),
                scope: Some(Scope::Project(Project {
                    project: IdOrName::from_name("demo"),
                    domain: Some(IdOrName::from_name("Default")),
                })),
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {"user": {
                        "name": "admin",
                        "password": "pa$$w0rd",
                        "domain": {"id": "default"}
                    }}
                },
                "scope": {"project": {"name": "demo", "domain": {"name": "Default"}}}
            }})
        );
    }

    #[test]
    fn test_token_body() {
        let body = AuthRoot {
            auth: Auth {
                identity: Identity::Token("abcd".into()),
                scope: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"auth": {"identity": {"methods": ["token"], "token": {"id": "abcd"}}}})
        );
    }

    #[test]
    fn test_token_response() {
        let token: TokenRoot = serde_json::from_value(json!({"token": {
            "expires_at": "2030-01-01T00:00:00.000000Z",
            "project": {"id": "p1", "name": "demo", "domain": {"id": "default", "name": "Default"}},
            "user": {"id": "u1", "name": "admin"},
            "catalog": [{"type": "compute", "endpoints": [
                {"interface": "public", "region": "RegionOne", "url": "https://nova"}
            ]}]
        }}))
        .unwrap();
        assert_eq!(token.token.catalog[0].service_type, "compute");
        assert_eq!(token.token.project.unwrap().name.as_deref(), Some("demo"));
    }
}
