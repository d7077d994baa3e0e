// Copyright 2020 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Shared implementation of the Identity authentication types.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Duration, Local};
use log::{debug, error, trace};
use reqwest::{Client, RequestBuilder, Response, Url};
use tokio::sync::RwLock;

use super::protocol::{self, AuthRoot};
use super::{Scope, TOKEN_MIN_VALIDITY};
use crate::client::check;
use crate::common::IdOrName;
use crate::{catalog, AuthScope, EndpointFilters, Error, ErrorKind};

/// Token value with its body.
#[derive(Clone)]
pub(crate) struct Token {
    value: String,
    body: protocol::Token,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut hasher = DefaultHasher::new();
        self.value.hash(&mut hasher);
        write!(
            f,
            "Token {{ value: hash({}), body: {:?} }}",
            hasher.finish(),
            self.body
        )
    }
}

impl Token {
    fn is_alive(&self) -> bool {
        let validity_time_left = self.body.expires_at.signed_duration_since(Local::now());
        trace!("Token is valid for {:?}", validity_time_left);
        validity_time_left > Duration::minutes(TOKEN_MIN_VALIDITY)
    }
}

/// Internal identity authentication object.
#[derive(Debug)]
pub(crate) struct Internal {
    auth_url: Url,
    body: AuthRoot,
    token_endpoint: String,
    cached_token: RwLock<Option<Token>>,
    pub filters: EndpointFilters,
}

impl Internal {
    pub fn new(mut auth_url: Url, body: AuthRoot) -> Result<Internal, Error> {
        let _ = auth_url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::InvalidConfig, "Invalid auth_url: wrong schema?"))?
            .pop_if_empty();

        let token_endpoint = if auth_url.as_str().ends_with("/v3") {
            format!("{}/auth/tokens", auth_url)
        } else {
            format!("{}/v3/auth/tokens", auth_url)
        };

        Ok(Internal {
            auth_url,
            body,
            token_endpoint,
            cached_token: RwLock::new(None),
            filters: EndpointFilters::default(),
        })
    }

    #[inline]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Run a function against a valid cached token.
    async fn with_token<F, T>(&self, client: &Client, func: F) -> Result<T, Error>
    where
        F: FnOnce(&Token) -> Result<T, Error>,
    {
        self.refresh(client, false).await?;
        let guard = self.cached_token.read().await;
        match guard.as_ref() {
            Some(token) => func(token),
            None => Err(Error::new(
                ErrorKind::AuthenticationFailed,
                "No token after a successful refresh",
            )),
        }
    }

    pub async fn get_endpoint(
        &self,
        client: &Client,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        let real_filters = if filters == &EndpointFilters::default() {
            &self.filters
        } else {
            filters
        };
        debug!(
            "Requesting a catalog endpoint for service '{}', filters {:?}",
            service_type, real_filters
        );
        self.with_token(client, |token| {
            catalog::extract_url(&token.body.catalog, service_type, real_filters)
        })
        .await
    }

    pub async fn authenticate(
        &self,
        client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        let value = self
            .with_token(client, |token| Ok(token.value.clone()))
            .await?;
        Ok(request.header("x-auth-token", value))
    }

    pub async fn scope(&self, client: &Client) -> Result<AuthScope, Error> {
        self.with_token(client, |token| {
            let mut scope = AuthScope {
                user_id: token.body.user.as_ref().map(|u| u.id.clone()),
                ..AuthScope::default()
            };
            if let Some(ref project) = token.body.project {
                scope.project_id = Some(project.id.clone());
                scope.project_name = project.name.clone();
                if let Some(ref domain) = project.domain {
                    scope.domain_id = domain.id.clone();
                    scope.domain_name = domain.name.clone();
                }
            }
            Ok(scope)
        })
        .await
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.body.auth.scope = Some(match scope {
            Scope::Project { project, domain } => {
                protocol::Scope::Project(protocol::Project { project, domain })
            }
        });
    }

    pub fn user(&self) -> Option<&IdOrName> {
        match self.body.auth.identity {
            protocol::Identity::Password(ref pw) => Some(&pw.user),
            _ => None,
        }
    }

    pub fn project(&self) -> Option<&IdOrName> {
        match self.body.auth.scope {
            Some(protocol::Scope::Project(ref prj)) => Some(&prj.project),
            _ => None,
        }
    }

    /// Refresh the token (if needed or forced).
    pub async fn refresh(&self, client: &Client, force: bool) -> Result<(), Error> {
        // Executed on every request, so the read lock comes first.
        if !force && alive(&*self.cached_token.read().await) {
            return Ok(());
        }

        let mut lock = self.cached_token.write().await;
        // Another task may have refreshed the token while we were waiting for the lock.
        if !force && alive(&lock) {
            return Ok(());
        }

        debug!("Requesting a new token from {}", self.token_endpoint);
        let resp = client
            .post(&self.token_endpoint)
            .json(&self.body)
            .send()
            .await?;
        *lock = Some(token_from_response(check(resp).await?).await?);
        Ok(())
    }

    #[cfg(test)]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}

impl Clone for Internal {
    /// Clones start with an empty token cache.
    fn clone(&self) -> Internal {
        Internal {
            auth_url: self.auth_url.clone(),
            body: self.body.clone(),
            token_endpoint: self.token_endpoint.clone(),
            cached_token: RwLock::new(None),
            filters: self.filters.clone(),
        }
    }
}

#[inline]
fn alive(token: &Option<Token>) -> bool {
    token.as_ref().map(Token::is_alive).unwrap_or(false)
}

async fn token_from_response(resp: Response) -> Result<Token, Error> {
    let value = match resp.headers().get("x-subject-token") {
        Some(hdr) => hdr.to_str().map(String::from).map_err(|e| {
            error!(
                "Invalid X-Subject-Token {:?} received from {}: {}",
                hdr,
                resp.url(),
                e
            );
            Error::new(
                ErrorKind::InvalidResponse,
                "Invalid X-Subject-Token header",
            )
        })?,
        None => {
            error!("No X-Subject-Token header received from {}", resp.url());
            return Err(Error::new(
                ErrorKind::InvalidResponse,
                "Missing X-Subject-Token header",
            ));
        }
    };

    let root = resp.json::<protocol::TokenRoot>().await?;
    debug!("Received a token expiring at {}", root.token.expires_at);
    trace!("Received catalog: {:?}", root.token.catalog);
    Ok(Token {
        value,
        body: root.token,
    })
}
