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

//! Asynchronous OpenStack cloud SDK.
//!
//! The crate is layered:
//!
//! * [Session](struct.Session.html) handles authentication, the service catalog, version
//!   discovery and retries.
//! * Per-service proxies in [resources](resources/index.html) and
//!   [object_store](object_store/index.html) map REST resources to typed structures.
//! * [Cloud](cloud/struct.Cloud.html) adds caching of listings, normalized documents, name
//!   and glob search, floating IP and security group orchestration.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), oscloud::Error> {
//! let session = oscloud::from_env().await?;
//! let compute = oscloud::resources::compute::ComputeProxy::new(session);
//! for server in compute.servers(&oscloud::Query::default()).await? {
//!     println!("{} {}", server.id, server.name);
//! }
//! # Ok(()) }
//! ```

#![crate_name = "oscloud"]
#![crate_type = "lib"]
#![doc(html_root_url = "https://docs.rs/oscloud/0.1.0")]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
#![deny(
    improper_ctypes,
    no_mangle_generic_items,
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unsafe_code,
    while_true
)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_doc_comments,
    unused_import_braces,
    unused_parens,
    unused_qualifications,
    unused_results
)]
#![allow(
    clippy::new_ret_no_self,
    clippy::should_implement_trait,
    clippy::wrong_self_convention
)]

// The derive macros refer to the crate by name.
extern crate self as oscloud;

mod apiversion;
mod auth;
mod cache;
mod catalog;
mod client;
pub mod cloud;
mod common;
mod config;
mod endpointfilters;
mod error;
pub mod identity;
mod macros;
mod memoize;
pub mod normalize;
pub mod object_store;
mod protocol;
pub mod proxy;
mod query;
pub mod resource;
pub mod resources;
mod retry;
pub mod services;
mod session;
mod stream;
pub mod task;
mod url;

pub use crate::apiversion::ApiVersion;
pub use crate::auth::{AuthScope, AuthType, NoAuth};
pub use crate::client::{AuthenticatedClient, RequestBuilder, NO_PATH};
pub use crate::cloud::Cloud;
pub use crate::config::{
    auth_from_env, from_env, CloudConfig, FloatingIpSource, SecurityGroupSource,
};
pub use crate::endpointfilters::{EndpointFilters, InterfaceType, ValidInterfaces};
pub use crate::error::{Error, ErrorKind, ResultExt};
pub use crate::memoize::{cache_key, ResourceCache};
pub use crate::query::{NoFilter, Query, QueryItem, RawFilter};
pub use crate::retry::RetryPolicy;
pub use crate::session::Session;
pub use oscloud_derive::QueryItem;
