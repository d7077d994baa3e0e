// Copyright 2018 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Authentication using Identity API v3.
//!
//! Supports [Password](struct.Password.html) and [Token](struct.Token.html) authentication
//! scoped to a project.

use reqwest::Url;

pub use crate::common::IdOrName;

mod internal;
mod password;
pub(crate) mod protocol;
mod token;

pub use self::password::Password;
pub use self::token::Token;

/// Tokens are refreshed when they have less than this many minutes of validity.
const TOKEN_MIN_VALIDITY: i64 = 10;

/// Common trait for Identity authentication types.
pub trait Identity {
    /// Get a reference to the auth URL.
    fn auth_url(&self) -> &Url;
}

/// A scope of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Scope {
    /// A token scoped to a project.
    Project {
        /// Project ID or name.
        project: IdOrName,
        /// ID or name of the project domain.
        domain: Option<IdOrName>,
    },
}
