// Copyright 2018-2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Cloud configuration and support for `OS_` environment variables.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[cfg(any(feature = "native-tls", feature = "rustls"))]
use reqwest::Certificate;
use reqwest::Client;

use crate::identity::{IdOrName, Password, Token};
use crate::resource::ResourceKind;
use crate::{
    AuthType, EndpointFilters, Error, ErrorKind, NoAuth, RetryPolicy, Session, ValidInterfaces,
};

/// Default number of concurrent background tasks.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Where floating IPs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FloatingIpSource {
    /// Network service if available, Compute otherwise.
    #[default]
    Auto,
    /// Network service.
    Neutron,
    /// Legacy Compute networking.
    Nova,
}

/// Where security groups come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityGroupSource {
    /// Network service if available, Compute otherwise.
    #[default]
    Auto,
    /// Network service.
    Neutron,
    /// Legacy Compute networking.
    Nova,
    /// Security groups are not supported by the cloud.
    None,
}

fn unknown_value(what: &str, value: &str) -> Error {
    Error::new(
        ErrorKind::InvalidConfig,
        format!("Unknown {}: {}", what, value),
    )
}

impl FromStr for FloatingIpSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(FloatingIpSource::Auto),
            "neutron" | "network" => Ok(FloatingIpSource::Neutron),
            "nova" | "compute" => Ok(FloatingIpSource::Nova),
            _ => Err(unknown_value("floating IP source", s)),
        }
    }
}

impl FromStr for SecurityGroupSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SecurityGroupSource::Auto),
            "neutron" | "network" => Ok(SecurityGroupSource::Neutron),
            "nova" | "compute" => Ok(SecurityGroupSource::Nova),
            "none" | "" => Ok(SecurityGroupSource::None),
            _ => Err(unknown_value("security group source", s)),
        }
    }
}

impl fmt::Display for FloatingIpSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FloatingIpSource::Auto => "auto",
            FloatingIpSource::Neutron => "neutron",
            FloatingIpSource::Nova => "nova",
        })
    }
}

/// Configuration of a cloud.
///
/// Everything except for the authentication itself. Use `with_*` methods to build it in code:
///
/// ```rust
/// use std::time::Duration;
///
/// let config = oscloud::CloudConfig::default()
///     .with_name("devstack")
///     .with_region("RegionOne")
///     .with_cache_expiration(Duration::from_secs(60))
///     .with_nat_destination("private");
/// assert_eq!(config.region.as_deref(), Some("RegionOne"));
/// ```
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Cloud name, reported in resource locations.
    pub name: Option<String>,
    /// Region name.
    pub region: Option<String>,
    /// Endpoint interfaces in the order of preference.
    pub interfaces: ValidInterfaces,
    /// Timeout for API calls.
    pub api_timeout: Option<Duration>,
    /// Retries of failed requests.
    pub retry: RetryPolicy,
    /// Default time to live of cached listings, zero disables caching.
    pub cache_expiration: Duration,
    /// Time to live for specific resource kinds.
    pub cache_expirations: HashMap<ResourceKind, Duration>,
    /// Only report known fields in normalized resources.
    pub strict: bool,
    /// Default network to attach floating IPs to.
    pub nat_destination: Option<String>,
    /// Networks to treat as external (floating IP sources).
    pub external_networks: Vec<String>,
    /// Where floating IPs come from.
    pub floating_ip_source: FloatingIpSource,
    /// Where security groups come from.
    pub security_group_source: SecurityGroupSource,
    /// Segment size for large object uploads.
    pub segment_size: Option<u64>,
    /// Maximum number of concurrent background tasks.
    pub max_concurrency: usize,
    /// Path to a CA certificate bundle.
    pub cacert: Option<PathBuf>,
}

impl Default for CloudConfig {
    fn default() -> CloudConfig {
        CloudConfig {
            name: None,
            region: None,
            interfaces: ValidInterfaces::default(),
            api_timeout: None,
            retry: RetryPolicy::default(),
            cache_expiration: Duration::ZERO,
            cache_expirations: HashMap::new(),
            strict: false,
            nat_destination: None,
            external_networks: Vec::new(),
            floating_ip_source: FloatingIpSource::default(),
            security_group_source: SecurityGroupSource::default(),
            segment_size: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cacert: None,
        }
    }
}

impl CloudConfig {
    /// Read the configuration from `OS_*` environment variables.
    ///
    /// Authentication variables are not consumed here, see [auth_from_env](fn.auth_from_env.html).
    #[inline]
    pub fn from_env() -> Result<CloudConfig, Error> {
        config_from_env(&RealEnvironment)
    }

    /// Set the cloud name.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, value: S) -> CloudConfig {
        self.name = Some(value.into());
        self
    }

    /// Set the region.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, value: S) -> CloudConfig {
        self.region = Some(value.into());
        self
    }

    /// Set the endpoint interfaces.
    #[inline]
    pub fn with_interfaces<T: Into<ValidInterfaces>>(mut self, value: T) -> CloudConfig {
        self.interfaces = value.into();
        self
    }

    /// Set the API timeout.
    #[inline]
    pub fn with_api_timeout(mut self, value: Duration) -> CloudConfig {
        self.api_timeout = Some(value);
        self
    }

    /// Set the retry policy.
    #[inline]
    pub fn with_retry_policy(mut self, value: RetryPolicy) -> CloudConfig {
        self.retry = value;
        self
    }

    /// Set the default cache expiration time.
    #[inline]
    pub fn with_cache_expiration(mut self, value: Duration) -> CloudConfig {
        self.cache_expiration = value;
        self
    }

    /// Set the cache expiration for one kind of resources.
    #[inline]
    pub fn with_resource_cache_expiration(
        mut self,
        kind: ResourceKind,
        value: Duration,
    ) -> CloudConfig {
        let _ = self.cache_expirations.insert(kind, value);
        self
    }

    /// Only report known fields in normalized resources.
    #[inline]
    pub fn with_strict(mut self, value: bool) -> CloudConfig {
        self.strict = value;
        self
    }

    /// Set the default NAT destination network.
    #[inline]
    pub fn with_nat_destination<S: Into<String>>(mut self, value: S) -> CloudConfig {
        self.nat_destination = Some(value.into());
        self
    }

    /// Add an external network.
    #[inline]
    pub fn with_external_network<S: Into<String>>(mut self, value: S) -> CloudConfig {
        self.external_networks.push(value.into());
        self
    }

    /// Set the floating IP source.
    #[inline]
    pub fn with_floating_ip_source(mut self, value: FloatingIpSource) -> CloudConfig {
        self.floating_ip_source = value;
        self
    }

    /// Set the security group source.
    #[inline]
    pub fn with_security_group_source(mut self, value: SecurityGroupSource) -> CloudConfig {
        self.security_group_source = value;
        self
    }

    /// Set the segment size for large objects.
    #[inline]
    pub fn with_segment_size(mut self, value: u64) -> CloudConfig {
        self.segment_size = Some(value);
        self
    }

    /// Set the maximum number of concurrent background tasks.
    #[inline]
    pub fn with_max_concurrency(mut self, value: usize) -> CloudConfig {
        self.max_concurrency = value.max(1);
        self
    }

    /// Set the CA certificate bundle.
    #[inline]
    pub fn with_cacert<P: Into<PathBuf>>(mut self, value: P) -> CloudConfig {
        self.cacert = Some(value.into());
        self
    }

    /// Time to live of cached resources of this kind.
    pub fn cache_expiration_for(&self, kind: ResourceKind) -> Duration {
        self.cache_expirations
            .get(&kind)
            .copied()
            .unwrap_or(self.cache_expiration)
    }

    /// Endpoint filters from the region and interfaces.
    pub fn endpoint_filters(&self) -> EndpointFilters {
        EndpointFilters {
            interfaces: self.interfaces,
            region: self.region.clone(),
        }
    }

    /// Create an HTTP client honouring the CA certificate and API timeout.
    pub fn http_client(&self) -> Result<Client, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.api_timeout {
            builder = builder.timeout(timeout);
        }

        #[cfg(any(feature = "native-tls", feature = "rustls"))]
        if let Some(ref cert_path) = self.cacert {
            let cert_content = fs::read(cert_path).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot open cacert file {}: {}", cert_path.display(), e),
                )
            })?;

            let cert = Certificate::from_pem(&cert_content).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot parse {} as PEM: {}", cert_path.display(), e),
                )
            })?;

            builder = builder.add_root_certificate(cert);
        }

        #[cfg(not(any(feature = "native-tls", feature = "rustls")))]
        if self.cacert.is_some() {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                "TLS support is disabled",
            ));
        }

        builder.build().map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Cannot initialize HTTP backend: {}", e),
            )
        })
    }

    /// Create a session with this configuration.
    pub async fn create_session<Auth: AuthType + 'static>(
        &self,
        auth_type: Auth,
    ) -> Result<Session, Error> {
        self.create_shared_session(Arc::new(auth_type)).await
    }

    pub(crate) async fn create_shared_session(
        &self,
        auth_type: Arc<dyn AuthType>,
    ) -> Result<Session, Error> {
        let session = Session::new_shared(self.http_client()?, auth_type).await?;
        Ok(session
            .with_endpoint_filters(self.endpoint_filters())
            .with_retry_policy(self.retry))
    }
}

// Abstracts the process environment for unit testing.
trait Environment {
    fn get(&self, name: &'static str) -> Result<String, Error>;
}

#[derive(Debug, Clone, Copy)]
struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get(&self, name: &'static str) -> Result<String, Error> {
        env::var(name).map_err(|_| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Required environment variable {} is not provided", name),
            )
        })
    }
}

fn parse_var<E, T>(env: &E, name: &'static str) -> Result<Option<T>, Error>
where
    E: Environment,
    T: FromStr,
    T::Err: fmt::Display,
{
    match env.get(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Invalid value of {}: {}", name, e),
            )
        }),
        Err(_) => Ok(None),
    }
}

fn parse_bool<E: Environment>(env: &E, name: &'static str) -> Result<Option<bool>, Error> {
    match env.get(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            other => Err(Error::new(
                ErrorKind::InvalidConfig,
                format!("Invalid boolean value of {}: {}", name, other),
            )),
        },
        Err(_) => Ok(None),
    }
}

fn parse_seconds<E: Environment>(env: &E, name: &'static str) -> Result<Option<Duration>, Error> {
    Ok(parse_var::<_, f64>(env, name)?
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64))
}

fn config_from_env<E: Environment>(env: &E) -> Result<CloudConfig, Error> {
    let mut config = CloudConfig::default();
    config.name = env.get("OS_CLOUD_NAME").ok();
    config.region = env.get("OS_REGION_NAME").ok();
    if let Some(interfaces) = parse_var(env, "OS_INTERFACE")? {
        config.interfaces = interfaces;
    }
    config.api_timeout = parse_seconds(env, "OS_API_TIMEOUT")?;
    if let Some(retries) = parse_var(env, "OS_CONNECT_RETRIES")? {
        config.retry.connect_retries = retries;
    }
    if let Some(retries) = parse_var(env, "OS_STATUS_CODE_RETRIES")? {
        config.retry.status_code_retries = retries;
    }
    if let Some(expiration) = parse_seconds(env, "OS_CACHE_EXPIRATION")? {
        config.cache_expiration = expiration;
    }
    if let Some(strict) = parse_bool(env, "OS_STRICT")? {
        config.strict = strict;
    }
    config.nat_destination = env.get("OS_NAT_DESTINATION").ok();
    if let Ok(networks) = env.get("OS_EXTERNAL_NETWORKS") {
        config.external_networks = networks
            .split(',')
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
            .map(From::from)
            .collect();
    }
    if let Some(source) = parse_var(env, "OS_FLOATING_IP_SOURCE")? {
        config.floating_ip_source = source;
    }
    if let Some(source) = parse_var(env, "OS_SECURITY_GROUP_SOURCE")? {
        config.security_group_source = source;
    }
    config.segment_size = parse_var(env, "OS_SEGMENT_SIZE")?;
    if let Some(value) = parse_var::<_, usize>(env, "OS_MAX_CONCURRENCY")? {
        config.max_concurrency = value.max(1);
    }
    config.cacert = env.get("OS_CACERT").ok().map(PathBuf::from);
    Ok(config)
}

fn id_or_name<E: Environment>(
    env: &E,
    id_var: &'static str,
    name_var: &'static str,
) -> Option<IdOrName> {
    env.get(id_var)
        .map(IdOrName::Id)
        .or_else(|_| env.get(name_var).map(IdOrName::Name))
        .ok()
}

fn auth_from_env_impl<E: Environment>(
    env: &E,
    filters: EndpointFilters,
) -> Result<Arc<dyn AuthType>, Error> {
    let auth_type = env.get("OS_AUTH_TYPE").unwrap_or_else(|_| {
        if env.get("OS_TOKEN").is_ok() {
            "v3token".to_string()
        } else {
            "password".to_string()
        }
    });

    if auth_type == "none" || auth_type == "noauth" {
        let auth = match env.get("OS_ENDPOINT") {
            Ok(endpoint) => NoAuth::new(endpoint)?,
            Err(_) => NoAuth::new_without_endpoint(),
        };
        return Ok(Arc::new(auth));
    }

    let auth_url = env.get("OS_AUTH_URL")?;
    let project = id_or_name(env, "OS_PROJECT_ID", "OS_PROJECT_NAME");
    let project_domain = id_or_name(env, "OS_PROJECT_DOMAIN_ID", "OS_PROJECT_DOMAIN_NAME");

    match auth_type.as_str() {
        "password" | "v3password" => {
            let user = match id_or_name(env, "OS_USER_ID", "OS_USERNAME") {
                Some(user) => user,
                None => {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        "Required environment variable OS_USERNAME is not provided",
                    ))
                }
            };
            let password = env.get("OS_PASSWORD")?;
            let user_domain = id_or_name(env, "OS_USER_DOMAIN_ID", "OS_USER_DOMAIN_NAME")
                .or_else(|| match user {
                    IdOrName::Name(_) => Some(IdOrName::from_name("Default")),
                    IdOrName::Id(_) => None,
                });
            let mut auth = Password::new(auth_url.as_str(), user, password, user_domain)?
                .with_endpoint_filters(filters);
            if let Some(project) = project {
                auth = auth.with_project_scope(project, project_domain);
            }
            Ok(Arc::new(auth))
        }
        "v3token" | "token" => {
            let token = env.get("OS_TOKEN")?;
            let mut auth = Token::new(auth_url.as_str(), token)?.with_endpoint_filters(filters);
            if let Some(project) = project {
                auth = auth.with_project_scope(project, project_domain);
            }
            Ok(Arc::new(auth))
        }
        _ => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("Unsupported authentication type: {}", auth_type),
        )),
    }
}

/// Create an authentication type from `OS_*` environment variables.
///
/// Supported authentication types (`OS_AUTH_TYPE`) are `password`, `v3token` and `none`. The
/// default is `v3token` when `OS_TOKEN` is set and `password` otherwise.
pub fn auth_from_env() -> Result<Arc<dyn AuthType>, Error> {
    let config = CloudConfig::from_env()?;
    auth_from_env_impl(&RealEnvironment, config.endpoint_filters())
}

/// Create a `Session` from environment variables.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), oscloud::Error> {
/// let session = oscloud::from_env().await?;
/// # Ok(()) }
/// ```
pub async fn from_env() -> Result<Session, Error> {
    let config = CloudConfig::from_env()?;
    let auth = auth_from_env_impl(&RealEnvironment, config.endpoint_filters())?;
    config.create_shared_session(auth).await
}

#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::time::Duration;

    use maplit::hashmap;

    use super::{
        auth_from_env_impl, config_from_env, CloudConfig, Environment, FloatingIpSource,
        SecurityGroupSource,
    };
    use crate::resource::ResourceKind;
    use crate::{EndpointFilters, Error, ErrorKind, InterfaceType};

    impl Environment for HashMap<&'static str, &'static str> {
        fn get(&self, name: &'static str) -> Result<String, Error> {
            HashMap::get(self, name)
                .map(|x| x.to_string())
                .ok_or_else(|| Error::new(ErrorKind::InvalidInput, name))
        }
    }

    #[test]
    fn test_password_no_domains() {
        let env = hashmap! {
            "OS_AUTH_URL" => "http://example.com",
            "OS_USERNAME" => "admin",
            "OS_PASSWORD" => "password",
            "OS_PROJECT_NAME" => "admin",
        };

        let auth = auth_from_env_impl(&env, EndpointFilters::default()).unwrap();
        assert!(format!("{:?}", auth).contains("Password"));
    }

    #[test]
    fn test_password_with_domains() {
        let env = hashmap! {
            "OS_AUTH_TYPE" => "password",
            "OS_AUTH_URL" => "http://example.com",
            "OS_USERNAME" => "admin",
            "OS_PASSWORD" => "password",
            "OS_PROJECT_NAME" => "admin",
            "OS_USER_DOMAIN_NAME" => "Default",
            "OS_PROJECT_DOMAIN_NAME" => "Default",
        };

        let _auth = auth_from_env_impl(&env, EndpointFilters::default()).unwrap();
    }

    #[test]
    fn test_password_missing_password() {
        let env = hashmap! {
            "OS_AUTH_URL" => "http://example.com",
            "OS_USERNAME" => "admin",
        };

        let err = auth_from_env_impl(&env, EndpointFilters::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), Some("OS_PASSWORD"));
    }

    #[test]
    fn test_token() {
        let env = hashmap! {
            "OS_AUTH_URL" => "http://example.com",
            "OS_TOKEN" => "abcdef",
            "OS_PROJECT_ID" => "1234",
        };

        let auth = auth_from_env_impl(&env, EndpointFilters::default()).unwrap();
        assert!(format!("{:?}", auth).contains("Token"));
        assert!(!format!("{:?}", auth).contains("abcdef"));
    }

    #[test]
    fn test_none() {
        let env = hashmap! {
            "OS_AUTH_TYPE" => "none",
            "OS_ENDPOINT" => "http://example.com",
        };

        let _auth = auth_from_env_impl(&env, EndpointFilters::default()).unwrap();
    }

    #[test]
    fn test_unsupported() {
        let env = hashmap! {
            "OS_AUTH_TYPE" => "http_basic",
            "OS_AUTH_URL" => "http://example.com",
        };

        let err = auth_from_env_impl(&env, EndpointFilters::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from_env(&HashMap::new()).unwrap();
        assert_eq!(config.cache_expiration, Duration::ZERO);
        assert_eq!(config.max_concurrency, super::DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.floating_ip_source, FloatingIpSource::Auto);
        assert!(!config.strict);
    }

    #[test]
    fn test_config_from_env() {
        let env = hashmap! {
            "OS_CLOUD_NAME" => "devstack",
            "OS_REGION_NAME" => "RegionTwo",
            "OS_INTERFACE" => "internal,public",
            "OS_API_TIMEOUT" => "30",
            "OS_CACHE_EXPIRATION" => "1.5",
            "OS_STRICT" => "yes",
            "OS_NAT_DESTINATION" => "private",
            "OS_EXTERNAL_NETWORKS" => "public, ext-net",
            "OS_SECURITY_GROUP_SOURCE" => "nova",
        };

        let config = config_from_env(&env).unwrap();
        assert_eq!(config.name.as_deref(), Some("devstack"));
        let filters = config.endpoint_filters();
        assert_eq!(filters.region.as_deref(), Some("RegionTwo"));
        assert_eq!(
            *filters.interfaces,
            [InterfaceType::Internal, InterfaceType::Public]
        );
        assert_eq!(config.api_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.cache_expiration, Duration::from_millis(1500));
        assert!(config.strict);
        assert_eq!(config.nat_destination.as_deref(), Some("private"));
        assert_eq!(config.external_networks, vec!["public", "ext-net"]);
        assert_eq!(config.security_group_source, SecurityGroupSource::Nova);
    }

    #[test]
    fn test_config_invalid() {
        let env = hashmap! { "OS_API_TIMEOUT" => "soon" };
        let err = config_from_env(&env).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let env = hashmap! { "OS_STRICT" => "maybe" };
        assert!(config_from_env(&env).is_err());
    }

    #[test]
    fn test_cache_expiration_for() {
        let config = CloudConfig::default()
            .with_cache_expiration(Duration::from_secs(10))
            .with_resource_cache_expiration(ResourceKind::Server, Duration::ZERO);
        assert_eq!(
            config.cache_expiration_for(ResourceKind::Flavor),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.cache_expiration_for(ResourceKind::Server),
            Duration::ZERO
        );
    }
}
