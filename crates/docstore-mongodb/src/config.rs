//! Connection configuration
//!
//! [`MongoConfig`] is the declarative description of a deployment. It can be
//! built in code, deserialized from YAML, or read from `DOCSTORE_*`
//! environment variables. Every numeric and boolean tuning field treats its
//! zero value as "not set", so the driver's own default applies.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Prefix for environment variables read by [`MongoConfig::from_env`]
pub const ENV_PREFIX: &str = "DOCSTORE_";

/// Used by [`MongoConfig::connect_timeout`] when `connect_timeout_ms` is zero
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to build driver client options and open a connection
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// Server addresses as `host[:port]`
    pub hosts: Vec<String>,
    /// Attach a credential built from `user`, `password` and `auth_source`
    pub auth_enabled: bool,
    pub user: String,
    pub password: String,
    /// Database to authenticate against (empty: driver default)
    pub auth_source: String,
    /// Encrypt all traffic with TLS
    pub tls_enabled: bool,
    /// Accept invalid server certificates. Only honored with `tls_enabled`.
    pub tls_insecure_skip_verify: bool,
    /// CA bundle used to verify the server certificate
    pub tls_ca_file: Option<PathBuf>,
    /// Client certificate and private key (PEM) for mutual TLS
    pub tls_cert_key_file: Option<PathBuf>,
    /// Database the client handle is bound to
    pub database: String,
    /// Application name reported in server logs
    pub app_name: Option<String>,
    /// Optional per-connection tuning
    pub connection: Option<ConnectionTuning>,
}

/// Pool sizing, timeouts, retry and consistency knobs
///
/// All durations are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionTuning {
    /// Minimum number of pooled connections per server (driver default: 0)
    pub min_pool_size: u32,
    /// Maximum number of pooled connections per server (driver default: 10)
    pub max_pool_size: u32,
    /// Maximum number of connections a pool establishes concurrently (driver default: 2)
    pub max_connecting: u32,
    /// Idle time before a pooled connection is closed (driver default: unlimited)
    pub max_conn_idle_time_ms: u64,
    /// How long to wait for a suitable server (driver default: 30s)
    pub server_selection_timeout_ms: u64,
    /// Connect deadline: bounds `connect` as a whole and each TCP/TLS
    /// handshake (default: 10s)
    pub connect_timeout_ms: u64,
    /// Socket read/write timeout. The Rust driver has no equivalent; a
    /// non-zero value is reported at connect time and otherwise ignored.
    pub socket_timeout_ms: u64,
    /// Deadline for every CRUD call issued through the client facade
    pub operation_timeout_ms: u64,
    pub retry_reads: bool,
    pub retry_writes: bool,
    /// Read concern "majority"
    pub read_concern_majority: bool,
    /// Read preference "secondaryPreferred"
    pub read_secondary_preferred: bool,
    /// Write concern "majority"
    pub write_concern_majority: bool,
    /// `wtimeout` attached to the majority write concern
    pub write_concern_timeout_ms: u64,
    pub replica_set_name: String,
}

impl MongoConfig {
    /// Minimal configuration for `hosts` bound to `database`
    pub fn new(hosts: impl IntoIterator<Item = impl Into<String>>, database: impl Into<String>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from `DOCSTORE_*` environment variables
    ///
    /// `DOCSTORE_HOSTS` is a comma-separated list. Tuning variables such as
    /// `DOCSTORE_MAX_POOL_SIZE` populate [`ConnectionTuning`]; the nested
    /// record is only created when at least one of them is present.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let hosts: Vec<String> = var("HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut tuning = ConnectionTuning::default();
        let mut tuned = false;
        macro_rules! tune {
            ($field:ident, $name:literal) => {
                if let Some(value) = parse_var(&var, $name)? {
                    tuning.$field = value;
                    tuned = true;
                }
            };
        }
        tune!(min_pool_size, "MIN_POOL_SIZE");
        tune!(max_pool_size, "MAX_POOL_SIZE");
        tune!(max_connecting, "MAX_CONNECTING");
        tune!(max_conn_idle_time_ms, "MAX_CONN_IDLE_TIME_MS");
        tune!(server_selection_timeout_ms, "SERVER_SELECTION_TIMEOUT_MS");
        tune!(connect_timeout_ms, "CONNECT_TIMEOUT_MS");
        tune!(socket_timeout_ms, "SOCKET_TIMEOUT_MS");
        tune!(operation_timeout_ms, "OPERATION_TIMEOUT_MS");
        tune!(retry_reads, "RETRY_READS");
        tune!(retry_writes, "RETRY_WRITES");
        tune!(read_concern_majority, "READ_CONCERN_MAJORITY");
        tune!(read_secondary_preferred, "READ_SECONDARY_PREFERRED");
        tune!(write_concern_majority, "WRITE_CONCERN_MAJORITY");
        tune!(write_concern_timeout_ms, "WRITE_CONCERN_TIMEOUT_MS");
        tune!(replica_set_name, "REPLICA_SET_NAME");

        Ok(Self {
            hosts,
            auth_enabled: parse_var(&var, "AUTH_ENABLED")?.unwrap_or(false),
            user: var("USER").unwrap_or_default(),
            password: var("PASSWORD").unwrap_or_default(),
            auth_source: var("AUTH_SOURCE").unwrap_or_default(),
            tls_enabled: parse_var(&var, "TLS_ENABLED")?.unwrap_or(false),
            tls_insecure_skip_verify: parse_var(&var, "TLS_INSECURE_SKIP_VERIFY")?.unwrap_or(false),
            tls_ca_file: var("TLS_CA_FILE").map(PathBuf::from),
            tls_cert_key_file: var("TLS_CERT_KEY_FILE").map(PathBuf::from),
            database: var("DATABASE").unwrap_or_default(),
            app_name: var("APP_NAME"),
            connection: tuned.then_some(tuning),
        })
    }

    /// Tuning record, or an all-defaults one when none was given
    pub fn tuning(&self) -> ConnectionTuning {
        self.connection.clone().unwrap_or_default()
    }

    /// Deadline for establishing the connection, liveness ping included
    pub fn connect_timeout(&self) -> Duration {
        self.connection
            .as_ref()
            .and_then(|c| millis(c.connect_timeout_ms))
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Per-call deadline enforced by the client facade
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.connection
            .as_ref()
            .and_then(|c| millis(c.operation_timeout_ms))
    }
}

fn parse_var<F, T>(var: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            Error::Config(format!("invalid value for {}{}: '{}' ({})", ENV_PREFIX, name, raw, e))
        }),
    }
}

/// Zero means "not set"
pub(crate) fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Zero means "not set"
pub(crate) fn non_zero(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

/// Empty means "not set"
pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("hosts", &self.hosts)
            .field("auth_enabled", &self.auth_enabled)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("auth_source", &self.auth_source)
            .field("tls_enabled", &self.tls_enabled)
            .field("tls_insecure_skip_verify", &self.tls_insecure_skip_verify)
            .field("tls_ca_file", &self.tls_ca_file)
            .field("tls_cert_key_file", &self.tls_cert_key_file)
            .field("database", &self.database)
            .field("app_name", &self.app_name)
            .field("connection", &self.connection)
            .finish()
    }
}
