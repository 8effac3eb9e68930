//! Config translation and connection establishment
//!
//! [`MongoConfig::client_options`] performs a sparse merge over the driver's
//! defaults: only fields the configuration actually sets are written into
//! [`ClientOptions`]. [`connect`] then creates the driver client and pings the
//! deployment before handing out a [`DocumentClient`].

use mongodb::{
    options::{
        Acknowledgment, ClientOptions, Credential, ReadConcern, ReadPreference,
        SelectionCriteria, ServerAddress, Tls, TlsOptions, WriteConcern,
    },
    Client,
};
use tracing::{info, instrument, warn};

use crate::client::DocumentClient;
use crate::config::{millis, non_empty, non_zero, MongoConfig};
use crate::store::{DocumentStore, MongoStore};
use crate::{Error, Result};

impl MongoConfig {
    /// Build driver client options from this configuration
    ///
    /// Hosts are always set. TLS and credentials are attached only when
    /// enabled, and each tuning knob only when non-zero.
    pub fn client_options(&self) -> std::result::Result<ClientOptions, mongodb::error::Error> {
        let hosts = self
            .hosts
            .iter()
            .map(|h| ServerAddress::parse(h))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut options = ClientOptions::builder().hosts(hosts).build();

        if self.tls_enabled {
            options.tls = Some(Tls::Enabled(self.tls_options()));
        }

        if self.auth_enabled {
            options.credential = Some(
                Credential::builder()
                    .username(self.user.clone())
                    .password(self.password.clone())
                    .source(non_empty(&self.auth_source))
                    .build(),
            );
        }

        if let Some(app) = &self.app_name {
            options.app_name = Some(app.clone());
        }

        if let Some(tuning) = &self.connection {
            options.min_pool_size = non_zero(tuning.min_pool_size);
            options.max_pool_size = non_zero(tuning.max_pool_size);
            options.max_connecting = non_zero(tuning.max_connecting);
            options.max_idle_time = millis(tuning.max_conn_idle_time_ms);
            options.server_selection_timeout = millis(tuning.server_selection_timeout_ms);
            options.connect_timeout = millis(tuning.connect_timeout_ms);

            if tuning.retry_reads {
                options.retry_reads = Some(true);
            }
            if tuning.retry_writes {
                options.retry_writes = Some(true);
            }
            if tuning.read_concern_majority {
                options.read_concern = Some(ReadConcern::majority());
            }
            if tuning.read_secondary_preferred {
                options.selection_criteria = Some(SelectionCriteria::ReadPreference(
                    ReadPreference::SecondaryPreferred { options: None },
                ));
            }
            if tuning.write_concern_majority {
                let mut write_concern = WriteConcern::default();
                write_concern.w = Some(Acknowledgment::Majority);
                write_concern.w_timeout = millis(tuning.write_concern_timeout_ms);
                options.write_concern = Some(write_concern);
            }
            options.repl_set_name = non_empty(&tuning.replica_set_name);
        }

        Ok(options)
    }

    fn tls_options(&self) -> TlsOptions {
        let mut tls = TlsOptions::default();
        if self.tls_insecure_skip_verify {
            tls.allow_invalid_certificates = Some(true);
        }
        tls.ca_file_path = self.tls_ca_file.clone();
        tls.cert_key_file_path = self.tls_cert_key_file.clone();
        tls
    }
}

/// Connect to the configured deployment and verify it answers a ping
///
/// Returns a handle bound to `config.database` only after both steps have
/// succeeded. A failure to create the client is [`Error::Connect`]; a failed
/// ping afterwards is [`Error::Ping`]. The driver connects lazily, so the ping
/// is bounded by [`MongoConfig::connect_timeout`] (10s unless configured).
#[instrument(skip(config), fields(
    hosts = ?config.hosts,
    database = %config.database,
    tls = config.tls_enabled,
    auth = config.auth_enabled
))]
pub async fn connect(config: &MongoConfig) -> Result<DocumentClient<MongoStore>> {
    if config.tls_enabled && config.tls_insecure_skip_verify {
        warn!("TLS certificate verification is disabled");
    }

    let tuning = config.tuning();
    if tuning.socket_timeout_ms > 0 {
        warn!(
            socket_timeout_ms = tuning.socket_timeout_ms,
            "socket timeout is not supported by the driver and will be ignored"
        );
    }

    let options = config.client_options().map_err(Error::Connect)?;
    let client = Client::with_options(options).map_err(Error::Connect)?;

    let store = MongoStore::new(client.database(&config.database));
    let limit = config.connect_timeout();
    tokio::time::timeout(limit, store.ping())
        .await
        .map_err(|_| {
            Error::Ping(
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no answer to ping within {:?}", limit),
                )
                .into(),
            )
        })?
        .map_err(Error::Ping)?;

    info!("MongoDB connection established");
    Ok(DocumentClient::new(store).with_operation_timeout(config.operation_timeout()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionTuning;
    use mongodb::options::ReadConcernLevel;
    use std::path::PathBuf;
    use std::time::Duration;

    fn local() -> MongoConfig {
        MongoConfig::new(["localhost:27017"], "testdb")
    }

    #[test]
    fn test_hosts_always_set() {
        let config = MongoConfig::new(["db1:27017", "db2:27018"], "testdb");
        let options = config.client_options().unwrap();
        assert_eq!(options.hosts.len(), 2);
        assert_eq!(options.hosts[0].to_string(), "db1:27017");
        assert_eq!(options.hosts[1].to_string(), "db2:27018");
    }

    #[test]
    fn test_zero_tuning_leaves_driver_defaults() {
        let defaults = ClientOptions::builder().build();
        let mut config = local();
        config.connection = Some(ConnectionTuning::default());

        let options = config.client_options().unwrap();
        assert_eq!(options.min_pool_size, defaults.min_pool_size);
        assert_eq!(options.max_pool_size, defaults.max_pool_size);
        assert_eq!(options.max_connecting, defaults.max_connecting);
        assert_eq!(options.max_idle_time, defaults.max_idle_time);
        assert_eq!(options.server_selection_timeout, defaults.server_selection_timeout);
        assert_eq!(options.connect_timeout, defaults.connect_timeout);
        assert_eq!(options.retry_reads, defaults.retry_reads);
        assert_eq!(options.retry_writes, defaults.retry_writes);
        assert!(options.read_concern.is_none());
        assert!(options.selection_criteria.is_none());
        assert!(options.write_concern.is_none());
        assert!(options.repl_set_name.is_none());
        assert!(options.tls.is_none());
        assert!(options.credential.is_none());
    }

    #[test]
    fn test_no_tuning_record_leaves_driver_defaults() {
        let options = local().client_options().unwrap();
        assert!(options.max_pool_size.is_none());
        assert!(options.connect_timeout.is_none());
        assert!(options.write_concern.is_none());
    }

    #[test]
    fn test_auth_disabled_ignores_credentials() {
        let mut config = local();
        config.user = "svc".to_string();
        config.password = "secret".to_string();
        config.auth_source = "admin".to_string();

        let options = config.client_options().unwrap();
        assert!(options.credential.is_none());
    }

    #[test]
    fn test_auth_enabled_attaches_credential() {
        let mut config = local();
        config.auth_enabled = true;
        config.user = "svc".to_string();
        config.password = "secret".to_string();
        config.auth_source = "admin".to_string();

        let credential = config.client_options().unwrap().credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("svc"));
        assert_eq!(credential.password.as_deref(), Some("secret"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[test]
    fn test_auth_enabled_empty_source_defers_to_driver() {
        let mut config = local();
        config.auth_enabled = true;
        config.user = "svc".to_string();

        let credential = config.client_options().unwrap().credential.unwrap();
        assert!(credential.source.is_none());
    }

    #[test]
    fn test_tls_verifies_certificates_by_default() {
        let mut config = local();
        config.tls_enabled = true;

        match config.client_options().unwrap().tls {
            Some(Tls::Enabled(tls)) => {
                assert_eq!(tls.allow_invalid_certificates, None);
                assert!(tls.ca_file_path.is_none());
            }
            other => panic!("expected TLS enabled, got {:?}", other),
        }
    }

    #[test]
    fn test_tls_insecure_skip_verify_is_opt_in() {
        let mut config = local();
        config.tls_enabled = true;
        config.tls_insecure_skip_verify = true;
        config.tls_ca_file = Some(PathBuf::from("/etc/ssl/mongo-ca.pem"));

        match config.client_options().unwrap().tls {
            Some(Tls::Enabled(tls)) => {
                assert_eq!(tls.allow_invalid_certificates, Some(true));
                assert_eq!(tls.ca_file_path, Some(PathBuf::from("/etc/ssl/mongo-ca.pem")));
            }
            other => panic!("expected TLS enabled, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_verify_without_tls_is_ignored() {
        let mut config = local();
        config.tls_insecure_skip_verify = true;
        assert!(config.client_options().unwrap().tls.is_none());
    }

    #[test]
    fn test_tuning_fields_applied() {
        let mut config = local();
        config.app_name = Some("orders-api".to_string());
        config.connection = Some(ConnectionTuning {
            min_pool_size: 2,
            max_pool_size: 40,
            max_connecting: 4,
            max_conn_idle_time_ms: 60_000,
            server_selection_timeout_ms: 5_000,
            connect_timeout_ms: 3_000,
            retry_reads: true,
            retry_writes: true,
            replica_set_name: "rs0".to_string(),
            ..ConnectionTuning::default()
        });

        let options = config.client_options().unwrap();
        assert_eq!(options.app_name.as_deref(), Some("orders-api"));
        assert_eq!(options.min_pool_size, Some(2));
        assert_eq!(options.max_pool_size, Some(40));
        assert_eq!(options.max_connecting, Some(4));
        assert_eq!(options.max_idle_time, Some(Duration::from_secs(60)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.retry_reads, Some(true));
        assert_eq!(options.retry_writes, Some(true));
        assert_eq!(options.repl_set_name.as_deref(), Some("rs0"));
    }

    #[test]
    fn test_consistency_flags() {
        let mut config = local();
        config.connection = Some(ConnectionTuning {
            read_concern_majority: true,
            read_secondary_preferred: true,
            write_concern_majority: true,
            write_concern_timeout_ms: 1_500,
            ..ConnectionTuning::default()
        });

        let options = config.client_options().unwrap();
        assert_eq!(
            options.read_concern.map(|rc| rc.level),
            Some(ReadConcernLevel::Majority)
        );
        assert!(matches!(
            options.selection_criteria,
            Some(SelectionCriteria::ReadPreference(ReadPreference::SecondaryPreferred { .. }))
        ));
        let write_concern = options.write_concern.unwrap();
        assert_eq!(write_concern.w, Some(Acknowledgment::Majority));
        assert_eq!(write_concern.w_timeout, Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn test_write_concern_timeout_needs_majority() {
        let mut config = local();
        config.connection = Some(ConnectionTuning {
            write_concern_timeout_ms: 1_500,
            ..ConnectionTuning::default()
        });
        assert!(config.client_options().unwrap().write_concern.is_none());
    }

    #[test]
    fn test_majority_without_timeout() {
        let mut config = local();
        config.connection = Some(ConnectionTuning {
            write_concern_majority: true,
            ..ConnectionTuning::default()
        });
        let write_concern = config.client_options().unwrap().write_concern.unwrap();
        assert_eq!(write_concern.w, Some(Acknowledgment::Majority));
        assert!(write_concern.w_timeout.is_none());
    }

    #[test]
    fn test_retry_false_defers_to_driver() {
        let mut config = local();
        config.connection = Some(ConnectionTuning {
            retry_reads: false,
            retry_writes: false,
            ..ConnectionTuning::default()
        });
        let options = config.client_options().unwrap();
        assert!(options.retry_reads.is_none());
        assert!(options.retry_writes.is_none());
    }

    #[test]
    fn test_empty_hosts_passed_through() {
        let config = MongoConfig::new(Vec::<String>::new(), "testdb");
        let options = config.client_options().unwrap();
        assert!(options.hosts.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_ping_failure() {
        let mut config = MongoConfig::new(["127.0.0.1:1"], "testdb");
        config.connection = Some(ConnectionTuning {
            connect_timeout_ms: 300,
            ..ConnectionTuning::default()
        });

        let started = std::time::Instant::now();
        let err = connect(&config).await.unwrap_err();
        assert!(err.is_ping_failure(), "unexpected error: {}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unparsable_host_is_connect_failure() {
        let config = MongoConfig::new(["localhost:notaport"], "testdb");
        let err = connect(&config).await.unwrap_err();
        assert!(err.is_connect_failure());
    }
}
