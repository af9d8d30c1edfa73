//! Connection management
//!
//! Turns the `[connection]` configuration into a [`StoreClient`]:
//! - parses and validates the seed host list
//! - loads the cluster snapshot when one is configured
//! - tracks connection state and produces a credential-free description
//!   for banners and logs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{AuthMode, ConnectionConfig, DEFAULT_PORT};
use crate::error::{ConnectionError, Result};
use crate::store::StoreClient;
use crate::store::snapshot::load_snapshot;

/// One `host:port` seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedHost {
    pub host: String,
    pub port: u16,
}

impl SeedHost {
    /// Parse `host`, `host:port` or `[v6addr]:port`
    pub fn parse(seed: &str) -> Result<Self> {
        let seed = seed.trim();
        let invalid = || ConnectionError::InvalidSeed(seed.to_string());

        if seed.is_empty() {
            return Err(invalid().into());
        }

        let (host, port) = if let Some(rest) = seed.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(invalid().into()),
            }
        } else {
            match seed.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (seed, None),
            }
        };

        if host.is_empty() {
            return Err(invalid().into());
        }
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Parse a comma separated seed list
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for SeedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Connection state information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

/// Builds the store client for a run
pub struct ConnectionManager {
    config: ConnectionConfig,
    seeds: Vec<SeedHost>,
    state: Arc<RwLock<ConnectionState>>,
}

impl ConnectionManager {
    /// Create a manager; seeds are validated here, before anything connects
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let seeds = config
            .hosts
            .iter()
            .map(|seed| SeedHost::parse(seed))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            seeds,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        })
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Connect and return the client
    ///
    /// With a snapshot configured, the snapshot is the cluster. Without one
    /// there is no source to read from and the run stops here.
    pub async fn connect(&self) -> Result<Arc<dyn StoreClient>> {
        *self.state.write().await = ConnectionState::Connecting;
        let start = Instant::now();

        let result = self.open().await;
        match &result {
            Ok(_) => {
                *self.state.write().await = ConnectionState::Connected;
                info!(
                    "Connected to {} in {}ms",
                    self.describe(),
                    start.elapsed().as_millis()
                );
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Failed(e.to_string());
            }
        }
        result
    }

    async fn open(&self) -> Result<Arc<dyn StoreClient>> {
        let Some(path) = &self.config.snapshot else {
            return Err(ConnectionError::NoClusterSource(format!(
                "{} is not reachable by this build; configure a snapshot",
                self.describe()
            ))
            .into());
        };

        debug!(
            auth_mode = ?self.config.auth_mode,
            tls = self.config.tls_enabled,
            "Loading snapshot {}",
            path.display()
        );

        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        let store = tokio::time::timeout(timeout, load_snapshot(path))
            .await
            .map_err(|_| {
                ConnectionError::ConnectionFailed(format!(
                    "loading {} timed out after {}s",
                    path.display(),
                    self.config.timeout_secs
                ))
            })??;

        Ok(Arc::new(store))
    }

    /// Seed list with credentials hidden, e.g. `admin:***@10.0.0.1:3000 (tls)`
    pub fn describe(&self) -> String {
        let mut out = String::new();

        if let Some(user) = &self.config.user {
            out.push_str(user);
            if self.config.password.is_some() {
                out.push_str(":***");
            }
            out.push('@');
        }

        let hosts: Vec<String> = self.seeds.iter().map(|s| s.to_string()).collect();
        out.push_str(&hosts.join(","));

        if let Some(path) = &self.config.snapshot {
            out.push_str(&format!(" (snapshot {})", path.display()));
        }
        if self.config.tls_enabled {
            match &self.config.tls_name {
                Some(name) => out.push_str(&format!(" (tls {})", name)),
                None => out.push_str(" (tls)"),
            }
        }
        if self.config.auth_mode != AuthMode::Internal {
            out.push_str(&format!(" (auth {:?})", self.config.auth_mode).to_lowercase());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        assert_eq!(
            SeedHost::parse("10.0.0.1:4000").unwrap(),
            SeedHost {
                host: "10.0.0.1".to_string(),
                port: 4000
            }
        );
        assert_eq!(SeedHost::parse("db1").unwrap().port, 3000);
        assert_eq!(SeedHost::parse("[::1]:3100").unwrap().host, "::1");
        assert_eq!(SeedHost::parse("[::1]").unwrap().port, 3000);
        assert!(SeedHost::parse("db1:port").is_err());
        assert!(SeedHost::parse(":3000").is_err());
        assert!(SeedHost::parse("").is_err());
    }

    #[test]
    fn test_parse_list() {
        let seeds = SeedHost::parse_list("a:1, b ,").unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].to_string(), "b:3000");
    }

    #[test]
    fn test_describe_hides_password() {
        let config = ConnectionConfig {
            user: Some("admin".to_string()),
            password: Some("secret".to_string()),
            tls_enabled: true,
            ..ConnectionConfig::default()
        };
        let manager = ConnectionManager::new(config).unwrap();
        let text = manager.describe();
        assert_eq!(text, "admin:***@127.0.0.1:3000 (tls)");
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_invalid_seed_rejected_early() {
        let config = ConnectionConfig {
            hosts: vec!["host:99999".to_string()],
            ..ConnectionConfig::default()
        };
        let err = ConnectionManager::new(config).err().unwrap();
        assert!(err.is_fatal_before_scan());
    }

    #[tokio::test]
    async fn test_connect_without_source() {
        let manager = ConnectionManager::new(ConnectionConfig::default()).unwrap();
        assert!(manager.connect().await.is_err());
        assert!(matches!(manager.state().await, ConnectionState::Failed(_)));
    }

    #[tokio::test]
    async fn test_connect_with_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        std::fs::write(
            &path,
            r#"{"namespaces": {"test": {"sets": {"demo": [{"bins": {"a": 1}}]}}}}"#,
        )
        .unwrap();

        let config = ConnectionConfig {
            snapshot: Some(path),
            ..ConnectionConfig::default()
        };
        let manager = ConnectionManager::new(config).unwrap();
        let client = manager.connect().await.unwrap();
        assert_eq!(client.list_partitions().await.unwrap().len(), 1);
        assert_eq!(manager.state().await, ConnectionState::Connected);
    }
}
