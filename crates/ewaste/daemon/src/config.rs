//! Configuration for ewasted

use ewaste_types::{CategoryKind, PrincipalClaims};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static credential table
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Reference data that must exist at startup
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (development and tests)
    #[default]
    Memory,

    /// PostgreSQL storage, requires the `postgres` feature
    Postgres {
        url: String,

        #[serde(default = "default_pool_size")]
        max_connections: u32,

        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,

        /// Retries for transient connection failures
        #[serde(default = "default_retry_attempts")]
        retry_attempts: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// One accepted credential and the claims it stands for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub token: String,
    pub subject: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
}

impl CredentialEntry {
    pub fn claims(&self) -> PrincipalClaims {
        PrincipalClaims {
            subject: self.subject.clone(),
            role: self.role.clone(),
            kind: self.kind.clone(),
            department: self.department.clone(),
            vendor: self.vendor.clone(),
        }
    }
}

// A list rather than a map: config keys are case-folded, tokens must not be.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

impl IdentityConfig {
    pub fn entries(&self) -> impl Iterator<Item = (String, PrincipalClaims)> + '_ {
        self.credentials
            .iter()
            .map(|entry| (entry.token.clone(), entry.claims()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub departments: Vec<DepartmentEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory holding stored photos. Without it photos are never removed.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Defaults, then the optional file, then `EWASTE_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // EWASTE_SERVER__LISTEN_ADDR, EWASTE_STORAGE__URL, ...
        builder = builder.add_source(
            config::Environment::with_prefix("EWASTE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert!(config.identity.credentials.is_empty());
        assert!(config.media.root.is_none());
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert!(config.enable_cors);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[server]
listen_addr = "0.0.0.0:9090"
enable_cors = false

[storage]
type = "postgres"
url = "postgres://localhost/ewaste"

[[identity.credentials]]
token = "Vendor-Token"
subject = "principal:6f2c1c8e-2f4b-4a7e-9a55-0c7e2d1b9e11"
kind = "VendorUser"

[[catalog.categories]]
name = "Batteries"
kind = "HAZARDOUS"

[[catalog.departments]]
name = "Finance"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9090);
        assert!(!config.server.enable_cors);
        match config.storage {
            StorageConfig::Postgres {
                url,
                max_connections,
                retry_attempts,
                ..
            } => {
                assert_eq!(url, "postgres://localhost/ewaste");
                assert_eq!(max_connections, 10);
                assert_eq!(retry_attempts, 3);
            }
            other => panic!("unexpected storage config: {other:?}"),
        }
        assert_eq!(config.identity.credentials[0].token, "Vendor-Token");
        assert_eq!(config.catalog.categories[0].kind, CategoryKind::Hazardous);
        assert_eq!(config.catalog.departments[0].name, "Finance");
    }
}
