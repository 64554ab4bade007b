//! # Configuration File
//!
//! TOML configuration shared by the CLI and the server:
//!
//! ```toml
//! [client]
//! server_name = "metagraph"
//! default_page_size = 50
//! max_page_size = 500
//! default_effective_time = "now"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [access]
//! denied_users = ["mallory"]
//! read_only_users = ["auditor"]
//! ```
//!
//! Every section and key is optional.

use metagraph_core::{
    AccessAction, AccessControl, AllowAll, ClientConfig, DenyList, MemoryStore, MetadataError,
    MetadataResult, load_snapshot,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Largest configuration file accepted.
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Static per-user restrictions applied by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Users refused every operation.
    pub denied_users: Vec<String>,
    /// Users allowed to read but not to change anything.
    pub read_only_users: Vec<String>,
}

impl AccessConfig {
    /// Build the store's access hook. No restrictions means [`AllowAll`].
    pub fn build(&self) -> Arc<dyn AccessControl> {
        if self.denied_users.is_empty() && self.read_only_users.is_empty() {
            return Arc::new(AllowAll);
        }
        let mut list = DenyList::new();
        for user in &self.read_only_users {
            for action in [
                AccessAction::Create,
                AccessAction::Update,
                AccessAction::Delete,
                AccessAction::Classify,
                AccessAction::Relate,
                AccessAction::Correlate,
            ] {
                list = list.deny_action(user.clone(), action);
            }
        }
        for user in &self.denied_users {
            list = list.deny_user(user.clone());
        }
        Arc::new(list)
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Parse a configuration document.
    pub fn from_toml(text: &str) -> MetadataResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| MetadataError::Serialization(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> MetadataResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let metadata = std::fs::metadata(path)
            .map_err(|e| MetadataError::Io(format!("config {}: {}", path.display(), e)))?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(MetadataError::invalid(
                "config",
                format!("{} exceeds {} bytes", path.display(), MAX_CONFIG_SIZE),
            ));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| MetadataError::Io(format!("config {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> MetadataResult<()> {
        let client = &self.client;
        if client.max_page_size > 0 && client.default_page_size > client.max_page_size {
            return Err(MetadataError::invalid(
                "default_page_size",
                format!(
                    "{} exceeds max_page_size {}",
                    client.default_page_size, client.max_page_size
                ),
            ));
        }
        if client.template_placeholder_prefix.is_empty()
            || client.template_placeholder_suffix.is_empty()
        {
            return Err(MetadataError::invalid(
                "template_placeholder_prefix",
                "placeholder delimiters must not be empty",
            ));
        }
        Ok(())
    }

    /// Load the snapshot at `database` into a store carrying this
    /// configuration's access rules.
    pub fn open_store(&self, database: &Path) -> MetadataResult<MemoryStore> {
        Ok(load_snapshot(database)?.with_access_control(self.access.build()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use metagraph_core::{EffectiveTimePolicy, ErrorKind};

    #[test]
    fn empty_document_is_default() {
        let config = AppConfig::from_toml("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn sections_are_read() {
        let config = AppConfig::from_toml(
            r#"
            [client]
            server_name = "catalog"
            max_page_size = 100
            default_effective_time = "now"

            [server]
            port = 9000

            [access]
            read_only_users = ["auditor"]
            "#,
        )
        .expect("parse");
        assert_eq!(config.client.server_name, "catalog");
        assert_eq!(config.client.max_page_size, 100);
        assert_eq!(config.client.default_effective_time, EffectiveTimePolicy::Now);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.access.read_only_users, vec!["auditor".to_string()]);
    }

    #[test]
    fn default_above_max_rejected() {
        let err = AppConfig::from_toml(
            "[client]\ndefault_page_size = 50\nmax_page_size = 10\n",
        )
        .expect_err("inconsistent paging");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn read_only_users_can_still_read() {
        let access = AccessConfig {
            denied_users: vec!["mallory".to_string()],
            read_only_users: vec!["auditor".to_string()],
        }
        .build();
        assert!(access.check("auditor", AccessAction::Read, "Asset").is_ok());
        assert!(access.check("auditor", AccessAction::Create, "Asset").is_err());
        assert!(access.check("mallory", AccessAction::Read, "Asset").is_err());
        assert!(access.check("alice", AccessAction::Delete, "Asset").is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
        assert_eq!(AppConfig::load(None).expect("defaults"), AppConfig::default());
    }
}
