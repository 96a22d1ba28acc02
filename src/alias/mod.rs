//! Human device id <-> UUID mapping.
//!
//! Names are stored in an external alias directory; [`AliasResolver`] is the
//! only way the rest of the gateway talks to it.

mod http;

pub use http::HttpAliasDirectory;

use crate::error::{GatewayError, Result};
use crate::session::Credentials;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Alias directory configuration
#[derive(Clone, Debug, Deserialize)]
pub struct AliasConfig {
    #[serde(default = "default_server_uri")]
    pub server_uri: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_server_uri() -> String {
    "http://localhost:3003".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            server_uri: default_server_uri(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// A `name -> uuid` record as stored by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub name: String,
    pub uuid: String,
}

/// Storage backend for aliases
#[async_trait]
pub trait AliasDirectory: Send + Sync {
    /// Uuid registered under `name`, if any
    async fn lookup(&self, name: &str) -> Result<Option<String>>;

    /// Every name registered for `uuid`
    async fn reverse_lookup(&self, uuid: &str) -> Result<Vec<String>>;

    async fn create(&self, credentials: &Credentials, name: &str, uuid: &str) -> Result<()>;

    async fn remove(&self, credentials: &Credentials, name: &str) -> Result<()>;
}

/// Resolves client-supplied ids to device UUIDs and back
#[derive(Clone)]
pub struct AliasResolver {
    directory: Arc<dyn AliasDirectory>,
}

impl AliasResolver {
    pub fn new(directory: Arc<dyn AliasDirectory>) -> Self {
        Self { directory }
    }

    /// True when `id` has to go through the directory to become a uuid
    pub fn is_alias(id: &str) -> bool {
        Uuid::parse_str(id).is_err()
    }

    /// Resolve `name` to a uuid. UUIDs resolve to themselves.
    pub async fn resolve(&self, name: &str) -> Result<String> {
        if !Self::is_alias(name) {
            return Ok(name.to_string());
        }

        match self.directory.lookup(name).await? {
            Some(uuid) => {
                debug!(alias = %name, uuid = %uuid, "Resolved alias");
                Ok(uuid)
            }
            None => Err(GatewayError::bad_request(format!(
                "Unknown device id '{}'",
                name
            ))),
        }
    }

    /// All aliases registered for `uuid` (empty when it has none)
    pub async fn reverse_lookup(&self, uuid: &str) -> Result<Vec<String>> {
        self.directory.reverse_lookup(uuid).await
    }

    pub async fn create(&self, credentials: &Credentials, name: &str, uuid: &str) -> Result<()> {
        self.directory.create(credentials, name, uuid).await?;
        debug!(alias = %name, uuid = %uuid, "Alias created");
        Ok(())
    }

    pub async fn remove(&self, credentials: &Credentials, name: &str) -> Result<()> {
        self.directory.remove(credentials, name).await?;
        debug!(alias = %name, "Alias removed");
        Ok(())
    }
}
