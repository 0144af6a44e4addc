// Server registry - upstream servers kept in one JSON file, keys encrypted
use crate::domain::server::{
    validate_name, validate_url, NewServer, ServerError, ServerPatch, ServerRecord, ServerView,
};
use crate::infrastructure::secret_box::SecretBox;
use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ServerRegistryError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Server store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Where to send proxied requests for one server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConnection {
    pub url: String,
    pub api_key: Option<String>,
}

pub struct ServerRegistry {
    path: PathBuf,
    secrets: SecretBox,
    servers: RwLock<Vec<ServerRecord>>,
}

impl ServerRegistry {
    /// Reads the registry file; a missing file is an empty registry
    pub async fn open(path: impl Into<PathBuf>, secrets: SecretBox) -> anyhow::Result<Self> {
        let path = path.into();
        let servers = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("Invalid server registry {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let registry = Self {
            path,
            secrets,
            servers: RwLock::new(servers),
        };
        tracing::info!(
            "Loaded {} upstream servers from {}",
            registry.servers.read().await.len(),
            registry.path.display()
        );
        Ok(registry)
    }

    pub async fn list(&self) -> Vec<ServerView> {
        self.servers.read().await.iter().map(ServerRecord::view).collect()
    }

    pub async fn create(&self, input: NewServer) -> Result<ServerView, ServerRegistryError> {
        let name = validate_name(&input.name)?;
        let url = validate_url(&input.url)?;

        let mut servers = self.servers.write().await;
        ensure_unique_name(&servers, &name, None)?;

        let now = Utc::now();
        let record = ServerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            url,
            encrypted_api_key: self.seal_key(input.api_key.as_deref())?,
            created_at: now,
            updated_at: now,
        };

        let mut updated = servers.clone();
        updated.push(record.clone());
        self.persist(&updated).await?;
        *servers = updated;

        tracing::info!("Added upstream server {} ({})", record.name, record.id);
        Ok(record.view())
    }

    pub async fn update(&self, id: &str, patch: ServerPatch) -> Result<ServerView, ServerRegistryError> {
        let mut servers = self.servers.write().await;
        let index = servers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))?;

        let mut record = servers[index].clone();
        if let Some(name) = patch.name {
            let name = validate_name(&name)?;
            ensure_unique_name(&servers, &name, Some(id))?;
            record.name = name;
        }
        if let Some(url) = patch.url {
            record.url = validate_url(&url)?;
        }
        if let Some(api_key) = patch.api_key {
            record.encrypted_api_key = self.seal_key(Some(api_key.as_str()))?;
        }
        record.updated_at = Utc::now();

        let mut updated = servers.clone();
        updated[index] = record.clone();
        self.persist(&updated).await?;
        *servers = updated;

        tracing::info!("Updated upstream server {} ({})", record.name, record.id);
        Ok(record.view())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServerRegistryError> {
        let mut servers = self.servers.write().await;
        let updated: Vec<ServerRecord> = servers.iter().filter(|s| s.id != id).cloned().collect();
        if updated.len() == servers.len() {
            return Err(ServerError::NotFound(id.to_string()).into());
        }

        self.persist(&updated).await?;
        *servers = updated;
        tracing::info!("Removed upstream server {}", id);
        Ok(())
    }

    /// URL and decrypted key for proxying to a server
    pub async fn connection(&self, id: &str) -> Result<ServerConnection, ServerRegistryError> {
        let servers = self.servers.read().await;
        let record = servers
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ServerError::NotFound(id.to_string()))?;

        let api_key = match &record.encrypted_api_key {
            Some(sealed) => Some(
                self.secrets
                    .open(sealed)
                    .with_context(|| format!("Cannot decrypt API key of server {}", id))?,
            ),
            None => None,
        };

        Ok(ServerConnection {
            url: record.url.clone(),
            api_key,
        })
    }

    fn seal_key(&self, api_key: Option<&str>) -> anyhow::Result<Option<String>> {
        match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Ok(Some(self.secrets.seal(key)?)),
            None => Ok(None),
        }
    }

    /// Temp file and rename, like the dashboard documents
    async fn persist(&self, servers: &[ServerRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(servers).context("Failed to serialize server registry")?;
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn ensure_unique_name(servers: &[ServerRecord], name: &str, except: Option<&str>) -> Result<(), ServerError> {
    let taken = servers
        .iter()
        .any(|s| s.name.eq_ignore_ascii_case(name) && Some(s.id.as_str()) != except);
    if taken {
        return Err(ServerError::Invalid(format!("A server named '{}' already exists", name)));
    }
    Ok(())
}
