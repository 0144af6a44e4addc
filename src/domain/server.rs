// Upstream servers - additional frame databases reachable through the proxy
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stored form; the API key never leaves the registry unencrypted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServer {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Absent fields are kept. An empty `apiKey` removes the stored key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// What clients see: the key is reduced to a flag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerView {
    pub id: String,
    pub name: String,
    pub url: String,
    pub has_api_key: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ServerError {
    #[error("Server {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),
}

impl ServerRecord {
    pub fn view(&self) -> ServerView {
        ServerView {
            id: self.id.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            has_api_key: self.encrypted_api_key.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub fn validate_name(name: &str) -> Result<String, ServerError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(ServerError::Invalid(
            "Server name must be 1 to 100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Only absolute http(s) URLs; a trailing slash is dropped
pub fn validate_url(url: &str) -> Result<String, ServerError> {
    let url = url.trim().trim_end_matches('/');
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| ServerError::Invalid(format!("Server URL '{}' must start with http:// or https://", url)))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(ServerError::Invalid(format!("Server URL '{}' has no host", url)));
    }
    Ok(url.to_string())
}
