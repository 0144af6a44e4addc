// Upstream frame database repository - REST client and pass-through
use crate::application::frame_repository::FrameRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UpstreamRepository {
    host: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

/// The query endpoint answers with a bare list or with `{"frames": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Frames(Vec<Value>),
    Wrapped { frames: Vec<Value> },
}

impl QueryResponse {
    fn into_frames(self) -> Vec<Value> {
        match self {
            QueryResponse::Frames(frames) | QueryResponse::Wrapped { frames } => frames,
        }
    }
}

/// Raw upstream answer, forwarded as-is by the proxy
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamRepository {
    pub fn new(host: String, token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// Same HTTP client, pointed at another server
    pub fn for_server(&self, host: &str, token: Option<String>) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            token: token.unwrap_or_default(),
            client: self.client.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host, path.trim_start_matches('/'))
    }

    /// The router hands over a decoded path, so segments are re-encoded
    fn proxy_url(&self, path: &str, query: Option<&str>) -> String {
        let encoded: Vec<_> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut url = self.url(&encoded.join("/"));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upstream request failed with status {}: {}", status, body);
        }
        Ok(response)
    }

    /// Forward one request to the upstream API without interpreting it
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let url = self.proxy_url(path, query);
        tracing::debug!("Proxying {} {}", method, url);

        let mut request = self.authorized(self.client.request(method, &url));
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach upstream at {}", url))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .context("Failed to read upstream response")?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl FrameRepository for UpstreamRepository {
    async fn list_devices(&self) -> Result<Value> {
        let response = self
            .authorized(self.client.get(self.url("devices")))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send device list request")?;

        Self::checked(response)
            .await?
            .json::<Value>()
            .await
            .context("Failed to parse device list")
    }

    async fn query_frames(&self, query: &str) -> Result<Vec<Value>> {
        let response = self
            .authorized(self.client.post(self.url("query")))
            .header("Accept", "application/json")
            .json(&QueryRequest { query })
            .send()
            .await
            .context("Failed to send frame query")?;

        let frames = Self::checked(response)
            .await?
            .json::<QueryResponse>()
            .await
            .context("Failed to parse frame query response")?
            .into_frames();

        Ok(frames)
    }
}
