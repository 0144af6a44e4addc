// Repository trait for upstream frame database access
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait FrameRepository: Send + Sync {
    /// Device list as returned by the upstream database
    async fn list_devices(&self) -> anyhow::Result<Value>;

    /// Run a query and return the raw frames, wrapped or flat
    async fn query_frames(&self, query: &str) -> anyhow::Result<Vec<Value>>;
}
