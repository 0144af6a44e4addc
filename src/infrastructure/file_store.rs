// File-backed dashboard store - one JSON document per dashboard
use crate::application::dashboard_store::DashboardStore;
use crate::domain::dashboard::DashboardLayout;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FileDashboardStore {
    dir: PathBuf,
}

impl FileDashboardStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            anyhow::bail!("Invalid dashboard id '{}'", id);
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

/// Dashboard ids become file names
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl DashboardStore for FileDashboardStore {
    async fn load(&self, id: &str) -> Result<Option<DashboardLayout>> {
        let path = self.path_for(id)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let layout = serde_json::from_str(&text)
            .with_context(|| format!("Invalid dashboard document {}", path.display()))?;
        Ok(Some(layout))
    }

    /// Write to a temp file and rename so a crash never leaves half a document
    async fn save(&self, id: &str, layout: &DashboardLayout) -> Result<()> {
        let path = self.path_for(id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(layout).context("Failed to serialize dashboard")?;

        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDashboardStore::new(dir.path().join("dashboards")).await.unwrap();

        assert!(store.load("main").await.unwrap().is_none());

        let layout: DashboardLayout = serde_json::from_value(json!({
            "timeRange": "7d",
            "widgets": [{"id": "a", "deviceId": "d", "templateId": "climate"}],
            "layouts": {"lg": [{"i": "a", "x": 0, "y": 0, "w": 6, "h": 6}]}
        }))
        .unwrap();
        store.save("main", &layout).await.unwrap();

        assert_eq!(store.load("main").await.unwrap(), Some(layout));
        assert!(!dir.path().join("dashboards/main.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDashboardStore::new(dir.path()).await.unwrap();

        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.save("", &DashboardLayout::default()).await.is_err());
    }

    #[test]
    fn test_valid_ids() {
        assert!(is_valid_id("main"));
        assert!(is_valid_id("site-7_overview"));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id("a.json"));
    }
}
