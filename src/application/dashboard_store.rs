// Store trait for persisted dashboard documents
use crate::domain::dashboard::DashboardLayout;
use async_trait::async_trait;

#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// `None` when no document has been saved under `id` yet
    async fn load(&self, id: &str) -> anyhow::Result<Option<DashboardLayout>>;

    async fn save(&self, id: &str, layout: &DashboardLayout) -> anyhow::Result<()>;
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Records every save so tests can count writes. Saves of ids listed in
    /// `failing` return an error.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) documents: Mutex<HashMap<String, DashboardLayout>>,
        pub(crate) saves: Mutex<Vec<(String, DashboardLayout)>>,
        pub(crate) failing: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl DashboardStore for MemoryStore {
        async fn load(&self, id: &str) -> anyhow::Result<Option<DashboardLayout>> {
            Ok(self.documents.lock().unwrap().get(id).cloned())
        }

        async fn save(&self, id: &str, layout: &DashboardLayout) -> anyhow::Result<()> {
            if self.failing.lock().unwrap().contains(id) {
                anyhow::bail!("disk full");
            }
            self.documents
                .lock()
                .unwrap()
                .insert(id.to_string(), layout.clone());
            self.saves
                .lock()
                .unwrap()
                .push((id.to_string(), layout.clone()));
            Ok(())
        }
    }
}
