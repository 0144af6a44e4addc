// Dashboard service - in-memory layouts with debounced persistence
use crate::application::dashboard_store::DashboardStore;
use crate::domain::catalog::Catalog;
use crate::domain::dashboard::{DashboardAction, DashboardError, DashboardLayout};
use crate::domain::widget::WidgetBinding;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum DashboardServiceError {
    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    #[error("dashboard store failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

struct Session {
    layout: DashboardLayout,
    /// Bumped on every mutation; a pending save only writes if it is current
    generation: u64,
    saved_generation: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn DashboardStore>,
    catalog: Arc<Catalog>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    save_lock: Arc<Mutex<()>>,
    debounce: Duration,
}

impl DashboardService {
    pub fn new(store: Arc<dyn DashboardStore>, catalog: Arc<Catalog>, debounce: Duration) -> Self {
        Self {
            store,
            catalog,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            save_lock: Arc::new(Mutex::new(())),
            debounce,
        }
    }

    /// Current layout. Dashboards without unsaved edits are read from the
    /// store and not kept in memory.
    pub async fn get(&self, id: &str) -> Result<DashboardLayout, DashboardServiceError> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(session.layout.clone());
        }
        Ok(self.load_from_store(id).await?)
    }

    /// Apply one action in memory and schedule a save. Returns the new
    /// layout and, for `addWidget`, the generated widget id.
    pub async fn apply(
        &self,
        id: &str,
        mut action: DashboardAction,
    ) -> Result<(DashboardLayout, Option<String>), DashboardServiceError> {
        self.fill_template_size(&mut action);

        let (layout, widget_id, generation) = {
            let mut sessions = self.sessions.write().await;
            if !sessions.contains_key(id) {
                let layout = self.load_from_store(id).await?;
                sessions.insert(
                    id.to_string(),
                    Session {
                        layout,
                        generation: 0,
                        saved_generation: 0,
                    },
                );
            }
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| anyhow::anyhow!("dashboard {} vanished from memory", id))?;

            let widget_id = match session.layout.apply(action) {
                Ok(widget_id) => widget_id,
                Err(e) => {
                    let clean = session.generation == session.saved_generation;
                    if clean {
                        sessions.remove(id);
                    }
                    return Err(e.into());
                }
            };
            session.generation += 1;
            (session.layout.clone(), widget_id, session.generation)
        };

        self.schedule_save(id.to_string(), generation);
        Ok((layout, widget_id))
    }

    /// Replace the whole snapshot (debounced like any other edit)
    pub async fn replace(
        &self,
        id: &str,
        mut layout: DashboardLayout,
    ) -> Result<DashboardLayout, DashboardServiceError> {
        layout.normalize();
        let generation = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.entry(id.to_string()).or_insert_with(|| Session {
                layout: DashboardLayout::default(),
                generation: 0,
                saved_generation: 0,
            });
            session.layout = layout.clone();
            session.generation += 1;
            session.generation
        };

        self.schedule_save(id.to_string(), generation);
        Ok(layout)
    }

    /// Restore a snapshot and write it through immediately. Memory only
    /// changes once the store has accepted the snapshot.
    pub async fn import(
        &self,
        id: &str,
        mut layout: DashboardLayout,
    ) -> Result<DashboardLayout, DashboardServiceError> {
        layout.normalize();

        let _guard = self.save_lock.lock().await;
        self.store.save(id, &layout).await?;
        // Pending saves for the replaced session find nothing and stop
        self.sessions.write().await.remove(id);

        tracing::info!("Imported dashboard {}", id);
        Ok(layout)
    }

    /// Write every session with unsaved edits (used on shutdown). A failed
    /// save is logged and the remaining dashboards are still written.
    pub async fn flush_all(&self) -> anyhow::Result<()> {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        let mut failed = 0;
        for id in ids {
            if let Err(e) = self.save_if_current(&id, None).await {
                tracing::error!("Failed to save dashboard {}: {:#}", id, e);
                failed += 1;
            }
        }

        if failed > 0 {
            anyhow::bail!("{} dashboards could not be saved", failed);
        }
        Ok(())
    }

    async fn load_from_store(&self, id: &str) -> anyhow::Result<DashboardLayout> {
        Ok(match self.store.load(id).await? {
            Some(mut layout) => {
                layout.normalize();
                layout
            }
            None => {
                tracing::debug!("Dashboard {} not found in store, using an empty layout", id);
                DashboardLayout::default()
            }
        })
    }

    /// Composite widgets take their template's default size when the
    /// caller gave none.
    fn fill_template_size(&self, action: &mut DashboardAction) {
        if let DashboardAction::AddWidget { widget, size } = action {
            if size.is_some() {
                return;
            }
            if let WidgetBinding::Template { template_id, .. } = &widget.binding {
                *size = self
                    .catalog
                    .template(widget.device_type_id.as_deref(), template_id)
                    .map(|(_, t)| t.default_size);
            }
        }
    }

    fn schedule_save(&self, id: String, generation: u64) {
        let service = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(service.debounce).await;
            if let Err(e) = service.save_if_current(&id, Some(generation)).await {
                tracing::error!("Failed to save dashboard {}: {:#}", id, e);
            }
        });
    }

    /// Persist the latest snapshot. With `expected`, only if no edit has
    /// happened since that generation. Saves are serialized so a later
    /// write can never be overtaken by an earlier one.
    async fn save_if_current(&self, id: &str, expected: Option<u64>) -> anyhow::Result<()> {
        let _guard = self.save_lock.lock().await;

        let (layout, generation) = {
            let sessions = self.sessions.read().await;
            let Some(session) = sessions.get(id) else {
                return Ok(());
            };
            if expected.is_some_and(|g| g != session.generation) {
                tracing::debug!("Dashboard {} edited again, skipping save of generation {:?}", id, expected);
                return Ok(());
            }
            if session.saved_generation == session.generation {
                return Ok(());
            }
            (session.layout.clone(), session.generation)
        };

        self.store.save(id, &layout).await?;
        tracing::debug!("Saved dashboard {} at generation {}", id, generation);

        // Clean sessions are dropped; the store now holds the latest state
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(id) {
            session.saved_generation = session.saved_generation.max(generation);
            if session.saved_generation == session.generation {
                sessions.remove(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_store::memory::MemoryStore;
    use crate::domain::catalog::tests::sample_catalog;
    use crate::domain::dashboard::GridPosition;
    use serde_json::json;

    const DEBOUNCE: Duration = Duration::from_millis(1000);

    fn service(store: Arc<MemoryStore>) -> DashboardService {
        DashboardService::new(store, Arc::new(sample_catalog()), DEBOUNCE)
    }

    fn add_action(value: serde_json::Value) -> DashboardAction {
        serde_json::from_value(json!({"type": "addWidget", "widget": value})).unwrap()
    }

    fn drag(id: &str, x: u32) -> DashboardAction {
        DashboardAction::UpdateLayout {
            positions: vec![GridPosition {
                i: id.to_string(),
                x,
                y: 0,
                w: 3,
                h: 3,
                min_w: None,
                min_h: None,
            }],
            breakpoint: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_collapses_to_one_save() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        let (_, id) = service
            .apply(
                "main",
                add_action(json!({"deviceId": "d", "measurementId": "temperature", "widgetType": "gauge"})),
            )
            .await
            .unwrap();
        let id = id.unwrap();

        for x in 1..=5 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            service.apply("main", drag(&id, x)).await.unwrap();
        }
        assert!(store.saves.lock().unwrap().is_empty());

        tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1.primary_positions()[0].x, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_edits_each_persist_latest() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        service
            .apply(
                "main",
                DashboardAction::SetTimeRange {
                    time_range: "1h".to_string(),
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(DEBOUNCE * 2).await;
        service
            .apply("main", DashboardAction::SetAutoRefresh { enabled: false })
            .await
            .unwrap();
        tokio::time::sleep(DEBOUNCE * 2).await;

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].1.time_range, "1h");
        assert!(!saves[1].1.auto_refresh);
    }

    #[tokio::test]
    async fn test_loads_and_normalizes_stored_document() {
        let store = Arc::new(MemoryStore::default());
        let stored: DashboardLayout = serde_json::from_value(json!({
            "version": 1,
            "widgets": [{"id": "a", "deviceId": "d", "measurementId": "temperature", "widgetType": "status"}]
        }))
        .unwrap();
        store.documents.lock().unwrap().insert("main".to_string(), stored);

        let layout = service(store).get("main").await.unwrap();
        assert_eq!(layout.version, crate::domain::dashboard::LAYOUT_VERSION);
        assert_eq!(layout.primary_positions().len(), 1);
    }

    #[tokio::test]
    async fn test_template_widget_takes_template_size() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store);

        let (layout, _) = service
            .apply(
                "main",
                add_action(json!({"deviceId": "d", "deviceTypeId": "lht65", "templateId": "climate"})),
            )
            .await
            .unwrap();

        let position = &layout.primary_positions()[0];
        assert_eq!((position.w, position.h), (8, 6));
    }

    #[tokio::test]
    async fn test_unknown_widget_is_an_error_and_not_saved() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        let result = service
            .apply(
                "main",
                DashboardAction::DeleteWidget {
                    id: "missing".to_string(),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(DashboardServiceError::Dashboard(DashboardError::WidgetNotFound(_)))
        ));

        service.flush_all().await.unwrap();
        assert!(store.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_writes_through() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        let snapshot: DashboardLayout = serde_json::from_value(json!({"timeRange": "7d"})).unwrap();
        service.import("backup", snapshot).await.unwrap();

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "backup");
        assert_eq!(saves[0].1.time_range, "7d");
    }

    #[tokio::test]
    async fn test_failed_import_keeps_previous_layout() {
        let store = Arc::new(MemoryStore::default());
        let previous: DashboardLayout = serde_json::from_value(json!({"timeRange": "1h"})).unwrap();
        store.documents.lock().unwrap().insert("main".to_string(), previous);
        store.failing.lock().unwrap().insert("main".to_string());
        let service = service(store.clone());

        let snapshot: DashboardLayout = serde_json::from_value(json!({"timeRange": "7d"})).unwrap();
        let result = service.import("main", snapshot).await;
        assert!(matches!(result, Err(DashboardServiceError::Store(_))));

        assert_eq!(service.get("main").await.unwrap().time_range, "1h");
        assert!(service.sessions.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_supersedes_pending_edit() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        service
            .apply("main", DashboardAction::SetAutoRefresh { enabled: false })
            .await
            .unwrap();
        let snapshot: DashboardLayout = serde_json::from_value(json!({"timeRange": "7d"})).unwrap();
        service.import("main", snapshot).await.unwrap();
        tokio::time::sleep(DEBOUNCE * 2).await;

        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert!(saves[0].1.auto_refresh);
    }

    #[tokio::test]
    async fn test_reads_do_not_pin_sessions() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        for n in 0..10 {
            service.get(&format!("dash-{n}")).await.unwrap();
        }
        assert!(service.sessions.read().await.is_empty());
        assert!(store.saves.lock().unwrap().is_empty());

        let failed = service
            .apply(
                "dash-0",
                DashboardAction::DeleteWidget {
                    id: "missing".to_string(),
                },
            )
            .await;
        assert!(failed.is_err());
        assert!(service.sessions.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_sessions_are_evicted() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        service
            .apply(
                "main",
                DashboardAction::SetTimeRange {
                    time_range: "6h".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(service.sessions.read().await.len(), 1);

        tokio::time::sleep(DEBOUNCE * 2).await;

        assert!(service.sessions.read().await.is_empty());
        assert_eq!(service.get("main").await.unwrap().time_range, "6h");
    }

    #[tokio::test]
    async fn test_flush_all_continues_after_a_failure() {
        let store = Arc::new(MemoryStore::default());
        store.failing.lock().unwrap().insert("broken".to_string());
        let service = service(store.clone());

        for id in ["broken", "first", "second"] {
            service
                .apply(id, DashboardAction::SetAutoRefresh { enabled: false })
                .await
                .unwrap();
        }

        assert!(service.flush_all().await.is_err());

        let mut saved: Vec<String> = store.saves.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        saved.sort();
        assert_eq!(saved, vec!["first".to_string(), "second".to_string()]);
        // the failed dashboard keeps its edit for a later attempt
        let sessions = service.sessions.read().await;
        assert_eq!(sessions.len(), 1);
        assert!(!sessions["broken"].layout.auto_refresh);
    }
}
