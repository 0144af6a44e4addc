// Refresh service - queries frames and renders every widget of a dashboard
use crate::application::frame_repository::FrameRepository;
use crate::application::render_plan::{render_widget, WidgetView};
use crate::domain::catalog::Catalog;
use crate::domain::dashboard::DashboardLayout;
use crate::infrastructure::config::prepare_query;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Clone)]
pub struct RefreshService {
    repository: Arc<dyn FrameRepository>,
    catalog: Arc<Catalog>,
    frame_query: String,
}

impl RefreshService {
    pub fn new(repository: Arc<dyn FrameRepository>, catalog: Arc<Catalog>, frame_query: String) -> Self {
        Self {
            repository,
            catalog,
            frame_query,
        }
    }

    /// Build the frame query for one device. Both values end up inside
    /// quoted literals, so only whitelisted shapes are accepted.
    pub fn prepare_frame_query(&self, device_id: &str, duration: &str) -> Result<String, String> {
        if !is_device_id(device_id) {
            return Err(format!("Invalid device id {:?}", device_id));
        }
        if !is_duration(duration) {
            return Err(format!("Invalid time range {:?}", duration));
        }

        let mut vars = HashMap::new();
        vars.insert("device".to_string(), device_id.to_string());
        vars.insert("duration".to_string(), duration.to_string());
        Ok(prepare_query(&self.frame_query, &vars))
    }

    /// Refresh all widgets. Devices are queried concurrently, once each; a
    /// failed query only affects the widgets of that device.
    pub async fn refresh(&self, layout: &DashboardLayout) -> Vec<WidgetView> {
        let devices: BTreeSet<&str> = layout.widgets.iter().map(|w| w.device_id.as_str()).collect();
        tracing::debug!(
            "Refreshing {} widgets ({} composite) across {} devices",
            layout.widgets.len(),
            layout.widgets.iter().filter(|w| w.is_composite()).count(),
            devices.len()
        );

        let results = join_all(devices.iter().map(|device_id| async move {
            let frames = self.fetch_frames(device_id, &layout.time_range).await;
            (*device_id, frames)
        }))
        .await;
        let frames_by_device: HashMap<&str, Result<Vec<Value>, String>> = results.into_iter().collect();

        layout
            .widgets
            .iter()
            .map(|widget| {
                let frames = match frames_by_device.get(widget.device_id.as_str()) {
                    Some(Ok(frames)) => Ok(frames.as_slice()),
                    Some(Err(message)) => Err(message.as_str()),
                    None => Err("No frames requested"),
                };
                render_widget(widget, frames, &self.catalog)
            })
            .collect()
    }

    async fn fetch_frames(&self, device_id: &str, duration: &str) -> Result<Vec<Value>, String> {
        let query = self.prepare_frame_query(device_id, duration)?;
        tracing::debug!("Querying frames: {}", query);

        match self.repository.query_frames(&query).await {
            Ok(frames) => {
                tracing::debug!("Got {} frames for device {}", frames.len(), device_id);
                Ok(frames)
            }
            Err(e) => {
                tracing::error!("Frame query for device {} failed: {:#}", device_id, e);
                Err(format!("Failed to query frames: {}", e))
            }
        }
    }
}

/// DevEUIs and similar identifiers: ASCII letters, digits, `-` and `_`
fn is_device_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A count followed by one unit: `90s`, `15m`, `24h`, `7d`, `2w`
fn is_duration(value: &str) -> bool {
    let Some(unit) = value.chars().last() else {
        return false;
    };
    let count = &value[..value.len() - unit.len_utf8()];
    matches!(unit, 's' | 'm' | 'h' | 'd' | 'w')
        && !count.is_empty()
        && count.len() <= 6
        && count.chars().all(|c| c.is_ascii_digit())
}
