// Dashboard domain model - layout document and its update functions
use crate::domain::catalog::{WidgetKind, WidgetSize, WidgetType};
use crate::domain::widget::{WidgetBinding, WidgetDraft, WidgetError, WidgetInstance, WidgetPatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

pub const LAYOUT_VERSION: u32 = 2;
pub const PRIMARY_BREAKPOINT: &str = "lg";

/// Footprint of a composite widget when its template gives no size
pub const COMPOSITE_SIZE: WidgetSize = WidgetSize { w: 6, h: 6 };

/// Default footprint per legacy widget type
pub fn default_size(widget_type: WidgetType) -> WidgetSize {
    match widget_type {
        WidgetType::CurrentValue => WidgetSize { w: 3, h: 2 },
        WidgetType::TimeSeries => WidgetSize { w: 6, h: 4 },
        WidgetType::Gauge => WidgetSize { w: 3, h: 3 },
        WidgetType::Status => WidgetSize { w: 3, h: 2 },
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DashboardError {
    #[error("widget {0} not found")]
    WidgetNotFound(String),

    #[error(transparent)]
    Widget(#[from] WidgetError),
}

/// Grid position of one widget (`i` is the widget id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPosition {
    pub i: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_h: Option<u32>,
}

impl GridPosition {
    fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLayout {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
    /// Seconds between automatic refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default)]
    pub widgets: Vec<WidgetInstance>,
    #[serde(default)]
    pub layouts: BTreeMap<String, Vec<GridPosition>>,
}

fn current_version() -> u32 {
    LAYOUT_VERSION
}

fn default_time_range() -> String {
    "24h".to_string()
}

fn default_auto_refresh() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    60
}

impl Default for DashboardLayout {
    fn default() -> Self {
        Self {
            version: LAYOUT_VERSION,
            time_range: default_time_range(),
            auto_refresh: default_auto_refresh(),
            refresh_interval: default_refresh_interval(),
            widgets: Vec::new(),
            layouts: BTreeMap::from([(PRIMARY_BREAKPOINT.to_string(), Vec::new())]),
        }
    }
}

/// One update to a dashboard. Every UI mutation goes through `apply`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DashboardAction {
    #[serde(rename_all = "camelCase")]
    AddWidget {
        widget: WidgetDraft,
        #[serde(default)]
        size: Option<WidgetSize>,
    },
    UpdateWidget {
        id: String,
        patch: WidgetPatch,
    },
    DeleteWidget {
        id: String,
    },
    UpdateLayout {
        positions: Vec<GridPosition>,
        #[serde(default)]
        breakpoint: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SetTimeRange {
        time_range: String,
    },
    SetAutoRefresh {
        enabled: bool,
    },
    SetRefreshInterval {
        seconds: u64,
    },
}

impl DashboardLayout {
    pub fn widget(&self, id: &str) -> Option<&WidgetInstance> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn primary_positions(&self) -> &[GridPosition] {
        self.layouts
            .get(PRIMARY_BREAKPOINT)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Apply one action. Returns the id of a newly added widget.
    pub fn apply(&mut self, action: DashboardAction) -> Result<Option<String>, DashboardError> {
        match action {
            DashboardAction::AddWidget { widget, size } => {
                let id = uuid::Uuid::new_v4().to_string();
                self.add_widget(widget.into_instance(id.clone()), size);
                Ok(Some(id))
            }
            DashboardAction::UpdateWidget { id, patch } => {
                self.update_widget(&id, patch)?;
                Ok(None)
            }
            DashboardAction::DeleteWidget { id } => {
                self.delete_widget(&id)?;
                Ok(None)
            }
            DashboardAction::UpdateLayout {
                positions,
                breakpoint,
            } => {
                let breakpoint = breakpoint.unwrap_or_else(|| PRIMARY_BREAKPOINT.to_string());
                self.update_layout(&breakpoint, positions);
                Ok(None)
            }
            DashboardAction::SetTimeRange { time_range } => {
                self.time_range = time_range;
                Ok(None)
            }
            DashboardAction::SetAutoRefresh { enabled } => {
                self.auto_refresh = enabled;
                Ok(None)
            }
            DashboardAction::SetRefreshInterval { seconds } => {
                self.refresh_interval = seconds.max(1);
                Ok(None)
            }
        }
    }

    /// Append a widget and stack its position below everything else
    pub fn add_widget(&mut self, widget: WidgetInstance, size: Option<WidgetSize>) {
        let size = size.unwrap_or_else(|| footprint(&widget));
        let position = self.next_position(&widget.id, size);

        self.widgets.push(widget);
        self.layouts
            .entry(PRIMARY_BREAKPOINT.to_string())
            .or_default()
            .push(position);
    }

    pub fn update_widget(&mut self, id: &str, patch: WidgetPatch) -> Result<(), DashboardError> {
        let widget = self
            .widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| DashboardError::WidgetNotFound(id.to_string()))?;
        widget.apply_patch(patch)?;
        Ok(())
    }

    /// Remove a widget together with its positions on every breakpoint
    pub fn delete_widget(&mut self, id: &str) -> Result<(), DashboardError> {
        let before = self.widgets.len();
        self.widgets.retain(|w| w.id != id);
        if self.widgets.len() == before {
            return Err(DashboardError::WidgetNotFound(id.to_string()));
        }

        for positions in self.layouts.values_mut() {
            positions.retain(|p| p.i != id);
        }
        Ok(())
    }

    /// Replace a breakpoint's positions wholesale. Unknown ids are dropped,
    /// and on the primary breakpoint duplicates keep their last entry and
    /// widgets missing from the new list keep their previous position.
    pub fn update_layout(&mut self, breakpoint: &str, positions: Vec<GridPosition>) {
        let known: HashSet<&str> = self.widgets.iter().map(|w| w.id.as_str()).collect();
        let mut positions: Vec<GridPosition> = positions
            .into_iter()
            .filter(|p| known.contains(p.i.as_str()))
            .collect();

        if breakpoint == PRIMARY_BREAKPOINT {
            let mut seen = HashSet::new();
            let mut deduped: Vec<GridPosition> = positions
                .into_iter()
                .rev()
                .filter(|p| seen.insert(p.i.clone()))
                .collect();
            deduped.reverse();

            for previous in self.primary_positions() {
                if !seen.contains(&previous.i) && known.contains(previous.i.as_str()) {
                    seen.insert(previous.i.clone());
                    deduped.push(previous.clone());
                }
            }
            positions = deduped;
        }

        self.layouts.insert(breakpoint.to_string(), positions);
    }

    /// Bring a loaded document up to the current version: drop duplicate
    /// widget ids (the first wins) and orphaned positions, and give every
    /// widget exactly one primary position.
    pub fn normalize(&mut self) {
        let mut ids = HashSet::new();
        self.widgets.retain(|w| {
            let first = ids.insert(w.id.clone());
            if !first {
                tracing::warn!("Dropping duplicate widget {}", w.id);
            }
            first
        });

        let known: HashSet<String> = self.widgets.iter().map(|w| w.id.clone()).collect();
        for positions in self.layouts.values_mut() {
            positions.retain(|p| known.contains(&p.i));
        }

        let current = self
            .layouts
            .remove(PRIMARY_BREAKPOINT)
            .unwrap_or_default();
        self.update_layout(PRIMARY_BREAKPOINT, current);

        let placed: HashSet<String> = self.primary_positions().iter().map(|p| p.i.clone()).collect();
        let unplaced: Vec<(String, WidgetSize)> = self
            .widgets
            .iter()
            .filter(|w| !placed.contains(&w.id))
            .map(|w| (w.id.clone(), footprint(w)))
            .collect();
        for (id, size) in unplaced {
            let position = self.next_position(&id, size);
            self.layouts
                .entry(PRIMARY_BREAKPOINT.to_string())
                .or_default()
                .push(position);
        }

        self.version = LAYOUT_VERSION;
    }

    fn next_position(&self, id: &str, size: WidgetSize) -> GridPosition {
        let y = self
            .primary_positions()
            .iter()
            .map(GridPosition::bottom)
            .max()
            .unwrap_or(0);

        GridPosition {
            i: id.to_string(),
            x: 0,
            y,
            w: size.w,
            h: size.h,
            min_w: Some(2),
            min_h: Some(2),
        }
    }
}

fn footprint(widget: &WidgetInstance) -> WidgetSize {
    match &widget.binding {
        WidgetBinding::Single {
            widget_type: WidgetKind::Known(widget_type),
            ..
        } => default_size(*widget_type),
        WidgetBinding::Single { .. } => default_size(WidgetType::CurrentValue),
        WidgetBinding::Template { .. } => COMPOSITE_SIZE,
    }
}
