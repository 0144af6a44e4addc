// Widget instance domain model - one placed widget on a dashboard
use crate::domain::catalog::WidgetKind;
use crate::domain::conversion::ConversionSettings;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WidgetError {
    #[error("widget is missing an id")]
    MissingId,

    #[error("widget {0} has neither a template nor a measurement/widget type pair")]
    Unbound(String),

    #[error("widget {0}: {1}")]
    InvalidPatch(String, String),
}

/// Per-measurement override inside a composite widget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionOverride {
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_types: Option<Vec<WidgetKind>>,
}

/// What a widget renders: one measurement as one widget type (legacy), or a
/// template with per-measurement overrides (composite).
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetBinding {
    Single {
        measurement_id: String,
        widget_type: WidgetKind,
    },
    Template {
        template_id: String,
        section_overrides: HashMap<String, SectionOverride>,
        section_order: Option<Vec<String>>,
    },
}

/// Widget fields before an id has been assigned
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "StoredWidgetInstance")]
pub struct WidgetDraft {
    pub device_id: String,
    pub device_type_id: Option<String>,
    pub binding: WidgetBinding,
    pub title: Option<String>,
    pub conversion: Option<ConversionSettings>,
    pub custom_min: Option<f64>,
    pub custom_max: Option<f64>,
}

impl WidgetDraft {
    pub fn into_instance(self, id: String) -> WidgetInstance {
        WidgetInstance {
            id,
            device_id: self.device_id,
            device_type_id: self.device_type_id,
            binding: self.binding,
            title: self.title,
            conversion: self.conversion,
            custom_min: self.custom_min,
            custom_max: self.custom_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredWidgetInstance", into = "StoredWidgetInstance")]
pub struct WidgetInstance {
    pub id: String,
    pub device_id: String,
    pub device_type_id: Option<String>,
    pub binding: WidgetBinding,
    pub title: Option<String>,
    pub conversion: Option<ConversionSettings>,
    pub custom_min: Option<f64>,
    pub custom_max: Option<f64>,
}

impl WidgetInstance {
    pub fn conversion(&self) -> ConversionSettings {
        self.conversion.unwrap_or_default()
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.binding, WidgetBinding::Template { .. })
    }

    /// Apply a partial update in place. The binding only switches mode when
    /// the patch carries a complete binding for the new mode.
    pub fn apply_patch(&mut self, patch: WidgetPatch) -> Result<(), WidgetError> {
        let binding = self.patched_binding(&patch)?;

        if let Some(device_id) = patch.device_id {
            self.device_id = device_id;
        }
        if let Some(device_type_id) = patch.device_type_id {
            self.device_type_id = device_type_id;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(conversion) = patch.conversion {
            self.conversion = conversion;
        }
        if let Some(custom_min) = patch.custom_min {
            self.custom_min = custom_min;
        }
        if let Some(custom_max) = patch.custom_max {
            self.custom_max = custom_max;
        }
        self.binding = binding;
        Ok(())
    }

    fn patched_binding(&self, patch: &WidgetPatch) -> Result<WidgetBinding, WidgetError> {
        if let Some(template_id) = &patch.template_id {
            let (overrides, order) = match &self.binding {
                WidgetBinding::Template {
                    section_overrides,
                    section_order,
                    ..
                } => (section_overrides.clone(), section_order.clone()),
                WidgetBinding::Single { .. } => (HashMap::new(), None),
            };
            return Ok(WidgetBinding::Template {
                template_id: template_id.clone(),
                section_overrides: patch.section_overrides.clone().unwrap_or(overrides),
                section_order: patch.section_order.clone().unwrap_or(order),
            });
        }

        match &self.binding {
            WidgetBinding::Template {
                template_id,
                section_overrides,
                section_order,
            } => {
                if patch.measurement_id.is_some() || patch.widget_type.is_some() {
                    return match (&patch.measurement_id, &patch.widget_type) {
                        (Some(measurement_id), Some(widget_type)) => Ok(WidgetBinding::Single {
                            measurement_id: measurement_id.clone(),
                            widget_type: widget_type.clone(),
                        }),
                        _ => Err(WidgetError::InvalidPatch(
                            self.id.clone(),
                            "switching to a single measurement needs both measurementId and widgetType"
                                .to_string(),
                        )),
                    };
                }
                Ok(WidgetBinding::Template {
                    template_id: template_id.clone(),
                    section_overrides: patch
                        .section_overrides
                        .clone()
                        .unwrap_or_else(|| section_overrides.clone()),
                    section_order: patch
                        .section_order
                        .clone()
                        .unwrap_or_else(|| section_order.clone()),
                })
            }
            WidgetBinding::Single {
                measurement_id,
                widget_type,
            } => Ok(WidgetBinding::Single {
                measurement_id: patch
                    .measurement_id
                    .clone()
                    .unwrap_or_else(|| measurement_id.clone()),
                widget_type: patch
                    .widget_type
                    .clone()
                    .unwrap_or_else(|| widget_type.clone()),
            }),
        }
    }
}

/// Partial update for `updateWidget`. Nullable fields use a nested option so
/// an explicit `null` clears the value while an absent key leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPatch {
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub device_type_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub conversion: Option<Option<ConversionSettings>>,
    #[serde(default, deserialize_with = "present")]
    pub custom_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub custom_max: Option<Option<f64>>,
    pub measurement_id: Option<String>,
    pub widget_type: Option<WidgetKind>,
    pub template_id: Option<String>,
    pub section_overrides: Option<HashMap<String, SectionOverride>>,
    #[serde(default, deserialize_with = "present")]
    pub section_order: Option<Option<Vec<String>>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Flat JSON shape of a widget record. Older documents may carry both the
/// legacy and the template fields; the template wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWidgetInstance {
    #[serde(default)]
    id: String,
    device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    measurement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    widget_type: Option<WidgetKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    section_overrides: Option<HashMap<String, SectionOverride>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    section_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conversion: Option<ConversionSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_max: Option<f64>,
}

impl TryFrom<StoredWidgetInstance> for WidgetDraft {
    type Error = WidgetError;

    fn try_from(stored: StoredWidgetInstance) -> Result<Self, Self::Error> {
        let binding = match (stored.template_id, stored.measurement_id, stored.widget_type) {
            (Some(template_id), _, _) => WidgetBinding::Template {
                template_id,
                section_overrides: stored.section_overrides.unwrap_or_default(),
                section_order: stored.section_order,
            },
            (None, Some(measurement_id), Some(widget_type)) => WidgetBinding::Single {
                measurement_id,
                widget_type,
            },
            _ => return Err(WidgetError::Unbound(stored.id)),
        };

        Ok(WidgetDraft {
            device_id: stored.device_id,
            device_type_id: stored.device_type_id,
            binding,
            title: stored.title,
            conversion: stored.conversion,
            custom_min: stored.custom_min,
            custom_max: stored.custom_max,
        })
    }
}

impl TryFrom<StoredWidgetInstance> for WidgetInstance {
    type Error = WidgetError;

    fn try_from(stored: StoredWidgetInstance) -> Result<Self, Self::Error> {
        if stored.id.is_empty() {
            return Err(WidgetError::MissingId);
        }
        let id = stored.id.clone();
        Ok(WidgetDraft::try_from(stored)?.into_instance(id))
    }
}

impl From<WidgetInstance> for StoredWidgetInstance {
    fn from(widget: WidgetInstance) -> Self {
        let mut stored = StoredWidgetInstance {
            id: widget.id,
            device_id: widget.device_id,
            device_type_id: widget.device_type_id,
            title: widget.title,
            conversion: widget.conversion,
            custom_min: widget.custom_min,
            custom_max: widget.custom_max,
            ..Default::default()
        };

        match widget.binding {
            WidgetBinding::Single {
                measurement_id,
                widget_type,
            } => {
                stored.measurement_id = Some(measurement_id);
                stored.widget_type = Some(widget_type);
            }
            WidgetBinding::Template {
                template_id,
                section_overrides,
                section_order,
            } => {
                stored.template_id = Some(template_id);
                stored.section_overrides = Some(section_overrides);
                stored.section_order = section_order;
            }
        }

        stored
    }
}
