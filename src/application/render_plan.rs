// Render plan - what each widget shows after a data refresh
use crate::application::template_resolver::resolve_sections;
use crate::application::widget_data::assemble_widget_data;
use crate::domain::catalog::{
    Catalog, LayoutHint, LayoutKind, MeasurementDefinition, WidgetKind, WidgetType,
};
use crate::domain::telemetry::WidgetData;
use crate::domain::widget::{WidgetBinding, WidgetInstance};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// One visual on screen, or an inline error in its place
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderEntry {
    #[serde(rename_all = "camelCase")]
    Visual {
        measurement_id: String,
        name: String,
        display_type: WidgetType,
        #[serde(skip_serializing_if = "Option::is_none")]
        axis: Option<AxisRange>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<LayoutHint>,
        data: Arc<WidgetData>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub entries: Vec<RenderEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum WidgetRender {
    Single {
        entry: RenderEntry,
    },
    #[serde(rename_all = "camelCase")]
    Composite {
        template_id: String,
        template_name: String,
        layout: LayoutKind,
        sections: Vec<RenderedSection>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub widget_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub render: WidgetRender,
}

/// Build the view of one widget from the frames fetched for its device.
/// Every failure ends up inside the view; nothing here aborts siblings.
pub fn render_widget(
    widget: &WidgetInstance,
    frames: Result<&[Value], &str>,
    catalog: &Catalog,
) -> WidgetView {
    let mut renderer = Renderer {
        widget,
        frames,
        cache: HashMap::new(),
    };
    let device_type_id = widget.device_type_id.as_deref();

    let render = match &widget.binding {
        WidgetBinding::Single {
            measurement_id,
            widget_type,
        } => {
            let entry = match catalog.measurement(device_type_id, measurement_id) {
                Some(measurement) => renderer.entry(measurement, widget_type, None),
                None => unknown_measurement(measurement_id),
            };
            WidgetRender::Single { entry }
        }
        WidgetBinding::Template {
            template_id,
            section_overrides,
            section_order,
        } => match catalog.template(device_type_id, template_id) {
            Some((device_type, template)) => {
                let mut sections = Vec::new();
                for section in
                    resolve_sections(template, section_overrides, section_order.as_deref())
                {
                    let mut entries = Vec::new();
                    for resolved in &section.measurements {
                        let Some(measurement) = device_type.measurement(&resolved.measurement_id)
                        else {
                            entries.push(unknown_measurement(&resolved.measurement_id));
                            continue;
                        };
                        for kind in &resolved.display_types {
                            let hint = section.layout_hints.get(&kind.to_string()).cloned();
                            entries.push(renderer.entry(measurement, kind, hint));
                        }
                    }
                    sections.push(RenderedSection {
                        title: section.title.map(str::to_string),
                        entries,
                    });
                }

                WidgetRender::Composite {
                    template_id: template.id.clone(),
                    template_name: template.name.clone(),
                    layout: template.layout,
                    sections,
                }
            }
            None => WidgetRender::Single {
                entry: RenderEntry::Error {
                    message: format!("Unknown template '{}'", template_id),
                },
            },
        },
    };

    WidgetView {
        widget_id: widget.id.clone(),
        title: widget.title.clone(),
        render,
    }
}

fn unknown_measurement(id: &str) -> RenderEntry {
    RenderEntry::Error {
        message: format!("Unknown measurement '{}'", id),
    }
}

struct Renderer<'a> {
    widget: &'a WidgetInstance,
    frames: Result<&'a [Value], &'a str>,
    /// Assembled data is shared by every display type of a measurement
    cache: HashMap<String, Arc<WidgetData>>,
}

impl Renderer<'_> {
    fn data(&mut self, measurement: &MeasurementDefinition) -> Arc<WidgetData> {
        if let Some(data) = self.cache.get(&measurement.id) {
            return data.clone();
        }
        let data = Arc::new(match self.frames {
            Ok(frames) => assemble_widget_data(frames, self.widget, measurement),
            Err(message) => WidgetData::error(message),
        });
        self.cache.insert(measurement.id.clone(), data.clone());
        data
    }

    fn entry(
        &mut self,
        measurement: &MeasurementDefinition,
        kind: &WidgetKind,
        hint: Option<LayoutHint>,
    ) -> RenderEntry {
        let display_type = match kind {
            WidgetKind::Known(display_type) => *display_type,
            WidgetKind::Unsupported(name) => {
                return RenderEntry::Error {
                    message: format!("Unknown widget type '{}'", name),
                };
            }
        };

        RenderEntry::Visual {
            measurement_id: measurement.id.clone(),
            name: measurement.name.clone(),
            display_type,
            axis: axis_range(self.widget, measurement, display_type),
            hint,
            data: self.data(measurement),
        }
    }
}

/// Instance bounds override catalog bounds; both are converted for display
pub fn axis_range(
    widget: &WidgetInstance,
    measurement: &MeasurementDefinition,
    display_type: WidgetType,
) -> Option<AxisRange> {
    let (catalog_min, catalog_max) = measurement.axis_bounds(display_type);
    let min = widget.custom_min.or(catalog_min);
    let max = widget.custom_max.or(catalog_max);
    if min.is_none() && max.is_none() {
        return None;
    }

    let (min, max) = widget
        .conversion()
        .convert_range(min, max, &measurement.unit);
    Some(AxisRange { min, max })
}
