// Device-type catalog - measurement definitions and widget templates
use crate::domain::status::StatusCondition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Visual representations a measurement can be rendered as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetType {
    CurrentValue,
    TimeSeries,
    Gauge,
    Status,
}

impl WidgetType {
    pub const ALL: [WidgetType; 4] = [
        WidgetType::CurrentValue,
        WidgetType::TimeSeries,
        WidgetType::Gauge,
        WidgetType::Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentValue => "current_value",
            Self::TimeSeries => "time_series",
            Self::Gauge => "gauge",
            Self::Status => "status",
        }
    }
}

/// A widget type as written in stored JSON. Names this build does not know
/// are kept so they can be reported at render time instead of failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetKind {
    Known(WidgetType),
    Unsupported(String),
}

impl From<String> for WidgetKind {
    fn from(name: String) -> Self {
        WidgetType::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .map(WidgetKind::Known)
            .unwrap_or(WidgetKind::Unsupported(name))
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        kind.to_string()
    }
}

impl From<WidgetType> for WidgetKind {
    fn from(widget_type: WidgetType) -> Self {
        WidgetKind::Known(widget_type)
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetKind::Known(t) => f.write_str(t.as_str()),
            WidgetKind::Unsupported(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSize {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesConfig {
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// Per-widget-type settings of one measurement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerWidgetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_series: Option<TimeSeriesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gauge: Option<GaugeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementDefinition {
    pub id: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    #[serde(default = "default_widget_type")]
    pub default_widget_type: WidgetType,
    #[serde(default)]
    pub per_widget_config: PerWidgetConfig,
}

fn default_decimals() -> u32 {
    1
}

fn default_widget_type() -> WidgetType {
    WidgetType::CurrentValue
}

impl MeasurementDefinition {
    pub fn status_conditions(&self) -> &[StatusCondition] {
        self.per_widget_config
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// Catalog axis bounds for a widget type, in the measurement's own unit
    pub fn axis_bounds(&self, widget_type: WidgetType) -> (Option<f64>, Option<f64>) {
        let config = &self.per_widget_config;
        match widget_type {
            WidgetType::Gauge => config
                .gauge
                .as_ref()
                .map(|g| (g.min, g.max))
                .unwrap_or((None, None)),
            WidgetType::TimeSeries => config
                .time_series
                .as_ref()
                .map(|t| (t.y_min, t.y_max))
                .unwrap_or((None, None)),
            WidgetType::CurrentValue | WidgetType::Status => (None, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Grid,
    Vertical,
    Horizontal,
}

/// Optional sizing for one display type inside a section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub measurement_ids: Vec<String>,
    pub display_types: Vec<WidgetKind>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub layout_hints: HashMap<String, LayoutHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub layout: LayoutKind,
    pub default_size: WidgetSize,
    pub sections: Vec<TemplateSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceType {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    pub measurements: Vec<MeasurementDefinition>,
    #[serde(default)]
    pub templates: Vec<WidgetTemplate>,
}

impl DeviceType {
    pub fn measurement(&self, id: &str) -> Option<&MeasurementDefinition> {
        self.measurements.iter().find(|m| m.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&WidgetTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }
}

/// Summary row for catalog listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTypeSummary {
    pub id: String,
    pub name: String,
    pub measurement_count: usize,
    pub template_ids: Vec<String>,
}

/// Immutable set of device types, keyed by id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    device_types: BTreeMap<String, DeviceType>,
}

impl Catalog {
    pub fn new(device_types: impl IntoIterator<Item = DeviceType>) -> Self {
        Self {
            device_types: device_types
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    pub fn device_type(&self, id: &str) -> Option<&DeviceType> {
        self.device_types.get(id)
    }

    pub fn summaries(&self) -> Vec<DeviceTypeSummary> {
        self.device_types
            .values()
            .map(|d| DeviceTypeSummary {
                id: d.id.clone(),
                name: d.name.clone(),
                measurement_count: d.measurements.len(),
                template_ids: d.templates.iter().map(|t| t.id.clone()).collect(),
            })
            .collect()
    }

    /// Look up a measurement within the given device type, or across the
    /// whole catalog (in device-type id order) when the type is unknown.
    pub fn measurement(
        &self,
        device_type_id: Option<&str>,
        measurement_id: &str,
    ) -> Option<&MeasurementDefinition> {
        match device_type_id {
            Some(id) => self.device_type(id)?.measurement(measurement_id),
            None => self
                .device_types
                .values()
                .find_map(|d| d.measurement(measurement_id)),
        }
    }

    /// Template plus the device type that owns it
    pub fn template(
        &self,
        device_type_id: Option<&str>,
        template_id: &str,
    ) -> Option<(&DeviceType, &WidgetTemplate)> {
        match device_type_id {
            Some(id) => {
                let device_type = self.device_type(id)?;
                device_type.template(template_id).map(|t| (device_type, t))
            }
            None => self
                .device_types
                .values()
                .find_map(|d| d.template(template_id).map(|t| (d, t))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_DEVICE_TYPE: &str = r#"{
        "id": "lht65",
        "name": "Dragino LHT65",
        "measurements": [
            {
                "id": "temperature",
                "path": "decoded_payload.object.TempC_SHT",
                "name": "Temperature",
                "unit": "°C",
                "decimals": 1,
                "defaultWidgetType": "time_series",
                "perWidgetConfig": {
                    "gauge": {"min": -20, "max": 50},
                    "time_series": {"yMin": 0, "yMax": 40},
                    "status": {"conditions": [
                        {"operator": "lt", "value": 10, "status": "error", "label": "Low"},
                        {"operator": "between", "min": 10, "max": 20, "status": "success", "label": "Normal"},
                        {"operator": "gt", "value": 20, "status": "warning", "label": "High"}
                    ]}
                }
            },
            {
                "id": "humidity",
                "path": "decoded_payload.object.Hum_SHT",
                "name": "Humidity",
                "unit": "%RH",
                "decimals": 0
            },
            {
                "id": "battery",
                "path": "decoded_payload.object.BatV",
                "name": "Battery",
                "unit": "V",
                "decimals": 2,
                "defaultWidgetType": "gauge"
            }
        ],
        "templates": [
            {
                "id": "climate",
                "name": "Climate overview",
                "layout": "grid",
                "defaultSize": {"w": 8, "h": 6},
                "sections": [
                    {"measurementIds": ["temperature"], "displayTypes": ["current_value", "gauge"]},
                    {"measurementIds": ["humidity"], "displayTypes": ["current_value"]},
                    {"title": "Trends", "measurementIds": ["temperature", "humidity"], "displayTypes": ["time_series"],
                     "layoutHints": {"time_series": {"span": 2}}},
                    {"measurementIds": ["battery"], "displayTypes": ["gauge", "sparkline"]}
                ]
            }
        ]
    }"#;

    pub(crate) fn sample_catalog() -> Catalog {
        let device_type: DeviceType = serde_json::from_str(SAMPLE_DEVICE_TYPE).unwrap();
        Catalog::new([device_type])
    }

    #[test]
    fn test_parse_device_type() {
        let catalog = sample_catalog();
        let device_type = catalog.device_type("lht65").unwrap();

        assert_eq!(device_type.measurements.len(), 3);
        let humidity = device_type.measurement("humidity").unwrap();
        assert_eq!(humidity.default_widget_type, WidgetType::CurrentValue);
        assert!(humidity.status_conditions().is_empty());

        let temperature = device_type.measurement("temperature").unwrap();
        assert_eq!(temperature.status_conditions().len(), 3);
        assert_eq!(temperature.axis_bounds(WidgetType::Gauge), (Some(-20.0), Some(50.0)));
        assert_eq!(temperature.axis_bounds(WidgetType::Status), (None, None));
    }

    #[test]
    fn test_unknown_display_type_is_kept() {
        let catalog = sample_catalog();
        let (_, template) = catalog.template(None, "climate").unwrap();

        assert_eq!(
            template.sections[3].display_types,
            vec![
                WidgetKind::Known(WidgetType::Gauge),
                WidgetKind::Unsupported("sparkline".to_string())
            ]
        );
        assert_eq!(
            serde_json::to_string(&template.sections[3].display_types).unwrap(),
            r#"["gauge","sparkline"]"#
        );
    }

    #[test]
    fn test_lookup_without_device_type() {
        let catalog = sample_catalog();

        assert!(catalog.measurement(None, "battery").is_some());
        assert!(catalog.measurement(Some("lht65"), "battery").is_some());
        assert!(catalog.measurement(Some("other"), "battery").is_none());
        assert!(catalog.template(Some("lht65"), "missing").is_none());
    }
}
