// Telemetry data domain models - per-refresh widget payloads
use crate::domain::status::StatusResult;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Data computed for one widget on one refresh. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub time_series: Vec<TimeSeriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusResult>,
    pub unit: String,
    pub decimals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WidgetData {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            current_value: None,
            formatted_value: None,
            timestamp: None,
            time_series: Vec::new(),
            status: None,
            unit: String::new(),
            decimals: 0,
            error: Some(message.into()),
        }
    }
}

/// Round for display with a fixed number of decimals
pub fn format_value(value: f64, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(21.456, 1), "21.5");
        assert_eq!(format_value(3.0, 2), "3.00");
        assert_eq!(format_value(54.6, 0), "55");
    }

    #[test]
    fn test_error_payload_serialization() {
        let data = WidgetData::error("No uplink frames found");
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["error"], "No uplink frames found");
        assert!(json.get("currentValue").is_none());
        assert_eq!(json["timeSeries"], serde_json::json!([]));
    }
}
