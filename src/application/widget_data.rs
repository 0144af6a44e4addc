// Widget data assembler - frames in, one WidgetData out
use crate::domain::catalog::MeasurementDefinition;
use crate::domain::frame::Frame;
use crate::domain::status::evaluate_status;
use crate::domain::telemetry::{format_value, TimeSeriesPoint, WidgetData};
use crate::domain::widget::WidgetInstance;
use serde_json::Value;

pub const NO_UPLINK_FRAMES: &str = "No uplink frames found";

/// Build the data payload for one measurement of one widget.
///
/// Join and downlink frames are ignored, uplinks without a timestamp or
/// without a numeric value at the measurement path are skipped. Only an
/// empty result is reported, as the payload's `error`.
pub fn assemble_widget_data(
    frames: &[Value],
    widget: &WidgetInstance,
    measurement: &MeasurementDefinition,
) -> WidgetData {
    let conversion = widget.conversion();

    let uplinks: Vec<(&Value, Frame<'_>)> = frames
        .iter()
        .map(|raw| (raw, Frame::classify(raw)))
        .filter(|(_, frame)| frame.is_uplink())
        .collect();

    if uplinks.is_empty() {
        return WidgetData::error(NO_UPLINK_FRAMES);
    }

    let mut series: Vec<TimeSeriesPoint> = uplinks
        .iter()
        .filter_map(|(raw, frame)| {
            let timestamp = frame.timestamp_ms()?;
            let value = frame.measurement(raw, &measurement.path)?;
            Some(TimeSeriesPoint::new(
                timestamp,
                conversion.convert_value(value, &measurement.unit),
            ))
        })
        .collect();

    if series.is_empty() {
        tracing::debug!(
            "Widget {}: {} uplinks, none with a value at {}",
            widget.id,
            uplinks.len(),
            measurement.path
        );
        return WidgetData::error(format!("No values found at path '{}'", measurement.path));
    }

    series.sort_by_key(|p| p.timestamp);

    let (timestamp, current) = series
        .last()
        .map(|p| (p.timestamp, p.value))
        .unwrap_or_default();
    let status = evaluate_status(current, measurement.status_conditions());

    WidgetData {
        current_value: Some(current),
        formatted_value: Some(format_value(current, measurement.decimals)),
        timestamp: Some(timestamp),
        status: Some(status),
        unit: conversion.convert_unit(&measurement.unit),
        decimals: measurement.decimals,
        time_series: series,
        error: None,
    }
}
