// Unit conversion for temperature measurements
use serde::{Deserialize, Serialize};

/// Unit label the catalog uses for temperatures
pub const CELSIUS_LABEL: &str = "°C";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureTarget {
    #[default]
    Fahrenheit,
    Kelvin,
}

impl TemperatureTarget {
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            Self::Kelvin => celsius + 273.15,
        }
    }

    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            Self::Kelvin => value - 273.15,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub convert_to: TemperatureTarget,
}

impl ConversionSettings {
    pub fn to(target: TemperatureTarget) -> Self {
        Self {
            enabled: true,
            convert_to: target,
        }
    }

    /// Target unit when conversion applies to `source_unit`
    fn target_for(&self, source_unit: &str) -> Option<TemperatureTarget> {
        (self.enabled && source_unit.trim() == CELSIUS_LABEL).then_some(self.convert_to)
    }

    pub fn convert_value(&self, value: f64, source_unit: &str) -> f64 {
        match self.target_for(source_unit) {
            Some(target) => target.from_celsius(value),
            None => value,
        }
    }

    pub fn convert_unit(&self, source_unit: &str) -> String {
        match self.target_for(source_unit) {
            Some(target) => target.label().to_string(),
            None => source_unit.to_string(),
        }
    }

    /// Convert axis bounds; either bound may be absent
    pub fn convert_range(
        &self,
        min: Option<f64>,
        max: Option<f64>,
        source_unit: &str,
    ) -> (Option<f64>, Option<f64>) {
        (
            min.map(|v| self.convert_value(v, source_unit)),
            max.map(|v| self.convert_value(v, source_unit)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_identity() {
        let settings = ConversionSettings {
            enabled: false,
            convert_to: TemperatureTarget::Kelvin,
        };
        assert_eq!(settings.convert_value(21.0, CELSIUS_LABEL), 21.0);
        assert_eq!(settings.convert_unit(CELSIUS_LABEL), CELSIUS_LABEL);
    }

    #[test]
    fn test_fahrenheit_and_kelvin() {
        let f = ConversionSettings::to(TemperatureTarget::Fahrenheit);
        let k = ConversionSettings::to(TemperatureTarget::Kelvin);

        assert_eq!(f.convert_value(100.0, CELSIUS_LABEL), 212.0);
        assert_eq!(f.convert_value(-40.0, CELSIUS_LABEL), -40.0);
        assert_eq!(f.convert_unit(CELSIUS_LABEL), "°F");
        assert!((k.convert_value(0.0, CELSIUS_LABEL) - 273.15).abs() < 1e-9);
        assert_eq!(k.convert_unit(CELSIUS_LABEL), "K");
    }

    #[test]
    fn test_non_temperature_unit_untouched() {
        let f = ConversionSettings::to(TemperatureTarget::Fahrenheit);

        assert_eq!(f.convert_value(55.0, "%RH"), 55.0);
        assert_eq!(f.convert_unit("%RH"), "%RH");
        assert_eq!(f.convert_range(Some(0.0), Some(100.0), "%RH"), (Some(0.0), Some(100.0)));
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        for target in [TemperatureTarget::Fahrenheit, TemperatureTarget::Kelvin] {
            let settings = ConversionSettings::to(target);
            for celsius in [-40.0, -3.3, 0.0, 21.7, 100.0] {
                let back = target.to_celsius(settings.convert_value(celsius, CELSIUS_LABEL));
                assert!((back - celsius).abs() < 1e-9, "{target:?} {celsius} -> {back}");
            }
        }
    }

    #[test]
    fn test_range_conversion() {
        let f = ConversionSettings::to(TemperatureTarget::Fahrenheit);
        assert_eq!(
            f.convert_range(Some(0.0), None, CELSIUS_LABEL),
            (Some(32.0), None)
        );
    }

    #[test]
    fn test_deserialize_camel_case() {
        let settings: ConversionSettings =
            serde_json::from_str(r#"{"enabled":true,"convertTo":"kelvin"}"#).unwrap();
        assert_eq!(settings, ConversionSettings::to(TemperatureTarget::Kelvin));
    }
}
