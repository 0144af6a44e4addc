// Status evaluation - ordered threshold rules, first match wins
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Success,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCondition {
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub status: StatusLevel,
    pub label: String,
}

impl StatusCondition {
    /// A condition missing its threshold never matches.
    pub fn matches(&self, value: f64) -> bool {
        match self.operator {
            Operator::Lt => self.value.is_some_and(|t| value < t),
            Operator::Lte => self.value.is_some_and(|t| value <= t),
            Operator::Gt => self.value.is_some_and(|t| value > t),
            Operator::Gte => self.value.is_some_and(|t| value >= t),
            Operator::Eq => self.value.is_some_and(|t| value == t),
            Operator::Between => match (self.min, self.max) {
                (Some(min), Some(max)) => value >= min && value <= max,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResult {
    pub level: StatusLevel,
    pub label: String,
}

impl Default for StatusResult {
    fn default() -> Self {
        Self {
            level: StatusLevel::Info,
            label: "Unknown".to_string(),
        }
    }
}

/// Evaluate `conditions` in list order and return the first match
pub fn evaluate_status(value: f64, conditions: &[StatusCondition]) -> StatusResult {
    conditions
        .iter()
        .find(|c| c.matches(value))
        .map(|c| StatusResult {
            level: c.status,
            label: c.label.clone(),
        })
        .unwrap_or_default()
}
