// Frame domain model - direction, timestamp and measurement extraction
use serde_json::Value;

/// Direction of a recorded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Uplink,
    Downlink,
    Join,
    Unknown,
}

impl FrameDirection {
    fn from_wrapper_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "uplink" => Some(Self::Uplink),
            "downlink" => Some(Self::Downlink),
            "join" => Some(Self::Join),
            _ => None,
        }
    }
}

/// A frame with its direction marker stripped
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub direction: FrameDirection,
    pub body: &'a Value,
}

impl<'a> Frame<'a> {
    /// Classify a raw frame, unwrapping `{Uplink: {...}}` style markers.
    /// Flat objects are uplinks since the frame query only selects uplinks.
    pub fn classify(raw: &'a Value) -> Self {
        let Some(object) = raw.as_object() else {
            return Self {
                direction: FrameDirection::Unknown,
                body: raw,
            };
        };

        if object.len() == 1 {
            if let Some((key, inner)) = object.iter().next() {
                if let Some(direction) = FrameDirection::from_wrapper_key(key) {
                    return Self {
                        direction,
                        body: inner,
                    };
                }
            }
        }

        Self {
            direction: FrameDirection::Uplink,
            body: raw,
        }
    }

    pub fn is_uplink(&self) -> bool {
        self.direction == FrameDirection::Uplink
    }

    /// Frame timestamp in epoch milliseconds
    pub fn timestamp_ms(&self) -> Option<i64> {
        const KEYS: [&str; 4] = ["received_at", "time", "timestamp", "receivedAt"];

        KEYS.iter()
            .filter_map(|key| self.body.get(*key))
            .find_map(parse_timestamp)
    }

    /// Numeric value at `path`, looked up in the unwrapped body first and
    /// then in the raw frame so paths that include the wrapper still resolve.
    pub fn measurement(&self, raw: &Value, path: &str) -> Option<f64> {
        extract_path(self.body, path).or_else(|| {
            if std::ptr::eq(raw, self.body) {
                None
            } else {
                extract_path(raw, path)
            }
        })
    }
}

fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.timestamp_millis()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        _ => None,
    }
}

/// Walk a dot-notation path (`decoded_payload.object.TempC_SHT`) through
/// nested objects and arrays. Returns `None` unless the path resolves to a
/// finite number.
pub fn extract_path(value: &Value, path: &str) -> Option<f64> {
    if path.is_empty() {
        return None;
    }

    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    current.as_f64().filter(|v| v.is_finite())
}

/// Extract a measurement from a raw frame, wrapped or flat
pub fn extract_measurement(raw: &Value, path: &str) -> Option<f64> {
    Frame::classify(raw).measurement(raw, path)
}
