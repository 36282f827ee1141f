use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque row identifier. Only used when reporting on a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(id) if id.trim().is_empty() => {
                Err(serde::de::Error::custom("the id must not be empty"))
            }
            serde_json::Value::String(id) => Ok(RecordId(id)),
            serde_json::Value::Number(id) => Ok(RecordId(id.to_string())),
            _ => Err(serde::de::Error::custom("expected the id to be a string or a number")),
        }
    }
}

/// A latitude or longitude as it was found in storage.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateValue {
    Number(f64),
    Text(String),
    /// null, booleans, arrays and objects
    Other(serde_json::Value),
}

impl Default for CoordinateValue {
    fn default() -> Self {
        CoordinateValue::Other(serde_json::Value::Null)
    }
}

impl From<f64> for CoordinateValue {
    fn from(value: f64) -> Self {
        CoordinateValue::Number(value)
    }
}

impl From<&str> for CoordinateValue {
    fn from(value: &str) -> Self {
        CoordinateValue::Text(value.to_string())
    }
}

impl fmt::Display for CoordinateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateValue::Number(value) => write!(f, "{}", value),
            CoordinateValue::Text(text) => write!(f, "{}", text),
            CoordinateValue::Other(serde_json::Value::Null) => Ok(()),
            CoordinateValue::Other(value) => write!(f, "{}", value),
        }
    }
}

impl<'de> Deserialize<'de> for CoordinateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(number) => match number.as_f64() {
                Some(float) => CoordinateValue::Number(float),
                None => CoordinateValue::Other(serde_json::Value::Number(number)),
            },
            serde_json::Value::String(text) => CoordinateValue::Text(text),
            other => CoordinateValue::Other(other),
        })
    }
}

impl Serialize for CoordinateValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CoordinateValue::Number(value) => serializer.serialize_f64(*value),
            CoordinateValue::Text(text) => serializer.serialize_str(text),
            CoordinateValue::Other(value) => value.serialize(serializer),
        }
    }
}

/// One GPS point of a scan session. Fields other than the coordinates are
/// carried in `extra` and never looked at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub id: RecordId,
    #[serde(default)]
    pub latitude: CoordinateValue,
    #[serde(default)]
    pub longitude: CoordinateValue,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CoordinateRecord {
    pub fn new(
        id: impl Into<RecordId>,
        latitude: impl Into<CoordinateValue>,
        longitude: impl Into<CoordinateValue>,
    ) -> Self {
        Self {
            id: id.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Inclusive bounds in decimal degrees.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Axis::Latitude => (-90.0, 90.0),
            Axis::Longitude => (-180.0, 180.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    Unparseable,
    OutOfRange,
}

impl FailureReason {
    pub fn tag(self) -> &'static str {
        match self {
            FailureReason::Unparseable => "UNPARSEABLE",
            FailureReason::OutOfRange => "OUT_OF_RANGE",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A record that could not be normalized, kept exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub id: RecordId,
    pub reason: FailureReason,
    pub axis: Axis,
    pub detail: String,
    pub record: CoordinateRecord,
}
