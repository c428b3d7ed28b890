use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Integer,
    Float,
}

impl ValueKind {
    /// JSON Schema type keyword
    pub fn json_type(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "number",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Integer => f.write_str("integer"),
            ValueKind::Float => f.write_str("float"),
        }
    }
}

/// Unit convention for a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// People, applications, FTE
    Count,
    Percent,
    /// Whole US dollars (published prices)
    Dollars,
    /// Values normalized to $000s
    ThousandsOfDollars,
    /// Native reporting unit of the statement, no conversion
    #[default]
    AsReported,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::Count => "count",
            Unit::Percent => "percent",
            Unit::Dollars => "USD",
            Unit::ThousandsOfDollars => "USD thousands",
            Unit::AsReported => "as reported",
        };
        f.write_str(s)
    }
}

/// A populated field value. Absence is modelled with `Option`, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Integer(_) => ValueKind::Integer,
            FieldValue::Float(_) => ValueKind::Float,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Integer(v) => v as f64,
            FieldValue::Float(v) => v,
        }
    }

    /// Convert to the declared kind. Integers widen to floats; floats only
    /// narrow to integers when they have no fractional part.
    pub fn coerce(self, kind: ValueKind) -> Option<FieldValue> {
        match (self, kind) {
            (FieldValue::Integer(_), ValueKind::Integer) => Some(self),
            (FieldValue::Float(v), ValueKind::Float) if v.is_finite() => Some(self),
            (FieldValue::Float(_), ValueKind::Float) => None,
            (FieldValue::Integer(v), ValueKind::Float) => Some(FieldValue::Float(v as f64)),
            (FieldValue::Float(v), ValueKind::Integer) => {
                if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64
                {
                    Some(FieldValue::Integer(v as i64))
                } else {
                    None
                }
            }
        }
    }

    /// Read a JSON number. Any other JSON type yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<FieldValue> {
        let serde_json::Value::Number(number) = value else {
            return None;
        };
        if let Some(v) = number.as_i64() {
            Some(FieldValue::Integer(v))
        } else {
            number.as_f64().map(FieldValue::Float)
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        match self {
            FieldValue::Integer(v) => serde_json::Value::from(v),
            FieldValue::Float(v) => serde_json::Number::from_f64(v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One line item of a generated schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: ValueKind,
    /// Always true: a field missing from the source document is null
    pub nullable: bool,
    pub unit: Unit,
    /// Extraction guidance rendered for the schema's fiscal year
    pub instruction: String,
    /// Computed by the residual calculator rather than extracted
    #[serde(default)]
    pub derived: bool,
}
