use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::{StrataError, StrataResult, Timestamp};

pub const DEFAULT_MAX_STRING_LEN: usize = 255;
pub const DEFAULT_MAX_ARRAY_BYTES: usize = 65_535;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::String,
        ValueKind::Number,
        ValueKind::Boolean,
        ValueKind::Date,
        ValueKind::Array,
    ];

    pub const SERIES_PRIORITY: [ValueKind; 5] = [
        ValueKind::String,
        ValueKind::Number,
        ValueKind::Array,
        ValueKind::Date,
        ValueKind::Boolean,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Array => "array",
        }
    }

    pub fn from_tag(tag: &str) -> StrataResult<Self> {
        match tag {
            "string" => Ok(ValueKind::String),
            "number" => Ok(ValueKind::Number),
            "boolean" => Ok(ValueKind::Boolean),
            "date" => Ok(ValueKind::Date),
            "array" => Ok(ValueKind::Array),
            other => Err(StrataError::unknown_type(format!(
                "no partition for type tag '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Instant(Timestamp),
    List(Vec<JsonValue>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    pub fn from_json(json: JsonValue) -> StrataResult<Self> {
        match json {
            JsonValue::Null => Err(StrataError::unsupported("null has no storable shape")),
            JsonValue::Bool(value) => Ok(Value::Boolean(value)),
            JsonValue::Number(number) => number
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| StrataError::unsupported(format!("number {number} is not finite"))),
            JsonValue::String(value) => Ok(Value::Text(value)),
            JsonValue::Array(items) => Ok(Value::List(items)),
            JsonValue::Object(map) => {
                let mut entries = BTreeMap::new();
                for (key, value) in map {
                    entries.insert(key, Value::from_json(value)?);
                }
                Ok(Value::Object(entries))
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Number(value) => serde_json::Number::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(value) => JsonValue::String(value.clone()),
            Value::Boolean(value) => JsonValue::Bool(*value),
            Value::Instant(value) => JsonValue::from(value.as_millis()),
            Value::List(items) => JsonValue::Array(items.clone()),
            Value::Object(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Instant(value)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = JsonValue::deserialize(deserializer)?;
        Value::from_json(json).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    Real(f64),
    Text(String),
    Flag(i16),
    Millis(i64),
}

#[derive(Clone, Copy, Debug)]
pub struct ValueCodec {
    max_string_len: usize,
    max_array_bytes: usize,
}

impl Default for ValueCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STRING_LEN, DEFAULT_MAX_ARRAY_BYTES)
    }
}

impl ValueCodec {
    pub fn new(max_string_len: usize, max_array_bytes: usize) -> Self {
        Self {
            max_string_len,
            max_array_bytes,
        }
    }

    pub fn max_string_len(&self) -> usize {
        self.max_string_len
    }

    pub fn encode(&self, value: &Value) -> StrataResult<(ValueKind, StoredValue)> {
        match value {
            Value::Number(number) => {
                if !number.is_finite() {
                    return Err(StrataError::unsupported(format!(
                        "number {number} is not finite"
                    )));
                }
                Ok((ValueKind::Number, StoredValue::Real(*number)))
            }
            Value::Text(text) => {
                let len = text.chars().count();
                if len > self.max_string_len {
                    return Err(StrataError::too_large(format!(
                        "string of {len} characters exceeds {}",
                        self.max_string_len
                    )));
                }
                Ok((ValueKind::String, StoredValue::Text(text.clone())))
            }
            Value::Boolean(flag) => Ok((ValueKind::Boolean, StoredValue::Flag(i16::from(*flag)))),
            Value::Instant(instant) => {
                instant.validate()?;
                Ok((ValueKind::Date, StoredValue::Millis(instant.as_millis())))
            }
            Value::List(items) => {
                let encoded = serde_json::to_string(items)
                    .map_err(|err| StrataError::unsupported(err.to_string()))?;
                if encoded.len() > self.max_array_bytes {
                    return Err(StrataError::too_large(format!(
                        "array of {} serialized bytes exceeds {}",
                        encoded.len(),
                        self.max_array_bytes
                    )));
                }
                Ok((ValueKind::Array, StoredValue::Text(encoded)))
            }
            Value::Object(_) => Err(StrataError::unsupported(
                "objects are flattened, not stored as a single value",
            )),
        }
    }

    pub fn decode(kind: ValueKind, stored: StoredValue) -> StrataResult<Value> {
        match (kind, stored) {
            (ValueKind::Number, StoredValue::Real(number)) => Ok(Value::Number(number)),
            (ValueKind::String, StoredValue::Text(text)) => Ok(Value::Text(text)),
            (ValueKind::Boolean, StoredValue::Flag(flag)) => Ok(Value::Boolean(flag != 0)),
            (ValueKind::Date, StoredValue::Millis(millis)) => Ok(Value::Instant(Timestamp(millis))),
            (ValueKind::Array, StoredValue::Text(raw)) => {
                let items: Vec<JsonValue> = serde_json::from_str(&raw)
                    .map_err(|err| StrataError::backend(format!("corrupt array value: {err}")))?;
                Ok(Value::List(items))
            }
            (kind, stored) => Err(StrataError::backend(format!(
                "unexpected {stored:?} in {kind} partition"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{StoredValue, Value, ValueCodec, ValueKind};
    use crate::{StrataError, Timestamp};

    fn roundtrip(value: Value) {
        let codec = ValueCodec::default();
        let (kind, stored) = codec.encode(&value).expect("encode");
        let decoded = ValueCodec::decode(kind, stored).expect("decode");
        assert_eq!(decoded, value);
    }

    #[test]
    fn primitives_roundtrip_through_codec() {
        roundtrip(Value::Number(-12.5));
        roundtrip(Value::Text("hello".to_string()));
        roundtrip(Value::Boolean(true));
        roundtrip(Value::Boolean(false));
        roundtrip(Value::Instant(Timestamp(1_700_000_000_000)));
        roundtrip(Value::List(vec![json!(1), json!("two"), json!({"three": 3})]));
    }

    #[test]
    fn booleans_store_as_flags() {
        let codec = ValueCodec::default();
        let (_, stored) = codec.encode(&Value::Boolean(true)).expect("encode");
        assert_eq!(stored, StoredValue::Flag(1));
        let decoded = ValueCodec::decode(ValueKind::Boolean, StoredValue::Flag(7)).expect("decode");
        assert_eq!(decoded, Value::Boolean(true));
    }

    #[test]
    fn rejects_oversized_values() {
        let codec = ValueCodec::new(4, 8);
        let err = codec.encode(&Value::from("hello")).expect_err("too long");
        assert!(matches!(err, StrataError::ValueTooLarge { .. }));
        let err = codec
            .encode(&Value::List(vec![json!("abcdefgh")]))
            .expect_err("too big");
        assert!(matches!(err, StrataError::ValueTooLarge { .. }));
    }

    #[test]
    fn rejects_non_finite_numbers_and_objects() {
        let codec = ValueCodec::default();
        let err = codec.encode(&Value::Number(f64::INFINITY)).expect_err("inf");
        assert!(matches!(err, StrataError::UnsupportedType { .. }));
        let err = codec.encode(&Value::Number(f64::NAN)).expect_err("nan");
        assert!(matches!(err, StrataError::UnsupportedType { .. }));
        let err = codec
            .encode(&Value::object([("a", Value::from(1.0))]))
            .expect_err("object");
        assert!(matches!(err, StrataError::UnsupportedType { .. }));
    }

    #[test]
    fn type_tags_route_to_kinds() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::from_tag(kind.suffix()).expect("tag"), kind);
        }
        let err = ValueKind::from_tag("blob").expect_err("unknown");
        assert!(matches!(err, StrataError::UnknownType { .. }));
    }

    #[test]
    fn json_conversion_rejects_null() {
        let value = Value::from_json(json!({"a": 1, "b": {"c": [true]}})).expect("json");
        assert_eq!(value.to_json(), json!({"a": 1.0, "b": {"c": [true]}}));
        let err = Value::from_json(json!({"a": null})).expect_err("null");
        assert!(matches!(err, StrataError::UnsupportedType { .. }));
    }
}
