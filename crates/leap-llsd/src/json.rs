//! Bridge between LLSD values and `serde_json`.
//!
//! JSON has no uuid, date, uri or binary types, so those become strings
//! (binary as base64) on the way out and do not come back as their original
//! type. Everything else maps one-to-one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::SecondsFormat;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value as Json};

use crate::value::{Map, Value};

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Undefined,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl From<&Value> for Json {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(i) => Json::Number((*i).into()),
            Value::Real(r) => Number::from_f64(*r).map_or(Json::Null, Json::Number),
            Value::String(s) | Value::Uri(s) => Json::String(s.clone()),
            Value::Uuid(u) => Json::String(u.hyphenated().to_string()),
            Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Binary(bytes) => Json::String(STANDARD.encode(bytes)),
            Value::Array(items) => Json::Array(items.iter().map(Json::from).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Json::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// Convert to JSON, see the module docs for the lossy cases.
    pub fn to_json(&self) -> Json {
        Json::from(self)
    }

    /// Build a value from anything serde can serialize.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Value::from)
    }

    /// Deserialize this value into `T` through its JSON form.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}
