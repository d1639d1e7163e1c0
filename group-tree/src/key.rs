//! FILENAME: group-tree/src/key.rs
//! Group keys - the normalized, hashable values a tree is split on.
//!
//! Every value used to route a record into a bucket goes through `Key` first,
//! so that equality and hashing are well defined for floats and so that
//! temporal values collapse onto one canonical text form.
//!
//! Keys encode as plain JSON scalars, except:
//! - arrays and objects encode as themselves (`Composite`)
//! - NaN and infinities encode as `{"dataType": "Float", "value": "NaN"}`

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::{self, value::MapAccessDeserializer, value::SeqAccessDeserializer, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// `dataType` tag written for non-finite float keys.
pub const FLOAT_TAG: &str = "Float";

// ============================================================================
// ORDERED FLOAT
// ============================================================================

/// Wrapper around f64 that implements Eq and Hash for use as map keys.
/// NaN values are treated as equal to each other, and -0.0 hashes like 0.0.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Text used in the tagged encoding of NaN and the infinities.
    fn non_finite_name(&self) -> &'static str {
        if self.0.is_nan() {
            "NaN"
        } else if self.0 > 0.0 {
            "Infinity"
        } else {
            "-Infinity"
        }
    }
}

// ============================================================================
// COMPOSITE KEY
// ============================================================================

/// An array or object used as a key.
///
/// Compared by canonical JSON text with object fields sorted, so two objects
/// that differ only in field order share a bucket. Never equal to a `Text`
/// key, even one holding the same characters.
#[derive(Debug, Clone)]
pub struct CompositeKey {
    text: String,
    value: Value,
}

impl CompositeKey {
    pub fn new(value: Value) -> Self {
        let value = sort_fields(value);
        CompositeKey {
            text: value.to_string(),
            value,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn as_text(&self) -> &str {
        &self.text
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for CompositeKey {}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

fn sort_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_fields(v))).collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(fields.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_fields).collect()),
        other => other,
    }
}

// ============================================================================
// KEY
// ============================================================================

/// A canonical grouping key.
///
/// Integral floats are stored as `Int`, so `1` and `1.0` share a bucket.
/// Dates and timestamps are stored as their UTC ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat),
    Text(String),
    Composite(CompositeKey),
}

/// Largest magnitude at which every integral f64 is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Key {
    /// Canonicalizes a float, folding integral values into `Int`.
    pub fn from_f64(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            Key::Int(n as i64)
        } else {
            Key::Float(OrderedFloat(n))
        }
    }

    /// Canonicalizes an instant to `YYYY-MM-DDTHH:MM:SS.sssZ`.
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Key::Text(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    /// Reads a key from its JSON form, the inverse of `to_value`.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Key::Null,
            Value::Bool(b) => Key::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Key::Int(i),
                None => Key::from_f64(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Key::Text(s),
            Value::Object(map) => match tagged_non_finite(&map) {
                Some(n) => Key::Float(OrderedFloat(n)),
                None => Key::Composite(CompositeKey::new(Value::Object(map))),
            },
            array => Key::Composite(CompositeKey::new(array)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Key::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The key's JSON form, as written into output rows and encoded trees.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Null => Value::Null,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::from(*i),
            Key::Float(f) => match serde_json::Number::from_f64(f.0) {
                Some(n) => Value::Number(n),
                None => {
                    let mut tagged = Map::new();
                    tagged.insert("dataType".to_string(), Value::from(FLOAT_TAG));
                    tagged.insert("value".to_string(), Value::from(f.non_finite_name()));
                    Value::Object(tagged)
                }
            },
            Key::Text(s) => Value::String(s.clone()),
            Key::Composite(c) => c.value.clone(),
        }
    }
}

/// `{"dataType": "Float", "value": "NaN" | "Infinity" | "-Infinity"}`
fn tagged_non_finite(map: &Map<String, Value>) -> Option<f64> {
    if map.len() != 2 || map.get("dataType").and_then(Value::as_str) != Some(FLOAT_TAG) {
        return None;
    }
    match map.get("value").and_then(Value::as_str)? {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Null => write!(f, "null"),
            Key::Bool(b) => write!(f, "{}", b),
            Key::Int(i) => write!(f, "{}", i),
            Key::Float(n) => write!(f, "{}", n.0),
            Key::Text(s) => write!(f, "{:?}", s),
            Key::Composite(c) => write!(f, "{}", c.text),
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Bool(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value as i64)
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Int(value as i64)
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Key::from_f64(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Key::Null)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Key {
    fn from(value: DateTime<Tz>) -> Self {
        Key::from_datetime(&value)
    }
}

impl From<NaiveDateTime> for Key {
    fn from(value: NaiveDateTime) -> Self {
        Key::from_datetime(&value.and_utc())
    }
}

impl From<NaiveDate> for Key {
    fn from(value: NaiveDate) -> Self {
        Key::from_datetime(&value.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl From<&Value> for Key {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Key::Null,
            Value::Bool(b) => Key::Bool(*b),
            Value::String(s) => Key::Text(s.clone()),
            other => Key::from_json(other.clone()),
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::from_json(value)
    }
}

// ============================================================================
// SERDE
// ============================================================================

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Null => serializer.serialize_unit(),
            Key::Bool(b) => serializer.serialize_bool(*b),
            Key::Int(i) => serializer.serialize_i64(*i),
            Key::Float(f) if f.0.is_finite() => serializer.serialize_f64(f.0),
            Key::Float(f) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("dataType", FLOAT_TAG)?;
                map.serialize_entry("value", f.non_finite_name())?;
                map.end()
            }
            Key::Text(s) => serializer.serialize_str(s),
            Key::Composite(c) => c.value.serialize(serializer),
        }
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = Key;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a group key (null, bool, number, string, array or object)")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Key, E> {
        Ok(Key::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Key, E> {
        Ok(Key::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Key, E> {
        Ok(Key::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Key, E> {
        Ok(Key::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Key, E> {
        match i64::try_from(v) {
            Ok(i) => Ok(Key::Int(i)),
            Err(_) => Ok(Key::from_f64(v as f64)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Key, E> {
        Ok(Key::from_f64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Key, E> {
        Ok(Key::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Key, E> {
        Ok(Key::Text(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Key, A::Error> {
        let value = Value::deserialize(SeqAccessDeserializer::new(seq))?;
        Ok(Key::from_json(value))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Key, A::Error> {
        let value = Value::deserialize(MapAccessDeserializer::new(map))?;
        Ok(Key::from_json(value))
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}
