use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A store-native attribute value.
///
/// Numbers are carried as the store's decimal strings so no precision is
/// lost in transit; sets keep their distinct-members contract at the store,
/// not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Number(String),
    Binary(Vec<u8>),
    Bool(bool),
    Null,
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<Vec<u8>>),
}

/// An ordered attribute-name map; the record shape batched to the store.
pub type Item = BTreeMap<String, AttributeValue>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttrError {
    #[error("unknown attribute type tag {tag:?}")]
    UnknownTag { tag: String },
    #[error("attribute payload for tag {tag} has the wrong shape")]
    BadPayload { tag: &'static str },
}

impl AttributeValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "S",
            AttributeValue::Number(_) => "N",
            AttributeValue::Binary(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null => "NULL",
            AttributeValue::List(_) => "L",
            AttributeValue::Map(_) => "M",
            AttributeValue::StringSet(_) => "SS",
            AttributeValue::NumberSet(_) => "NS",
            AttributeValue::BinarySet(_) => "BS",
        }
    }
}

type DecodeFn = fn(Value) -> Result<AttributeValue, AttrError>;

/// Flat decoder set keyed by type tag; dispatch is a table lookup, one
/// decode function per variant.
const DECODERS: &[(&str, DecodeFn)] = &[
    ("S", decode_string),
    ("N", decode_number),
    ("B", decode_binary),
    ("BOOL", decode_bool),
    ("NULL", decode_null),
    ("L", decode_list),
    ("M", decode_map),
    ("SS", decode_string_set),
    ("NS", decode_number_set),
    ("BS", decode_binary_set),
];

/// Decode a `(tag, payload)` pair into an attribute value.
pub fn decode(tag: &str, payload: Value) -> Result<AttributeValue, AttrError> {
    let decoder = DECODERS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, f)| f)
        .ok_or_else(|| AttrError::UnknownTag {
            tag: tag.to_string(),
        })?;
    decoder(payload)
}

/// Encode an attribute value into its `(tag, payload)` pair.
pub fn encode(value: &AttributeValue) -> (&'static str, Value) {
    let payload = match value {
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Number(n) => Value::String(n.clone()),
        AttributeValue::Binary(b) => bytes_to_value(b),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null => Value::Bool(true),
        AttributeValue::List(values) => {
            Value::Array(values.iter().map(encode_tagged).collect())
        }
        AttributeValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_tagged(v)))
                .collect(),
        ),
        AttributeValue::StringSet(members) => Value::Array(
            members.iter().cloned().map(Value::String).collect(),
        ),
        AttributeValue::NumberSet(members) => Value::Array(
            members.iter().cloned().map(Value::String).collect(),
        ),
        AttributeValue::BinarySet(members) => {
            Value::Array(members.iter().map(|b| bytes_to_value(b)).collect())
        }
    };
    (value.type_tag(), payload)
}

/// Encode as the single-entry `{tag: payload}` object used inside lists
/// and maps.
pub fn encode_tagged(value: &AttributeValue) -> Value {
    let (tag, payload) = encode(value);
    let mut object = serde_json::Map::with_capacity(1);
    object.insert(tag.to_string(), payload);
    Value::Object(object)
}

/// Decode a single-entry `{tag: payload}` object.
pub fn decode_tagged(value: Value) -> Result<AttributeValue, AttrError> {
    let Value::Object(object) = value else {
        return Err(AttrError::BadPayload { tag: "L" });
    };
    let mut entries = object.into_iter();
    match (entries.next(), entries.next()) {
        (Some((tag, payload)), None) => decode(&tag, payload),
        _ => Err(AttrError::BadPayload { tag: "L" }),
    }
}

fn bytes_to_value(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

fn value_to_bytes(value: Value, tag: &'static str) -> Result<Vec<u8>, AttrError> {
    let Value::Array(entries) = value else {
        return Err(AttrError::BadPayload { tag });
    };
    entries
        .into_iter()
        .map(|entry| {
            entry
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or(AttrError::BadPayload { tag })
        })
        .collect()
}

fn decode_string(payload: Value) -> Result<AttributeValue, AttrError> {
    match payload {
        Value::String(s) => Ok(AttributeValue::String(s)),
        _ => Err(AttrError::BadPayload { tag: "S" }),
    }
}

fn decode_number(payload: Value) -> Result<AttributeValue, AttrError> {
    match payload {
        Value::String(s) => Ok(AttributeValue::Number(s)),
        _ => Err(AttrError::BadPayload { tag: "N" }),
    }
}

fn decode_binary(payload: Value) -> Result<AttributeValue, AttrError> {
    value_to_bytes(payload, "B").map(AttributeValue::Binary)
}

fn decode_bool(payload: Value) -> Result<AttributeValue, AttrError> {
    match payload {
        Value::Bool(b) => Ok(AttributeValue::Bool(b)),
        _ => Err(AttrError::BadPayload { tag: "BOOL" }),
    }
}

fn decode_null(payload: Value) -> Result<AttributeValue, AttrError> {
    match payload {
        Value::Bool(_) => Ok(AttributeValue::Null),
        _ => Err(AttrError::BadPayload { tag: "NULL" }),
    }
}

fn decode_list(payload: Value) -> Result<AttributeValue, AttrError> {
    let Value::Array(entries) = payload else {
        return Err(AttrError::BadPayload { tag: "L" });
    };
    entries
        .into_iter()
        .map(decode_tagged)
        .collect::<Result<Vec<_>, _>>()
        .map(AttributeValue::List)
}

fn decode_map(payload: Value) -> Result<AttributeValue, AttrError> {
    let Value::Object(entries) = payload else {
        return Err(AttrError::BadPayload { tag: "M" });
    };
    entries
        .into_iter()
        .map(|(k, v)| decode_tagged(v).map(|value| (k, value)))
        .collect::<Result<BTreeMap<_, _>, _>>()
        .map(AttributeValue::Map)
}

fn decode_string_members(payload: Value, tag: &'static str) -> Result<Vec<String>, AttrError> {
    let Value::Array(entries) = payload else {
        return Err(AttrError::BadPayload { tag });
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(s) => Ok(s),
            _ => Err(AttrError::BadPayload { tag }),
        })
        .collect()
}

fn decode_string_set(payload: Value) -> Result<AttributeValue, AttrError> {
    decode_string_members(payload, "SS").map(AttributeValue::StringSet)
}

fn decode_number_set(payload: Value) -> Result<AttributeValue, AttrError> {
    decode_string_members(payload, "NS").map(AttributeValue::NumberSet)
}

fn decode_binary_set(payload: Value) -> Result<AttributeValue, AttrError> {
    let Value::Array(entries) = payload else {
        return Err(AttrError::BadPayload { tag: "BS" });
    };
    entries
        .into_iter()
        .map(|entry| value_to_bytes(entry, "BS"))
        .collect::<Result<Vec<_>, _>>()
        .map(AttributeValue::BinarySet)
}
