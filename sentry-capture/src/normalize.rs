//! Deep conversion of host maps into the transport's data representation.
//!
//! The transport only accepts string-keyed `serde_json` values inside its
//! `data`, `other` and `extra` bags, so every nested map is rebuilt with
//! coerced keys before it is assigned.

use sentry::protocol::{Map, Value};
use serde_json::Number;

use crate::datum::Datum;
use crate::error::ConversionError;

/// Deepest nesting accepted before giving up on a value.
pub const MAX_DEPTH: usize = 128;

pub fn normalize(datum: &Datum) -> Result<Value, ConversionError> {
    normalize_at(datum, 0)
}

/// Normalizes the entries of a map into a top-level transport bag. Later
/// entries overwrite earlier ones once their keys have been coerced.
pub fn normalize_entries(entries: &[(Datum, Datum)]) -> Result<Map<String, Value>, ConversionError> {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key_string(key)?, normalize_at(value, 1)?);
    }
    Ok(map)
}

/// Coerces a map key to its string form. Keywords lose their sigil, scalars
/// use their display form; nil and composite keys are rejected.
pub fn key_string(key: &Datum) -> Result<String, ConversionError> {
    match key {
        Datum::Str(s) | Datum::Keyword(s) => Ok(s.clone()),
        Datum::Int(i) => Ok(i.to_string()),
        Datum::Bool(b) => Ok(b.to_string()),
        Datum::Float(_) => Ok(key.to_string()),
        other => Err(ConversionError::UnsupportedKey(other.kind())),
    }
}

fn normalize_at(datum: &Datum, depth: usize) -> Result<Value, ConversionError> {
    if depth > MAX_DEPTH {
        return Err(ConversionError::TooDeep(MAX_DEPTH));
    }

    Ok(match datum {
        Datum::Nil => Value::Null,
        Datum::Bool(b) => Value::Bool(*b),
        Datum::Int(i) => Value::Number((*i).into()),
        Datum::Float(x) => Number::from_f64(*x)
            .map(Value::Number)
            .ok_or(ConversionError::NonFiniteNumber(*x))?,
        Datum::Str(s) | Datum::Keyword(s) => Value::String(s.clone()),
        Datum::Seq(items) => Value::Array(
            items
                .iter()
                .map(|item| normalize_at(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Datum::Map(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(key_string(key)?, normalize_at(value, depth + 1)?);
            }
            Value::Object(object)
        }
    })
}
