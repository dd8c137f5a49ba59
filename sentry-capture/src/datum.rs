//! Loosely-typed host values.
//!
//! Callers describe events as nested maps whose keys may be keywords, strings
//! or numbers. [`Datum`] is that shape: it keeps map entries in their natural
//! order (duplicates included) so the builders can apply last-write-wins
//! semantics themselves.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(String),
    Seq(Vec<Datum>),
    Map(Vec<(Datum, Datum)>),
}

impl Datum {
    pub fn kw(name: impl Into<String>) -> Datum {
        Datum::Keyword(name.into())
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Datum
    where
        K: Into<Datum>,
        V: Into<Datum>,
    {
        Datum::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn seq<T: Into<Datum>>(items: impl IntoIterator<Item = T>) -> Datum {
        Datum::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Datum::Nil => "nil",
            Datum::Bool(_) => "bool",
            Datum::Int(_) => "integer",
            Datum::Float(_) => "float",
            Datum::Str(_) => "string",
            Datum::Keyword(_) => "keyword",
            Datum::Seq(_) => "sequence",
            Datum::Map(_) => "map",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Datum::Nil)
    }

    pub fn as_entries(&self) -> Option<&[(Datum, Datum)]> {
        match self {
            Datum::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Datum]> {
        match self {
            Datum::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Text of a string or keyword.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Str(s) | Datum::Keyword(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a field of a map by name.
    ///
    /// `name` is the keyword spelling (`server-name`). A keyword key, a string
    /// key with the same text or its snake_case spelling (`server_name`) all
    /// match. When a map holds the field more than once the last entry wins.
    /// A `Nil` value counts as absent.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        let entries = self.as_entries()?;
        entries
            .iter()
            .rev()
            .find(|(key, _)| key_matches(key, name))
            .map(|(_, value)| value)
            .filter(|value| !value.is_nil())
    }
}

fn key_matches(key: &Datum, name: &str) -> bool {
    match key {
        Datum::Keyword(k) => k == name,
        Datum::Str(s) => s == name || (name.contains('-') && *s == name.replace('-', "_")),
        _ => false,
    }
}

/// Display form used wherever a value has to become a plain string (tag
/// values, header values, fingerprints). Keywords render as their name and
/// `Nil` as the empty string.
impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Nil => Ok(()),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Float(x) => write!(f, "{:?}", x),
            Datum::Str(s) | Datum::Keyword(s) => f.write_str(s),
            Datum::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Datum::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Datum::Nil,
            Value::Bool(b) => Datum::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Datum::Int(i),
                None => Datum::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Datum::Str(s),
            Value::Array(items) => Datum::Seq(items.into_iter().map(Datum::from).collect()),
            Value::Object(map) => Datum::Map(
                map.into_iter()
                    .map(|(k, v)| (Datum::Str(k), Datum::from(v)))
                    .collect(),
            ),
        }
    }
}

/// JSON input deserializes into the same shape as hand-built maps, with
/// string keys.
impl<'de> Deserialize<'de> for Datum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Datum::from)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Str(s.to_owned())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Str(s)
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Bool(b)
    }
}

impl From<i32> for Datum {
    fn from(i: i32) -> Self {
        Datum::Int(i.into())
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Datum::Int(i)
    }
}

impl From<f64> for Datum {
    fn from(x: f64) -> Self {
        Datum::Float(x)
    }
}

impl<T: Into<Datum>> From<Vec<T>> for Datum {
    fn from(items: Vec<T>) -> Self {
        Datum::seq(items)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map_or(Datum::Nil, Into::into)
    }
}
