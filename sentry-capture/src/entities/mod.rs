//! Builders for the transport objects nested inside an event.
//!
//! Each builder reads a typed set of optional fields out of a host map and
//! sets only the fields that are present on a fresh transport object, so
//! absent input never overwrites a transport default.

mod breadcrumb;
mod request;
mod user;

pub use breadcrumb::BreadcrumbFields;
pub use request::{BuiltRequest, RequestFields};
pub use user::UserFields;

use sentry::protocol::Map;

use crate::datum::Datum;
use crate::error::{BuildError, ConversionError};
use crate::normalize::key_string;

/// Entries of a map-shaped input, or a shape error naming `field`.
pub(crate) fn entries<'a>(
    datum: &'a Datum,
    field: &'static str,
) -> Result<&'a [(Datum, Datum)], BuildError> {
    datum.as_entries().ok_or(BuildError::UnexpectedShape {
        field,
        expected: "map",
        found: datum.kind(),
    })
}

pub(crate) fn text(datum: &Datum, field: &str) -> Option<String> {
    datum.get(field).map(ToString::to_string)
}

/// An optional nested bag; present values must be maps.
pub(crate) fn bag(
    datum: &Datum,
    field: &'static str,
) -> Result<Option<Vec<(Datum, Datum)>>, BuildError> {
    datum
        .get(field)
        .map(|value| entries(value, field).map(<[_]>::to_vec))
        .transpose()
}

/// Flattens a bag into string keys and stringified values.
pub(crate) fn string_map(entries: &[(Datum, Datum)]) -> Result<Map<String, String>, ConversionError> {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key_string(key)?, value.to_string());
    }
    Ok(map)
}
