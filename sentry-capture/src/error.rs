use thiserror::Error;

/// A host value could not be coerced into the shape the transport requires.
#[derive(Error, Debug, PartialEq)]
pub enum ConversionError {
    #[error("map key of kind {0} cannot be used as a string key")]
    UnsupportedKey(&'static str),
    #[error("non-finite number {0} cannot be represented")]
    NonFiniteNumber(f64),
    #[error("value is nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("{0} is not a valid event id")]
    InvalidEventId(String),
    #[error("{0} is not a valid ip address")]
    InvalidIpAddress(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Enumeration of errors raised while assembling an event from an input map.
#[derive(Error, Debug, PartialEq)]
pub enum BuildError {
    #[error("expected {expected} for `{field}`, got {found}")]
    UnexpectedShape {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("failed to convert `{field}`: {source}")]
    Conversion {
        field: &'static str,
        #[source]
        source: ConversionError,
    },
}

impl BuildError {
    pub fn conversion(field: &'static str) -> impl FnOnce(ConversionError) -> BuildError {
        move |source| BuildError::Conversion { field, source }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("expected {expected} for option `{key}`")]
    InvalidOption {
        key: &'static str,
        expected: &'static str,
    },
    #[error("invalid DSN: {0}")]
    InvalidDsn(String),
}

/// Failures reported by the underlying client runtime.
#[derive(Error, Debug, PartialEq)]
pub enum TransportError {
    #[error("transport state lock was poisoned")]
    Poisoned,
    #[error("transport rejected the request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum CaptureError {
    #[error("failed to build event: {0}")]
    Build(#[from] BuildError),
    #[error("invalid client configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}
