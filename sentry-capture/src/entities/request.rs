use sentry::protocol::{Map, Request, Value};
use url::Url;

use super::{bag, entries, string_map, text};
use crate::datum::Datum;
use crate::error::{BuildError, ConversionError};
use crate::normalize::{key_string, normalize, normalize_entries};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFields {
    pub url: Option<String>,
    pub method: Option<String>,
    pub query_string: Option<String>,
    pub data: Option<Datum>,
    pub cookies: Option<Datum>,
    pub headers: Option<Vec<(Datum, Datum)>>,
    pub env: Option<Vec<(Datum, Datum)>>,
    pub other: Option<Vec<(Datum, Datum)>>,
}

/// The transport's request has no open bag, so `other` travels next to it
/// and is attached to the event as the `request` context.
#[derive(Debug, Clone, Default)]
pub struct BuiltRequest {
    pub request: Request,
    pub other: Option<Map<String, Value>>,
}

impl RequestFields {
    pub fn from_datum(datum: &Datum) -> Result<Self, BuildError> {
        entries(datum, "request")?;

        Ok(RequestFields {
            url: text(datum, "url"),
            method: text(datum, "method"),
            query_string: text(datum, "query-string"),
            data: datum.get("data").cloned(),
            cookies: datum.get("cookies").cloned(),
            headers: bag(datum, "headers")?,
            env: bag(datum, "env")?,
            other: bag(datum, "other")?,
        })
    }

    pub fn build(&self) -> Result<BuiltRequest, BuildError> {
        let mut request = Request::default();
        let mut other = None;

        if let Some(url) = &self.url {
            let url = Url::parse(url)
                .map_err(ConversionError::from)
                .map_err(BuildError::conversion("url"))?;
            request.url = Some(url);
        }
        if let Some(method) = &self.method {
            request.method = Some(method.clone());
        }
        if let Some(query_string) = &self.query_string {
            request.query_string = Some(query_string.clone());
        }
        if let Some(data) = &self.data {
            request.data = Some(body_text(data).map_err(BuildError::conversion("data"))?);
        }
        if let Some(cookies) = &self.cookies {
            request.cookies = Some(cookie_text(cookies).map_err(BuildError::conversion("cookies"))?);
        }
        if let Some(headers) = &self.headers {
            request.headers = string_map(headers).map_err(BuildError::conversion("headers"))?;
        }
        if let Some(env) = &self.env {
            request.env = string_map(env).map_err(BuildError::conversion("env"))?;
        }
        if let Some(bag) = &self.other {
            other = Some(normalize_entries(bag).map_err(BuildError::conversion("other"))?);
        }

        Ok(BuiltRequest { request, other })
    }
}

/// Request bodies are carried as text; structured bodies become JSON.
fn body_text(data: &Datum) -> Result<String, ConversionError> {
    match data {
        Datum::Str(s) => Ok(s.clone()),
        other => Ok(normalize(other)?.to_string()),
    }
}

fn cookie_text(cookies: &Datum) -> Result<String, ConversionError> {
    match cookies {
        Datum::Map(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                pairs.push(format!("{}={}", key_string(key)?, value));
            }
            Ok(pairs.join("; "))
        }
        other => Ok(other.to_string()),
    }
}
