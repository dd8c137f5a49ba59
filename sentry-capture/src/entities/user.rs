use std::net::IpAddr;

use sentry::protocol::{IpAddress, User};

use super::{bag, entries, text};
use crate::datum::Datum;
use crate::error::{BuildError, ConversionError};
use crate::normalize::normalize_entries;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFields {
    pub email: Option<String>,
    pub id: Option<String>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub other: Option<Vec<(Datum, Datum)>>,
}

impl UserFields {
    pub fn from_datum(datum: &Datum) -> Result<Self, BuildError> {
        entries(datum, "user")?;

        Ok(UserFields {
            email: text(datum, "email"),
            id: text(datum, "id"),
            username: text(datum, "username"),
            ip_address: text(datum, "ip-address"),
            other: bag(datum, "other")?,
        })
    }

    pub fn build(&self) -> Result<User, BuildError> {
        let mut user = User::default();

        if let Some(email) = &self.email {
            user.email = Some(email.clone());
        }
        if let Some(id) = &self.id {
            user.id = Some(id.clone());
        }
        if let Some(username) = &self.username {
            user.username = Some(username.clone());
        }
        if let Some(ip) = &self.ip_address {
            user.ip_address =
                Some(parse_ip_address(ip).map_err(BuildError::conversion("ip-address"))?);
        }
        if let Some(other) = &self.other {
            user.other = normalize_entries(other).map_err(BuildError::conversion("other"))?;
        }

        Ok(user)
    }
}

/// `{{auto}}` asks the ingestion service to use the sender's address.
fn parse_ip_address(ip: &str) -> Result<IpAddress, ConversionError> {
    if ip == "{{auto}}" {
        return Ok(IpAddress::Auto);
    }
    ip.parse::<IpAddr>()
        .map(IpAddress::Exact)
        .map_err(|_| ConversionError::InvalidIpAddress(ip.to_owned()))
}
