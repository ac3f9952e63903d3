//! Conference address parsing.
//!
//! A conference is addressed as `alias@host`, where `alias` names the
//! conference (or device) and `host` is the domain used for node discovery.
//! An address is accepted only if the whole string is exactly one
//! mail-address-like token.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Unanchored mail-address pattern; matches are counted and must cover the input.
static MAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[A-Za-z0-9._%+\-]+@(?:[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}",
    )
    .expect("Invalid mail address regex")
});

/// Errors raised while parsing a conference address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The input does not split into exactly one `alias@host` pair.
    #[error("conference address must have the form alias@host: {0:?}")]
    MissingSeparator(String),

    /// The input is not a single mail-address-like token.
    #[error("invalid conference address: {0:?}")]
    Invalid(String),
}

/// A parsed `alias@host` conference address.
///
/// Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConferenceAddress {
    uri: String,
    alias: String,
    host: String,
}

impl ConferenceAddress {
    /// Parses an `alias@host` string.
    pub fn parse(uri: &str) -> Result<Self, AddressError> {
        let mut parts = uri.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(alias), Some(host), None) => Self::from_parts(alias, host),
            _ => Err(AddressError::MissingSeparator(uri.to_string())),
        }
    }

    /// Builds an address from its alias and host parts.
    pub fn from_parts(alias: &str, host: &str) -> Result<Self, AddressError> {
        let uri = format!("{alias}@{host}");
        if alias.is_empty() || host.is_empty() || !is_single_mail_token(&uri) {
            return Err(AddressError::Invalid(uri));
        }

        Ok(Self {
            alias: alias.to_string(),
            host: host.to_string(),
            uri,
        })
    }

    /// The full `alias@host` string.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The conference alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The domain used for node discovery.
    pub fn host(&self) -> &str {
        &self.host
    }
}

fn is_single_mail_token(value: &str) -> bool {
    let mut matches = MAIL_REGEX.find_iter(value);
    match (matches.next(), matches.next()) {
        (Some(m), None) => m.start() == 0 && m.end() == value.len(),
        _ => false,
    }
}

impl fmt::Display for ConferenceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for ConferenceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ConferenceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.uri)
    }
}

impl<'de> Deserialize<'de> for ConferenceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
