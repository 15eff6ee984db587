//! Network locators of resources, e.g. the origin a CDN pulls from.
//!
//! A locator can be authored either as a single string (`https://origin.example.com:8443/assets`)
//! or as its decomposed [`LocatorParts`]. [`LocatorParts::build`] and [`LocatorParts::parse`]
//! convert between both forms. They are exact inverses: parsing only accepts strings in the
//! canonical form `scheme://host[:port][/basePath]` which building produces.
//!
//! The [`plan`] module keeps both forms of one locator consistent inside a record.
use std::{fmt::Display, num::NonZeroU16, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};
use url::Url;

use crate::validation;

mod host;
pub mod plan;

pub use host::{DomainName, HostName, HostNameParseError};
pub use plan::{LocatorAttributes, LocatorRecord};

const SCHEME_SEPARATOR: &str = "://";

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum LocatorParseError {
    #[snafu(display("locator {input:?} does not start with a scheme followed by \"://\""))]
    MissingScheme { input: String },

    #[snafu(display("scheme {scheme:?} is not supported, use \"http\" or \"https\""))]
    UnsupportedScheme { scheme: String },

    #[snafu(display("locator must not contain user info"))]
    UserInfo,

    #[snafu(display("locator must not contain a query"))]
    Query,

    #[snafu(display("locator must not contain a fragment"))]
    Fragment,

    #[snafu(display("locator must contain a host"))]
    EmptyHost,

    #[snafu(display("failed to parse locator host"))]
    InvalidHost { source: HostNameParseError },

    #[snafu(display("port {port:?} is not a number"))]
    InvalidPort { port: String },

    #[snafu(display("port {port} is out of range, it must be between 1 and 65535"))]
    PortOutOfRange { port: u64 },

    #[snafu(display("failed to parse locator base path"))]
    InvalidBasePath { source: validation::Errors },

    #[snafu(display("locator {input:?} is not in canonical form, use {canonical:?} instead"))]
    NonCanonical { input: String, canonical: String },
}

/// The scheme of a locator.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

/// The path below the host, without leading or trailing slashes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BasePath(String);

impl FromStr for BasePath {
    type Err = validation::Errors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        validation::is_base_path(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for BasePath {
    type Error = validation::Errors;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BasePath> for String {
    fn from(value: BasePath) -> Self {
        value.0
    }
}

impl Display for BasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for BasePath {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The decomposed form of a locator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorParts {
    pub scheme: Scheme,
    pub host: HostName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<NonZeroU16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<BasePath>,
}

impl LocatorParts {
    pub fn new(scheme: Scheme, host: HostName) -> Self {
        Self {
            scheme,
            host,
            port: None,
            base_path: None,
        }
    }

    pub fn with_port(mut self, port: NonZeroU16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_base_path(mut self, base_path: BasePath) -> Self {
        self.base_path = Some(base_path);
        self
    }

    /// Builds the canonical string form `scheme://host[:port][/basePath]`.
    pub fn build(&self) -> String {
        self.to_string()
    }

    /// Parses the canonical string form.
    ///
    /// An empty path yields no base path. A trailing slash, user info, queries and fragments are
    /// rejected, as well as anything else that would not be reproduced by [`Self::build`].
    pub fn parse(input: &str) -> Result<Self, LocatorParseError> {
        let (scheme, rest) = input
            .split_once(SCHEME_SEPARATOR)
            .context(MissingSchemeSnafu { input })?;
        let scheme = scheme
            .parse::<Scheme>()
            .ok()
            .context(UnsupportedSchemeSnafu { scheme })?;

        ensure!(!rest.contains('?'), QuerySnafu);
        ensure!(!rest.contains('#'), FragmentSnafu);

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (rest, None),
        };
        ensure!(!authority.contains('@'), UserInfoSnafu);

        let (host, port) = split_authority(authority)?;
        ensure!(!host.is_empty(), EmptyHostSnafu);
        let host = HostName::from_url_host(host).context(InvalidHostSnafu)?;
        let port = port.map(parse_port).transpose()?;
        let base_path = path
            .map(str::parse::<BasePath>)
            .transpose()
            .context(InvalidBasePathSnafu)?;

        let parts = Self {
            scheme,
            host,
            port,
            base_path,
        };

        let canonical = parts.build();
        ensure!(canonical == input, NonCanonicalSnafu { input, canonical });

        Ok(parts)
    }

    /// Returns the locator as [`Url`] for use with HTTP clients.
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.build())
    }
}

impl Display for LocatorParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{scheme}{SCHEME_SEPARATOR}{host}",
            scheme = self.scheme,
            host = self.host.as_url_host()
        )?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(base_path) = &self.base_path {
            write!(f, "/{base_path}")?;
        }
        Ok(())
    }
}

impl FromStr for LocatorParts {
    type Err = LocatorParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

/// Splits `host[:port]`. A bracketed IPv6 host keeps its brackets.
fn split_authority(authority: &str) -> Result<(&str, Option<&str>), LocatorParseError> {
    if authority.starts_with('[') {
        let (host, rest) = match authority.find(']') {
            Some(end) => authority.split_at(end + 1),
            None => (authority, ""),
        };
        return match rest {
            "" => Ok((host, None)),
            rest => match rest.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => InvalidPortSnafu { port: rest }.fail(),
            },
        };
    }

    Ok(match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    })
}

fn parse_port(port: &str) -> Result<NonZeroU16, LocatorParseError> {
    ensure!(
        !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        InvalidPortSnafu { port }
    );
    let value = port
        .parse::<u64>()
        .ok()
        .context(PortOutOfRangeSnafu { port: u64::MAX })?;

    u16::try_from(value)
        .ok()
        .and_then(NonZeroU16::new)
        .context(PortOutOfRangeSnafu { port: value })
}
