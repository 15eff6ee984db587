//! The host part of a locator.
use std::{
    borrow::Cow,
    fmt::Display,
    net::{IpAddr, Ipv6Addr},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu, ensure};

use crate::validation;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum HostNameParseError {
    #[snafu(display("host must not be empty"))]
    EmptyHost,

    #[snafu(display("{host:?} is not a bracketed IPv6 address"))]
    InvalidIpv6 { host: String },

    #[snafu(display("{host:?} is an IP address, not a domain name"))]
    IpAddressAsDomain { host: String },

    #[snafu(display("{host:?} is neither an IP address nor a valid domain name"))]
    InvalidDomainName {
        source: validation::Errors,
        host: String,
    },
}

/// A domain name conforming to RFC 1123, which is not also an IP address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DomainName {
    type Err = HostNameParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ensure!(
            value.parse::<IpAddr>().is_err(),
            IpAddressAsDomainSnafu { host: value }
        );
        validation::is_rfc_1123_subdomain(value).context(InvalidDomainNameSnafu { host: value })?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for DomainName {
    type Error = HostNameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The host of a locator, an IP address or a domain name.
///
/// Addresses are tried first, so `1.2.3.4` is always an IPv4 address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HostName {
    Ip(IpAddr),
    Domain(DomainName),
}

impl HostName {
    /// The host as written inside a locator string, with IPv6 addresses in brackets.
    pub fn as_url_host(&self) -> Cow<'_, str> {
        match self {
            Self::Ip(IpAddr::V6(ip)) => Cow::Owned(format!("[{ip}]")),
            Self::Ip(IpAddr::V4(ip)) => Cow::Owned(ip.to_string()),
            Self::Domain(domain) => Cow::Borrowed(domain.as_str()),
        }
    }

    /// Parses a host as written inside a locator string, see [`Self::as_url_host`].
    pub fn from_url_host(value: &str) -> Result<Self, HostNameParseError> {
        match value.strip_prefix('[') {
            Some(bracketed) => {
                let ip = bracketed
                    .strip_suffix(']')
                    .and_then(|ip| ip.parse::<Ipv6Addr>().ok());
                match ip {
                    Some(ip) => Ok(Self::Ip(IpAddr::V6(ip))),
                    None => InvalidIpv6Snafu { host: value }.fail(),
                }
            }
            None => value.parse(),
        }
    }
}

impl FromStr for HostName {
    type Err = HostNameParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ensure!(!value.is_empty(), EmptyHostSnafu);

        if let Ok(ip) = value.parse::<IpAddr>() {
            return Ok(Self::Ip(ip));
        }

        value.parse().map(Self::Domain)
    }
}

impl TryFrom<String> for HostName {
    type Error = HostNameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HostName> for String {
    fn from(value: HostName) -> Self {
        value.to_string()
    }
}

impl Display for HostName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ip(ip) => ip.fmt(f),
            Self::Domain(domain) => domain.fmt(f),
        }
    }
}
