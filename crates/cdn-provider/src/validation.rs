//! Validation of author-supplied configuration.
//!
//! Validation never stops at the first problem: a validation pass collects every
//! [`ConfigError`] into [`ConfigErrors`], so the author sees all of them at once. Everything in
//! here runs before any request is sent to the API.
use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

use crate::{locator::LocatorParseError, schema::AttributePath};

const RFC_1123_LABEL_FMT: &str = "[a-zA-Z0-9]([-a-zA-Z0-9]*[a-zA-Z0-9])?";

/// This is a subdomain's max length in DNS (RFC 1123)
const RFC_1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const RFC_1123_SUBDOMAIN_FMT: &str =
    concatcp!(RFC_1123_LABEL_FMT, "(\\.", RFC_1123_LABEL_FMT, ")*");
const RFC_1123_SUBDOMAIN_ERROR_MSG: &str = "a RFC 1123 subdomain must consist of alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

const BASE_PATH_MAX_LENGTH: usize = 255;
const BASE_PATH_SEGMENT_FMT: &str = "[a-zA-Z0-9._~-]+";
const BASE_PATH_FMT: &str = concatcp!(BASE_PATH_SEGMENT_FMT, "(/", BASE_PATH_SEGMENT_FMT, ")*");
const BASE_PATH_ERROR_MSG: &str = "a base path must consist of alphanumeric characters, '.', '_', '~' or '-' separated by single slashes, and must not start or end with a slash";

static RFC_1123_SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RFC_1123_SUBDOMAIN_FMT}$"))
        .expect("failed to compile RFC 1123 subdomain regex")
});

static BASE_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{BASE_PATH_FMT}$")).expect("failed to compile base path regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered while validating a single value.
#[derive(Debug, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Regex { source: RegexError },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },
}

#[derive(Debug, PartialEq, Eq)]
pub struct RegexError {
    /// The primary error message.
    msg: &'static str,

    /// The regex that the input must match.
    regex: &'static str,

    /// Examples of valid inputs (if non-empty).
    examples: &'static [&'static str],
}

impl Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            msg,
            regex,
            examples,
        } = self;
        write!(f, "{msg} (")?;
        for (i, example) in examples.iter().enumerate() {
            let prefix = match i {
                0 => "e.g.",
                _ => "or",
            };
            write!(f, "{prefix} {example:?}, ")?;
        }
        write!(f, "regex used for validation is {regex:?})")
    }
}

impl std::error::Error for RegexError {}

/// Returns [`Ok`] if `value`'s length fits within `max_length`.
fn validate_str_length(value: &str, max_length: usize) -> Result<(), Error> {
    if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
    examples: &'static [&'static str],
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(RegexError {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
            examples,
        }
        .into())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(std::result::Result::err)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a string that conforms to the definition of a subdomain in DNS (RFC 1123).
pub fn is_rfc_1123_subdomain(value: &str) -> Result {
    validate_all([
        validate_str_length(value, RFC_1123_SUBDOMAIN_MAX_LENGTH),
        validate_str_regex(
            value,
            &RFC_1123_SUBDOMAIN_REGEX,
            RFC_1123_SUBDOMAIN_ERROR_MSG,
            &["cdn.example.com"],
        ),
    ])
}

/// Tests for a locator base path, e.g. `assets` or `static/v2`.
pub fn is_base_path(value: &str) -> Result {
    validate_all([
        validate_str_length(value, BASE_PATH_MAX_LENGTH),
        validate_str_regex(
            value,
            &BASE_PATH_REGEX,
            BASE_PATH_ERROR_MSG,
            &["assets", "static/v2"],
        ),
    ])
}

/// A configuration or invariant violation found before any request is sent.
#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("exactly one of '{string_path}' or '{parts_path}' must be set, but both are"))]
    LocatorBothSet {
        string_path: AttributePath,
        parts_path: AttributePath,
    },

    #[snafu(display(
        "exactly one of '{string_path}' or '{parts_path}' must be set, but neither is"
    ))]
    LocatorNoneSet {
        string_path: AttributePath,
        parts_path: AttributePath,
    },

    #[snafu(display(
        "'{string_path}' is {url:?} but '{parts_path}' describes {built:?}"
    ))]
    LocatorMismatch {
        string_path: AttributePath,
        parts_path: AttributePath,
        url: String,
        built: String,
    },

    #[snafu(display("attribute '{path}' does not hold a valid locator"))]
    InvalidLocator {
        source: LocatorParseError,
        path: AttributePath,
    },

    #[snafu(display(
        "attribute '{controlled}' must not be set while '{switch}' is {switch_value:?}"
    ))]
    SwitchedOff {
        switch: AttributePath,
        switch_value: String,
        controlled: AttributePath,
    },

    #[snafu(display("attribute '{path}' can not be used as a switch"))]
    UnsupportedSwitchKind { path: AttributePath },

    #[snafu(display("attribute '{path}' is not part of the record"))]
    UnknownAttribute { path: AttributePath },
}

/// Every [`ConfigError`] found during one validation pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigErrors(Vec<ConfigError>);

impl ConfigErrors {
    pub fn push(&mut self, error: ConfigError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, errors: Self) {
        self.0.extend(errors.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }

    /// Returns [`Ok`] if nothing was collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ConfigError> for ConfigErrors {
    fn from(error: ConfigError) -> Self {
        Self(vec![error])
    }
}

impl Display for ConfigErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
            if let Some(source) = std::error::Error::source(error) {
                write!(f, ": {source}")?;
            }
        }
        Ok(())
    }
}
impl std::error::Error for ConfigErrors {}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("-")]
    #[case("a-")]
    #[case("-a")]
    #[case("a_b")]
    #[case("a..b")]
    #[case(".a")]
    #[case("a b")]
    #[case("a:b")]
    #[case(&"a".repeat(254))]
    fn is_rfc_1123_subdomain_fail(#[case] value: &str) {
        assert!(is_rfc_1123_subdomain(value).is_err());
    }

    #[rstest]
    #[case("a")]
    #[case("cdn")]
    #[case("cdn.example.com")]
    #[case("CDN.Example.com")]
    #[case("a--1--2--b.1")]
    #[case("1.2.3.4")]
    #[case(&"a".repeat(253))]
    fn is_rfc_1123_subdomain_pass(#[case] value: &str) {
        assert!(is_rfc_1123_subdomain(value).is_ok());
    }

    #[rstest]
    #[case("assets")]
    #[case("static/v2")]
    #[case("a.b_c~d-e")]
    #[case(&"a".repeat(255))]
    fn is_base_path_pass(#[case] value: &str) {
        assert!(is_base_path(value).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("/assets")]
    #[case("assets/")]
    #[case("static//v2")]
    #[case("assets?x=1")]
    #[case("a b")]
    #[case("caf\u{e9}")]
    #[case(&"a".repeat(256))]
    fn is_base_path_fail(#[case] value: &str) {
        assert!(is_base_path(value).is_err());
    }

    #[test]
    fn too_long_and_mismatch_are_both_reported() {
        let errors = is_base_path(&format!("/{}", "a".repeat(255))).unwrap_err();
        assert_eq!(errors.0.len(), 2);
    }

    #[test]
    fn config_errors_are_reported_together() {
        let mut errors = ConfigErrors::default();
        errors.push(ConfigError::UnknownAttribute {
            path: "a".parse().unwrap(),
        });
        errors.push(ConfigError::UnsupportedSwitchKind {
            path: "b".parse().unwrap(),
        });

        let message = errors.to_string();
        assert!(message.contains("'a'"), "{message}");
        assert!(message.contains("'b'"), "{message}");
        assert!(errors.into_result().is_err());
        assert!(ConfigErrors::default().into_result().is_ok());
    }
}
