use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum AttributePathParseError {
    #[snafu(display("attribute path {path:?} contains an empty segment"))]
    EmptySegment { path: String },
}

/// A dotted path to an attribute, e.g. `origin.id`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns the remaining path below `first`, if this path starts with it.
    ///
    /// `origin.id` stripped by `origin` yields `id`, stripping `origin` by `origin` yields
    /// [`None`] since nothing remains.
    pub fn strip_first(&self, first: &str) -> Option<Self> {
        match self.0.split_first() {
            Some((head, rest)) if head == first && !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }

    pub fn is_single(&self, name: &str) -> bool {
        matches!(self.0.as_slice(), [only] if only == name)
    }
}

impl FromStr for AttributePath {
    type Err = AttributePathParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments = value.split('.').map(str::to_owned).collect::<Vec<_>>();
        ensure!(
            segments.iter().all(|segment| !segment.is_empty()),
            EmptySegmentSnafu { path: value }
        );
        Ok(Self(segments))
    }
}

impl TryFrom<String> for AttributePath {
    type Error = AttributePathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttributePath> for String {
    fn from(value: AttributePath) -> Self {
        value.to_string()
    }
}

impl Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// The set of attributes which stay author-supplied lookup keys in a read-only schema.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupKeys(BTreeSet<AttributePath>);

impl LookupKeys {
    pub fn new(keys: impl IntoIterator<Item = AttributePath>) -> Self {
        Self(keys.into_iter().collect())
    }

    /// Parses dotted paths, e.g. `["id", "origin.id"]`.
    pub fn parse<'a>(
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, AttributePathParseError> {
        keys.into_iter()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map(Self)
    }

    pub fn contains_attribute(&self, name: &str) -> bool {
        self.0.iter().any(|key| key.is_single(name))
    }

    /// Narrows the keys to the ones below the attribute `name`, relative to it.
    pub fn scoped(&self, name: &str) -> Self {
        Self(self.0.iter().filter_map(|key| key.strip_first(name)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributePath> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("id")]
    #[case("origin.id")]
    #[case("origin.tls.certificate")]
    fn paths_round_trip(#[case] input: &str) {
        let path: AttributePath = input.parse().unwrap();
        assert_eq!(path.to_string(), input);
    }

    #[test]
    fn paths_navigate_objects() {
        let path: AttributePath = "origin.tls.certificate".parse().unwrap();

        assert_eq!(path.strip_first("origin"), Some("tls.certificate".parse().unwrap()));
        assert_eq!(AttributePath::root("origin").child("tls").child("certificate"), path);
    }

    #[rstest]
    #[case("")]
    #[case("origin.")]
    #[case(".id")]
    #[case("origin..id")]
    fn empty_segments_are_rejected(#[case] input: &str) {
        assert!(input.parse::<AttributePath>().is_err());
    }

    #[test]
    fn scoping_keeps_only_sub_paths() {
        let keys = LookupKeys::parse(["id", "origin.id", "origin", "target.host"]).unwrap();

        assert!(keys.contains_attribute("id"));
        assert!(keys.contains_attribute("origin"));
        assert!(!keys.contains_attribute("target"));

        let origin = keys.scoped("origin");
        assert_eq!(origin, LookupKeys::parse(["id"]).unwrap());
        assert!(keys.scoped("label").is_empty());
    }
}
