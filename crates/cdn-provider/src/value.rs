//! Bridging between the upstream API's optional fields and the values held in local records.
//!
//! The upstream API knows three states for an optional field: the field can be omitted from the
//! payload ([`Nullable::Absent`]), explicitly set to `null` ([`Nullable::Null`]), or carry a value
//! ([`Nullable::Present`]). Local records only distinguish [`Value::Null`] and [`Value::Known`],
//! plus [`Value::Unknown`] for values that are still pending while a change is planned.
//!
//! Inbound, both `Absent` and `Null` collapse into [`Value::Null`]. This is lossy on purpose: no
//! record field needs to tell the two apart. Outbound, [`Value::Null`] is always sent as an
//! explicit `null` and never omitted.
//!
//! Collections keep their three states intact in both directions: a null collection, an empty
//! collection and a collection with elements are all different values.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::Snafu;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("value is not known yet and can not be sent to the API"))]
    UnknownValue,
}

/// An optional field as carried in an upstream API payload.
///
/// Use it together with `#[serde(default, skip_serializing_if = "Nullable::is_absent")]` so that
/// an omitted field deserializes to [`Nullable::Absent`] and is omitted again when serialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Nullable<T> {
    #[default]
    Absent,
    Null,
    Present(T),
}

impl<T> Nullable<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Absent fields are expected to be skipped by the container, if they are not they
            // still end up as an explicit null.
            Self::Absent | Self::Null => serializer.serialize_none(),
            Self::Present(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only called when the field is part of the payload, missing fields go through Default.
        Option::<T>::deserialize(deserializer).map(|value| value.map_or(Self::Null, Self::Present))
    }
}

/// A value held in a local record.
///
/// [`Value::Unknown`] only exists while a change is planned. It can not be serialized, which
/// keeps it out of persisted state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Value<T> {
    #[default]
    Null,
    Unknown,
    Known(T),
}

impl<T> Value<T> {
    /// Converts an upstream field into a record value, collapsing `Absent` and `Null`.
    pub fn from_external(value: Nullable<T>) -> Self {
        match value {
            Nullable::Absent | Nullable::Null => Self::Null,
            Nullable::Present(value) => Self::Known(value),
        }
    }

    /// Converts a record value into an upstream field. Null values are sent as explicit nulls.
    pub fn into_external(self) -> Result<Nullable<T>, Error> {
        match self {
            Self::Null => Ok(Nullable::Null),
            Self::Unknown => UnknownValueSnafu.fail(),
            Self::Known(value) => Ok(Nullable::Present(value)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Null | Self::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Null | Self::Unknown => None,
        }
    }

    pub fn as_ref(&self) -> Value<&T> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(value) => Value::Known(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(value) => Value::Known(f(value)),
        }
    }
}

impl<T> From<Nullable<T>> for Value<T> {
    fn from(value: Nullable<T>) -> Self {
        Self::from_external(value)
    }
}

impl<T> From<Option<T>> for Value<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }
}

impl<T: Serialize> Serialize for Value<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => Err(serde::ser::Error::custom(
                "unknown values can not be persisted",
            )),
            Self::Known(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Value<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

/// Converts an upstream list into a set, keeping null and empty apart.
pub fn set_from_external(value: Nullable<Vec<String>>) -> Value<BTreeSet<String>> {
    Value::from_external(value).map(|items| items.into_iter().collect())
}

/// Converts a set into an upstream list, keeping null and empty apart.
pub fn set_into_external(value: Value<BTreeSet<String>>) -> Result<Nullable<Vec<String>>, Error> {
    value.map(|items| items.into_iter().collect()).into_external()
}

pub fn map_from_external(
    value: Nullable<BTreeMap<String, String>>,
) -> Value<BTreeMap<String, String>> {
    Value::from_external(value)
}

pub fn map_into_external(
    value: Value<BTreeMap<String, String>>,
) -> Result<Nullable<BTreeMap<String, String>>, Error> {
    value.into_external()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        #[serde(default, skip_serializing_if = "Nullable::is_absent")]
        label: Nullable<String>,

        #[serde(default, skip_serializing_if = "Nullable::is_absent")]
        countries: Nullable<Vec<String>>,
    }

    #[test]
    fn payload_fields_keep_their_three_states() {
        let payload: Payload = serde_json::from_str(indoc! {r#"
            {
              "label": null,
              "countries": ["DE", "FR"]
            }
        "#})
        .expect("payload must deserialize");
        assert_eq!(payload.label, Nullable::Null);
        assert_eq!(
            payload.countries,
            Nullable::Present(vec!["DE".to_owned(), "FR".to_owned()])
        );

        let payload: Payload = serde_json::from_str("{}").expect("payload must deserialize");
        assert_eq!(payload.label, Nullable::Absent);
        assert_eq!(payload.countries, Nullable::Absent);
        assert_eq!(serde_json::to_string(&payload).unwrap(), "{}");
    }

    #[test]
    fn outbound_null_is_explicit() {
        let payload = Payload {
            label: Value::<String>::Null.into_external().unwrap(),
            countries: set_into_external(Value::Null).unwrap(),
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"label":null,"countries":null}"#
        );
    }

    #[rstest]
    #[case(Nullable::Absent, Value::Null)]
    #[case(Nullable::Null, Value::Null)]
    #[case(Nullable::Present(42), Value::Known(42))]
    fn inbound_collapses_absent_into_null(
        #[case] external: Nullable<i64>,
        #[case] expected: Value<i64>,
    ) {
        assert_eq!(Value::from_external(external), expected);
    }

    #[rstest]
    #[case(Nullable::Absent, Nullable::Null)]
    #[case(Nullable::Null, Nullable::Null)]
    #[case(Nullable::Present("cdn".to_owned()), Nullable::Present("cdn".to_owned()))]
    fn null_and_known_survive_a_round_trip(
        #[case] external: Nullable<String>,
        #[case] expected: Nullable<String>,
    ) {
        assert_eq!(
            Value::from_external(external).into_external().unwrap(),
            expected
        );
    }

    #[test]
    fn unknown_values_are_never_sent_or_persisted() {
        assert_eq!(
            Value::<String>::Unknown.into_external(),
            Err(Error::UnknownValue)
        );
        assert!(serde_json::to_string(&Value::<String>::Unknown).is_err());
    }

    #[rstest]
    #[case(Nullable::Null, Value::Null)]
    #[case(Nullable::Present(vec![]), Value::Known(BTreeSet::new()))]
    #[case(
        Nullable::Present(vec!["US".to_owned(), "DE".to_owned()]),
        Value::Known(BTreeSet::from(["DE".to_owned(), "US".to_owned()]))
    )]
    fn sets_keep_null_apart_from_empty(
        #[case] external: Nullable<Vec<String>>,
        #[case] expected: Value<BTreeSet<String>>,
    ) {
        let internal = set_from_external(external);
        assert_eq!(internal, expected);

        let back = set_into_external(internal).unwrap();
        assert_ne!(back, Nullable::Absent);
        assert_eq!(set_from_external(back), expected);
    }

    #[test]
    fn maps_keep_null_apart_from_empty() {
        assert_eq!(map_from_external(Nullable::Null), Value::Null);
        assert_eq!(
            map_into_external(map_from_external(Nullable::Present(BTreeMap::new()))).unwrap(),
            Nullable::Present(BTreeMap::new())
        );

        let headers = BTreeMap::from([("x-cache".to_owned(), "hit".to_owned())]);
        assert_eq!(
            map_into_external(map_from_external(Nullable::Present(headers.clone()))).unwrap(),
            Nullable::Present(headers)
        );
    }
}
