use std::collections::{BTreeMap, BTreeSet};

use crate::{locator::LocatorRecord, schema::AttributePath, value::Value};

/// The value of one attribute, tagged with its kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(Value<bool>),
    String(Value<String>),
    Int(Value<i64>),
    StringSet(Value<BTreeSet<String>>),
    StringMap(Value<BTreeMap<String, String>>),
    /// Nested objects only carry their nullness, their fields are captured under their own paths.
    Object(Value<()>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Bool(value) => value.is_null(),
            Self::String(value) => value.is_null(),
            Self::Int(value) => value.is_null(),
            Self::StringSet(value) => value.is_null(),
            Self::StringMap(value) => value.is_null(),
            Self::Object(value) => value.is_null(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        match self {
            Self::Bool(value) => value.is_unknown(),
            Self::String(value) => value.is_unknown(),
            Self::Int(value) => value.is_unknown(),
            Self::StringSet(value) => value.is_unknown(),
            Self::StringMap(value) => value.is_unknown(),
            Self::Object(value) => value.is_unknown(),
        }
    }
}

impl From<Value<bool>> for AttributeValue {
    fn from(value: Value<bool>) -> Self {
        Self::Bool(value)
    }
}

impl From<Value<String>> for AttributeValue {
    fn from(value: Value<String>) -> Self {
        Self::String(value)
    }
}

impl From<Value<i64>> for AttributeValue {
    fn from(value: Value<i64>) -> Self {
        Self::Int(value)
    }
}

impl From<Value<BTreeSet<String>>> for AttributeValue {
    fn from(value: Value<BTreeSet<String>>) -> Self {
        Self::StringSet(value)
    }
}

impl From<Value<BTreeMap<String, String>>> for AttributeValue {
    fn from(value: Value<BTreeMap<String, String>>) -> Self {
        Self::StringMap(value)
    }
}

/// A flat, path-addressed copy of a record's attributes, taken for one validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSnapshot(BTreeMap<AttributePath, AttributeValue>);

impl RecordSnapshot {
    pub fn with(mut self, path: AttributePath, value: impl Into<AttributeValue>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert(&mut self, path: AttributePath, value: impl Into<AttributeValue>) {
        self.0.insert(path, value.into());
    }

    pub fn get(&self, path: &AttributePath) -> Option<&AttributeValue> {
        self.0.get(path)
    }
}

/// Records which can be validated against the rules of their resource type.
pub trait Snapshot {
    fn snapshot(&self) -> RecordSnapshot;

    /// The locator whose string form lives at `string_path`.
    fn locator(&self, _string_path: &AttributePath) -> Option<&LocatorRecord> {
        None
    }
}
