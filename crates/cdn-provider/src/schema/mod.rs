//! Declarative attribute schemas for resource types.
//!
//! A resource type is described once by its writable [`Schema`]. The schema of the matching
//! read-only query is derived from it with [`convert`], so both share the same attribute tree and
//! the same typed decode path.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod convert;
mod path;

pub use convert::{ConvertError, convert};
pub use path::{AttributePath, AttributePathParseError, LookupKeys};

/// The attribute tree of one resource type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub attributes: IndexMap<String, AttributeNode>,
}

impl Schema {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, node: AttributeNode) -> Self {
        self.attributes.insert(name.into(), node);
        self
    }

    /// Looks up a (possibly nested) attribute.
    pub fn attribute(&self, path: &AttributePath) -> Option<&AttributeNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.attributes.get(first)?;
        for segment in rest {
            match &node.kind {
                AttributeKind::Object(children) => node = children.get(segment)?,
                _ => return None,
            }
        }
        Some(node)
    }
}

/// The value kind of an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    Bool,
    String,
    Int,
    StringSet,
    StringMap,
    Object(IndexMap<String, AttributeNode>),
}

/// Who supplies the value of an attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Presence {
    Required,
    #[default]
    Optional,
    Computed,
    OptionalComputed,
}

/// A check on author-supplied input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValidator {
    LengthBetween { min: usize, max: usize },
    IntBetween { min: i64, max: i64 },
    OneOf(Vec<String>),
    Regex { pattern: String, message: String },
    ExactlyOneOf(Vec<AttributePath>),
    ConflictsWith(Vec<AttributePath>),
    SizeAtLeast(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    String(String),
}

/// One field of a resource type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeNode {
    pub kind: AttributeKind,
    pub presence: Presence,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<AttributeValidator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeNode {
    pub fn new(kind: AttributeKind, presence: Presence) -> Self {
        Self {
            kind,
            presence,
            sensitive: false,
            validators: Vec::new(),
            default: None,
            description: None,
        }
    }

    pub fn required(kind: AttributeKind) -> Self {
        Self::new(kind, Presence::Required)
    }

    pub fn optional(kind: AttributeKind) -> Self {
        Self::new(kind, Presence::Optional)
    }

    pub fn computed(kind: AttributeKind) -> Self {
        Self::new(kind, Presence::Computed)
    }

    pub fn optional_computed(kind: AttributeKind) -> Self {
        Self::new(kind, Presence::OptionalComputed)
    }

    pub fn object(presence: Presence, children: IndexMap<String, Self>) -> Self {
        Self::new(AttributeKind::Object(children), presence)
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_validator(mut self, validator: AttributeValidator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
