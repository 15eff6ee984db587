use indexmap::IndexMap;
use snafu::{Snafu, ensure};

use super::{AttributeKind, AttributeNode, AttributePath, LookupKeys, Presence, Schema};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ConvertError {
    #[snafu(display("lookup key {key:?} does not name an attribute of the schema"))]
    UnknownLookupKey { key: AttributePath },
}

/// Derives the schema of a read-only query from the writable schema of a resource.
///
/// Attributes named by `lookup_keys` stay required and keep their validators. Every other
/// attribute becomes computed and loses its validators and default, since it can no longer be
/// supplied. Object attributes containing a lookup key stay required themselves so the key can be
/// supplied; an object that is a lookup key as a whole is kept as authored.
///
/// The set of attributes never changes and converting an already converted schema with the same
/// keys returns it unchanged.
pub fn convert(schema: &Schema, lookup_keys: &LookupKeys) -> Result<Schema, ConvertError> {
    for key in lookup_keys.iter() {
        ensure!(
            schema.attribute(key).is_some(),
            UnknownLookupKeySnafu { key: key.clone() }
        );
    }

    Ok(Schema {
        description: schema.description.clone(),
        attributes: convert_attributes(&schema.attributes, lookup_keys),
    })
}

fn convert_attributes(
    attributes: &IndexMap<String, AttributeNode>,
    lookup_keys: &LookupKeys,
) -> IndexMap<String, AttributeNode> {
    attributes
        .iter()
        .map(|(name, node)| {
            let node = if lookup_keys.contains_attribute(name) {
                as_lookup_key(node)
            } else {
                as_computed(node, &lookup_keys.scoped(name))
            };
            (name.clone(), node)
        })
        .collect()
}

fn as_lookup_key(node: &AttributeNode) -> AttributeNode {
    AttributeNode {
        presence: Presence::Required,
        ..node.clone()
    }
}

fn as_computed(node: &AttributeNode, nested_keys: &LookupKeys) -> AttributeNode {
    let (kind, presence) = match &node.kind {
        AttributeKind::Object(children) => {
            let presence = if nested_keys.is_empty() {
                Presence::Computed
            } else {
                Presence::Required
            };
            (
                AttributeKind::Object(convert_attributes(children, nested_keys)),
                presence,
            )
        }
        kind @ (AttributeKind::Bool
        | AttributeKind::String
        | AttributeKind::Int
        | AttributeKind::StringSet
        | AttributeKind::StringMap) => (kind.clone(), Presence::Computed),
    };

    AttributeNode {
        kind,
        presence,
        sensitive: node.sensitive,
        validators: Vec::new(),
        default: None,
        description: node.description.clone(),
    }
}

#[cfg(test)]
mod tests {
    use indexmap::indexmap;
    use rstest::rstest;

    use super::*;
    use crate::schema::{AttributeValidator, DefaultValue};

    fn cdn_schema() -> Schema {
        Schema::new("A CDN")
            .with_attribute("id", AttributeNode::required(AttributeKind::String))
            .with_attribute(
                "label",
                AttributeNode::required(AttributeKind::String).with_validator(
                    AttributeValidator::LengthBetween { min: 1, max: 64 },
                ),
            )
            .with_attribute(
                "secret",
                AttributeNode::optional(AttributeKind::String).sensitive(),
            )
    }

    fn nested_schema() -> Schema {
        cdn_schema()
            .with_attribute(
                "enabled",
                AttributeNode::optional(AttributeKind::Bool).with_default(DefaultValue::Bool(true)),
            )
            .with_attribute(
                "origin",
                AttributeNode::object(
                    Presence::Optional,
                    indexmap! {
                        "id".to_owned() => AttributeNode::required(AttributeKind::String)
                            .with_validator(AttributeValidator::LengthBetween { min: 1, max: 36 }),
                        "host".to_owned() => AttributeNode::required(AttributeKind::String),
                    },
                ),
            )
    }

    #[test]
    fn only_lookup_keys_stay_required() {
        let converted = convert(&cdn_schema(), &LookupKeys::parse(["id"]).unwrap()).unwrap();

        let presences = converted
            .attributes
            .iter()
            .map(|(name, node)| (name.as_str(), node.presence))
            .collect::<Vec<_>>();
        assert_eq!(
            presences,
            [
                ("id", Presence::Required),
                ("label", Presence::Computed),
                ("secret", Presence::Computed),
            ]
        );

        let label = &converted.attributes["label"];
        assert!(label.validators.is_empty());
        assert!(converted.attributes["secret"].sensitive);
    }

    #[test]
    fn lookup_keys_keep_their_validators() {
        let converted = convert(&cdn_schema(), &LookupKeys::parse(["label"]).unwrap()).unwrap();

        assert_eq!(converted.attributes["label"].validators.len(), 1);
        assert_eq!(converted.attributes["id"].presence, Presence::Computed);
    }

    #[test]
    fn nested_lookup_keys_are_scoped() {
        let converted =
            convert(&nested_schema(), &LookupKeys::parse(["origin.id"]).unwrap()).unwrap();

        let origin = &converted.attributes["origin"];
        assert_eq!(origin.presence, Presence::Required);
        let AttributeKind::Object(children) = &origin.kind else {
            panic!("origin must stay an object");
        };
        assert_eq!(children["id"].presence, Presence::Required);
        assert_eq!(children["id"].validators.len(), 1);
        assert_eq!(children["host"].presence, Presence::Computed);

        assert_eq!(converted.attributes["id"].presence, Presence::Computed);
        assert_eq!(converted.attributes["enabled"].default, None);
    }

    #[test]
    fn objects_named_as_keys_are_kept_as_authored() {
        let schema = nested_schema();
        let converted = convert(&schema, &LookupKeys::parse(["origin"]).unwrap()).unwrap();

        let origin = &converted.attributes["origin"];
        assert_eq!(origin.presence, Presence::Required);
        assert_eq!(origin.kind, schema.attributes["origin"].kind);
    }

    #[rstest]
    #[case(&["id"])]
    #[case(&["origin.id"])]
    #[case(&["id", "label", "origin"])]
    #[case(&[])]
    fn conversion_is_idempotent(#[case] keys: &[&str]) {
        let keys = LookupKeys::parse(keys.iter().copied()).unwrap();
        let schema = nested_schema();

        let once = convert(&schema, &keys).unwrap();
        let twice = convert(&once, &keys).unwrap();

        assert_eq!(once, twice);
        assert!(once.attributes.keys().eq(schema.attributes.keys()));
    }

    #[test]
    fn unknown_lookup_keys_are_rejected() {
        let err = convert(&cdn_schema(), &LookupKeys::parse(["origin.id"]).unwrap()).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnknownLookupKey {
                key: "origin.id".parse().unwrap()
            }
        );
    }
}
