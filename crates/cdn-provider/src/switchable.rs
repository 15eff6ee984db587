//! Switch attributes which decide whether a companion attribute may be set.
//!
//! Each resource type declares its pairs as [`SwitchableAttribute`]s, e.g. "while
//! `geo_restriction_type` is `none`, `geo_restriction_countries` must be null". The same
//! declarations are checked on the write path and on the read-only query path.
use std::collections::BTreeSet;

use tracing::trace;

use crate::{
    schema::AttributePath,
    snapshot::{AttributeValue, RecordSnapshot},
    validation::{ConfigError, ConfigErrors},
    value::Value,
};

/// A statically declared switch/controlled attribute pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchableAttribute {
    pub switch: AttributePath,
    pub disabling_values: BTreeSet<String>,
    pub controlled: AttributePath,
}

impl SwitchableAttribute {
    pub fn new<'a>(
        switch: AttributePath,
        disabling_values: impl IntoIterator<Item = &'a str>,
        controlled: AttributePath,
    ) -> Self {
        Self {
            switch,
            disabling_values: disabling_values.into_iter().map(str::to_owned).collect(),
            controlled,
        }
    }

    /// Captures the current state of the pair from a record snapshot.
    ///
    /// Returns [`None`] while the switch or the controlled attribute are not known yet, the pair
    /// is checked again once they are.
    pub fn rule(
        &self,
        snapshot: &RecordSnapshot,
    ) -> Result<Option<SwitchableAttributeRule>, ConfigError> {
        let switch = lookup(snapshot, &self.switch)?;
        let controlled = lookup(snapshot, &self.controlled)?;

        if switch.is_unknown() || controlled.is_unknown() {
            return Ok(None);
        }

        Ok(Some(SwitchableAttributeRule {
            switch_attr: self.switch.clone(),
            switch_value: switch_value(&self.switch, switch)?,
            disabling_values: self.disabling_values.clone(),
            controlled_attr: self.controlled.clone(),
            controlled_is_null: controlled.is_null(),
        }))
    }
}

/// One [`SwitchableAttribute`] evaluated against a record. Built fresh for each validation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchableAttributeRule {
    pub switch_attr: AttributePath,
    /// [`None`] if the switch is null.
    pub switch_value: Option<String>,
    pub disabling_values: BTreeSet<String>,
    pub controlled_attr: AttributePath,
    pub controlled_is_null: bool,
}

impl SwitchableAttributeRule {
    pub fn check(&self) -> Result<(), ConfigError> {
        match &self.switch_value {
            Some(value) if self.disabling_values.contains(value) && !self.controlled_is_null => {
                Err(ConfigError::SwitchedOff {
                    switch: self.switch_attr.clone(),
                    switch_value: value.clone(),
                    controlled: self.controlled_attr.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Checks every pair against the snapshot and reports all violations together.
pub fn validate(
    attributes: &[SwitchableAttribute],
    snapshot: &RecordSnapshot,
) -> Result<(), ConfigErrors> {
    let mut errors = ConfigErrors::default();

    for attribute in attributes {
        match attribute.rule(snapshot) {
            Ok(Some(rule)) => {
                if let Err(error) = rule.check() {
                    errors.push(error);
                }
            }
            Ok(None) => trace!(
                switch = %attribute.switch,
                controlled = %attribute.controlled,
                "skipping switch check for values which are not known yet"
            ),
            Err(error) => errors.push(error),
        }
    }

    errors.into_result()
}

fn lookup<'a>(
    snapshot: &'a RecordSnapshot,
    path: &AttributePath,
) -> Result<&'a AttributeValue, ConfigError> {
    snapshot
        .get(path)
        .ok_or_else(|| ConfigError::UnknownAttribute { path: path.clone() })
}

fn switch_value(path: &AttributePath, value: &AttributeValue) -> Result<Option<String>, ConfigError> {
    Ok(match value {
        AttributeValue::Bool(value) => render(value, ToString::to_string),
        AttributeValue::String(value) => render(value, Clone::clone),
        AttributeValue::Int(value) => render(value, ToString::to_string),
        AttributeValue::StringSet(_) | AttributeValue::StringMap(_) | AttributeValue::Object(_) => {
            return Err(ConfigError::UnsupportedSwitchKind { path: path.clone() });
        }
    })
}

fn render<T>(value: &Value<T>, f: impl FnOnce(&T) -> String) -> Option<String> {
    value.as_known().map(f)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn path(path: &str) -> AttributePath {
        path.parse().unwrap()
    }

    fn geo_restriction() -> SwitchableAttribute {
        SwitchableAttribute::new(
            path("geo_restriction_type"),
            ["none", "disabled"],
            path("geo_restriction_countries"),
        )
    }

    fn snapshot(switch: Value<String>, countries: Value<BTreeSet<String>>) -> RecordSnapshot {
        RecordSnapshot::default()
            .with(path("geo_restriction_type"), switch)
            .with(path("geo_restriction_countries"), countries)
    }

    fn countries() -> Value<BTreeSet<String>> {
        Value::Known(BTreeSet::from(["DE".to_owned()]))
    }

    #[test]
    fn disabled_switch_with_controlled_value_fails_once() {
        let errors = validate(
            &[geo_restriction()],
            &snapshot(Value::Known("none".to_owned()), countries()),
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        let message = errors.to_string();
        assert!(message.contains("'geo_restriction_countries'"), "{message}");
        assert!(message.contains("'geo_restriction_type'"), "{message}");
        assert!(message.contains("\"none\""), "{message}");
    }

    #[rstest]
    // Disabled, but nothing controlled is set
    #[case(Value::Known("disabled".to_owned()), Value::Null)]
    // Enabled
    #[case(Value::Known("allowlist".to_owned()), countries())]
    // A null switch never disables
    #[case(Value::Null, countries())]
    // Pending values are checked later
    #[case(Value::Unknown, countries())]
    #[case(Value::Known("none".to_owned()), Value::Unknown)]
    fn other_combinations_pass(
        #[case] switch: Value<String>,
        #[case] countries: Value<BTreeSet<String>>,
    ) {
        validate(&[geo_restriction()], &snapshot(switch, countries)).unwrap();
    }

    #[test]
    fn empty_controlled_sets_are_not_null() {
        validate(
            &[geo_restriction()],
            &snapshot(Value::Known("none".to_owned()), Value::Known(BTreeSet::new())),
        )
        .unwrap_err();
    }

    #[test]
    fn bool_and_int_switches_are_rendered() {
        let snapshot = RecordSnapshot::default()
            .with(path("tls_enabled"), Value::Known(false))
            .with(path("tls_certificate"), Value::Known("cert".to_owned()))
            .with(path("cache_ttl"), Value::Known(0_i64))
            .with(path("cache_key"), Value::Known("key".to_owned()));

        let errors = validate(
            &[
                SwitchableAttribute::new(path("tls_enabled"), ["false"], path("tls_certificate")),
                SwitchableAttribute::new(path("cache_ttl"), ["0"], path("cache_key")),
            ],
            &snapshot,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn every_problem_is_collected() {
        let snapshot = RecordSnapshot::default()
            .with(path("secure_token_type"), Value::Known("none".to_owned()))
            .with(path("secure_token"), Value::Known("s3cr3t".to_owned()))
            .with(path("headers"), Value::<BTreeSet<String>>::Null);

        let errors = validate(
            &[
                SwitchableAttribute::new(path("secure_token_type"), ["none"], path("secure_token")),
                SwitchableAttribute::new(path("headers"), ["none"], path("secure_token")),
                SwitchableAttribute::new(path("missing"), ["none"], path("secure_token")),
            ],
            &snapshot,
        )
        .unwrap_err();

        let kinds = errors
            .iter()
            .map(|error| match error {
                ConfigError::SwitchedOff { .. } => "switched off",
                ConfigError::UnsupportedSwitchKind { .. } => "unsupported",
                ConfigError::UnknownAttribute { .. } => "unknown",
                _ => "other",
            })
            .collect::<Vec<_>>();
        assert_eq!(kinds, ["switched off", "unsupported", "unknown"]);
    }
}
