//! Keeps the string and the decomposed form of a locator consistent.
//!
//! An author-editable locator is supplied through exactly one of its two attributes. While a
//! change is planned, the other side is derived from the supplied one, so both hold consistent
//! values by the time the record is persisted.
use serde::{Deserialize, Serialize};
use snafu::ResultExt as _;

use crate::{
    locator::{LocatorParseError, LocatorParts},
    schema::AttributePath,
    validation::{
        ConfigError, ConfigErrors, InvalidLocatorSnafu, LocatorBothSetSnafu, LocatorMismatchSnafu,
        LocatorNoneSetSnafu,
    },
    value::{Nullable, Value},
};

/// Both forms of one locator, as held in a record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorRecord {
    pub url: Value<String>,
    pub parts: Value<LocatorParts>,
}

impl LocatorRecord {
    /// A locator configured through its string form.
    pub fn from_url(url: Value<String>) -> Self {
        Self {
            url,
            parts: Value::Null,
        }
    }

    /// A locator configured through its decomposed form.
    pub fn from_parts(parts: Value<LocatorParts>) -> Self {
        Self {
            url: Value::Null,
            parts,
        }
    }

    /// Fills both forms from the canonical string returned by the API.
    pub fn from_external(url: Nullable<String>) -> Result<Self, LocatorParseError> {
        match Value::from_external(url) {
            Value::Known(url) => {
                let parts = LocatorParts::parse(&url)?;
                Ok(Self {
                    url: Value::Known(url),
                    parts: Value::Known(parts),
                })
            }
            _ => Ok(Self {
                url: Value::Null,
                parts: Value::Null,
            }),
        }
    }

    /// Returns [`true`] if both forms are known and describe the same locator.
    pub fn is_reconciled(&self) -> bool {
        match (&self.url, &self.parts) {
            (Value::Known(url), Value::Known(parts)) => parts.build() == *url,
            _ => false,
        }
    }
}

/// Where the two forms of a locator live in a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatorAttributes {
    pub string_path: AttributePath,
    pub parts_path: AttributePath,

    /// Wholly computed locators are never supplied by the author.
    pub computed: bool,
}

impl LocatorAttributes {
    pub fn new(string_path: AttributePath, parts_path: AttributePath) -> Self {
        Self {
            string_path,
            parts_path,
            computed: false,
        }
    }

    pub fn computed(string_path: AttributePath, parts_path: AttributePath) -> Self {
        Self {
            string_path,
            parts_path,
            computed: true,
        }
    }

    /// Checks the configured locator, collecting every problem.
    ///
    /// Exactly one of both forms must be supplied, unless the locator is computed. Values which
    /// are not known yet count as supplied.
    pub fn validate(&self, locator: &LocatorRecord) -> Result<(), ConfigErrors> {
        let mut errors = ConfigErrors::default();

        if !self.computed {
            match (locator.url.is_null(), locator.parts.is_null()) {
                (false, false) => errors.push(
                    LocatorBothSetSnafu {
                        string_path: self.string_path.clone(),
                        parts_path: self.parts_path.clone(),
                    }
                    .build(),
                ),
                (true, true) => errors.push(
                    LocatorNoneSetSnafu {
                        string_path: self.string_path.clone(),
                        parts_path: self.parts_path.clone(),
                    }
                    .build(),
                ),
                _ => {}
            }
        }

        if let Value::Known(url) = &locator.url
            && let Err(error) = self.parse(url)
        {
            errors.push(error);
        }

        errors.into_result()
    }

    /// Derives whichever form is pending from the known one.
    ///
    /// | url     | parts   | result                               |
    /// |---------|---------|--------------------------------------|
    /// | known   | pending | parts parsed from the url            |
    /// | pending | known   | url built from the parts             |
    /// | known   | known   | unchanged, both must be consistent   |
    /// | pending | pending | unchanged, resolved after apply      |
    ///
    /// Null counts as pending as long as the other form is known.
    pub fn plan(&self, locator: LocatorRecord) -> Result<LocatorRecord, ConfigError> {
        match (locator.url, locator.parts) {
            (Value::Known(url), Value::Known(parts)) => {
                let built = parts.build();
                if built == url {
                    Ok(LocatorRecord {
                        url: Value::Known(url),
                        parts: Value::Known(parts),
                    })
                } else {
                    LocatorMismatchSnafu {
                        string_path: self.string_path.clone(),
                        parts_path: self.parts_path.clone(),
                        url,
                        built,
                    }
                    .fail()
                }
            }
            (Value::Known(url), _) => {
                let parts = self.parse(&url)?;
                Ok(LocatorRecord {
                    url: Value::Known(url),
                    parts: Value::Known(parts),
                })
            }
            (_, Value::Known(parts)) => Ok(LocatorRecord {
                url: Value::Known(parts.build()),
                parts: Value::Known(parts),
            }),
            (url, parts) => Ok(LocatorRecord { url, parts }),
        }
    }

    fn parse(&self, url: &str) -> Result<LocatorParts, ConfigError> {
        LocatorParts::parse(url).context(InvalidLocatorSnafu {
            path: self.string_path.clone(),
        })
    }
}
