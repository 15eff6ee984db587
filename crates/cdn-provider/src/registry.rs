//! The table of resource types known to the provider.
//!
//! The registry is built once at startup and handed to whoever serves schema or validation
//! requests. Registering a resource derives the schema of its read-only query, so a broken
//! declaration is reported before any request is served.
use indexmap::IndexMap;
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};
use tracing::{debug, instrument};

use crate::{
    locator::LocatorAttributes,
    schema::{self, AttributePath, LookupKeys, Schema},
    snapshot::Snapshot,
    switchable::{self, SwitchableAttribute},
    validation::{ConfigError, ConfigErrors},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("resource type {name:?} is registered twice"))]
    DuplicateResource { name: String },

    #[snafu(display("failed to derive the read-only schema of {name:?}"))]
    DeriveReadOnlySchema {
        source: schema::ConvertError,
        name: String,
    },

    #[snafu(display("resource type {name:?} declares unknown attribute '{path}'"))]
    UndeclaredAttribute { name: String, path: AttributePath },

    #[snafu(display("resource type {name:?} is not registered"))]
    UnknownResource { name: String },

    #[snafu(display("invalid {name:?} configuration: {source}"))]
    InvalidConfiguration { source: ConfigErrors, name: String },
}

/// How a record is used, which decides the checks it must pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// A managed resource, authored and owned by local state.
    Managed,

    /// A read-only query, where everything but the lookup keys is computed.
    Query,
}

/// The static declaration of one resource type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDefinition {
    pub name: String,
    pub schema: Schema,
    pub lookup_keys: LookupKeys,
    pub switchable: Vec<SwitchableAttribute>,
    pub locators: Vec<LocatorAttributes>,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            lookup_keys: LookupKeys::default(),
            switchable: Vec::new(),
            locators: Vec::new(),
        }
    }

    pub fn with_lookup_keys(mut self, lookup_keys: LookupKeys) -> Self {
        self.lookup_keys = lookup_keys;
        self
    }

    pub fn with_switchable(mut self, attribute: SwitchableAttribute) -> Self {
        self.switchable.push(attribute);
        self
    }

    pub fn with_locator(mut self, locator: LocatorAttributes) -> Self {
        self.locators.push(locator);
        self
    }

    fn declared_paths(&self) -> impl Iterator<Item = &AttributePath> {
        self.switchable
            .iter()
            .flat_map(|attribute| [&attribute.switch, &attribute.controlled])
            .chain(
                self.locators
                    .iter()
                    .flat_map(|locator| [&locator.string_path, &locator.parts_path]),
            )
    }
}

/// A registered resource type and its derived read-only schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredResource {
    pub definition: ResourceDefinition,
    pub read_only_schema: Schema,
}

impl RegisteredResource {
    /// Checks a record against every rule of the resource type, reporting all violations.
    pub fn validate(&self, mode: Mode, record: &impl Snapshot) -> Result<(), ConfigErrors> {
        let mut errors = ConfigErrors::default();

        for attributes in &self.definition.locators {
            let Some(locator) = record.locator(&attributes.string_path) else {
                errors.push(ConfigError::UnknownAttribute {
                    path: attributes.string_path.clone(),
                });
                continue;
            };

            let result = match mode {
                Mode::Managed => attributes.validate(locator),
                Mode::Query => LocatorAttributes::computed(
                    attributes.string_path.clone(),
                    attributes.parts_path.clone(),
                )
                .validate(locator),
            };
            if let Err(locator_errors) = result {
                errors.extend(locator_errors);
            }
        }

        let snapshot = record.snapshot();
        if let Err(switch_errors) = switchable::validate(&self.definition.switchable, &snapshot) {
            errors.extend(switch_errors);
        }

        errors.into_result()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    resources: IndexMap<String, RegisteredResource>,
}

impl RegistryBuilder {
    pub fn register(mut self, definition: ResourceDefinition) -> Result<Self> {
        let name = definition.name.clone();
        ensure!(
            !self.resources.contains_key(&name),
            DuplicateResourceSnafu { name }
        );

        if let Some(path) = definition
            .declared_paths()
            .find(|path| definition.schema.attribute(path).is_none())
        {
            return UndeclaredAttributeSnafu {
                name,
                path: path.clone(),
            }
            .fail();
        }

        let read_only_schema = schema::convert(&definition.schema, &definition.lookup_keys)
            .context(DeriveReadOnlySchemaSnafu { name: &name })?;
        debug!(resource = %name, "registered resource type");

        self.resources.insert(
            name,
            RegisteredResource {
                definition,
                read_only_schema,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry {
            resources: self.resources,
        }
    }
}

/// Every resource type, in registration order.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    resources: IndexMap<String, RegisteredResource>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn resources(&self) -> impl Iterator<Item = &RegisteredResource> {
        self.resources.values()
    }

    pub fn resource(&self, name: &str) -> Result<&RegisteredResource> {
        self.resources
            .get(name)
            .context(UnknownResourceSnafu { name })
    }

    pub fn writable_schema(&self, name: &str) -> Result<&Schema> {
        Ok(&self.resource(name)?.definition.schema)
    }

    pub fn read_only_schema(&self, name: &str) -> Result<&Schema> {
        Ok(&self.resource(name)?.read_only_schema)
    }

    /// Validates a record of the resource type `name` before any request is sent.
    #[instrument(skip(self, record))]
    pub fn validate(&self, name: &str, mode: Mode, record: &impl Snapshot) -> Result<()> {
        self.resource(name)?
            .validate(mode, record)
            .context(InvalidConfigurationSnafu { name })
    }
}
