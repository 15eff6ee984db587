//! The CDN resource, served both as a managed resource and as a read-only query by `id`.
//!
//! The origin of a CDN is a locator, authored either as `origin_url` or as the decomposed
//! `origin` object. Geo restriction and secure tokens are switch/controlled pairs. The secure
//! token is write-only: the API never returns it, so reads carry it over from the prior record.
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use indexmap::indexmap;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::{debug, info, instrument};

use crate::{
    client::{Envelope, TransportError},
    list::{self, ListStrategy},
    locator::{LocatorAttributes, LocatorParseError, LocatorRecord},
    reader::{self, BoxedError, ReadOutcome, ReadStrategy, RecordReader, RecordState},
    registry::ResourceDefinition,
    schema::{
        AttributeKind, AttributeNode, AttributePath, AttributeValidator, DefaultValue,
        LookupKeys, Presence, Schema,
    },
    snapshot::{AttributeValue, RecordSnapshot, Snapshot},
    switchable::SwitchableAttribute,
    validation::ConfigError,
    value::{self, Nullable, Value},
};

pub const RESOURCE_NAME: &str = "cdn";

const ID: &str = "id";
const LABEL: &str = "label";
const ORIGIN_URL: &str = "origin_url";
const ORIGIN: &str = "origin";
const GEO_RESTRICTION_TYPE: &str = "geo_restriction_type";
const GEO_RESTRICTION_COUNTRIES: &str = "geo_restriction_countries";
const SECURE_TOKEN_TYPE: &str = "secure_token_type";
const SECURE_TOKEN: &str = "secure_token";
const CUSTOM_HEADERS: &str = "custom_headers";
const ENABLED: &str = "enabled";

const LABEL_MAX_LENGTH: usize = 64;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("the CDN record has no known id"))]
    MissingId,

    #[snafu(display("failed to build the CDN payload"))]
    BuildPayload { source: value::Error },

    #[snafu(display("failed to plan the CDN origin"))]
    PlanOrigin { source: ConfigError },

    #[snafu(transparent)]
    Request { source: reader::Error },

    #[snafu(transparent)]
    List { source: list::Error },
}

/// The upstream endpoints of the CDN resource.
#[async_trait]
pub trait CdnApi: Send + Sync {
    async fn get_cdn(&self, id: &str) -> Result<Envelope<CdnDetail>, TransportError>;

    async fn list_cdns(&self) -> Result<Envelope<Vec<CdnSummary>>, TransportError>;

    async fn create_cdn(&self, payload: &CdnUpdate)
    -> Result<Envelope<CdnDetail>, TransportError>;

    async fn update_cdn(
        &self,
        id: &str,
        payload: &CdnUpdate,
    ) -> Result<Envelope<CdnDetail>, TransportError>;

    async fn delete_cdn(&self, id: &str) -> Result<Envelope<()>, TransportError>;
}

/// A CDN as returned by the API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CdnDetail {
    pub id: String,

    #[serde(default)]
    pub label: Nullable<String>,

    #[serde(default)]
    pub origin_url: Nullable<String>,

    #[serde(default)]
    pub geo_restriction_type: Nullable<String>,

    #[serde(default)]
    pub geo_restriction_countries: Nullable<Vec<String>>,

    #[serde(default)]
    pub secure_token_type: Nullable<String>,

    #[serde(default)]
    pub custom_headers: Nullable<BTreeMap<String, String>>,

    #[serde(default)]
    pub enabled: Nullable<bool>,
}

/// A CDN as listed by the API.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CdnSummary {
    pub id: String,

    #[serde(default)]
    pub label: Nullable<String>,
}

/// The payload of create and update requests.
///
/// Every field is sent, unset fields as an explicit `null`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CdnUpdate {
    pub label: Nullable<String>,
    pub origin_url: Nullable<String>,
    pub geo_restriction_type: Nullable<String>,
    pub geo_restriction_countries: Nullable<Vec<String>>,
    pub secure_token_type: Nullable<String>,
    pub secure_token: Nullable<String>,
    pub custom_headers: Nullable<BTreeMap<String, String>>,
    pub enabled: Nullable<bool>,
}

impl CdnUpdate {
    pub fn from_record(record: &CdnRecord) -> Result<Self, value::Error> {
        let record = record.clone();
        Ok(Self {
            label: record.label.into_external()?,
            origin_url: record.origin.url.into_external()?,
            geo_restriction_type: record.geo_restriction_type.into_external()?,
            geo_restriction_countries: value::set_into_external(
                record.geo_restriction_countries,
            )?,
            secure_token_type: record.secure_token_type.into_external()?,
            secure_token: record.secure_token.into_external()?,
            custom_headers: value::map_into_external(record.custom_headers)?,
            enabled: record.enabled.into_external()?,
        })
    }
}

/// A CDN as held in local state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnRecord {
    pub id: Value<String>,
    pub label: Value<String>,
    pub origin: LocatorRecord,
    pub geo_restriction_type: Value<String>,
    pub geo_restriction_countries: Value<BTreeSet<String>>,
    pub secure_token_type: Value<String>,
    pub secure_token: Value<String>,
    pub custom_headers: Value<BTreeMap<String, String>>,
    pub enabled: Value<bool>,
}

impl CdnRecord {
    /// Projects an API detail onto a record. The secure token is never returned and stays null.
    pub fn from_detail(detail: CdnDetail) -> Result<Self, LocatorParseError> {
        Ok(Self {
            id: Value::Known(detail.id),
            label: Value::from_external(detail.label),
            origin: LocatorRecord::from_external(detail.origin_url)?,
            geo_restriction_type: Value::from_external(detail.geo_restriction_type),
            geo_restriction_countries: value::set_from_external(detail.geo_restriction_countries),
            secure_token_type: Value::from_external(detail.secure_token_type),
            secure_token: Value::Null,
            custom_headers: value::map_from_external(detail.custom_headers),
            enabled: Value::from_external(detail.enabled),
        })
    }

    /// Copies the write-only secure token from the record it replaces.
    pub fn carry_over_secrets(&mut self, prior: &Self) {
        self.secure_token.clone_from(&prior.secure_token);
    }

    /// Derives whichever form of the origin is pending from the known one.
    pub fn plan(mut self) -> Result<Self, ConfigError> {
        self.origin = origin_locator().plan(self.origin)?;
        Ok(self)
    }
}

impl Snapshot for CdnRecord {
    fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot::default()
            .with(AttributePath::root(ID), self.id.clone())
            .with(AttributePath::root(LABEL), self.label.clone())
            .with(AttributePath::root(ORIGIN_URL), self.origin.url.clone())
            .with(
                AttributePath::root(ORIGIN),
                AttributeValue::Object(self.origin.parts.as_ref().map(|_| ())),
            )
            .with(
                AttributePath::root(GEO_RESTRICTION_TYPE),
                self.geo_restriction_type.clone(),
            )
            .with(
                AttributePath::root(GEO_RESTRICTION_COUNTRIES),
                self.geo_restriction_countries.clone(),
            )
            .with(
                AttributePath::root(SECURE_TOKEN_TYPE),
                self.secure_token_type.clone(),
            )
            .with(AttributePath::root(SECURE_TOKEN), self.secure_token.clone())
            .with(AttributePath::root(CUSTOM_HEADERS), self.custom_headers.clone())
            .with(AttributePath::root(ENABLED), self.enabled.clone())
    }

    fn locator(&self, string_path: &AttributePath) -> Option<&LocatorRecord> {
        string_path.is_single(ORIGIN_URL).then_some(&self.origin)
    }
}

fn origin_locator() -> LocatorAttributes {
    LocatorAttributes::new(AttributePath::root(ORIGIN_URL), AttributePath::root(ORIGIN))
}

/// The writable schema of the CDN resource.
pub fn schema() -> Schema {
    let origin_choice = AttributeValidator::ExactlyOneOf(vec![
        AttributePath::root(ORIGIN_URL),
        AttributePath::root(ORIGIN),
    ]);

    Schema::new("A content delivery network in front of a single origin.")
        .with_attribute(
            ID,
            AttributeNode::computed(AttributeKind::String)
                .with_description("Identifier assigned by the API."),
        )
        .with_attribute(
            LABEL,
            AttributeNode::required(AttributeKind::String).with_validator(
                AttributeValidator::LengthBetween {
                    min: 1,
                    max: LABEL_MAX_LENGTH,
                },
            ),
        )
        .with_attribute(
            ORIGIN_URL,
            AttributeNode::optional_computed(AttributeKind::String)
                .with_validator(origin_choice.clone())
                .with_description("The origin as `scheme://host[:port][/basePath]`."),
        )
        .with_attribute(
            ORIGIN,
            AttributeNode::object(
                Presence::OptionalComputed,
                indexmap! {
                    "scheme".to_owned() => AttributeNode::required(AttributeKind::String)
                        .with_validator(AttributeValidator::OneOf(vec![
                            "http".to_owned(),
                            "https".to_owned(),
                        ])),
                    "host".to_owned() => AttributeNode::required(AttributeKind::String),
                    "port".to_owned() => AttributeNode::optional(AttributeKind::Int)
                        .with_validator(AttributeValidator::IntBetween { min: 1, max: 65535 }),
                    "base_path".to_owned() => AttributeNode::optional(AttributeKind::String)
                        .with_validator(AttributeValidator::LengthBetween { min: 1, max: 255 }),
                },
            )
            .with_validator(origin_choice),
        )
        .with_attribute(
            GEO_RESTRICTION_TYPE,
            AttributeNode::optional_computed(AttributeKind::String)
                .with_validator(AttributeValidator::OneOf(vec![
                    "none".to_owned(),
                    "allowlist".to_owned(),
                    "blocklist".to_owned(),
                ]))
                .with_default(DefaultValue::String("none".to_owned())),
        )
        .with_attribute(
            GEO_RESTRICTION_COUNTRIES,
            AttributeNode::optional(AttributeKind::StringSet)
                .with_validator(AttributeValidator::SizeAtLeast(1)),
        )
        .with_attribute(
            SECURE_TOKEN_TYPE,
            AttributeNode::optional_computed(AttributeKind::String)
                .with_validator(AttributeValidator::OneOf(vec![
                    "none".to_owned(),
                    "token".to_owned(),
                ]))
                .with_default(DefaultValue::String("none".to_owned())),
        )
        .with_attribute(
            SECURE_TOKEN,
            AttributeNode::optional(AttributeKind::String)
                .sensitive()
                .with_description("Write-only, never returned by the API."),
        )
        .with_attribute(
            CUSTOM_HEADERS,
            AttributeNode::optional(AttributeKind::StringMap),
        )
        .with_attribute(
            ENABLED,
            AttributeNode::optional_computed(AttributeKind::Bool)
                .with_default(DefaultValue::Bool(true)),
        )
}

/// The declaration of the CDN resource type.
pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(RESOURCE_NAME, schema())
        .with_lookup_keys(LookupKeys::new([AttributePath::root(ID)]))
        .with_switchable(SwitchableAttribute::new(
            AttributePath::root(GEO_RESTRICTION_TYPE),
            ["none"],
            AttributePath::root(GEO_RESTRICTION_COUNTRIES),
        ))
        .with_switchable(SwitchableAttribute::new(
            AttributePath::root(SECURE_TOKEN_TYPE),
            ["none"],
            AttributePath::root(SECURE_TOKEN),
        ))
        .with_locator(origin_locator())
}

/// Reads a single CDN by the id of the prior record.
#[derive(Clone, Copy, Debug, Default)]
pub struct CdnReader;

#[async_trait]
impl<A: CdnApi + ?Sized> ReadStrategy<A> for CdnReader {
    type Detail = CdnDetail;
    type Record = CdnRecord;
    type Response = Envelope<CdnDetail>;

    fn err_message(&self) -> String {
        "failed to read CDN".to_owned()
    }

    async fn fetch(
        &self,
        api: &A,
        record: &CdnRecord,
    ) -> Result<(Envelope<CdnDetail>, Option<CdnDetail>), TransportError> {
        let id = record.id.as_known().ok_or("the CDN record has no known id")?;
        let mut response = api.get_cdn(id).await?;
        let detail = response.take_detail();
        Ok((response, detail))
    }

    fn process(&self, _prior: &CdnRecord, detail: CdnDetail) -> Result<CdnRecord, BoxedError> {
        Ok(CdnRecord::from_detail(detail)?)
    }

    fn carry_over(&self, prior: &CdnRecord, next: &mut CdnRecord) {
        next.carry_over_secrets(prior);
    }
}

/// Lists every CDN with its full detail.
#[derive(Clone, Copy, Debug, Default)]
pub struct CdnList;

#[async_trait]
impl<A: CdnApi + ?Sized> ListStrategy<A> for CdnList {
    type Key = String;
    type Record = CdnRecord;
    type Summary = CdnSummary;

    async fn list(&self, api: &A) -> Result<Vec<CdnSummary>, reader::Error> {
        let message = "failed to list CDNs";
        let mut response = api
            .list_cdns()
            .await
            .context(reader::TransportSnafu { message })?;
        let detail = response.take_detail();
        reader::expect_detail(message, &response, detail)
    }

    async fn fetch_detail(
        &self,
        api: &A,
        summary: &CdnSummary,
    ) -> Result<CdnRecord, reader::Error> {
        let message = format!("failed to read CDN {:?}", summary.id);
        let mut response = api
            .get_cdn(&summary.id)
            .await
            .context(reader::TransportSnafu { message: &message })?;
        let detail = response.take_detail();
        let detail = reader::expect_detail(&message, &response, detail)?;
        CdnRecord::from_detail(detail)
            .map_err(BoxedError::from)
            .context(reader::ProcessSnafu { message })
    }

    fn key(&self, record: &CdnRecord) -> String {
        record.id.as_known().cloned().unwrap_or_default()
    }
}

/// The CRUD entry points of the CDN resource against one API client.
pub struct Cdns<'a, A: ?Sized> {
    api: &'a A,
    remove_on_missing: bool,
}

impl<'a, A: CdnApi + ?Sized> Cdns<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            remove_on_missing: true,
        }
    }

    /// Whether [`Self::read`] drops CDNs deleted out of band from state, instead of failing.
    ///
    /// Defaults to [`true`]. Lookups always fail for missing CDNs.
    pub fn remove_on_missing(mut self, remove_on_missing: bool) -> Self {
        self.remove_on_missing = remove_on_missing;
        self
    }

    /// Creates the planned CDN and stores the API's view of it, keeping the planned secret.
    #[instrument(skip_all)]
    pub async fn create<S>(&self, planned: CdnRecord, state: &mut S) -> Result<()>
    where
        S: RecordState<CdnRecord>,
    {
        let planned = planned.plan().context(PlanOriginSnafu)?;
        let payload = CdnUpdate::from_record(&planned).context(BuildPayloadSnafu)?;

        let message = "failed to create CDN";
        let mut response = self
            .api
            .create_cdn(&payload)
            .await
            .context(reader::TransportSnafu { message })?;
        let detail = response.take_detail();
        let detail = reader::expect_detail(message, &response, detail)?;

        let record = Self::project(message, &planned, detail)?;
        info!(id = ?record.id.as_known(), "created CDN");
        Self::store(message, record, state)
    }

    /// Refreshes a managed CDN, see [`Self::remove_on_missing`] for CDNs deleted out of band.
    pub async fn read<S>(&self, prior: &CdnRecord, state: &mut S) -> Result<ReadOutcome>
    where
        S: RecordState<CdnRecord>,
    {
        prior.id.as_known().context(MissingIdSnafu)?;

        Ok(RecordReader::new(CdnReader)
            .remove_on_missing(self.remove_on_missing)
            .read(self.api, prior, state)
            .await?)
    }

    /// Fetches a CDN by id for a read-only query, failing if it does not exist.
    pub async fn lookup<S>(&self, id: &str, state: &mut S) -> Result<()>
    where
        S: RecordState<CdnRecord>,
    {
        let key = CdnRecord {
            id: Value::Known(id.to_owned()),
            ..CdnRecord::default()
        };
        RecordReader::new(CdnReader)
            .read(self.api, &key, state)
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn update<S>(&self, planned: CdnRecord, state: &mut S) -> Result<()>
    where
        S: RecordState<CdnRecord>,
    {
        let planned = planned.plan().context(PlanOriginSnafu)?;
        let id = planned.id.as_known().context(MissingIdSnafu)?;
        let payload = CdnUpdate::from_record(&planned).context(BuildPayloadSnafu)?;

        let message = "failed to update CDN";
        let mut response = self
            .api
            .update_cdn(id, &payload)
            .await
            .context(reader::TransportSnafu { message })?;
        let detail = response.take_detail();
        let detail = reader::expect_detail(message, &response, detail)?;

        let record = Self::project(message, &planned, detail)?;
        Self::store(message, record, state)
    }

    /// Deletes the CDN. A CDN which is already gone is only removed from state.
    #[instrument(skip_all)]
    pub async fn delete<S>(&self, record: &CdnRecord, state: &mut S) -> Result<()>
    where
        S: RecordState<CdnRecord>,
    {
        let id = record.id.as_known().context(MissingIdSnafu)?;

        let message = "failed to delete CDN";
        let response = self
            .api
            .delete_cdn(id)
            .await
            .context(reader::TransportSnafu { message })?;

        match reader::check_response(message, &response) {
            Err(error) if error.is_not_found() => {
                debug!(%id, "CDN was already deleted");
            }
            result => result?,
        }

        state.remove();
        Ok(())
    }

    /// Lists every CDN, sorted by id.
    pub async fn list(&self) -> Result<Vec<CdnRecord>> {
        Ok(list::list_enriched(self.api, &CdnList).await?)
    }

    fn project(message: &str, planned: &CdnRecord, detail: CdnDetail) -> Result<CdnRecord> {
        let mut record = CdnRecord::from_detail(detail)
            .map_err(BoxedError::from)
            .context(reader::ProcessSnafu { message })?;
        record.carry_over_secrets(planned);
        Ok(record)
    }

    fn store<S>(message: &str, record: CdnRecord, state: &mut S) -> Result<()>
    where
        S: RecordState<CdnRecord>,
    {
        state
            .set(record)
            .context(reader::PersistRecordSnafu { message })?;
        Ok(())
    }
}
