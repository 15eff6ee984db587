//! Fetching a record from the API and projecting it onto local state.
//!
//! [`RecordReader`] holds the plumbing shared by every resource type: error branch dispatch,
//! the missing-record policy and carrying write-only fields over from the prior record. The
//! per-resource parts (which endpoint to call and how to map its fields) are supplied as a
//! [`ReadStrategy`].
use async_trait::async_trait;
use http::StatusCode;
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::{debug, instrument, warn};

use crate::client::{ApiResponse, TransportError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any error raised while projecting a detail onto a record, or while persisting it.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{message}: request failed"))]
    Transport {
        source: TransportError,
        message: String,
    },

    #[snafu(display("{message}: {status}, the resource does not exist"))]
    NotFound { message: String, status: StatusCode },

    #[snafu(display("{message}: {status}: {details}"))]
    Api {
        message: String,
        status: StatusCode,
        details: String,
    },

    #[snafu(display("{message}: unexpected status {status}: {body}"))]
    UnexpectedStatus {
        message: String,
        status: StatusCode,
        body: String,
    },

    #[snafu(display("{message}: {status}, the response carries no detail"))]
    MissingDetail { message: String, status: StatusCode },

    #[snafu(display("{message}: failed to project the response onto the record"))]
    Process { source: BoxedError, message: String },

    #[snafu(display("{message}: failed to persist the record"))]
    PersistRecord { source: BoxedError, message: String },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The local state of one record, owned by the host.
pub trait RecordState<M> {
    fn set(&mut self, record: M) -> Result<(), BoxedError>;
    fn remove(&mut self);
}

/// The per-resource part of reading a record.
#[async_trait]
pub trait ReadStrategy<C: Sync + ?Sized>: Send + Sync {
    type Record: Send + Sync;
    type Response: ApiResponse + Send;
    type Detail: Send;

    /// Prefixes every error, e.g. "failed to read CDN".
    fn err_message(&self) -> String;

    async fn fetch(
        &self,
        client: &C,
        record: &Self::Record,
    ) -> Result<(Self::Response, Option<Self::Detail>), TransportError>;

    /// Maps the fetched detail onto a new record.
    fn process(&self, prior: &Self::Record, detail: Self::Detail)
    -> Result<Self::Record, BoxedError>;

    /// Copies fields the API never returns (such as secrets) from the prior record.
    fn carry_over(&self, _prior: &Self::Record, _next: &mut Self::Record) {}
}

/// What happened to the local record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Stored,
    Removed,
}

/// Checks a response for every failure short of a missing detail.
///
/// Populated error branches are combined into a single error listing all of their messages.
pub fn check_response<R: ApiResponse + ?Sized>(message: &str, response: &R) -> Result<()> {
    let status = response.status();
    let branches = response.error_branches();

    if !branches.is_empty() {
        let details = branches
            .iter()
            .map(|branch| branch.describe())
            .collect::<Vec<_>>()
            .join("; ");
        return ApiSnafu {
            message,
            status,
            details,
        }
        .fail();
    }

    if response.is_not_found() {
        return NotFoundSnafu { message, status }.fail();
    }

    if !status.is_success() {
        return UnexpectedStatusSnafu {
            message,
            status,
            body: String::from_utf8_lossy(response.body()),
        }
        .fail();
    }

    Ok(())
}

/// Checks a response and returns its detail, which successful responses must carry.
pub fn expect_detail<R, D>(message: &str, response: &R, detail: Option<D>) -> Result<D>
where
    R: ApiResponse + ?Sized,
{
    check_response(message, response)?;
    detail.context(MissingDetailSnafu {
        message,
        status: response.status(),
    })
}

/// Reads records of one resource type.
#[derive(Clone, Debug)]
pub struct RecordReader<S> {
    strategy: S,
    remove_on_missing: bool,
}

impl<S> RecordReader<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            remove_on_missing: false,
        }
    }

    /// Removes the local record instead of failing when the API no longer knows it.
    ///
    /// Managed resources use this so a resource deleted out of band is planned for re-creation.
    /// Read-only queries keep the default and fail.
    pub fn remove_on_missing(mut self, remove_on_missing: bool) -> Self {
        self.remove_on_missing = remove_on_missing;
        self
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Fetches the record and stores its projection in `state`.
    ///
    /// Every failure is fatal, nothing is retried.
    #[instrument(skip_all, fields(remove_on_missing = self.remove_on_missing))]
    pub async fn read<C, St>(
        &self,
        client: &C,
        prior: &S::Record,
        state: &mut St,
    ) -> Result<ReadOutcome>
    where
        C: Sync + ?Sized,
        S: ReadStrategy<C>,
        St: RecordState<S::Record>,
    {
        let message = self.strategy.err_message();

        let (response, detail) = self
            .strategy
            .fetch(client, prior)
            .await
            .context(TransportSnafu { message: &message })?;

        if self.remove_on_missing && response.is_not_found() {
            warn!(
                status = %response.status(),
                "record no longer exists, removing it from state"
            );
            state.remove();
            return Ok(ReadOutcome::Removed);
        }

        let detail = expect_detail(&message, &response, detail)?;

        let mut record = self
            .strategy
            .process(prior, detail)
            .context(ProcessSnafu { message: &message })?;
        self.strategy.carry_over(prior, &mut record);

        state
            .set(record)
            .context(PersistRecordSnafu { message: &message })?;
        debug!("record stored");

        Ok(ReadOutcome::Stored)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::client::{ApiErrorList, Envelope, FieldErrors};

    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    struct Record {
        id: String,
        label: Option<String>,
        secret: Option<String>,
    }

    #[derive(Clone, Debug)]
    struct Detail {
        label: String,
    }

    /// Replays a canned response and counts the calls.
    struct FakeClient {
        response: Option<Envelope<Detail>>,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn responding(response: Envelope<Detail>) -> Self {
            Self {
                response: Some(response),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    struct Strategy;

    #[async_trait]
    impl ReadStrategy<FakeClient> for Strategy {
        type Detail = Detail;
        type Record = Record;
        type Response = Envelope<Detail>;

        fn err_message(&self) -> String {
            "failed to read record".to_owned()
        }

        async fn fetch(
            &self,
            client: &FakeClient,
            _record: &Record,
        ) -> Result<(Envelope<Detail>, Option<Detail>), TransportError> {
            client.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = client.response.clone().ok_or("connection refused")?;
            let detail = response.take_detail();
            Ok((response, detail))
        }

        fn process(&self, prior: &Record, detail: Detail) -> Result<Record, BoxedError> {
            Ok(Record {
                id: prior.id.clone(),
                label: Some(detail.label),
                secret: None,
            })
        }

        fn carry_over(&self, prior: &Record, next: &mut Record) {
            next.secret.clone_from(&prior.secret);
        }
    }

    #[derive(Default)]
    struct MemoryState {
        record: Option<Record>,
    }

    impl RecordState<Record> for MemoryState {
        fn set(&mut self, record: Record) -> Result<(), BoxedError> {
            self.record = Some(record);
            Ok(())
        }

        fn remove(&mut self) {
            self.record = None;
        }
    }

    fn prior() -> Record {
        Record {
            id: "cdn-1".to_owned(),
            label: Some("old".to_owned()),
            secret: Some("s3cr3t".to_owned()),
        }
    }

    fn stored_state() -> MemoryState {
        MemoryState {
            record: Some(prior()),
        }
    }

    #[tokio::test]
    async fn found_records_are_projected_and_keep_secrets() {
        let client = FakeClient::responding(Envelope::ok(Detail {
            label: "new".to_owned(),
        }));
        let mut state = stored_state();

        let outcome = RecordReader::new(Strategy)
            .read(&client, &prior(), &mut state)
            .await
            .unwrap();

        assert_eq!(outcome, ReadOutcome::Stored);
        assert_eq!(
            state.record,
            Some(Record {
                id: "cdn-1".to_owned(),
                label: Some("new".to_owned()),
                secret: Some("s3cr3t".to_owned()),
            })
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_records_are_removed_when_configured() {
        let client = FakeClient::responding(Envelope::not_found());
        let mut state = stored_state();

        let outcome = RecordReader::new(Strategy)
            .remove_on_missing(true)
            .read(&client, &prior(), &mut state)
            .await
            .unwrap();

        assert_eq!(outcome, ReadOutcome::Removed);
        assert_eq!(state.record, None);
    }

    #[tokio::test]
    async fn missing_records_fail_lookups() {
        let client = FakeClient::responding(Envelope::not_found());
        let mut state = stored_state();

        let err = RecordReader::new(Strategy)
            .read(&client, &prior(), &mut state)
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "{err}");
        assert_eq!(state.record, Some(prior()));
    }

    #[tokio::test]
    async fn transport_errors_are_fatal() {
        let mut state = stored_state();

        let err = RecordReader::new(Strategy)
            .remove_on_missing(true)
            .read(&FakeClient::failing(), &prior(), &mut state)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(state.record, Some(prior()));
    }

    #[tokio::test]
    async fn error_branches_are_combined() {
        let client = FakeClient::responding(
            Envelope::new(StatusCode::BAD_REQUEST)
                .with_validation_error(FieldErrors {
                    errors: BTreeMap::from([(
                        "label".to_owned(),
                        vec!["is too long".to_owned(), "contains spaces".to_owned()],
                    )]),
                })
                .with_error(ApiErrorList {
                    errors: vec!["request rejected".to_owned()],
                }),
        );
        let mut state = stored_state();

        let err = RecordReader::new(Strategy)
            .remove_on_missing(true)
            .read(&client, &prior(), &mut state)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to read record: 400 Bad Request: label: is too long, contains spaces; request rejected"
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.record, Some(prior()));
    }

    #[tokio::test]
    async fn unexpected_status_reports_the_body() {
        let client = FakeClient::responding(
            Envelope::new(StatusCode::BAD_GATEWAY).with_body("upstream unavailable"),
        );

        let err = RecordReader::new(Strategy)
            .read(&client, &prior(), &mut stored_state())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to read record: unexpected status 502 Bad Gateway: upstream unavailable"
        );
    }

    #[tokio::test]
    async fn responses_without_detail_fail() {
        let client = FakeClient::responding(Envelope::new(StatusCode::OK));

        let err = RecordReader::new(Strategy)
            .read(&client, &prior(), &mut stored_state())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingDetail { .. }));
    }
}
