//! Listing every record of one resource type, with full detail.
//!
//! The API only returns summaries when listing, so the detail of every item is fetched
//! concurrently afterwards. Either all items are returned or none are.
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use snafu::{ResultExt as _, Snafu, ensure};
use tracing::{debug, instrument, warn};

use crate::reader;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list summaries"))]
    List { source: reader::Error },

    #[snafu(display(
        "failed to fetch {} of {total} details: {}",
        errors.len(),
        join_errors(errors)
    ))]
    Enrich {
        errors: Vec<reader::Error>,
        total: usize,
    },
}

impl Error {
    /// Every per-item error, empty if listing the summaries failed.
    pub fn item_errors(&self) -> &[reader::Error] {
        match self {
            Self::List { .. } => &[],
            Self::Enrich { errors, .. } => errors,
        }
    }
}

fn join_errors(errors: &[reader::Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The per-resource part of listing records.
#[async_trait]
pub trait ListStrategy<C: Sync + ?Sized>: Send + Sync {
    type Summary: Send + Sync;
    type Record: Send;
    type Key: Ord;

    async fn list(&self, client: &C) -> Result<Vec<Self::Summary>, reader::Error>;

    async fn fetch_detail(
        &self,
        client: &C,
        summary: &Self::Summary,
    ) -> Result<Self::Record, reader::Error>;

    /// The stable identifier the result is sorted by.
    fn key(&self, record: &Self::Record) -> Self::Key;
}

/// Lists all records, fetching the detail of every summary concurrently.
///
/// Fails with every item error if any detail fetch fails, no partial result is returned. The
/// records are sorted by [`ListStrategy::key`], independent of the order the fetches complete.
#[instrument(skip_all)]
pub async fn list_enriched<C, S>(client: &C, strategy: &S) -> Result<Vec<S::Record>>
where
    C: Sync + ?Sized,
    S: ListStrategy<C>,
{
    let summaries = strategy.list(client).await.context(ListSnafu)?;
    let total = summaries.len();
    debug!(total, "fetching details for listed summaries");

    let records = Mutex::new(Vec::with_capacity(total));
    let errors = Mutex::new(Vec::new());

    join_all(summaries.iter().map(|summary| {
        let (records, errors) = (&records, &errors);
        async move {
            match strategy.fetch_detail(client, summary).await {
                Ok(record) => lock(records).push(record),
                Err(error) => {
                    warn!(%error, "failed to fetch detail");
                    lock(errors).push(error);
                }
            }
        }
    }))
    .await;

    let errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
    ensure!(errors.is_empty(), EnrichSnafu { errors, total });

    let mut records = records.into_inner().unwrap_or_else(PoisonError::into_inner);
    records.sort_by_key(|record| strategy.key(record));
    Ok(records)
}

// Workers never panic while holding a sink.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    /// Summaries are ids, details yield back the id after yielding `delay` times.
    struct Items {
        summaries: Vec<(u32, usize)>,
        failing: Option<u32>,
    }

    #[async_trait]
    impl ListStrategy<()> for Items {
        type Key = u32;
        type Record = u32;
        type Summary = (u32, usize);

        async fn list(&self, _client: &()) -> Result<Vec<(u32, usize)>, reader::Error> {
            Ok(self.summaries.clone())
        }

        async fn fetch_detail(
            &self,
            _client: &(),
            summary: &(u32, usize),
        ) -> Result<u32, reader::Error> {
            let &(id, delay) = summary;
            for _ in 0..delay {
                tokio::task::yield_now().await;
            }
            if self.failing == Some(id) {
                return reader::NotFoundSnafu {
                    message: format!("failed to read item {id}"),
                    status: StatusCode::NOT_FOUND,
                }
                .fail();
            }
            Ok(id)
        }

        fn key(&self, record: &u32) -> u32 {
            *record
        }
    }

    #[tokio::test]
    async fn records_are_sorted_by_key() {
        let items = Items {
            summaries: vec![(3, 0), (1, 5), (2, 2)],
            failing: None,
        };

        assert_eq!(list_enriched(&(), &items).await.unwrap(), [1, 2, 3]);
    }

    #[tokio::test]
    async fn one_failure_fails_the_whole_list() {
        let items = Items {
            summaries: vec![(1, 3), (2, 1), (3, 0)],
            failing: Some(2),
        };

        let err = list_enriched(&(), &items).await.unwrap_err();

        assert_eq!(err.item_errors().len(), 1);
        assert_eq!(
            err.to_string(),
            "failed to fetch 1 of 3 details: failed to read item 2: 404 Not Found, the resource does not exist"
        );
    }

    #[tokio::test]
    async fn empty_lists_are_fine() {
        let items = Items {
            summaries: Vec::new(),
            failing: None,
        };

        assert!(list_enriched(&(), &items).await.unwrap().is_empty());
    }
}
