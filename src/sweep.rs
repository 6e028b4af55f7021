// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Paginated listing traversal:
//! a single-page fetcher and a bounded-parallel sweeper
//! that drives it until a short page signals end-of-stream.

use crate::client::ApiClient;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

/// The upstream silently caps `page_size` at 10,
/// regardless of what is requested.
pub const PAGE_SIZE: usize = 10;

/// Safety valve, not a documented limit;
/// real listing sizes are expected to stay well below it.
const MAX_BATCHES: usize = 10_000;

/// One paginated listing endpoint plus its filters.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub path: String,
    pub institution_id: Option<i64>,
    pub published_since: Option<String>,
    pub published_until: Option<String>,
    pub impersonate: Option<i64>,
}

impl ListingQuery {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            ..Self::default()
        }
    }

    /// The request parameters for fetching `page` of this listing.
    ///
    /// When both published-date bounds are set,
    /// the request additionally pins the upstream's sort order,
    /// for a stable traversal.
    #[must_use]
    pub fn params(&self, page: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", page.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
        ];
        if let Some(institution_id) = self.institution_id {
            params.push(("institution", institution_id.to_string()));
        }
        if let Some(since) = &self.published_since {
            params.push(("published_since", since.clone()));
        }
        if let Some(until) = &self.published_until {
            params.push(("published_until", until.clone()));
        }
        if self.published_since.is_some() && self.published_until.is_some() {
            params.push(("order", "published_date".to_owned()));
            params.push(("order_direction", "desc".to_owned()));
        }
        if let Some(account_id) = self.impersonate {
            params.push(("impersonate", account_id.to_string()));
        }
        params
    }
}

/// Anything that can serve one page of a paginated listing.
///
/// A failed page is reported as an empty one (after logging),
/// which ends the sweep for that listing;
/// re-issuing the page would require de-duplication downstream.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_one_page(&self, query: &ListingQuery, page: usize) -> Vec<Value>;
}

#[async_trait]
impl PageSource for ApiClient {
    async fn get_one_page(&self, query: &ListingQuery, page: usize) -> Vec<Value> {
        self.get_records(&query.path, &query.params(page)).await
    }
}

/// Sweeps a paginated listing with a fixed fan-out width.
///
/// Pages are fetched in concurrent batches of `width`;
/// the accumulator preserves page order within a batch,
/// and batches follow each other in page order.
#[derive(Debug)]
pub struct Sweeper<S> {
    source: S,
    width: usize,
}

impl<S: PageSource> Sweeper<S> {
    pub fn new(source: S, width: usize) -> Self {
        Self {
            source,
            width: width.max(1),
        }
    }

    /// Fetches every record of `query`, in page order.
    ///
    /// Any page shorter than [`PAGE_SIZE`] marks the end of the
    /// stream; the full batch it belongs to is still drained.
    pub async fn get_all(&self, query: &ListingQuery) -> Vec<Value> {
        let mut records = Vec::new();
        let mut first_page = 1;
        for _ in 0..MAX_BATCHES {
            let batch = join_all(
                (first_page..first_page + self.width)
                    .map(|page| self.source.get_one_page(query, page)),
            )
            .await;
            let mut exhausted = false;
            for page_records in batch {
                exhausted |= page_records.len() < PAGE_SIZE;
                records.extend(page_records);
            }
            if exhausted {
                return records;
            }
            first_page += self.width;
        }
        tracing::warn!(
            "Sweep of '{}' hit the safety cap of {MAX_BATCHES} batches; \
the listing is either absurdly large or the upstream keeps repeating itself",
            query.path
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` records spread over ceil(total / 10) pages,
    /// counting how many page requests it sees.
    struct FakeSource {
        total: usize,
        requests: AtomicUsize,
    }

    impl FakeSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn get_one_page(&self, _query: &ListingQuery, page: usize) -> Vec<Value> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let first = (page - 1) * PAGE_SIZE;
            (first..self.total.min(first + PAGE_SIZE))
                .map(|record| json!({ "id": record }))
                .collect()
        }
    }

    fn ids(records: &[Value]) -> Vec<i64> {
        records
            .iter()
            .map(|record| record["id"].as_i64().expect("missing id"))
            .collect()
    }

    #[tokio::test]
    async fn sweep_is_complete() {
        for total in [0, 1, 9, 10, 11, 27, 40, 95] {
            let sweeper = Sweeper::new(FakeSource::new(total), 4);
            let records = sweeper.get_all(&ListingQuery::new("account/articles")).await;
            assert_eq!(records.len(), total, "lost records for total = {total}");
        }
    }

    #[tokio::test]
    async fn records_arrive_in_page_order() {
        // Pages [10, 10, 7] swept with a width of 4.
        let sweeper = Sweeper::new(FakeSource::new(27), 4);
        let records = sweeper.get_all(&ListingQuery::new("account/articles")).await;
        assert_eq!(ids(&records), (0..27).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn short_first_page_stops_after_one_batch() {
        let source = FakeSource::new(3);
        let sweeper = Sweeper::new(source, 4);
        let records = sweeper.get_all(&ListingQuery::new("account/articles")).await;
        assert_eq!(records.len(), 3);
        // The full batch is drained, but no further batch is issued.
        assert_eq!(sweeper.source.requests.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent() {
        let sweeper = Sweeper::new(FakeSource::new(42), 3);
        let query = ListingQuery::new("account/collections");
        let first = sweeper.get_all(&query).await;
        let second = sweeper.get_all(&query).await;
        assert_eq!(first, second);
    }

    /// A source that never runs dry.
    struct BottomlessSource;

    #[async_trait]
    impl PageSource for BottomlessSource {
        async fn get_one_page(&self, _query: &ListingQuery, page: usize) -> Vec<Value> {
            (0..PAGE_SIZE).map(|record| json!({ "page": page, "record": record })).collect()
        }
    }

    #[tokio::test]
    async fn batch_cap_bounds_a_bottomless_listing() {
        let sweeper = Sweeper::new(BottomlessSource, 1);
        let records = sweeper.get_all(&ListingQuery::new("account/articles")).await;
        assert_eq!(records.len(), MAX_BATCHES * PAGE_SIZE);
    }

    #[test]
    fn date_bounded_queries_pin_the_sort_order() {
        let mut query = ListingQuery::new("account/articles");
        query.published_since = Some("2023-01-01".to_owned());
        assert!(!query
            .params(1)
            .iter()
            .any(|(name, _)| *name == "order"));

        query.published_until = Some("2023-12-31".to_owned());
        let params = query.params(3);
        assert!(params.contains(&("page", "3".to_owned())));
        assert!(params.contains(&("page_size", "10".to_owned())));
        assert!(params.contains(&("order", "published_date".to_owned())));
        assert!(params.contains(&("order_direction", "desc".to_owned())));
    }
}
