// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-item view/download/share counters from the statistics host.
//!
//! Statistics are strictly best-effort:
//! a missing credential or any unexpected response shape
//! degrades to an all-null block, never to a failed item.

use crate::client::ApiClient;
use chrono::{NaiveDate, Utc};
use governor::{Quota, RateLimiter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub type RL = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::QuantaClock,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// This has to be static,
/// because if we created multiple fetchers,
/// we would send too many requests from the same network address;
/// the statistics host throttles far more aggressively
/// than the main API.
pub static RATE_LIMITER: LazyLock<Arc<RL>> = LazyLock::new(|| {
    Arc::new(RateLimiter::direct(
        Quota::with_period(Duration::from_millis(100)).unwrap(),
    ))
});

/// The repository's go-live date;
/// no statistics exist before it.
const REPOSITORY_GO_LIVE: &str = "2020-07-01";

/// Which flavour of item the statistics are about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Article,
    Collection,
}

impl ItemType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Collection => "collection",
        }
    }
}

/// Day-level counters, keyed by `YYYY-MM-DD`.
pub type DayCounts = BTreeMap<String, i64>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    pub views: Option<i64>,
    pub downloads: Option<i64>,
    pub shares: Option<i64>,
    pub cites: Option<i64>,
}

/// The statistics block of one dataset or collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub views: Option<DayCounts>,
    pub downloads: Option<DayCounts>,
    pub shares: Option<DayCounts>,
    pub totals: Option<Totals>,
}

impl Statistics {
    /// The all-null marker: auth was missing or the host misbehaved.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            views: None,
            downloads: None,
            shares: None,
            totals: None,
        }
    }

    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        self.views.is_none()
            && self.downloads.is_none()
            && self.shares.is_none()
            && self.totals.is_none()
    }
}

/// Extracts the `breakdown` object of a response
/// into day-level counters.
fn parse_breakdown(value: &Value) -> Option<DayCounts> {
    let breakdown = value.get("breakdown")?.as_object()?;
    let mut days = DayCounts::new();
    for (date, count) in breakdown {
        days.insert(date.clone(), count.as_i64()?);
    }
    Some(days)
}

fn parse_totals(value: &Value) -> Option<Totals> {
    value.as_object()?;
    Some(Totals {
        views: value.get("views").and_then(Value::as_i64),
        downloads: value.get("downloads").and_then(Value::as_i64),
        shares: value.get("shares").and_then(Value::as_i64),
        cites: value.get("cites").and_then(Value::as_i64),
    })
}

#[derive(Debug, Clone)]
pub struct StatsFetcher {
    client: ApiClient,
    start_date: NaiveDate,
}

impl StatsFetcher {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            start_date: REPOSITORY_GO_LIVE
                .parse()
                .expect("invalid go-live date literal"),
        }
    }

    /// Fetches the three day-level breakdowns plus the totals
    /// for one item. Every failure mode collapses into
    /// [`Statistics::unavailable`].
    pub async fn for_item(&self, item_type: ItemType, item_id: i64) -> Statistics {
        let end_date = Utc::now().date_naive();
        let params = [
            ("start_date", self.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", end_date.format("%Y-%m-%d").to_string()),
        ];
        let tenant = self.client.stats_tenant().to_owned();
        let kind = item_type.as_str();

        let mut breakdowns = Vec::with_capacity(3);
        for metric in ["views", "downloads", "shares"] {
            let path = format!("{tenant}/breakdown/day/{metric}/{kind}/{item_id}");
            RATE_LIMITER.until_ready().await;
            let days = match self.client.get_stats(&path, &params).await {
                Ok(value) => parse_breakdown(&value),
                Err(err) => {
                    tracing::debug!("No {metric} statistics for {kind} {item_id}: {err}");
                    None
                }
            };
            let Some(days) = days else {
                return Statistics::unavailable();
            };
            breakdowns.push(days);
        }

        let totals_path = format!("total/{kind}/{item_id}");
        RATE_LIMITER.until_ready().await;
        let totals = match self.client.get_stats(&totals_path, &[]).await {
            Ok(value) => parse_totals(&value),
            Err(err) => {
                tracing::debug!("No total statistics for {kind} {item_id}: {err}");
                None
            }
        };
        let Some(totals) = totals else {
            return Statistics::unavailable();
        };

        let mut breakdowns = breakdowns.into_iter();
        Statistics {
            views: breakdowns.next(),
            downloads: breakdowns.next(),
            shares: breakdowns.next(),
            totals: Some(totals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use serde_json::json;

    #[test]
    fn breakdown_parses_day_counters() {
        let value = json!({ "breakdown": { "2020-07-01": 3, "2020-07-02": 0 } });
        let days = parse_breakdown(&value).expect("no breakdown");
        assert_eq!(days.get("2020-07-01"), Some(&3));
        assert_eq!(days.get("2020-07-02"), Some(&0));
        assert_eq!(days.len(), 2);
    }

    #[test]
    fn malformed_breakdowns_are_rejected() {
        assert_eq!(parse_breakdown(&json!({})), None);
        assert_eq!(parse_breakdown(&json!({ "breakdown": [1, 2] })), None);
        assert_eq!(
            parse_breakdown(&json!({ "breakdown": { "2020-07-01": "three" } })),
            None
        );
    }

    #[test]
    fn totals_tolerate_missing_metrics() {
        let totals = parse_totals(&json!({ "views": 12, "downloads": 3 })).expect("no totals");
        assert_eq!(totals.views, Some(12));
        assert_eq!(totals.downloads, Some(3));
        assert_eq!(totals.shares, None);
        assert_eq!(parse_totals(&json!([])), None);
    }

    #[tokio::test]
    async fn missing_credential_yields_the_all_null_block() {
        let settings = Settings::builder().token("secret".to_owned()).build();
        let client = ApiClient::new(&settings).expect("client construction failed");
        let fetcher = StatsFetcher::new(client);
        let stats = fetcher.for_item(ItemType::Article, 100).await;
        assert!(stats.is_unavailable());
    }
}
