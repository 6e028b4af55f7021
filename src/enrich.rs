// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Dereferences listing summaries into full records:
//! detail plus authors, private links, versions and statistics,
//! with bounded per-call concurrency.

use crate::client::{ApiClient, Error, Fetched};
use crate::model::account::Account;
use crate::model::author::Author;
use crate::model::collection::Collection;
use crate::model::dataset::Dataset;
use crate::model::group::Group;
use crate::model::parts::{PrivateLink, VersionInfo};
use crate::model::Summary;
use crate::settings::Settings;
use crate::stats::{ItemType, Statistics, StatsFetcher};
use crate::sweep::{ListingQuery, Sweeper};
use crate::thredds::SizeResolver;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

/// A fully enriched dataset:
/// the current (private-view) record plus everything hanging off it.
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub dataset: Dataset,
    /// Full author records; the stubs embedded in `dataset` were
    /// dereferenced one by one.
    pub authors: Vec<Author>,
    pub private_links: Vec<PrivateLink>,
    /// All non-current versions, already marked as such.
    pub versions: Vec<Dataset>,
    pub statistics: Statistics,
}

/// A fully enriched collection.
#[derive(Debug, Clone)]
pub struct CollectionRecord {
    pub collection: Collection,
    pub authors: Vec<Author>,
    /// Upstream article ids only; they are dereferenced elsewhere.
    pub article_ids: Vec<i64>,
    pub private_links: Vec<PrivateLink>,
    pub versions: Vec<Collection>,
    pub statistics: Statistics,
}

/// The upstream as the orchestrator sees it.
///
/// Splitting this off the HTTP plumbing lets the ingest sequence
/// run against a synthesised repository in tests.
#[async_trait]
pub trait RepositoryReader: Send + Sync {
    async fn accounts(&self) -> Vec<Account>;
    async fn groups(&self) -> Vec<Group>;
    async fn dataset_summaries(&self, account_id: i64) -> Vec<Summary>;
    async fn dataset(
        &self,
        account_id: i64,
        dataset_id: i64,
    ) -> Result<Fetched<DatasetRecord>, Error>;
    async fn collection_summaries(&self, account_id: i64) -> Vec<Summary>;
    async fn collection(
        &self,
        account_id: i64,
        collection_id: i64,
    ) -> Result<Fetched<CollectionRecord>, Error>;
}

/// Parses raw listing records, dropping (and logging) any entry
/// that does not even carry an id.
fn parse_summaries(records: Vec<Value>, path: &str) -> Vec<Summary> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Summary>(record) {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::warn!("Dropping a malformed listing entry of '{path}': {err}");
                None
            }
        })
        .collect()
}

/// The version numbers that still have to be dereferenced,
/// skipping the one the caller already holds.
fn versions_to_fetch(listed: Vec<VersionInfo>, exclude: Option<i64>) -> Vec<i64> {
    listed
        .into_iter()
        .map(|info| info.version)
        .filter(|version| Some(*version) != exclude)
        .collect()
}

/// Scrapes bare ids out of a listing of article objects.
fn scrape_ids(records: Vec<Value>) -> Vec<i64> {
    records
        .into_iter()
        .filter_map(|record| record.get("id").and_then(Value::as_i64))
        .collect()
}

/// The live [`RepositoryReader`]:
/// sweeps listings and dereferences details over HTTP.
#[derive(Debug)]
pub struct Enricher {
    client: ApiClient,
    sweeper: Sweeper<ApiClient>,
    stats: StatsFetcher,
    sizes: SizeResolver<ApiClient>,
    institution_id: i64,
    width: usize,
}

impl Enricher {
    #[must_use]
    pub fn new(client: ApiClient, settings: &Settings) -> Self {
        let width = settings.parallelism();
        Self {
            sweeper: Sweeper::new(client.clone(), width),
            stats: StatsFetcher::new(client.clone()),
            sizes: SizeResolver::new(client.clone()),
            institution_id: settings.institution_id,
            width,
            client,
        }
    }

    fn impersonation(account_id: i64) -> [(&'static str, String); 1] {
        [("impersonate", account_id.to_string())]
    }

    /// Dereferences each author stub into its full record.
    /// A failed author is missing data, not a failed item.
    async fn fetch_authors(&self, stubs: &[Author], account_id: i64) -> Vec<Author> {
        stream::iter(stubs.iter().filter_map(|stub| stub.id))
            .map(|author_id| async move {
                let params = Self::impersonation(account_id);
                let path = format!("account/authors/{author_id}");
                match self.client.fetch_one::<Author>(&path, &params).await {
                    Ok(Fetched::Found(author)) => Some(author),
                    Ok(Fetched::NotFound) => {
                        tracing::warn!("Author {author_id} does not exist upstream");
                        None
                    }
                    Err(err) => {
                        tracing::error!("Failed to fetch author {author_id}: {err}");
                        None
                    }
                }
            })
            .buffered(self.width)
            .filter_map(|author| async move { author })
            .collect()
            .await
    }

    async fn private_links(&self, path: &str, account_id: i64) -> Vec<PrivateLink> {
        let params = Self::impersonation(account_id);
        match self.client.fetch_list::<PrivateLink>(path, &params).await {
            Ok(links) => links,
            Err(err) => {
                tracing::error!("Failed to fetch private links from '{path}': {err}");
                Vec::new()
            }
        }
    }

    async fn dataset_versions(&self, dataset_id: i64, exclude: Option<i64>) -> Vec<Dataset> {
        let path = format!("articles/{dataset_id}/versions");
        let listed = match self.client.fetch_list::<VersionInfo>(&path, &[]).await {
            Ok(listed) => listed,
            Err(err) => {
                tracing::error!("Failed to list versions of dataset {dataset_id}: {err}");
                return Vec::new();
            }
        };
        stream::iter(versions_to_fetch(listed, exclude))
            .map(|version| async move {
                let path = format!("articles/{dataset_id}/versions/{version}");
                match self.client.fetch_one::<Dataset>(&path, &[]).await {
                    Ok(Fetched::Found(dataset)) => Some(dataset),
                    Ok(Fetched::NotFound) => {
                        tracing::warn!("Version {version} of dataset {dataset_id} does not exist");
                        None
                    }
                    Err(err) => {
                        tracing::error!(
                            "Failed to fetch version {version} of dataset {dataset_id}: {err}"
                        );
                        None
                    }
                }
            })
            .buffered(self.width)
            .filter_map(|dataset| async move { dataset })
            .collect()
            .await
    }

    async fn collection_versions(
        &self,
        collection_id: i64,
        exclude: Option<i64>,
    ) -> Vec<Collection> {
        let path = format!("collections/{collection_id}/versions");
        let listed = match self.client.fetch_list::<VersionInfo>(&path, &[]).await {
            Ok(listed) => listed,
            Err(err) => {
                tracing::error!("Failed to list versions of collection {collection_id}: {err}");
                return Vec::new();
            }
        };
        stream::iter(versions_to_fetch(listed, exclude))
            .map(|version| async move {
                let path = format!("collections/{collection_id}/versions/{version}");
                match self.client.fetch_one::<Collection>(&path, &[]).await {
                    Ok(Fetched::Found(collection)) => Some(collection),
                    Ok(Fetched::NotFound) => {
                        tracing::warn!(
                            "Version {version} of collection {collection_id} does not exist"
                        );
                        None
                    }
                    Err(err) => {
                        tracing::error!(
                            "Failed to fetch version {version} of collection {collection_id}: {err}"
                        );
                        None
                    }
                }
            })
            .buffered(self.width)
            .filter_map(|collection| async move { collection })
            .collect()
            .await
    }

    /// Replaces zero sizes of THREDDS-backed files with the
    /// recursive sum over their catalogue tree.
    async fn resolve_file_sizes(&self, dataset: &mut Dataset) {
        for file in &mut dataset.files {
            if !file.needs_thredds_size() {
                continue;
            }
            let Some(url) = file.download_url.clone() else {
                continue;
            };
            match self.sizes.total_size(&url).await {
                Ok(total) => file.size = i64::try_from(total).ok(),
                Err(err) => {
                    tracing::error!("Failed to resolve the THREDDS size of '{url}': {err}");
                }
            }
        }
    }
}

#[async_trait]
impl RepositoryReader for Enricher {
    async fn accounts(&self) -> Vec<Account> {
        let mut query = ListingQuery::new("account/institution/accounts");
        query.institution_id = Some(self.institution_id);
        let records = self.sweeper.get_all(&query).await;
        records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Account>(record) {
                Ok(account) => Some(account),
                Err(err) => {
                    tracing::warn!("Dropping a malformed account record: {err}");
                    None
                }
            })
            .collect()
    }

    async fn groups(&self) -> Vec<Group> {
        let query = ListingQuery::new("account/institution/groups");
        let records = self.sweeper.get_all(&query).await;
        records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Group>(record) {
                Ok(group) => Some(group),
                Err(err) => {
                    tracing::warn!("Dropping a malformed group record: {err}");
                    None
                }
            })
            .collect()
    }

    async fn dataset_summaries(&self, account_id: i64) -> Vec<Summary> {
        let mut query = ListingQuery::new("account/articles");
        query.impersonate = Some(account_id);
        parse_summaries(self.sweeper.get_all(&query).await, &query.path)
    }

    async fn dataset(
        &self,
        account_id: i64,
        dataset_id: i64,
    ) -> Result<Fetched<DatasetRecord>, Error> {
        let params = Self::impersonation(account_id);
        let path = format!("account/articles/{dataset_id}");
        let Fetched::Found(mut dataset) = self.client.fetch_one::<Dataset>(&path, &params).await?
        else {
            tracing::error!("Dataset {dataset_id} resolved to the upstream's \"not found\" list");
            return Ok(Fetched::NotFound);
        };
        let current_version = dataset.version;
        dataset.mark_current(Some(account_id));
        self.resolve_file_sizes(&mut dataset).await;

        let authors = self.fetch_authors(&dataset.authors, account_id).await;
        let private_links = self
            .private_links(&format!("account/articles/{dataset_id}/private_links"), account_id)
            .await;
        let mut versions = self.dataset_versions(dataset_id, current_version).await;
        for version in &mut versions {
            version.mark_version(Some(account_id));
        }
        let statistics = self.stats.for_item(ItemType::Article, dataset_id).await;
        Ok(Fetched::Found(DatasetRecord {
            dataset,
            authors,
            private_links,
            versions,
            statistics,
        }))
    }

    async fn collection_summaries(&self, account_id: i64) -> Vec<Summary> {
        let mut query = ListingQuery::new("account/collections");
        query.impersonate = Some(account_id);
        parse_summaries(self.sweeper.get_all(&query).await, &query.path)
    }

    async fn collection(
        &self,
        account_id: i64,
        collection_id: i64,
    ) -> Result<Fetched<CollectionRecord>, Error> {
        let params = Self::impersonation(account_id);
        let path = format!("account/collections/{collection_id}");
        let Fetched::Found(mut collection) =
            self.client.fetch_one::<Collection>(&path, &params).await?
        else {
            tracing::error!(
                "Collection {collection_id} resolved to the upstream's \"not found\" list"
            );
            return Ok(Fetched::NotFound);
        };
        let current_version = collection.version;
        collection.mark_current(Some(account_id));

        let authors = self.fetch_authors(&collection.authors, account_id).await;
        let article_ids = scrape_ids(
            self.client
                .get_records(
                    &format!("account/collections/{collection_id}/articles"),
                    &params,
                )
                .await,
        );
        let private_links = self
            .private_links(
                &format!("account/collections/{collection_id}/private_links"),
                account_id,
            )
            .await;
        let mut versions = self.collection_versions(collection_id, current_version).await;
        for version in &mut versions {
            version.mark_version(Some(account_id));
        }
        let statistics = self.stats.for_item(ItemType::Collection, collection_id).await;
        Ok(Fetched::Found(CollectionRecord {
            collection,
            authors,
            article_ids,
            private_links,
            versions,
            statistics,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_summaries_are_dropped() {
        let records = vec![
            json!({ "id": 100, "title": "kept" }),
            json!("not even an object"),
            json!({ "title": "no id" }),
        ];
        let summaries = parse_summaries(records, "account/articles");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, Some(100));
        // An object without id survives parsing; it is dropped later,
        // when the enrichment finds nothing to dereference.
        assert_eq!(summaries[1].id, None);
    }

    #[test]
    fn the_current_version_is_not_fetched_again() {
        let listed = vec![
            VersionInfo { version: 1, url: None },
            VersionInfo { version: 2, url: None },
            VersionInfo { version: 3, url: None },
        ];
        assert_eq!(versions_to_fetch(listed.clone(), Some(3)), vec![1, 2]);
        assert_eq!(versions_to_fetch(listed, None), vec![1, 2, 3]);
    }

    #[test]
    fn article_listings_are_scraped_to_bare_ids() {
        let records = vec![
            json!({ "id": 100, "title": "ignored" }),
            json!({ "no_id": true }),
            json!({ "id": 102 }),
        ];
        assert_eq!(scrape_ids(records), vec![100, 102]);
    }
}
