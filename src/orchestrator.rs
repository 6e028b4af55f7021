// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The ingest controller:
//! sequences accounts, datasets, collections and groups,
//! tallies successes and failures,
//! and serialises the snapshot at the end.

use crate::client::{Error, Fetched};
use crate::enrich::RepositoryReader;
use crate::rdf::store::SnapshotGraph;
use crate::rdf::GraphError;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Default, Clone, Copy)]
pub struct Tally {
    pub written: u64,
    pub failed: u64,
}

impl Tally {
    fn ok(&mut self) {
        self.written += 1;
    }

    fn fail(&mut self) {
        self.failed += 1;
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} written, {} failed", self.written, self.failed)
    }
}

/// What one engine run did, per entity category,
/// plus where the snapshot ended up.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub accounts: Tally,
    pub datasets: Tally,
    pub collections: Tally,
    pub groups: Tally,
    pub snapshot: Option<PathBuf>,
}

/// Drives one full ingestion run.
///
/// The orchestrator owns the snapshot graph;
/// workers only ever hand records back to it.
/// There is no global rollback:
/// a failed item is tallied and the run continues.
/// The one exception is an account that fails to persist;
/// it suppresses ingestion of its datasets and collections.
pub struct Orchestrator<R> {
    reader: R,
    graph: SnapshotGraph,
    output_directory: PathBuf,
    width: usize,
}

impl<R: RepositoryReader> Orchestrator<R> {
    pub fn new(
        reader: R,
        graph: SnapshotGraph,
        output_directory: impl Into<PathBuf>,
        width: usize,
    ) -> Self {
        Self {
            reader,
            graph,
            output_directory: output_directory.into(),
            width: width.max(1),
        }
    }

    /// Runs the full sequence.
    /// Only a failure to serialise the finished snapshot is fatal.
    pub async fn run(mut self) -> Result<IngestReport, GraphError> {
        let mut report = IngestReport::default();

        let accounts = self.reader.accounts().await;
        tracing::info!("Ingesting {} institutional accounts ...", accounts.len());
        for account in accounts {
            if let Err(err) = self.graph.insert_account(&account) {
                tracing::error!(
                    "Failed to persist account {:?}; skipping its datasets and collections: {err}",
                    account.id
                );
                report.accounts.fail();
                continue;
            }
            report.accounts.ok();
            let Some(account_id) = account.id else {
                continue;
            };
            self.ingest_datasets(account_id, &mut report.datasets).await;
            self.ingest_collections(account_id, &mut report.collections)
                .await;
        }

        for group in self.reader.groups().await {
            match self.graph.insert_group(&group) {
                Ok(_) => report.groups.ok(),
                Err(err) => {
                    tracing::error!("Failed to persist group {:?}: {err}", group.id);
                    report.groups.fail();
                }
            }
        }

        let path = self.graph.write_to_directory(&self.output_directory)?;
        report.snapshot = Some(path);

        tracing::info!("Accounts:    {}.", report.accounts);
        tracing::info!("Datasets:    {}.", report.datasets);
        tracing::info!("Collections: {}.", report.collections);
        tracing::info!("Groups:      {}.", report.groups);
        Ok(report)
    }

    async fn ingest_datasets(&mut self, account_id: i64, tally: &mut Tally) {
        let summaries = self.reader.dataset_summaries(account_id).await;
        let reader = &self.reader;
        let graph = &mut self.graph;
        let mut enriched = stream::iter(summaries.into_iter().filter_map(|summary| summary.id))
            .map(|dataset_id| async move {
                (dataset_id, reader.dataset(account_id, dataset_id).await)
            })
            .buffered(self.width);
        while let Some((dataset_id, result)) = enriched.next().await {
            match result {
                Ok(Fetched::Found(record)) => match graph.insert_dataset(&record) {
                    Ok(_) => tally.ok(),
                    Err(err) => {
                        tracing::error!("Failed to persist dataset {dataset_id}: {err}");
                        tally.fail();
                    }
                },
                Ok(Fetched::NotFound) => {
                    tracing::error!(
                        "Dataset {dataset_id} was listed, but its detail does not exist; skipping"
                    );
                    tally.fail();
                }
                Err(err) => {
                    tracing::error!("Failed to enrich dataset {dataset_id}: {err}");
                    tally.fail();
                }
            }
        }
    }

    async fn ingest_collections(&mut self, account_id: i64, tally: &mut Tally) {
        let summaries = self.reader.collection_summaries(account_id).await;
        let reader = &self.reader;
        let graph = &mut self.graph;
        let mut enriched = stream::iter(summaries.into_iter().filter_map(|summary| summary.id))
            .map(|collection_id| async move {
                (collection_id, reader.collection(account_id, collection_id).await)
            })
            .buffered(self.width);
        while let Some((collection_id, result)) = enriched.next().await {
            match result {
                Ok(Fetched::Found(record)) => match graph.insert_collection(&record) {
                    Ok(_) => tally.ok(),
                    Err(err) => {
                        tracing::error!("Failed to persist collection {collection_id}: {err}");
                        tally.fail();
                    }
                },
                Ok(Fetched::NotFound) => {
                    tracing::error!(
                        "Collection {collection_id} was listed, but its detail does not exist; skipping"
                    );
                    tally.fail();
                }
                Err(err) => {
                    tracing::error!("Failed to enrich collection {collection_id}: {err}");
                    tally.fail();
                }
            }
        }
    }
}
