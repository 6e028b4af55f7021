// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The accumulated snapshot graph and its entity-insert operations.
//!
//! Workers never write triples themselves;
//! they hand normalised records to the orchestrator,
//! which owns the single [`SnapshotGraph`] of a run.

use super::{blank_node, class_iri, column, unique_node, GraphError};
use crate::enrich::{CollectionRecord, DatasetRecord};
use crate::ids::{EntityKind, IdGenerator};
use crate::model::account::Account;
use crate::model::author::Author;
use crate::model::collection::Collection;
use crate::model::dataset::Dataset;
use crate::model::file::FileRecord;
use crate::model::group::Group;
use crate::model::parts::{Category, CustomField, Funding, License, PrivateLink, Timeline};
use crate::stats::{ItemType, Statistics};
use crate::tools::parse_instant;
use chrono::{SecondsFormat, Utc};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{GraphName, Literal, NamedNode, Quad, Subject, Term};
use oxrdfio::{RdfFormat, RdfSerializer};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One run's snapshot, accumulated in memory
/// and persisted once at the end.
pub struct SnapshotGraph {
    graph: NamedNode,
    quads: Vec<Quad>,
    ids: Arc<IdGenerator>,
    /// upstream author id -> internal id, for node reuse across items
    authors_seen: HashMap<i64, i64>,
    categories_seen: HashMap<i64, i64>,
    licenses_seen: HashSet<i64>,
}

impl SnapshotGraph {
    pub fn new(graph_iri: &str, ids: Arc<IdGenerator>) -> Result<Self, GraphError> {
        Ok(Self {
            graph: NamedNode::new(graph_iri)?,
            quads: Vec::new(),
            ids,
            authors_seen: HashMap::new(),
            categories_seen: HashMap::new(),
            licenses_seen: HashSet::new(),
        })
    }

    #[must_use]
    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    fn add_term(&mut self, subject: &Subject, predicate: NamedNode, object: Term) {
        self.quads.push(Quad::new(
            subject.clone(),
            predicate,
            object,
            GraphName::NamedNode(self.graph.clone()),
        ));
    }

    fn add_type(&mut self, subject: &Subject, class: &str) {
        self.add_term(subject, rdf::TYPE.into_owned(), class_iri(class).into());
    }

    /// No triple is emitted for an absent value;
    /// the graph simply lacks the column.
    fn add_str(&mut self, subject: &Subject, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.add_term(
                subject,
                column(field),
                Literal::new_simple_literal(value).into(),
            );
        }
    }

    fn add_int(&mut self, subject: &Subject, field: &str, value: Option<i64>) {
        if let Some(value) = value {
            self.add_term(subject, column(field), Literal::from(value).into());
        }
    }

    fn add_bool(&mut self, subject: &Subject, field: &str, value: Option<bool>) {
        if let Some(value) = value {
            self.add_term(subject, column(field), Literal::from(value).into());
        }
    }

    /// Normalises an upstream timestamp to UTC before emitting it.
    /// Unparsable values are dropped with a log line.
    fn add_timestamp(&mut self, subject: &Subject, field: &str, value: Option<&str>) {
        let Some(raw) = value else { return };
        match parse_instant(raw) {
            Some(instant) => self.add_term(
                subject,
                column(field),
                Literal::new_typed_literal(
                    instant.to_rfc3339_opts(SecondsFormat::Secs, true),
                    xsd::DATE_TIME,
                )
                .into(),
            ),
            None => tracing::warn!("Dropping unparsable timestamp in column '{field}': '{raw}'"),
        }
    }

    /// A primary entity: named subject, class triple,
    /// and a fresh internal `id` column.
    fn new_entity(&mut self, kind: EntityKind, class: &str) -> (Subject, i64) {
        let subject = Subject::from(unique_node(&kind.to_string()));
        self.add_type(&subject, class);
        let internal_id = self.ids.next(kind);
        self.add_int(&subject, "id", Some(internal_id));
        (subject, internal_id)
    }

    /// A dependent row (tag, reference, join, statistics):
    /// blank subject, class triple, no internal id.
    fn new_row(&mut self, class: &str) -> Subject {
        let subject = Subject::from(blank_node());
        self.add_type(&subject, class);
        subject
    }

    pub fn insert_account(&mut self, account: &Account) -> Result<i64, GraphError> {
        let upstream_id = account.id.ok_or(GraphError::MissingId("account"))?;
        let (subject, internal_id) = self.new_entity(EntityKind::Account, "Account");
        self.add_int(&subject, "account_id", Some(upstream_id));
        self.add_str(&subject, "email", account.email.as_deref());
        self.add_str(&subject, "first_name", account.first_name.as_deref());
        self.add_str(&subject, "last_name", account.last_name.as_deref());
        self.add_int(&subject, "active", account.active);
        self.add_int(&subject, "institution_id", account.institution_id);
        self.add_str(
            &subject,
            "institution_user_id",
            account.institution_user_id.as_deref(),
        );
        self.add_int(&subject, "group_id", account.group_id);
        self.add_int(&subject, "quota", account.quota);
        self.add_int(&subject, "used_quota", account.used_quota);
        self.add_int(&subject, "used_quota_private", account.used_quota_private);
        self.add_int(&subject, "used_quota_public", account.used_quota_public);
        self.add_bool(
            &subject,
            "pending_quota_request",
            account.pending_quota_request,
        );
        self.add_int(&subject, "maximum_file_size", account.maximum_file_size);
        self.add_timestamp(&subject, "created_date", account.created_date.as_deref());
        self.add_timestamp(&subject, "modified_date", account.modified_date.as_deref());
        Ok(internal_id)
    }

    /// Inserts an enriched dataset:
    /// the current record, its private links and statistics,
    /// and one further record per historic version.
    pub fn insert_dataset(&mut self, record: &DatasetRecord) -> Result<i64, GraphError> {
        let internal_id = self.insert_dataset_row(&record.dataset, &record.authors)?;
        for link in &record.private_links {
            self.insert_private_link(link, "dataset_id", internal_id);
        }
        if let Some(upstream_id) = record.dataset.id {
            self.insert_statistics(ItemType::Article, upstream_id, &record.statistics);
        }
        for version in &record.versions {
            if let Err(err) = self.insert_dataset_row(version, &version.authors) {
                tracing::error!(
                    "Skipping a version record of dataset {:?}: {err}",
                    record.dataset.id
                );
            }
        }
        Ok(internal_id)
    }

    fn insert_dataset_row(
        &mut self,
        dataset: &Dataset,
        authors: &[Author],
    ) -> Result<i64, GraphError> {
        let upstream_id = dataset.id.ok_or(GraphError::MissingId("dataset"))?;
        let (subject, internal_id) = self.new_entity(EntityKind::Dataset, "Dataset");
        self.add_int(&subject, "dataset_id", Some(upstream_id));
        self.add_int(&subject, "account_id", dataset.account_id);
        self.add_str(&subject, "title", dataset.title.as_deref());
        self.add_str(&subject, "doi", dataset.doi.as_deref());
        self.add_str(&subject, "handle", dataset.handle.as_deref());
        self.add_str(&subject, "url", dataset.url.as_deref());
        self.add_str(&subject, "url_public_html", dataset.url_public_html.as_deref());
        self.add_str(&subject, "url_public_api", dataset.url_public_api.as_deref());
        self.add_str(&subject, "url_private_html", dataset.url_private_html.as_deref());
        self.add_str(&subject, "url_private_api", dataset.url_private_api.as_deref());
        self.add_str(&subject, "description", dataset.description.as_deref());
        self.add_int(&subject, "defined_type", dataset.defined_type);
        self.add_str(&subject, "defined_type_name", dataset.defined_type_name.as_deref());
        self.add_int(&subject, "group_id", dataset.group_id);
        self.add_int(&subject, "size", dataset.size);
        self.add_str(&subject, "status", dataset.status.as_deref());
        self.add_int(&subject, "version", dataset.version);
        self.add_str(&subject, "thumb", dataset.thumb.as_deref());
        self.add_str(&subject, "citation", dataset.citation.as_deref());
        self.add_str(&subject, "resource_doi", dataset.resource_doi.as_deref());
        self.add_str(&subject, "resource_title", dataset.resource_title.as_deref());
        self.add_timestamp(&subject, "created_date", dataset.created_date.as_deref());
        self.add_timestamp(&subject, "modified_date", dataset.modified_date.as_deref());
        self.add_timestamp(&subject, "published_date", dataset.published_date.as_deref());
        self.add_bool(&subject, "is_public", dataset.is_public);
        self.add_bool(&subject, "is_embargoed", dataset.is_embargoed);
        self.add_bool(&subject, "is_confidential", dataset.is_confidential);
        self.add_bool(&subject, "is_metadata_record", dataset.is_metadata_record);
        self.add_str(&subject, "metadata_reason", dataset.metadata_reason.as_deref());
        self.add_str(
            &subject,
            "confidential_reason",
            dataset.confidential_reason.as_deref(),
        );
        self.add_timestamp(&subject, "embargo_date", dataset.embargo_date.as_deref());
        self.add_str(&subject, "embargo_type", dataset.embargo_type.as_deref());
        self.add_str(&subject, "embargo_title", dataset.embargo_title.as_deref());
        self.add_str(&subject, "embargo_reason", dataset.embargo_reason.as_deref());
        self.add_int(&subject, "is_latest", dataset.is_latest);
        self.add_int(&subject, "is_editable", dataset.is_editable);

        if let Some(license) = &dataset.license {
            self.insert_license(license);
            self.add_int(&subject, "license_id", license.value);
        }
        if let Some(timeline) = &dataset.timeline {
            if !timeline.is_empty() {
                let timeline_id = self.insert_timeline(timeline);
                self.add_int(&subject, "timeline_id", Some(timeline_id));
            }
        }
        self.link_authors(authors, "DatasetAuthor", "dataset_id", internal_id);
        for file in &dataset.files {
            self.insert_file(file, internal_id);
        }
        for tag in &dataset.tags {
            let row = self.new_row("Tag");
            self.add_int(&row, "dataset_id", Some(internal_id));
            self.add_str(&row, "tag", Some(tag));
        }
        for reference in &dataset.references {
            let row = self.new_row("Reference");
            self.add_int(&row, "dataset_id", Some(internal_id));
            self.add_str(&row, "url", Some(reference));
        }
        self.link_categories(&dataset.categories, "DatasetCategory", "dataset_id", internal_id);
        for field in &dataset.custom_fields {
            self.insert_custom_field(field, "dataset_id", internal_id);
        }
        for funding in &dataset.funding_list {
            self.insert_funding(funding, "dataset_id", internal_id);
        }
        Ok(internal_id)
    }

    /// Inserts an enriched collection, its linked datasets
    /// (by upstream article id), private links, statistics
    /// and historic versions.
    pub fn insert_collection(&mut self, record: &CollectionRecord) -> Result<i64, GraphError> {
        let internal_id = self.insert_collection_row(&record.collection, &record.authors)?;
        for article_id in &record.article_ids {
            let row = self.new_row("CollectionDataset");
            self.add_int(&row, "collection_id", Some(internal_id));
            self.add_int(&row, "article_id", Some(*article_id));
        }
        for link in &record.private_links {
            self.insert_private_link(link, "collection_id", internal_id);
        }
        if let Some(upstream_id) = record.collection.id {
            self.insert_statistics(ItemType::Collection, upstream_id, &record.statistics);
        }
        for version in &record.versions {
            if let Err(err) = self.insert_collection_row(version, &version.authors) {
                tracing::error!(
                    "Skipping a version record of collection {:?}: {err}",
                    record.collection.id
                );
            }
        }
        Ok(internal_id)
    }

    fn insert_collection_row(
        &mut self,
        collection: &Collection,
        authors: &[Author],
    ) -> Result<i64, GraphError> {
        let upstream_id = collection.id.ok_or(GraphError::MissingId("collection"))?;
        let (subject, internal_id) = self.new_entity(EntityKind::Collection, "Collection");
        self.add_int(&subject, "collection_id", Some(upstream_id));
        self.add_int(&subject, "account_id", collection.account_id);
        self.add_str(&subject, "title", collection.title.as_deref());
        self.add_str(&subject, "doi", collection.doi.as_deref());
        self.add_str(&subject, "handle", collection.handle.as_deref());
        self.add_str(&subject, "url", collection.url.as_deref());
        self.add_str(&subject, "description", collection.description.as_deref());
        self.add_int(&subject, "group_id", collection.group_id);
        self.add_int(&subject, "institution_id", collection.institution_id);
        self.add_str(&subject, "resource_id", collection.resource_id.as_deref());
        self.add_str(&subject, "resource_doi", collection.resource_doi.as_deref());
        self.add_str(&subject, "resource_title", collection.resource_title.as_deref());
        self.add_str(&subject, "resource_link", collection.resource_link.as_deref());
        self.add_int(&subject, "resource_version", collection.resource_version);
        self.add_int(&subject, "version", collection.version);
        self.add_int(&subject, "public", collection.public);
        self.add_str(&subject, "citation", collection.citation.as_deref());
        self.add_int(&subject, "articles_count", collection.articles_count);
        self.add_timestamp(&subject, "created_date", collection.created_date.as_deref());
        self.add_timestamp(&subject, "modified_date", collection.modified_date.as_deref());
        self.add_timestamp(
            &subject,
            "published_date",
            collection.published_date.as_deref(),
        );
        self.add_int(&subject, "is_latest", collection.is_latest);
        self.add_int(&subject, "is_editable", collection.is_editable);

        if let Some(timeline) = &collection.timeline {
            if !timeline.is_empty() {
                let timeline_id = self.insert_timeline(timeline);
                self.add_int(&subject, "timeline_id", Some(timeline_id));
            }
        }
        self.link_authors(authors, "CollectionAuthor", "collection_id", internal_id);
        for tag in &collection.tags {
            let row = self.new_row("Tag");
            self.add_int(&row, "collection_id", Some(internal_id));
            self.add_str(&row, "tag", Some(tag));
        }
        for reference in &collection.references {
            let row = self.new_row("Reference");
            self.add_int(&row, "collection_id", Some(internal_id));
            self.add_str(&row, "url", Some(reference));
        }
        self.link_categories(
            &collection.categories,
            "CollectionCategory",
            "collection_id",
            internal_id,
        );
        for field in &collection.custom_fields {
            self.insert_custom_field(field, "collection_id", internal_id);
        }
        for funding in &collection.funding_list {
            self.insert_funding(funding, "collection_id", internal_id);
        }
        Ok(internal_id)
    }

    /// Inserts an author node once per run,
    /// returning the same internal id on every further occurrence.
    pub fn insert_author(&mut self, author: &Author) -> Result<i64, GraphError> {
        let upstream_id = author.id.ok_or(GraphError::MissingId("author"))?;
        if let Some(internal_id) = self.authors_seen.get(&upstream_id) {
            return Ok(*internal_id);
        }
        let (subject, internal_id) = self.new_entity(EntityKind::Author, "Author");
        self.add_int(&subject, "author_id", Some(upstream_id));
        self.add_str(&subject, "full_name", author.full_name.as_deref());
        self.add_str(&subject, "first_name", author.first_name.as_deref());
        self.add_str(&subject, "last_name", author.last_name.as_deref());
        self.add_str(&subject, "url_name", author.url_name.as_deref());
        self.add_str(&subject, "orcid_id", author.orcid_id.as_deref());
        self.add_str(&subject, "job_title", author.job_title.as_deref());
        self.add_int(&subject, "is_active", author.is_active);
        self.add_int(&subject, "is_public", author.is_public);
        self.authors_seen.insert(upstream_id, internal_id);
        Ok(internal_id)
    }

    fn link_authors(
        &mut self,
        authors: &[Author],
        join_class: &str,
        parent_column: &str,
        parent_id: i64,
    ) {
        for author in authors {
            match self.insert_author(author) {
                Ok(author_internal_id) => {
                    let row = self.new_row(join_class);
                    self.add_int(&row, parent_column, Some(parent_id));
                    self.add_int(&row, "author_id", Some(author_internal_id));
                }
                Err(err) => {
                    tracing::warn!("Skipping an author without identifier: {err}");
                }
            }
        }
    }

    fn link_categories(
        &mut self,
        categories: &[Category],
        join_class: &str,
        parent_column: &str,
        parent_id: i64,
    ) {
        for category in categories {
            let Some(upstream_id) = category.id else {
                tracing::warn!("Skipping a category without identifier");
                continue;
            };
            let internal_id = match self.categories_seen.get(&upstream_id) {
                Some(internal_id) => *internal_id,
                None => {
                    let (subject, internal_id) =
                        self.new_entity(EntityKind::Category, "Category");
                    self.add_int(&subject, "category_id", Some(upstream_id));
                    self.add_str(&subject, "title", category.title.as_deref());
                    self.add_int(&subject, "parent_id", category.parent_id);
                    self.add_str(&subject, "source_id", category.source_id.as_deref());
                    self.add_int(&subject, "taxonomy_id", category.taxonomy_id);
                    self.categories_seen.insert(upstream_id, internal_id);
                    internal_id
                }
            };
            let row = self.new_row(join_class);
            self.add_int(&row, parent_column, Some(parent_id));
            self.add_int(&row, "category_id", Some(internal_id));
        }
    }

    fn insert_license(&mut self, license: &License) {
        let Some(upstream_id) = license.value else { return };
        if !self.licenses_seen.insert(upstream_id) {
            return;
        }
        let subject = Subject::from(unique_node("license"));
        self.add_type(&subject, "License");
        self.add_int(&subject, "license_id", Some(upstream_id));
        self.add_str(&subject, "name", license.name.as_deref());
        self.add_str(&subject, "url", license.url.as_deref());
    }

    fn insert_timeline(&mut self, timeline: &Timeline) -> i64 {
        let (subject, internal_id) = self.new_entity(EntityKind::Timeline, "Timeline");
        self.add_timestamp(&subject, "submission", timeline.submission.as_deref());
        self.add_timestamp(&subject, "revision", timeline.revision.as_deref());
        self.add_timestamp(&subject, "first_online", timeline.first_online.as_deref());
        self.add_timestamp(&subject, "posted", timeline.posted.as_deref());
        self.add_timestamp(
            &subject,
            "publisher_acceptance",
            timeline.publisher_acceptance.as_deref(),
        );
        self.add_timestamp(
            &subject,
            "publisher_publication",
            timeline.publisher_publication.as_deref(),
        );
        internal_id
    }

    fn insert_file(&mut self, file: &FileRecord, dataset_id: i64) {
        let (subject, _) = self.new_entity(EntityKind::File, "File");
        self.add_int(&subject, "file_id", file.id);
        self.add_int(&subject, "dataset_id", Some(dataset_id));
        self.add_str(&subject, "name", file.name.as_deref());
        self.add_int(&subject, "size", file.size);
        self.add_bool(&subject, "is_link_only", file.is_link_only);
        self.add_str(&subject, "download_url", file.download_url.as_deref());
        self.add_str(&subject, "supplied_md5", file.supplied_md5.as_deref());
        self.add_str(&subject, "computed_md5", file.computed_md5.as_deref());
        self.add_str(&subject, "viewer_type", file.viewer_type.as_deref());
        self.add_str(&subject, "preview_state", file.preview_state.as_deref());
        self.add_str(&subject, "status", file.status.as_deref());
        self.add_str(&subject, "upload_url", file.upload_url.as_deref());
        self.add_str(&subject, "upload_token", file.upload_token.as_deref());
    }

    fn insert_custom_field(&mut self, field: &CustomField, parent_column: &str, parent_id: i64) {
        let (subject, _) = self.new_entity(EntityKind::CustomField, "CustomField");
        self.add_int(&subject, parent_column, Some(parent_id));
        self.add_str(&subject, "name", field.name.as_deref());
        self.add_str(&subject, "field_type", field.field_type.as_deref());
        match &field.value {
            Some(Value::Array(values)) => {
                for value in values {
                    self.add_custom_value(&subject, value);
                }
            }
            Some(value) => self.add_custom_value(&subject, value),
            None => {}
        }
        if let Some(settings) = &field.settings {
            if let Some(default_value) = &settings.default_value {
                self.add_str(&subject, "default", Some(&scalar_to_string(default_value)));
            }
            for option in &settings.options {
                self.add_str(&subject, "options", Some(option));
            }
            self.add_bool(&subject, "is_multiple", settings.is_multiple);
            if let Some(validations) = &settings.validations {
                self.add_int(&subject, "min_length", validations.min_length);
                self.add_int(&subject, "max_length", validations.max_length);
            }
        }
    }

    fn add_custom_value(&mut self, subject: &Subject, value: &Value) {
        if value.is_null() {
            return;
        }
        self.add_str(subject, "value", Some(&scalar_to_string(value)));
    }

    fn insert_funding(&mut self, funding: &Funding, parent_column: &str, parent_id: i64) {
        let (subject, _) = self.new_entity(EntityKind::Funding, "Funding");
        self.add_int(&subject, parent_column, Some(parent_id));
        self.add_int(&subject, "funding_id", funding.id);
        self.add_str(&subject, "title", funding.title.as_deref());
        self.add_str(&subject, "grant_code", funding.grant_code.as_deref());
        self.add_str(&subject, "funder_name", funding.funder_name.as_deref());
        self.add_int(&subject, "is_user_defined", funding.is_user_defined);
        self.add_str(&subject, "url", funding.url.as_deref());
    }

    fn insert_private_link(&mut self, link: &PrivateLink, parent_column: &str, parent_id: i64) {
        let (subject, _) = self.new_entity(EntityKind::PrivateLink, "PrivateLink");
        self.add_int(&subject, parent_column, Some(parent_id));
        self.add_str(&subject, "link_id", link.id.as_deref());
        self.add_int(&subject, "is_active", link.is_active);
        self.add_timestamp(&subject, "expires_date", link.expires_date.as_deref());
    }

    pub fn insert_group(&mut self, group: &Group) -> Result<i64, GraphError> {
        let upstream_id = group.id.ok_or(GraphError::MissingId("group"))?;
        let (subject, internal_id) = self.new_entity(EntityKind::Group, "InstitutionGroup");
        self.add_int(&subject, "group_id", Some(upstream_id));
        self.add_int(&subject, "parent_id", group.parent_id);
        self.add_str(&subject, "name", group.name.as_deref());
        self.add_str(
            &subject,
            "association_criteria",
            group.association_criteria.as_deref(),
        );
        self.add_str(&subject, "resource_id", group.resource_id.as_deref());
        Ok(internal_id)
    }

    /// Emits one day row per date that any breakdown mentions,
    /// plus one totals row. An unavailable block emits nothing.
    pub fn insert_statistics(&mut self, item_type: ItemType, item_id: i64, stats: &Statistics) {
        if stats.is_unavailable() {
            return;
        }
        let mut dates = BTreeSet::new();
        for days in [&stats.views, &stats.downloads, &stats.shares]
            .into_iter()
            .flatten()
        {
            dates.extend(days.keys().cloned());
        }
        for date in dates {
            let views = stats.views.as_ref().and_then(|days| days.get(&date)).copied();
            let downloads = stats
                .downloads
                .as_ref()
                .and_then(|days| days.get(&date))
                .copied();
            let shares = stats
                .shares
                .as_ref()
                .and_then(|days| days.get(&date))
                .copied();
            let row = self.new_row("Statistics");
            self.add_int(&row, "item_id", Some(item_id));
            self.add_str(&row, "item_type", Some(item_type.as_str()));
            self.add_str(&row, "date", Some(&date));
            self.add_int(&row, "views", views);
            self.add_int(&row, "downloads", downloads);
            self.add_int(&row, "shares", shares);
        }
        if let Some(totals) = &stats.totals {
            let row = self.new_row("StatisticsTotal");
            self.add_int(&row, "item_id", Some(item_id));
            self.add_str(&row, "item_type", Some(item_type.as_str()));
            self.add_int(&row, "views", totals.views);
            self.add_int(&row, "downloads", totals.downloads);
            self.add_int(&row, "shares", totals.shares);
            self.add_int(&row, "cites", totals.cites);
        }
    }

    /// The SPARQL 1.1 Update form of this snapshot.
    #[must_use]
    pub fn insert_query(&self) -> String {
        let mut body = String::new();
        for quad in &self.quads {
            body.push_str(&format!(
                "{} {} {} .\n",
                quad.subject, quad.predicate, quad.object
            ));
        }
        format!("INSERT {{ GRAPH {} {{\n{body}}} }}", self.graph)
    }

    /// Persists the snapshot as one N-Quads file
    /// in `directory`, returning its path.
    pub fn write_to_directory(&self, directory: &Path) -> Result<PathBuf, GraphError> {
        std::fs::create_dir_all(directory)?;
        let file_name = format!(
            "snapshot_{}.nq",
            Utc::now().format("%Y-%m-%d_%H%M%S")
        );
        let path = directory.join(file_name);
        let writer = BufWriter::new(File::create(&path)?);
        let mut serializer = RdfSerializer::from_format(RdfFormat::NQuads).for_writer(writer);
        for quad in &self.quads {
            serializer.serialize_quad(quad)?;
        }
        serializer.finish()?;
        tracing::info!("Serialised {} triples to '{}'.", self.len(), path.display());
        Ok(path)
    }
}

/// Renders a scalar JSON value the way it would appear
/// in a column cell; strings stay bare (unquoted).
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{DayCounts, Totals};

    const GRAPH_IRI: &str = "https://data.4tu.nl/portal/self-test";

    fn graph() -> SnapshotGraph {
        SnapshotGraph::new(GRAPH_IRI, Arc::new(IdGenerator::new())).expect("invalid graph IRI")
    }

    fn predicate_count(graph: &SnapshotGraph, field: &str) -> usize {
        let predicate = column(field);
        graph
            .quads()
            .iter()
            .filter(|quad| quad.predicate == predicate)
            .count()
    }

    fn subjects_of_class(graph: &SnapshotGraph, class: &str) -> usize {
        let class = Term::from(class_iri(class));
        graph
            .quads()
            .iter()
            .filter(|quad| quad.predicate == rdf::TYPE.into_owned() && quad.object == class)
            .count()
    }

    fn dataset_record(dataset_id: i64, author_id: i64) -> DatasetRecord {
        DatasetRecord {
            dataset: Dataset {
                id: Some(dataset_id),
                title: Some(format!("Dataset {dataset_id}")),
                ..Dataset::default()
            },
            authors: vec![Author {
                id: Some(author_id),
                full_name: Some("A. Author".to_owned()),
                ..Author::default()
            }],
            private_links: Vec::new(),
            versions: Vec::new(),
            statistics: Statistics::unavailable(),
        }
    }

    #[test]
    fn null_fields_emit_no_triples() {
        let mut graph = graph();
        let account = Account {
            id: Some(42),
            email: Some("someone@example.org".to_owned()),
            ..Account::default()
        };
        graph.insert_account(&account).expect("insert failed");
        assert_eq!(predicate_count(&graph, "email"), 1);
        assert_eq!(predicate_count(&graph, "first_name"), 0);
        assert_eq!(predicate_count(&graph, "quota"), 0);
        assert_eq!(subjects_of_class(&graph, "Account"), 1);
    }

    #[test]
    fn account_without_id_is_rejected() {
        let mut graph = graph();
        let err = graph
            .insert_account(&Account::default())
            .expect_err("missing id accepted");
        assert!(matches!(err, GraphError::MissingId("account")));
        assert!(graph.is_empty());
    }

    #[test]
    fn shared_authors_are_deduplicated() {
        let mut graph = graph();
        graph
            .insert_dataset(&dataset_record(100, 900))
            .expect("insert failed");
        graph
            .insert_dataset(&dataset_record(101, 900))
            .expect("insert failed");
        assert_eq!(subjects_of_class(&graph, "Author"), 1);
        assert_eq!(subjects_of_class(&graph, "DatasetAuthor"), 2);
        assert_eq!(subjects_of_class(&graph, "Dataset"), 2);
    }

    #[test]
    fn timeline_and_license_are_linked_by_id() {
        let mut graph = graph();
        let mut record = dataset_record(100, 900);
        record.dataset.license = Some(License {
            value: Some(1),
            name: Some("CC0".to_owned()),
            url: None,
        });
        record.dataset.timeline = Some(Timeline {
            posted: Some("2021-03-01T09:00:00Z".to_owned()),
            ..Timeline::default()
        });
        graph.insert_dataset(&record).expect("insert failed");
        assert_eq!(predicate_count(&graph, "timeline_id"), 1);
        assert_eq!(predicate_count(&graph, "license_id"), 2); // dataset ref + license row
        assert_eq!(subjects_of_class(&graph, "Timeline"), 1);
        assert_eq!(subjects_of_class(&graph, "License"), 1);
    }

    #[test]
    fn version_rows_carry_their_marking() {
        let mut graph = graph();
        let mut record = dataset_record(100, 900);
        let mut old = Dataset {
            id: Some(100),
            version: Some(1),
            ..Dataset::default()
        };
        old.mark_version(Some(7));
        record.versions.push(old);
        record.dataset.mark_current(Some(7));
        graph.insert_dataset(&record).expect("insert failed");
        assert_eq!(subjects_of_class(&graph, "Dataset"), 2);
        // The current record has no version triple, the old one has.
        assert_eq!(predicate_count(&graph, "version"), 1);
        assert_eq!(predicate_count(&graph, "is_latest"), 2);
    }

    #[test]
    fn files_are_rows_linked_to_their_dataset() {
        let mut graph = graph();
        let mut record = dataset_record(100, 900);
        record.dataset.files.push(crate::model::file::FileRecord {
            id: Some(1),
            name: Some("data.nc".to_owned()),
            size: Some(2_500_000_000),
            download_url: Some(
                "https://opendap.example.org/thredds/catalog/catalog.html".to_owned(),
            ),
            ..crate::model::file::FileRecord::default()
        });
        let dataset_id = graph.insert_dataset(&record).expect("insert failed");
        assert_eq!(subjects_of_class(&graph, "File"), 1);
        let size = column("size");
        let size_value = Term::from(Literal::from(2_500_000_000_i64));
        assert!(graph
            .quads()
            .iter()
            .any(|quad| quad.predicate == size && quad.object == size_value));
        // The file row references the dataset by its internal id.
        let parent = column("dataset_id");
        let parent_value = Term::from(Literal::from(dataset_id));
        assert!(graph
            .quads()
            .iter()
            .any(|quad| quad.predicate == parent && quad.object == parent_value));
    }

    #[test]
    fn statistics_days_merge_across_metrics() {
        let mut graph = graph();
        let stats = Statistics {
            views: Some(DayCounts::from([
                ("2020-07-01".to_owned(), 3),
                ("2020-07-02".to_owned(), 1),
            ])),
            downloads: Some(DayCounts::from([("2020-07-02".to_owned(), 2)])),
            shares: None,
            totals: Some(Totals {
                views: Some(4),
                downloads: Some(2),
                shares: None,
                cites: None,
            }),
        };
        graph.insert_statistics(ItemType::Article, 100, &stats);
        assert_eq!(subjects_of_class(&graph, "Statistics"), 2);
        assert_eq!(subjects_of_class(&graph, "StatisticsTotal"), 1);
        assert_eq!(predicate_count(&graph, "downloads"), 2); // one day row + totals
    }

    #[test]
    fn unavailable_statistics_emit_nothing() {
        let mut graph = graph();
        graph.insert_statistics(ItemType::Collection, 7, &Statistics::unavailable());
        assert!(graph.is_empty());
    }

    #[test]
    fn insert_query_wraps_the_named_graph() {
        let mut graph = graph();
        graph
            .insert_account(&Account {
                id: Some(1),
                ..Account::default()
            })
            .expect("insert failed");
        let query = graph.insert_query();
        assert!(query.starts_with(&format!("INSERT {{ GRAPH <{GRAPH_IRI}> {{\n")));
        assert!(query.ends_with("} }"));
        assert_eq!(query.matches(" .\n").count(), graph.len());
    }

    #[test]
    fn snapshot_round_trips_to_disk() {
        let mut graph = graph();
        graph
            .insert_account(&Account {
                id: Some(1),
                email: Some("someone@example.org".to_owned()),
                ..Account::default()
            })
            .expect("insert failed");
        let directory = tempfile::tempdir().expect("no tempdir");
        let path = graph
            .write_to_directory(directory.path())
            .expect("serialisation failed");
        let contents = std::fs::read_to_string(&path).expect("snapshot unreadable");
        assert_eq!(contents.lines().count(), graph.len());
        assert!(contents.contains(GRAPH_IRI));
        assert!(contents.contains("someone@example.org"));
    }
}
