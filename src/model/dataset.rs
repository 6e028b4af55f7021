// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::author::Author;
use super::file::FileRecord;
use super::parts::{Category, CustomField, Funding, License, Timeline};
use serde::Deserialize;

/// A dataset ("article" in the upstream contract),
/// in the full form returned by the detail endpoints.
///
/// Listing entries deserialize into the same type;
/// fields missing from the summary simply stay `None`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Dataset {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub doi: Option<String>,
    pub handle: Option<String>,
    pub url: Option<String>,
    pub url_public_html: Option<String>,
    pub url_public_api: Option<String>,
    pub url_private_html: Option<String>,
    pub url_private_api: Option<String>,
    pub description: Option<String>,
    pub defined_type: Option<i64>,
    pub defined_type_name: Option<String>,
    pub group_id: Option<i64>,
    pub size: Option<i64>,
    pub status: Option<String>,
    pub version: Option<i64>,
    pub thumb: Option<String>,
    pub citation: Option<String>,
    pub resource_doi: Option<String>,
    pub resource_title: Option<String>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub published_date: Option<String>,
    pub is_public: Option<bool>,
    pub is_embargoed: Option<bool>,
    pub is_confidential: Option<bool>,
    pub is_metadata_record: Option<bool>,
    pub metadata_reason: Option<String>,
    pub confidential_reason: Option<String>,
    pub embargo_date: Option<String>,
    pub embargo_type: Option<String>,
    pub embargo_title: Option<String>,
    pub embargo_reason: Option<String>,
    pub license: Option<License>,
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub funding_list: Vec<Funding>,

    /// Account the record was fetched on behalf of.
    /// Attached during enrichment, never sent by the upstream.
    #[serde(skip)]
    pub account_id: Option<i64>,
    /// Whether this record is the current one (1) or an old version (0).
    /// Attached during enrichment.
    #[serde(skip)]
    pub is_latest: Option<i64>,
    /// Carried as plain metadata for the re-serving component.
    /// Attached during enrichment.
    #[serde(skip)]
    pub is_editable: Option<i64>,
}

impl Dataset {
    /// Marks this record as the current, editable one.
    ///
    /// The private detail view deliberately resets the version to null;
    /// only the public version records carry a version number.
    pub fn mark_current(&mut self, account_id: Option<i64>) {
        self.account_id = account_id;
        self.is_latest = Some(1);
        self.is_editable = Some(1);
        self.version = None;
    }

    /// Marks this record as a historic, read-only version.
    pub fn mark_version(&mut self, account_id: Option<i64>) {
        self.account_id = account_id;
        self.is_latest = Some(0);
        self.is_editable = Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_record_resets_version() {
        let mut dataset = Dataset {
            id: Some(100),
            version: Some(3),
            ..Dataset::default()
        };
        dataset.mark_current(Some(7));
        assert_eq!(dataset.version, None);
        assert_eq!(dataset.is_latest, Some(1));
        assert_eq!(dataset.is_editable, Some(1));
        assert_eq!(dataset.account_id, Some(7));
    }

    #[test]
    fn version_record_keeps_version() {
        let mut dataset = Dataset {
            id: Some(100),
            version: Some(2),
            ..Dataset::default()
        };
        dataset.mark_version(Some(7));
        assert_eq!(dataset.version, Some(2));
        assert_eq!(dataset.is_latest, Some(0));
        assert_eq!(dataset.is_editable, Some(0));
    }

    #[test]
    fn detail_json_deserializes() {
        let raw = r#"{
            "id": 100,
            "title": "Soil moisture grids",
            "doi": "10.4121/abc",
            "defined_type": 3,
            "is_public": true,
            "size": 1024,
            "version": 3,
            "license": {"value": 1, "name": "CC0", "url": "https://creativecommons.org/publicdomain/zero/1.0/"},
            "timeline": {"posted": "2021-03-01T09:00:00Z", "firstOnline": "2021-03-01T09:00:00Z"},
            "tags": ["soil", "moisture"],
            "authors": [{"id": 900, "full_name": "A. Author"}],
            "files": [{"id": 1, "name": "data.nc", "size": 0,
                       "download_url": "https://opendap.example.org/thredds/catalog.html"}],
            "unknown_future_field": {"ignored": true}
        }"#;
        let dataset: Dataset = serde_json::from_str(raw).expect("deserialization failed");
        assert_eq!(dataset.id, Some(100));
        assert_eq!(dataset.tags.len(), 2);
        assert_eq!(dataset.authors[0].id, Some(900));
        assert_eq!(
            dataset.timeline.as_ref().and_then(|t| t.first_online.as_deref()),
            Some("2021-03-01T09:00:00Z")
        );
        assert!(dataset.files[0].needs_thredds_size());
    }
}
