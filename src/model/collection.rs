// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::author::Author;
use super::parts::{Category, CustomField, Funding, Timeline};
use serde::Deserialize;

/// A collection of datasets, in the full form returned by
/// `/account/collections/{id}` and the public version endpoints.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Collection {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub doi: Option<String>,
    pub handle: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub group_id: Option<i64>,
    pub institution_id: Option<i64>,
    pub resource_id: Option<String>,
    pub resource_doi: Option<String>,
    pub resource_title: Option<String>,
    pub resource_link: Option<String>,
    pub resource_version: Option<i64>,
    pub version: Option<i64>,
    pub public: Option<i64>,
    pub citation: Option<String>,
    pub articles_count: Option<i64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
    pub published_date: Option<String>,
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
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub funding_list: Vec<Funding>,

    /// Attached during enrichment, never sent by the upstream.
    #[serde(skip)]
    pub account_id: Option<i64>,
    #[serde(skip)]
    pub is_latest: Option<i64>,
    #[serde(skip)]
    pub is_editable: Option<i64>,
}

impl Collection {
    pub fn mark_current(&mut self, account_id: Option<i64>) {
        self.account_id = account_id;
        self.is_latest = Some(1);
        self.is_editable = Some(1);
        self.version = None;
    }

    pub fn mark_version(&mut self, account_id: Option<i64>) {
        self.account_id = account_id;
        self.is_latest = Some(0);
        self.is_editable = Some(0);
    }
}
