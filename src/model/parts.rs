// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sub-records shared between datasets and collections:
//! licenses, timelines, categories, funding, custom fields,
//! private links and version listings.

use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct License {
    pub value: Option<i64>,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// Publication timeline of a dataset or collection.
/// All values are upstream date strings.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Timeline {
    pub submission: Option<String>,
    pub revision: Option<String>,
    #[serde(rename = "firstOnline")]
    pub first_online: Option<String>,
    pub posted: Option<String>,
    #[serde(rename = "publisherAcceptance")]
    pub publisher_acceptance: Option<String>,
    #[serde(rename = "publisherPublication")]
    pub publisher_publication: Option<String>,
}

impl Timeline {
    /// `true` when the upstream sent the object but left every field out.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.submission.is_none()
            && self.revision.is_none()
            && self.first_online.is_none()
            && self.posted.is_none()
            && self.publisher_acceptance.is_none()
            && self.publisher_publication.is_none()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Category {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub parent_id: Option<i64>,
    pub source_id: Option<String>,
    pub taxonomy_id: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Funding {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub grant_code: Option<String>,
    pub funder_name: Option<String>,
    pub is_user_defined: Option<i64>,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CustomFieldValidations {
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CustomFieldSettings {
    #[serde(rename = "default")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub options: Vec<String>,
    pub is_multiple: Option<bool>,
    pub validations: Option<CustomFieldValidations>,
}

/// An institution-defined metadata field.
/// The value is either a single scalar or a list,
/// depending on the field's multiplicity.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CustomField {
    pub name: Option<String>,
    pub value: Option<Value>,
    pub field_type: Option<String>,
    pub settings: Option<CustomFieldSettings>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PrivateLink {
    pub id: Option<String>,
    pub is_active: Option<i64>,
    pub expires_date: Option<String>,
}

/// One entry of a `/…/{id}/versions` listing.
#[derive(Deserialize, Debug, Clone)]
pub struct VersionInfo {
    pub version: i64,
    pub url: Option<String>,
}
