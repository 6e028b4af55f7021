// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Deserialize;

/// An author, both in the stub form embedded in dataset
/// and collection details and in the full form returned by
/// `/account/authors/{id}`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Author {
    pub id: Option<i64>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub url_name: Option<String>,
    pub orcid_id: Option<String>,
    pub job_title: Option<String>,
    pub is_active: Option<i64>,
    pub is_public: Option<i64>,
}
