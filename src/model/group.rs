// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Deserialize;

/// An institutional group, as listed by `/account/institution/groups`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Group {
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub name: Option<String>,
    pub association_criteria: Option<String>,
    pub resource_id: Option<String>,
}
