// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod account;
pub mod author;
pub mod collection;
pub mod dataset;
pub mod file;
pub mod group;
pub mod parts;

use serde::Deserialize;

/// The one field of a paginated listing entry
/// that every enrichment step dereferences.
#[derive(Deserialize, Debug, Clone)]
pub struct Summary {
    pub id: Option<i64>,
}
