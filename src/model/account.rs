// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Deserialize;

/// A member account of the institution,
/// as listed by `/account/institution/accounts`.
///
/// The upstream reports quota values in bytes
/// and `active` as a 0/1 integer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Account {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: Option<i64>,
    pub institution_id: Option<i64>,
    pub institution_user_id: Option<String>,
    pub group_id: Option<i64>,
    pub quota: Option<i64>,
    pub used_quota: Option<i64>,
    pub used_quota_private: Option<i64>,
    pub used_quota_public: Option<i64>,
    pub pending_quota_request: Option<bool>,
    pub maximum_file_size: Option<i64>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
}
