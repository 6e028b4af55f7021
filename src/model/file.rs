// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Deserialize;

/// A file attached to a dataset.
///
/// A reported size of 0 together with a download URL that points
/// at an OPeNDAP THREDDS catalogue means the real size has to be
/// computed by walking the catalogue (see [`crate::thredds`]).
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FileRecord {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub size: Option<i64>,
    pub is_link_only: Option<bool>,
    pub download_url: Option<String>,
    pub supplied_md5: Option<String>,
    pub computed_md5: Option<String>,
    pub viewer_type: Option<String>,
    pub preview_state: Option<String>,
    pub status: Option<String>,
    pub upload_url: Option<String>,
    pub upload_token: Option<String>,
}

impl FileRecord {
    /// Whether the upstream failed to report a usable size
    /// and the download URL points at a THREDDS catalogue page.
    #[must_use]
    pub fn needs_thredds_size(&self) -> bool {
        self.size.unwrap_or(0) == 0
            && self.download_url.as_deref().is_some_and(|url| {
                url.contains("/thredds/") && url.ends_with(".html")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thredds_size_is_only_resolved_for_empty_catalogue_files() {
        let mut file = FileRecord {
            size: Some(0),
            download_url: Some(
                "https://opendap.example.org/thredds/catalog/data/catalog.html".to_owned(),
            ),
            ..FileRecord::default()
        };
        assert!(file.needs_thredds_size());

        file.size = Some(42);
        assert!(!file.needs_thredds_size());

        file.size = None;
        file.download_url = Some("https://example.org/files/archive.zip".to_owned());
        assert!(!file.needs_thredds_size());
    }
}
