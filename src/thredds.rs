// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Computes the total byte size of an OPeNDAP THREDDS catalogue
//! by walking its (possibly nested) catalogue XML.
//!
//! The upstream reports a size of 0 for such holdings;
//! the real number only exists spread over `dataSize` elements.

use crate::client::{ApiClient, Error};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use std::collections::{HashSet, VecDeque};

pub const THREDDS_NS: &str = "http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0";

/// Multiplier for a `dataSize` unit suffix.
/// Unknown units count as plain bytes.
#[must_use]
pub fn unit_factor(units: &str) -> u64 {
    match units {
        "Kbytes" => 1_000,
        "Mbytes" => 1_000_000,
        "Gbytes" => 1_000_000_000,
        "Tbytes" => 1_000_000_000_000,
        "Pbytes" => 1_000_000_000_000_000,
        _ => 1,
    }
}

/// Turns a catalogue's HTML page URL into its XML form.
#[must_use]
pub fn catalog_xml_url(html_url: &str) -> String {
    html_url.strip_suffix(".html").map_or_else(
        || html_url.to_owned(),
        |base| format!("{base}.xml"),
    )
}

/// Forms a sub-catalogue URL by replacing the final `catalog.xml`
/// of the parent URL with the reference's `xlink:href` value.
#[must_use]
pub fn sub_catalog_url(parent_url: &str, href: &str) -> String {
    parent_url.strip_suffix("catalog.xml").map_or_else(
        || href.to_owned(),
        |base| format!("{base}{href}"),
    )
}

/// What a single catalogue document contributes:
/// its own summed-up `dataSize` bytes,
/// plus the `xlink:href`s of its child catalogues.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedCatalog {
    pub size: u64,
    pub refs: Vec<String>,
}

/// Extracts sizes and child references from one catalogue XML
/// document, considering only elements in the InvCatalog namespace.
pub fn parse_catalog(xml: &str) -> Result<ParsedCatalog, Error> {
    let mut reader = NsReader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text_start = true;
    config.trim_text_end = true;

    let mut parsed = ParsedCatalog::default();
    let mut pending_units: Option<String> = None;
    loop {
        match reader.read_resolved_event()? {
            (ResolveResult::Bound(ns), Event::Start(element))
                if ns.as_ref() == THREDDS_NS.as_bytes() =>
            {
                match element.local_name().as_ref() {
                    // The size itself is the element's text content.
                    b"dataSize" => {
                        pending_units = Some(
                            element
                                .attributes()
                                .flatten()
                                .find(|attr| attr.key.local_name().as_ref() == b"units")
                                .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
                                .unwrap_or_default(),
                        );
                    }
                    b"catalogRef" => push_href(&element, &mut parsed.refs),
                    _ => {}
                }
            }
            (ResolveResult::Bound(ns), Event::Empty(element))
                if ns.as_ref() == THREDDS_NS.as_bytes() =>
            {
                if element.local_name().as_ref() == b"catalogRef" {
                    push_href(&element, &mut parsed.refs);
                }
            }
            (_, Event::Text(text)) => {
                if let Some(units) = pending_units.take() {
                    let raw = text.unescape()?;
                    match raw.trim().parse::<u64>() {
                        Ok(count) => parsed.size += count * unit_factor(&units),
                        Err(_) => {
                            tracing::warn!("Ignoring non-integer dataSize value: '{raw}'");
                        }
                    }
                }
            }
            (_, Event::End(_)) => {
                pending_units = None;
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }
    Ok(parsed)
}

fn push_href(element: &quick_xml::events::BytesStart<'_>, refs: &mut Vec<String>) {
    if let Some(href) = element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"href")
    {
        refs.push(String::from_utf8_lossy(&href.value).into_owned());
    }
}

/// Fetches catalogue documents by URL.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

#[async_trait]
impl CatalogFetcher for ApiClient {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        self.get_text(url).await
    }
}

/// Walks a catalogue tree iteratively (explicit work queue,
/// visited-URL set) and sums up all discovered byte sizes.
#[derive(Debug)]
pub struct SizeResolver<F> {
    fetcher: F,
}

impl<F: CatalogFetcher> SizeResolver<F> {
    pub const fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Total byte size reachable from the catalogue
    /// whose HTML page is at `html_url`.
    pub async fn total_size(&self, html_url: &str) -> Result<u64, Error> {
        let mut total = 0;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([catalog_xml_url(html_url)]);
        while let Some(url) = queue.pop_front() {
            if !visited.insert(url.clone()) {
                continue;
            }
            let xml = self.fetcher.fetch(&url).await?;
            let parsed = parse_catalog(&xml)?;
            total += parsed.size;
            for href in parsed.refs {
                queue.push_back(sub_catalog_url(&url, &href));
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NS_DECL: &str =
        r#"xmlns="http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0" xmlns:xlink="http://www.w3.org/1999/xlink""#;

    struct MapFetcher {
        catalogs: HashMap<String, String>,
    }

    #[async_trait]
    impl CatalogFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String, Error> {
            self.catalogs.get(url).cloned().ok_or_else(|| Error::Status {
                path: url.to_owned(),
                status: 404,
                body: String::new(),
            })
        }
    }

    #[test]
    fn unit_factors() {
        assert_eq!(unit_factor("Kbytes"), 1_000);
        assert_eq!(unit_factor("Mbytes"), 1_000_000);
        assert_eq!(unit_factor("Gbytes"), 1_000_000_000);
        assert_eq!(unit_factor("Tbytes"), 1_000_000_000_000);
        assert_eq!(unit_factor("Pbytes"), 1_000_000_000_000_000);
        assert_eq!(unit_factor("bytes"), 1);
        assert_eq!(unit_factor(""), 1);
    }

    #[test]
    fn url_rewriting() {
        assert_eq!(
            catalog_xml_url("https://opendap.example.org/thredds/catalog/x/catalog.html"),
            "https://opendap.example.org/thredds/catalog/x/catalog.xml"
        );
        assert_eq!(
            sub_catalog_url(
                "https://opendap.example.org/thredds/catalog/x/catalog.xml",
                "sub/catalog.xml"
            ),
            "https://opendap.example.org/thredds/catalog/x/sub/catalog.xml"
        );
    }

    #[test]
    fn sizes_outside_the_invcatalog_namespace_are_ignored() {
        let xml = format!(
            r#"<?xml version="1.0"?>
            <catalog {NS_DECL} xmlns:other="https://example.org/other">
              <dataset><dataSize units="Kbytes">5</dataSize></dataset>
              <other:dataSize units="Gbytes">9</other:dataSize>
            </catalog>"#
        );
        let parsed = parse_catalog(&xml).expect("parse failed");
        assert_eq!(parsed.size, 5_000);
        assert!(parsed.refs.is_empty());
    }

    #[tokio::test]
    async fn sums_across_nested_catalogues() {
        // A dataSize of 3 Mbytes, plus one child catalogue of 2 Gbytes.
        let root = format!(
            r#"<?xml version="1.0"?>
            <catalog {NS_DECL}>
              <dataset>
                <dataSize units="Mbytes">3</dataSize>
                <catalogRef xlink:href="child/catalog.xml" xlink:title="child"/>
              </dataset>
            </catalog>"#
        );
        let child = format!(
            r#"<?xml version="1.0"?>
            <catalog {NS_DECL}>
              <dataset><dataSize units="Gbytes">2</dataSize></dataset>
            </catalog>"#
        );
        let fetcher = MapFetcher {
            catalogs: HashMap::from([
                (
                    "https://opendap.example.org/thredds/catalog/catalog.xml".to_owned(),
                    root,
                ),
                (
                    "https://opendap.example.org/thredds/catalog/child/catalog.xml".to_owned(),
                    child,
                ),
            ]),
        };
        let resolver = SizeResolver::new(fetcher);
        let total = resolver
            .total_size("https://opendap.example.org/thredds/catalog/catalog.html")
            .await
            .expect("resolution failed");
        assert_eq!(total, 2_003_000_000);
    }

    #[tokio::test]
    async fn sums_two_sizes_within_one_catalogue() {
        let root = format!(
            r#"<?xml version="1.0"?>
            <catalog {NS_DECL}>
              <dataset>
                <dataSize units="Mbytes">500</dataSize>
                <dataSize units="Gbytes">2</dataSize>
              </dataset>
            </catalog>"#
        );
        let fetcher = MapFetcher {
            catalogs: HashMap::from([(
                "https://opendap.example.org/thredds/catalog.xml".to_owned(),
                root,
            )]),
        };
        let resolver = SizeResolver::new(fetcher);
        let total = resolver
            .total_size("https://opendap.example.org/thredds/catalog.html")
            .await
            .expect("resolution failed");
        assert_eq!(total, 2_500_000_000);
    }

    #[tokio::test]
    async fn already_visited_catalogues_are_not_fetched_again() {
        // The root references itself and its child;
        // the child references the root again.
        // Without the visited set this would never terminate.
        let root = format!(
            r#"<catalog {NS_DECL}>
              <dataset>
                <dataSize units="Kbytes">1</dataSize>
                <catalogRef xlink:href="catalog.xml"/>
                <catalogRef xlink:href="sub/catalog.xml"/>
              </dataset>
            </catalog>"#
        );
        let child = format!(
            r#"<catalog {NS_DECL}>
              <dataset>
                <dataSize units="Kbytes">2</dataSize>
              </dataset>
            </catalog>"#
        );
        let fetcher = MapFetcher {
            catalogs: HashMap::from([
                ("https://x.example.org/thredds/catalog.xml".to_owned(), root),
                (
                    "https://x.example.org/thredds/sub/catalog.xml".to_owned(),
                    child,
                ),
            ]),
        };
        let resolver = SizeResolver::new(fetcher);
        let total = resolver
            .total_size("https://x.example.org/thredds/catalog.html")
            .await
            .expect("resolution failed");
        assert_eq!(total, 3_000);
    }
}
