// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Thin request layer over the upstream JSON API:
//! header composition, uniform error reporting,
//! and the shape-tagged result of detail fetches.

use crate::settings::Settings;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// No retries by default:
/// a re-issued page fetch would require de-duplication downstream.
const DEFAULT_RETRIES: u32 = 0;
const DEFAULT_TIMEOUT: u64 = 30_000;

/// Thrown while fetching or decoding upstream data.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network/Internet download failed: '{0}'")]
    Download(#[from] reqwest::Error),
    #[error("Network/Internet download failed: '{0}'")]
    DownloadMiddleware(#[from] reqwest_middleware::Error),
    #[error("GET {path} returned HTTP status {status}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("Failed to deserialize a fetched JSON result to our Rust model of the expected type: {0}")]
    DeserializeFailed(#[source] serde_json::Error, String),
    #[error("Expected a JSON list from {0}, got something else")]
    UnexpectedShape(String),
    #[error("Statistics credential is missing")]
    StatsAuthMissing,
    #[error("Invalid HTTP header value: {0}")]
    InvalidHeader(#[from] header::InvalidHeaderValue),
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Failed to parse catalogue XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Result of dereferencing a single record.
///
/// The upstream answers the same endpoint with a JSON object on
/// success and a JSON *array* for "not found", so absence is a
/// regular outcome, distinct from transport errors.
#[derive(Debug)]
pub enum Fetched<T> {
    Found(T),
    NotFound,
}

/// Creates a new [`reqwest::Client`] with the supplied retry and
/// timeout settings.
fn create_downloader(
    retries: u32,
    timeout: u64,
    headers: HeaderMap,
) -> Result<ClientWithMiddleware, Error> {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(retries);
    let client = Client::builder()
        .timeout(Duration::from_millis(timeout))
        .default_headers(headers)
        .build()?;
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// The default header set of every API call.
/// The bearer token is marked sensitive.
fn create_headers(token: &str, user_agent: &str) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::USER_AGENT, HeaderValue::from_str(user_agent)?);
    let mut auth_value = HeaderValue::from_str(&format!("token {token}"))?;
    auth_value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, auth_value);
    Ok(headers)
}

/// A stateless client for the upstream API and its statistics host.
/// Auth strings are immutable after construction.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Arc<ClientWithMiddleware>,
    base_url: Url,
    stats_base_url: Url,
    stats_tenant: String,
    stats_auth: Option<HeaderValue>,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, Error> {
        let headers = create_headers(&settings.token, &settings.user_agent)?;
        let http = Arc::new(create_downloader(
            settings.retries.unwrap_or(DEFAULT_RETRIES),
            settings.timeout.unwrap_or(DEFAULT_TIMEOUT),
            headers,
        )?);
        let stats_auth = settings
            .stats_auth
            .as_deref()
            .map(|credential| {
                let mut value =
                    HeaderValue::from_str(&crate::tools::basic_auth_value(credential))?;
                value.set_sensitive(true);
                Ok::<HeaderValue, Error>(value)
            })
            .transpose()?;
        Ok(Self {
            http,
            base_url: Url::parse(&settings.base_url)?,
            stats_base_url: Url::parse(&settings.stats_base_url)?,
            stats_tenant: settings.stats_tenant.clone(),
            stats_auth,
        })
    }

    fn endpoint(base_url: &Url, path: &str) -> Result<Url, Error> {
        let base = base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{base}/{}",
            path.trim_start_matches('/')
        ))?)
    }

    /// Executes a GET against the configured base URL and decodes the
    /// body as JSON. Non-200 responses are reported as [`Error::Status`]
    /// after logging status, parameters and body.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, Error> {
        let url = Self::endpoint(&self.base_url, path)?;
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                "GET {path} failed with status {status}; params: {params:?}; body: {body}"
            );
            return Err(Error::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }

    /// Fetches a paginated listing page (or any other list-shaped
    /// endpoint) and yields its records.
    ///
    /// Any failure (transport, status, or shape) is logged and
    /// reported as an empty list, so callers can only distinguish
    /// "no items" from "error" via the log. This mirrors the upstream
    /// contract and keeps a failed page from aborting a sweep.
    pub async fn get_records(&self, path: &str, params: &[(&str, String)]) -> Vec<Value> {
        match self.get(path, params).await {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                tracing::error!(
                    "GET {path} returned a non-list JSON value where a listing was expected: {other}"
                );
                Vec::new()
            }
            // Status and transport problems were already logged in get().
            Err(_) => Vec::new(),
        }
    }

    /// Dereferences a single record.
    /// A JSON array in the response body is the upstream's
    /// "not found" idiom and maps to [`Fetched::NotFound`].
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Fetched<T>, Error> {
        let value = self.get(path, params).await?;
        if value.is_array() {
            return Ok(Fetched::NotFound);
        }
        let record = serde_json::from_value::<T>(value.clone())
            .map_err(|err| Error::DeserializeFailed(err, value.to_string()))?;
        Ok(Fetched::Found(record))
    }

    /// Fetches a list-shaped endpoint into typed records.
    pub async fn fetch_list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, Error> {
        let value = self.get(path, params).await?;
        let Value::Array(items) = value else {
            return Err(Error::UnexpectedShape(path.to_owned()));
        };
        items
            .into_iter()
            .map(|item| {
                let rendered = item.to_string();
                serde_json::from_value::<T>(item)
                    .map_err(|err| Error::DeserializeFailed(err, rendered))
            })
            .collect()
    }

    /// Same as [`Self::get`], but against the statistics host,
    /// with Basic authentication.
    pub async fn get_stats(&self, path: &str, params: &[(&str, String)]) -> Result<Value, Error> {
        let Some(auth) = &self.stats_auth else {
            return Err(Error::StatsAuthMissing);
        };
        let url = Self::endpoint(&self.stats_base_url, path)?;
        let response = self
            .http
            .get(url)
            .header(header::AUTHORIZATION, auth.clone())
            .query(params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                "GET {path} (statistics) failed with status {status}; params: {params:?}; body: {body}"
            );
            return Err(Error::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }

    /// The tenant prefix of the statistics breakdown endpoints.
    #[must_use]
    pub fn stats_tenant(&self) -> &str {
        &self.stats_tenant
    }

    /// Fetches a raw body as text; used by the THREDDS catalogue walk.
    pub async fn get_text(&self, url: &str) -> Result<String, Error> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("GET {url} failed with status {status}; body: {body}");
            return Err(Error::Status {
                path: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dataset::Dataset;

    #[test]
    fn endpoints_keep_the_base_path() {
        let base = Url::parse("https://api.figshare.com/v2").expect("bad base URL");
        let url = ApiClient::endpoint(&base, "/account/articles").expect("bad endpoint");
        assert_eq!(url.as_str(), "https://api.figshare.com/v2/account/articles");
        let trailing = Url::parse("https://api.example.org/v2/").expect("bad base URL");
        let versions_url =
            ApiClient::endpoint(&trailing, "articles/100/versions").expect("bad endpoint");
        assert_eq!(
            versions_url.as_str(),
            "https://api.example.org/v2/articles/100/versions"
        );
    }

    #[test]
    fn not_found_is_an_array_body() {
        // The upstream's "not found" idiom: a list where an object is expected.
        let value: Value = serde_json::from_str("[]").expect("invalid JSON");
        assert!(value.is_array());
        let object: Value =
            serde_json::from_str(r#"{"id": 1}"#).expect("invalid JSON");
        assert!(!object.is_array());
    }

    #[test]
    fn deserialize_failure_carries_the_body() {
        let value: Value = serde_json::from_str(r#"{"id": "not-a-number"}"#).expect("invalid JSON");
        let rendered = value.to_string();
        let res = serde_json::from_value::<Dataset>(value)
            .map_err(|err| Error::DeserializeFailed(err, rendered));
        let err = res.expect_err("should not deserialize");
        assert!(err.to_string().contains("deserialize"));
    }
}
