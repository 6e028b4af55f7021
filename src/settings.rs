// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use config::{Config, ConfigError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use typed_builder::TypedBuilder;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.figshare.com/v2";
const DEFAULT_STATS_BASE_URL: &str = "https://stats.figshare.com";
const DEFAULT_STATS_TENANT: &str = "4tu";
const DEFAULT_STATE_GRAPH: &str = "https://data.4tu.nl/portal/self-test";
const DEFAULT_OUTPUT_DIRECTORY: &str = "./snapshots";
/// The primary tenant's numeric institution id.
const DEFAULT_INSTITUTION_ID: i64 = 898;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load the basic/low-level configuration data: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_stats_base_url() -> String {
    DEFAULT_STATS_BASE_URL.to_owned()
}

fn default_stats_tenant() -> String {
    DEFAULT_STATS_TENANT.to_owned()
}

fn default_state_graph() -> String {
    DEFAULT_STATE_GRAPH.to_owned()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)
}

const fn default_institution_id() -> i64 {
    DEFAULT_INSTITUTION_ID
}

fn default_user_agent() -> String {
    crate::tools::USER_AGENT.to_owned()
}

/// Everything an operator can configure,
/// loaded from `config.yml` plus `FIGSNAP_`-prefixed
/// environment variables.
#[derive(Deserialize, Debug, Clone, TypedBuilder)]
pub struct Settings {
    /// Institutional API bearer token.
    pub token: String,
    /// Plain `user:pass` credential of the statistics host;
    /// Base64-encoded by the engine.
    /// Without it, all statistics come back null.
    #[serde(default)]
    #[builder(default)]
    pub stats_auth: Option<String>,
    #[serde(default = "default_institution_id")]
    #[builder(default = DEFAULT_INSTITUTION_ID)]
    pub institution_id: i64,
    #[serde(default = "default_base_url")]
    #[builder(default = default_base_url())]
    pub base_url: String,
    #[serde(default = "default_stats_base_url")]
    #[builder(default = default_stats_base_url())]
    pub stats_base_url: String,
    #[serde(default = "default_stats_tenant")]
    #[builder(default = default_stats_tenant())]
    pub stats_tenant: String,
    /// IRI of the named graph the snapshot is written under.
    #[serde(default = "default_state_graph")]
    #[builder(default = default_state_graph())]
    pub state_graph: String,
    #[serde(default = "default_output_directory")]
    #[builder(default = default_output_directory())]
    pub output_directory: PathBuf,
    /// User-agent header sent with every request.
    #[serde(default = "default_user_agent")]
    #[builder(default = default_user_agent())]
    pub user_agent: String,
    /// Workers per sweep/enrichment pool; defaults to the CPU count.
    #[serde(default)]
    #[builder(default)]
    pub parallelism: Option<usize>,
    /// Number of transparent retries per request.
    /// Defaults to 0: a re-issued page fetch would need
    /// de-duplication downstream.
    #[serde(default)]
    #[builder(default)]
    pub retries: Option<u32>,
    /// Total timeout per request in milliseconds (ms)
    #[serde(default)]
    #[builder(default)]
    pub timeout: Option<u64>,
    /// Initial identifier values per entity kind,
    /// e.g. `dataset: 5000`. Counters start at 0 otherwise.
    #[serde(default)]
    #[builder(default)]
    pub initial_ids: HashMap<String, i64>,
}

impl Settings {
    /// The effective fan-out width.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
            .unwrap_or_else(crate::tools::default_parallelism)
    }

    /// Rejects configurations that would only fail
    /// after network calls were already made.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.token.trim().is_empty() {
            return Err(SettingsError::Invalid("'token' must not be empty"));
        }
        if Url::parse(&self.base_url).is_err() {
            return Err(SettingsError::Invalid("'base_url' is not a valid URL"));
        }
        if Url::parse(&self.stats_base_url).is_err() {
            return Err(SettingsError::Invalid(
                "'stats_base_url' is not a valid URL",
            ));
        }
        if oxrdf::NamedNode::new(self.state_graph.as_str()).is_err() {
            return Err(SettingsError::Invalid("'state_graph' is not a valid IRI"));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(SettingsError::Invalid(
                "'output_directory' must not be empty",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SettingsError::Invalid("'user_agent' must not be empty"));
        }
        Ok(())
    }
}

/// # Errors
///
/// - the config loader fails to build
/// - settings failed to load and deserialize
/// - the loaded settings fail validation
pub fn load() -> Result<Settings, SettingsError> {
    let settings_loader = Config::builder()
        // Add in `./config.yml`
        .add_source(config::File::with_name("config.yml"))
        // Add in settings from the environment (with a prefix of FIGSNAP)
        // E.g. `FIGSNAP_TOKEN=abc figsnap` would set the `token` key
        .add_source(config::Environment::with_prefix("FIGSNAP"))
        .build()?;

    let settings = settings_loader.try_deserialize::<Settings>()?;
    settings.validate()?;
    tracing::debug!("{settings:#?}");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_the_documented_defaults() {
        let settings = Settings::builder().token("secret".to_owned()).build();
        assert_eq!(settings.institution_id, 898);
        assert_eq!(settings.base_url, "https://api.figshare.com/v2");
        assert_eq!(settings.stats_tenant, "4tu");
        assert_eq!(settings.state_graph, "https://data.4tu.nl/portal/self-test");
        assert_eq!(settings.output_directory, PathBuf::from("./snapshots"));
        assert!(settings.user_agent.starts_with("figsnap/"));
        assert!(settings.stats_auth.is_none());
        assert!(settings.validate().is_ok());
        assert!(settings.parallelism() >= 1);
    }

    #[test]
    fn empty_tokens_are_rejected_before_any_network_call() {
        let settings = Settings::builder().token("  ".to_owned()).build();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn bad_graph_iris_are_rejected() {
        let settings = Settings::builder()
            .token("secret".to_owned())
            .state_graph("not an iri".to_owned())
            .build();
        assert!(settings.validate().is_err());
    }
}
