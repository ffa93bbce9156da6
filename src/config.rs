//! Declarative configuration model loaded from YAML.
//!
//! This is the raw shape of the file as written by the user; YAML anchors
//! and aliases are expanded to value copies by the parser, so the loaded
//! tree is a pure tree. Validation and expression compilation happen in
//! [`crate::compile`].

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::sample::MetricType;

/// Errors that can occur when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Prefix applied to every metric name.
    pub namespace: String,
    /// Label sources evaluated once per scrape and merged into every sample.
    #[serde(default)]
    pub global_labels: Vec<GlobalLabels>,
    /// Upstream endpoints, scraped in declaration order.
    pub endpoints: Vec<Endpoint>,
}

impl Config {
    /// Load a configuration from a YAML file.
    ///
    /// # Parameters
    ///
    /// - `path` - Path to the YAML configuration file
    ///
    /// # Returns
    ///
    /// Returns `Ok(Config)` on success, or `ConfigError` if the file cannot
    /// be read or parsed.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&txt)?)
    }
}

/// A source of scrape-wide labels.
///
/// The URL is fetched like an endpoint; each label value expression is
/// evaluated against the root of the returned JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalLabels {
    /// URL to fetch, relative to the base URL.
    pub url: String,
    /// Labels extracted from the response.
    pub labels: Vec<Label>,
}

/// A label definition: a name and a value expression.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Value expression: a literal, `$N` capture, or `${...}` query.
    pub value: String,
}

/// One upstream endpoint and its metric tree.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    /// Identifier used in diagnostics and the `up` self-metric.
    pub id: Option<String>,
    /// URL template, possibly referencing `url_parts` by `{key}`.
    pub url: String,
    /// Named fragments substituted into the URL template.
    #[serde(default)]
    pub url_parts: UrlParts,
    /// Root metric nodes walked against the endpoint's JSON.
    #[serde(deserialize_with = "metric_list")]
    pub metrics: Vec<Metric>,
}

/// Named URL fragments referenced from an endpoint's URL template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlParts {
    /// Path fragments substituted verbatim.
    #[serde(default)]
    pub paths: HashMap<String, String>,
    /// Query parameters substituted as `name=value`.
    #[serde(default)]
    pub params: HashMap<String, QueryParam>,
}

/// A query parameter fragment.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryParam {
    /// Parameter name as it appears in the query string.
    pub name: String,
    /// Default value; a value-less parameter substitutes the bare name.
    pub value: Option<String>,
}

/// One node of the declarative metric tree.
///
/// A node without children is a leaf and emits samples; inner nodes
/// contribute name segments, labels, types, and modifiers to their
/// descendants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metric {
    /// Path expression selecting nodes below the current JSON node; empty
    /// means "stay here".
    #[serde(default)]
    pub path: String,
    /// Metric name segment; defaults to the last path component.
    pub name: Option<String>,
    /// Family type, inherited by descendants.
    #[serde(rename = "type")]
    pub metric_type: Option<MetricType>,
    /// Labels attached to this node and everything below it.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Modifiers appended to the inherited chain.
    #[serde(default)]
    pub modifiers: Vec<ModifierSpec>,
    /// Child nodes.
    #[serde(default, deserialize_with = "metric_list")]
    pub metrics: Vec<Metric>,
}

/// A modifier as written in the configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifierSpec {
    /// Registered modifier name.
    pub name: String,
    /// Arguments in any of the accepted YAML shapes.
    #[serde(default)]
    pub args: serde_yaml::Value,
}

/// Accept both full metric mappings and the `- some.path` string shorthand.
fn metric_list<'de, D>(deserializer: D) -> Result<Vec<Metric>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MetricOrPath {
        Path(String),
        Metric(Metric),
    }

    let entries = Vec::<MetricOrPath>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            MetricOrPath::Path(path) => Metric { path, ..Metric::default() },
            MetricOrPath::Metric(metric) => metric,
        })
        .collect())
}
