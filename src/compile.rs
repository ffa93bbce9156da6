//! Compilation of the raw configuration into its immutable runtime form.
//!
//! Compilation validates the tree, compiles every path and value expression,
//! derives defaulted metric names, resolves `type` inheritance, and renders
//! the `url_parts` templates. The result is shared read-only for the process
//! lifetime; a configuration change requires a restart.

use thiserror::Error;

use crate::config::{Config, Endpoint, GlobalLabels, Label, Metric, UrlParts};
use crate::expr::{ExprError, PathExpr, Segment, ValueTemplate};
use crate::modifier::{Modifier, ModifierError};
use crate::sample::MetricType;

/// Errors produced while compiling a configuration.
///
/// Every variant carries the path of the offending node within the
/// configuration document.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The namespace is empty.
    #[error("namespace must not be empty")]
    EmptyNamespace,
    /// A path or template expression failed to compile.
    #[error("{loc}: {source}")]
    Expr {
        loc: String,
        #[source]
        source: ExprError,
    },
    /// A modifier specification failed to compile.
    #[error("{loc}: {source}")]
    Modifier {
        loc: String,
        #[source]
        source: ModifierError,
    },
    /// A wildcard-terminated path has no explicit name to derive from.
    #[error("{loc}: wildcard-terminated path {path:?} requires an explicit name")]
    WildcardName { loc: String, path: String },
    /// A template references a capture slot the path does not bind.
    #[error("{loc}: capture ${index} exceeds the {count} wildcard(s) of path {path:?}")]
    CaptureRange { loc: String, index: u32, count: usize, path: String },
    /// A label name is not a valid Prometheus label name.
    #[error("{loc}: invalid label name {name:?}")]
    LabelName { loc: String, name: String },
    /// A URL template references an unknown `url_parts` key.
    #[error("{loc}: unknown url part {key:?} in template {url:?}")]
    UnknownUrlPart { loc: String, key: String, url: String },
    /// A URL template contains an unterminated `{key}` token.
    #[error("{loc}: unclosed `{{` in url template {url:?}")]
    UnclosedUrlPart { loc: String, url: String },
}

/// The compiled, immutable configuration.
#[derive(Debug)]
pub struct CompiledConfig {
    /// Prefix applied to every extracted metric name.
    pub namespace: String,
    /// Compiled global label sources, in declaration order.
    pub global_labels: Vec<CompiledGlobalLabels>,
    /// Compiled endpoints, in declaration order.
    pub endpoints: Vec<CompiledEndpoint>,
}

/// A compiled global label source.
#[derive(Debug)]
pub struct CompiledGlobalLabels {
    /// URL to fetch, relative to the base URL.
    pub url: String,
    /// Labels evaluated against the root of the returned JSON.
    pub labels: Vec<CompiledLabel>,
}

/// A compiled label: a validated name and a compiled value template.
#[derive(Debug)]
pub struct CompiledLabel {
    pub name: String,
    pub value: ValueTemplate,
}

/// A compiled endpoint with its rendered URL and metric tree.
#[derive(Debug)]
pub struct CompiledEndpoint {
    /// Identifier used in diagnostics and the `up` self-metric; falls back
    /// to the URL template when no `id` is configured.
    pub id: String,
    /// Effective URL after `url_parts` substitution, still relative to the
    /// base URL.
    pub url: String,
    /// Root nodes of the metric tree.
    pub metrics: Vec<CompiledMetric>,
}

/// One compiled node of the metric tree.
#[derive(Debug)]
pub struct CompiledMetric {
    /// Compiled path expression.
    pub path: PathExpr,
    /// Name segment template; `None` contributes no segment.
    pub name: Option<ValueTemplate>,
    /// Inherited-resolved family type; leaves default to gauge when unset.
    pub metric_type: Option<MetricType>,
    /// Labels added at this node.
    pub labels: Vec<CompiledLabel>,
    /// Modifiers added at this node, appended to the inherited chain.
    pub modifiers: Vec<Modifier>,
    /// Child nodes; empty means this node is a leaf and emits samples.
    pub children: Vec<CompiledMetric>,
}

impl CompiledMetric {
    /// Effective family type at a leaf.
    pub fn effective_type(&self) -> MetricType {
        self.metric_type.unwrap_or(MetricType::Gauge)
    }
}

impl CompiledConfig {
    /// Compile a loaded configuration.
    ///
    /// # Parameters
    ///
    /// - `config` - Raw configuration as loaded from YAML
    ///
    /// # Returns
    ///
    /// Returns the compiled configuration.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` naming the offending node for any validation
    /// or expression failure.
    pub fn compile(config: &Config) -> Result<Self, CompileError> {
        if config.namespace.is_empty() {
            return Err(CompileError::EmptyNamespace);
        }
        let mut global_labels = Vec::with_capacity(config.global_labels.len());
        for (ix, source) in config.global_labels.iter().enumerate() {
            global_labels.push(compile_global_labels(source, &format!("global_labels[{ix}]"))?);
        }
        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for (ix, endpoint) in config.endpoints.iter().enumerate() {
            endpoints.push(compile_endpoint(endpoint, &format!("endpoints[{ix}]"))?);
        }
        Ok(Self { namespace: config.namespace.clone(), global_labels, endpoints })
    }
}

fn compile_global_labels(
    source: &GlobalLabels,
    loc: &str,
) -> Result<CompiledGlobalLabels, CompileError> {
    // Global label expressions see no wildcard captures.
    let labels = compile_labels(&source.labels, 0, "", loc)?;
    Ok(CompiledGlobalLabels { url: source.url.clone(), labels })
}

fn compile_endpoint(endpoint: &Endpoint, loc: &str) -> Result<CompiledEndpoint, CompileError> {
    let url = render_url(&endpoint.url, &endpoint.url_parts, loc)?;
    let id = endpoint.id.clone().unwrap_or_else(|| endpoint.url.clone());
    let mut metrics = Vec::with_capacity(endpoint.metrics.len());
    for (ix, metric) in endpoint.metrics.iter().enumerate() {
        metrics.push(compile_metric(metric, None, &format!("{loc}.metrics[{ix}]"))?);
    }
    Ok(CompiledEndpoint { id, url, metrics })
}

fn compile_metric(
    metric: &Metric,
    parent_type: Option<MetricType>,
    loc: &str,
) -> Result<CompiledMetric, CompileError> {
    let path = PathExpr::parse(&metric.path)
        .map_err(|source| CompileError::Expr { loc: loc.to_string(), source })?;

    let name = match &metric.name {
        Some(name) if name.is_empty() => None,
        Some(name) => {
            let template = ValueTemplate::parse(name)
                .map_err(|source| CompileError::Expr { loc: loc.to_string(), source })?;
            check_captures(&template, path.wildcards(), path.raw(), loc)?;
            Some(template)
        }
        None => default_name(&path, loc)?.map(ValueTemplate::literal),
    };

    let labels = compile_labels(&metric.labels, path.wildcards(), path.raw(), loc)?;

    let mut modifiers = Vec::with_capacity(metric.modifiers.len());
    for spec in &metric.modifiers {
        let modifier = Modifier::compile(&spec.name, &spec.args)
            .map_err(|source| CompileError::Modifier { loc: loc.to_string(), source })?;
        modifiers.push(modifier);
    }

    let metric_type = metric.metric_type.or(parent_type);

    let mut children = Vec::with_capacity(metric.metrics.len());
    for (ix, child) in metric.metrics.iter().enumerate() {
        children.push(compile_metric(child, metric_type, &format!("{loc}.metrics[{ix}]"))?);
    }

    Ok(CompiledMetric { path, name, metric_type, labels, modifiers, children })
}

fn compile_labels(
    labels: &[Label],
    wildcards: usize,
    path: &str,
    loc: &str,
) -> Result<Vec<CompiledLabel>, CompileError> {
    let mut compiled = Vec::with_capacity(labels.len());
    for (ix, label) in labels.iter().enumerate() {
        let label_loc = format!("{loc}.labels[{ix}]");
        if !valid_label_name(&label.name) {
            return Err(CompileError::LabelName { loc: label_loc, name: label.name.clone() });
        }
        let value = ValueTemplate::parse(&label.value)
            .map_err(|source| CompileError::Expr { loc: label_loc.clone(), source })?;
        check_captures(&value, wildcards, path, &label_loc)?;
        compiled.push(CompiledLabel { name: label.name.clone(), value });
    }
    Ok(compiled)
}

fn check_captures(
    template: &ValueTemplate,
    wildcards: usize,
    path: &str,
    loc: &str,
) -> Result<(), CompileError> {
    match template.max_capture() {
        Some(index) if index as usize > wildcards => Err(CompileError::CaptureRange {
            loc: loc.to_string(),
            index,
            count: wildcards,
            path: path.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Derive the default name segment from the last path component.
///
/// `_in_bytes` and `_in_millis` suffixes are canonicalized; rewrites to
/// `_seconds` stay explicit via a `name` override plus a `mul` modifier.
fn default_name(path: &PathExpr, loc: &str) -> Result<Option<String>, CompileError> {
    let segments = path.segments();
    Ok(match segments.last() {
        None => None,
        Some(Segment::Wildcard) => {
            return Err(CompileError::WildcardName {
                loc: loc.to_string(),
                path: path.raw().to_string(),
            });
        }
        Some(Segment::Key(key)) => Some(canonical_name(key)),
        Some(Segment::Index(index)) => {
            // The parser only emits an index right after its key.
            let key = match &segments[segments.len() - 2] {
                Segment::Key(key) => key.as_str(),
                _ => "",
            };
            Some(format!("{}_{index}", canonical_name(key)))
        }
    })
}

fn canonical_name(segment: &str) -> String {
    if let Some(stem) = segment.strip_suffix("_in_bytes") {
        format!("{stem}_bytes")
    } else if let Some(stem) = segment.strip_suffix("_in_millis") {
        format!("{stem}_millis")
    } else {
        segment.to_string()
    }
}

fn valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute `{key}` tokens in a URL template.
///
/// A `paths` entry substitutes its fragment verbatim; a `params` entry
/// substitutes `name=value` from its configured name and default value.
fn render_url(url: &str, parts: &UrlParts, loc: &str) -> Result<String, CompileError> {
    let mut rendered = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let body = &rest[open + 1..];
        let close = body.find('}').ok_or_else(|| CompileError::UnclosedUrlPart {
            loc: format!("{loc}.url"),
            url: url.to_string(),
        })?;
        let key = &body[..close];
        if let Some(fragment) = parts.paths.get(key) {
            rendered.push_str(fragment);
        } else if let Some(param) = parts.params.get(key) {
            rendered.push_str(&param.name);
            if let Some(value) = &param.value {
                rendered.push('=');
                rendered.push_str(value);
            }
        } else {
            return Err(CompileError::UnknownUrlPart {
                loc: format!("{loc}.url"),
                key: key.to_string(),
                url: url.to_string(),
            });
        }
        rest = &body[close + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn compile(yaml: &str) -> Result<CompiledConfig, CompileError> {
        let config: Config = serde_yaml::from_str(yaml).expect("config");
        CompiledConfig::compile(&config)
    }

    /// Test compiling a representative nested configuration.
    #[test]
    fn test_compile_nested() {
        let compiled = compile(indoc! {"
            namespace: es
            endpoints:
            - id: indices
              url: /_all/_stats
              metrics:
              - path: indices.*
                name: indices
                type: counter
                labels:
                - name: index
                  value: $1
                metrics:
                - path: docs.count
        "})
        .expect("compile");

        assert_eq!(compiled.namespace, "es");
        let endpoint = &compiled.endpoints[0];
        assert_eq!(endpoint.id, "indices");
        let root = &endpoint.metrics[0];
        assert_eq!(root.name.as_ref().map(ValueTemplate::raw), Some("indices"));
        assert_eq!(root.metric_type, Some(MetricType::Counter));
        // children inherit the type lexically
        let child = &root.children[0];
        assert_eq!(child.metric_type, Some(MetricType::Counter));
        assert_eq!(child.effective_type(), MetricType::Counter);
        assert_eq!(child.name.as_ref().map(ValueTemplate::raw), Some("count"));
    }

    /// Test name defaulting and suffix canonicalization.
    #[test]
    fn test_default_names() {
        let compiled = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: store.size_in_bytes
              - path: search.query_time_in_millis
              - path: docs.count
        "})
        .expect("compile");

        let names: Vec<&str> = compiled.endpoints[0]
            .metrics
            .iter()
            .map(|m| m.name.as_ref().expect("name").raw())
            .collect();
        assert_eq!(names, vec!["size_bytes", "query_time_millis", "count"]);
    }

    /// Test that leaves without any type default to gauge.
    #[test]
    fn test_default_type() {
        let compiled = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_cluster/health
              metrics:
              - path: number_of_nodes
        "})
        .expect("compile");
        let leaf = &compiled.endpoints[0].metrics[0];
        assert_eq!(leaf.metric_type, None);
        assert_eq!(leaf.effective_type(), MetricType::Gauge);
    }

    /// Test that an empty name contributes no segment but still compiles.
    #[test]
    fn test_empty_name() {
        let compiled = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: _all
                name: ''
                metrics:
                - path: total.docs.count
        "})
        .expect("compile");
        assert!(compiled.endpoints[0].metrics[0].name.is_none());
    }

    /// Test wildcard-terminated paths require an explicit name.
    #[test]
    fn test_wildcard_requires_name() {
        let err = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: thread_pool.*
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::WildcardName { .. }));
        assert!(err.to_string().contains("endpoints[0].metrics[0]"));
    }

    /// Test capture references beyond the path's wildcard count are fatal.
    #[test]
    fn test_capture_out_of_range() {
        let err = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: indices.*
                name: indices
                labels:
                - name: shard
                  value: $2
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::CaptureRange { index: 2, count: 1, .. }));
        assert!(err.to_string().contains("endpoints[0].metrics[0].labels[0]"));
    }

    /// Test label name validation.
    #[test]
    fn test_invalid_label_name() {
        let err = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: docs.count
                labels:
                - name: 0bad
                  value: x
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::LabelName { .. }));
    }

    /// Test unknown modifiers are fatal at load time.
    #[test]
    fn test_unknown_modifier() {
        let err = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: docs.count
                modifiers:
                - name: pow
                  args: 2
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::Modifier { .. }));
    }

    /// Test url_parts rendering with path and param fragments.
    #[test]
    fn test_render_url_parts() {
        let compiled = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_nodes/{section}/stats?{level}
              url_parts:
                paths:
                  section: _local
                params:
                  level:
                    name: level
                    value: shards
              metrics:
              - path: docs.count
        "})
        .expect("compile");
        assert_eq!(compiled.endpoints[0].url, "/_nodes/_local/stats?level=shards");
        // without an id, diagnostics fall back to the url template
        assert_eq!(compiled.endpoints[0].id, "/_nodes/{section}/stats?{level}");
    }

    /// Test unknown and unterminated url part tokens.
    #[test]
    fn test_render_url_errors() {
        let err = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats?{level}
              metrics:
              - path: docs.count
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownUrlPart { .. }));

        let err = compile(indoc! {"
            namespace: es
            endpoints:
            - url: /_stats?{level
              metrics:
              - path: docs.count
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::UnclosedUrlPart { .. }));
    }

    /// Test the empty namespace is rejected.
    #[test]
    fn test_empty_namespace() {
        let err = compile(indoc! {"
            namespace: ''
            endpoints: []
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::EmptyNamespace));
    }

    /// Test the bundled demo configuration compiles.
    #[test]
    fn test_demo_configuration_compiles() {
        let config = Config::load_from_path("elasticsearch.yaml").expect("demo config");
        let compiled = CompiledConfig::compile(&config).expect("compile demo config");
        assert_eq!(compiled.endpoints.len(), 3);
        assert_eq!(compiled.endpoints[1].url, "/_nodes/_local/stats");
        assert_eq!(compiled.endpoints[2].url, "/_all/_stats?level=cluster");
    }

    /// Test global label expressions reject captures.
    #[test]
    fn test_global_labels_reject_captures() {
        let err = compile(indoc! {"
            namespace: es
            global_labels:
            - url: /
              labels:
              - name: cluster
                value: $1
            endpoints: []
        "})
        .unwrap_err();
        assert!(matches!(err, CompileError::CaptureRange { .. }));
        assert!(err.to_string().contains("global_labels[0].labels[0]"));
    }
}
