//! Recursive extraction of samples from a JSON document.
//!
//! The walker descends the compiled metric tree against an endpoint's JSON,
//! carrying an evaluation context (name prefix, accumulated labels, capture
//! chain, inherited modifiers) and emitting samples at leaves. Extraction is
//! pure over its inputs: the same document always yields the same sample
//! sequence, depth-first, siblings in declared order, wildcard expansions in
//! document order.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::compile::{CompiledEndpoint, CompiledMetric};
use crate::modifier::{Modifier, Scalar};
use crate::sample::Sample;

/// Result of extracting one endpoint.
///
/// Warnings are per-sample failures that were locally recovered; the caller
/// decides how to log them.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Emitted samples, in deterministic order.
    pub samples: Vec<Sample>,
    /// Messages for samples dropped by modifier failures.
    pub warnings: Vec<String>,
}

/// Evaluation context inherited down the metric tree.
///
/// Capture strings are not part of the context: `$N` and `$0` resolve
/// against the captures bound by the referencing node's own path, and
/// ancestor captures reach descendants through the labels resolved at the
/// ancestor's level.
struct EvalContext<'a> {
    prefix: String,
    labels: BTreeMap<String, String>,
    modifiers: Vec<&'a Modifier>,
}

/// Extract all samples for one endpoint from its JSON document.
///
/// Per-sample failures (missing fields, non-numeric leaves, modifier
/// mismatches) silently skip that sample and never abort the walk.
///
/// # Parameters
///
/// - `namespace` - Metric name prefix from the configuration
/// - `endpoint` - Compiled endpoint whose metric tree is walked
/// - `json` - Root of the endpoint's JSON response
///
/// # Returns
///
/// Returns the emitted samples together with recoverable warnings.
pub fn extract(namespace: &str, endpoint: &CompiledEndpoint, json: &Value) -> Extraction {
    let mut extractor = Extractor { namespace, out: Extraction::default() };
    let root = EvalContext {
        prefix: namespace.to_string(),
        labels: BTreeMap::new(),
        modifiers: Vec::new(),
    };
    for metric in &endpoint.metrics {
        extractor.walk(metric, json, &root);
    }
    extractor.out
}

struct Extractor<'a> {
    namespace: &'a str,
    out: Extraction,
}

impl<'a> Extractor<'a> {
    fn walk<'m>(&mut self, metric: &'m CompiledMetric, node: &Value, ctx: &EvalContext<'m>) {
        for (matched, captures) in metric.path.resolve(node) {
            let prefix = match &metric.name {
                None => ctx.prefix.clone(),
                Some(template) => match template.render(matched, &captures) {
                    Some(segment) if segment.is_empty() => ctx.prefix.clone(),
                    Some(segment) => format!("{}_{segment}", ctx.prefix),
                    // a name that fails to render drops the whole match
                    None => continue,
                },
            };

            let mut labels = ctx.labels.clone();
            let mut resolved = true;
            for label in &metric.labels {
                match label.value.render(matched, &captures) {
                    Some(value) => {
                        labels.insert(label.name.clone(), value);
                    }
                    None => {
                        resolved = false;
                        break;
                    }
                }
            }
            if !resolved {
                continue;
            }

            let mut modifiers = ctx.modifiers.clone();
            modifiers.extend(metric.modifiers.iter());

            let child_ctx = EvalContext { prefix, labels, modifiers };
            if metric.children.is_empty() {
                self.emit_leaf(metric, matched, &child_ctx);
            } else {
                for child in &metric.children {
                    self.walk(child, matched, &child_ctx);
                }
            }
        }
    }

    fn emit_leaf(&mut self, metric: &CompiledMetric, node: &Value, ctx: &EvalContext<'_>) {
        if ctx.prefix == self.namespace {
            self.out
                .warnings
                .push(format!("leaf at path {:?} composed an empty metric name", metric.path.raw()));
            return;
        }
        let Some(mut scalar) = Scalar::from_json(node) else {
            return;
        };
        for modifier in &ctx.modifiers {
            match modifier.apply(scalar) {
                Ok(Some(next)) => scalar = next,
                Ok(None) => return,
                Err(e) => {
                    self.out.warnings.push(format!("{}: {e}", ctx.prefix));
                    return;
                }
            }
        }
        let Some(value) = scalar.into_value() else {
            return;
        };
        self.out.samples.push(Sample::new(
            ctx.prefix.clone(),
            metric.effective_type(),
            ctx.labels.clone(),
            value,
        ));
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::compile::CompiledConfig;
    use crate::config::Config;
    use crate::sample::MetricType;

    use super::*;

    /// Compile a single-endpoint config and extract from the given document.
    fn extract_with(yaml: &str, json: &str) -> Extraction {
        let config: Config = serde_yaml::from_str(yaml).expect("parse config");
        let compiled = CompiledConfig::compile(&config).expect("compile config");
        let doc: Value = serde_json::from_str(json).expect("parse json");
        extract(&compiled.namespace, &compiled.endpoints[0], &doc)
    }

    fn rendered(extraction: &Extraction) -> Vec<String> {
        extraction
            .samples
            .iter()
            .map(|s| {
                let labels = s
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}{{{labels}}} {}", s.name, s.value)
            })
            .collect()
    }

    /// Test a plain scalar leaf with a defaulted name.
    #[test]
    fn test_health_scalar() {
        let extraction = extract_with(
            indoc! {"
                namespace: elasticsearch
                endpoints:
                - url: /_cluster/health
                  metrics:
                  - path: number_of_nodes
            "},
            r#"{"number_of_nodes": 3, "cluster_name": "x"}"#,
        );
        assert_eq!(rendered(&extraction), vec!["elasticsearch_number_of_nodes{} 3"]);
        assert!(extraction.warnings.is_empty());
    }

    /// Test boolean and string coercion at leaves.
    #[test]
    fn test_leaf_coercion() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_cluster/health
                  metrics:
                  - path: timed_out
                  - path: load
                  - path: status
                  - path: routing
            "},
            r#"{"timed_out": false, "load": "2.5", "status": "green", "routing": {"x": 1}}"#,
        );
        // the non-numeric string and the object leaf are silently dropped
        assert_eq!(rendered(&extraction), vec!["es_timed_out{} 0", "es_load{} 2.5"]);
        assert!(extraction.warnings.is_empty());
    }

    /// Test empty name nodes skip the join but keep accumulating below.
    #[test]
    fn test_empty_name_segment() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_all/_stats
                  metrics:
                  - path: _all
                    name: ''
                    metrics:
                    - path: total.docs.count
            "},
            r#"{"_all": {"total": {"docs": {"count": 42}}}}"#,
        );
        assert_eq!(rendered(&extraction), vec!["es_count{} 42"]);
    }

    /// Test wildcard captures feed labels and substituted names.
    #[test]
    fn test_wildcard_captures() {
        let extraction = extract_with(
            indoc! {"
                namespace: elasticsearch
                endpoints:
                - url: /_nodes/stats
                  metrics:
                  - path: thread_pool.*
                    name: thread_pool
                    labels:
                    - name: type
                      value: $1
                    metrics:
                    - path: '*'
                      name: ${0}_count
            "},
            r#"{"thread_pool": {"search": {"threads": 5, "queue": 0}}}"#,
        );
        assert_eq!(
            rendered(&extraction),
            vec![
                "elasticsearch_thread_pool_threads_count{type=search} 5",
                "elasticsearch_thread_pool_queue_count{type=search} 0",
            ]
        );
    }

    /// Test capture numbering is local to each node's own path.
    #[test]
    fn test_nested_capture_numbering() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_all/_stats
                  metrics:
                  - path: indices.*
                    name: indices
                    labels:
                    - name: index
                      value: $1
                    metrics:
                    - path: shards.*.*
                      name: shards
                      labels:
                      - name: shard
                        value: $1
                      - name: node
                        value: ${$.routing.node}
                      metrics:
                      - path: docs.*
                        name: docs_$1
            "},
            r#"{
                "indices": {
                    "catalog": {
                        "shards": {
                            "0": [
                                {"routing": {"node": "n1"}, "docs": {"count": 7, "deleted": 1}}
                            ]
                        }
                    }
                }
            }"#,
        );
        assert_eq!(
            rendered(&extraction),
            vec![
                "es_indices_shards_docs_count{index=catalog,node=n1,shard=0} 7",
                "es_indices_shards_docs_deleted{index=catalog,node=n1,shard=0} 1",
            ]
        );
    }

    /// Test a child label overrides an inherited label of the same name.
    #[test]
    fn test_label_override() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_stats
                  metrics:
                  - path: ''
                    labels:
                    - name: scope
                      value: outer
                    metrics:
                    - path: docs.count
                      labels:
                      - name: scope
                        value: inner
            "},
            r#"{"docs": {"count": 1}}"#,
        );
        assert_eq!(rendered(&extraction), vec!["es_count{scope=inner} 1"]);
    }

    /// Test eq emits exactly one matching sample and suppresses the rest.
    #[test]
    fn test_eq_suppression() {
        let yaml = indoc! {"
            namespace: elasticsearch
            endpoints:
            - url: /_cluster/health
              metrics:
              - path: status
                labels:
                - name: color
                  value: green
                modifiers:
                - name: eq
                  args: green
              - path: status
                labels:
                - name: color
                  value: yellow
                modifiers:
                - name: eq
                  args: yellow
              - path: status
                labels:
                - name: color
                  value: red
                modifiers:
                - name: eq
                  args: red
        "};
        let extraction = extract_with(yaml, r#"{"status": "yellow"}"#);
        assert_eq!(rendered(&extraction), vec!["elasticsearch_status{color=yellow} 1"]);
        assert!(extraction.warnings.is_empty());
    }

    /// Test modifier chains apply in order, inherited before local.
    #[test]
    fn test_modifier_inheritance() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_stats
                  metrics:
                  - path: ''
                    modifiers:
                    - name: mul
                      args: 10
                    metrics:
                    - path: raw
                      modifiers:
                      - name: div
                        args: 4
            "},
            r#"{"raw": 2}"#,
        );
        assert_eq!(rendered(&extraction), vec!["es_raw{} 5"]);
    }

    /// Test millis-to-seconds rewrite via explicit name and mul.
    #[test]
    fn test_millis_to_seconds() {
        let extraction = extract_with(
            indoc! {"
                namespace: elasticsearch
                endpoints:
                - url: /_stats
                  metrics:
                  - path: query_time_in_millis
                    name: query_time_seconds
                    type: counter
                    modifiers:
                    - name: mul
                      args: 0.001
            "},
            r#"{"query_time_in_millis": 2500}"#,
        );
        assert_eq!(rendered(&extraction), vec!["elasticsearch_query_time_seconds{} 2.5"]);
        assert_eq!(extraction.samples[0].metric_type, MetricType::Counter);
    }

    /// Test a numeric modifier over a non-number drops with a warning.
    #[test]
    fn test_modifier_type_mismatch() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_stats
                  metrics:
                  - path: status
                    modifiers:
                    - name: mul
                      args: 2
            "},
            r#"{"status": "green"}"#,
        );
        assert!(extraction.samples.is_empty());
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].contains("es_status"));
    }

    /// Test a label query hitting an absent field emits no sample at all.
    #[test]
    fn test_missing_label_field() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_stats
                  metrics:
                  - path: docs.count
                    labels:
                    - name: host
                      value: ${$.host}
            "},
            r#"{"docs": {"count": 3}}"#,
        );
        assert!(extraction.samples.is_empty());
        assert!(extraction.warnings.is_empty());
    }

    /// Test absent intermediate keys silently contribute nothing.
    #[test]
    fn test_missing_path() {
        let extraction = extract_with(
            indoc! {"
                namespace: es
                endpoints:
                - url: /_stats
                  metrics:
                  - path: indices.docs.count
            "},
            r#"{"other": 1}"#,
        );
        assert!(extraction.samples.is_empty());
        assert!(extraction.warnings.is_empty());
    }

    /// Test extraction is deterministic across invocations.
    #[test]
    fn test_determinism() {
        let yaml = indoc! {"
            namespace: es
            endpoints:
            - url: /_stats
              metrics:
              - path: pools.*
                name: pool_$1
        "};
        let json = r#"{"pools": {"b": 1, "a": 2, "c": 3}}"#;
        let first = rendered(&extract_with(yaml, json));
        let second = rendered(&extract_with(yaml, json));
        assert_eq!(first, second);
        // wildcard expansion follows document order, not sorted order
        assert_eq!(first, vec!["es_pool_b{} 1", "es_pool_a{} 2", "es_pool_c{} 3"]);
    }
}
