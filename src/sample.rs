//! Core sample types shared by the extraction engine and the exposition sink.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Prometheus family type attached to every emitted sample.
///
/// The exporter only labels families; it does not enforce counter
/// monotonicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    /// Exposition-format spelling of the type.
    ///
    /// # Returns
    ///
    /// Returns the lowercase keyword used in `# TYPE` lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

/// A single labelled measurement ready for exposition.
///
/// Label values are stored already escaped; the map keeps label names in
/// lexicographic order, which is the serialization order required by the
/// sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Full metric name including the namespace prefix.
    pub name: String,
    /// Family type of the metric.
    pub metric_type: MetricType,
    /// Label name to label value, sorted by name.
    pub labels: BTreeMap<String, String>,
    /// Final scalar value after modifiers.
    pub value: f64,
}

impl Sample {
    /// Create a new sample.
    ///
    /// # Parameters
    ///
    /// - `name` - Full metric name
    /// - `metric_type` - Family type
    /// - `labels` - Label set, keyed by label name
    /// - `value` - Scalar value
    ///
    /// # Returns
    ///
    /// Returns a new `Sample` instance.
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        labels: BTreeMap<String, String>,
        value: f64,
    ) -> Self {
        Self { name: name.into(), metric_type, labels, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test MetricType exposition spelling.
    #[test]
    fn test_metric_type_as_str() {
        assert_eq!(MetricType::Gauge.as_str(), "gauge");
        assert_eq!(MetricType::Counter.as_str(), "counter");
    }

    /// Test MetricType deserialization from config spelling.
    #[test]
    fn test_metric_type_deserialization() {
        let t: MetricType = serde_yaml::from_str("gauge").expect("gauge");
        assert_eq!(t, MetricType::Gauge);
        let t: MetricType = serde_yaml::from_str("counter").expect("counter");
        assert_eq!(t, MetricType::Counter);
        assert!(serde_yaml::from_str::<MetricType>("histogram").is_err());
    }

    /// Test label ordering in the sample map.
    #[test]
    fn test_sample_label_order() {
        let mut labels = BTreeMap::new();
        labels.insert("zone".to_string(), "a".to_string());
        labels.insert("cluster".to_string(), "c1".to_string());
        let sample = Sample::new("up", MetricType::Gauge, labels, 1.0);
        let names: Vec<&str> = sample.labels.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["cluster", "zone"]);
    }
}
