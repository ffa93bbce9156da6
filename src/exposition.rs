//! Prometheus text exposition formatting.
//!
//! Samples are grouped into families by metric name, in order of first
//! occurrence, with a single `# TYPE` header per family. Within a family,
//! samples keep the order they were received in. Label sets serialize in
//! label-name order with values escaped per the exposition format rules.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write;

use crate::sample::{MetricType, Sample};

/// Content type served for the exposition body.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// A rendered exposition body plus the per-sample failures hit on the way.
#[derive(Debug)]
pub struct Exposition {
    /// Prometheus text format body.
    pub body: String,
    /// Messages for samples dropped due to family type conflicts.
    pub warnings: Vec<String>,
}

/// Serialize samples into the Prometheus text format.
///
/// A sample whose type disagrees with the family's first-seen type is
/// dropped and reported as a warning.
///
/// # Parameters
///
/// - `samples` - Samples in emission order
///
/// # Returns
///
/// Returns the rendered body and any type-conflict warnings.
pub fn write_samples(samples: &[Sample]) -> Exposition {
    let mut families: Vec<(&str, MetricType, Vec<&Sample>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for sample in samples {
        match index.get(sample.name.as_str()) {
            Some(&at) => {
                let family = &mut families[at];
                if family.1 != sample.metric_type {
                    warnings.push(format!(
                        "metric {} emitted as {} but family is {}; sample dropped",
                        sample.name,
                        sample.metric_type.as_str(),
                        family.1.as_str(),
                    ));
                    continue;
                }
                family.2.push(sample);
            }
            None => {
                index.insert(sample.name.as_str(), families.len());
                families.push((sample.name.as_str(), sample.metric_type, vec![sample]));
            }
        }
    }

    let mut body = String::new();
    for (name, metric_type, members) in families {
        let _ = writeln!(body, "# TYPE {name} {}", metric_type.as_str());
        for sample in members {
            body.push_str(name);
            if !sample.labels.is_empty() {
                body.push('{');
                for (ix, (label, value)) in sample.labels.iter().enumerate() {
                    if ix > 0 {
                        body.push(',');
                    }
                    let _ = write!(body, "{label}=\"{}\"", escape_label_value(value));
                }
                body.push('}');
            }
            let _ = writeln!(body, " {}", sample.value);
        }
    }

    Exposition { body, warnings }
}

fn escape_label_value(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
