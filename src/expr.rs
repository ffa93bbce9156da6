//! Path expressions and value templates.
//!
//! Two small languages share this module: the `path:` language that walks a
//! JSON document (`thread_pool.*`, `docs.count`, `shards[0]`) and the value
//! template language used by label values and substitutable metric names
//! (`$1`, `${0}_count`, `${$.routing.node}`). Both are compiled once at
//! configuration load time and evaluated per scrape.

use serde_json::Value;
use thiserror::Error;

/// Errors produced while compiling a path or template expression.
#[derive(Debug, Error)]
pub enum ExprError {
    /// A path contained an empty dot-separated segment.
    #[error("empty segment in path {0:?}")]
    EmptySegment(String),
    /// A path segment mixed wildcard or bracket characters with text.
    #[error("invalid segment {1:?} in path {0:?}")]
    InvalidSegment(String, String),
    /// A bracketed array index did not parse as an unsigned integer.
    #[error("invalid array index in segment {1:?} of path {0:?}")]
    InvalidIndex(String, String),
    /// A `${` placeholder was never closed.
    #[error("unclosed `${{` in template {0:?}")]
    Unclosed(String),
    /// A `$` was followed by neither digits nor `{`.
    #[error("dangling `$` in template {0:?}")]
    Dangling(String),
    /// A `${}` placeholder had no content.
    #[error("empty placeholder in template {0:?}")]
    EmptyPlaceholder(String),
    /// A placeholder query used syntax outside the supported subset.
    #[error(
        "unsupported query {1:?} in template {0:?}: \
         only `$` followed by `.field` selectors is allowed"
    )]
    UnsupportedQuery(String, String),
}

/// One step of a compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Descend into the named object key.
    Key(String),
    /// Descend into the given array index.
    Index(usize),
    /// Match every object key or array index, binding a capture.
    Wildcard,
}

/// A compiled `path:` expression.
///
/// Resolving a path against a JSON node yields every matching descendant
/// together with the capture strings bound by its wildcards, in document
/// order (object keys in insertion order, array items by index).
#[derive(Debug, Clone)]
pub struct PathExpr {
    raw: String,
    segments: Vec<Segment>,
    wildcards: usize,
}

impl PathExpr {
    /// Compile a path expression.
    ///
    /// An empty string compiles to the empty path, which matches the current
    /// node itself.
    ///
    /// # Parameters
    ///
    /// - `raw` - Path text, e.g. `"thread_pool.*"` or `"shards[0].docs"`
    ///
    /// # Returns
    ///
    /// Returns the compiled path.
    ///
    /// # Errors
    ///
    /// Returns `ExprError` when a segment is empty, mixes wildcards with
    /// text, or carries a malformed array index.
    pub fn parse(raw: &str) -> Result<Self, ExprError> {
        let mut segments = Vec::new();
        if !raw.is_empty() {
            for part in raw.split('.') {
                parse_segment(raw, part, &mut segments)?;
            }
        }
        let wildcards = segments.iter().filter(|s| matches!(s, Segment::Wildcard)).count();
        Ok(Self { raw: raw.to_string(), segments, wildcards })
    }

    /// Original path text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Compiled segments of this path.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of wildcard segments, i.e. capture slots this path binds.
    pub fn wildcards(&self) -> usize {
        self.wildcards
    }

    /// Whether this is the empty path (stay on the current node).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve the path against a JSON node.
    ///
    /// Absent intermediate keys silently contribute no matches. The empty
    /// path yields the node itself with no captures.
    ///
    /// # Parameters
    ///
    /// - `node` - JSON node to resolve against
    ///
    /// # Returns
    ///
    /// Returns `(matched_node, captures)` pairs in document order.
    pub fn resolve<'a>(&self, node: &'a Value) -> Vec<(&'a Value, Vec<String>)> {
        let mut matches = Vec::new();
        let mut captures = Vec::new();
        collect(node, &self.segments, &mut captures, &mut matches);
        matches
    }
}

fn parse_segment(raw: &str, part: &str, segments: &mut Vec<Segment>) -> Result<(), ExprError> {
    if part.is_empty() {
        return Err(ExprError::EmptySegment(raw.to_string()));
    }
    if part == "*" {
        segments.push(Segment::Wildcard);
        return Ok(());
    }
    if let Some(open) = part.find('[') {
        let Some(inner) = part[open..].strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
            return Err(ExprError::InvalidSegment(raw.to_string(), part.to_string()));
        };
        let key = &part[..open];
        if key.is_empty() || key.contains('*') {
            return Err(ExprError::InvalidSegment(raw.to_string(), part.to_string()));
        }
        let index: usize = inner
            .parse()
            .map_err(|_| ExprError::InvalidIndex(raw.to_string(), part.to_string()))?;
        segments.push(Segment::Key(key.to_string()));
        segments.push(Segment::Index(index));
        return Ok(());
    }
    if part.contains(['*', ']']) {
        return Err(ExprError::InvalidSegment(raw.to_string(), part.to_string()));
    }
    segments.push(Segment::Key(part.to_string()));
    Ok(())
}

fn collect<'a>(
    node: &'a Value,
    segments: &[Segment],
    captures: &mut Vec<String>,
    out: &mut Vec<(&'a Value, Vec<String>)>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push((node, captures.clone()));
        return;
    };
    match segment {
        Segment::Key(key) => {
            if let Some(child) = node.as_object().and_then(|map| map.get(key)) {
                collect(child, rest, captures, out);
            }
        }
        Segment::Index(index) => {
            if let Some(child) = node.as_array().and_then(|items| items.get(*index)) {
                collect(child, rest, captures, out);
            }
        }
        Segment::Wildcard => match node {
            Value::Object(map) => {
                for (key, child) in map {
                    captures.push(key.clone());
                    collect(child, rest, captures, out);
                    captures.pop();
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    captures.push(index.to_string());
                    collect(child, rest, captures, out);
                    captures.pop();
                }
            }
            _ => {}
        },
    }
}

/// A restricted JSONPath query: `$` followed by `.field` selectors.
///
/// Bracket selectors and filters are rejected at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonQuery {
    fields: Vec<String>,
}

impl JsonQuery {
    /// Resolve the query against a JSON node and coerce the result to a
    /// string.
    ///
    /// # Parameters
    ///
    /// - `node` - Node the query is evaluated against
    ///
    /// # Returns
    ///
    /// Returns the scalar rendered as a string, or `None` when a field is
    /// absent or the result is not a scalar.
    pub fn resolve(&self, node: &Value) -> Option<String> {
        let mut current = node;
        for field in &self.fields {
            current = current.as_object()?.get(field)?;
        }
        scalar_to_string(current)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Capture(u32),
    Query(JsonQuery),
}

/// A compiled value template.
///
/// A template mixes literal text with positional captures (`$1`, `${0}`) and
/// restricted JSONPath placeholders (`${$.cluster_name}`). `$N` with N ≥ 1
/// substitutes the N-th wildcard capture of the enclosing path; `$0` joins
/// all of that path's captures with `_`.
#[derive(Debug, Clone)]
pub struct ValueTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl ValueTemplate {
    /// Compile a template.
    ///
    /// # Parameters
    ///
    /// - `raw` - Template text; plain strings compile to a single literal
    ///
    /// # Returns
    ///
    /// Returns the compiled template.
    ///
    /// # Errors
    ///
    /// Returns `ExprError` for unterminated or empty placeholders, a
    /// dangling `$`, or queries outside the supported subset.
    pub fn parse(raw: &str) -> Result<Self, ExprError> {
        let mut parts = Vec::new();
        let mut rest = raw;
        while !rest.is_empty() {
            let Some(dollar) = rest.find('$') else {
                parts.push(Part::Text(rest.to_string()));
                break;
            };
            if dollar > 0 {
                parts.push(Part::Text(rest[..dollar].to_string()));
            }
            let after = &rest[dollar + 1..];
            if let Some(body) = after.strip_prefix('{') {
                let close = body.find('}').ok_or_else(|| ExprError::Unclosed(raw.to_string()))?;
                parts.push(parse_placeholder(raw, body[..close].trim())?);
                rest = &body[close + 1..];
            } else {
                let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
                if digits == 0 {
                    return Err(ExprError::Dangling(raw.to_string()));
                }
                let index: u32 = after[..digits]
                    .parse()
                    .map_err(|_| ExprError::Dangling(raw.to_string()))?;
                parts.push(Part::Capture(index));
                rest = &after[digits..];
            }
        }
        Ok(Self { raw: raw.to_string(), parts })
    }

    /// Build a template that always renders the given literal.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        let parts =
            if text.is_empty() { Vec::new() } else { vec![Part::Text(text.clone())] };
        Self { raw: text, parts }
    }

    /// Original template text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Highest `$N` capture index referenced, if any.
    pub fn max_capture(&self) -> Option<u32> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Capture(n) if *n > 0 => Some(*n),
                _ => None,
            })
            .max()
    }

    /// Render the template against a JSON node and a capture set.
    ///
    /// # Parameters
    ///
    /// - `node` - JSON node `${...}` queries are resolved against
    /// - `captures` - Capture strings bound by the enclosing path
    ///
    /// # Returns
    ///
    /// Returns the rendered string, or `None` when a query hits an absent
    /// field or a referenced capture slot is missing.
    pub fn render(&self, node: &Value, captures: &[String]) -> Option<String> {
        let mut text = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::Capture(0) => text.push_str(&captures.join("_")),
                Part::Capture(n) => {
                    text.push_str(captures.get(*n as usize - 1)?);
                }
                Part::Query(query) => text.push_str(&query.resolve(node)?),
            }
        }
        Some(text)
    }
}

fn parse_placeholder(raw: &str, inner: &str) -> Result<Part, ExprError> {
    if inner.is_empty() {
        return Err(ExprError::EmptyPlaceholder(raw.to_string()));
    }
    if inner.chars().all(|c| c.is_ascii_digit()) {
        let index: u32 =
            inner.parse().map_err(|_| ExprError::Dangling(raw.to_string()))?;
        return Ok(Part::Capture(index));
    }
    let query = inner.strip_prefix('$').unwrap_or(inner);
    if query.is_empty() {
        // `${$}` selects the current node itself
        return Ok(Part::Query(JsonQuery { fields: Vec::new() }));
    }
    let Some(selectors) = query.strip_prefix('.') else {
        return Err(ExprError::UnsupportedQuery(raw.to_string(), inner.to_string()));
    };
    if selectors.is_empty() {
        return Ok(Part::Query(JsonQuery { fields: Vec::new() }));
    }
    let mut fields = Vec::new();
    for field in selectors.split('.') {
        if field.is_empty() || field.contains(['[', ']', '*', '?', '@']) {
            return Err(ExprError::UnsupportedQuery(raw.to_string(), inner.to_string()));
        }
        fields.push(field.to_string());
    }
    Ok(Part::Query(JsonQuery { fields }))
}
