//! Scalar modifiers applied to leaf values in declared order.
//!
//! Modifiers are configured as `{name, args}` pairs and compiled into a
//! tagged variant through a name-keyed registry; adding a kind means adding
//! a variant, a `compile` arm, and an `apply` arm.

use serde_yaml::Value as YamlValue;
use thiserror::Error;

/// Errors produced while compiling a modifier specification.
#[derive(Debug, Error)]
pub enum ModifierError {
    /// The modifier name is not registered.
    #[error("unknown modifier {0:?}")]
    Unknown(String),
    /// The arguments did not match the modifier's expected shape.
    #[error("invalid arguments for {name}: expected {expected}")]
    InvalidArgs {
        /// Registered modifier name.
        name: &'static str,
        /// Human description of the accepted argument shape.
        expected: &'static str,
    },
}

/// Error raised when a modifier rejects its input value.
///
/// This is a per-sample failure: the sample is dropped and the message
/// logged at warn level.
#[derive(Debug, Error)]
#[error("{modifier} expects a numeric value, got {input:?}")]
pub struct ApplyError {
    modifier: &'static str,
    input: String,
}

/// A raw scalar taken from a JSON leaf, before final float coercion.
///
/// Modifiers operate on this representation so that `eq` can match string
/// values before anything is forced numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Scalar {
    /// Extract a scalar from a JSON value.
    ///
    /// # Parameters
    ///
    /// - `value` - JSON leaf value
    ///
    /// # Returns
    ///
    /// Returns `None` for null, objects, and arrays.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            _ => None,
        }
    }

    /// Render the scalar the way `eq` compares it.
    pub fn stringify(&self) -> String {
        match self {
            Self::Number(v) => v.to_string(),
            Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Coerce the scalar to the final sample value.
    ///
    /// # Returns
    ///
    /// Returns a finite `f64`, or `None` when the scalar is a non-numeric
    /// string or the result is not finite.
    pub fn into_value(self) -> Option<f64> {
        let value = match self {
            Self::Number(v) => v,
            Self::Text(s) => s.parse().ok()?,
            Self::Bool(true) => 1.0,
            Self::Bool(false) => 0.0,
        };
        value.is_finite().then_some(value)
    }
}

/// A compiled modifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Multiply a numeric value by a constant factor.
    Mul(f64),
    /// Divide a numeric value by a constant denominator.
    Div(f64),
    /// Emit `1` when the stringified value equals the token, otherwise
    /// suppress the sample.
    Eq(String),
}

impl Modifier {
    /// Compile a `{name, args}` specification into a modifier.
    ///
    /// Arguments are accepted in the forms the configuration language
    /// allows: a bare scalar, a single-element sequence, or a single-key
    /// mapping (`mul: {factor: 0.001}`).
    ///
    /// # Parameters
    ///
    /// - `name` - Registered modifier name (`mul`, `div`, `eq` and aliases)
    /// - `args` - YAML arguments as written in the configuration
    ///
    /// # Returns
    ///
    /// Returns the compiled modifier.
    ///
    /// # Errors
    ///
    /// Returns `ModifierError` for unknown names or malformed arguments.
    pub fn compile(name: &str, args: &YamlValue) -> Result<Self, ModifierError> {
        match name {
            "mul" | "multiply" => Ok(Self::Mul(single_f64(args, "mul", "factor")?)),
            "div" | "divide" => Ok(Self::Div(single_f64(args, "div", "divisor")?)),
            "eq" => Ok(Self::Eq(single_string(args, "eq", "token")?)),
            _ => Err(ModifierError::Unknown(name.to_string())),
        }
    }

    /// Apply the modifier to a scalar.
    ///
    /// # Parameters
    ///
    /// - `value` - Current scalar in the pipeline
    ///
    /// # Returns
    ///
    /// Returns the transformed scalar, or `None` when the modifier
    /// suppresses the sample.
    ///
    /// # Errors
    ///
    /// Returns `ApplyError` when a numeric modifier receives a non-numeric
    /// input.
    pub fn apply(&self, value: Scalar) -> Result<Option<Scalar>, ApplyError> {
        match self {
            Self::Mul(factor) => Ok(Some(Scalar::Number(numeric("mul", value)? * factor))),
            Self::Div(denominator) => {
                Ok(Some(Scalar::Number(numeric("div", value)? / denominator)))
            }
            Self::Eq(token) => {
                if value.stringify() == *token {
                    Ok(Some(Scalar::Number(1.0)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

fn numeric(modifier: &'static str, value: Scalar) -> Result<f64, ApplyError> {
    match value {
        Scalar::Number(v) => Ok(v),
        other => Err(ApplyError { modifier, input: other.stringify() }),
    }
}

fn single_f64(
    args: &YamlValue,
    name: &'static str,
    map_key: &str,
) -> Result<f64, ModifierError> {
    let invalid = || ModifierError::InvalidArgs { name, expected: "a single number" };
    match single_arg(args, map_key).ok_or_else(invalid)? {
        YamlValue::Number(n) => n.as_f64().ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn single_string(
    args: &YamlValue,
    name: &'static str,
    map_key: &str,
) -> Result<String, ModifierError> {
    let invalid = || ModifierError::InvalidArgs { name, expected: "a single string" };
    match single_arg(args, map_key).ok_or_else(invalid)? {
        YamlValue::String(s) => Ok(s.clone()),
        // YAML happily parses unquoted tokens like `404` or `true` as
        // non-strings; compare against their canonical spelling.
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid()),
    }
}

fn single_arg<'a>(args: &'a YamlValue, map_key: &str) -> Option<&'a YamlValue> {
    match args {
        YamlValue::Sequence(seq) => match seq.as_slice() {
            [single] => Some(single),
            _ => None,
        },
        YamlValue::Mapping(map) => {
            if map.len() != 1 {
                return None;
            }
            map.get(&YamlValue::from(map_key))
        }
        YamlValue::Null => None,
        scalar => Some(scalar),
    }
}
