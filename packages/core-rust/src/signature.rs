//! Operation signatures and positional argument binding.
//!
//! Arguments arrive as an ordered list of JSON values. Binding checks the
//! count against the declared signature and converts each value to the
//! declared parameter type, applying a small set of lenient coercions that
//! callers rely on (numeric strings, integer-to-float widening).

use std::fmt;

use serde_json::{Number, Value};
use tracing::debug;

/// Declared type of a single operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Accepts any JSON value unchanged, including `null`.
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// One named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
}

/// Ordered parameter list of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// A signature with no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Binds `args` positionally to this signature.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::ArityMismatch`] when the argument count differs and
    /// [`BindError::TypeMismatch`] for the first argument that cannot be
    /// converted to its parameter type.
    pub fn bind(&self, args: Vec<Value>) -> Result<Vec<Value>, BindError> {
        if args.len() != self.params.len() {
            return Err(BindError::ArityMismatch {
                expected: self.params.len(),
                actual: args.len(),
            });
        }

        self.params
            .iter()
            .zip(args)
            .enumerate()
            .map(|(position, (param, arg))| {
                coerce(param.ty, arg).map_err(|actual| BindError::TypeMismatch {
                    position,
                    name: param.name.clone(),
                    expected: param.ty,
                    actual,
                })
            })
            .collect()
    }
}

/// Argument binding failures. Recorded as invocation failures, never raised
/// to the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("expected {expected} argument(s), got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("argument {position} (`{name}`): expected {expected}, got {actual}")]
    TypeMismatch {
        position: usize,
        name: String,
        expected: ParamType,
        actual: &'static str,
    },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Converts one argument, returning the JSON type name of the rejected value.
fn coerce(ty: ParamType, value: Value) -> Result<Value, &'static str> {
    let actual = json_type_name(&value);
    let coerced = match (ty, value) {
        (ParamType::Any, v) => Some(v),
        (ParamType::String, v @ Value::String(_))
        | (ParamType::Boolean, v @ Value::Bool(_))
        | (ParamType::Array, v @ Value::Array(_))
        | (ParamType::Object, v @ Value::Object(_)) => Some(v),
        (ParamType::Integer, Value::Number(n)) => integer_from_number(&n),
        (ParamType::Integer, Value::String(s)) => {
            s.trim().parse::<i64>().ok().map(Value::from)
        }
        (ParamType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
        (ParamType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };

    match coerced {
        Some(v) => {
            if json_type_name(&v) != actual {
                debug!(from = actual, to = %ty, "coerced argument");
            }
            Ok(v)
        }
        None => Err(actual),
    }
}

fn integer_from_number(n: &Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        return Some(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Value::from(u));
    }
    // Floats bind to integers only when they carry no fractional part.
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && f.is_finite())
        .map(|f| {
            #[allow(clippy::cast_possible_truncation)]
            let i = f as i64;
            Value::from(i)
        })
}
