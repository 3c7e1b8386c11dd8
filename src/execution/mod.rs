//! Execution protocol: request framing, reply envelope and the dynamic value tree
//! that comes back from R.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EvalError;

/// Marks protocol lines on the interpreter's stdout; anything else is chatter.
pub const REPLY_SENTINEL: &str = "@@statbench@@";

/// One element of an atomic R vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Na,
    Logical(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Logical(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Na | Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// A value returned by an R program, as serialized by `jsonlite::toJSON` without
/// auto-unboxing: atomic vectors are arrays of scalars (a scalar is a one-element
/// vector), unnamed lists are arrays of values, named lists are objects.
#[derive(Debug, Clone, PartialEq)]
pub enum RValue {
    Null,
    Vector(Vec<Scalar>),
    List(Vec<RValue>),
    Record(Vec<(String, RValue)>),
}

impl RValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Array(items) => {
                if items.iter().all(is_scalar_json) {
                    Self::Vector(items.into_iter().map(scalar_from_json).collect())
                } else {
                    Self::List(items.into_iter().map(Self::from_json).collect())
                }
            }
            Value::Object(map) => Self::Record(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
            scalar => Self::Vector(vec![scalar_from_json(scalar)]),
        }
    }

    /// Element count: vector length, list length or number of named fields.
    pub fn len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Vector(v) => v.len(),
            Self::List(v) => v.len(),
            Self::Record(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_scalar_json(v: &Value) -> bool {
    matches!(
        v,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn scalar_from_json(v: Value) -> Scalar {
    match v {
        Value::Bool(b) => Scalar::Logical(b),
        Value::Number(n) => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Na),
        Value::String(s) => match s.as_str() {
            "NA" => Scalar::Na,
            "NaN" => Scalar::Number(f64::NAN),
            "Inf" => Scalar::Number(f64::INFINITY),
            "-Inf" => Scalar::Number(f64::NEG_INFINITY),
            _ => Scalar::Text(s),
        },
        _ => Scalar::Na,
    }
}

/// Request line written to the interpreter. The interpreter echoes `id` in its reply so
/// a reply left over from an abandoned request is never mistaken for the current one.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub id: u64,
    pub code: &'a str,
}

impl<'a> Request<'a> {
    pub fn to_line(&self) -> Result<String, EvalError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| EvalError::Transport(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Successful evaluation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub value: RValue,
    pub warnings: Vec<String>,
}

/// Id carried by the boot handshake reply.
pub const HANDSHAKE_ID: u64 = 0;

/// Splits a stdout line into the chatter before the sentinel and the reply payload.
/// Output printed without a trailing newline can precede the sentinel on the same line.
pub fn strip_sentinel(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let at = line.find(REPLY_SENTINEL)?;
    Some((&line[..at], &line[at + REPLY_SENTINEL.len()..]))
}

/// A decoded reply: the request it answers and the evaluation outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// `None` when the interpreter could not read the request it answers.
    pub id: Option<u64>,
    pub result: Result<ExecutionResult, EvalError>,
}

/// Parse a reply payload (the part after the sentinel). Only a payload that is not a
/// reply envelope at all is an error here.
pub fn parse_reply(payload: &str) -> Result<Reply, EvalError> {
    let env: Envelope = serde_json::from_str(payload)
        .map_err(|e| EvalError::Transport(format!("malformed reply: {e}")))?;
    let result = if env.ok {
        Ok(ExecutionResult {
            value: RValue::from_json(env.value),
            warnings: env.warnings,
        })
    } else {
        Err(EvalError::Signalled(
            env.error.unwrap_or_else(|| "unknown R error".to_string()),
        ))
    };
    Ok(Reply { id: env.id, result })
}
