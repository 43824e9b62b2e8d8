use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::errors::*;

err_impl! {PathError,
    #[error("malformed path step: {0:?}")]
    MalformedStep(String),
}

/// A single step in a [`ValuePath`]: a key lookup, an array index, or an array
/// filter that selects the first element whose field matches a literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    Key(String),
    Index(i64),
    Filter { key: String, value: Value },
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(k) => write!(f, "{k}"),
            PathStep::Index(i) => write!(f, "{i}"),
            PathStep::Filter { key, value } => write!(f, "[{key}={value}]"),
        }
    }
}

lazy_static::lazy_static! {
    static ref FILTER_RE: Regex = Regex::new(r"^\[(?P<key>[^=\]]+)=(?P<value>[^\]]+)\]$").unwrap();
}

fn coerce_filter_value(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::from(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::from(f)
    } else {
        Value::String(raw.to_string())
    }
}

fn parse_step(raw: &str) -> anyhow::Result<PathStep> {
    if raw.starts_with('[') {
        let caps = FILTER_RE.captures(raw).ok_or_else(|| PathError::malformed_step(raw))?;
        return Ok(PathStep::Filter {
            key: caps["key"].to_string(),
            value: coerce_filter_value(&caps["value"]),
        });
    }

    if let Ok(idx) = raw.parse::<i64>() {
        return Ok(PathStep::Index(idx));
    }

    Ok(PathStep::Key(raw.to_string()))
}

/// An ordered, compiled list of [`PathStep`]s. Compiled paths are immutable and cheap
/// to clone/share across every object a custom-resource family generator visits
/// (spec 3 "value path", spec 4.G).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValuePath(Vec<PathStep>);

impl ValuePath {
    pub fn compile<S: AsRef<str>>(steps: &[S]) -> anyhow::Result<ValuePath> {
        Ok(ValuePath(steps.iter().map(|s| parse_step(s.as_ref())).collect::<anyhow::Result<_>>()?))
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluates this path against `root`, returning the leaf value it resolves to,
    /// or `None` if any step can't be satisfied (missing key, out-of-range index, no
    /// filter match). Absence is not an error: most custom-resource fields are
    /// optional and the caller (spec 4.G) treats a `None` as "skip this sample".
    pub fn evaluate<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut cur = root;
        for step in &self.0 {
            cur = match step {
                PathStep::Key(k) => cur.as_object()?.get(k)?,
                PathStep::Index(i) => {
                    let arr = cur.as_array()?;
                    let idx = resolve_index(*i, arr.len())?;
                    arr.get(idx)?
                },
                PathStep::Filter { key, value } => {
                    let arr = cur.as_array()?;
                    arr.iter().find(|el| el.get(key) == Some(value))?
                },
            };
        }
        Some(cur)
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        Some(i as usize)
    } else {
        len.checked_sub(i.unsigned_abs() as usize)
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", rendered.join("."))
    }
}
