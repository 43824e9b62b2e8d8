use std::collections::HashMap;

use serde_json::Value;

use super::ast::{BinOp, Expr};
use super::parse;
use super::ExpressionError;
use crate::errors::*;

/// The outcome of evaluating a compiled expression against one `value` binding
/// (spec 3 "Compiled expression program"): either a bare scalar, or a scalar
/// carrying dynamic extra labels from a `WithLabels(...)` call (spec 4.G).
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Scalar(Value),
    WithLabels(Value, Vec<(String, String)>),
}

impl EvalResult {
    pub fn scalar(&self) -> &Value {
        match self {
            EvalResult::Scalar(v) => v,
            EvalResult::WithLabels(v, _) => v,
        }
    }

    pub fn labels(&self) -> &[(String, String)] {
        match self {
            EvalResult::Scalar(_) => &[],
            EvalResult::WithLabels(_, labels) => labels,
        }
    }
}

/// An immutable, shareable compiled expression program (spec 3). Holds the parsed
/// AST alongside the original source, since the companion `labelsFromPath` map and
/// the source string itself are carried through configuration for diagnostics.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
}

impl CompiledExpr {
    pub fn compile(source: &str) -> anyhow::Result<CompiledExpr> {
        Ok(CompiledExpr { source: source.to_string(), ast: parse(source)? })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates this program with `value` bound to `binding` (spec 4.G: "a pure
    /// function of one distinguished variable `value`"). Pure: no I/O, no clock.
    pub fn evaluate(&self, binding: &Value) -> anyhow::Result<EvalResult> {
        let mut env = Env::default();
        env.push("value", binding.clone());
        eval_top(&self.ast, &env)
    }
}

impl PartialEq for CompiledExpr {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

#[derive(Default, Clone)]
struct Env {
    bindings: Vec<(String, Value)>,
}

impl Env {
    fn push(&mut self, name: &str, value: Value) {
        self.bindings.push((name.to_string(), value));
    }

    fn lookup(&self, name: &str) -> anyhow::Result<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| ExpressionError::unbound_variable(name))
    }

    fn with(&self, name: &str, value: Value) -> Env {
        let mut next = self.clone();
        next.push(name, value);
        next
    }
}

/// Top-level evaluation: only a bare `WithLabels(...)` call at the root of the
/// expression produces extra labels; everything else is a plain scalar (spec
/// 4.G: "Expressions may return either a scalar ... or a constructor call
/// `WithLabels(scalar, map<string,string>)`").
fn eval_top(expr: &Expr, env: &Env) -> anyhow::Result<EvalResult> {
    if let Expr::Call(name, args) = expr {
        if name == "WithLabels" {
            ensure!(args.len() == 2, "WithLabels expects exactly 2 arguments, got {}", args.len());
            let scalar = eval(&args[0], env)?;
            let labels = eval_label_map(&args[1], env)?;
            return Ok(EvalResult::WithLabels(scalar, labels));
        }
    }
    Ok(EvalResult::Scalar(eval(expr, env)?))
}

fn eval_label_map(expr: &Expr, env: &Env) -> anyhow::Result<Vec<(String, String)>> {
    let Expr::MapLiteral(entries) = expr else {
        bail!("WithLabels' second argument must be a map literal");
    };
    entries.iter().map(|(k, v)| Ok((k.clone(), value_to_label_string(&eval(v, env)?)))).collect()
}

fn value_to_label_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn eval(expr: &Expr, env: &Env) -> anyhow::Result<Value> {
    match expr {
        Expr::Number(n) => Ok(Value::from(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(name) => Ok(env.lookup(name)?.clone()),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, env)?))),
        Expr::Field(base, name) => {
            let v = eval(base, env)?;
            Ok(v.as_object().and_then(|o| o.get(name)).cloned().unwrap_or(Value::Null))
        },
        Expr::Index(base, idx) => {
            let v = eval(base, env)?;
            let i = eval(idx, env)?;
            match (&v, i.as_i64()) {
                (Value::Array(arr), Some(i)) => {
                    let idx = if i >= 0 { Some(i as usize) } else { arr.len().checked_sub(i.unsigned_abs() as usize) };
                    Ok(idx.and_then(|i| arr.get(i)).cloned().unwrap_or(Value::Null))
                },
                _ => Ok(Value::Null),
            }
        },
        Expr::MapLiteral(entries) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), eval(v, env)?);
            }
            Ok(Value::Object(obj))
        },
        Expr::MethodCall(base, name, args) => eval_method(base, name, args, env),
        Expr::Call(name, args) => eval_call(name, args, env),
        Expr::MapComprehension(base, var, body) => {
            let v = eval(base, env)?;
            match v {
                Value::Array(items) => {
                    let mapped: anyhow::Result<Vec<Value>> =
                        items.into_iter().map(|item| eval(body, &env.with(var, item))).collect();
                    Ok(Value::Array(mapped?))
                },
                Value::Object(obj) => {
                    let mut mapped = serde_json::Map::new();
                    for (k, item) in obj {
                        mapped.insert(k, eval(body, &env.with(var, item))?);
                    }
                    Ok(Value::Object(mapped))
                },
                other => Ok(other),
            }
        },
        Expr::BinOp(op, lhs, rhs) => eval_binop(*op, lhs, rhs, env),
    }
}

fn eval_method(base: &Expr, name: &str, args: &[Expr], env: &Env) -> anyhow::Result<Value> {
    let v = eval(base, env)?;
    match name {
        "size" => Ok(Value::from(match &v {
            Value::Array(a) => a.len(),
            Value::Object(o) => o.len(),
            Value::String(s) => s.len(),
            _ => 0,
        })),
        "contains" => {
            ensure!(args.len() == 1, "contains expects exactly 1 argument");
            let needle = eval(&args[0], env)?;
            Ok(Value::Bool(match &v {
                Value::Array(a) => a.contains(&needle),
                Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
                _ => false,
            }))
        },
        other => bail!(ExpressionError::unknown_function(other)),
    }
}

fn eval_call(name: &str, args: &[Expr], env: &Env) -> anyhow::Result<Value> {
    match name {
        // WithLabels outside the top-level position has no labels to carry, so
        // it degrades to its scalar argument; this only arises inside a nested
        // expression (e.g. a map comprehension body), not the documented usage.
        "WithLabels" => {
            ensure!(!args.is_empty(), "WithLabels expects at least 1 argument");
            eval(&args[0], env)
        },
        "has" => {
            ensure!(args.len() == 2, "has expects exactly 2 arguments");
            let v = eval(&args[0], env)?;
            let key = eval(&args[1], env)?;
            Ok(Value::Bool(v.as_object().zip(key.as_str()).map(|(o, k)| o.contains_key(k)).unwrap_or(false)))
        },
        other => bail!(ExpressionError::unknown_function(other)),
    }
}

fn eval_binop(op: BinOp, lhs: &Expr, rhs: &Expr, env: &Env) -> anyhow::Result<Value> {
    if matches!(op, BinOp::And | BinOp::Or) {
        let l = truthy(&eval(lhs, env)?);
        return Ok(Value::Bool(match op {
            BinOp::And => l && truthy(&eval(rhs, env)?),
            BinOp::Or => l || truthy(&eval(rhs, env)?),
            _ => unreachable!(),
        }));
    }

    let l = eval(lhs, env)?;
    let r = eval(rhs, env)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(l == r)),
        BinOp::Ne => Ok(Value::Bool(l != r)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (a, b) = (as_f64(&l)?, as_f64(&r)?);
            Ok(Value::Bool(match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                BinOp::Ge => a >= b,
                _ => unreachable!(),
            }))
        },
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let (a, b) = (as_f64(&l)?, as_f64(&r)?);
            Ok(Value::from(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                _ => unreachable!(),
            }))
        },
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_f64(v: &Value) -> anyhow::Result<f64> {
    v.as_f64().ok_or_else(|| anyhow!("expected a numeric value, got {v:?}"))
}
