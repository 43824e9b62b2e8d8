mod ast;
mod engine;

pub use ast::{BinOp, Expr};
pub use engine::{CompiledExpr, EvalResult};
use pest::Parser;
use pest_derive::Parser;

use crate::errors::*;

#[allow(dead_code)]
#[derive(Parser)]
#[grammar = "src/expr/grammar.pest"]
struct ExprParser;

/// Parses one expression-language snippet into an [`Expr`] tree (spec 3 "Compiled
/// expression program", spec 4.G). Parsing is pure and has no dependency on any
/// particular custom-resource instance; the same source always compiles to an
/// equal tree (spec 8, "compile(path); evaluate is idempotent").
pub fn parse(source: &str) -> anyhow::Result<Expr> {
    let mut pairs = ExprParser::parse(Rule::program, source).map_err(|e| ExpressionError::parse(&e.to_string()))?;
    Ok(ast::build_program(pairs.next().expect("grammar guarantees exactly one program pair")))
}

err_impl! {ExpressionError,
    #[error("failed to parse expression: {0}")]
    Parse(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("unbound variable: {0}")]
    UnboundVariable(String),
}
