use pest::iterators::Pair;

use super::Rule;

/// One node of a compiled expression-language program (spec 4.G, 9). Built once at
/// configuration-compile time and shared read-only thereafter (spec 3 "Compiled
/// expression program").
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    /// The single bound variable referenced by name (`value`, or a `.map(k, ...)`
    /// loop variable while inside that comprehension's body).
    Var(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    MapLiteral(Vec<(String, Expr)>),
    Call(String, Vec<Expr>),
    MethodCall(Box<Expr>, String, Vec<Expr>),
    /// `base.map(var, body)`.
    MapComprehension(Box<Expr>, String, Box<Expr>),
    Not(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

pub(super) fn build_program(pair: Pair<Rule>) -> Expr {
    let expr_pair = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .expect("program always wraps exactly one expr");
    build_expr(expr_pair)
}

fn build_expr(pair: Pair<Rule>) -> Expr {
    assert_eq!(pair.as_rule(), Rule::expr);
    build_or(pair.into_inner().next().unwrap())
}

fn build_or(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut acc = build_and(inner.next().unwrap());
    for rhs in inner {
        acc = Expr::BinOp(BinOp::Or, Box::new(acc), Box::new(build_and(rhs)));
    }
    acc
}

fn build_and(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut acc = build_cmp(inner.next().unwrap());
    for rhs in inner {
        acc = Expr::BinOp(BinOp::And, Box::new(acc), Box::new(build_cmp(rhs)));
    }
    acc
}

fn build_cmp(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let lhs = build_add(inner.next().unwrap());
    match (inner.next(), inner.next()) {
        (Some(op), Some(rhs)) => {
            let op = match op.as_str() {
                "==" => BinOp::Eq,
                "!=" => BinOp::Ne,
                "<=" => BinOp::Le,
                ">=" => BinOp::Ge,
                "<" => BinOp::Lt,
                ">" => BinOp::Gt,
                other => unreachable!("unknown comparison operator: {other}"),
            };
            Expr::BinOp(op, Box::new(lhs), Box::new(build_add(rhs)))
        },
        _ => lhs,
    }
}

fn build_add(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut acc = build_mul(inner.next().unwrap());
    while let (Some(op), Some(rhs)) = (inner.next(), inner.next()) {
        let op = if op.as_str() == "+" { BinOp::Add } else { BinOp::Sub };
        acc = Expr::BinOp(op, Box::new(acc), Box::new(build_mul(rhs)));
    }
    acc
}

fn build_mul(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut acc = build_unary(inner.next().unwrap());
    while let (Some(op), Some(rhs)) = (inner.next(), inner.next()) {
        let op = if op.as_str() == "*" { BinOp::Mul } else { BinOp::Div };
        acc = Expr::BinOp(op, Box::new(acc), Box::new(build_unary(rhs)));
    }
    acc
}

fn build_unary(pair: Pair<Rule>) -> Expr {
    match pair.as_rule() {
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = inner.next().unwrap();
            match first.as_rule() {
                Rule::not_op => Expr::Not(Box::new(build_unary(inner.next().unwrap()))),
                Rule::postfix => build_postfix(first),
                other => unreachable!("unexpected rule inside unary: {other:?}"),
            }
        },
        Rule::postfix => build_postfix(pair),
        other => unreachable!("unexpected rule in unary position: {other:?}"),
    }
}

fn build_postfix(pair: Pair<Rule>) -> Expr {
    let mut inner = pair.into_inner();
    let mut acc = build_primary(inner.next().unwrap());
    for trailer in inner {
        let inner_trailer = trailer.into_inner().next().unwrap();
        acc = match inner_trailer.as_rule() {
            Rule::map_call => {
                let mut parts = inner_trailer.into_inner();
                let var = parts.next().unwrap().as_str().to_string();
                let body = build_expr(parts.next().unwrap());
                Expr::MapComprehension(Box::new(acc), var, Box::new(body))
            },
            Rule::field_access => {
                let mut parts = inner_trailer.into_inner();
                let name = parts.next().unwrap().as_str().to_string();
                match parts.next() {
                    Some(args_pair) => {
                        let args = args_pair.into_inner().map(build_expr).collect();
                        Expr::MethodCall(Box::new(acc), name, args)
                    },
                    None => Expr::Field(Box::new(acc), name),
                }
            },
            Rule::index_access => {
                let idx = build_expr(inner_trailer.into_inner().next().unwrap());
                Expr::Index(Box::new(acc), Box::new(idx))
            },
            other => unreachable!("unexpected trailer rule: {other:?}"),
        };
    }
    acc
}

fn build_primary(pair: Pair<Rule>) -> Expr {
    let pair = pair.into_inner().next().unwrap();
    match pair.as_rule() {
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str().to_string();
            let args = inner.next().map(|a| a.into_inner().map(build_expr).collect()).unwrap_or_default();
            Expr::Call(name, args)
        },
        Rule::map_literal => {
            let entries = pair
                .into_inner()
                .map(|entry| {
                    let mut parts = entry.into_inner();
                    let key_pair = parts.next().unwrap();
                    let key = match key_pair.as_rule() {
                        Rule::string => unquote(key_pair.as_str()),
                        _ => key_pair.as_str().to_string(),
                    };
                    let value = build_expr(parts.next().unwrap());
                    (key, value)
                })
                .collect();
            Expr::MapLiteral(entries)
        },
        Rule::number => Expr::Number(pair.as_str().parse().expect("grammar guarantees a valid float literal")),
        Rule::string => Expr::Str(unquote(pair.as_str())),
        Rule::boolean => Expr::Bool(pair.as_str() == "true"),
        Rule::ident => Expr::Var(pair.as_str().to_string()),
        Rule::expr => build_expr(pair),
        other => unreachable!("unexpected primary rule: {other:?}"),
    }
}

fn unquote(raw: &str) -> String {
    raw.trim_start_matches('"').trim_end_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::super::parse;
    use super::*;

    #[rstest]
    fn test_number_literal() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
    }

    #[rstest]
    fn test_field_access() {
        assert_eq!(
            parse("value.status").unwrap(),
            Expr::Field(Box::new(Expr::Var("value".into())), "status".into())
        );
    }

    #[rstest]
    fn test_binop_precedence() {
        // 1 + 2 * 3 should parse as 1 + (2 * 3)
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::BinOp(
                BinOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::BinOp(BinOp::Mul, Box::new(Expr::Number(2.0)), Box::new(Expr::Number(3.0))))
            )
        );
    }

    #[rstest]
    fn test_with_labels_call() {
        let parsed = parse(r#"WithLabels(value, {foo: "bar"})"#).unwrap();
        match parsed {
            Expr::Call(name, args) => {
                assert_eq!(name, "WithLabels");
                assert_eq!(args.len(), 2);
            },
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[rstest]
    fn test_map_comprehension() {
        let parsed = parse("value.map(x, x.count)").unwrap();
        match parsed {
            Expr::MapComprehension(base, var, body) => {
                assert_eq!(*base, Expr::Var("value".into()));
                assert_eq!(var, "x");
                assert_eq!(*body, Expr::Field(Box::new(Expr::Var("x".into())), "count".into()));
            },
            other => panic!("expected a map comprehension, got {other:?}"),
        }
    }

    #[rstest]
    fn test_invalid_expression_errors() {
        assert!(parse("value +").is_err());
    }
}
