use ksm_core::quantity::parse_quantity;
use ksm_core::time::rfc3339_to_unix;
use serde_json::Value;

/// Coerces a resolved JSON leaf into a metric value (spec 4.G "A terminal leaf is
/// one of..."). Returns `None` on any failure, which the caller treats as "drop
/// this line and increment the error counter" (spec 7 "per-object extraction
/// errors").
///
/// String leaves are tried in this order: boolean words, RFC-3339 timestamp,
/// Kubernetes quantity, percentage, plain float literal (spec 4.G). The ordering
/// matters because a value like `"2"` is a valid quantity and a valid float, and
/// a value like `"5Gi"` is only a valid quantity, not a float.
pub fn coerce_leaf(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => coerce_str(s),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn coerce_str(s: &str) -> Option<f64> {
    if let Some(b) = boolean_word(s) {
        return Some(b);
    }
    if let Ok(ts) = rfc3339_to_unix(s) {
        return Some(ts as f64);
    }
    if let Some(pct) = percentage(s) {
        return Some(pct);
    }
    if let Ok(q) = parse_quantity(s) {
        return Some(q);
    }
    s.parse::<f64>().ok()
}

/// `unknown`/`Unknown` is a recognized boolean word but intentionally not mapped
/// to a number: it signals "don't know", not a true/false value, so it falls
/// through and the leaf is ultimately dropped (spec 9 open question: "the current
/// behavior appears to follow declaration order ... implementations should pick
/// one rule and hold to it").
fn boolean_word(s: &str) -> Option<f64> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(1.0),
        "false" | "no" => Some(0.0),
        _ => None,
    }
}

fn percentage(s: &str) -> Option<f64> {
    let trimmed = s.strip_suffix('%')?;
    trimmed.trim().parse::<f64>().ok().map(|v| v / 100.0)
}
