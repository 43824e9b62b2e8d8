use chrono::DateTime;

/// Parses an RFC-3339 timestamp (as found in object status fields, e.g.
/// `lastTransitionTime`) into Unix seconds. Used by the custom-resource engine's
/// string-leaf coercion (spec 4.G) and by built-in family generators that surface
/// condition/status timestamps.
pub fn rfc3339_to_unix(s: &str) -> anyhow::Result<i64> {
    Ok(DateTime::parse_from_rfc3339(s)?.timestamp())
}
