use std::collections::BTreeMap;

use regex::Regex;

lazy_static::lazy_static! {
    static ref INVALID_IDENT_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_]+").unwrap();
    static ref LEADING_DIGIT: Regex = Regex::new(r"^[0-9]").unwrap();
}

/// Sanitizes an arbitrary Kubernetes label/annotation key into a Prometheus-valid
/// identifier: non-alphanumeric runs collapse to a single underscore, and a
/// leading digit gets an underscore prefix (spec 4.C).
pub fn sanitize_label_key(key: &str) -> String {
    let collapsed = INVALID_IDENT_CHARS.replace_all(key, "_").into_owned();
    if LEADING_DIGIT.is_match(&collapsed) {
        format!("_{collapsed}")
    } else {
        collapsed
    }
}

/// Per-kind control over which object metadata keys become Prometheus labels on
/// the `<kind>_labels` / `<kind>_annotations` families (spec 4.C).
#[derive(Debug, Clone)]
pub enum KeyAllowList {
    All,
    Only(Vec<String>),
}

impl KeyAllowList {
    /// Projects `source` (object labels or annotations) down to the allowed keys,
    /// sanitizing each surviving key into a Prometheus-valid identifier.
    pub fn project(&self, source: &BTreeMap<String, String>) -> Vec<(String, String)> {
        match self {
            KeyAllowList::All => {
                source.iter().map(|(k, v)| (sanitize_label_key(k), v.clone())).collect()
            },
            KeyAllowList::Only(keys) => keys
                .iter()
                .filter_map(|k| source.get(k).map(|v| (sanitize_label_key(k), v.clone())))
                .collect(),
        }
    }
}
