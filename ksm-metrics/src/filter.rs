use ksm_core::errors::*;
use regex::Regex;

err_impl! {FilterError,
    #[error("invalid regex in metric name filter: {0}")]
    InvalidPattern(String),
}

enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Exact(s) => s == name,
            Matcher::Pattern(re) => re.is_match(name),
        }
    }
}

fn compile_matcher(raw: &str) -> anyhow::Result<Matcher> {
    // Entries that look like they're meant as regexes (contain a metacharacter)
    // are compiled as such; everything else is matched literally. Either way an
    // invalid pattern fails configuration load (spec 4.B).
    if raw.chars().any(|c| "\\^$.|?*+()[]{}".contains(c)) {
        let re = Regex::new(raw).map_err(|_| FilterError::invalid_pattern(raw))?;
        Ok(Matcher::Pattern(re))
    } else {
        Ok(Matcher::Exact(raw.to_string()))
    }
}

/// Decides whether a family is emitted, by literal name or regex (spec 4.B). A
/// family passes iff it matches allow (or allow is empty) AND does not match deny.
pub struct NameFilter {
    allow: Vec<Matcher>,
    deny: Vec<Matcher>,
}

impl NameFilter {
    pub fn new(allow: &[String], deny: &[String]) -> anyhow::Result<NameFilter> {
        Ok(NameFilter {
            allow: allow.iter().map(|s| compile_matcher(s)).collect::<anyhow::Result<_>>()?,
            deny: deny.iter().map(|s| compile_matcher(s)).collect::<anyhow::Result<_>>()?,
        })
    }

    pub fn passes(&self, name: &str) -> bool {
        let allowed = self.allow.is_empty() || self.allow.iter().any(|m| m.matches(name));
        if !allowed {
            return false;
        }
        !self.deny.iter().any(|m| m.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_empty_filter_passes_everything() {
        let f = NameFilter::new(&[], &[]).unwrap();
        assert!(f.passes("kube_pod_info"));
    }

    #[rstest]
    fn test_allow_exact() {
        let f = NameFilter::new(&["kube_pod_info".to_string()], &[]).unwrap();
        assert!(f.passes("kube_pod_info"));
        assert!(!f.passes("kube_pod_status_phase"));
    }

    #[rstest]
    fn test_allow_regex() {
        let f = NameFilter::new(&["^kube_pod_.*".to_string()], &[]).unwrap();
        assert!(f.passes("kube_pod_info"));
        assert!(!f.passes("kube_node_info"));
    }

    #[rstest]
    fn test_deny_overrides_allow() {
        let f = NameFilter::new(&["^kube_pod_.*".to_string()], &["kube_pod_info".to_string()]).unwrap();
        assert!(!f.passes("kube_pod_info"));
        assert!(f.passes("kube_pod_status_phase"));
    }

    #[rstest]
    fn test_invalid_regex_is_fatal() {
        assert!(NameFilter::new(&["(unterminated".to_string()], &[]).is_err());
    }
}
