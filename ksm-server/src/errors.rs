use rocket::Responder;

/// Errors that can surface at the rocket boundary (spec 7). The only fallible
/// input from an HTTP client today is `/metrics`'s optional `name` query
/// parameter (spec 6 "Query parameter allowing per-request family name
/// filter"); a bad pattern there is a client error, not a server fault.
#[derive(Responder)]
pub enum ScrapeError {
    #[response(status = 400)]
    BadNameFilter(String),
}

impl From<anyhow::Error> for ScrapeError {
    fn from(e: anyhow::Error) -> Self {
        Self::BadNameFilter(format!("invalid name filter: {e}"))
    }
}

/// Startup-time errors (spec 7 "Configuration errors", "transient/permanent
/// API errors"), surfaced through `main`'s exit code rather than an HTTP
/// response (spec 6 "Exit codes"): non-zero on configuration error, failure
/// to reach the cluster, or any other unrecoverable startup error.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Configuration(#[source] anyhow::Error),

    #[error("failed to reach the cluster: {0}")]
    ClusterUnreachable(#[source] anyhow::Error),
}
