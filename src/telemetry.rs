//! Logging and metrics setup.

use metrics::Unit;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub(crate) const AUTHENTICATIONS_TOTAL: &str = "identity_authentications_total";
pub(crate) const COMMITS_TOTAL: &str = "identity_commits_total";
pub(crate) const USERS_CREATED_TOTAL: &str = "identity_users_created_total";

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling it twice is
/// harmless, the second call is ignored.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

/// Register descriptions of every metric emitted by the store.
///
/// Recorder installation is left to the embedding process.
pub fn describe_metrics() {
    metrics::describe_counter!(
        AUTHENTICATIONS_TOTAL,
        Unit::Count,
        "Authentication attempts, labelled by outcome."
    );
    metrics::describe_counter!(
        COMMITS_TOTAL,
        Unit::Count,
        "Snapshots written to disk."
    );
    metrics::describe_counter!(
        USERS_CREATED_TOTAL,
        Unit::Count,
        "Users added to the store."
    );
}

/// Count one authentication attempt.
pub(crate) fn authentication(outcome: &'static str) {
    let labels = [("outcome", outcome)];
    metrics::counter!(AUTHENTICATIONS_TOTAL, &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init("identity_store=debug");
        init("identity_store=info");
        describe_metrics();
        authentication("success");
        tracing::info!("telemetry initialised");
    }
}
