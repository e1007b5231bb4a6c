//! Tracing setup for the portal.
//!
//! The filter sits behind a reload handle: the binary starts logging at
//! `info` before the configuration is read, then swaps in `logging.level`.
//! A plain level such as `debug` applies to this service's crates
//! (`lostfound_server`, `lostfound_cache`) while the HTTP and Redis
//! plumbing stays at `warn`; anything containing a directive (`=` or `,`)
//! is used verbatim. `RUST_LOG`, when set, always wins.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

const SERVICE_TARGETS: &[&str] = &["lostfound_server", "lostfound_cache"];
const QUIET_TARGETS: &[&str] = &["tower_http", "hyper", "h2", "redis", "deadpool"];

/// Expand a configured level into filter directives.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') || level.eq_ignore_ascii_case("off") {
        return level.to_string();
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(SERVICE_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    directives.join(",")
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directives(level)).unwrap_or_else(|e| {
        eprintln!("Invalid log level '{level}' ({e}), falling back to info");
        EnvFilter::new(filter_directives("info"))
    })
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(level)),
        None => build_filter(level),
    };

    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Apply the configured level, unless RUST_LOG is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.reload(build_filter(level)) {
        eprintln!("Failed to apply log level '{level}': {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_targets_service_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("lostfound_server=debug"));
        assert!(directives.contains("lostfound_cache=debug"));
        assert!(directives.contains("tower_http=warn"));
        assert!(directives.contains("redis=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn off_silences_everything() {
        assert_eq!(filter_directives("off"), "off");
    }

    #[test]
    fn explicit_directives_pass_through() {
        assert_eq!(
            filter_directives("info,lostfound_cache=trace"),
            "info,lostfound_cache=trace"
        );
    }
}
