//! Deployment-wide settings, read once from the environment. Per-invocation
//! policy never lives here — it comes from the command line (the Supervisor
//! owns that, not the Monitor). This module is the only place in the crate
//! that calls `std::env::var`.

use std::path::PathBuf;

const DEFAULT_MONITOR_DIR: &str = "/var/log/wave-sandbox/monitor";
const DEFAULT_RETENTION: usize = 10;
const DEFAULT_METRICS_PORT: u16 = 9797;

pub fn monitor_dir() -> PathBuf {
    std::env::var("SUPERVISOR_MONITOR_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_MONITOR_DIR))
}

pub fn monitor_retention() -> usize {
    std::env::var("SUPERVISOR_MONITOR_RETENTION")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETENTION)
}

/// Whether the metrics endpoint is enabled. The endpoint's transport is out
/// of scope for this implementation (it is specified only as a log file
/// contract); this flag is still read and surfaced so a future collaborator
/// wiring up the exporter has a single place to look.
pub fn metrics_enabled() -> bool {
    std::env::var("SUPERVISOR_METRICS_ENABLED")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn metrics_port() -> u16 {
    std::env::var("SUPERVISOR_METRICS_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_METRICS_PORT)
}

/// Map `MONITOR_LOG`'s standard level name to a `stderrlog` verbosity count.
/// Absent or unrecognised values leave the hard-coded default untouched.
pub fn log_verbosity_override() -> Option<usize> {
    let name = std::env::var("MONITOR_LOG").ok()?;
    match name.to_ascii_lowercase().as_str() {
        "error" => Some(0),
        "warn" => Some(1),
        "info" => Some(2),
        "debug" => Some(3),
        "trace" => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        std::env::remove_var("SUPERVISOR_MONITOR_DIR");
        std::env::remove_var("SUPERVISOR_MONITOR_RETENTION");
        std::env::remove_var("SUPERVISOR_METRICS_ENABLED");
        std::env::remove_var("SUPERVISOR_METRICS_PORT");
        assert_eq!(PathBuf::from(DEFAULT_MONITOR_DIR), monitor_dir());
        assert_eq!(DEFAULT_RETENTION, monitor_retention());
        assert!(!metrics_enabled());
        assert_eq!(DEFAULT_METRICS_PORT, metrics_port());
    }

    #[test]
    fn log_override_recognises_standard_level_names() {
        std::env::set_var("MONITOR_LOG", "trace");
        assert_eq!(Some(4), log_verbosity_override());
        std::env::remove_var("MONITOR_LOG");
    }
}
