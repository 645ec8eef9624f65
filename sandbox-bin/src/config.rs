//! Deployment-wide settings read from the environment. Per-invocation policy
//! never lives here — it comes only from the command line (§4.1); this
//! module is the only place in the crate that calls `std::env::var`.

/// Map `SUPERVISOR_LOG`'s standard level name to a `stderrlog` verbosity
/// count. Absent or unrecognised values leave the `-v`-derived count
/// untouched.
pub fn log_verbosity_override() -> Option<usize> {
    let name = std::env::var("SUPERVISOR_LOG").ok()?;
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
    fn recognises_standard_level_names() {
        std::env::set_var("SUPERVISOR_LOG", "debug");
        assert_eq!(Some(3), log_verbosity_override());
        std::env::remove_var("SUPERVISOR_LOG");
    }

    #[test]
    fn absent_variable_yields_none() {
        std::env::remove_var("SUPERVISOR_LOG");
        assert_eq!(None, log_verbosity_override());
    }
}
