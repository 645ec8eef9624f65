//! Rendering of the supervisor's documented stdout contract: bracketed,
//! prefixed human-readable lines by default, or a single structured JSON
//! object in `--json` mode. The target's own stdout/stderr are never
//! touched by this module — they pass through unchanged via inherited file
//! descriptors.

use sandbox::{Policy, RunResult};

/// Print the policy summary line emitted before the child is spawned.
pub fn print_policy_summary(policy: &Policy) {
    println!("[supervisor] policy: cpu={}s mem={}B procs={} fsize={}B jail={} no-net={}",
        policy.cpu_seconds,
        policy.memory_bytes,
        policy.max_processes,
        policy.file_bytes,
        policy.jail_path.as_ref().map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_owned()),
        policy.disable_network);
}

/// Print the "starting command" and PID announcement lines.
pub fn print_starting(policy: &Policy, pid: i32) {
    println!("[supervisor] Starting command: {}", policy.target_argv.join(" "));
    println!("[supervisor] Child PID: {}", pid);
}

/// Print the terminal block describing the run's outcome, in human mode.
pub fn print_terminal_block(result: &RunResult) {
    println!("[supervisor] ---");
    match (result.exit_code, result.signal_number) {
        (Some(code), None) =>
            println!("[supervisor] exited normally with code {}", code),
        (None, Some(_)) =>
            println!("[supervisor] terminated by signal {}",
                result.signal_name.as_deref().unwrap_or("?")),
        _ => println!("[supervisor] terminated with an inconsistent status"),
    }

    if let Some(elapsed) = result.elapsed_seconds {
        println!("[supervisor] elapsed: {:.3}s", elapsed);
    } else {
        println!("[supervisor] elapsed: unavailable");
    }

    let flags = &result.flags;
    if flags.cpu_limit_exceeded { println!("[supervisor] flag: cpu_limit_exceeded"); }
    if flags.memory_limit_exceeded { println!("[supervisor] flag: memory_limit_exceeded"); }
    if flags.file_size_limit_exceeded { println!("[supervisor] flag: file_size_limit_exceeded"); }
    if flags.timeout_exceeded { println!("[supervisor] flag: timeout_exceeded"); }

    println!("[supervisor] restrictions installed: limits={} jail={} network_filter={}",
        result.restrictions_installed.limits,
        result.restrictions_installed.jail,
        result.restrictions_installed.network_filter);
    println!("[supervisor] success: {}", result.success);
}

/// Print `result` as a single structured JSON object (`--json` mode).
pub fn print_json(result: &RunResult) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}
