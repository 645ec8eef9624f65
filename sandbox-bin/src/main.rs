//! The supervisor: the `SUPERVISOR` program of the process sandbox. Parses
//! its argument vector into a `Policy`, forks, runs the enforcer in the
//! child, waits for and classifies the child's termination in the parent,
//! and emits a structured `RunResult`.

#[macro_use]
extern crate error_chain;
extern crate sandbox;

mod config;
mod output;

use std::os::unix::io::RawFd;
use std::str::FromStr;
use std::time::{Duration, Instant};

use error_chain::ChainedError;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::ForkResult;

use sandbox::{ParseOutcome, RestrictionsInstalled, RunResult};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Sandbox(sandbox::Error, sandbox::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Nix(::nix::Error);
        Json(::serde_json::Error);
    }
}

/// Exit code used for supervisor-side failures that occur before or instead
/// of a normal wait: bad arguments, jail validation failure, fork failure,
/// or an enforcer/exec failure observed as a non-zero child exit.
const EXIT_SUPERVISOR_FAILURE: i32 = 2;

/// Exit code used when the child was terminated by a signal; distinct from
/// the target's own exit codes, which are echoed verbatim on normal exit.
const EXIT_CHILD_SIGNALED: i32 = 1;

/// Interval, in seconds, at which the optional timeout watchdog polls the
/// child non-blockingly (§5).
const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn usage() -> &'static str {
"usage: supervisor [SUPERVISOR-FLAG ...] [OPTION ...] TARGET [TARGET-ARG ...]

Supervisor flags (consumed before OPTIONs, not part of the policy):
  --json              emit the result as a single structured JSON object
  --monitor[=SECS]    spawn the out-of-process monitor, sampling every SECS
                       seconds (default 1.0)
  -v, --verbose        increase log verbosity (repeatable); overridden by
                       SUPERVISOR_LOG when set

Options:
  cpu=N        CPU time limit in seconds (0 = no limit)
  mem=M        memory limit in megabytes (0 = no limit)
  procs=N      process count limit (0 = no limit)
  fsize=M      file size limit in megabytes (0 = no limit)
  jail=PATH    chroot into PATH before exec
  no-net, --no-net    deny outbound network syscalls
  timeout=S    wall-clock timeout in seconds, extension beyond the core contract
  help, --help         print this message and exit successfully
  --           end of options; remaining tokens are the target verbatim
"
}

struct SupervisorFlags {
    json: bool,
    monitor_interval: Option<f64>,
    verbosity: usize,
}

/// Strip the supervisor binary's own presentation flags from the front of
/// `args`, returning them along with the remaining tokens to hand to
/// `sandbox::policy::parse`. These flags are not part of the Policy model:
/// they govern how this binary renders output and whether it launches the
/// monitor, not what restrictions are requested of the child.
fn split_supervisor_flags(args: &[String]) -> (SupervisorFlags, &[String]) {
    let mut flags = SupervisorFlags { json: false, monitor_interval: None, verbosity: 2 };
    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--json" => { flags.json = true; idx += 1; },
            "-v" | "--verbose" => { flags.verbosity += 1; idx += 1; },
            "--monitor" => { flags.monitor_interval = Some(1.0); idx += 1; },
            s if s.starts_with("--monitor=") => {
                let value = &s["--monitor=".len()..];
                flags.monitor_interval = Some(f64::from_str(value).unwrap_or(1.0));
                idx += 1;
            },
            _ => break,
        }
    }
    (flags, &args[idx..])
}

/// Spawn the out-of-process monitor, detached, attached to `pid`. Failure to
/// spawn it is logged and otherwise ignored: the monitor is an optional
/// observational collaborator, not a policy-enforcing one.
fn spawn_monitor(pid: i32, run_id: &str, interval: f64) {
    let exe = std::env::current_exe().ok()
        .and_then(|p| p.parent().map(|d| d.join("monitor")));
    let mut command = match exe {
        Some(path) if path.exists() => std::process::Command::new(path),
        _ => std::process::Command::new("monitor"),
    };
    command
        .arg("--attach").arg(pid.to_string())
        .arg("--run-id").arg(run_id)
        .arg("--interval").arg(interval.to_string());

    match command.spawn() {
        Ok(_child) => log::info!("monitor attached to pid {}", pid),
        Err(e) => log::warn!("failed to spawn monitor for pid {}: {}", pid, e),
    }
}

/// Read the single restriction-coverage byte the child writes to the pipe
/// just before exec. EOF (the child died before writing) is treated as "no
/// restriction confirmed installed", per the enforcer contract.
fn read_restrictions(read_fd: RawFd) -> RestrictionsInstalled {
    let mut buf = [0u8; 1];
    match nix::unistd::read(read_fd, &mut buf) {
        Ok(1) => RestrictionsInstalled {
            limits: buf[0] & 0b001 != 0,
            jail: buf[0] & 0b010 != 0,
            network_filter: buf[0] & 0b100 != 0,
        },
        _ => RestrictionsInstalled::default(),
    }
}

/// Wait for `pid` to terminate. If `timeout_seconds` is set, poll
/// non-blockingly at a 1-second cadence and, on expiry, send an unmaskable
/// kill and reap the child; the second element of the returned tuple is
/// `true` iff this watchdog is what killed the child.
fn wait_for_child(pid: nix::unistd::Pid, timeout_seconds: Option<u64>)
    -> Result<(WaitStatus, bool)> {
    let timeout = match timeout_seconds {
        None => return Ok((waitpid(pid, None)?, false)),
        Some(0) => return Ok((waitpid(pid, None)?, false)),
        Some(secs) => Duration::from_secs(secs),
    };

    let started = Instant::now();
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG))? {
            WaitStatus::StillAlive => {
                if started.elapsed() >= timeout {
                    log::warn!("timeout of {:?} exceeded for pid {}, killing", timeout, pid);
                    nix::sys::signal::kill(pid, Signal::SIGKILL)?;
                    let status = waitpid(pid, None)?;
                    return Ok((status, true));
                }
                std::thread::sleep(TIMEOUT_POLL_INTERVAL);
            },
            status => return Ok((status, false)),
        }
    }
}

fn do_main() -> Result<i32> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (flags, policy_args) = split_supervisor_flags(&args);

    let verbosity = config::log_verbosity_override().unwrap_or(flags.verbosity);
    stderrlog::new()
        .module(module_path!())
        .verbosity(verbosity)
        .init()
        .chain_err(|| "failed to initialize logging")?;

    let policy = match sandbox::policy::parse(policy_args)? {
        ParseOutcome::Help => {
            print!("{}", usage());
            return Ok(0);
        },
        ParseOutcome::Policy(p) => p,
    };

    log::info!("policy parsed: {:?}", policy);
    output::print_policy_summary(&policy);

    let (read_fd, write_fd) = nix::unistd::pipe()?;

    let start = Instant::now();
    match nix::unistd::fork()? {
        ForkResult::Child => {
            let _ = nix::unistd::close(read_fd);
            match sandbox::enforcer::run(&policy, write_fd) {
                Ok(()) => unreachable!("enforcer::run returned Ok without exec-ing"),
                Err(e) => {
                    eprintln!("supervisor: enforcer error: {}", e.display_chain());
                    std::process::exit(EXIT_SUPERVISOR_FAILURE);
                },
            }
        },
        ForkResult::Parent { child } => {
            let _ = nix::unistd::close(write_fd);
            let pid = child.as_raw();

            output::print_starting(&policy, pid);

            if let Some(interval) = flags.monitor_interval {
                let run_id = format!("{}-{}", pid, start.elapsed().as_nanos());
                spawn_monitor(pid, &run_id, interval);
            }

            let (wait_status, killed_by_timeout) =
                wait_for_child(child, policy.timeout_seconds)?;
            let elapsed = Some(start.elapsed().as_secs_f64());

            let restrictions = read_restrictions(read_fd);
            let _ = nix::unistd::close(read_fd);

            let result = sandbox::classify(
                &policy, pid, wait_status, restrictions, elapsed, killed_by_timeout)?;

            log::info!("run finished: success={} exit_code={:?} signal={:?}",
                result.success, result.exit_code, result.signal_name);

            if flags.json {
                output::print_json(&result)?;
            } else {
                output::print_terminal_block(&result);
            }

            Ok(exit_code_for(&result))
        },
    }
}

/// Map a `RunResult` to the supervisor's own exit code (§6): the child's
/// exit code on normal termination, else a distinct signalled-termination
/// code.
fn exit_code_for(result: &RunResult) -> i32 {
    match result.exit_code {
        Some(code) => code,
        None => EXIT_CHILD_SIGNALED,
    }
}

fn main() {
    let code = match do_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("supervisor: error: {}", e.display_chain());
            EXIT_SUPERVISOR_FAILURE
        },
    };
    std::process::exit(code);
}
