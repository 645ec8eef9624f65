//! The monitor: an out-of-process sampler attached to a supervised child by
//! PID. Runs single-threadedly against a monotonic sleep loop, appending one
//! JSONL event record per tick to a rolling log, independent of the
//! Supervisor's own policy decisions.

#[macro_use]
extern crate error_chain;

mod config;
mod eventlog;
mod procfs;
mod sample;
mod session;

use std::str::FromStr;
use std::time::Duration;

use session::MonitorSession;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
    }

    errors {
        MissingArgument(name: &'static str) {
            description("missing required argument")
            display("missing required argument: --{}", name)
        }

        InvalidArgument(name: &'static str, value: String) {
            description("invalid argument value")
            display("invalid value for --{}: '{}'", name, value)
        }
    }
}

/// Lowest and highest sample interval accepted, in seconds (§3 `sample_interval`).
const MIN_INTERVAL_SECONDS: f64 = 0.2;
const MAX_INTERVAL_SECONDS: f64 = 5.0;

struct Args {
    pid: i32,
    run_id: String,
    interval: f64,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut pid = None;
    let mut run_id = None;
    let mut interval = 1.0;

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--attach" => {
                let value = iter.next()
                    .ok_or_else(|| Error::from(ErrorKind::MissingArgument("attach")))?;
                pid = Some(i32::from_str(value)
                    .map_err(|_| Error::from(ErrorKind::InvalidArgument("attach", value.clone())))?);
            },
            "--run-id" => {
                let value = iter.next()
                    .ok_or_else(|| Error::from(ErrorKind::MissingArgument("run-id")))?;
                run_id = Some(value.clone());
            },
            "--interval" => {
                let value = iter.next()
                    .ok_or_else(|| Error::from(ErrorKind::MissingArgument("interval")))?;
                interval = f64::from_str(value)
                    .map_err(|_| Error::from(ErrorKind::InvalidArgument("interval", value.clone())))?;
            },
            other => {
                log::warn!("ignoring unrecognised monitor argument: {}", other);
            },
        }
    }

    let pid = pid.ok_or_else(|| Error::from(ErrorKind::MissingArgument("attach")))?;
    let run_id = run_id.unwrap_or_else(|| pid.to_string());
    let interval = interval.max(MIN_INTERVAL_SECONDS).min(MAX_INTERVAL_SECONDS);

    Ok(Args { pid, run_id, interval })
}

fn do_main() -> Result<()> {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw_args)?;

    stderrlog::new()
        .module(module_path!())
        .verbosity(config::log_verbosity_override().unwrap_or(2))
        .init()
        .chain_err(|| "failed to initialize logging")?;

    log::info!("attaching to pid {} with interval {}s", args.pid, args.interval);
    if config::metrics_enabled() {
        log::warn!("SUPERVISOR_METRICS_ENABLED is set but no metrics transport is implemented \
            (port {}); the log file remains the only observable contract", config::metrics_port());
    }

    let dir = config::monitor_dir();
    let mut session = MonitorSession::attach(
        &dir, args.pid, &args.run_id, args.interval, config::monitor_retention())?;

    let interval = Duration::from_secs_f64(args.interval);
    while session.child_alive() {
        std::thread::sleep(interval);
        if !session.child_alive() {
            break;
        }
        if let Err(e) = session.sample() {
            log::warn!("sample failed: {}", e);
        }
    }

    log::info!("pid {} is gone, closing monitor session", args.pid);
    session.detach(None)?;

    Ok(())
}

fn main() {
    if let Err(e) = do_main() {
        eprintln!("monitor: error: {}", e);
        std::process::exit(1);
    }
}
