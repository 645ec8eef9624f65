//! `MonitorSession`: the out-of-process sampler's lifetime for one
//! supervised child. Mirrors the `attach` / `sample` / `detach` interface.

use std::path::Path;

use crate::eventlog::EventLog;
use crate::sample::Sampler;

/// One supervised child's monitoring session: owns the sampler state and
/// the open event log. Dropped without calling `detach` only on a hard
/// process abort; the normal path always closes with a `stop` record.
pub struct MonitorSession {
    pid: i32,
    sampler: Sampler,
    log: EventLog,
}

impl MonitorSession {
    /// Begin sampling `pid`, emitting the `start` event record into `dir`.
    /// Performs rotation of logs beyond `retention` before creating the new
    /// active file, so an attach never competes with its own rotation pass.
    pub fn attach(dir: &Path, pid: i32, run_id: &str, interval: f64, retention: usize)
        -> std::io::Result<MonitorSession> {
        if let Err(e) = crate::eventlog::rotate(dir, retention) {
            log::warn!("log rotation failed before attach: {}", e);
        }

        let log = EventLog::create(dir, pid, run_id, interval)?;
        Ok(MonitorSession { pid, sampler: Sampler::new(pid), log })
    }

    /// Take one sample and append it to the event log. A transient read
    /// failure (the child raced ahead and exited) yields no record rather
    /// than propagating an error: a missed sample is not a session failure.
    pub fn sample(&mut self) -> std::io::Result<()> {
        match self.sampler.sample() {
            Some(sample) => self.log.record_sample(&sample),
            None => Ok(()),
        }
    }

    /// Whether `pid` still exists. The session must never signal the child;
    /// this is a read-only existence probe (`kill(pid, 0)`).
    pub fn child_alive(&self) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(self.pid), None).is_ok()
    }

    /// Close the session, writing the `stop` record with the session
    /// summary.
    pub fn detach(self, exit_code: Option<i32>) -> std::io::Result<()> {
        self.log.close(exit_code)
    }
}
