//! One point-in-time resource reading for a supervised child, and the
//! bookkeeping needed to turn successive readings into a CPU percentage.

use std::time::Instant;

use crate::procfs;

/// A single resource-usage snapshot, emitted as one `sample` event record.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Sample {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cpu_percent: f64,
    pub memory_rss_bytes: u64,
    pub memory_vms_bytes: Option<u64>,
    pub thread_count: Option<u64>,
    pub open_file_count: Option<u64>,
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
}

/// Accumulates the state needed between two samples to derive `cpu_percent`:
/// the previous CPU-time total and the wallclock instant it was read at.
pub struct Sampler {
    pid: i32,
    clock_ticks_per_sec: u64,
    num_cpus: usize,
    prev_cpu_ticks: Option<u64>,
    prev_instant: Instant,
}

impl Sampler {
    pub fn new(pid: i32) -> Sampler {
        Sampler {
            pid,
            clock_ticks_per_sec: clock_ticks_per_sec(),
            num_cpus: num_cpus::get().max(1),
            prev_cpu_ticks: None,
            prev_instant: Instant::now(),
        }
    }

    /// Take one reading. Prefers `procinfo`'s parse of `/proc/<pid>/stat`;
    /// if that fails, falls back to reading the kernel virtual filesystem
    /// directly (`crate::procfs`). A transient failure in either path on a
    /// process that has already exited is reported as `None`, not as an
    /// error: the caller records this as a missed sample, not a fatal one.
    pub fn sample(&mut self) -> Option<Sample> {
        let now = chrono::Utc::now();
        let instant = Instant::now();

        // `procinfo` exposes the CPU-time and memory-size fields this
        // sampler needs most often; thread count, open-fd count and IO
        // byte counters are read straight from `/proc` regardless, since
        // `procinfo` does not surface them.
        let mut raw = match procinfo::pid::stat(nix::unistd::Pid::from_raw(self.pid)) {
            Ok(stat) => procfs::RawUsage {
                utime_ticks: stat.utime,
                stime_ticks: stat.stime,
                num_threads: 0,
                vsize_bytes: stat.vsize,
                rss_bytes: stat.rss as u64,
                open_file_count: None,
                read_bytes: None,
                write_bytes: None,
            },
            Err(e) => {
                log::debug!("procinfo::pid::stat failed for pid {}, falling back to /proc: {}",
                    self.pid, e);
                match procfs::read(self.pid) {
                    Ok(raw) => raw,
                    Err(e) => {
                        log::warn!("sample read failed for pid {}: {}", self.pid, e);
                        return None;
                    },
                }
            },
        };

        if let Ok(supplement) = procfs::read(self.pid) {
            raw.num_threads = supplement.num_threads;
            raw.open_file_count = supplement.open_file_count;
            raw.read_bytes = supplement.read_bytes;
            raw.write_bytes = supplement.write_bytes;
        }

        let total_ticks = raw.utime_ticks + raw.stime_ticks;
        let cpu_percent = match self.prev_cpu_ticks {
            None => 0.0,
            Some(prev_ticks) => {
                let elapsed_secs = instant.duration_since(self.prev_instant).as_secs_f64();
                if elapsed_secs <= 0.0 {
                    0.0
                } else {
                    let delta_ticks = total_ticks.saturating_sub(prev_ticks) as f64;
                    let delta_secs = delta_ticks / self.clock_ticks_per_sec as f64;
                    (delta_secs / elapsed_secs) * 100.0
                }
            },
        };
        let cpu_percent = cpu_percent.min(self.num_cpus as f64 * 100.0);

        self.prev_cpu_ticks = Some(total_ticks);
        self.prev_instant = instant;

        let thread_count = if raw.num_threads > 0 { Some(raw.num_threads) } else { None };

        Some(Sample {
            timestamp: now,
            cpu_percent,
            memory_rss_bytes: raw.rss_bytes,
            memory_vms_bytes: Some(raw.vsize_bytes),
            thread_count,
            open_file_count: raw.open_file_count,
            read_bytes: raw.read_bytes,
            write_bytes: raw.write_bytes,
        })
    }
}

fn clock_ticks_per_sec() -> u64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as u64 } else { 100 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_of_self_reports_zero_cpu_percent() {
        let pid = std::process::id() as i32;
        let mut sampler = Sampler::new(pid);
        let sample = sampler.sample().expect("sampling self should succeed");
        assert_eq!(0.0, sample.cpu_percent);
        assert!(sample.memory_rss_bytes > 0);
    }

    #[test]
    fn nonexistent_pid_yields_no_sample() {
        let mut sampler = Sampler::new(i32::MAX);
        assert!(sampler.sample().is_none());
    }
}
