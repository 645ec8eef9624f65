//! The append-only JSONL event log a `MonitorSession` writes to, and the
//! rotation policy that archives older logs under a retention count.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

use crate::sample::Sample;

/// One line of the event log. `event` is the self-describing tag every
/// record carries; records are otherwise append-only once written.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventRecord<'a> {
    Start {
        run_id: &'a str,
        pid: i32,
        sample_interval: f64,
        timestamp: DateTime<Utc>,
    },
    Sample {
        run_id: &'a str,
        #[serde(flatten)]
        sample: &'a Sample,
    },
    Stop {
        run_id: &'a str,
        timestamp: DateTime<Utc>,
        sample_count: u64,
        duration_seconds: f64,
        peak_cpu_percent: f64,
        peak_rss_bytes: u64,
        exit_code: Option<i32>,
    },
}

/// An open, append-only event log for one supervised child. The `start`
/// record is written by `create`; `stop` is written by `close`.
pub struct EventLog {
    file: File,
    run_id: String,
    sample_count: u64,
    peak_cpu_percent: f64,
    peak_rss_bytes: u64,
    opened_at: std::time::Instant,
}

fn write_record<W: Write>(mut writer: W, record: &EventRecord) -> io::Result<()> {
    let line = serde_json::to_string(record)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", line)
}

/// Name of the active log file for one run, per the documented naming
/// convention `monitor_run_<UTC-timestamp>_<pid>.jsonl`.
pub fn active_log_name(pid: i32, now: DateTime<Utc>) -> String {
    format!("monitor_run_{}_{}.jsonl", now.format("%Y%m%dT%H%M%SZ"), pid)
}

impl EventLog {
    /// Create the active log file under `dir` and write its `start` record.
    /// `dir` is created if it does not yet exist.
    pub fn create(dir: &Path, pid: i32, run_id: &str, sample_interval: f64) -> io::Result<EventLog> {
        fs::create_dir_all(dir)?;
        let now = Utc::now();
        let path = dir.join(active_log_name(pid, now));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        write_record(&mut file, &EventRecord::Start {
            run_id,
            pid,
            sample_interval,
            timestamp: now,
        })?;

        Ok(EventLog {
            file,
            run_id: run_id.to_owned(),
            sample_count: 0,
            peak_cpu_percent: 0.0,
            peak_rss_bytes: 0,
            opened_at: std::time::Instant::now(),
        })
    }

    /// Append one `sample` record and fold it into the running summary.
    pub fn record_sample(&mut self, sample: &Sample) -> io::Result<()> {
        self.sample_count += 1;
        if sample.cpu_percent > self.peak_cpu_percent {
            self.peak_cpu_percent = sample.cpu_percent;
        }
        if sample.memory_rss_bytes > self.peak_rss_bytes {
            self.peak_rss_bytes = sample.memory_rss_bytes;
        }
        write_record(&mut self.file, &EventRecord::Sample { run_id: &self.run_id, sample })
    }

    /// Write the closing `stop` record. Consumes the log: no further writes
    /// are permitted once a session is closed.
    pub fn close(mut self, exit_code: Option<i32>) -> io::Result<()> {
        write_record(&mut self.file, &EventRecord::Stop {
            run_id: &self.run_id,
            timestamp: Utc::now(),
            sample_count: self.sample_count,
            duration_seconds: self.opened_at.elapsed().as_secs_f64(),
            peak_cpu_percent: self.peak_cpu_percent,
            peak_rss_bytes: self.peak_rss_bytes,
            exit_code,
        })
    }
}

/// Gzip-compress `src` into `dst` and remove `src` on success. A file that
/// cannot be opened (e.g. held open by another process) is reported to the
/// caller rather than silently skipped.
fn compress_and_remove(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let output = File::create(dst)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(src)
}

/// Archive logs beyond `retention` in `dir`, gzip-compressed, into
/// `dir/archive/`. Files are ordered by name, which sorts chronologically
/// given the timestamped naming convention. A file that cannot be archived
/// (in use elsewhere, permission denied) is logged and left in place; this
/// is not treated as a fatal rotation failure.
pub fn rotate(dir: &Path, retention: usize) -> io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut logs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "jsonl").unwrap_or(false))
        .collect();
    logs.sort();

    if logs.len() <= retention {
        return Ok(());
    }

    let archive_dir = dir.join("archive");
    fs::create_dir_all(&archive_dir)?;

    let to_archive = &logs[..logs.len() - retention];
    for log_path in to_archive {
        let file_name = match log_path.file_name() {
            Some(name) => name,
            None => continue,
        };
        let dst = archive_dir.join(file_name).with_extension("jsonl.gz");
        if let Err(e) = compress_and_remove(log_path, &dst) {
            log::warn!("skipping rotation of {}: {}", log_path.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_writes_start_record() {
        let dir = tempdir().unwrap();
        let log = EventLog::create(dir.path(), 123, "run-1", 1.0).unwrap();
        log.close(Some(0)).unwrap();

        let mut entries: Vec<_> = fs::read_dir(dir.path()).unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(1, entries.len());
        let content = fs::read_to_string(entries.remove(0).path()).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().contains("\"event\":\"start\""));
        assert!(lines.next().unwrap().contains("\"event\":\"stop\""));
    }

    #[test]
    fn rotate_archives_oldest_beyond_retention() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            let name = format!("monitor_run_2020010{}T000000Z_1.jsonl", i);
            fs::write(dir.path().join(name), "{}\n").unwrap();
        }

        rotate(dir.path(), 3).unwrap();

        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().map(|x| x == "jsonl").unwrap_or(false))
            .collect();
        assert_eq!(3, remaining.len());

        let archived: Vec<_> = fs::read_dir(dir.path().join("archive")).unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(2, archived.len());
    }

    #[test]
    fn rotate_is_a_noop_under_the_retention_count() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("monitor_run_20200101T000000Z_1.jsonl"), "{}\n").unwrap();
        rotate(dir.path(), 10).unwrap();
        assert!(!dir.path().join("archive").exists());
    }
}
