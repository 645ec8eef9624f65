//! Fallback reader for per-PID resource figures, used when `procinfo` fails
//! to parse a field (e.g. a kernel exposing a stat format `procinfo` does not
//! recognise). Reads the kernel virtual filesystem directly.

use std::fs;
use std::io::{self, BufRead};

/// The subset of `/proc/<pid>/stat` fields the sampler needs, plus the
/// auxiliary figures only available elsewhere under `/proc/<pid>/`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawUsage {
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub num_threads: u64,
    pub vsize_bytes: u64,
    /// RSS in bytes. `/proc/<pid>/stat` reports this in pages; callers that
    /// parse it directly must multiply by the page size themselves before
    /// constructing a `RawUsage`.
    pub rss_bytes: u64,
    pub open_file_count: Option<u64>,
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
}

/// Parse the whitespace-separated fields of `/proc/<pid>/stat`. The `comm`
/// field (index 1) is parenthesised and may itself contain spaces, so it is
/// located by its closing paren rather than split naively.
fn parse_stat_line(line: &str) -> Option<RawUsage> {
    let close_paren = line.rfind(')')?;
    let rest = line[close_paren + 1..].trim_start();
    let fields: Vec<&str> = rest.split_whitespace().collect();

    // `rest` starts at field 3 (state); utime/stime are fields 14/15, so
    // index 11/12 here; num_threads is field 20 (index 17); vsize/rss are
    // fields 23/24 (index 20/21).
    let utime_ticks = fields.get(11)?.parse().ok()?;
    let stime_ticks = fields.get(12)?.parse().ok()?;
    let num_threads = fields.get(17)?.parse().ok()?;
    let vsize_bytes = fields.get(20)?.parse().ok()?;
    let rss_pages: u64 = fields.get(21)?.parse().ok()?;

    Some(RawUsage {
        utime_ticks,
        stime_ticks,
        num_threads,
        vsize_bytes,
        rss_bytes: rss_pages * page_size_bytes(),
        open_file_count: None,
        read_bytes: None,
        write_bytes: None,
    })
}

fn page_size_bytes() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

fn read_open_file_count(pid: i32) -> Option<u64> {
    fs::read_dir(format!("/proc/{}/fd", pid)).ok()
        .map(|entries| entries.filter_map(Result::ok).count() as u64)
}

fn read_io_bytes(pid: i32) -> io::Result<(Option<u64>, Option<u64>)> {
    let file = fs::File::open(format!("/proc/{}/io", pid))?;
    let mut read_bytes = None;
    let mut write_bytes = None;
    for line in io::BufReader::new(file).lines() {
        let line = line?;
        if let Some(value) = line.strip_prefix("read_bytes:") {
            read_bytes = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("write_bytes:") {
            write_bytes = value.trim().parse().ok();
        }
    }
    Ok((read_bytes, write_bytes))
}

/// Read `/proc/<pid>/stat`, `/proc/<pid>/io` and `/proc/<pid>/fd` directly.
/// Per-field failures (e.g. `/proc/<pid>/io` requires permissions this
/// process may lack) degrade to an absent optional field rather than
/// failing the whole read; only a missing `stat` file (the process is gone)
/// is a hard error.
pub fn read(pid: i32) -> io::Result<RawUsage> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid))?;
    let mut usage = parse_stat_line(&stat)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc/pid/stat"))?;

    usage.open_file_count = read_open_file_count(pid);
    if let Ok((read_bytes, write_bytes)) = read_io_bytes(pid) {
        usage.read_bytes = read_bytes;
        usage.write_bytes = write_bytes;
    }

    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_stat_line() {
        let line = "1234 (my prog) S 1 1234 1234 0 -1 4194560 100 0 0 0 \
            50 20 0 0 20 0 4 0 1000 123456789 4096 18446744073709551615 \
            1 1 0 0 0 0 0 0 0 0 0 0 17 2 0 0 0 0 0";
        let usage = parse_stat_line(line).expect("should parse");
        assert_eq!(50, usage.utime_ticks);
        assert_eq!(20, usage.stime_ticks);
        assert_eq!(4, usage.num_threads);
        assert_eq!(123456789, usage.vsize_bytes);
        assert_eq!(4096 * page_size_bytes(), usage.rss_bytes);
    }

    #[test]
    fn command_containing_spaces_and_parens_does_not_break_parsing() {
        let line = "42 (weird (cmd) name) R 1 42 42 0 -1 4194304 0 0 0 0 \
            5 3 0 0 20 0 1 0 1000 1000 10 18446744073709551615 \
            1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let usage = parse_stat_line(line).expect("should parse");
        assert_eq!(5, usage.utime_ticks);
        assert_eq!(3, usage.stime_ticks);
    }

    #[test]
    fn reading_nonexistent_pid_fails() {
        assert!(read(i32::MAX).is_err());
    }
}
