//! The Policy Model: a pure value describing the restrictions requested of a
//! supervised run, and the parser that builds one from a token sequence.

use std::path::PathBuf;
use std::str::FromStr;

use crate::misc;
use crate::{Error, ErrorKind, Result};

/// Megabyte, expressed in bytes, used to convert `mem=` and `fsize=` option
/// values into the byte counts `Policy` stores.
const MEGABYTE: u64 = 1024 * 1024;

/// Immutable record of the restrictions requested for one supervised run.
///
/// A `Policy` is frozen by construction: every field is set exactly once by
/// `parse` (or by tests constructing one directly) and crosses the fork
/// boundary as a plain value, never as a reference into the parent's heap.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Policy {
    /// CPU time limit in seconds. Zero means no limit.
    pub cpu_seconds: u64,

    /// Address-space limit in bytes. Zero means no limit.
    pub memory_bytes: u64,

    /// Process-count limit, applied to the real user ID's total process
    /// count (see `rlimits::Resource::ProcessCount`). Zero means no limit.
    pub max_processes: u64,

    /// File-size limit in bytes. Zero means no limit.
    pub file_bytes: u64,

    /// Canonicalised, existing, searchable directory to chroot into before
    /// exec, if a jail was requested.
    pub jail_path: Option<PathBuf>,

    /// Whether the child should have outbound socket-family syscalls denied.
    pub disable_network: bool,

    /// Optional wall-clock timeout in seconds; an extension beyond the core
    /// contract (see `SPEC_FULL.md` §9 open questions). Zero/absent means no
    /// timeout is enforced by the supervisor itself.
    pub timeout_seconds: Option<u64>,

    /// The target command: element 0 is the program name (resolved via
    /// `PATH` at exec time), the remainder are passed unchanged.
    pub target_argv: Vec<String>,
}

impl Policy {
    fn empty() -> Policy {
        Policy {
            cpu_seconds: 0,
            memory_bytes: 0,
            max_processes: 0,
            file_bytes: 0,
            jail_path: None,
            disable_network: false,
            timeout_seconds: None,
            target_argv: Vec::new(),
        }
    }
}

/// Outcome of parsing a token sequence into a `Policy`.
pub enum ParseOutcome {
    /// `help` was requested: usage should be printed and the supervisor
    /// should exit successfully without spawning a child.
    Help,

    /// A `Policy` was built successfully.
    Policy(Policy),
}

fn parse_u64_value(key: &str, value: &str) -> Result<u64> {
    if value.is_empty() {
        bail!(ErrorKind::InvalidOptionValue(key.to_owned(), value.to_owned()));
    }
    u64::from_str(value)
        .map_err(|_| Error::from(ErrorKind::InvalidOptionValue(key.to_owned(), value.to_owned())))
}

/// Parse `args` (the tokens following the supervisor's own program name)
/// into a `Policy`, or into `ParseOutcome::Help` if `help` was requested.
///
/// Options precede the target; the first token that does not parse as a
/// recognised `key=value` option, `no-net`, `help`, or `--` begins
/// `target_argv`. A token containing `=` whose key is not recognised is a
/// hard error rather than silently becoming part of the target, since it is
/// almost certainly a typo in an option rather than an intended program name.
pub fn parse<I, S>(args: I) -> Result<ParseOutcome>
    where I: IntoIterator<Item = S>, S: AsRef<str> {
    let mut policy = Policy::empty();
    let mut iter = args.into_iter();

    while let Some(token) = iter.next() {
        let token = token.as_ref();

        if token == "--" {
            for rest in iter.by_ref() {
                policy.target_argv.push(rest.as_ref().to_owned());
            }
            break;
        }

        if token == "help" || token == "--help" {
            return Ok(ParseOutcome::Help);
        }

        if token == "no-net" || token == "--no-net" {
            policy.disable_network = true;
            continue;
        }

        if let Some(eq) = token.find('=') {
            let (key, value) = token.split_at(eq);
            let value = &value[1..];

            match key {
                "cpu" => policy.cpu_seconds = parse_u64_value(key, value)?,
                "mem" => policy.memory_bytes = parse_u64_value(key, value)?
                    .checked_mul(MEGABYTE)
                    .ok_or_else(|| Error::from(ErrorKind::InvalidOptionValue(
                        key.to_owned(), value.to_owned())))?,
                "procs" => policy.max_processes = parse_u64_value(key, value)?,
                "fsize" => policy.file_bytes = parse_u64_value(key, value)?
                    .checked_mul(MEGABYTE)
                    .ok_or_else(|| Error::from(ErrorKind::InvalidOptionValue(
                        key.to_owned(), value.to_owned())))?,
                "timeout" => policy.timeout_seconds = Some(parse_u64_value(key, value)?),
                "jail" => {
                    if value.is_empty() {
                        bail!(ErrorKind::InvalidOptionValue(key.to_owned(), value.to_owned()));
                    }
                    let canonical = misc::canonicalize_searchable_dir(value.as_ref())
                        .map_err(|e| Error::from(
                            ErrorKind::InvalidJailPath(value.to_owned(), e.to_string())))?;
                    policy.jail_path = Some(canonical);
                },
                _ => bail!(ErrorKind::UnknownOption(key.to_owned())),
            }
            continue;
        }

        // First token that is not a recognised option: the target begins
        // here, verbatim, including this token.
        policy.target_argv.push(token.to_owned());
        for rest in iter.by_ref() {
            policy.target_argv.push(rest.as_ref().to_owned());
        }
        break;
    }

    if policy.target_argv.is_empty() {
        bail!(ErrorKind::EmptyTargetArgv);
    }

    Ok(ParseOutcome::Policy(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(args: &[&str]) -> Policy {
        match parse(args.iter().cloned()).expect("parse should succeed") {
            ParseOutcome::Policy(p) => p,
            ParseOutcome::Help => panic!("expected a policy, got help"),
        }
    }

    #[test]
    fn parses_simple_target() {
        let policy = parse_ok(&["/bin/echo", "hello"]);
        assert_eq!(vec!["/bin/echo", "hello"], policy.target_argv);
        assert_eq!(0, policy.cpu_seconds);
    }

    #[test]
    fn parses_resource_options() {
        let policy = parse_ok(&["cpu=3", "mem=50", "procs=4", "fsize=30", "/bin/true"]);
        assert_eq!(3, policy.cpu_seconds);
        assert_eq!(50 * MEGABYTE, policy.memory_bytes);
        assert_eq!(4, policy.max_processes);
        assert_eq!(30 * MEGABYTE, policy.file_bytes);
        assert_eq!(vec!["/bin/true"], policy.target_argv);
    }

    #[test]
    fn parses_no_net() {
        let policy = parse_ok(&["no-net", "/bin/true"]);
        assert!(policy.disable_network);
    }

    #[test]
    fn accepts_dashed_help_and_no_net_forms() {
        match parse(["--help"].iter().cloned()).unwrap() {
            ParseOutcome::Help => (),
            ParseOutcome::Policy(_) => panic!("expected help"),
        }
        let policy = parse_ok(&["--no-net", "/bin/true"]);
        assert!(policy.disable_network);
    }

    #[test]
    fn help_short_circuits() {
        match parse(["help", "/bin/true"].iter().cloned()).unwrap() {
            ParseOutcome::Help => (),
            ParseOutcome::Policy(_) => panic!("expected help"),
        }
    }

    #[test]
    fn double_dash_ends_options() {
        let policy = parse_ok(&["no-net", "--", "-not-an-option"]);
        assert_eq!(vec!["-not-an-option"], policy.target_argv);
    }

    #[test]
    fn target_may_start_with_dash() {
        let policy = parse_ok(&["/bin/echo", "-n", "hi"]);
        assert_eq!(vec!["/bin/echo", "-n", "hi"], policy.target_argv);
    }

    #[test]
    fn rejects_unknown_option() {
        assert!(parse(["bogus=1", "/bin/true"].iter().cloned()).is_err());
    }

    #[test]
    fn rejects_non_numeric_value() {
        assert!(parse(["cpu=abc", "/bin/true"].iter().cloned()).is_err());
    }

    #[test]
    fn rejects_empty_jail_value() {
        assert!(parse(["jail=", "/bin/true"].iter().cloned()).is_err());
    }

    #[test]
    fn rejects_empty_target() {
        assert!(parse(["no-net"].iter().cloned()).is_err());
    }

    #[test]
    fn rejects_missing_jail_path() {
        assert!(parse(["jail=/no/such/dir", "/bin/true"].iter().cloned()).is_err());
    }

    #[test]
    fn parser_is_idempotent_on_echoed_policy() {
        // §8: re-parsing the supervisor's echoed policy line yields the same
        // policy. We model "the echoed policy line" as the canonical token
        // form a policy summary would be rendered as.
        let policy = parse_ok(&["cpu=3", "mem=50", "no-net", "/bin/true", "x"]);
        let echoed = vec![
            format!("cpu={}", policy.cpu_seconds),
            format!("mem={}", policy.memory_bytes / MEGABYTE),
            "no-net".to_owned(),
        ];
        let mut reparsed_args = echoed;
        reparsed_args.extend(policy.target_argv.iter().cloned());
        let reparsed = parse_ok(&reparsed_args.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(policy, reparsed);
    }
}
