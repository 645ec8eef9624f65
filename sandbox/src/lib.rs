//! This crate implements the policy model and enforcer of the process
//! sandbox supervisor. It is responsible for:
//!
//! * The `Policy` value and the parser that builds one from a token
//!   sequence;
//!
//! * The enforcer: installing resource limits, an optional chroot jail and
//!   an optional outbound-network syscall filter into a child process
//!   between `fork` and `exec`;
//!
//! * Classifying a terminated child's raw wait status into a structured
//!   `RunResult`.
//!
//! The supervisor loop itself (argument parsing entry point, `fork`, timing,
//! and result emission) lives in the `sandbox-bin` binary crate, which is
//! the only consumer of this crate's public API expected in this repository.
//!

#[macro_use]
extern crate error_chain;
extern crate libc;
extern crate nix;
extern crate seccomp_sys;

pub mod enforcer;
pub mod jail;
mod misc;
pub mod netfilter;
pub mod policy;
pub mod result;
pub mod rlimits;
pub mod signals;

pub use policy::{ParseOutcome, Policy};
pub use result::{classify, RestrictionsInstalled, RunResult, ViolationFlags};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
        Nix(::nix::Error);
        Seccomp(netfilter::SeccompError);
    }

    errors {
        InvalidOptionValue(key: String, value: String) {
            description("invalid option value")
            display("invalid value for option '{}': '{}'", key, value)
        }

        UnknownOption(key: String) {
            description("unknown option")
            display("unknown option: '{}'", key)
        }

        InvalidJailPath(path: String, reason: String) {
            description("invalid jail path")
            display("invalid jail path '{}': {}", path, reason)
        }

        EmptyTargetArgv {
            description("empty target command")
            display("no target command was given")
        }

        InvalidProcessArgument(arg: String) {
            description("invalid argv entry")
            display("invalid argument (contains NUL): {:?}", arg)
        }

        EnforcerSetupFailed(reason: String) {
            description("enforcer setup failed")
            display("enforcer setup failed: {}", reason)
        }

        UnexpectedWaitStatus(detail: String) {
            description("unexpected wait status")
            display("unexpected wait status: {}", detail)
        }

        ForkFailed {
            description("fork failed")
        }
    }
}
