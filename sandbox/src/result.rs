//! The `RunResult` value the supervisor emits for one supervised run, and the
//! termination classification that derives it from a raw wait status.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;

use crate::policy::Policy;
use crate::signals;
use crate::{ErrorKind, Result};

/// The subset of the requested policy the enforcer actually managed to
/// install in the child, independent of what was requested. Collaborators
/// compute policy coverage from this, never from the request alone — the
/// core never silently claims a restriction it did not apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RestrictionsInstalled {
    /// Whether the rlimit-backed resource limits were applied. These are
    /// fatal-on-failure in the enforcer, so this is `true` whenever the
    /// enforcer was reached and survived past step 1.
    pub limits: bool,

    /// Whether the chroot jail was entered. `false` both when no jail was
    /// requested and when one was requested but skipped for lack of
    /// privilege.
    pub jail: bool,

    /// Whether the network syscall filter was installed. `false` both when
    /// no filter was requested and when installation failed on an
    /// incapable kernel.
    pub network_filter: bool,
}

/// Derived violation flags for one supervised run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViolationFlags {
    pub cpu_limit_exceeded: bool,
    pub memory_limit_exceeded: bool,
    pub file_size_limit_exceeded: bool,
    pub timeout_exceeded: bool,
}

impl ViolationFlags {
    fn none() -> ViolationFlags {
        ViolationFlags::default()
    }

    fn any(&self) -> bool {
        self.cpu_limit_exceeded
            || self.memory_limit_exceeded
            || self.file_size_limit_exceeded
            || self.timeout_exceeded
    }
}

/// The structured outcome of one supervised run, as emitted to external
/// collaborators (§3 `Result`, §6 structured output mode).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunResult {
    pub pid: i32,
    pub elapsed_seconds: Option<f64>,
    pub exit_code: Option<i32>,
    pub signal_number: Option<i32>,
    pub signal_name: Option<String>,
    pub flags: ViolationFlags,
    pub policy: Policy,
    pub restrictions_installed: RestrictionsInstalled,
    pub success: bool,
}

/// Classify a raw wait status into a `RunResult`.
///
/// `killed_by_timeout` must be `true` only when the supervisor itself sent
/// the terminating kill after its own timeout watchdog expired (§5); in that
/// case the observed signal is attributed to the timeout rather than to the
/// memory-limit heuristic, since the true cause is known rather than
/// inferred.
pub fn classify(
    policy: &Policy,
    pid: i32,
    wait_status: WaitStatus,
    restrictions_installed: RestrictionsInstalled,
    elapsed_seconds: Option<f64>,
    killed_by_timeout: bool,
) -> Result<RunResult> {
    let mut flags = ViolationFlags::none();
    let (exit_code, signal_number, signal_name) = match wait_status {
        WaitStatus::Exited(_, code) => (Some(code), None, None),
        WaitStatus::Signaled(_, sig, _core_dumped) => {
            if killed_by_timeout {
                flags.timeout_exceeded = true;
            } else if sig == signals::CPU_TIME_EXCEEDED_SIGNAL {
                flags.cpu_limit_exceeded = true;
            } else if sig == signals::FILE_SIZE_EXCEEDED_SIGNAL {
                flags.file_size_limit_exceeded = true;
            } else if sig == signals::UNCATCHABLE_KILL_SIGNAL && policy.memory_bytes > 0 {
                flags.memory_limit_exceeded = true;
            }
            (None, Some(sig as i32), Some(signals::signal_name(sig)))
        },
        WaitStatus::Stopped(..) =>
            bail!(ErrorKind::UnexpectedWaitStatus("child stopped unexpectedly".to_owned())),
        other =>
            bail!(ErrorKind::UnexpectedWaitStatus(format!("{:?}", other))),
    };

    let success = exit_code == Some(0) && !flags.any();

    Ok(RunResult {
        pid,
        elapsed_seconds,
        exit_code,
        signal_number,
        signal_name,
        flags,
        policy: policy.clone(),
        restrictions_installed,
        success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Pid;

    fn policy_with_memory_limit() -> Policy {
        Policy {
            cpu_seconds: 0,
            memory_bytes: 64 * 1024 * 1024,
            max_processes: 0,
            file_bytes: 0,
            jail_path: None,
            disable_network: false,
            timeout_seconds: None,
            target_argv: vec!["/bin/true".to_owned()],
        }
    }

    #[test]
    fn normal_zero_exit_is_success() {
        let policy = policy_with_memory_limit();
        let status = WaitStatus::Exited(Pid::from_raw(1), 0);
        let result = classify(&policy, 1, status, RestrictionsInstalled::default(), Some(0.1), false)
            .unwrap();
        assert!(result.success);
        assert_eq!(Some(0), result.exit_code);
    }

    #[test]
    fn cpu_signal_sets_flag() {
        let policy = policy_with_memory_limit();
        let status = WaitStatus::Signaled(Pid::from_raw(1), Signal::SIGXCPU, false);
        let result = classify(&policy, 1, status, RestrictionsInstalled::default(), Some(3.0), false)
            .unwrap();
        assert!(result.flags.cpu_limit_exceeded);
        assert!(!result.success);
    }

    #[test]
    fn sigkill_with_memory_limit_is_memory_heuristic() {
        let policy = policy_with_memory_limit();
        let status = WaitStatus::Signaled(Pid::from_raw(1), Signal::SIGKILL, false);
        let result = classify(&policy, 1, status, RestrictionsInstalled::default(), Some(1.0), false)
            .unwrap();
        assert!(result.flags.memory_limit_exceeded);
    }

    #[test]
    fn sigkill_without_memory_limit_sets_no_flag() {
        let mut policy = policy_with_memory_limit();
        policy.memory_bytes = 0;
        let status = WaitStatus::Signaled(Pid::from_raw(1), Signal::SIGKILL, false);
        let result = classify(&policy, 1, status, RestrictionsInstalled::default(), Some(1.0), false)
            .unwrap();
        assert!(!result.flags.memory_limit_exceeded);
    }

    #[test]
    fn timeout_kill_wins_over_memory_heuristic() {
        let policy = policy_with_memory_limit();
        let status = WaitStatus::Signaled(Pid::from_raw(1), Signal::SIGKILL, false);
        let result = classify(&policy, 1, status, RestrictionsInstalled::default(), Some(5.0), true)
            .unwrap();
        assert!(result.flags.timeout_exceeded);
        assert!(!result.flags.memory_limit_exceeded);
    }

    #[test]
    fn stopped_status_is_an_error() {
        let policy = policy_with_memory_limit();
        let status = WaitStatus::Stopped(Pid::from_raw(1), Signal::SIGSTOP);
        assert!(classify(&policy, 1, status, RestrictionsInstalled::default(), Some(0.1), false)
            .is_err());
    }
}
