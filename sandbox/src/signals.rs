//! Signal classification used to derive `RunResult` flags from a terminating
//! signal, per the termination-classification table in the supervisor
//! contract.

use nix::sys::signal::Signal;

/// The signal the kernel delivers when a process exceeds its `RLIMIT_CPU`
/// soft limit.
pub const CPU_TIME_EXCEEDED_SIGNAL: Signal = Signal::SIGXCPU;

/// The signal the kernel delivers when a process exceeds its `RLIMIT_FSIZE`
/// soft limit while writing.
pub const FILE_SIZE_EXCEEDED_SIGNAL: Signal = Signal::SIGXFSZ;

/// The uncatchable kill signal used both by the OOM killer and by a manual
/// `kill -9`; per the enforcer contract, a process terminated by this signal
/// while a memory limit was in force is attributed (heuristically) to the
/// memory limit.
pub const UNCATCHABLE_KILL_SIGNAL: Signal = Signal::SIGKILL;

/// Human readable name for a signal, suitable for the `signal_name` field of
/// `RunResult`.
pub fn signal_name(signal: Signal) -> String {
    signal.as_str().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_signal_name() {
        assert_eq!("SIGXCPU", signal_name(CPU_TIME_EXCEEDED_SIGNAL));
    }
}
