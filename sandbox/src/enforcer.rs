//! The enforcer: installs a `Policy` into the calling process, between fork
//! and exec. This module's entry point, `run`, is called exactly once in the
//! child, in the order mandated by the enforcer contract: resource limits,
//! then the chroot jail, then the no-new-privileges bit and network filter,
//! then exec.

use std::ffi::CString;
use std::os::unix::io::RawFd;

use crate::jail::{self, JailOutcome};
use crate::netfilter;
use crate::policy::Policy;
use crate::result::RestrictionsInstalled;
use crate::rlimits::{self, Resource};
use crate::{Error, ErrorKind, Result};

fn apply_resource_limits(policy: &Policy) -> Result<()> {
    if policy.cpu_seconds > 0 {
        rlimits::setrlimit_hard(Resource::CPUTime, policy.cpu_seconds)?;
    }
    if policy.memory_bytes > 0 {
        rlimits::setrlimit_hard(Resource::AddressSpace, policy.memory_bytes)?;
    }
    if policy.max_processes > 0 {
        rlimits::setrlimit_hard(Resource::ProcessCount, policy.max_processes)?;
    }
    if policy.file_bytes > 0 {
        rlimits::setrlimit_hard(Resource::FileSize, policy.file_bytes)?;
    }
    Ok(())
}

fn apply_jail(policy: &Policy) -> Result<bool> {
    match &policy.jail_path {
        None => Ok(false),
        Some(path) => match jail::enter(path)? {
            JailOutcome::Installed => Ok(true),
            JailOutcome::SkippedUnprivileged => {
                log::warn!("chroot into {} skipped: calling process is not privileged",
                    path.display());
                Ok(false)
            },
        },
    }
}

/// Set the `no new privileges` bit and install the network filter. Filter
/// installation failure is non-fatal per the enforcer contract: the child
/// proceeds without the restriction and the caller is told so via the
/// returned `bool`.
fn apply_network_filter(policy: &Policy) -> Result<bool> {
    if !policy.disable_network {
        return Ok(false);
    }

    let ret = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if ret != 0 {
        bail!(ErrorKind::EnforcerSetupFailed(
            "failed to set no-new-privileges".to_owned()));
    }

    match netfilter::install() {
        Ok(()) => Ok(true),
        Err(e) => {
            log::warn!("network filter installation failed, child will run without it: {}", e);
            Ok(false)
        },
    }
}

fn report_coverage(coverage_fd: RawFd, restrictions: RestrictionsInstalled) {
    let byte: u8 =
        (restrictions.limits as u8)
        | ((restrictions.jail as u8) << 1)
        | ((restrictions.network_filter as u8) << 2);
    // Best effort: if the parent already went away there is nothing useful
    // to do with a write failure here, and the child is about to exec or
    // exit regardless.
    let _ = nix::unistd::write(coverage_fd, &[byte]);
}

fn exec_target(policy: &Policy) -> Result<()> {
    let program = CString::new(policy.target_argv[0].as_str())
        .map_err(|_| Error::from(ErrorKind::InvalidProcessArgument(policy.target_argv[0].clone())))?;
    let argv = policy.target_argv.iter()
        .map(|arg| CString::new(arg.as_str())
            .map_err(|_| Error::from(ErrorKind::InvalidProcessArgument(arg.clone()))))
        .collect::<Result<Vec<CString>>>()?;

    // `execvp` performs the `PATH` lookup for `target_argv[0]` itself. If it
    // returns at all, the call failed.
    nix::unistd::execvp(&program, &argv)?;
    unreachable!("execvp returned without replacing the process image");
}

/// Install `policy` in the calling process and exec the target.
///
/// This function is called exactly once in the child, between fork and
/// exec. On success it never returns: the process image has been replaced.
/// If it returns at all, installation or exec failed; the caller (the
/// supervisor's child branch) is responsible for printing the diagnostic and
/// exiting the child with a non-zero status, per the enforcer contract.
///
/// `coverage_fd` is the write end of a pipe the parent reads after `wait`
/// returns; the single byte written here encodes which restrictions were
/// actually installed, independent of what was requested (see
/// `RestrictionsInstalled`). If the child dies before reaching that write,
/// the parent observes EOF and assumes nothing was installed — the core
/// never claims a restriction it did not confirm applying.
pub fn run(policy: &Policy, coverage_fd: RawFd) -> Result<()> {
    log::debug!("enforcer: applying resource limits");
    apply_resource_limits(policy)?;

    log::debug!("enforcer: applying jail (requested = {})", policy.jail_path.is_some());
    let jail_installed = apply_jail(policy)?;

    log::debug!("enforcer: applying network filter (requested = {})", policy.disable_network);
    let network_filter_installed = apply_network_filter(policy)?;

    let restrictions = RestrictionsInstalled {
        limits: true,
        jail: jail_installed,
        network_filter: network_filter_installed,
    };
    report_coverage(coverage_fd, restrictions);

    log::debug!("enforcer: exec-ing target {:?}", policy.target_argv);
    exec_target(policy)
}
