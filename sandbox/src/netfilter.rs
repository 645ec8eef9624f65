//! This module contains facilities that relate to the seccomp feature of
//! Linux systems. This module is based on the `seccomp_sys` crate which
//! furthur depends on the `libseccomp` native library.
//!
//! Use `install` to apply the deterministic network-syscall filter described
//! in the enforcer contract to the calling process: every other syscall is
//! left default-allow, and the syscalls in `DENIED_SYSCALLS` fail with
//! `EPERM` instead of being delivered to the kernel.
//!

use std::error::Error;
use std::fmt::{Display, Formatter};

use seccomp_sys::*;

/// The error type used in the `netfilter` module.
#[derive(Clone, Copy, Debug)]
pub struct SeccompError {
    errno: i32
}

impl SeccompError {
    /// Create a new `SeccompError` instance.
    pub fn new(errno: i32) -> Self {
        SeccompError { errno }
    }

    /// Get the error number returned by the underlying `libseccomp` library.
    pub fn errno(&self) -> i32 {
        self.errno
    }
}

impl Display for SeccompError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("seccomp error: {}", self.errno))
    }
}

impl Error for SeccompError {
    // Use default trait implementation here.
}

/// The result type used in the `netfilter` module.
pub type Result<T> = std::result::Result<T, SeccompError>;

/// The outbound socket-family syscalls denied by the network filter, as
/// required by the enforcer contract. All other syscalls default-allow.
pub fn denied_syscalls() -> Vec<i32> {
    vec![
        libc::SYS_socket as i32,
        libc::SYS_connect as i32,
        libc::SYS_sendto as i32,
        libc::SYS_sendmsg as i32,
        libc::SYS_recvfrom as i32,
        libc::SYS_recvmsg as i32,
    ]
}

/// Install the network filter on the calling process. After this call
/// returns successfully, any of the syscalls in `denied_syscalls()` invoked
/// by the calling process (or anything it later execs into) immediately
/// fails and returns `EPERM` to the caller; every other syscall is
/// unaffected.
pub fn install() -> Result<()> {
    let ctx = unsafe { seccomp_init(SCMP_ACT_ALLOW) };
    if ctx.is_null() {
        return Err(SeccompError::new(-1));
    }

    let eperm = libc::EPERM as u32;
    for syscall in denied_syscalls() {
        let ret = unsafe {
            seccomp_rule_add_array(ctx, SCMP_ACT_ERRNO(eperm), syscall, 0, std::ptr::null())
        };
        if ret < 0 {
            return Err(SeccompError::new(ret));
        }
    }

    let ret = unsafe { seccomp_load(ctx) };
    if ret < 0 {
        return Err(SeccompError::new(ret));
    }

    Ok(())
}
