//! Chroot jail installation for the calling process.
//!
//! The ordering here is deliberate: chdir into the jail, chroot using the
//! current directory, then chdir to `/` inside the new root. This guarantees
//! that relative paths the target resolves after exec land inside the jail,
//! and that no pre-chroot working directory leaks out as an escape vector.

use std::path::Path;

use nix::unistd::Uid;

/// Outcome of a jail installation attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JailOutcome {
    /// The jail was installed successfully.
    Installed,

    /// The jail was requested but skipped because the calling process lacks
    /// the privilege to chroot. The child still runs, outside the jail.
    SkippedUnprivileged,
}

/// Enter `path` as the new filesystem root of the calling process.
///
/// Returns `Ok(JailOutcome::SkippedUnprivileged)` without error if the
/// calling process is not root (chroot is certain to fail for lack of
/// privilege, and the enforcer contract requires that case to degrade to a
/// warning rather than a fatal error). Any other failure of `chdir`/`chroot`
/// is returned as an error and is fatal to the caller.
pub fn enter(path: &Path) -> nix::Result<JailOutcome> {
    if !Uid::effective().is_root() {
        return Ok(JailOutcome::SkippedUnprivileged);
    }

    nix::unistd::chdir(path)?;
    nix::unistd::chroot(path)?;
    nix::unistd::chdir("/")?;

    Ok(JailOutcome::Installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprivileged_caller_skips_instead_of_failing() {
        if Uid::effective().is_root() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(JailOutcome::SkippedUnprivileged, enter(dir.path()).unwrap());
    }
}
