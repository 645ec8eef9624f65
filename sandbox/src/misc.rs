use std::path::{Path, PathBuf};

/// Check if the given string slice is a valid C-style string.
///
/// Formally, this function checks whether the byte sequence of the string slice contains any
/// b'\x00'. If so, this function returns `false`.
///
/// ```ignore
/// assert!(is_valid_c_string("abc哈哈哈"));
/// assert!(!is_valid_c_string("abc\x00哈哈哈"));
/// ```
///
pub fn is_valid_c_string(s: &str) -> bool {
    !s.as_bytes().contains(&b'\x00')
}

/// Canonicalise `path` and confirm it names an existing, searchable directory.
/// Returns the canonical path on success.
///
/// Used to validate a requested jail path before fork: jail validation
/// failures must never spawn a child.
pub fn canonicalize_searchable_dir(path: &Path) -> std::io::Result<PathBuf> {
    let canonical = path.canonicalize()?;

    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", canonical.display())));
    }

    // "Searchable" for a directory means the execute bit is set for some
    // applicable class; the supervisor has not dropped privileges at this
    // point, so the owner bits are the relevant ones.
    use std::os::unix::fs::PermissionsExt;
    let mode = metadata.permissions().mode();
    if mode & 0o111 == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("{} is not searchable", canonical.display())));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_c_string() {
        assert!(is_valid_c_string("abc哈哈哈"));
        assert!(!is_valid_c_string("abc\x00哈哈哈"));
    }

    #[test]
    fn canonicalize_rejects_missing_path() {
        assert!(canonicalize_searchable_dir(Path::new("/no/such/path/at/all")).is_err());
    }

    #[test]
    fn canonicalize_accepts_tmp() {
        let dir = tempfile::tempdir().unwrap();
        assert!(canonicalize_searchable_dir(dir.path()).is_ok());
    }

    #[test]
    fn canonicalize_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not_a_dir");
        std::fs::write(&file_path, b"x").unwrap();
        assert!(canonicalize_searchable_dir(&file_path).is_err());
    }
}
