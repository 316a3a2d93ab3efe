//! Post-run lifecycle
//!
//! Reading back the captured log and removing the environment. Neither
//! operation raises: failures are reported through tracing and turned into
//! a safe result.

use std::io;
use std::path::Path;
use tracing::{debug, error, info};

/// Reads the whole captured output log
///
/// # Returns
/// The log content, or `None` if it could not be read
pub fn read_captured_output(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!("Read {} byte(s) of captured output from {}", content.len(), path.display());
            Some(content)
        }
        Err(e) => {
            error!("Failed to read captured output {}: {}", path.display(), e);
            None
        }
    }
}

/// Recursively removes an environment root
///
/// # Returns
/// `true` if something was removed, `false` if the root did not exist
pub fn remove_environment(root: &Path) -> io::Result<bool> {
    if !root.exists() {
        debug!("Environment {} does not exist, nothing to remove", root.display());
        return Ok(false);
    }

    match std::fs::remove_dir_all(root) {
        Ok(()) => {
            info!("Removed environment {}", root.display());
            Ok(true)
        }
        // Raced with another removal
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Removes an environment root, reporting instead of returning errors
pub fn teardown(root: &Path) {
    if let Err(e) = remove_environment(root) {
        error!("Failed to remove environment {}: {}", root.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.txt");
        std::fs::write(&log, "a\n\nb\n").unwrap();

        assert_eq!(read_captured_output(&log).as_deref(), Some("a\n\nb\n"));
    }

    #[test]
    fn test_read_captured_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_captured_output(&dir.path().join("missing.txt")).is_none());
    }

    #[test]
    fn test_remove_environment() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("env");
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::write(root.join("bin/python"), "").unwrap();

        assert!(remove_environment(&root).unwrap());
        assert!(!root.exists());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("env");
        std::fs::create_dir_all(&root).unwrap();

        teardown(&root);
        teardown(&root);
        assert!(!root.exists());

        let never_created = dir.path().join("never");
        assert!(!remove_environment(&never_created).unwrap());
        teardown(&never_created);
    }
}
