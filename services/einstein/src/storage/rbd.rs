//! RBD storage backend.
//!
//! Drives the `rbd` CLI against one pool. Every call is a blocking
//! subprocess; the CLI's stderr is classified into a [`StorageErrorKind`].

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use super::{StorageBackend, StorageError, StorageErrorKind};

/// Connection settings for the Ceph cluster.
#[derive(Debug, Clone)]
pub struct RbdConfig {
    /// Path to the `rbd` binary.
    pub binary: String,
    /// Ceph configuration file.
    pub conf_file: PathBuf,
    /// Ceph client id (without the `client.` prefix).
    pub id: String,
    /// Pool that holds every BMI image.
    pub pool: String,
}

impl Default for RbdConfig {
    fn default() -> Self {
        Self {
            binary: "rbd".to_string(),
            conf_file: PathBuf::from("/etc/ceph/ceph.conf"),
            id: "admin".to_string(),
            pool: "bmi".to_string(),
        }
    }
}

/// Which side of a two-image call an error should be attributed to.
#[derive(Clone, Copy)]
enum Blame<'a> {
    One(&'a str),
    Clone { src: &'a str, dst: &'a str },
}

impl Blame<'_> {
    fn error(self, kind: StorageErrorKind) -> StorageError {
        let name = match (self, &kind) {
            (Blame::One(name), _) => name,
            (Blame::Clone { src, .. }, StorageErrorKind::NotFound) => src,
            (Blame::Clone { dst, .. }, _) => dst,
        };
        StorageError::for_name(name, kind)
    }
}

/// RBD CLI backend.
pub struct RbdStorage {
    config: RbdConfig,
}

impl RbdStorage {
    pub fn new(config: RbdConfig) -> Self {
        Self { config }
    }

    fn spec(&self, img: &str) -> String {
        format!("{}/{}", self.config.pool, img)
    }

    fn snap_spec(&self, img: &str, label: &str) -> String {
        format!("{}/{}@{}", self.config.pool, img, label)
    }

    fn run(&self, blame: Blame<'_>, args: &[&str]) -> Result<(), StorageError> {
        debug!(args = %args.join(" "), "Running rbd");

        let output = Command::new(&self.config.binary)
            .arg("--conf")
            .arg(&self.config.conf_file)
            .args(["--id", &self.config.id])
            .args(args)
            .output()
            .map_err(|e| blame.error(StorageErrorKind::Failed(e.to_string())))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            args = %args.join(" "),
            stderr = %stderr.trim(),
            "rbd command failed"
        );
        Err(blame.error(classify_stderr(&stderr)))
    }
}

/// Map `rbd` stderr to an error kind.
pub fn classify_stderr(stderr: &str) -> StorageErrorKind {
    let lower = stderr.to_lowercase();
    if lower.contains("no such file") || lower.contains("not found") || lower.contains("enoent") {
        StorageErrorKind::NotFound
    } else if lower.contains("exists") {
        StorageErrorKind::Exists
    } else if lower.contains("busy")
        || lower.contains("has snapshots")
        || lower.contains("protected")
        || lower.contains("watchers")
    {
        StorageErrorKind::Busy
    } else {
        StorageErrorKind::Failed(stderr.trim().to_string())
    }
}

impl StorageBackend for RbdStorage {
    fn clone_image(&self, src: &str, snapshot: &str, dst: &str) -> Result<(), StorageError> {
        self.run(
            Blame::Clone { src, dst },
            &["clone", &self.snap_spec(src, snapshot), &self.spec(dst)],
        )
    }

    fn snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        self.run(Blame::One(img), &["snap", "create", &self.snap_spec(img, label)])
    }

    fn protect_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        self.run(Blame::One(img), &["snap", "protect", &self.snap_spec(img, label)])
    }

    fn unprotect_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        self.run(Blame::One(img), &["snap", "unprotect", &self.snap_spec(img, label)])
    }

    fn remove_snapshot(&self, img: &str, label: &str) -> Result<(), StorageError> {
        self.run(Blame::One(img), &["snap", "rm", &self.snap_spec(img, label)])
    }

    fn remove(&self, img: &str) -> Result<(), StorageError> {
        self.run(Blame::One(img), &["rm", "--no-progress", &self.spec(img)])
    }

    fn flatten(&self, img: &str) -> Result<(), StorageError> {
        self.run(Blame::One(img), &["flatten", "--no-progress", &self.spec(img)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rbd: error opening image 4img9: (2) No such file or directory", StorageErrorKind::NotFound)]
    #[case("rbd: create error: (17) File exists", StorageErrorKind::Exists)]
    #[case("rbd: unprotecting snap failed: (16) Device or resource busy", StorageErrorKind::Busy)]
    #[case("rbd: image has snapshots - these must be deleted", StorageErrorKind::Busy)]
    #[case("rbd: snap is protected", StorageErrorKind::Busy)]
    fn test_classify_stderr(#[case] stderr: &str, #[case] expected: StorageErrorKind) {
        assert_eq!(classify_stderr(stderr), expected);
    }

    #[test]
    fn test_classify_unknown_keeps_text() {
        assert_eq!(
            classify_stderr("  rbd: connect timed out \n"),
            StorageErrorKind::Failed("rbd: connect timed out".to_string())
        );
    }

    #[test]
    fn test_clone_blame() {
        let blame = Blame::Clone {
            src: "4img7",
            dst: "4img12",
        };
        assert_eq!(blame.error(StorageErrorKind::NotFound).image, "4img7");
        assert_eq!(blame.error(StorageErrorKind::Exists).image, "4img12");
    }

    #[test]
    fn test_specs() {
        let storage = RbdStorage::new(RbdConfig::default());
        assert_eq!(storage.spec("4img12"), "bmi/4img12");
        assert_eq!(storage.snap_spec("4img12", "snapshot"), "bmi/4img12@snapshot");
    }

    #[test]
    fn test_missing_binary_is_failure() {
        let storage = RbdStorage::new(RbdConfig {
            binary: "/nonexistent/rbd".to_string(),
            ..RbdConfig::default()
        });
        let err = storage.remove("4img1").unwrap_err();
        assert!(matches!(err.kind, StorageErrorKind::Failed(_)));
        assert!(err.translate_name);
    }
}
