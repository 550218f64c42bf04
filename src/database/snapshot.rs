//! On-disk snapshot of the identity database.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Policy;
use crate::error::{IdentityError, Result};
use crate::identity::User;

/// Version of the snapshot layout written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted document. Indices are derived and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub policy: Policy,
    pub revision: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl Snapshot {
    pub fn new(policy: Policy, now: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            policy,
            revision: 0,
            last_modified: now,
            users: Vec::new(),
        }
    }

    /// Read and decode the snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Io`] if the file cannot be read,
    /// [`IdentityError::Snapshot`] if it is not a valid document and
    /// [`IdentityError::Unsupported`] for a newer layout version.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| IdentityError::io(path, err))?;
        let snapshot: Self =
            serde_json::from_slice(&bytes).map_err(|source| {
                IdentityError::Snapshot {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(IdentityError::unsupported(
                "snapshot version",
                snapshot.version,
            ));
        }

        Ok(snapshot)
    }

    /// Write the snapshot to `path`.
    ///
    /// The document goes to a sibling temporary file which is synced and
    /// then renamed over `path`, so readers see either the previous or the
    /// new snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Err` if serialization or any filesystem step fails. A
    /// failed write leaves `path` untouched.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| {
            IdentityError::Snapshot {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let tmp = temporary_path(path);
        let written = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.write_all(b"\n")?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, path));

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(IdentityError::io(path, err));
        }

        Ok(())
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");

        let mut snapshot = Snapshot::new(Policy::default(), Utc::now());
        snapshot.revision = 7;
        snapshot.write(&path).unwrap();

        assert!(!temporary_path(&path).exists());
        let read = Snapshot::read(&path).unwrap();
        assert_eq!(read.revision, 7);
        assert_eq!(read.version, SNAPSHOT_VERSION);
        assert_eq!(read.policy, Policy::default());
        assert!(read.users.is_empty());
    }

    #[test]
    fn test_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");

        fs::write(&path, "{\"version\":1,").unwrap();
        assert_eq!(Snapshot::read(&path).unwrap_err().kind(), ErrorKind::Io);

        let mut snapshot = Snapshot::new(Policy::default(), Utc::now());
        snapshot.version = SNAPSHOT_VERSION + 1;
        snapshot.write(&path).unwrap();
        assert_eq!(
            Snapshot::read(&path).unwrap_err().kind(),
            ErrorKind::Unsupported
        );

        let missing = dir.path().join("missing.json");
        assert_eq!(Snapshot::read(&missing).unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn test_temporary_path() {
        assert_eq!(
            temporary_path(Path::new("/var/lib/identity.json")),
            PathBuf::from("/var/lib/identity.json.tmp")
        );
    }
}
