//! Durable storage of the key ring as a single JSON file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::debug;

use crate::error::{KeyError, Result};
use crate::keypair::KeyPair;
use crate::ring::{KeyRing, Slot};

/// On-disk layout: `{"Key-A": {...}, "Key-B": {...}}`. An empty slot is
/// omitted.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredRing {
    #[serde(rename = "Key-A", default, skip_serializing_if = "Option::is_none")]
    key_a: Option<KeyPair>,
    #[serde(rename = "Key-B", default, skip_serializing_if = "Option::is_none")]
    key_b: Option<KeyPair>,
}

impl From<&KeyRing> for StoredRing {
    fn from(ring: &KeyRing) -> Self {
        Self {
            key_a: ring.get(Slot::A).cloned(),
            key_b: ring.get(Slot::B).cloned(),
        }
    }
}

/// File-backed key ring store. Every save replaces the file atomically.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ring, resolving the current slot as of `now`. `Ok(None)`
    /// means no key file exists yet.
    pub fn load(&self, now: DateTime<Utc>) -> Result<Option<KeyRing>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredRing = serde_json::from_slice(&data)?;
        let ring = KeyRing::from_slots(stored.key_a, stored.key_b, now).ok_or_else(|| {
            KeyError::CorruptStore(
                self.path.display().to_string(),
                "no key pair in either slot".to_string(),
            )
        })?;

        debug!(path = %self.path.display(), current = %ring.current_slot(), "loaded key ring");
        Ok(Some(ring))
    }

    /// Write the complete ring: temp file in the same directory, fsync,
    /// owner-only permissions, then rename over the target.
    pub fn save(&self, ring: &KeyRing) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
        StoredRing::from(ring).serialize(&mut ser)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".keys")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        restrict_permissions(tmp.path())?;
        tmp.persist(&self.path).map_err(|e| KeyError::Persistence(e.error))?;

        debug!(path = %self.path.display(), "saved key ring");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
