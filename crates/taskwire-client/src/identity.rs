//! Persisted client identity.
//!
//! The id the user logged in with is written to a small JSON file after the
//! first successful handshake, so subsequent runs reconnect automatically.
//! The file is discarded when the server rejects the id or removes the
//! account.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use taskwire_shared::types::ClientId;

use crate::error::{ClientError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    client_id: String,
}

/// On-disk identity storage.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Identity file in the platform config directory
    /// (e.g. `~/.config/taskwire/identity.json` on Linux).
    pub fn open_default() -> Result<Self> {
        let dirs =
            ProjectDirs::from("com", "taskwire", "taskwire").ok_or(ClientError::NoConfigDir)?;
        std::fs::create_dir_all(dirs.config_dir())?;
        Ok(Self {
            path: dirs.config_dir().join("identity.json"),
        })
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored id, if any.  A missing file is `None`; a corrupt file is an
    /// error.
    pub fn load(&self) -> Result<Option<ClientId>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: IdentityFile = serde_json::from_str(&raw)?;
        Ok(Some(ClientId::new(file.client_id)))
    }

    pub fn save(&self, id: &ClientId) -> Result<()> {
        let file = IdentityFile {
            client_id: id.as_str().to_string(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        debug!(path = %self.path.display(), "identity saved");
        Ok(())
    }

    /// Remove the stored id.  A no-op when nothing is stored.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "identity cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::at(dir.path().join("identity.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::at(dir.path().join("identity.json"));

        store.save(&ClientId::new("alpha")).unwrap();
        assert_eq!(store.load().unwrap(), Some(ClientId::new("alpha")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(IdentityStore::at(&path).load().is_err());
    }
}
