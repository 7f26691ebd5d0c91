//! Session persistence (§4.1): back up the transport library's session
//! directory on every reconnect attempt, keep the three most recent
//! backups, and validate a session's usability before trusting it.

use std::path::{Path, PathBuf};

use chrono::Utc;

const REQUIRED_SESSION_FILES: &[&str] = &["creds.json"];

pub struct SessionStore {
    dir: PathBuf,
    backups_to_keep: usize,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>, backups_to_keep: usize) -> Self {
        Self {
            dir: dir.into(),
            backups_to_keep,
        }
    }

    /// `true` if the session directory exists, has every required file, and
    /// `creds.json` parses as a JSON object with the expected top-level keys.
    pub fn is_usable(&self) -> bool {
        if !self.dir.is_dir() {
            return false;
        }
        for name in REQUIRED_SESSION_FILES {
            if !self.dir.join(name).is_file() {
                return false;
            }
        }
        self.validate_credentials_structure()
    }

    fn validate_credentials_structure(&self) -> bool {
        let Ok(raw) = std::fs::read_to_string(self.dir.join("creds.json")) else {
            return false;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            return false;
        };
        let Some(obj) = value.as_object() else {
            return false;
        };
        obj.contains_key("noiseKey") || obj.contains_key("me")
    }

    /// Copy the session directory to a timestamped backup, then prune to
    /// [`SessionStore::backups_to_keep`] most recent backups.
    pub fn backup(&self) -> std::io::Result<PathBuf> {
        let backups_root = self.backups_root();
        std::fs::create_dir_all(&backups_root)?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let dest = backups_root.join(stamp);
        copy_dir_recursive(&self.dir, &dest)?;

        self.prune_old_backups(&backups_root)?;
        Ok(dest)
    }

    pub fn list_backups(&self) -> std::io::Result<Vec<String>> {
        let backups_root = self.backups_root();
        if !backups_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&backups_root)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names.reverse();
        Ok(names)
    }

    /// Restore the session directory from a named backup (as returned by
    /// [`SessionStore::list_backups`]), replacing the current session.
    pub fn restore(&self, backup_name: &str) -> std::io::Result<()> {
        let source = self.backups_root().join(backup_name);
        if !source.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "backup not found",
            ));
        }
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        copy_dir_recursive(&source, &self.dir)
    }

    fn backups_root(&self) -> PathBuf {
        self.dir.with_file_name(format!(
            "{}_backups",
            self.dir.file_name().and_then(|n| n.to_str()).unwrap_or("session")
        ))
    }

    fn prune_old_backups(&self, backups_root: &Path) -> std::io::Result<()> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(backups_root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort();
        entries.reverse();

        for stale in entries.into_iter().skip(self.backups_to_keep) {
            std::fs::remove_dir_all(stale)?;
        }
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("triagebot-session-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn unusable_when_directory_missing() {
        let store = SessionStore::new(temp_dir("missing"), 3);
        assert!(!store.is_usable());
    }

    #[test]
    fn usable_when_creds_have_expected_keys() {
        let dir = temp_dir("usable");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("creds.json"), r#"{"noiseKey": "x", "me": {"id": "1"}}"#).unwrap();

        let store = SessionStore::new(&dir, 3);
        assert!(store.is_usable());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unusable_when_creds_lack_expected_keys() {
        let dir = temp_dir("bad-creds");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("creds.json"), r#"{"unrelated": true}"#).unwrap();

        let store = SessionStore::new(&dir, 3);
        assert!(!store.is_usable());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn backup_and_restore_roundtrip_and_prunes_old_backups() {
        let dir = temp_dir("roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("creds.json"), r#"{"me": {"id": "1"}}"#).unwrap();

        let store = SessionStore::new(&dir, 1);
        let backup1 = store.backup().unwrap();
        assert!(backup1.join("creds.json").exists());

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.backup().unwrap();

        let backups = store.list_backups().unwrap();
        assert_eq!(backups.len(), 1, "backups_to_keep=1 should prune older ones");

        std::fs::remove_dir_all(&dir).unwrap();
        store.restore(&backups[0]).unwrap();
        assert!(store.is_usable());

        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::remove_dir_all(store.backups_root());
    }
}
