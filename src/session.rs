use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One browser cookie, in the shape the DevTools protocol reports
/// (camelCase field names, epoch-seconds expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<f64>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: String::new(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }
}

/// Saved authentication state for one site + account pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub site: String,
    pub saved_at: DateTime<Utc>,
    pub cookies: Vec<SessionCookie>,
    #[serde(default)]
    pub local_storage: Vec<(String, String)>,
}

/// Persists session snapshots as JSON files under the app data directory.
/// Not safe for concurrent writers; callers serialize runs per account.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::config::data_dir()?.join("sessions")))
    }

    fn path_for(&self, site: &str, account: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug(site, account)))
    }

    pub fn exists(&self, site: &str, account: &str) -> bool {
        self.path_for(site, account).exists()
    }

    /// Returns `None` when no snapshot exists. A corrupt snapshot counts
    /// as missing.
    pub fn load(&self, site: &str, account: &str) -> Option<SessionSnapshot> {
        let raw = fs::read_to_string(self.path_for(site, account)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save(&self, snapshot: &SessionSnapshot, account: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| AppError::Storage(format!("Failed to create session dir: {}", e)))?;
        let path = self.path_for(&snapshot.site, account);
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json)
            .map_err(|e| AppError::Storage(format!("Failed to write session file: {}", e)))?;
        tracing::debug!(path = %path.display(), "Session snapshot saved");
        Ok(())
    }

    /// Deleting a non-existent snapshot is not an error.
    pub fn delete(&self, site: &str, account: &str) -> Result<()> {
        let path = self.path_for(site, account);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete session: {}", e))),
        }
    }
}

fn slug(site: &str, account: &str) -> String {
    let mut s = format!("{}-{}", site, account);
    s = s.to_lowercase();
    s.retain(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@');
    s.replace('@', "_at_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> SessionStore {
        let dir = std::env::temp_dir().join(format!(
            "feedsift-session-test-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        SessionStore::new(dir)
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            site: "facebook.com".to_string(),
            saved_at: Utc::now(),
            cookies: vec![SessionCookie {
                name: "c_user".to_string(),
                value: "12345".to_string(),
                domain: ".facebook.com".to_string(),
                ..SessionCookie::default()
            }],
            local_storage: vec![("k".to_string(), "v".to_string())],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = temp_store();
        store.save(&snapshot(), "user@example.com").unwrap();

        let loaded = store.load("facebook.com", "user@example.com").unwrap();
        assert_eq!(loaded.cookies.len(), 1);
        assert_eq!(loaded.cookies[0].name, "c_user");
        assert_eq!(loaded.local_storage.len(), 1);
    }

    #[test]
    fn load_missing_returns_none() {
        let store = temp_store();
        assert!(store.load("facebook.com", "nobody@example.com").is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = temp_store();
        store.delete("facebook.com", "user@example.com").unwrap();

        store.save(&snapshot(), "user@example.com").unwrap();
        store.delete("facebook.com", "user@example.com").unwrap();
        assert!(!store.exists("facebook.com", "user@example.com"));
        store.delete("facebook.com", "user@example.com").unwrap();
    }

    #[test]
    fn cookie_parses_devtools_shape() {
        let cookie: SessionCookie = serde_json::from_str(
            r#"{"name":"xs","value":"abc","domain":".facebook.com","path":"/",
                "expires":1893456000.5,"size":7,"httpOnly":true,"secure":true,
                "session":false,"priority":"Medium"}"#,
        )
        .unwrap();
        assert!(cookie.http_only);
        assert_eq!(cookie.expires, Some(1893456000.5));
    }
}
