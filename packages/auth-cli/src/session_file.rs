//! Local session storage.
//!
//! The bearer token is written as JSON next to the server URL it was issued
//! by, so `whoami` and `logout` talk to the right server.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::SessionReply;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub server_url: String,
    #[serde(flatten)]
    pub session: SessionReply,
}

pub fn load(path: &Path) -> Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let stored = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a session file", path.display()))?;
    Ok(Some(stored))
}

/// Write the session readable by the owner only; the file holds a bearer
/// token.
pub fn save(path: &Path, stored: &StoredSession) -> Result<()> {
    let contents = serde_json::to_string_pretty(stored)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;

    // `mode` only applies on creation; tighten a file left by an older run.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restrict permissions on {}", path.display()))?;
    }

    file.write_all(contents.as_bytes())
        .with_context(|| format!("write {}", path.display()))
}

/// Returns whether a file was removed.
pub fn remove(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use server_core::common::UserId;
    use server_core::domains::auth::models::{normalize_phone, RoleId};
    use server_core::domains::auth::SessionClaims;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("otp-session-{}.json", uuid::Uuid::new_v4()))
    }

    fn stored() -> StoredSession {
        StoredSession {
            server_url: "http://localhost:8080".to_string(),
            session: SessionReply {
                session_token: "token".to_string(),
                claims: SessionClaims {
                    user_id: UserId::new(),
                    role_id: RoleId::Mentor,
                    org_id: None,
                    permissions: RoleId::Mentor.default_permissions(),
                    phone: normalize_phone("9876543210").unwrap(),
                },
                expires_at: Utc::now(),
            },
        }
    }

    #[test]
    fn save_load_remove() {
        let path = temp_path();
        assert!(load(&path).unwrap().is_none());

        let stored = stored();
        save(&path, &stored).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.server_url, stored.server_url);
        assert_eq!(loaded.session.claims, stored.session.claims);

        assert!(remove(&path).unwrap());
        assert!(!remove(&path).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        let path = temp_path();
        save(&path, &stored()).unwrap();
        assert_eq!(mode(&path), 0o600);

        // An existing world-readable file is tightened on overwrite.
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        save(&path, &stored()).unwrap();
        assert_eq!(mode(&path), 0o600);
        assert!(load(&path).unwrap().is_some());

        remove(&path).unwrap();
    }

    #[test]
    fn garbage_file_is_an_error() {
        let path = temp_path();
        fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_err());
        remove(&path).unwrap();
    }
}
