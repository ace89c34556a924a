use std::path::PathBuf;
use std::sync::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::config::Settings;
use crate::error::ConfigError;

/// The Roster owns the permission sets and the settings document they live in.
///
/// Reads (`has_permission`) take a short std lock on the in-memory whitelist.
/// Writes go through `document`, an async mutex held across the append AND the
/// save, so two admins extending the whitelist at once can't lose an update.
pub struct Roster {
    admin: Vec<i64>,
    whitelist: RwLock<Vec<i64>>,
    document: Mutex<Settings>,
    path: PathBuf,
}

impl Roster {
    pub fn new(settings: Settings, path: PathBuf) -> Self {
        Roster {
            admin: settings.admin.clone(),
            whitelist: RwLock::new(settings.whitelist.clone()),
            document: Mutex::new(settings),
            path,
        }
    }

    /// True iff the requester is an admin or whitelisted
    pub fn has_permission(&self, user_id: i64) -> bool {
        self.is_admin(user_id) || self.is_whitelisted(user_id)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin.contains(&user_id)
    }

    fn is_whitelisted(&self, user_id: i64) -> bool {
        let whitelist = self.whitelist.read().unwrap_or_else(|e| e.into_inner());
        whitelist.contains(&user_id)
    }

    /// Append to the whitelist and persist the whole document.
    ///
    /// Duplicates are kept: appending the same id twice stores it twice.
    /// If saving fails the in-memory append is rolled back.
    pub async fn add_whitelist(&self, user_id: i64) -> Result<(), ConfigError> {
        let mut document = self.document.lock().await;
        document.whitelist.push(user_id);

        let snapshot = document.clone();
        let path = self.path.clone();
        let saved = tokio::task::spawn_blocking(move || snapshot.save(&path))
            .await
            .map_err(|e| ConfigError::Persist(format!("task join error: {}", e)))
            .and_then(|result| result);

        match saved {
            Ok(()) => {
                let mut whitelist = self.whitelist.write().unwrap_or_else(|e| e.into_inner());
                *whitelist = document.whitelist.clone();
                info!("📝 Whitelisted user {} ({} entries)", user_id, whitelist.len());
                Ok(())
            }
            Err(e) => {
                document.whitelist.pop();
                warn!("⚠️  Failed to persist whitelist: {}", e);
                Err(e)
            }
        }
    }

    /// Snapshot of (admins, whitelist), in document order
    pub fn list(&self) -> (Vec<i64>, Vec<i64>) {
        let whitelist = self.whitelist.read().unwrap_or_else(|e| e.into_inner());
        (self.admin.clone(), whitelist.clone())
    }
}

impl std::fmt::Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roster")
            .field("admin", &self.admin)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn roster_in(dir: &tempfile::TempDir) -> (Roster, PathBuf) {
        let path = dir.path().join("config.json");
        let settings =
            Settings::from_json(r#"{"token": "t", "admin": [1], "whitelist": [2]}"#).unwrap();
        settings.save(&path).unwrap();
        (Roster::new(settings, path.clone()), path)
    }

    #[test]
    fn test_permission_gate() {
        let dir = tempfile::tempdir().unwrap();
        let (roster, _) = roster_in(&dir);

        assert!(roster.has_permission(1));
        assert!(roster.has_permission(2));
        for outsider in [0, 3, -1, 999_999_999] {
            assert!(!roster.has_permission(outsider));
            assert!(!roster.is_admin(outsider));
        }
        assert!(roster.is_admin(1));
        assert!(!roster.is_admin(2));
    }

    #[tokio::test]
    async fn test_add_whitelist_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (roster, path) = roster_in(&dir);

        roster.add_whitelist(7).await.unwrap();

        assert!(roster.has_permission(7));
        let on_disk = Settings::load(&path).unwrap();
        assert_eq!(on_disk.whitelist, vec![2, 7]);
    }

    #[tokio::test]
    async fn test_duplicate_append_keeps_both_entries() {
        let dir = tempfile::tempdir().unwrap();
        let (roster, path) = roster_in(&dir);

        roster.add_whitelist(7).await.unwrap();
        roster.add_whitelist(7).await.unwrap();

        let (_, whitelist) = roster.list();
        assert_eq!(whitelist, vec![2, 7, 7]);
        assert_eq!(Settings::load(&path).unwrap().whitelist, vec![2, 7, 7]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let (roster, path) = roster_in(&dir);
        let roster = Arc::new(roster);

        let a = tokio::spawn({
            let roster = roster.clone();
            async move { roster.add_whitelist(100).await }
        });
        let b = tokio::spawn({
            let roster = roster.clone();
            async move { roster.add_whitelist(200).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let on_disk = Settings::load(&path).unwrap().whitelist;
        assert!(on_disk.contains(&100));
        assert!(on_disk.contains(&200));
        assert!(roster.has_permission(100));
        assert!(roster.has_permission(200));
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            Settings::from_json(r#"{"token": "t", "admin": [1], "whitelist": []}"#).unwrap();
        let missing = dir.path().join("no-such-dir").join("config.json");
        let roster = Roster::new(settings, missing);

        assert!(roster.add_whitelist(5).await.is_err());
        assert!(!roster.has_permission(5));
        assert!(roster.list().1.is_empty());
    }
}
