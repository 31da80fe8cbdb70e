//! Append-only activity log.
//!
//! Inserts are unrestricted so failed and anonymous access attempts can be
//! recorded; reads are role-gated. Rows are never updated or deleted.

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::Database;
use crate::auth::{predicates, Caller};

/// Category of an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    UserCreated,
    EventCreated,
    PhotoUploaded,
    RoleChanged,
    /// A `can_access_face_match` evaluation, granted or denied.
    BiometricAccess,
    /// Evaluation against a missing match or a mismatched owner.
    InvalidBiometricAccess,
    /// Evaluation denied because the caller exceeded the attempt window.
    RateLimited,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 7] = [
        ActivityKind::UserCreated,
        ActivityKind::EventCreated,
        ActivityKind::PhotoUploaded,
        ActivityKind::RoleChanged,
        ActivityKind::BiometricAccess,
        ActivityKind::InvalidBiometricAccess,
        ActivityKind::RateLimited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::UserCreated => "user_created",
            ActivityKind::EventCreated => "event_created",
            ActivityKind::PhotoUploaded => "photo_uploaded",
            ActivityKind::RoleChanged => "role_changed",
            ActivityKind::BiometricAccess => "face_match_access",
            ActivityKind::InvalidBiometricAccess => "invalid_biometric_access",
            ActivityKind::RateLimited => "rate_limited",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user_created" => Some(ActivityKind::UserCreated),
            "event_created" => Some(ActivityKind::EventCreated),
            "photo_uploaded" => Some(ActivityKind::PhotoUploaded),
            "role_changed" => Some(ActivityKind::RoleChanged),
            "face_match_access" => Some(ActivityKind::BiometricAccess),
            "invalid_biometric_access" => Some(ActivityKind::InvalidBiometricAccess),
            "rate_limited" => Some(ActivityKind::RateLimited),
            _ => None,
        }
    }

    /// Whether editors may read entries of this kind. Security-sensitive
    /// categories stay admin-only.
    pub fn editor_visible(&self) -> bool {
        matches!(
            self,
            ActivityKind::UserCreated | ActivityKind::EventCreated | ActivityKind::PhotoUploaded
        )
    }

    /// Kinds counted against the biometric access rate limit.
    pub(crate) fn biometric_kinds() -> [&'static str; 3] {
        [
            ActivityKind::BiometricAccess.as_str(),
            ActivityKind::InvalidBiometricAccess.as_str(),
            ActivityKind::RateLimited.as_str(),
        ]
    }
}

/// Structured metadata attached to a log entry, tagged by shape.
///
/// Entries written by older versions or external tooling may not match any
/// known shape; those fall back to [`ActivityMetadata::Opaque`] instead of
/// failing the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityMetadata {
    UserCreated {
        email: Option<String>,
    },
    EventCreated {
        event_id: i64,
        visibility: String,
    },
    PhotoUploaded {
        photo_id: i64,
        event_id: i64,
    },
    RoleChanged {
        profile_id: String,
        role: String,
    },
    BiometricAccess {
        match_id: i64,
        owner: String,
        granted: bool,
    },
    InvalidBiometricAccess {
        match_id: i64,
        claimed_owner: String,
    },
    RateLimited {
        match_id: i64,
        attempts: i64,
    },
    #[serde(untagged)]
    Opaque(serde_json::Value),
}

/// A stored activity log entry.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    pub id: i64,
    pub actor: Option<String>,
    pub kind: ActivityKind,
    pub description: String,
    pub metadata: Option<ActivityMetadata>,
    pub created_at: String,
}

impl Database {
    /// Append a log entry. Deliberately takes no caller: anonymous and
    /// system flows (failed access attempts included) must be able to log.
    pub fn log_activity(
        &self,
        actor: Option<&str>,
        kind: ActivityKind,
        description: &str,
        metadata: Option<&ActivityMetadata>,
    ) -> Result<i64> {
        let metadata_json = match metadata {
            Some(m) => Some(serde_json::to_string(m)?),
            None => None,
        };
        self.conn.execute(
            "INSERT INTO activity_logs (actor, kind, description, metadata) VALUES (?, ?, ?, ?)",
            params![actor, kind.as_str(), description, metadata_json],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Count the caller's biometric access attempts inside the trailing
    /// window. Evaluated as a single query so concurrent bursts on the same
    /// connection are counted consistently.
    pub(crate) fn count_recent_biometric_attempts(&self, identity: &str) -> Result<i64> {
        let window = chrono::Duration::seconds(self.access.attempt_window_secs as i64);
        let cutoff = (Utc::now() - window).format("%Y-%m-%d %H:%M:%S").to_string();
        let [a, b, c] = ActivityKind::biometric_kinds();
        let count = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM activity_logs
            WHERE actor = ? AND kind IN (?, ?, ?) AND created_at >= ?
            "#,
            params![identity, a, b, c, cutoff],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    /// Read the log, newest first. Admins see everything, editors the
    /// non-security subset, everyone else nothing.
    pub fn list_activity(&self, caller: &Caller, limit: usize) -> Result<Vec<ActivityLog>> {
        if !predicates::is_admin_or_editor(caller) {
            return Ok(Vec::new());
        }

        let mut query = String::from(
            "SELECT id, actor, kind, description, metadata, created_at FROM activity_logs",
        );
        if !predicates::is_admin(caller) {
            // Restrict in SQL so the limit counts visible rows, not raw rows.
            let kinds: Vec<String> = ActivityKind::ALL
                .iter()
                .filter(|k| k.editor_visible())
                .map(|k| format!("'{}'", k.as_str()))
                .collect();
            query.push_str(&format!(" WHERE kind IN ({})", kinds.join(", ")));
        }
        query.push_str(" ORDER BY id DESC LIMIT ?");

        let mut stmt = self.conn.prepare(&query)?;
        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, actor, kind, description, metadata, created_at)| {
                let kind = ActivityKind::from_str(&kind)?;
                let metadata = metadata.and_then(|m| serde_json::from_str(&m).ok());
                Some(ActivityLog {
                    id,
                    actor,
                    kind,
                    description,
                    metadata,
                    created_at,
                })
            })
            .collect();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::AccessConfig;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db"), AccessConfig::default()).unwrap();
        db.initialize().unwrap();
        (dir, db)
    }

    #[test]
    fn test_metadata_is_tagged_json() {
        let meta = ActivityMetadata::BiometricAccess {
            match_id: 7,
            owner: "bob".to_string(),
            granted: false,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"type\":\"biometric_access\""));
        assert_eq!(serde_json::from_str::<ActivityMetadata>(&json).unwrap(), meta);
    }

    #[test]
    fn test_unknown_metadata_falls_back_to_opaque() {
        let parsed: ActivityMetadata =
            serde_json::from_str(r#"{"legacy_field": 42}"#).unwrap();
        match parsed {
            ActivityMetadata::Opaque(value) => assert_eq!(value["legacy_field"], 42),
            other => panic!("expected opaque fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_anonymous_insert_allowed() {
        let (_dir, db) = test_db();
        db.log_activity(None, ActivityKind::InvalidBiometricAccess, "probe", None)
            .unwrap();

        let admin = Caller::new("alice", Some(Role::Admin));
        let entries = db.list_activity(&admin, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].actor.is_none());
    }

    #[test]
    fn test_editor_sees_only_subset() {
        let (_dir, db) = test_db();
        db.log_activity(Some("u1"), ActivityKind::UserCreated, "signup", None)
            .unwrap();
        db.log_activity(Some("u1"), ActivityKind::BiometricAccess, "lookup", None)
            .unwrap();
        db.log_activity(Some("u1"), ActivityKind::RateLimited, "too many", None)
            .unwrap();

        let admin = Caller::new("alice", Some(Role::Admin));
        assert_eq!(db.list_activity(&admin, 10).unwrap().len(), 3);

        let editor = Caller::new("bob", Some(Role::Editor));
        let visible = db.list_activity(&editor, 10).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].kind, ActivityKind::UserCreated);

        let viewer = Caller::new("carol", Some(Role::Viewer));
        assert!(db.list_activity(&viewer, 10).unwrap().is_empty());
        assert!(db.list_activity(&Caller::anonymous(), 10).unwrap().is_empty());
    }

    #[test]
    fn test_editor_limit_counts_visible_rows() {
        let (_dir, db) = test_db();
        db.log_activity(Some("u1"), ActivityKind::UserCreated, "signup", None)
            .unwrap();
        db.log_activity(Some("u1"), ActivityKind::EventCreated, "event", None)
            .unwrap();
        for _ in 0..5 {
            db.log_activity(Some("u1"), ActivityKind::BiometricAccess, "lookup", None)
                .unwrap();
        }

        // The newest five rows are admin-only; a limit of two must still
        // return two visible rows, not an empty page.
        let editor = Caller::new("bob", Some(Role::Editor));
        let visible = db.list_activity(&editor, 2).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|e| e.kind.editor_visible()));
    }
}
