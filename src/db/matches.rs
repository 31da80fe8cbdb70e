//! Face match storage and the audited biometric access check.
//!
//! Every evaluation of the access predicate appends exactly one activity
//! row, granted or denied, inside the same transaction as the rate-limit
//! count. Missing matches and mismatched owners are indistinguishable from
//! the outside so callers cannot probe for row existence.

use anyhow::Result;
use rusqlite::params;
use tracing::warn;

use super::activity::{ActivityKind, ActivityMetadata};
use super::Database;
use crate::auth::{predicates, redact, Caller};

/// A stored face match. `face_scan_data` has already been through
/// redaction by the time a caller sees this struct.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub id: i64,
    pub photo_id: i64,
    pub user_id: String,
    pub confidence: Option<f64>,
    pub face_scan_data: Option<String>,
    pub created_at: String,
}

impl Database {
    /// Decide whether `caller` may access match `match_id` belonging to
    /// `owner`.
    ///
    /// True only for an authenticated admin or the owner, when the match
    /// exists under that owner and the caller is inside the rate limit.
    /// Always appends exactly one activity row recording the decision.
    pub fn can_access_face_match(
        &self,
        caller: &Caller,
        owner: &str,
        match_id: i64,
    ) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(identity) = caller.identity.as_deref() else {
            self.log_activity(
                None,
                ActivityKind::BiometricAccess,
                "anonymous face match access denied",
                Some(&ActivityMetadata::BiometricAccess {
                    match_id,
                    owner: owner.to_string(),
                    granted: false,
                }),
            )?;
            tx.commit()?;
            return Ok(false);
        };

        if let Some(attempts) = self.rate_limited(identity)? {
            self.log_activity(
                Some(identity),
                ActivityKind::RateLimited,
                "face match access rate limited",
                Some(&ActivityMetadata::RateLimited { match_id, attempts }),
            )?;
            tx.commit()?;
            return Ok(false);
        }

        let stored_owner = self.conn.query_row(
            "SELECT user_id FROM face_matches WHERE id = ?",
            [match_id],
            |row| row.get::<_, String>(0),
        );
        let owner_matches = match stored_owner {
            Ok(actual) => actual == owner,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(e) => return Err(e.into()),
        };
        if !owner_matches {
            // Missing row and wrong owner take the same path on purpose.
            self.log_activity(
                Some(identity),
                ActivityKind::InvalidBiometricAccess,
                "face match reference did not resolve",
                Some(&ActivityMetadata::InvalidBiometricAccess {
                    match_id,
                    claimed_owner: owner.to_string(),
                }),
            )?;
            tx.commit()?;
            return Ok(false);
        }

        let granted = predicates::is_admin(caller) || predicates::owns(caller, owner);
        self.log_activity(
            Some(identity),
            ActivityKind::BiometricAccess,
            if granted {
                "face match access granted"
            } else {
                "face match access denied"
            },
            Some(&ActivityMetadata::BiometricAccess {
                match_id,
                owner: owner.to_string(),
                granted,
            }),
        )?;
        tx.commit()?;
        Ok(granted)
    }

    /// Record a match for a scanned user. The caller must be the matched
    /// user; recording counts against the same rate limit as lookups.
    /// Returns the new id, or `None` when rejected.
    pub fn record_match(
        &self,
        caller: &Caller,
        photo_id: i64,
        user_id: &str,
        confidence: f64,
        scan_data: Option<&str>,
    ) -> Result<Option<i64>> {
        if caller.identity.is_none() || !predicates::owns(caller, user_id) {
            return Ok(None);
        }
        let identity = user_id;

        let tx = self.conn.unchecked_transaction()?;

        if let Some(attempts) = self.rate_limited(identity)? {
            self.log_activity(
                Some(identity),
                ActivityKind::RateLimited,
                "face match recording rate limited",
                Some(&ActivityMetadata::RateLimited {
                    match_id: photo_id,
                    attempts,
                }),
            )?;
            tx.commit()?;
            return Ok(None);
        }

        let photo_exists = match self.conn.query_row(
            "SELECT 1 FROM photos WHERE id = ?",
            [photo_id],
            |_| Ok(true),
        ) {
            Ok(exists) => exists,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(e) => return Err(e.into()),
        };
        if !photo_exists {
            tx.commit()?;
            return Ok(None);
        }

        self.conn.execute(
            r#"
            INSERT INTO face_matches (photo_id, user_id, confidence, face_scan_data)
            VALUES (?, ?, ?, ?)
            "#,
            params![photo_id, user_id, confidence, scan_data],
        )?;
        let id = self.conn.last_insert_rowid();
        self.log_activity(
            Some(identity),
            ActivityKind::BiometricAccess,
            "face match recorded",
            Some(&ActivityMetadata::BiometricAccess {
                match_id: id,
                owner: user_id.to_string(),
                granted: true,
            }),
        )?;
        tx.commit()?;
        Ok(Some(id))
    }

    /// List matches: own rows for authenticated callers, anyone's for an
    /// admin via `target`. The scan payload goes through redaction, so only
    /// admins receive it.
    pub fn list_face_matches(
        &self,
        caller: &Caller,
        target: Option<&str>,
    ) -> Result<Vec<FaceMatch>> {
        let Some(identity) = caller.identity.as_deref() else {
            return Ok(Vec::new());
        };
        let admin = predicates::is_admin(caller);
        let subject = match target {
            Some(t) if !admin && t != identity => return Ok(Vec::new()),
            Some(t) => Some(t),
            None if admin => None,
            None => Some(identity),
        };

        let mut query = String::from(
            "SELECT id, photo_id, user_id, confidence, face_scan_data, created_at \
             FROM face_matches",
        );
        if subject.is_some() {
            query.push_str(" WHERE user_id = ?");
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut stmt = self.conn.prepare(&query)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<FaceMatch> {
            Ok(FaceMatch {
                id: row.get(0)?,
                photo_id: row.get(1)?,
                user_id: row.get(2)?,
                confidence: row.get(3)?,
                face_scan_data: row.get(4)?,
                created_at: row.get(5)?,
            })
        };
        let raw: Vec<FaceMatch> = match subject {
            Some(s) => stmt.query_map([s], map_row)?.filter_map(|r| r.ok()).collect(),
            None => stmt.query_map([], map_row)?.filter_map(|r| r.ok()).collect(),
        };
        Ok(raw
            .into_iter()
            .map(|mut m| {
                m.face_scan_data = redact::match_scan_data(caller, m.face_scan_data.take());
                m
            })
            .collect())
    }

    /// Fetch the raw scan payload of a match. Redaction makes this admin
    /// only; for everyone else, forbidden and not-found both come back as
    /// `None`.
    pub fn get_scan_data(&self, caller: &Caller, match_id: i64) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT face_scan_data FROM face_matches WHERE id = ?",
            [match_id],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(raw) => Ok(redact::match_scan_data(caller, raw)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the attempt count when the caller has used up the window.
    fn rate_limited(&self, identity: &str) -> Result<Option<i64>> {
        let attempts = self.count_recent_biometric_attempts(identity)?;
        if attempts >= self.access.max_biometric_attempts as i64 {
            warn!(identity, attempts, "biometric access rate limited");
            Ok(Some(attempts))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::AccessConfig;
    use crate::db::events::Visibility;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db"), AccessConfig::default()).unwrap();
        db.initialize().unwrap();
        (dir, db)
    }

    const SCAN_PAYLOAD: &str = r#"{"vector":[0.1,0.2]}"#;

    /// Admin "root", editor "ed", viewer "vera"; one public event with one
    /// photo and one face match owned by vera.
    fn seed(db: &Database) -> i64 {
        db.bootstrap_admin("root", "Root").unwrap();
        db.ensure_profile("ed", "Ed", None).unwrap();
        let admin = db.caller(Some("root")).unwrap();
        db.set_role(&admin, "ed", Role::Editor).unwrap();
        db.ensure_profile("vera", "Vera", None).unwrap();

        let ed = db.caller(Some("ed")).unwrap();
        let event_id = db
            .create_event(&ed, "Party", None, None, None, Visibility::Public)
            .unwrap()
            .unwrap();
        let photo_id = db
            .add_photo(&ed, event_id, "a.jpg", "/photos/a.jpg", 1, None, 1, None)
            .unwrap()
            .unwrap();
        let vera = db.caller(Some("vera")).unwrap();
        db.record_match(&vera, photo_id, "vera", 0.93, Some(SCAN_PAYLOAD))
            .unwrap()
            .unwrap()
    }

    fn activity_count(db: &Database) -> i64 {
        db.conn
            .query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))
            .unwrap()
    }

    fn last_activity_kind(db: &Database) -> String {
        db.conn
            .query_row(
                "SELECT kind FROM activity_logs ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_access_truth_table() {
        let (_dir, db) = test_db();
        let match_id = seed(&db);

        let admin = db.caller(Some("root")).unwrap();
        let ed = db.caller(Some("ed")).unwrap();
        let vera = db.caller(Some("vera")).unwrap();

        assert!(!db.can_access_face_match(&Caller::anonymous(), "vera", match_id).unwrap());
        assert!(db.can_access_face_match(&vera, "vera", match_id).unwrap());
        assert!(db.can_access_face_match(&admin, "vera", match_id).unwrap());
        assert!(!db.can_access_face_match(&ed, "vera", match_id).unwrap());
    }

    #[test]
    fn test_missing_and_mismatched_rows_look_identical() {
        let (_dir, db) = test_db();
        let match_id = seed(&db);
        let vera = db.caller(Some("vera")).unwrap();

        assert!(!db.can_access_face_match(&vera, "vera", match_id + 100).unwrap());
        assert_eq!(last_activity_kind(&db), "invalid_biometric_access");

        // Existing row, wrong owner claim: same observable outcome.
        assert!(!db.can_access_face_match(&vera, "ed", match_id).unwrap());
        assert_eq!(last_activity_kind(&db), "invalid_biometric_access");
    }

    #[test]
    fn test_every_evaluation_logs_exactly_once() {
        let (_dir, db) = test_db();
        let match_id = seed(&db);
        let vera = db.caller(Some("vera")).unwrap();
        let ed = db.caller(Some("ed")).unwrap();

        for (caller, owner, id) in [
            (&Caller::anonymous(), "vera", match_id),
            (&vera, "vera", match_id),
            (&ed, "vera", match_id),
            (&vera, "vera", match_id + 100),
        ] {
            let before = activity_count(&db);
            db.can_access_face_match(caller, owner, id).unwrap();
            assert_eq!(activity_count(&db), before + 1);
        }
    }

    #[test]
    fn test_rate_limit_denies_even_the_owner() {
        let (_dir, db) = test_db();
        let match_id = seed(&db);
        let vera = db.caller(Some("vera")).unwrap();

        // Seeding recorded one attempt for vera already; nine more reach
        // the 10-attempt cap.
        for _ in 0..9 {
            assert!(db.can_access_face_match(&vera, "vera", match_id).unwrap());
        }
        assert!(!db.can_access_face_match(&vera, "vera", match_id).unwrap());
        assert_eq!(last_activity_kind(&db), "rate_limited");

        // Other callers are unaffected by vera's window.
        let admin = db.caller(Some("root")).unwrap();
        assert!(db.can_access_face_match(&admin, "vera", match_id).unwrap());
    }

    #[test]
    fn test_record_requires_matching_identity() {
        let (_dir, db) = test_db();
        seed(&db);
        let ed = db.caller(Some("ed")).unwrap();

        // ed may not plant a match owned by vera.
        assert!(db.record_match(&ed, 1, "vera", 0.5, None).unwrap().is_none());
        assert!(db
            .record_match(&Caller::anonymous(), 1, "vera", 0.5, None)
            .unwrap()
            .is_none());
        // Nonexistent photo is rejected quietly.
        assert!(db.record_match(&ed, 9999, "ed", 0.5, None).unwrap().is_none());
    }

    #[test]
    fn test_scan_payload_is_admin_only() {
        let (_dir, db) = test_db();
        let match_id = seed(&db);

        let vera = db.caller(Some("vera")).unwrap();
        let own = db.list_face_matches(&vera, None).unwrap();
        assert_eq!(own.len(), 1);
        assert!(own[0].face_scan_data.is_none());
        assert!(db.get_scan_data(&vera, match_id).unwrap().is_none());

        let admin = db.caller(Some("root")).unwrap();
        let all = db.list_face_matches(&admin, None).unwrap();
        assert_eq!(all[0].face_scan_data.as_deref(), Some(SCAN_PAYLOAD));
        assert_eq!(
            db.get_scan_data(&admin, match_id).unwrap().as_deref(),
            Some(SCAN_PAYLOAD)
        );
    }

    #[test]
    fn test_listing_is_scoped_to_owner() {
        let (_dir, db) = test_db();
        seed(&db);
        let ed = db.caller(Some("ed")).unwrap();
        let vera = db.caller(Some("vera")).unwrap();

        assert!(db.list_face_matches(&ed, None).unwrap().is_empty());
        // Non-admin asking for someone else's rows gets nothing.
        assert!(db.list_face_matches(&ed, Some("vera")).unwrap().is_empty());
        assert_eq!(db.list_face_matches(&vera, Some("vera")).unwrap().len(), 1);
        assert!(db.list_face_matches(&Caller::anonymous(), None).unwrap().is_empty());

        let admin = db.caller(Some("root")).unwrap();
        assert_eq!(db.list_face_matches(&admin, Some("vera")).unwrap().len(), 1);
        assert_eq!(db.list_face_matches(&admin, None).unwrap().len(), 1);
    }
}
