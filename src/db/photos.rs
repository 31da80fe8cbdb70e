//! Photo storage with biometric column redaction.
//!
//! Rows are admitted when the parent event is visible to the caller; the
//! `face_data` column goes through [`redact::photo_face_data`] on every
//! path out of this module. No query returns the raw column directly.

use anyhow::Result;
use rusqlite::params;
use tracing::info;

use super::activity::{ActivityKind, ActivityMetadata};
use super::events::Visibility;
use super::Database;
use crate::auth::{predicates, redact, Caller};

/// A stored photo. `face_data` has already been through redaction by the
/// time a caller sees this struct.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: i64,
    pub event_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub uploaded_by: String,
    pub face_count: i64,
    pub face_data: Option<String>,
    pub created_at: String,
}

const PHOTO_COLUMNS: &str = "p.id, p.event_id, p.file_name, p.file_path, p.size_bytes, \
     p.mime_type, p.uploaded_by, p.face_count, p.face_data, p.created_at, e.visibility";

fn photo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Photo, Visibility)> {
    let photo = Photo {
        id: row.get(0)?,
        event_id: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        size_bytes: row.get(4)?,
        mime_type: row.get(5)?,
        uploaded_by: row.get(6)?,
        face_count: row.get(7)?,
        face_data: row.get(8)?,
        created_at: row.get(9)?,
    };
    let visibility =
        Visibility::from_str(&row.get::<_, String>(10)?).unwrap_or(Visibility::Private);
    Ok((photo, visibility))
}

/// Admit or drop a raw row for this caller, redacting the biometric column.
fn admit(caller: &Caller, (mut photo, visibility): (Photo, Visibility)) -> Option<Photo> {
    if !predicates::event_is_accessible(caller, visibility) {
        return None;
    }
    photo.face_data = redact::photo_face_data(caller, &photo.uploaded_by, photo.face_data.take());
    Some(photo)
}

impl Database {
    /// Upload a photo into an event. Admin-or-editor only; the parent event
    /// must be visible to the caller. Returns the new id, or `None` when
    /// rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn add_photo(
        &self,
        caller: &Caller,
        event_id: i64,
        file_name: &str,
        file_path: &str,
        size_bytes: i64,
        mime_type: Option<&str>,
        face_count: i64,
        face_data: Option<&str>,
    ) -> Result<Option<i64>> {
        if !predicates::is_admin_or_editor(caller) {
            return Ok(None);
        }
        let Some(identity) = caller.identity.as_deref() else {
            return Ok(None);
        };
        if self.get_event(caller, event_id)?.is_none() {
            return Ok(None);
        }
        self.conn.execute(
            r#"
            INSERT INTO photos (event_id, file_name, file_path, size_bytes, mime_type,
                                uploaded_by, face_count, face_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![event_id, file_name, file_path, size_bytes, mime_type, identity, face_count, face_data],
        )?;
        let id = self.conn.last_insert_rowid();
        self.log_activity(
            Some(identity),
            ActivityKind::PhotoUploaded,
            &format!("photo '{}' uploaded", file_name),
            Some(&ActivityMetadata::PhotoUploaded {
                photo_id: id,
                event_id,
            }),
        )?;
        info!(photo_id = id, event_id, "added photo");
        Ok(Some(id))
    }

    /// List photos visible to the caller, optionally restricted to one
    /// event, with `face_data` redacted.
    pub fn list_safe_photos(
        &self,
        caller: &Caller,
        event_filter: Option<i64>,
    ) -> Result<Vec<Photo>> {
        let raw: Vec<(Photo, Visibility)> = match event_filter {
            Some(event_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    r#"
                    SELECT {}
                    FROM photos p
                    JOIN events e ON e.id = p.event_id
                    WHERE p.event_id = ?
                    ORDER BY p.created_at DESC
                    "#,
                    PHOTO_COLUMNS
                ))?;
                let rows = stmt.query_map([event_id], photo_from_row)?;
                rows.filter_map(|r| r.ok()).collect()
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    r#"
                    SELECT {}
                    FROM photos p
                    JOIN events e ON e.id = p.event_id
                    ORDER BY p.created_at DESC
                    "#,
                    PHOTO_COLUMNS
                ))?;
                let rows = stmt.query_map([], photo_from_row)?;
                rows.filter_map(|r| r.ok()).collect()
            }
        };
        Ok(raw.into_iter().filter_map(|row| admit(caller, row)).collect())
    }

    /// Fetch one photo through the same admission and redaction path as
    /// listing.
    pub fn get_photo(&self, caller: &Caller, id: i64) -> Result<Option<Photo>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM photos p JOIN events e ON e.id = p.event_id WHERE p.id = ?",
                PHOTO_COLUMNS
            ),
            [id],
            photo_from_row,
        );
        match result {
            Ok(row) => Ok(admit(caller, row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rename or retype a photo: admin or its uploader.
    pub fn update_photo(
        &self,
        caller: &Caller,
        id: i64,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> Result<bool> {
        if !self.can_modify_photo(caller, id)? {
            return Ok(false);
        }
        let updated = self.conn.execute(
            "UPDATE photos SET file_name = ?, mime_type = ? WHERE id = ?",
            params![file_name, mime_type, id],
        )?;
        Ok(updated > 0)
    }

    /// Store face detection results for a photo: admin or its uploader.
    /// This is how the (upstream, mocked) scan pipeline writes back.
    pub fn set_face_results(
        &self,
        caller: &Caller,
        id: i64,
        face_count: i64,
        face_data: Option<&str>,
    ) -> Result<bool> {
        if !self.can_modify_photo(caller, id)? {
            return Ok(false);
        }
        let updated = self.conn.execute(
            "UPDATE photos SET face_count = ?, face_data = ? WHERE id = ?",
            params![face_count, face_data, id],
        )?;
        Ok(updated > 0)
    }

    /// Delete a photo. Admin only.
    pub fn delete_photo(&self, caller: &Caller, id: i64) -> Result<bool> {
        if !predicates::is_admin(caller) {
            return Ok(false);
        }
        let deleted = self.conn.execute("DELETE FROM photos WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    fn can_modify_photo(&self, caller: &Caller, id: i64) -> Result<bool> {
        let uploader = self.conn.query_row(
            "SELECT uploaded_by FROM photos WHERE id = ?",
            [id],
            |row| row.get::<_, String>(0),
        );
        match uploader {
            Ok(uploader) => {
                Ok(predicates::is_admin(caller) || predicates::owns(caller, &uploader))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
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

    const FACE_PAYLOAD: &str = r#"{"faces":[{"box":[1,2,3,4]}]}"#;

    /// Admin, editor "ed", viewer "vera", one public event with one photo
    /// uploaded by ed carrying a biometric payload.
    fn seed(db: &Database) -> (i64, i64) {
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
            .add_photo(&ed, event_id, "a.jpg", "/photos/a.jpg", 2048, Some("image/jpeg"), 1, Some(FACE_PAYLOAD))
            .unwrap()
            .unwrap();
        (event_id, photo_id)
    }

    #[test]
    fn test_viewer_gets_row_without_face_data() {
        let (_dir, db) = test_db();
        let (event_id, photo_id) = seed(&db);
        let vera = db.caller(Some("vera")).unwrap();

        // Both read paths must agree.
        let listed = db.list_safe_photos(&vera, Some(event_id)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_name, "a.jpg");
        assert_eq!(listed[0].face_count, 1);
        assert!(listed[0].face_data.is_none());

        let fetched = db.get_photo(&vera, photo_id).unwrap().unwrap();
        assert!(fetched.face_data.is_none());
    }

    #[test]
    fn test_admin_and_uploader_see_face_data() {
        let (_dir, db) = test_db();
        let (_event_id, photo_id) = seed(&db);

        let admin = db.caller(Some("root")).unwrap();
        let photo = db.get_photo(&admin, photo_id).unwrap().unwrap();
        assert_eq!(photo.face_data.as_deref(), Some(FACE_PAYLOAD));

        let ed = db.caller(Some("ed")).unwrap();
        let photo = db.get_photo(&ed, photo_id).unwrap().unwrap();
        assert_eq!(photo.face_data.as_deref(), Some(FACE_PAYLOAD));
    }

    #[test]
    fn test_photos_hidden_with_inaccessible_event() {
        let (_dir, db) = test_db();
        seed(&db);
        let ed = db.caller(Some("ed")).unwrap();
        let private_event = db
            .create_event(&ed, "Offsite", None, None, None, Visibility::Private)
            .unwrap()
            .unwrap();
        let hidden_photo = db
            .add_photo(&ed, private_event, "b.jpg", "/photos/b.jpg", 1024, None, 0, None)
            .unwrap()
            .unwrap();

        let anon = Caller::anonymous();
        assert_eq!(db.list_safe_photos(&anon, None).unwrap().len(), 1);
        assert!(db.get_photo(&anon, hidden_photo).unwrap().is_none());

        let vera = db.caller(Some("vera")).unwrap();
        assert_eq!(db.list_safe_photos(&vera, None).unwrap().len(), 2);
    }

    #[test]
    fn test_upload_requires_admin_or_editor() {
        let (_dir, db) = test_db();
        let (event_id, _) = seed(&db);

        let vera = db.caller(Some("vera")).unwrap();
        assert!(db
            .add_photo(&vera, event_id, "x.jpg", "/photos/x.jpg", 1, None, 0, None)
            .unwrap()
            .is_none());
        assert!(db
            .add_photo(&Caller::anonymous(), event_id, "x.jpg", "/photos/x.jpg", 1, None, 0, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_modify_is_admin_or_uploader() {
        let (_dir, db) = test_db();
        let (_event_id, photo_id) = seed(&db);

        let vera = db.caller(Some("vera")).unwrap();
        assert!(!db.update_photo(&vera, photo_id, "renamed.jpg", None).unwrap());
        assert!(!db.set_face_results(&vera, photo_id, 5, Some("{}")).unwrap());

        let ed = db.caller(Some("ed")).unwrap();
        assert!(db.update_photo(&ed, photo_id, "renamed.jpg", None).unwrap());

        let admin = db.caller(Some("root")).unwrap();
        assert!(db.set_face_results(&admin, photo_id, 2, Some("{}")).unwrap());
    }

    #[test]
    fn test_delete_admin_only() {
        let (_dir, db) = test_db();
        let (_event_id, photo_id) = seed(&db);

        let ed = db.caller(Some("ed")).unwrap();
        assert!(!db.delete_photo(&ed, photo_id).unwrap());

        let admin = db.caller(Some("root")).unwrap();
        assert!(db.delete_photo(&admin, photo_id).unwrap());
        assert!(db.get_photo(&admin, photo_id).unwrap().is_none());
    }
}
