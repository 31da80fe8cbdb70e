//! Column redaction for biometric payloads.
//!
//! The rule for each sensitive column lives here exactly once. Every read
//! path that returns photo or face-match rows routes the column through
//! these functions; adding a new view or query without doing so is how the
//! leak happens, so never restate the check inline.

use super::{predicates, Caller};

/// Biometric face payload of a photo.
///
/// Visible to an admin or to the uploader; everyone else gets `None` while
/// the rest of the row is returned untouched.
pub fn photo_face_data(
    caller: &Caller,
    uploaded_by: &str,
    face_data: Option<String>,
) -> Option<String> {
    if predicates::is_admin(caller) || predicates::owns(caller, uploaded_by) {
        face_data
    } else {
        None
    }
}

/// Raw scan payload of a face match.
///
/// Admin only. The match row itself may be visible to its owner, but the
/// scan payload never is.
pub fn match_scan_data(caller: &Caller, face_scan_data: Option<String>) -> Option<String> {
    if predicates::is_admin(caller) {
        face_scan_data
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn payload() -> Option<String> {
        Some("{\"landmarks\":[1,2,3]}".to_string())
    }

    #[test]
    fn test_photo_face_data_visibility() {
        let admin = Caller::new("alice", Some(Role::Admin));
        let uploader = Caller::new("bob", Some(Role::Editor));
        let viewer = Caller::new("carol", Some(Role::Viewer));

        assert_eq!(photo_face_data(&admin, "bob", payload()), payload());
        assert_eq!(photo_face_data(&uploader, "bob", payload()), payload());
        assert_eq!(photo_face_data(&viewer, "bob", payload()), None);
        assert_eq!(photo_face_data(&Caller::anonymous(), "bob", payload()), None);
    }

    #[test]
    fn test_match_scan_data_admin_only() {
        let admin = Caller::new("alice", Some(Role::Admin));
        let owner = Caller::new("bob", Some(Role::Viewer));

        assert_eq!(match_scan_data(&admin, payload()), payload());
        // Even the owner of the match never sees the raw scan.
        assert_eq!(match_scan_data(&owner, payload()), None);
        assert_eq!(match_scan_data(&Caller::anonymous(), payload()), None);
    }
}
