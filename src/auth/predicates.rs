//! Pure policy predicates.
//!
//! Each predicate decides from the [`Caller`] and the target row's
//! attributes alone; re-evaluating with unchanged inputs always yields the
//! same decision. The one stateful check, `can_access_face_match`, lives on
//! `db::Database` because it consults the activity log and writes to it.

use super::{Caller, Role};
use crate::db::events::Visibility;

/// Caller holds the admin role.
pub fn is_admin(caller: &Caller) -> bool {
    caller.role == Some(Role::Admin)
}

/// Caller holds the admin or editor role.
pub fn is_admin_or_editor(caller: &Caller) -> bool {
    matches!(caller.role, Some(Role::Admin) | Some(Role::Editor))
}

/// Caller's identity equals the row's owner/uploader/actor field.
pub fn owns(caller: &Caller, owner: &str) -> bool {
    caller.identity.as_deref() == Some(owner)
}

/// Event is visible to the caller.
///
/// Private and hybrid both collapse to "any authenticated caller" here.
/// That matches the rules this layer replaces; whether hybrid was meant to
/// be something narrower is an open upstream question.
pub fn event_is_accessible(caller: &Caller, visibility: Visibility) -> bool {
    visibility == Visibility::Public || caller.is_authenticated()
}
