//! Profile storage and role resolution.

use anyhow::Result;
use rusqlite::params;
use tracing::info;

use super::activity::{ActivityKind, ActivityMetadata};
use super::Database;
use crate::auth::{predicates, Caller, Role};

/// A stored profile. One per identity, created on first signup.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Database {
    /// Resolve the role for an identity with a direct table read.
    ///
    /// This is the one lookup that bypasses the policy layer: predicates
    /// receive the result through [`Caller`] instead of re-querying, so a
    /// role check can never recurse into another role check. Absent
    /// identity or missing profile resolves to `None`, never an error.
    pub fn resolve_role(&self, identity: Option<&str>) -> Result<Option<Role>> {
        let Some(id) = identity else {
            return Ok(None);
        };
        let result = self.conn.query_row(
            "SELECT role FROM profiles WHERE id = ?",
            [id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(role) => Ok(role.parse().ok()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve an identity into a [`Caller`] carrying its role.
    pub fn caller(&self, identity: Option<&str>) -> Result<Caller> {
        let role = self.resolve_role(identity)?;
        Ok(Caller {
            identity: identity.map(str::to_owned),
            role,
        })
    }

    /// Create the profile for a newly signed-up identity.
    ///
    /// Idempotent: the signup hook may fire more than once for the same
    /// identity. New profiles start as viewers; `user_created` is logged
    /// only when the row is actually new. Returns whether a row was created.
    pub fn ensure_profile(
        &self,
        identity: &str,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO profiles (id, display_name, email) VALUES (?, ?, ?)",
            params![identity, display_name, email],
        )?;
        if inserted > 0 {
            self.log_activity(
                Some(identity),
                ActivityKind::UserCreated,
                &format!("profile created for {}", display_name),
                Some(&ActivityMetadata::UserCreated {
                    email: email.map(str::to_owned),
                }),
            )?;
            info!(identity, "created profile");
        }
        Ok(inserted > 0)
    }

    /// Promote an identity to admin, but only while no admin exists yet.
    /// Operator bootstrap path; once an admin exists, roles change through
    /// [`Database::set_role`] alone.
    pub fn bootstrap_admin(&self, identity: &str, display_name: &str) -> Result<bool> {
        let admins: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM profiles WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        if admins > 0 {
            return Ok(false);
        }
        self.ensure_profile(identity, display_name, None)?;
        self.conn.execute(
            "UPDATE profiles SET role = 'admin', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            [identity],
        )?;
        self.log_activity(
            None,
            ActivityKind::RoleChanged,
            "bootstrap admin",
            Some(&ActivityMetadata::RoleChanged {
                profile_id: identity.to_string(),
                role: Role::Admin.as_str().to_string(),
            }),
        )?;
        info!(identity, "bootstrapped admin");
        Ok(true)
    }

    /// Fetch a profile: self or admin, `None` otherwise.
    pub fn get_profile(&self, caller: &Caller, id: &str) -> Result<Option<Profile>> {
        if !predicates::is_admin(caller) && !predicates::owns(caller, id) {
            return Ok(None);
        }
        let result = self.conn.query_row(
            r#"
            SELECT id, display_name, email, role, status, created_at, updated_at
            FROM profiles
            WHERE id = ?
            "#,
            [id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get::<_, String>(3)?.parse().unwrap_or(Role::Viewer),
                    status: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            },
        );
        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update non-role fields: self or admin. Returns whether a row changed.
    pub fn update_profile(
        &self,
        caller: &Caller,
        id: &str,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<bool> {
        if !predicates::is_admin(caller) && !predicates::owns(caller, id) {
            return Ok(false);
        }
        let updated = self.conn.execute(
            r#"
            UPDATE profiles
            SET display_name = ?, email = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![display_name, email, id],
        )?;
        Ok(updated > 0)
    }

    /// Change a profile's role. Admin only.
    pub fn set_role(&self, caller: &Caller, id: &str, role: Role) -> Result<bool> {
        if !predicates::is_admin(caller) {
            return Ok(false);
        }
        let updated = self.conn.execute(
            "UPDATE profiles SET role = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![role.as_str(), id],
        )?;
        if updated > 0 {
            self.log_activity(
                caller.identity.as_deref(),
                ActivityKind::RoleChanged,
                &format!("role of {} set to {}", id, role.as_str()),
                Some(&ActivityMetadata::RoleChanged {
                    profile_id: id.to_string(),
                    role: role.as_str().to_string(),
                }),
            )?;
        }
        Ok(updated > 0)
    }

    /// Delete a profile. Admin only.
    pub fn delete_profile(&self, caller: &Caller, id: &str) -> Result<bool> {
        if !predicates::is_admin(caller) {
            return Ok(false);
        }
        let deleted = self.conn.execute("DELETE FROM profiles WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    /// List every profile. Admin only; everyone else gets an empty list.
    pub fn list_profiles(&self, caller: &Caller) -> Result<Vec<Profile>> {
        if !predicates::is_admin(caller) {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, display_name, email, role, status, created_at, updated_at
            FROM profiles
            ORDER BY created_at
            "#,
        )?;
        let profiles = stmt
            .query_map([], |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get::<_, String>(3)?.parse().unwrap_or(Role::Viewer),
                    status: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(profiles)
    }
}
