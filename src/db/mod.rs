//! SQLite-backed storage with row and column level access control.
//!
//! Every read or write takes an already-resolved [`crate::auth::Caller`]
//! and applies the policy predicates before touching rows. Denied reads
//! come back as `None` or an empty list, denied writes as `Ok(false)` or
//! `Ok(None)`; neither is an error, so permission failures never leak
//! through the error channel.

mod schema;

pub mod activity;
pub mod events;
pub mod matches;
pub mod photos;
pub mod profiles;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

pub use activity::{ActivityKind, ActivityLog, ActivityMetadata};
pub use events::{Event, Visibility};
pub use matches::FaceMatch;
pub use photos::Photo;
pub use profiles::Profile;
pub use schema::{MIGRATIONS, SCHEMA};

use crate::config::AccessConfig;

pub struct Database {
    pub(crate) conn: Connection,
    pub(crate) access: AccessConfig,
}

impl Database {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, access: AccessConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // Cascade deletes (event -> photos -> face matches) rely on this.
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn, access })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            // Failures are expected when the column already exists.
            let _ = self.conn.execute(migration, []);
        }
        Ok(())
    }
}
