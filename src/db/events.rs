//! Event storage with visibility-filtered reads.

use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::activity::{ActivityKind, ActivityMetadata};
use super::Database;
use crate::auth::{predicates, Caller};

/// Who may see an event and its photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Hybrid,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "hybrid" => Some(Visibility::Hybrid),
            _ => None,
        }
    }
}

/// A stored event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub visibility: Visibility,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        starts_at: row.get(3)?,
        ends_at: row.get(4)?,
        visibility: Visibility::from_str(&row.get::<_, String>(5)?).unwrap_or(Visibility::Private),
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const EVENT_COLUMNS: &str =
    "id, name, description, starts_at, ends_at, visibility, created_by, created_at, updated_at";

impl Database {
    /// Create an event. Admin-or-editor only; returns the new id, or `None`
    /// when the caller may not create events.
    pub fn create_event(
        &self,
        caller: &Caller,
        name: &str,
        description: Option<&str>,
        starts_at: Option<&str>,
        ends_at: Option<&str>,
        visibility: Visibility,
    ) -> Result<Option<i64>> {
        if !predicates::is_admin_or_editor(caller) {
            return Ok(None);
        }
        let Some(identity) = caller.identity.as_deref() else {
            return Ok(None);
        };
        self.conn.execute(
            r#"
            INSERT INTO events (name, description, starts_at, ends_at, visibility, created_by)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![name, description, starts_at, ends_at, visibility.as_str(), identity],
        )?;
        let id = self.conn.last_insert_rowid();
        self.log_activity(
            Some(identity),
            ActivityKind::EventCreated,
            &format!("event '{}' created", name),
            Some(&ActivityMetadata::EventCreated {
                event_id: id,
                visibility: visibility.as_str().to_string(),
            }),
        )?;
        info!(event_id = id, name, "created event");
        Ok(Some(id))
    }

    /// List events visible to the caller: public ones for everyone,
    /// everything for any authenticated caller.
    pub fn list_events(&self, caller: &Caller) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM events ORDER BY created_at DESC",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map([], event_from_row)?
            .filter_map(|r| r.ok())
            .filter(|e| predicates::event_is_accessible(caller, e.visibility))
            .collect();
        Ok(events)
    }

    /// Fetch one event, subject to the same visibility rule as listing.
    pub fn get_event(&self, caller: &Caller, id: i64) -> Result<Option<Event>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS),
            [id],
            event_from_row,
        );
        match result {
            Ok(event) if predicates::event_is_accessible(caller, event.visibility) => {
                Ok(Some(event))
            }
            Ok(_) => Ok(None),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update an event: admin or its creator. Returns whether a row changed.
    pub fn update_event(
        &self,
        caller: &Caller,
        id: i64,
        name: &str,
        description: Option<&str>,
        visibility: Visibility,
    ) -> Result<bool> {
        let Some(event) = self.get_event(caller, id)? else {
            return Ok(false);
        };
        if !predicates::is_admin(caller) && !predicates::owns(caller, &event.created_by) {
            return Ok(false);
        }
        let updated = self.conn.execute(
            r#"
            UPDATE events
            SET name = ?, description = ?, visibility = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![name, description, visibility.as_str(), id],
        )?;
        Ok(updated > 0)
    }

    /// Delete an event and, by cascade, its photos and their face matches.
    /// Admin only.
    pub fn delete_event(&self, caller: &Caller, id: i64) -> Result<bool> {
        if !predicates::is_admin(caller) {
            return Ok(false);
        }
        let deleted = self.conn.execute("DELETE FROM events WHERE id = ?", [id])?;
        if deleted > 0 {
            info!(event_id = id, "deleted event");
        }
        Ok(deleted > 0)
    }
}
