pub const SCHEMA: &str = r#"
-- Profiles: one row per authenticated identity
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,                    -- identity id from the auth provider
    display_name TEXT NOT NULL,
    email TEXT,
    role TEXT NOT NULL DEFAULT 'viewer',    -- 'admin', 'editor', 'viewer'
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Events: named photo containers with a visibility flag
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    starts_at TEXT,
    ends_at TEXT,
    visibility TEXT NOT NULL DEFAULT 'public',  -- 'public', 'private', 'hybrid'
    created_by TEXT NOT NULL,  -- identity id, not FK-bound; events outlive their creator's profile
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_events_visibility ON events(visibility);
CREATE INDEX IF NOT EXISTS idx_events_created_by ON events(created_by);

-- Photos: belong to exactly one event, removed with it
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    mime_type TEXT,
    uploaded_by TEXT NOT NULL,
    face_count INTEGER NOT NULL DEFAULT 0,
    face_data TEXT,            -- biometric payload, redacted on read
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_photos_event ON photos(event_id);
CREATE INDEX IF NOT EXISTS idx_photos_uploaded_by ON photos(uploaded_by);

-- Face matches: link an identity to a photo it may appear in
CREATE TABLE IF NOT EXISTS face_matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    photo_id INTEGER NOT NULL,
    user_id TEXT NOT NULL,
    confidence REAL,
    face_scan_data TEXT,       -- raw scan payload, admin only
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (photo_id) REFERENCES photos(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_face_matches_photo ON face_matches(photo_id);
CREATE INDEX IF NOT EXISTS idx_face_matches_user ON face_matches(user_id);

-- Activity log: append-only audit trail, rows are never updated or deleted
CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor TEXT,                -- NULL for anonymous/system entries
    kind TEXT NOT NULL,
    description TEXT NOT NULL,
    metadata TEXT,             -- JSON, tagged by kind
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_activity_kind ON activity_logs(kind);
CREATE INDEX IF NOT EXISTS idx_activity_actor_created ON activity_logs(actor, created_at);
"#;

/// Statements for databases created before the current SCHEMA. Applied
/// with failures ignored, so re-running against an up-to-date database is
/// harmless.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE profiles ADD COLUMN status TEXT NOT NULL DEFAULT 'active'",
    "ALTER TABLE photos ADD COLUMN face_count INTEGER NOT NULL DEFAULT 0",
    "CREATE INDEX IF NOT EXISTS idx_activity_actor_created ON activity_logs(actor, created_at)",
];
