//! Database schema definitions for the notes system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat user as seen by the transport. Display fields are
/// informational only and carry no authorization meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Best human-readable handle for export headers and logs.
    pub fn display_name(&self) -> String {
        if let Some(ref username) = self.username {
            format!("@{}", username)
        } else if let Some(ref first_name) = self.first_name {
            first_name.clone()
        } else {
            format!("user {}", self.user_id)
        }
    }
}

/// A stored note. Identity is the `(user_id, local_id)` pair; `local_id`
/// is only unique within one user's note set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub user_id: i64,
    pub local_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maximum accepted title length, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Maximum accepted content length, in characters.
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Category assigned when the user does not pick one.
pub const DEFAULT_CATEGORY: &str = "general";

pub const SCHEMA_SQL: &str = "
-- Users table
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    username TEXT,
    first_name TEXT,
    last_name TEXT,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);
-- Notes table, composite key: local ids are scoped per user
CREATE TABLE IF NOT EXISTS notes (
    user_id INTEGER NOT NULL,
    local_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT,
    category TEXT NOT NULL DEFAULT 'general',
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    PRIMARY KEY (user_id, local_id)
);
-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_notes_user_id ON notes (user_id);
CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes (created_at);
";
