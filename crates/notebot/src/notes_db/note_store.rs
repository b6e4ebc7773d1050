//! CRUD and query operations over the notes table, with per-user
//! local id allocation.
//!
//! Storage failures never escape this module: every public operation
//! logs the error with context and degrades to a benign sentinel value
//! (empty list, `None`, `false`). Callers treat a sentinel as "the
//! operation did not happen" and report a generic failure to the user.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row, TransactionBehavior};
use tracing::{debug, error, info, warn};

use crate::notes_db::schema::{Note, User, DEFAULT_CATEGORY};

/// Partial update for [`NoteStore::update_note`]. Fields left as `None`
/// retain their stored values.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct NoteStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl NoteStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Insert-or-update user metadata. Idempotent; `created_at` is
    /// preserved across repeat calls.
    pub fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> bool {
        match self.try_upsert_user(user_id, username, first_name, last_name) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to upsert user {}: {}", user_id, e);
                false
            }
        }
    }

    fn try_upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (user_id, username, first_name, last_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                 username = excluded.username,
                 first_name = excluded.first_name,
                 last_name = excluded.last_name,
                 updated_at = excluded.updated_at",
            params![user_id, username, first_name, last_name, now],
        )?;
        Ok(())
    }

    pub fn get_user(&self, user_id: i64) -> Option<User> {
        let result = (|| -> anyhow::Result<Option<User>> {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT user_id, username, first_name, last_name, created_at, updated_at
                 FROM users WHERE user_id = ?1",
            )?;
            let mut rows = stmt.query([user_id])?;
            if let Some(row) = rows.next()? {
                Ok(Some(Self::row_to_user(row)?))
            } else {
                Ok(None)
            }
        })();
        result.unwrap_or_else(|e| {
            error!("Failed to fetch user {}: {}", user_id, e);
            None
        })
    }

    /// Next free local id for `user_id`: 1 for a fresh user, otherwise
    /// `max(local_id) + 1`. Advisory only; the authoritative allocation
    /// happens inside the `add_note` transaction.
    pub fn next_local_id(&self, user_id: i64) -> i64 {
        let result = (|| -> anyhow::Result<i64> {
            let conn = self.get_conn()?;
            let max_id: i64 = conn.query_row(
                "SELECT COALESCE(MAX(local_id), 0) FROM notes WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(max_id + 1)
        })();
        result.unwrap_or_else(|e| {
            error!("Failed to compute next local id for user {}: {}", user_id, e);
            1
        })
    }

    /// Insert a new note and return its allocated local id, or `None`
    /// when storage failed and nothing was written.
    ///
    /// Allocation and insert run in one IMMEDIATE transaction so two
    /// near-simultaneous adds for the same user cannot be handed the
    /// same id.
    pub fn add_note(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
        tags: Option<&[String]>,
        category: Option<&str>,
    ) -> Option<i64> {
        match self.try_add_note(user_id, title, content, tags, category) {
            Ok(local_id) => {
                info!("Note added: user={}, local_id={}", user_id, local_id);
                Some(local_id)
            }
            Err(e) => {
                error!("Failed to add note for user {}: {}", user_id, e);
                None
            }
        }
    }

    fn try_add_note(
        &self,
        user_id: i64,
        title: &str,
        content: &str,
        tags: Option<&[String]>,
        category: Option<&str>,
    ) -> anyhow::Result<i64> {
        // Make sure the owning user row exists before the note insert.
        self.try_upsert_user(user_id, None, None, None)?;

        let tags_json = tags.map(serde_json::to_string).transpose()?;
        let category = category.unwrap_or(DEFAULT_CATEGORY);
        let now = Utc::now().to_rfc3339();

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let local_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(local_id), 0) + 1 FROM notes WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO notes
             (user_id, local_id, title, content, tags, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![user_id, local_id, title, content, tags_json, category, now],
        )?;
        tx.commit()?;
        Ok(local_id)
    }

    /// Notes for `user_id`, newest local id first, optionally filtered
    /// by category.
    pub fn get_notes(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
        category: Option<&str>,
    ) -> Vec<Note> {
        let result = (|| -> anyhow::Result<Vec<Note>> {
            let conn = self.get_conn()?;
            let mut query = String::from(
                "SELECT user_id, local_id, title, content, tags, category, created_at, updated_at
                 FROM notes WHERE user_id = ?1",
            );
            let mut query_params: Vec<&dyn rusqlite::ToSql> = vec![&user_id];
            if let Some(ref cat) = category {
                query.push_str(" AND category = ?");
                query_params.push(cat);
            }
            query.push_str(" ORDER BY local_id DESC LIMIT ? OFFSET ?");
            query_params.push(&limit);
            query_params.push(&offset);

            let mut stmt = conn.prepare(&query)?;
            let mut rows = stmt.query(rusqlite::params_from_iter(query_params))?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next()? {
                notes.push(Self::row_to_note(row)?);
            }
            Ok(notes)
        })();
        result.unwrap_or_else(|e| {
            error!("Failed to fetch notes for user {}: {}", user_id, e);
            Vec::new()
        })
    }

    /// A single note, or `None` when the id was never allocated or
    /// belongs to another user. The two cases are indistinguishable on
    /// purpose: ownership is enforced by the query predicate.
    pub fn get_note(&self, user_id: i64, local_id: i64) -> Option<Note> {
        let result = (|| -> anyhow::Result<Option<Note>> {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT user_id, local_id, title, content, tags, category, created_at, updated_at
                 FROM notes WHERE user_id = ?1 AND local_id = ?2",
            )?;
            let mut rows = stmt.query(params![user_id, local_id])?;
            if let Some(row) = rows.next()? {
                Ok(Some(Self::row_to_note(row)?))
            } else {
                Ok(None)
            }
        })();
        result.unwrap_or_else(|e| {
            error!("Failed to fetch note {} for user {}: {}", local_id, user_id, e);
            None
        })
    }

    /// Case-sensitive substring search over titles (and contents when
    /// `search_content` is set), newest local id first. No ranking.
    pub fn search_notes(&self, user_id: i64, text: &str, search_content: bool) -> Vec<Note> {
        let result = (|| -> anyhow::Result<Vec<Note>> {
            let conn = self.get_conn()?;
            // instr() keeps the match case-sensitive; LIKE would fold ASCII case.
            let query = if search_content {
                "SELECT user_id, local_id, title, content, tags, category, created_at, updated_at
                 FROM notes
                 WHERE user_id = ?1 AND (instr(title, ?2) > 0 OR instr(content, ?2) > 0)
                 ORDER BY local_id DESC"
            } else {
                "SELECT user_id, local_id, title, content, tags, category, created_at, updated_at
                 FROM notes
                 WHERE user_id = ?1 AND instr(title, ?2) > 0
                 ORDER BY local_id DESC"
            };
            let mut stmt = conn.prepare(query)?;
            let mut rows = stmt.query(params![user_id, text])?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next()? {
                notes.push(Self::row_to_note(row)?);
            }
            Ok(notes)
        })();
        match result {
            Ok(notes) => {
                debug!(
                    "Search for user {} matched {} notes (query len {})",
                    user_id,
                    notes.len(),
                    text.len()
                );
                notes
            }
            Err(e) => {
                error!("Failed to search notes for user {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    /// Partial update. Returns whether a row was actually updated;
    /// `false` covers both "not found" and storage failure.
    pub fn update_note(&self, user_id: i64, local_id: i64, update: NoteUpdate) -> bool {
        match self.try_update_note(user_id, local_id, update) {
            Ok(updated) => {
                if updated {
                    info!("Note {} of user {} updated", local_id, user_id);
                }
                updated
            }
            Err(e) => {
                error!("Failed to update note {} for user {}: {}", local_id, user_id, e);
                false
            }
        }
    }

    fn try_update_note(
        &self,
        user_id: i64,
        local_id: i64,
        update: NoteUpdate,
    ) -> anyhow::Result<bool> {
        let mut conn = self.get_conn()?;
        // Read-merge-write under one IMMEDIATE transaction; unspecified
        // fields keep their stored values.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = {
            let mut stmt = tx.prepare(
                "SELECT user_id, local_id, title, content, tags, category, created_at, updated_at
                 FROM notes WHERE user_id = ?1 AND local_id = ?2",
            )?;
            let mut rows = stmt.query(params![user_id, local_id])?;
            match rows.next()? {
                Some(row) => Self::row_to_note(row)?,
                None => return Ok(false),
            }
        };

        let new_title = update.title.unwrap_or(current.title);
        let new_content = update.content.unwrap_or(current.content);
        let new_tags = update.tags.or(current.tags);
        let new_category = update.category.unwrap_or(current.category);
        let tags_json = new_tags.as_deref().map(serde_json::to_string).transpose()?;
        let now = Utc::now().to_rfc3339();

        let changed = tx.execute(
            "UPDATE notes
             SET title = ?1, content = ?2, tags = ?3, category = ?4, updated_at = ?5
             WHERE user_id = ?6 AND local_id = ?7",
            params![new_title, new_content, tags_json, new_category, now, user_id, local_id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    /// Remove a note. Deleted ids are never reissued: allocation is
    /// max-based, so the numbering keeps increasing past the gap.
    pub fn delete_note(&self, user_id: i64, local_id: i64) -> bool {
        let result = (|| -> anyhow::Result<bool> {
            let conn = self.get_conn()?;
            let deleted = conn.execute(
                "DELETE FROM notes WHERE user_id = ?1 AND local_id = ?2",
                params![user_id, local_id],
            )?;
            Ok(deleted > 0)
        })();
        match result {
            Ok(true) => {
                info!("Note {} of user {} deleted", local_id, user_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Failed to delete note {} for user {}: {}", local_id, user_id, e);
                false
            }
        }
    }

    pub fn count_notes(&self, user_id: i64, category: Option<&str>) -> i64 {
        let result = (|| -> anyhow::Result<i64> {
            let conn = self.get_conn()?;
            let count = match category {
                Some(cat) => conn.query_row(
                    "SELECT COUNT(*) FROM notes WHERE user_id = ?1 AND category = ?2",
                    params![user_id, cat],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM notes WHERE user_id = ?1",
                    [user_id],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        })();
        result.unwrap_or_else(|e| {
            error!("Failed to count notes for user {}: {}", user_id, e);
            0
        })
    }

    /// Every note the user owns, ascending local id, for export.
    pub fn export_all(&self, user_id: i64) -> Vec<Note> {
        let result = (|| -> anyhow::Result<Vec<Note>> {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT user_id, local_id, title, content, tags, category, created_at, updated_at
                 FROM notes WHERE user_id = ?1 ORDER BY local_id",
            )?;
            let mut rows = stmt.query([user_id])?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next()? {
                notes.push(Self::row_to_note(row)?);
            }
            Ok(notes)
        })();
        result.unwrap_or_else(|e| {
            error!("Failed to export notes for user {}: {}", user_id, e);
            Vec::new()
        })
    }

    fn parse_datetime_safe(datetime_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        None
    }

    fn row_to_user(row: &Row) -> anyhow::Result<User> {
        let created_at = Self::parse_datetime_safe(&row.get::<_, String>(4)?)
            .unwrap_or_else(|| {
                warn!("Failed to parse user created_at");
                Utc::now()
            });
        let updated_at = Self::parse_datetime_safe(&row.get::<_, String>(5)?)
            .unwrap_or_else(|| {
                warn!("Failed to parse user updated_at");
                Utc::now()
            });
        Ok(User {
            user_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            created_at,
            updated_at,
        })
    }

    fn row_to_note(row: &Row) -> anyhow::Result<Note> {
        let tags = match row.get::<_, Option<String>>(4)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(tags) => Some(tags),
                Err(e) => {
                    warn!("Dropping unreadable tags blob: {}", e);
                    None
                }
            },
            None => None,
        };
        let created_at = Self::parse_datetime_safe(&row.get::<_, String>(6)?)
            .unwrap_or_else(|| {
                warn!("Failed to parse note created_at");
                Utc::now()
            });
        let updated_at = Self::parse_datetime_safe(&row.get::<_, String>(7)?)
            .unwrap_or_else(|| {
                warn!("Failed to parse note updated_at");
                Utc::now()
            });
        Ok(Note {
            user_id: row.get(0)?,
            local_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            tags,
            category: row.get(5)?,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes_db::NotesDatabase;

    fn test_store() -> (NotesDatabase, NoteStore) {
        let db = NotesDatabase::open_in_memory().expect("in-memory db");
        let store = db.note_store();
        (db, store)
    }

    // ===== Local id allocation =====

    #[test]
    fn test_sequential_adds_yield_contiguous_ids() {
        let (_db, store) = test_store();
        for expected in 1..=5 {
            let id = store.add_note(7, "title", "content", None, None);
            assert_eq!(id, Some(expected));
        }
        assert_eq!(store.count_notes(7, None), 5);
    }

    #[test]
    fn test_id_allocation_is_per_user() {
        let (_db, store) = test_store();
        assert_eq!(store.add_note(1, "a", "x", None, None), Some(1));
        assert_eq!(store.add_note(2, "b", "y", None, None), Some(1));
        assert_eq!(store.add_note(1, "c", "z", None, None), Some(2));
        assert_eq!(store.next_local_id(2), 2);
    }

    #[test]
    fn test_deleted_ids_are_never_reissued() {
        let (_db, store) = test_store();
        store.add_note(1, "first", "x", None, None);
        store.add_note(1, "second", "y", None, None);
        assert!(store.delete_note(1, 2));
        assert!(store.get_note(1, 2).is_none());
        assert_eq!(store.add_note(1, "third", "z", None, None), Some(3));
    }

    #[test]
    fn test_concurrent_adds_never_duplicate_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = NotesDatabase::open(&dir.path().join("notes.db")).expect("db");
        let store = db.note_store();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..10 {
                    ids.push(store.add_note(42, "t", "c", None, None).expect("add"));
                }
                ids
            }));
        }
        let mut all_ids: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread"))
            .collect();
        all_ids.sort_unstable();
        let expected: Vec<i64> = (1..=40).collect();
        assert_eq!(all_ids, expected);
    }

    // ===== Round-trips and field semantics =====

    #[test]
    fn test_add_get_round_trip() {
        let (_db, store) = test_store();
        let tags = vec!["shopping".to_string(), "urgent".to_string()];
        let id = store
            .add_note(3, "T", "C", Some(&tags), Some("personal"))
            .expect("add");
        let note = store.get_note(3, id).expect("note");
        assert_eq!(note.title, "T");
        assert_eq!(note.content, "C");
        assert_eq!(note.category, "personal");
        assert_eq!(note.tags.as_deref(), Some(&tags[..]));
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn test_default_category_applied() {
        let (_db, store) = test_store();
        let id = store.add_note(3, "T", "C", None, None).expect("add");
        let note = store.get_note(3, id).expect("note");
        assert_eq!(note.category, DEFAULT_CATEGORY);
        assert!(note.tags.is_none());
    }

    #[test]
    fn test_partial_update_touches_only_named_fields() {
        let (_db, store) = test_store();
        let id = store
            .add_note(3, "T", "C", None, Some("work"))
            .expect("add");
        let before = store.get_note(3, id).expect("note");
        std::thread::sleep(std::time::Duration::from_millis(5));

        let changed = store.update_note(
            3,
            id,
            NoteUpdate {
                content: Some("C2".to_string()),
                ..NoteUpdate::default()
            },
        );
        assert!(changed);

        let after = store.get_note(3, id).expect("note");
        assert_eq!(after.title, "T");
        assert_eq!(after.content, "C2");
        assert_eq!(after.category, "work");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn test_update_missing_note_returns_false() {
        let (_db, store) = test_store();
        let changed = store.update_note(
            3,
            99,
            NoteUpdate {
                title: Some("nope".to_string()),
                ..NoteUpdate::default()
            },
        );
        assert!(!changed);
    }

    // ===== Ownership boundary =====

    #[test]
    fn test_foreign_and_missing_ids_are_indistinguishable() {
        let (_db, store) = test_store();
        let id = store.add_note(1, "mine", "secret", None, None).expect("add");
        // Same response shape for "someone else's note" and "never existed".
        assert_eq!(store.get_note(2, id), None);
        assert_eq!(store.get_note(2, 9999), None);
        assert!(!store.delete_note(2, id));
        assert!(store.get_note(1, id).is_some());
    }

    // ===== Listing, search, export =====

    #[test]
    fn test_get_notes_newest_first_with_pagination() {
        let (_db, store) = test_store();
        for i in 1..=6 {
            store.add_note(5, &format!("note {}", i), "c", None, None);
        }
        let page = store.get_notes(5, 3, 0, None);
        let ids: Vec<i64> = page.iter().map(|n| n.local_id).collect();
        assert_eq!(ids, vec![6, 5, 4]);
        let next = store.get_notes(5, 3, 3, None);
        let ids: Vec<i64> = next.iter().map(|n| n.local_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_get_notes_category_filter() {
        let (_db, store) = test_store();
        store.add_note(5, "a", "c", None, Some("work"));
        store.add_note(5, "b", "c", None, None);
        store.add_note(5, "c", "c", None, Some("work"));
        let work = store.get_notes(5, 50, 0, Some("work"));
        assert_eq!(work.len(), 2);
        assert!(work.iter().all(|n| n.category == "work"));
        assert_eq!(store.count_notes(5, Some("work")), 2);
        assert_eq!(store.count_notes(5, None), 3);
    }

    #[test]
    fn test_search_is_case_sensitive_and_newest_first() {
        let (_db, store) = test_store();
        store.add_note(9, "Buy milk", "2 liters", None, None);
        store.add_note(9, "Call mom", "about milk delivery", None, None);
        store.add_note(9, "MILK", "uppercase only", None, None);

        let hits = store.search_notes(9, "milk", true);
        let ids: Vec<i64> = hits.iter().map(|n| n.local_id).collect();
        assert_eq!(ids, vec![2, 1]);

        let title_only = store.search_notes(9, "milk", false);
        assert_eq!(title_only.len(), 1);
        assert_eq!(title_only[0].local_id, 1);

        assert!(store.search_notes(9, "nothing here", true).is_empty());
    }

    #[test]
    fn test_export_all_ascending_order() {
        let (_db, store) = test_store();
        for i in 1..=3 {
            store.add_note(4, &format!("n{}", i), "c", None, None);
        }
        store.delete_note(4, 2);
        let all = store.export_all(4);
        let ids: Vec<i64> = all.iter().map(|n| n.local_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    // ===== Users =====

    #[test]
    fn test_upsert_user_is_idempotent_and_preserves_created_at() {
        let (_db, store) = test_store();
        assert!(store.upsert_user(11, Some("ann"), Some("Ann"), None));
        let first = store.get_user(11).expect("user");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.upsert_user(11, Some("ann_b"), Some("Ann"), Some("B")));
        let second = store.get_user(11).expect("user");
        assert_eq!(second.username.as_deref(), Some("ann_b"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    // ===== Property: ids only ever move forward =====

    proptest::proptest! {
        #[test]
        fn prop_local_ids_strictly_increase(ops in proptest::collection::vec(0u8..3u8, 1..24)) {
            let (_db, store) = test_store();
            let mut issued: Vec<i64> = Vec::new();
            for op in ops {
                if op < 2 {
                    let id = store.add_note(1, "t", "c", None, None).expect("add");
                    if let Some(&last) = issued.last() {
                        proptest::prop_assert!(id > last, "id {} not above {}", id, last);
                    }
                    issued.push(id);
                } else if let Some(&oldest) = issued.first() {
                    // Deleting the oldest live note must not free its id.
                    store.delete_note(1, oldest);
                }
            }
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        let user = User {
            user_id: 5,
            username: None,
            first_name: Some("Pat".to_string()),
            last_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "Pat");
    }
}
