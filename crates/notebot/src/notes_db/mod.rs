//! Notes database module - SQLite-based storage for users and their notes

pub mod note_store;
pub mod schema;

pub use note_store::{NoteStore, NoteUpdate};
pub use schema::{Note, User, DEFAULT_CATEGORY, MAX_CONTENT_CHARS, MAX_TITLE_CHARS};

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

/// Owner of the connection pool. Hands out [`NoteStore`] handles that
/// share the pool; all persistence goes through those handles.
pub struct NotesDatabase {
    notes: NoteStore,
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl NotesDatabase {
    /// Open (or create) the database file at `db_path` and run the schema.
    pub fn open(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening notes database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
            });
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let conn = pool.get()?;
            conn.execute_batch(schema::SCHEMA_SQL)?;
        }
        let pool = Arc::new(pool);
        info!("Notes database initialized successfully");
        Ok(Self {
            notes: NoteStore::new(Arc::clone(&pool)),
            pool,
        })
    }

    /// Open a private in-memory database. Shared-cache URI so every
    /// pooled connection sees the same data; used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        static NEXT_DB: AtomicUsize = AtomicUsize::new(0);
        let name = format!(
            "file:notebot_mem_{}_{}?mode=memory&cache=shared",
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::Relaxed),
        );
        let manager = SqliteConnectionManager::file(name)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(5).build(manager)?;
        {
            let conn = pool.get()?;
            conn.execute_batch(schema::SCHEMA_SQL)?;
        }
        let pool = Arc::new(pool);
        Ok(Self {
            notes: NoteStore::new(Arc::clone(&pool)),
            pool,
        })
    }

    /// A cloneable handle over the shared pool.
    pub fn note_store(&self) -> NoteStore {
        self.notes.clone()
    }
}

impl Drop for NotesDatabase {
    fn drop(&mut self) {
        if let Ok(conn) = self.pool.get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}
