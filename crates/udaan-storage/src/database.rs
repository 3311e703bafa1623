//! Database connection and key/value operations

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::migrations::run_migrations;
use crate::Result;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode so readers never block the writer
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.set_values(&[(key, value)])
    }

    /// Write several keys atomically.
    pub fn set_values(&self, entries: &[(&str, &str)]) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.transaction(|conn| {
            for (key, value) in entries {
                conn.execute(
                    "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![key, value, updated_at],
                )?;
            }
            Ok(())
        })
    }

    /// Remove several keys atomically. Missing keys are ignored.
    pub fn remove_values(&self, keys: &[&str]) -> Result<()> {
        self.transaction(|conn| {
            for key in keys {
                conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
            }
            Ok(())
        })
    }

    /// Remove every stored key.
    pub fn clear(&self) -> Result<()> {
        let removed = self.with_connection(|conn| Ok(conn.execute("DELETE FROM kv_store", [])?))?;
        tracing::debug!(removed, "Cleared key/value store");
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_connection(|conn| {
            let count: i32 =
                conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_set_and_overwrite_value() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_value("tenant").unwrap(), None);

        db.set_value("tenant", "4").unwrap();
        db.set_value("tenant", "7").unwrap();
        assert_eq!(db.get_value("tenant").unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn test_remove_values_together() {
        let db = Database::open_in_memory().unwrap();
        db.set_values(&[("a", "1"), ("b", "2"), ("c", "3")]).unwrap();

        db.remove_values(&["a", "b", "missing"]).unwrap();

        assert_eq!(db.get_value("a").unwrap(), None);
        assert_eq!(db.get_value("b").unwrap(), None);
        assert_eq!(db.get_value("c").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_clear() {
        let db = Database::open_in_memory().unwrap();
        db.set_values(&[("a", "1"), ("b", "2")]).unwrap();

        db.clear().unwrap();

        assert_eq!(db.get_value("a").unwrap(), None);
        assert_eq!(db.get_value("b").unwrap(), None);
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();

        db.set_value("shared", "yes").unwrap();
        assert_eq!(other.get_value("shared").unwrap().as_deref(), Some("yes"));
    }
}
