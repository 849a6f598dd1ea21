//! Database methods for the api_keys table

use chrono::{DateTime, Utc};
use rusqlite::{Result as SqliteResult, Row};

use crate::auth::{parse_permissions, permissions_to_csv, Permission};
use crate::db::Database;
use crate::models::ApiKey;

fn api_key_from_row(row: &Row) -> rusqlite::Result<ApiKey> {
    let permissions_csv: String = row.get(4)?;
    let last_used_str: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    Ok(ApiKey {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        key_hash: row.get(3)?,
        permissions: parse_permissions(&permissions_csv),
        is_active: row.get::<_, i32>(5)? != 0,
        last_used_at: last_used_str
            .map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .unwrap()
            .with_timezone(&Utc),
    })
}

const KEY_COLUMNS: &str =
    "id, user_id, name, key_hash, permissions, is_active, last_used_at, created_at";

impl Database {
    pub fn create_api_key(
        &self,
        user_id: i64,
        name: &str,
        key_hash: &str,
        permissions: &[Permission],
    ) -> SqliteResult<ApiKey> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO api_keys (user_id, name, key_hash, permissions, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            rusqlite::params![user_id, name, key_hash, permissions_to_csv(permissions), &now],
        )?;
        let id = conn.last_insert_rowid();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_keys WHERE id = ?1",
            KEY_COLUMNS
        ))?;
        stmt.query_row([id], api_key_from_row)
    }

    pub fn find_active_api_key(&self, key_hash: &str) -> SqliteResult<Option<ApiKey>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_keys WHERE key_hash = ?1 AND is_active = 1",
            KEY_COLUMNS
        ))?;
        let key = stmt.query_row([key_hash], api_key_from_row).ok();
        Ok(key)
    }

    pub fn list_api_keys(&self) -> SqliteResult<Vec<ApiKey>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_keys ORDER BY id",
            KEY_COLUMNS
        ))?;
        let keys = stmt
            .query_map([], api_key_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(keys)
    }

    pub fn deactivate_api_key(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute("UPDATE api_keys SET is_active = 0 WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    pub fn touch_api_key(&self, id: i64) -> SqliteResult<()> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
            rusqlite::params![&now, id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db").to_str().unwrap()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_create_find_deactivate() {
        let (_dir, db) = test_db();
        let key = db
            .create_api_key(2, "bot", "hash123", &[Permission::Read, Permission::Transact])
            .unwrap();
        assert!(key.is_active);
        assert!(key.last_used_at.is_none());

        let found = db.find_active_api_key("hash123").unwrap().unwrap();
        assert_eq!(found.user_id, 2);

        db.touch_api_key(found.id).unwrap();
        let touched = db.find_active_api_key("hash123").unwrap().unwrap();
        assert!(touched.last_used_at.is_some());

        assert!(db.deactivate_api_key(key.id).unwrap());
        assert!(db.find_active_api_key("hash123").unwrap().is_none());
    }
}
