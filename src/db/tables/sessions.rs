//! Database methods for the sessions table

use chrono::{DateTime, Duration, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use crate::auth::{parse_permissions, permissions_to_csv, Permission};
use crate::db::Database;
use crate::models::Session;

impl Database {
    pub fn create_session(&self, user_id: i64, permissions: &[Permission]) -> SqliteResult<Session> {
        let conn = self.conn();
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + Duration::hours(24);

        conn.execute(
            "INSERT INTO sessions (token, user_id, permissions, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                &token,
                user_id,
                permissions_to_csv(permissions),
                created_at.to_rfc3339(),
                expires_at.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();

        Ok(Session {
            id,
            token,
            user_id,
            permissions: permissions.to_vec(),
            created_at,
            expires_at,
        })
    }

    pub fn validate_session(&self, token: &str) -> SqliteResult<Option<Session>> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT id, token, user_id, permissions, created_at, expires_at
             FROM sessions WHERE token = ?1 AND expires_at > ?2",
        )?;

        let session = stmt
            .query_row([token, &now], |row| {
                let permissions_csv: String = row.get(3)?;
                let created_at_str: String = row.get(4)?;
                let expires_at_str: String = row.get(5)?;

                Ok(Session {
                    id: row.get(0)?,
                    token: row.get(1)?,
                    user_id: row.get(2)?,
                    permissions: parse_permissions(&permissions_csv),
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .unwrap()
                        .with_timezone(&Utc),
                    expires_at: DateTime::parse_from_rfc3339(&expires_at_str)
                        .unwrap()
                        .with_timezone(&Utc),
                })
            })
            .ok();

        Ok(session)
    }

    pub fn delete_session(&self, token: &str) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        Ok(affected > 0)
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
    fn test_session_round_trip() {
        let (_dir, db) = test_db();
        let s = db
            .create_session(1, &[Permission::Read, Permission::Transact])
            .unwrap();
        let loaded = db.validate_session(&s.token).unwrap().unwrap();
        assert_eq!(loaded.user_id, 1);
        assert_eq!(loaded.permissions, vec![Permission::Read, Permission::Transact]);

        assert!(db.delete_session(&s.token).unwrap());
        assert!(db.validate_session(&s.token).unwrap().is_none());
    }

    #[test]
    fn test_unknown_token_rejected() {
        let (_dir, db) = test_db();
        assert!(db.validate_session("nope").unwrap().is_none());
    }
}
