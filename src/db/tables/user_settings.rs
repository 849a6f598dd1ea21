//! Database methods for the user_settings table (default-wallet pointer)

use rusqlite::Result as SqliteResult;

use crate::db::Database;

impl Database {
    /// Read the per-user default-wallet pointer. Absence is `None`; there is
    /// deliberately no fallback heuristic here.
    pub fn get_default_wallet_id(&self, user_id: i64) -> SqliteResult<Option<i64>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT default_wallet_id FROM user_settings WHERE user_id = ?1")?;
        let pointer: Option<Option<i64>> = stmt.query_row([user_id], |row| row.get(0)).ok();
        Ok(pointer.flatten())
    }

    pub fn set_default_wallet_id(&self, user_id: i64, wallet_id: i64) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_settings (user_id, default_wallet_id) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET default_wallet_id = excluded.default_wallet_id",
            rusqlite::params![user_id, wallet_id],
        )?;
        Ok(())
    }

    pub fn clear_default_wallet_id(&self, user_id: i64) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE user_settings SET default_wallet_id = NULL WHERE user_id = ?1",
            [user_id],
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
    fn test_pointer_round_trip() {
        let (_dir, db) = test_db();
        assert_eq!(db.get_default_wallet_id(1).unwrap(), None);
        db.set_default_wallet_id(1, 42).unwrap();
        assert_eq!(db.get_default_wallet_id(1).unwrap(), Some(42));
        db.set_default_wallet_id(1, 43).unwrap();
        assert_eq!(db.get_default_wallet_id(1).unwrap(), Some(43));
        db.clear_default_wallet_id(1).unwrap();
        assert_eq!(db.get_default_wallet_id(1).unwrap(), None);
    }

    #[test]
    fn test_clear_without_row_is_noop() {
        let (_dir, db) = test_db();
        db.clear_default_wallet_id(9).unwrap();
        assert_eq!(db.get_default_wallet_id(9).unwrap(), None);
    }
}
