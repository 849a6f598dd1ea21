//! Database methods for the services table

use chrono::{DateTime, Utc};
use rusqlite::{Result as SqliteResult, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::db::Database;
use crate::models::{AuthMethod, RequestField, Service};

fn service_from_row(row: &Row) -> rusqlite::Result<Service> {
    let auth_method_str: String = row.get(9)?;
    let request_fields_json: Option<String> = row.get(13)?;
    let created_at_str: String = row.get(14)?;

    Ok(Service {
        id: row.get(0)?,
        wallet_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price_per_request: row
            .get::<_, String>(4)?
            .parse::<Decimal>()
            .unwrap_or_default(),
        category: row.get(5)?,
        is_active: row.get::<_, i32>(6)? != 0,
        api_endpoint: row.get(7)?,
        api_method: row.get(8)?,
        auth_method: AuthMethod::from_str(&auth_method_str).unwrap_or(AuthMethod::None),
        auth_secret: row.get(10)?,
        auth_username: row.get(11)?,
        auth_header_name: row.get(12)?,
        request_fields: request_fields_json
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default(),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .unwrap()
            .with_timezone(&Utc),
    })
}

const SERVICE_COLUMNS: &str = "id, wallet_id, name, description, price_per_request, category, \
     is_active, api_endpoint, api_method, auth_method, auth_secret, auth_username, \
     auth_header_name, request_fields, created_at";

/// Input for creating a service listing.
#[derive(Debug, Clone)]
pub struct NewService {
    pub wallet_id: i64,
    pub name: String,
    pub description: String,
    pub price_per_request: Decimal,
    pub category: String,
    pub api_endpoint: Option<String>,
    pub api_method: Option<String>,
    pub auth_method: AuthMethod,
    pub auth_secret: Option<String>,
    pub auth_username: Option<String>,
    pub auth_header_name: Option<String>,
    pub request_fields: Vec<RequestField>,
}

impl Database {
    pub fn create_service(&self, new: &NewService) -> SqliteResult<Service> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let request_fields_json = if new.request_fields.is_empty() {
            None
        } else {
            serde_json::to_string(&new.request_fields).ok()
        };

        conn.execute(
            "INSERT INTO services (wallet_id, name, description, price_per_request, category,
                                   is_active, api_endpoint, api_method, auth_method, auth_secret,
                                   auth_username, auth_header_name, request_fields, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                new.wallet_id,
                new.name,
                new.description,
                new.price_per_request.to_string(),
                new.category,
                new.api_endpoint,
                new.api_method,
                new.auth_method.as_ref(),
                new.auth_secret,
                new.auth_username,
                new.auth_header_name,
                request_fields_json,
                &now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(self.get_service(id)?.expect("service just inserted"))
    }

    pub fn get_service(&self, id: i64) -> SqliteResult<Option<Service>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM services WHERE id = ?1",
            SERVICE_COLUMNS
        ))?;
        let service = stmt.query_row([id], service_from_row).ok();
        Ok(service)
    }

    pub fn list_active_services(&self) -> SqliteResult<Vec<Service>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM services WHERE is_active = 1 ORDER BY category, name",
            SERVICE_COLUMNS
        ))?;
        let services = stmt
            .query_map([], service_from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(services)
    }

    pub fn set_service_active(&self, id: i64, active: bool) -> SqliteResult<bool> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE services SET is_active = ?1 WHERE id = ?2",
            rusqlite::params![if active { 1 } else { 0 }, id],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldKind;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db").to_str().unwrap()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_manual_service_round_trip() {
        let (_dir, db) = test_db();
        let s = db
            .create_service(&NewService {
                wallet_id: 1,
                name: "tarot reading".to_string(),
                description: "one card".to_string(),
                price_per_request: "2.50".parse().unwrap(),
                category: "fun".to_string(),
                api_endpoint: None,
                api_method: None,
                auth_method: AuthMethod::None,
                auth_secret: None,
                auth_username: None,
                auth_header_name: None,
                request_fields: vec![],
            })
            .unwrap();

        let loaded = db.get_service(s.id).unwrap().unwrap();
        assert!(loaded.api_endpoint.is_none());
        assert_eq!(loaded.price_per_request, "2.50".parse().unwrap());
        assert!(loaded.request_fields.is_empty());
    }

    #[test]
    fn test_request_fields_round_trip() {
        let (_dir, db) = test_db();
        let s = db
            .create_service(&NewService {
                wallet_id: 1,
                name: "image gen".to_string(),
                description: String::new(),
                price_per_request: "1".parse().unwrap(),
                category: "ai".to_string(),
                api_endpoint: Some("https://provider.example/generate".to_string()),
                api_method: Some("POST".to_string()),
                auth_method: AuthMethod::BearerToken,
                auth_secret: Some("tok".to_string()),
                auth_username: None,
                auth_header_name: None,
                request_fields: vec![RequestField {
                    name: "prompt".to_string(),
                    kind: FieldKind::Text,
                    required: true,
                    description: None,
                    default: None,
                }],
            })
            .unwrap();

        let loaded = db.get_service(s.id).unwrap().unwrap();
        assert_eq!(loaded.request_fields.len(), 1);
        assert_eq!(loaded.request_fields[0].name, "prompt");
        assert_eq!(loaded.auth_method, AuthMethod::BearerToken);
    }

    #[test]
    fn test_inactive_excluded_from_listing() {
        let (_dir, db) = test_db();
        let s = db
            .create_service(&NewService {
                wallet_id: 1,
                name: "x".to_string(),
                description: String::new(),
                price_per_request: "1".parse().unwrap(),
                category: "general".to_string(),
                api_endpoint: None,
                api_method: None,
                auth_method: AuthMethod::None,
                auth_secret: None,
                auth_username: None,
                auth_header_name: None,
                request_fields: vec![],
            })
            .unwrap();
        assert_eq!(db.list_active_services().unwrap().len(), 1);
        db.set_service_active(s.id, false).unwrap();
        assert!(db.list_active_services().unwrap().is_empty());
    }
}
