use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, EnumString};

/// How the outbound service call authenticates against the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
pub enum AuthMethod {
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
    #[strum(serialize = "api-key")]
    #[serde(rename = "api-key")]
    ApiKey,
    #[strum(serialize = "bearer-token")]
    #[serde(rename = "bearer-token")]
    BearerToken,
    #[strum(serialize = "basic-auth")]
    #[serde(rename = "basic-auth")]
    BasicAuth,
}

/// Declared kind of a request field. Payload values arrive as strings and
/// are checked against this before any payment is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
pub enum FieldKind {
    #[strum(serialize = "text")]
    #[serde(rename = "text")]
    Text,
    #[strum(serialize = "number")]
    #[serde(rename = "number")]
    Number,
    #[strum(serialize = "email")]
    #[serde(rename = "email")]
    Email,
    #[strum(serialize = "url")]
    #[serde(rename = "url")]
    Url,
}

/// Descriptor for one field a service expects in its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestField {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

impl RequestField {
    /// Check a single payload value against this descriptor.
    pub fn check_value(&self, value: &str) -> Result<(), String> {
        match self.kind {
            FieldKind::Text => Ok(()),
            FieldKind::Number => value
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|_| ())
                .ok_or_else(|| format!("field '{}' must be a number", self.name)),
            FieldKind::Email => {
                // Deliberately loose: one '@' with something on both sides.
                let mut parts = value.splitn(2, '@');
                match (parts.next(), parts.next()) {
                    (Some(local), Some(domain)) if !local.is_empty() && domain.contains('.') => {
                        Ok(())
                    }
                    _ => Err(format!("field '{}' must be an email address", self.name)),
                }
            }
            FieldKind::Url => {
                if value.starts_with("http://") || value.starts_with("https://") {
                    Ok(())
                } else {
                    Err(format!("field '{}' must be an http(s) URL", self.name))
                }
            }
        }
    }
}

/// Validate a payload against a service's field descriptors.
///
/// Fills in declared defaults for absent fields, rejects missing required
/// fields and kind mismatches. Undeclared extra keys pass through untouched
/// (the provider may accept more than it advertises).
pub fn validate_payload(
    fields: &[RequestField],
    payload: &HashMap<String, String>,
) -> Result<HashMap<String, String>, String> {
    let mut resolved = payload.clone();

    for field in fields {
        match resolved.get(&field.name) {
            Some(value) => field.check_value(value)?,
            None => {
                if let Some(default) = &field.default {
                    resolved.insert(field.name.clone(), default.clone());
                } else if field.required {
                    return Err(format!("required field '{}' is missing", field.name));
                }
            }
        }
    }

    Ok(resolved)
}

/// A priced capability another wallet can pay to invoke.
///
/// A service with no `api_endpoint` is "manual": execution records the
/// payment and returns an informational message without calling out.
#[derive(Debug, Clone)]
pub struct Service {
    pub id: i64,
    pub wallet_id: i64,
    pub name: String,
    pub description: String,
    pub price_per_request: Decimal,
    pub category: String,
    pub is_active: bool,
    pub api_endpoint: Option<String>,
    pub api_method: Option<String>,
    pub auth_method: AuthMethod,
    /// api-key value, bearer token, or basic-auth password depending on `auth_method`.
    pub auth_secret: Option<String>,
    /// basic-auth username.
    pub auth_username: Option<String>,
    /// Custom header name for api-key auth (default "X-API-Key").
    pub auth_header_name: Option<String>,
    pub request_fields: Vec<RequestField>,
    pub created_at: DateTime<Utc>,
}

/// Wire shape for a service listing. Provider credentials stay server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub id: i64,
    pub wallet_id: i64,
    pub name: String,
    pub description: String,
    pub price_per_request: String,
    pub category: String,
    pub is_active: bool,
    pub is_manual: bool,
    pub request_fields: Vec<RequestField>,
    pub created_at: DateTime<Utc>,
}

impl From<&Service> for ServiceResponse {
    fn from(s: &Service) -> Self {
        Self {
            id: s.id,
            wallet_id: s.wallet_id,
            name: s.name.clone(),
            description: s.description.clone(),
            price_per_request: s.price_per_request.to_string(),
            category: s.category.clone(),
            is_active: s.is_active,
            is_manual: s.api_endpoint.is_none(),
            request_fields: s.request_fields.clone(),
            created_at: s.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, kind: FieldKind, required: bool, default: Option<&str>) -> RequestField {
        RequestField {
            name: name.to_string(),
            kind,
            required,
            description: None,
            default: default.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_required_field_missing() {
        let fields = vec![field("size", FieldKind::Text, true, None)];
        let err = validate_payload(&fields, &HashMap::new()).unwrap_err();
        assert!(err.contains("size"));
    }

    #[test]
    fn test_default_fills_absent_field() {
        let fields = vec![field("qty", FieldKind::Number, true, Some("1"))];
        let resolved = validate_payload(&fields, &HashMap::new()).unwrap();
        assert_eq!(resolved.get("qty").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_kind_checks() {
        let f = field("n", FieldKind::Number, true, None);
        assert!(f.check_value("12.5").is_ok());
        assert!(f.check_value("twelve").is_err());

        let f = field("e", FieldKind::Email, true, None);
        assert!(f.check_value("a@b.co").is_ok());
        assert!(f.check_value("not-an-email").is_err());

        let f = field("u", FieldKind::Url, true, None);
        assert!(f.check_value("https://example.com/x").is_ok());
        assert!(f.check_value("ftp://example.com").is_err());
    }

    #[test]
    fn test_extra_keys_pass_through() {
        let fields = vec![field("size", FieldKind::Text, false, None)];
        let mut payload = HashMap::new();
        payload.insert("color".to_string(), "red".to_string());
        let resolved = validate_payload(&fields, &payload).unwrap();
        assert_eq!(resolved.get("color").map(String::as_str), Some("red"));
    }
}
