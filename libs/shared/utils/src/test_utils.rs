use std::sync::Arc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub sweep_interval_minutes: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            sweep_interval_minutes: 5,
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock PostgREST server (usually a wiremock URI).
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            sweep_interval_minutes: self.sweep_interval_minutes,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Canned PostgREST rows shaped like the clinic schema, for wiremock responses.
pub struct MockClinicRows;

impl MockClinicRows {
    pub fn appointment_row(id: Uuid, appointment_time: &str, status: &str) -> Value {
        Self::appointment_row_with_history(id, appointment_time, status, &[])
    }

    pub fn appointment_row_with_history(
        id: Uuid,
        appointment_time: &str,
        status: &str,
        note_ids: &[Uuid],
    ) -> Value {
        json!({
            "id": id,
            "patient_name": "Test Patient",
            "email": "patient@example.com",
            "phone": "+6591234567",
            "weight": null,
            "height": null,
            "treatment_id": Uuid::new_v4(),
            "appointment_time": appointment_time,
            "status": status,
            "notes": null,
            "note_history": note_ids,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn note_row(
        id: Uuid,
        appointment_id: Uuid,
        note_type: &str,
        added_by: &str,
        content: &str,
    ) -> Value {
        let added_by_id = if added_by == "system" {
            Value::Null
        } else {
            json!(Uuid::new_v4())
        };

        json!({
            "id": id,
            "appointment_id": appointment_id,
            "type": note_type,
            "content": content,
            "added_by": added_by,
            "added_by_id": added_by_id,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_url("http://127.0.0.1:9999");
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://127.0.0.1:9999");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(app_config.is_configured());
    }

    #[test]
    fn test_system_note_row_has_no_author_id() {
        let row = MockClinicRows::note_row(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "completed",
            "system",
            "done",
        );
        assert!(row["added_by_id"].is_null());
    }
}
