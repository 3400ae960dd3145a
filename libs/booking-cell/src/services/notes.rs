// libs/booking-cell/src/services/notes.rs
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::Clock;

use crate::models::{AppointmentError, Note, NoteAuthor, NoteType};

const NOTES_PATH: &str = "/rest/v1/notes";

/// Append-only ledger of lifecycle events. Notes are written exactly once
/// and never updated or deleted; linking the returned note id into the
/// appointment's history is the caller's job.
pub struct NoteLedgerService {
    supabase: Arc<SupabaseClient>,
    clock: Arc<dyn Clock>,
}

impl NoteLedgerService {
    pub fn new(supabase: Arc<SupabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { supabase, clock }
    }

    pub async fn append(
        &self,
        appointment_id: Uuid,
        note_type: NoteType,
        content: &str,
        added_by: NoteAuthor,
        added_by_id: Option<Uuid>,
    ) -> Result<Note, AppointmentError> {
        debug!("Appending {} note for appointment {}", note_type, appointment_id);

        let note_data = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "type": note_type.to_string(),
            "content": content,
            "added_by": added_by.to_string(),
            "added_by_id": added_by_id,
            "created_at": self.clock.now().to_rfc3339()
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            NOTES_PATH,
            None,
            Some(note_data),
            Some(headers),
        ).await.map_err(|e| AppointmentError::Storage(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or_else(|| AppointmentError::Storage("create note returned no rows".to_string()))?;

        let note: Note = serde_json::from_value(row)
            .map_err(|e| AppointmentError::Storage(format!("Failed to parse note: {}", e)))?;

        info!("Recorded {} note {} for appointment {}", note.note_type, note.id, appointment_id);
        Ok(note)
    }
}
