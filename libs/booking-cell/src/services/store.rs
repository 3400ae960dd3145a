// libs/booking-cell/src/services/store.rs
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// Persistence layer for appointment rows. Every write is a single-row
/// insert or PATCH; multi-row coordination lives in the callers.
pub struct AppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl AppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let rows = self.fetch(&path).await?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Persist a new appointment with status=confirmed and an empty note
    /// history. Conflict checks happen before this is called.
    pub async fn insert(
        &self,
        request: &CreateAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment_data = json!({
            "id": Uuid::new_v4(),
            "patient_name": request.patient_name.trim(),
            "email": request.email.trim(),
            "phone": request.phone.trim(),
            "weight": request.weight,
            "height": request.height,
            "treatment_id": request.treatment_id,
            "appointment_time": request.appointment_time.to_rfc3339(),
            "status": AppointmentStatus::Confirmed.to_string(),
            "notes": request.notes.as_deref().map(str::trim).unwrap_or(""),
            "note_history": [],
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            APPOINTMENTS_PATH,
            None,
            Some(appointment_data),
            Some(Self::representation_headers()),
        ).await.map_err(|e| AppointmentError::Storage(e.to_string()))?;

        let appointment = Self::parse_single(result, "create appointment")?;
        info!("Appointment created: {} at {}", appointment.id, appointment.appointment_time);
        Ok(appointment)
    }

    /// Set a new status, append one note reference, refresh updated_at.
    pub async fn set_status(
        &self,
        appointment: &Appointment,
        status: AppointmentStatus,
        note_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let update_data = json!({
            "status": status.to_string(),
            "note_history": Self::appended_history(appointment, note_id),
            "updated_at": now.to_rfc3339()
        });

        self.patch(appointment.id, update_data).await
    }

    /// Move the appointment to a new time, append one note reference,
    /// refresh updated_at. Status is intentionally left untouched.
    pub async fn set_time(
        &self,
        appointment: &Appointment,
        new_time: DateTime<Utc>,
        note_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let update_data = json!({
            "appointment_time": new_time.to_rfc3339(),
            "note_history": Self::appended_history(appointment, note_id),
            "updated_at": now.to_rfc3339()
        });

        self.patch(appointment.id, update_data).await
    }

    /// Append a note reference without any other change.
    pub async fn link_note(
        &self,
        appointment: &Appointment,
        note_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let update_data = json!({
            "note_history": Self::appended_history(appointment, note_id),
            "updated_at": now.to_rfc3339()
        });

        self.patch(appointment.id, update_data).await
    }

    pub async fn confirmed_at(
        &self,
        time: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?appointment_time=eq.{}&status=eq.confirmed",
            APPOINTMENTS_PATH,
            urlencoding::encode(&time.to_rfc3339()),
        );
        self.fetch(&path).await
    }

    pub async fn confirmed_in_window(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            format!("appointment_time=gte.{}", urlencoding::encode(&window_start.to_rfc3339())),
            format!("appointment_time=lt.{}", urlencoding::encode(&window_end.to_rfc3339())),
            "status=eq.confirmed".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("{}?{}", APPOINTMENTS_PATH, query_parts.join("&"));
        self.fetch(&path).await
    }

    pub async fn list_by_status(
        &self,
        status: &AppointmentStatus,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?status=eq.{}&order=appointment_time.asc",
            APPOINTMENTS_PATH, status,
        );
        self.fetch(&path).await
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?order=appointment_time.asc", APPOINTMENTS_PATH);
        self.fetch(&path).await
    }

    pub async fn list_by_patient_email(
        &self,
        email: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?email=eq.{}&order=appointment_time.asc",
            APPOINTMENTS_PATH,
            urlencoding::encode(email),
        );
        self.fetch(&path).await
    }

    /// Confirmed appointments starting on the given calendar day.
    pub async fn confirmed_on_day(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let day_start = date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppointmentError::Validation("Invalid date".to_string()))?
            .and_utc();
        let day_end = date.and_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| AppointmentError::Validation("Invalid date".to_string()))?
            .and_utc();

        let path = format!(
            "{}?appointment_time=gte.{}&appointment_time=lte.{}&status=eq.confirmed",
            APPOINTMENTS_PATH,
            urlencoding::encode(&day_start.to_rfc3339()),
            urlencoding::encode(&day_end.to_rfc3339()),
        );
        self.fetch(&path).await
    }

    /// Confirmed appointments scheduled strictly before the cutoff. Used by
    /// the completion sweeper.
    pub async fn confirmed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?status=eq.confirmed&appointment_time=lt.{}",
            APPOINTMENTS_PATH,
            urlencoding::encode(&cutoff.to_rfc3339()),
        );
        self.fetch(&path).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointments: {}", path);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            None,
            None,
        ).await.map_err(|e| AppointmentError::Storage(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::Storage(format!("Failed to parse appointments: {}", e)))
    }

    async fn patch(&self, id: Uuid, update_data: Value) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(update_data),
            Some(Self::representation_headers()),
        ).await.map_err(|e| AppointmentError::Storage(e.to_string()))?;

        Self::parse_single(result, "update appointment")
    }

    fn parse_single(result: Vec<Value>, operation: &str) -> Result<Appointment, AppointmentError> {
        let row = result.into_iter().next()
            .ok_or_else(|| AppointmentError::Storage(format!("{} returned no rows", operation)))?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::Storage(format!("Failed to parse appointment: {}", e)))
    }

    fn appended_history(appointment: &Appointment, note_id: Uuid) -> Vec<Uuid> {
        let mut history = appointment.note_history.clone();
        history.push(note_id);
        history
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}
