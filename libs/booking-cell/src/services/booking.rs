// libs/booking-cell/src/services/booking.rs
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    Actor, Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
    NoteAuthor, NoteType,
};
use crate::services::conflict::SlotConflictService;
use crate::services::notes::NoteLedgerService;
use crate::services::store::AppointmentStore;

/// Lifecycle API over the appointment store: booking, status transitions,
/// rescheduling, and the read projections callers build screens from.
pub struct BookingService {
    store: Arc<AppointmentStore>,
    conflicts: SlotConflictService,
    notes: NoteLedgerService,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let store = Arc::new(AppointmentStore::new(Arc::clone(&supabase)));

        Self {
            conflicts: SlotConflictService::new(Arc::clone(&store)),
            notes: NoteLedgerService::new(supabase, Arc::clone(&clock)),
            store,
            clock,
        }
    }

    /// Book a new appointment. Both collision checks must pass: the exact
    /// start-instant check first, then the windowed slot check.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for {} at {}",
              request.patient_name.trim(), request.appointment_time);

        self.validate_create_request(&request)?;

        if self.conflicts.has_exact_collision(request.appointment_time).await? {
            return Err(AppointmentError::SlotConflict);
        }
        if self.conflicts.has_conflict(request.appointment_time, None).await? {
            return Err(AppointmentError::SlotConflict);
        }

        let appointment = self.store.insert(&request, self.clock.now()).await?;

        // Initial booking note, only when the patient supplied free text.
        let initial_note = request.notes.as_deref().map(str::trim).filter(|text| !text.is_empty());
        if let Some(text) = initial_note {
            let note = self.notes.append(
                appointment.id,
                NoteType::Booking,
                text,
                NoteAuthor::Patient,
                request.patient_account_id,
            ).await?;

            let appointment = self.store.link_note(&appointment, note.id, self.clock.now()).await?;
            info!("Appointment {} booked with initial note {}", appointment.id, note.id);
            return Ok(appointment);
        }

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    /// Move an appointment to a new status. Any status can follow any
    /// other; the audit note is what makes the history reconstructible.
    pub async fn change_status(
        &self,
        appointment_id: Uuid,
        new_status: &str,
        actor: Actor,
        note: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let status: AppointmentStatus = new_status.parse()?;
        let appointment = self.store.get(appointment_id).await?;

        let content = note.as_deref().map(str::trim).filter(|text| !text.is_empty())
            .unwrap_or("No notes provided")
            .to_string();

        let note = self.notes.append(
            appointment_id,
            NoteType::from(status.clone()),
            &content,
            actor.role,
            Some(actor.id),
        ).await?;

        let updated = self.store.set_status(&appointment, status, note.id, self.clock.now()).await?;

        info!("Appointment {} status changed to {}", appointment_id, updated.status);
        Ok(updated)
    }

    /// Reschedule to a new time. Status stays as it is, and no conflict
    /// check runs against the new time.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_time: DateTime<Utc>,
        reason: &str,
        actor: Actor,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(appointment_id).await?;
        let old_time = appointment.appointment_time;

        let content = format!(
            "Appointment rescheduled from {} to {}. Reason: {}",
            format_note_time(old_time),
            format_note_time(new_time),
            reason,
        );

        let note = self.notes.append(
            appointment_id,
            NoteType::RescheduleNote,
            &content,
            actor.role,
            Some(actor.id),
        ).await?;

        let updated = self.store.set_time(&appointment, new_time, note.id, self.clock.now()).await?;

        info!("Appointment {} rescheduled from {} to {}", appointment_id, old_time, new_time);
        Ok(updated)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(appointment_id).await
    }

    pub async fn list_by_status(
        &self,
        status: &AppointmentStatus,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_by_status(status).await
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_all().await
    }

    pub async fn list_by_patient_email(
        &self,
        email: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_by_patient_email(email).await
    }

    /// Start times of all confirmed appointments on a calendar day,
    /// formatted for slot-picker UIs ("9:00 AM").
    pub async fn booked_slots(&self, date: NaiveDate) -> Result<Vec<String>, AppointmentError> {
        let appointments = self.store.confirmed_on_day(date).await?;
        Ok(appointments.iter()
            .map(|appointment| format_slot_time(appointment.appointment_time))
            .collect())
    }

    fn validate_create_request(
        &self,
        request: &CreateAppointmentRequest,
    ) -> Result<(), AppointmentError> {
        let mut missing = Vec::new();
        if request.patient_name.trim().is_empty() {
            missing.push("patient_name");
        }
        if request.email.trim().is_empty() {
            missing.push("email");
        }
        if request.phone.trim().is_empty() {
            missing.push("phone");
        }

        if !missing.is_empty() {
            warn!("Rejecting booking with missing fields: {}", missing.join(", "));
            return Err(AppointmentError::Validation(
                format!("Missing required fields: {}", missing.join(", "))
            ));
        }

        if matches!(request.weight, Some(weight) if weight < 0.0) {
            return Err(AppointmentError::Validation("Weight cannot be negative".to_string()));
        }
        if matches!(request.height, Some(height) if height < 0.0) {
            return Err(AppointmentError::Validation("Height cannot be negative".to_string()));
        }

        Ok(())
    }
}

fn format_slot_time(time: DateTime<Utc>) -> String {
    time.format("%-I:%M %p").to_string()
}

fn format_note_time(time: DateTime<Utc>) -> String {
    time.format("%b %-d, %Y %-I:%M %p").to_string()
}
