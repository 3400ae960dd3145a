// libs/booking-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    pub treatment_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub note_history: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Completed,
    NoShow,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "no_show" => Ok(AppointmentStatus::NoShow),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::InvalidStatus(other.to_string())),
        }
    }
}

// ==============================================================================
// NOTE LEDGER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub appointment_id: Uuid,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub content: String,
    pub added_by: NoteAuthor,
    #[serde(default)]
    pub added_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    Confirmed,
    Completed,
    NoShow,
    Cancelled,
    RescheduleNote,
    Booking,
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteType::Confirmed => write!(f, "confirmed"),
            NoteType::Completed => write!(f, "completed"),
            NoteType::NoShow => write!(f, "no_show"),
            NoteType::Cancelled => write!(f, "cancelled"),
            NoteType::RescheduleNote => write!(f, "reschedule_note"),
            NoteType::Booking => write!(f, "booking"),
        }
    }
}

impl From<AppointmentStatus> for NoteType {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Confirmed => NoteType::Confirmed,
            AppointmentStatus::Completed => NoteType::Completed,
            AppointmentStatus::NoShow => NoteType::NoShow,
            AppointmentStatus::Cancelled => NoteType::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteAuthor {
    Patient,
    Admin,
    Staff,
    System,
}

impl fmt::Display for NoteAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteAuthor::Patient => write!(f, "patient"),
            NoteAuthor::Admin => write!(f, "admin"),
            NoteAuthor::Staff => write!(f, "staff"),
            NoteAuthor::System => write!(f, "system"),
        }
    }
}

/// Acting user behind a status change or reschedule. System-triggered
/// mutations bypass this and attribute notes to [`NoteAuthor::System`].
#[derive(Debug, Clone)]
pub struct Actor {
    pub role: NoteAuthor,
    pub id: Uuid,
}

impl Actor {
    pub fn new(role: NoteAuthor, id: Uuid) -> Self {
        Self { role, id }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_name: String,
    pub email: String,
    pub phone: String,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub treatment_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub notes: Option<String>,
    /// Account the booking patient resolved to, when known. Linked into the
    /// initial booking note; account creation itself happens upstream.
    pub patient_account_id: Option<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("This time slot is already booked")]
    SlotConflict,

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::NoShow,
            AppointmentStatus::Cancelled,
        ] {
            let parsed: AppointmentStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = "approved".parse::<AppointmentStatus>();
        assert_matches!(result, Err(AppointmentError::InvalidStatus(s)) if s == "approved");
    }

    #[test]
    fn test_note_type_matches_status() {
        assert_eq!(NoteType::from(AppointmentStatus::NoShow), NoteType::NoShow);
        assert_eq!(
            NoteType::from(AppointmentStatus::Completed),
            NoteType::Completed
        );
    }

    #[test]
    fn test_note_type_serializes_as_type_field() {
        let note = Note {
            id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            note_type: NoteType::RescheduleNote,
            content: "moved".to_string(),
            added_by: NoteAuthor::Staff,
            added_by_id: Some(Uuid::new_v4()),
            created_at: chrono::Utc::now(),
        };

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "reschedule_note");
        assert_eq!(value["added_by"], "staff");
    }
}
