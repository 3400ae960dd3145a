// libs/booking-cell/src/services/conflict.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use std::sync::Arc;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::store::AppointmentStore;

/// Fixed booking slot length. Deliberately independent of the treatment's
/// configured duration; every booking blocks the same window.
pub const SLOT_LENGTH_MINUTES: i64 = 30;

pub struct SlotConflictService {
    store: Arc<AppointmentStore>,
}

impl SlotConflictService {
    pub fn new(store: Arc<AppointmentStore>) -> Self {
        Self { store }
    }

    /// Whether any *other* confirmed appointment starts inside the
    /// 30-minute slot beginning at `proposed_time`. Appointments that have
    /// left the confirmed state never block a slot. `exclude_appointment_id`
    /// lets a reschedule check against everything except itself.
    pub async fn has_conflict(
        &self,
        proposed_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let (window_start, window_end) = slot_window(proposed_time);
        debug!("Checking slot conflicts between {} and {}", window_start, window_end);

        let candidates = self.store.confirmed_in_window(
            window_start,
            window_end,
            exclude_appointment_id,
        ).await?;

        // The query already filters; re-check here so a stale or overly
        // broad read can never produce a false conflict decision.
        let conflicting = candidates.iter()
            .filter(|appointment| blocks_slot(appointment, proposed_time, exclude_appointment_id))
            .count();

        if conflicting > 0 {
            warn!("Slot conflict at {} - {} existing confirmed booking(s)",
                  proposed_time, conflicting);
        }

        Ok(conflicting > 0)
    }

    /// The booking entrypoint's simpler pre-check: a confirmed appointment
    /// sharing literally the same start instant.
    pub async fn has_exact_collision(
        &self,
        proposed_time: DateTime<Utc>,
    ) -> Result<bool, AppointmentError> {
        let existing = self.store.confirmed_at(proposed_time).await?;

        let collision = existing.iter().any(|appointment| {
            appointment.status == AppointmentStatus::Confirmed
                && appointment.appointment_time == proposed_time
        });

        if collision {
            warn!("Exact-time collision at {}", proposed_time);
        }

        Ok(collision)
    }
}

/// The slot occupied by a booking at `proposed_time`: start inclusive, end
/// exclusive.
pub fn slot_window(proposed_time: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (proposed_time, proposed_time + Duration::minutes(SLOT_LENGTH_MINUTES))
}

fn blocks_slot(
    appointment: &Appointment,
    proposed_time: DateTime<Utc>,
    exclude_appointment_id: Option<Uuid>,
) -> bool {
    if Some(appointment.id) == exclude_appointment_id {
        return false;
    }
    if appointment.status != AppointmentStatus::Confirmed {
        return false;
    }

    let (window_start, window_end) = slot_window(proposed_time);
    appointment.appointment_time >= window_start && appointment.appointment_time < window_end
}
