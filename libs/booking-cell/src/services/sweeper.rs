// libs/booking-cell/src/services/sweeper.rs
use chrono::Duration;
use tokio::time::{sleep, Duration as TokioDuration};
use tracing::{error, info};

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{AppointmentError, AppointmentStatus, NoteAuthor, NoteType};
use crate::services::notes::NoteLedgerService;
use crate::services::store::AppointmentStore;

/// Assumed session length. Fixed at one hour regardless of the booked
/// treatment's configured duration.
pub const COMPLETION_DELAY_MINUTES: i64 = 60;

const COMPLETION_NOTE: &str = "Automatically marked as completed (1 hour after scheduled time)";

/// Background task that completes confirmed appointments once their assumed
/// end time has passed, writing the same audit note a human transition would.
pub struct CompletionSweeper {
    store: Arc<AppointmentStore>,
    notes: NoteLedgerService,
    clock: Arc<dyn Clock>,
    interval_minutes: u64,
}

impl CompletionSweeper {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let store = Arc::new(AppointmentStore::new(Arc::clone(&supabase)));

        Self {
            notes: NoteLedgerService::new(supabase, Arc::clone(&clock)),
            store,
            clock,
            interval_minutes: config.sweep_interval_minutes,
        }
    }

    /// One sweep pass. Returns how many appointments were completed.
    pub async fn sweep_once(&self) -> Result<usize, AppointmentError> {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(COMPLETION_DELAY_MINUTES);

        let past_appointments = self.store.confirmed_before(cutoff).await?;
        info!("Found {} appointments to complete", past_appointments.len());

        let mut completed = 0;
        for appointment in past_appointments {
            // Re-check against the row we actually hold; the query ran
            // earlier and state may have moved underneath it.
            if appointment.status != AppointmentStatus::Confirmed {
                continue;
            }

            let appointment_end =
                appointment.appointment_time + Duration::minutes(COMPLETION_DELAY_MINUTES);
            if appointment_end >= now {
                continue;
            }

            let note = self.notes.append(
                appointment.id,
                NoteType::Completed,
                COMPLETION_NOTE,
                NoteAuthor::System,
                None,
            ).await?;

            self.store.set_status(
                &appointment,
                AppointmentStatus::Completed,
                note.id,
                now,
            ).await?;

            info!("Completed appointment {}", appointment.id);
            completed += 1;
        }

        Ok(completed)
    }

    /// Run the sweep on a fixed interval. Errors are logged and absorbed so
    /// the next tick always fires; run this in a spawned tokio task.
    pub async fn run(&self) {
        info!("Starting appointment completion sweeper (every {} minutes)",
              self.interval_minutes);

        loop {
            if let Err(e) = self.sweep_once().await {
                error!("Error in completing appointments: {}", e);
            }

            sleep(TokioDuration::from_secs(self.interval_minutes * 60)).await;
        }
    }
}
