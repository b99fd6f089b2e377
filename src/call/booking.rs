use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// A completed appointment request, handed off when a call is booked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub call_id: String,
    pub name: String,
    pub preferred_time: String,
    pub booked_at: DateTime<Utc>,
}

/// Receives every booking exactly once, on the turn that completes it.
#[async_trait]
pub trait BookingSink: Send + Sync {
    async fn record(&self, booking: &Booking) -> Result<()>;
}

/// Default sink: the booking goes to the log as a structured event.
pub struct LogBookingSink;

#[async_trait]
impl BookingSink for LogBookingSink {
    async fn record(&self, booking: &Booking) -> Result<()> {
        info!(
            call_id = %booking.call_id,
            name = %booking.name,
            preferred_time = %booking.preferred_time,
            booked_at = %booking.booked_at.to_rfc3339(),
            "appointment booked"
        );
        Ok(())
    }
}
