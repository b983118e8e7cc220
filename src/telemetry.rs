//! Distance telemetry plumbing
//!
//! The sensor task hands readings to the publisher through a single slot
//! [`DistanceSignal`]; a newer reading overwrites one not yet published.

use crate::BoardError;
use core::fmt::Write;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::String;

/// Latest distance in centimeters
pub type DistanceSignal = Signal<CriticalSectionRawMutex, f32>;

/// MQTT 3.1.1 caps client identifiers at 23 bytes
pub type ClientId = String<23>;

/// Payload text for one reading
pub type Payload = String<16>;

pub fn meters_to_cm(distance_m: f32) -> f32 {
    distance_m * 100.0
}

/// Two decimals, no unit: `"123.45"`
pub fn format_distance(distance_cm: f32) -> Result<Payload, BoardError> {
    let mut payload = Payload::new();
    write!(payload, "{:.2}", distance_cm).map_err(|_| BoardError::ProtocolError)?;
    Ok(payload)
}

/// `esp32-` followed by six hex digits
pub fn client_id(seed: u32) -> Result<ClientId, BoardError> {
    let mut id = ClientId::new();
    write!(id, "esp32-{:06x}", seed & 0x00FF_FFFF).map_err(|_| BoardError::ProtocolError)?;
    Ok(id)
}

/// Tracks outbound traffic so the broker's keep-alive is honoured
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    interval_ms: u64,
    last_sent_ms: u64,
}

impl KeepAlive {
    pub fn new(keep_alive_secs: u16, now_ms: u64) -> Self {
        Self {
            interval_ms: u64::from(keep_alive_secs) * 1000,
            last_sent_ms: now_ms,
        }
    }

    /// Any packet sent to the broker resets the keep-alive timer
    pub fn record_sent(&mut self, now_ms: u64) {
        self.last_sent_ms = now_ms;
    }

    /// Ping once half the interval has passed without traffic
    pub fn ping_due(&self, now_ms: u64) -> bool {
        self.interval_ms > 0 && now_ms.saturating_sub(self.last_sent_ms) >= self.interval_ms / 2
    }
}
