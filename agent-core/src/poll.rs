//! Poll engine: periodic checks against the update server.
//!
//! Every due cycle runs both checks. A transport error, a non-200 status,
//! or an unreadable body yields no information for that cycle and is
//! retried naturally on the next one; nothing here is fatal and nothing
//! here ever clears an intent flag.

use std::time::{Duration, Instant};

use crate::intent::IntentFlags;
use crate::platform::Transport;
use crate::protocol::{self, DeviceFlags, UpdateCheck};
use crate::schedule::PollSchedule;

pub struct PollEngine {
    base_url: String,
    device_id: String,
    schedule: PollSchedule,
}

impl PollEngine {
    pub fn new(
        base_url: impl Into<String>,
        device_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            device_id: device_id.into(),
            schedule: PollSchedule::new(interval),
        }
    }

    /// Runs one poll cycle if the schedule is due. Returns whether it ran.
    pub fn tick(
        &mut self,
        now: Instant,
        transport: &mut dyn Transport,
        flags: &mut IntentFlags,
    ) -> bool {
        if !self.schedule.due(now) {
            return false;
        }
        self.check_for_update(transport, flags);
        self.check_flags(transport, flags);
        true
    }

    /// GET `/check_update`: records availability. Informational only; it
    /// never triggers a download by itself.
    fn check_for_update(&self, transport: &mut dyn Transport, flags: &mut IntentFlags) {
        let url = protocol::check_update_url(&self.base_url);
        log::debug!("Checking for update at {url}");
        let Some(body) = fetch_body(transport, &url) else {
            return;
        };
        if UpdateCheck::parse(&body).update {
            log::info!("Server reports a newer firmware image is available");
            flags.note_update_available();
        }
    }

    /// GET `/check_flags?mac=<id>`: raises the matching intent for each
    /// true field. False or absent fields leave the flags untouched.
    fn check_flags(&self, transport: &mut dyn Transport, flags: &mut IntentFlags) {
        let url = protocol::check_flags_url(&self.base_url, &self.device_id);
        log::debug!("Checking device flags at {url}");
        let Some(body) = fetch_body(transport, &url) else {
            return;
        };
        let parsed = DeviceFlags::parse(&body);
        if parsed.download {
            log::info!("Server requested a firmware download");
            flags.request_download();
        }
        if parsed.update {
            log::info!("Server requested a firmware apply");
            flags.request_apply();
        }
    }
}

/// Drains a small JSON endpoint. Returns `None` for any kind of failure;
/// the caller treats that as "no information this cycle".
fn fetch_body(transport: &mut dyn Transport, url: &str) -> Option<String> {
    match transport.get(url) {
        Ok(response) => match response.into_string() {
            Ok((200, body)) => Some(body),
            Ok((status, _)) => {
                log::warn!("{url} returned HTTP {status}; no information this cycle");
                None
            }
            Err(e) => {
                log::warn!("Failed reading response from {url}: {e:#}");
                None
            }
        },
        Err(e) => {
            log::warn!("GET {url} failed: {e:#}");
            None
        }
    }
}
