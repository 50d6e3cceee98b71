//! Server-requested intents.
//!
//! Each flag is a level, not an edge: polling can only raise it, and the
//! orchestrator consumes it exactly once per attempt. Re-asserting an
//! already-raised flag is a no-op, so at most one unconsumed request per
//! flag exists at any time.

/// The two actionable intents plus the informational availability signal.
///
/// Availability is tracked separately because it never drives action in
/// this design; only the per-device flags do.
#[derive(Debug, Default)]
pub struct IntentFlags {
    download_requested: bool,
    apply_requested: bool,
    update_available: bool,
}

impl IntentFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raised by the poll engine on `"download":true`.
    pub fn request_download(&mut self) {
        self.download_requested = true;
    }

    /// Raised by the poll engine on `"update":true` from the flags endpoint.
    pub fn request_apply(&mut self) {
        self.apply_requested = true;
    }

    /// Recorded on `"update":true` from the update-check endpoint.
    pub fn note_update_available(&mut self) {
        self.update_available = true;
    }

    /// Consumes the download intent. Clears it exactly once per request.
    pub fn take_download(&mut self) -> bool {
        core::mem::take(&mut self.download_requested)
    }

    /// Consumes the apply intent. Clears it exactly once per request.
    pub fn take_apply(&mut self) -> bool {
        core::mem::take(&mut self.apply_requested)
    }

    pub fn download_requested(&self) -> bool {
        self.download_requested
    }

    pub fn apply_requested(&self) -> bool {
        self.apply_requested
    }

    pub fn update_available(&self) -> bool {
        self.update_available
    }
}
