//! Update orchestrator: the download/apply state machine.
//!
//! Driven once per main-loop iteration by the intent flags. Each flag is
//! consumed exactly once per attempt, success or failure; a failed attempt
//! runs again only when the server re-asserts the flag (fail-open). Every
//! failure is absorbed and logged here so a broken update can never take
//! the device down.

use std::io::{Read, Write};

use crate::intent::IntentFlags;
use crate::platform::{StagingStore, Transport, UpdateApplier};
use crate::protocol;

const DOWNLOAD_CHUNK: usize = 1024;
const APPLY_CHUNK: usize = 4096;
/// Download progress is logged every this many chunks.
const PROGRESS_CHUNKS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    /// A download into the staging store is in progress.
    Staging,
    /// A flash write is in progress.
    Applying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Stored { bytes: u64 },
    /// Non-200 status, connection failure, or a mid-stream break. Partial
    /// bytes, if any, are left in place; the next download clears them.
    TransportFailed,
    /// The staging file could not be created or written.
    StorageFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The image was written, verified, and marked bootable, and the staged
    /// copy was consumed. The caller must now restart the device; nothing
    /// runs after the restart call.
    RebootRequired { bytes: u64 },
    /// Nothing staged. A re-request must come from the server.
    NoImage,
    /// The apply session could not start, typically insufficient space.
    BeginFailed,
    /// The slot accepted fewer bytes than the image holds. The image stays
    /// staged so a re-requested apply can retry against the same bytes.
    ShortWrite { written: u64, expected: u64 },
    /// Verification or boot-partition switch failed. Image retained.
    FinalizeFailed,
}

/// What one `run_cycle` did. `None` means the matching flag was not raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub download: Option<DownloadOutcome>,
    pub apply: Option<ApplyOutcome>,
}

impl CycleOutcome {
    pub fn reboot_required(&self) -> bool {
        matches!(self.apply, Some(ApplyOutcome::RebootRequired { .. }))
    }

    pub fn idle(&self) -> bool {
        self.download.is_none() && self.apply.is_none()
    }
}

pub struct Orchestrator {
    base_url: String,
    state: OrchestratorState,
}

impl Orchestrator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: OrchestratorState::Idle,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Runs one iteration: download strictly before apply, so an apply in
    /// the same cycle acts on the image staged by that download.
    pub fn run_cycle(
        &mut self,
        flags: &mut IntentFlags,
        transport: &mut dyn Transport,
        store: &mut dyn StagingStore,
        applier: &mut dyn UpdateApplier,
    ) -> CycleOutcome {
        let download = flags
            .take_download()
            .then(|| self.download(transport, store));
        let apply = flags.take_apply().then(|| self.apply(store, applier));
        CycleOutcome { download, apply }
    }

    fn download(
        &mut self,
        transport: &mut dyn Transport,
        store: &mut dyn StagingStore,
    ) -> DownloadOutcome {
        self.state = OrchestratorState::Staging;
        let outcome = self.download_inner(transport, store);
        self.state = OrchestratorState::Idle;
        outcome
    }

    fn download_inner(
        &mut self,
        transport: &mut dyn Transport,
        store: &mut dyn StagingStore,
    ) -> DownloadOutcome {
        // Stale-image elimination: the store must never hold a mix of two
        // images, so any prior image goes before the first new byte lands.
        if let Err(e) = store.remove() {
            log::warn!("Failed to clear staged image: {e:#}");
        }

        let url = protocol::firmware_url(&self.base_url);
        log::info!("Downloading firmware from {url}");
        let response = match transport.get(&url) {
            Ok(r) if r.status == 200 => r,
            Ok(r) => {
                log::warn!("Firmware download returned HTTP {}", r.status);
                return DownloadOutcome::TransportFailed;
            }
            Err(e) => {
                log::warn!("Firmware download failed: {e:#}");
                return DownloadOutcome::TransportFailed;
            }
        };

        let mut reader = response.reader;
        let mut file = match store.create() {
            Ok(f) => f,
            Err(e) => {
                log::error!("Failed to open staging file for writing: {e:#}");
                return DownloadOutcome::StorageFailed;
            }
        };

        let mut buf = [0u8; DOWNLOAD_CHUNK];
        let mut total: u64 = 0;
        let mut chunks: u32 = 0;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // Partial bytes stay in place (known gap): the next
                    // download removes them before writing anything.
                    log::warn!("Firmware stream broke after {total} bytes: {e}");
                    return DownloadOutcome::TransportFailed;
                }
            };
            if let Err(e) = file.write_all(&buf[..n]) {
                log::error!("Failed writing staging file after {total} bytes: {e}");
                return DownloadOutcome::StorageFailed;
            }
            total += n as u64;
            chunks += 1;
            if chunks % PROGRESS_CHUNKS == 0 {
                log::debug!("Downloaded {total} bytes...");
            }
        }
        if let Err(e) = file.flush() {
            log::error!("Failed flushing staging file: {e}");
            return DownloadOutcome::StorageFailed;
        }

        log::info!("Firmware downloaded and staged ({total} bytes)");
        DownloadOutcome::Stored { bytes: total }
    }

    fn apply(
        &mut self,
        store: &mut dyn StagingStore,
        applier: &mut dyn UpdateApplier,
    ) -> ApplyOutcome {
        self.state = OrchestratorState::Applying;
        let outcome = self.apply_inner(store, applier);
        self.state = OrchestratorState::Idle;
        outcome
    }

    fn apply_inner(
        &mut self,
        store: &mut dyn StagingStore,
        applier: &mut dyn UpdateApplier,
    ) -> ApplyOutcome {
        log::info!("Starting firmware apply");
        let (expected, mut reader) = match store.open() {
            Ok(Some(image)) => (image.len, image.reader),
            Ok(None) => {
                log::warn!("No staged firmware image; nothing to apply");
                return ApplyOutcome::NoImage;
            }
            Err(e) => {
                log::error!("Failed to open staged firmware image: {e:#}");
                return ApplyOutcome::NoImage;
            }
        };

        let mut session = match applier.begin(expected) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Cannot begin apply session for {expected} bytes: {e:#}");
                return ApplyOutcome::BeginFailed;
            }
        };

        let mut buf = [0u8; APPLY_CHUNK];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    log::error!("Failed reading staged image: {e}");
                    break;
                }
            };
            if let Err(e) = session.write_chunk(&buf[..n]) {
                log::error!("Flash write failed: {e:#}");
                break;
            }
        }

        let written = session.bytes_written();
        if written != expected {
            log::warn!("Wrote only {written}/{expected} bytes; retry on the next apply request");
            return ApplyOutcome::ShortWrite { written, expected };
        }

        match session.finalize() {
            Ok(()) => {
                drop(reader);
                if let Err(e) = store.remove() {
                    log::warn!("Failed to remove consumed image: {e:#}");
                }
                log::info!("Firmware apply finished ({written} bytes); reboot required");
                ApplyOutcome::RebootRequired { bytes: written }
            }
            Err(e) => {
                log::error!("Apply finalize failed: {e:#}");
                ApplyOutcome::FinalizeFailed
            }
        }
    }
}
