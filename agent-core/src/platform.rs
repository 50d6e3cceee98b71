//! Collaborator traits the firmware implements.
//!
//! The core treats the HTTP client, the staging store, and the flash
//! applier as external collaborators behind small blocking interfaces, so
//! the state machine can run against mocks on the host.

use std::io::{Read, Write};

use anyhow::Result;

/// An HTTP response: status code plus a streaming body reader.
///
/// The reader borrows the transport, which matches the single-request-
/// in-flight model of the main loop.
pub struct HttpBody<'a> {
    pub status: u16,
    pub reader: Box<dyn Read + 'a>,
}

impl HttpBody<'_> {
    /// Drains the body into a string, for the small JSON endpoints.
    pub fn into_string(mut self) -> Result<(u16, String)> {
        let mut body = String::new();
        self.reader.read_to_string(&mut body)?;
        Ok((self.status, body))
    }
}

/// Blocking HTTP GET client. Requests are bounded by transport timeouts.
pub trait Transport {
    fn get(&mut self, url: &str) -> Result<HttpBody<'_>>;
}

/// A staged firmware image opened for reading.
pub struct StagedImage<'a> {
    /// Declared byte length of the staged image.
    pub len: u64,
    pub reader: Box<dyn Read + 'a>,
}

/// Durable store holding at most one firmware image blob.
pub trait StagingStore {
    /// Destroys the staged image if one exists. Idempotent.
    fn remove(&mut self) -> Result<()>;

    /// Creates a fresh image and returns a writer for it. Any previous
    /// image must already have been removed by the caller.
    fn create(&mut self) -> Result<Box<dyn Write + '_>>;

    /// Opens the staged image, or returns `None` when nothing is staged.
    fn open(&mut self) -> Result<Option<StagedImage<'_>>>;
}

/// Writes a sized byte stream into the inactive firmware slot.
pub trait UpdateApplier {
    /// Starts an apply session for an image of `size` bytes. Fails when the
    /// update slot cannot accommodate the image.
    fn begin(&mut self, size: u64) -> Result<Box<dyn ApplySession + '_>>;
}

/// One bounded flash-write session.
///
/// Dropping a session without finalizing aborts it; the staged image is
/// untouched either way.
pub trait ApplySession {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Bytes the underlying slot has accepted so far.
    fn bytes_written(&self) -> u64;

    /// Verifies the written image and marks it bootable. The device still
    /// runs the old firmware until it restarts.
    fn finalize(self: Box<Self>) -> Result<()>;
}
