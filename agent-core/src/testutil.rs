//! Mock collaborators for the state-machine tests.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};

use anyhow::{bail, Result};

use crate::platform::{
    ApplySession, HttpBody, StagedImage, StagingStore, Transport, UpdateApplier,
};

enum Canned {
    Reply {
        path: &'static str,
        status: u16,
        body: Vec<u8>,
    },
    /// Delivers `good` bytes, then the stream breaks.
    Broken {
        path: &'static str,
        good: Vec<u8>,
    },
    ConnFail {
        path: &'static str,
    },
}

impl Canned {
    fn path(&self) -> &'static str {
        match self {
            Canned::Reply { path, .. } | Canned::Broken { path, .. } | Canned::ConnFail { path } => {
                path
            }
        }
    }
}

/// Serves canned responses in FIFO order, recording every requested URL.
pub struct MockTransport {
    queue: VecDeque<Canned>,
    pub requests: Vec<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            requests: Vec::new(),
        }
    }

    pub fn reply(&mut self, path: &'static str, status: u16, body: impl Into<Vec<u8>>) {
        self.queue.push_back(Canned::Reply {
            path,
            status,
            body: body.into(),
        });
    }

    /// A 200 whose body stream breaks after `good` bytes.
    pub fn broken_stream(&mut self, path: &'static str, good: impl Into<Vec<u8>>) {
        self.queue.push_back(Canned::Broken {
            path,
            good: good.into(),
        });
    }

    pub fn fail(&mut self, path: &'static str) {
        self.queue.push_back(Canned::ConnFail { path });
    }
}

struct BrokenReader {
    good: Cursor<Vec<u8>>,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.good.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream broke")),
            n => Ok(n),
        }
    }
}

impl Transport for MockTransport {
    fn get(&mut self, url: &str) -> Result<HttpBody<'_>> {
        self.requests.push(url.to_string());
        let Some(next) = self.queue.pop_front() else {
            bail!("unexpected request: {url}");
        };
        if !url.contains(next.path()) {
            bail!("request {url} does not match canned reply for {}", next.path());
        }
        match next {
            Canned::Reply { status, body, .. } => Ok(HttpBody {
                status,
                reader: Box::new(Cursor::new(body)),
            }),
            Canned::Broken { good, .. } => Ok(HttpBody {
                status: 200,
                reader: Box::new(BrokenReader {
                    good: Cursor::new(good),
                }),
            }),
            Canned::ConnFail { .. } => bail!("connection refused"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Removed,
    Created,
    Opened,
}

/// In-memory staging store with an event log for ordering assertions.
pub struct MockStore {
    pub image: Option<Vec<u8>>,
    pub events: Vec<StoreEvent>,
    pub fail_create: bool,
    pub fail_remove: bool,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            image: None,
            events: Vec::new(),
            fail_create: false,
            fail_remove: false,
        }
    }

    pub fn staged(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            image: Some(bytes.into()),
            ..Self::empty()
        }
    }
}

struct MockImageWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl Write for MockImageWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StagingStore for MockStore {
    fn remove(&mut self) -> Result<()> {
        self.events.push(StoreEvent::Removed);
        if self.fail_remove {
            bail!("remove failed");
        }
        self.image = None;
        Ok(())
    }

    fn create(&mut self) -> Result<Box<dyn Write + '_>> {
        self.events.push(StoreEvent::Created);
        if self.fail_create {
            bail!("cannot open staging file for writing");
        }
        self.image = Some(Vec::new());
        let buf = self.image.as_mut().unwrap();
        Ok(Box::new(MockImageWriter { buf }))
    }

    fn open(&mut self) -> Result<Option<StagedImage<'_>>> {
        self.events.push(StoreEvent::Opened);
        match &self.image {
            Some(bytes) => Ok(Some(StagedImage {
                len: bytes.len() as u64,
                reader: Box::new(Cursor::new(bytes.clone())),
            })),
            None => Ok(None),
        }
    }
}

/// Mock flash applier. `accept_limit` simulates a slot that silently takes
/// fewer bytes than offered, producing a short write without any error.
pub struct MockApplier {
    pub capacity: u64,
    pub accept_limit: Option<u64>,
    pub finalize_ok: bool,
    pub written: Vec<u8>,
    pub begin_count: usize,
    pub finalize_count: usize,
}

impl MockApplier {
    pub fn new() -> Self {
        Self {
            capacity: u64::MAX,
            accept_limit: None,
            finalize_ok: true,
            written: Vec::new(),
            begin_count: 0,
            finalize_count: 0,
        }
    }
}

struct MockSession<'a> {
    applier: &'a mut MockApplier,
}

impl ApplySession for MockSession<'_> {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let accepted = match self.applier.accept_limit {
            Some(limit) => {
                let room = limit.saturating_sub(self.applier.written.len() as u64);
                chunk.len().min(room as usize)
            }
            None => chunk.len(),
        };
        self.applier.written.extend_from_slice(&chunk[..accepted]);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.applier.written.len() as u64
    }

    fn finalize(self: Box<Self>) -> Result<()> {
        self.applier.finalize_count += 1;
        if self.applier.finalize_ok {
            Ok(())
        } else {
            bail!("finalize failed with error 7");
        }
    }
}

impl UpdateApplier for MockApplier {
    fn begin(&mut self, size: u64) -> Result<Box<dyn ApplySession + '_>> {
        self.begin_count += 1;
        if size > self.capacity {
            bail!("not enough space for a {size} byte image");
        }
        self.written.clear();
        Ok(Box::new(MockSession { applier: self }))
    }
}
