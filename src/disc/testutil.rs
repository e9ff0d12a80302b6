//! Deterministic DiscAccess stub shared by the unit tests

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::access::DiscAccess;
use super::sector::{zeroed_sector, RawSector};
use super::toc::Toc;

/// Content every stub sector carries unless overridden: a per-LBA byte
/// pattern with a Mode 1 header byte
pub fn expected_sector(lba: i32) -> RawSector {
    let mut sector = zeroed_sector();
    let seed = (lba as u32).wrapping_mul(2_654_435_761);
    for (i, byte) in sector.iter_mut().enumerate() {
        *byte = (seed.wrapping_add(i as u32 * 7) >> 3) as u8;
    }
    sector[15] = 0x01;
    sector
}

/// Number of raw sector reads a stub has served (failures included)
#[derive(Clone, Default)]
pub struct ReadCounter(Arc<AtomicUsize>);

impl ReadCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

type Content = Box<dyn Fn(i32, &mut RawSector) + Send>;
type Failure = Box<dyn Fn(i32) -> bool + Send>;

/// Stub image: every in-range LBA exists and carries [`expected_sector`]
pub struct StubAccess {
    toc: Option<Toc>,
    content: Content,
    fails: Failure,
    delay: Option<Duration>,
    reads: ReadCounter,
}

impl StubAccess {
    pub fn new() -> Self {
        Self {
            toc: Toc::from_tracks(&[(0, true)], 1000),
            content: Box::new(|lba, buf| *buf = expected_sector(lba)),
            fails: Box::new(|_| false),
            delay: None,
            reads: ReadCounter::default(),
        }
    }

    /// Report this TOC instead of the default single data track
    pub fn with_toc(mut self, toc: Toc) -> Self {
        self.toc = Some(toc);
        self
    }

    /// Make `read_toc` fail
    pub fn without_toc(mut self) -> Self {
        self.toc = None;
        self
    }

    /// Replace the sector content generator
    pub fn with_content(mut self, content: impl Fn(i32, &mut RawSector) + Send + 'static) -> Self {
        self.content = Box::new(content);
        self
    }

    /// Fail reads for which `fails` returns true
    pub fn failing_when(mut self, fails: impl Fn(i32) -> bool + Send + 'static) -> Self {
        self.fails = Box::new(fails);
        self
    }

    /// Sleep this long in every sector read
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn read_counter(&self) -> ReadCounter {
        self.reads.clone()
    }
}

impl DiscAccess for StubAccess {
    fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> io::Result<()> {
        self.reads.0.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if (self.fails)(lba) {
            // Leave garbage behind to prove callers zero-fill on failure.
            buf.fill(0xEE);
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        (self.content)(lba, buf);
        Ok(())
    }

    fn read_toc(&mut self) -> io::Result<Toc> {
        self.toc
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no TOC"))
    }
}
