//! Disc reader facade
//!
//! Unified interface over a mounted disc image, serviced either by a dedicated
//! reader thread with read-ahead or synchronously on the caller's thread. Both
//! backends return identical results for identical requests.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

use super::access::{read_or_zero_fill, DiscAccess, PassThroughValidator, SectorValidator};
use super::cache::SectorCache;
use super::channel::{completion_channel, Command, CommandChannel, CompletionEvent};
use super::read_ahead::{ReadAheadEngine, ReadAheadParams};
use super::sector::{
    decode_user_data, lba_in_range, subchannel, zeroed_sector, RawSector, SUBCHANNEL_SIZE,
    USER_DATA_SIZE,
};
use super::stream::SectorStream;
use super::toc::{lba_to_msf, Toc};
use crate::config::{BackendKind, ReaderConfig};

/// Errors that can occur when opening a disc image
#[derive(Error, Debug)]
pub enum DiscError {
    #[error("TOC first({first_track})/last({last_track}) track numbers bad")]
    BadToc { first_track: u8, last_track: u8 },

    #[error("Failed to read TOC: {0}")]
    TocRead(#[source] io::Error),

    #[error("Failed to start reader thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    #[error("Reader thread exited before reporting startup")]
    ReaderExited,

    #[error("Invalid reader config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Synchronous backend: every read goes straight to the DiscAccess
struct DirectBackend {
    access: Box<dyn DiscAccess>,
}

impl DirectBackend {
    fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> bool {
        read_or_zero_fill(self.access.as_mut(), lba, buf)
    }
}

/// Threaded backend: hints go to the reader thread, data comes back through
/// the shared sector cache
struct ThreadedBackend {
    cache: Arc<SectorCache>,
    commands: Arc<CommandChannel>,
    reader_thread: Option<JoinHandle<()>>,
    /// The reader thread is gone; every read fails from now on
    unrecoverable: bool,
}

impl ThreadedBackend {
    fn start(access: Box<dyn DiscAccess>, config: &ReaderConfig) -> Result<(Self, Toc), DiscError> {
        let cache = Arc::new(SectorCache::new(config.cache_slots));
        let commands = Arc::new(CommandChannel::new());
        let (event_tx, event_rx) = completion_channel();

        let engine = ReadAheadEngine::new(
            access,
            Arc::clone(&cache),
            Arc::clone(&commands),
            ReadAheadParams::from(config),
        );

        let handle = thread::Builder::new()
            .name("disc-reader".to_string())
            .spawn(move || engine.run(event_tx))
            .map_err(DiscError::ThreadSpawn)?;

        let failure = match event_rx.recv() {
            Ok(CompletionEvent::Ready(toc)) => {
                log::debug!("Disc reader thread started");
                let backend = Self {
                    cache,
                    commands,
                    reader_thread: Some(handle),
                    unrecoverable: false,
                };
                return Ok((backend, *toc));
            }
            Ok(CompletionEvent::FatalError(e)) => e,
            Err(_) => DiscError::ReaderExited,
        };

        // The thread has already returned or is about to; never leave it detached.
        if handle.join().is_err() {
            log::error!("Disc reader thread panicked during startup");
        }
        Err(failure)
    }

    fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> bool {
        if self.unrecoverable {
            buf.fill(0);
            return false;
        }

        if self.commands.send(Command::ReadHint(lba)).is_err() {
            self.mark_unrecoverable(lba);
            buf.fill(0);
            return false;
        }

        match self.cache.get_blocking(lba) {
            Some((data, error)) => {
                *buf = data;
                !error
            }
            None => {
                self.mark_unrecoverable(lba);
                buf.fill(0);
                false
            }
        }
    }

    fn hint(&self, lba: i32) {
        // Advisory only: a dead reader is noticed by the next blocking read.
        let _ = self.commands.send(Command::ReadHint(lba));
    }

    fn mark_unrecoverable(&mut self, lba: i32) {
        log::error!("Disc reader thread is gone; read of sector {} failed", lba);
        self.unrecoverable = true;
    }
}

impl Drop for ThreadedBackend {
    fn drop(&mut self) {
        if self.commands.send(Command::Shutdown).is_err() {
            log::debug!("Disc reader thread already stopped");
        }
        if let Some(handle) = self.reader_thread.take() {
            if handle.join().is_err() {
                log::error!("Disc reader thread panicked");
            }
        }
    }
}

enum Backend {
    Direct(DirectBackend),
    Threaded(ThreadedBackend),
}

/// Reader for a mounted disc image
pub struct DiscReader {
    toc: Toc,
    backend: Backend,
    validator: Box<dyn SectorValidator>,
}

impl DiscReader {
    /// Open a disc with the default configuration (threaded backend)
    pub fn open<A: DiscAccess + 'static>(access: A) -> Result<Self, DiscError> {
        Self::open_with_config(access, PassThroughValidator, &ReaderConfig::default())
    }

    /// Open a disc serviced synchronously on the caller's thread
    pub fn open_direct<A: DiscAccess + 'static>(access: A) -> Result<Self, DiscError> {
        let config = ReaderConfig {
            backend: BackendKind::Direct,
            ..ReaderConfig::default()
        };
        Self::open_with_config(access, PassThroughValidator, &config)
    }

    /// Open a disc serviced by a dedicated reader thread
    pub fn open_threaded<A: DiscAccess + 'static>(access: A) -> Result<Self, DiscError> {
        Self::open_with_config(access, PassThroughValidator, &ReaderConfig::default())
    }

    /// Open a disc with an explicit validator and configuration
    ///
    /// # Returns
    /// * `Ok(DiscReader)` - TOC read and validated, backend running
    /// * `Err(DiscError)` - Bad configuration, unreadable or malformed TOC, or
    ///   the reader thread could not be started
    pub fn open_with_config<A, V>(
        access: A,
        validator: V,
        config: &ReaderConfig,
    ) -> Result<Self, DiscError>
    where
        A: DiscAccess + 'static,
        V: SectorValidator + 'static,
    {
        config.validate()?;
        let mut access: Box<dyn DiscAccess> = Box::new(access);

        let kind = config.effective_backend();
        let (backend, toc) = match kind {
            BackendKind::Direct => {
                let toc = access.read_toc().map_err(DiscError::TocRead)?;
                toc.validate()?;
                (Backend::Direct(DirectBackend { access }), toc)
            }
            BackendKind::Threaded => {
                let (threaded, toc) = ThreadedBackend::start(access, config)?;
                (Backend::Threaded(threaded), toc)
            }
        };

        let (m, sec, f) = lba_to_msf(toc.leadout().lba);
        log::debug!(
            "Opened disc with {} backend: tracks {}-{}, type 0x{:02x}, lead-out at {:02}:{:02}:{:02}",
            kind.display_name(),
            toc.first_track,
            toc.last_track,
            toc.disc_type,
            m,
            sec,
            f
        );

        Ok(Self {
            toc,
            backend,
            validator: Box::new(validator),
        })
    }

    /// The disc Table of Contents, as read at open
    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    /// Which backend services this reader
    pub fn backend_kind(&self) -> BackendKind {
        match self.backend {
            Backend::Direct(_) => BackendKind::Direct,
            Backend::Threaded(_) => BackendKind::Threaded,
        }
    }

    /// Read the raw sector (payload + subchannel) at `lba` into `buf`
    ///
    /// Returns `false` with `buf` zero-filled if the LBA is out of range or the
    /// sector could not be read.
    pub fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> bool {
        if !lba_in_range(lba) {
            log::warn!("Attempt to read sector out of bounds; LBA={}", lba);
            buf.fill(0);
            return false;
        }

        match &mut self.backend {
            Backend::Direct(direct) => direct.read_raw_sector(lba, buf),
            Backend::Threaded(threaded) => threaded.read_raw_sector(lba, buf),
        }
    }

    /// Tell the reader that `lba` will be needed soon. Never blocks.
    pub fn hint(&self, lba: i32) {
        if !lba_in_range(lba) {
            return;
        }
        match &self.backend {
            Backend::Direct(_) => {}
            Backend::Threaded(threaded) => threaded.hint(lba),
        }
    }

    /// Read only the 96 subchannel bytes of the sector at `lba`
    ///
    /// With `hint_full_read`, `lba` itself is hinted for the full read of the
    /// same sector that follows, so that read continues the read-ahead window
    /// instead of restarting it.
    pub fn read_raw_pw_sector(
        &mut self,
        lba: i32,
        hint_full_read: bool,
        pw: &mut [u8; SUBCHANNEL_SIZE],
    ) -> bool {
        let mut raw = zeroed_sector();
        let ok = self.read_raw_sector(lba, &mut raw);
        pw.copy_from_slice(subchannel(&raw));
        if hint_full_read {
            self.hint(lba);
        }
        ok
    }

    /// Read `count` sectors of 2048-byte user data starting at `lba` into `out`
    ///
    /// Each sector decodes according to its own mode byte. Returns the mode of
    /// the first sector (1 or 2), or 0 if any sector fails to read, validate or
    /// decode.
    ///
    /// # Panics
    /// If `out` is shorter than `count * 2048` bytes.
    pub fn read_user_sectors(&mut self, lba: i32, count: u32, out: &mut [u8]) -> u8 {
        self.read_user_sectors_impl(lba, count, out, false)
    }

    /// Like [`read_user_sectors`](Self::read_user_sectors), but uncorrectable
    /// sectors are only logged at debug level
    pub fn read_user_sectors_quiet(&mut self, lba: i32, count: u32, out: &mut [u8]) -> u8 {
        self.read_user_sectors_impl(lba, count, out, true)
    }

    fn read_user_sectors_impl(&mut self, lba: i32, count: u32, out: &mut [u8], quiet: bool) -> u8 {
        let needed = count as usize * USER_DATA_SIZE;
        assert!(
            out.len() >= needed,
            "buffer of {} bytes cannot hold {} sectors",
            out.len(),
            count
        );

        let mut first_mode = 0;
        let mut raw = zeroed_sector();

        for (i, chunk) in out[..needed].chunks_exact_mut(USER_DATA_SIZE).enumerate() {
            let Some(sector_lba) = lba.checked_add(i as i32) else {
                return 0;
            };

            if !self.read_raw_sector(sector_lba, &mut raw) {
                log::warn!("Raw read error at {}", self.describe_lba(sector_lba));
                return 0;
            }

            if !self.validator.validate_and_correct(&mut raw) {
                if quiet {
                    log::debug!("Uncorrectable data at {}", self.describe_lba(sector_lba));
                } else {
                    log::warn!("Uncorrectable data at {}", self.describe_lba(sector_lba));
                }
                return 0;
            }

            let Some(mode) = decode_user_data(&raw, chunk) else {
                log::warn!("Invalid sector type at {}", self.describe_lba(sector_lba));
                return 0;
            };

            if first_mode == 0 {
                first_mode = mode.mode_byte();
            }
        }

        first_mode
    }

    /// Sector address with its track number, for log messages
    fn describe_lba(&self, lba: i32) -> String {
        match self.toc.find_track_by_lba(lba) {
            Some(track) => format!("sector {} (track {})", lba, track),
            None => format!("sector {} (lead-out)", lba),
        }
    }

    /// View `sector_count` sectors of user data starting at `lba` as a
    /// seekable byte stream
    pub fn as_stream(&mut self, lba: i32, sector_count: u32) -> SectorStream<'_> {
        SectorStream::new(self, lba, sector_count)
    }
}
