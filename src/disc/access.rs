//! Downstream collaborator traits and a raw image implementation
//!
//! [`DiscAccess`] is the synchronous, possibly slow source of raw sectors
//! (image files, archives, physical drives). [`SectorValidator`] checks and
//! repairs a raw data sector before its user data is trusted.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::sector::{RawSector, SectorMode, RAW_SECTOR_SIZE, RAW_SECTOR_WITH_SUBCHANNEL};
use super::toc::Toc;

/// Trait for reading raw sectors and the TOC from a mounted disc image
///
/// Implementations are driven by exactly one thread at a time: either the
/// reader thread of a threaded [`DiscReader`](super::DiscReader) or the caller
/// of a direct one.
pub trait DiscAccess: Send {
    /// Read the 2352 + 96 byte raw sector at `lba` into `buf`
    fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> io::Result<()>;

    /// Read the disc Table of Contents
    fn read_toc(&mut self) -> io::Result<Toc>;
}

impl<A: DiscAccess + ?Sized> DiscAccess for Box<A> {
    fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> io::Result<()> {
        (**self).read_raw_sector(lba, buf)
    }

    fn read_toc(&mut self) -> io::Result<Toc> {
        (**self).read_toc()
    }
}

/// Read one sector, zero-filling `buf` if the access fails
///
/// Returns `true` on success. A failing sector is logged and reported only
/// through the return value so playback can continue past it.
pub(crate) fn read_or_zero_fill<A: DiscAccess + ?Sized>(
    access: &mut A,
    lba: i32,
    buf: &mut RawSector,
) -> bool {
    match access.read_raw_sector(lba, buf) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Sector {} read error: {}", lba, e);
            buf.fill(0);
            false
        }
    }
}

/// Trait for EDC/ECC validation of raw data sectors
pub trait SectorValidator: Send {
    /// Validate `sector`, correcting it in place where possible
    ///
    /// Returns `false` if the sector is uncorrectable.
    fn validate_and_correct(&self, sector: &mut RawSector) -> bool;
}

impl<F> SectorValidator for F
where
    F: Fn(&mut RawSector) -> bool + Send,
{
    fn validate_and_correct(&self, sector: &mut RawSector) -> bool {
        self(sector)
    }
}

/// Validator that accepts every Mode 1 / Mode 2 sector as-is
///
/// Suitable for images whose EDC/ECC fields were never populated (cooked
/// images expanded to raw sectors).
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughValidator;

impl SectorValidator for PassThroughValidator {
    fn validate_and_correct(&self, sector: &mut RawSector) -> bool {
        SectorMode::from_sector(sector).is_some()
    }
}

/// Disc access for a single-track raw image file
///
/// Sectors are either 2352 bytes (plain raw `.bin`) or 2448 bytes (raw with
/// interleaved subchannel). LBA 0 is the first sector in the file.
pub struct RawImageAccess {
    file: BufReader<File>,
    /// Bytes per sector in the file
    stride: u64,
    /// Number of whole sectors in the file
    sector_count: u64,
}

impl RawImageAccess {
    /// Open a raw image, picking the sector stride from the file length
    pub fn open(path: &Path) -> Result<Self, io::Error> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let stride = if len > 0 && len % RAW_SECTOR_WITH_SUBCHANNEL as u64 == 0 {
            RAW_SECTOR_WITH_SUBCHANNEL as u64
        } else {
            RAW_SECTOR_SIZE as u64
        };
        let sector_count = len / stride;

        log::debug!(
            "Opened raw image {}: {} sectors of {} bytes",
            path.display(),
            sector_count,
            stride
        );

        Ok(Self {
            file: BufReader::new(file),
            stride,
            sector_count,
        })
    }

    /// Number of sectors in the image
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Bytes per sector in the backing file
    pub fn stride(&self) -> u64 {
        self.stride
    }
}

impl DiscAccess for RawImageAccess {
    fn read_raw_sector(&mut self, lba: i32, buf: &mut RawSector) -> io::Result<()> {
        if lba < 0 || lba as u64 >= self.sector_count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("LBA {} outside image of {} sectors", lba, self.sector_count),
            ));
        }

        self.file.seek(SeekFrom::Start(lba as u64 * self.stride))?;
        let stored = self.stride as usize;
        self.file.read_exact(&mut buf[..stored])?;
        buf[stored..].fill(0);
        Ok(())
    }

    fn read_toc(&mut self) -> io::Result<Toc> {
        let leadout = i32::try_from(self.sector_count).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "image too large for a CD")
        })?;
        Toc::from_tracks(&[(0, true)], leadout)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty track list"))
    }
}
