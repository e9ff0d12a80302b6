//! Byte stream view over a window of decoded user sectors

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::reader::DiscReader;
use super::sector::USER_DATA_SIZE;

const SECTOR_BYTES: u64 = USER_DATA_SIZE as u64;

/// Read-only, seekable stream over `sector_count` sectors of 2048-byte user
/// data starting at `start_lba`
pub struct SectorStream<'a> {
    reader: &'a mut DiscReader,
    start_lba: i32,
    sector_count: u32,
    position: u64,
}

impl<'a> SectorStream<'a> {
    pub fn new(reader: &'a mut DiscReader, start_lba: i32, sector_count: u32) -> Self {
        Self {
            reader,
            start_lba,
            sector_count,
            position: 0,
        }
    }

    /// Total length of the stream in bytes
    pub fn size(&self) -> u64 {
        self.sector_count as u64 * SECTOR_BYTES
    }

    /// Current byte position
    pub fn tell(&self) -> u64 {
        self.position
    }

    fn sector_lba(&self, position: u64) -> io::Result<i32> {
        let lba = self.start_lba as i64 + (position / SECTOR_BYTES) as i64;
        i32::try_from(lba).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("LBA {} overflows", lba))
        })
    }
}

impl Read for SectorStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.size() - self.position;
        let count = (buf.len() as u64).min(available) as usize;
        if count == 0 {
            return Ok(0);
        }

        let mut sector = [0u8; USER_DATA_SIZE];
        let mut done = 0;

        while done < count {
            let pos = self.position + done as u64;
            let lba = self.sector_lba(pos)?;
            let offset = (pos % SECTOR_BYTES) as usize;
            let len = (USER_DATA_SIZE - offset).min(count - done);

            if self.reader.read_user_sectors(lba, 1, &mut sector) == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("Failed to read sector {}", lba),
                ));
            }

            buf[done..done + len].copy_from_slice(&sector[offset..offset + len]);
            done += len;
        }

        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for SectorStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.size() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
            SeekFrom::End(offset) => size + offset as i128,
        };

        if target < 0 || target > size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Seek to {} outside stream of {} bytes", target, size),
            ));
        }

        self.position = target as u64;
        Ok(self.position)
    }
}

impl Write for SectorStream<'_> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "sector stream is read-only",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
