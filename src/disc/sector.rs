//! Raw CD sector layout
//!
//! A raw sector as delivered by a [`DiscAccess`](super::DiscAccess) is 2352
//! payload bytes followed by 96 bytes of subchannel data. For data sectors the
//! payload starts with a 12-byte sync pattern and a 4-byte header whose last
//! byte is the mode; the 2048 bytes of user data follow the header (Mode 1) or
//! the 8-byte subheader (Mode 2 Form 1).

/// Raw CD-ROM sector payload size
pub const RAW_SECTOR_SIZE: usize = 2352;

/// Subchannel bytes stored after each raw payload
pub const SUBCHANNEL_SIZE: usize = 96;

/// Raw sector plus subchannel data (2448 bytes)
pub const RAW_SECTOR_WITH_SUBCHANNEL: usize = RAW_SECTOR_SIZE + SUBCHANNEL_SIZE;

/// Logical sector size for CD-ROM data (cooked)
pub const USER_DATA_SIZE: usize = 2048;

/// Lowest readable LBA (start of the 2-second pregap)
pub const LBA_READ_MIN: i32 = -150;

/// Highest readable LBA (99:59:74 minus the pregap)
pub const LBA_READ_MAX: i32 = 449_849;

/// Offset of the mode byte within the raw payload (12 sync + 3 address bytes)
const MODE_BYTE_OFFSET: usize = 15;

/// Offset to user data in a raw Mode 1 sector
const MODE1_DATA_OFFSET: usize = 16;

/// Offset to user data in a raw Mode 2 Form 1 sector (header + subheader)
const MODE2_FORM1_DATA_OFFSET: usize = 24;

/// One raw sector: payload followed by subchannel bytes
pub type RawSector = [u8; RAW_SECTOR_WITH_SUBCHANNEL];

/// A zero-filled raw sector, used for every failed read
pub fn zeroed_sector() -> RawSector {
    [0u8; RAW_SECTOR_WITH_SUBCHANNEL]
}

/// Check whether an LBA can be read at all
pub fn lba_in_range(lba: i32) -> bool {
    (LBA_READ_MIN..=LBA_READ_MAX).contains(&lba)
}

/// The 2352-byte payload part of a raw sector
pub fn payload(sector: &RawSector) -> &[u8] {
    &sector[..RAW_SECTOR_SIZE]
}

/// The 96-byte subchannel part of a raw sector
pub fn subchannel(sector: &RawSector) -> &[u8] {
    &sector[RAW_SECTOR_SIZE..]
}

/// Data sector formats that carry 2048 bytes of user data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorMode {
    /// CD-ROM Mode 1
    Mode1,
    /// CD-ROM XA Mode 2 Form 1
    Mode2Form1,
}

impl SectorMode {
    /// Detect the sector mode from the header mode byte
    pub fn from_sector(sector: &RawSector) -> Option<Self> {
        match sector[MODE_BYTE_OFFSET] {
            0x01 => Some(Self::Mode1),
            0x02 => Some(Self::Mode2Form1),
            _ => None,
        }
    }

    /// The raw mode byte value
    pub fn mode_byte(&self) -> u8 {
        match self {
            Self::Mode1 => 0x01,
            Self::Mode2Form1 => 0x02,
        }
    }

    /// Offset within the raw payload where user data starts
    pub fn user_data_offset(&self) -> usize {
        match self {
            Self::Mode1 => MODE1_DATA_OFFSET,
            Self::Mode2Form1 => MODE2_FORM1_DATA_OFFSET,
        }
    }
}

/// Copy the 2048 bytes of user data out of a raw sector
///
/// Returns the detected mode, or `None` (leaving `out` untouched) if the mode
/// byte is not a 2048-byte data format.
pub fn decode_user_data(sector: &RawSector, out: &mut [u8]) -> Option<SectorMode> {
    let mode = SectorMode::from_sector(sector)?;
    let start = mode.user_data_offset();
    out[..USER_DATA_SIZE].copy_from_slice(&payload(sector)[start..start + USER_DATA_SIZE]);
    Some(mode)
}
