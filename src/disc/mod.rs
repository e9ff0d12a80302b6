//! Disc image access module
//!
//! Supplies raw and decoded CD sectors from a [`DiscAccess`] either through a
//! dedicated reader thread with adaptive read-ahead or synchronously.

mod access;
mod cache;
mod channel;
mod read_ahead;
mod reader;
mod sector;
mod stream;
mod toc;

#[cfg(test)]
mod testutil;

pub use access::{DiscAccess, PassThroughValidator, RawImageAccess, SectorValidator};
pub use cache::SectorCache;
pub use channel::{ChannelClosed, Command, CommandChannel, CompletionEvent};
pub use read_ahead::{ReadAheadEngine, ReadAheadParams, ReadAheadState};
pub use reader::{DiscError, DiscReader};
pub use sector::{
    decode_user_data, lba_in_range, payload, subchannel, zeroed_sector, RawSector, SectorMode,
    LBA_READ_MAX, LBA_READ_MIN, RAW_SECTOR_SIZE, RAW_SECTOR_WITH_SUBCHANNEL, SUBCHANNEL_SIZE,
    USER_DATA_SIZE,
};
pub use stream::SectorStream;
pub use toc::{lba_to_msf, Toc, TocTrack, LEADOUT_INDEX, MAX_TRACK};
