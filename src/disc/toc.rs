//! Table of Contents (TOC) model
//!
//! Track start addresses as reported by a [`DiscAccess`](super::DiscAccess),
//! plus LBA to MSF conversion for display.

use super::reader::DiscError;

/// Frames per second (CD audio)
const FRAMES_PER_SECOND: u32 = 75;

/// Frames in the 2-second pregap preceding LBA 0
const PREGAP_FRAMES: i32 = 150;

/// Index of the lead-out entry in [`Toc::tracks`]
pub const LEADOUT_INDEX: usize = 100;

/// Highest legal track number
pub const MAX_TRACK: u8 = 99;

/// A single TOC entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TocTrack {
    /// Whether this track number is present on the disc
    pub valid: bool,
    /// Start address of the track (INDEX 01)
    pub lba: i32,
    /// Data track (as opposed to audio)
    pub is_data: bool,
}

/// Disc Table of Contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toc {
    /// First track number (usually 1)
    pub first_track: u8,
    /// Last track number
    pub last_track: u8,
    /// Session format byte (0x00 CD-DA/CD-ROM, 0x10 CD-i, 0x20 CD-ROM XA)
    pub disc_type: u8,
    /// Tracks indexed by track number; index 100 is the lead-out
    pub tracks: [TocTrack; LEADOUT_INDEX + 1],
}

impl Default for Toc {
    fn default() -> Self {
        Self {
            first_track: 0,
            last_track: 0,
            disc_type: 0,
            tracks: [TocTrack::default(); LEADOUT_INDEX + 1],
        }
    }
}

impl Toc {
    /// Build a single-session TOC from `(lba, is_data)` pairs for tracks
    /// 1..=n and the lead-out address
    pub fn from_tracks(tracks: &[(i32, bool)], leadout_lba: i32) -> Option<Self> {
        if tracks.is_empty() || tracks.len() > MAX_TRACK as usize {
            return None;
        }

        let mut toc = Self {
            first_track: 1,
            last_track: tracks.len() as u8,
            ..Self::default()
        };

        for (i, &(lba, is_data)) in tracks.iter().enumerate() {
            toc.tracks[i + 1] = TocTrack { valid: true, lba, is_data };
        }
        toc.tracks[LEADOUT_INDEX] = TocTrack {
            valid: true,
            lba: leadout_lba,
            is_data: tracks.last()?.1,
        };

        Some(toc)
    }

    /// Check the track number range
    ///
    /// A TOC whose first/last track numbers fall outside 1..=99, or whose first
    /// track is after its last, cannot describe a real disc.
    pub fn validate(&self) -> Result<(), DiscError> {
        let in_range = |t: u8| (1..=MAX_TRACK).contains(&t);

        if !in_range(self.first_track)
            || !in_range(self.last_track)
            || self.first_track > self.last_track
        {
            return Err(DiscError::BadToc {
                first_track: self.first_track,
                last_track: self.last_track,
            });
        }
        Ok(())
    }

    /// Get number of tracks
    pub fn track_count(&self) -> u8 {
        self.last_track.saturating_sub(self.first_track) + 1
    }

    /// The lead-out entry
    pub fn leadout(&self) -> &TocTrack {
        &self.tracks[LEADOUT_INDEX]
    }

    /// Look up a track by number, if present
    pub fn track(&self, number: u8) -> Option<&TocTrack> {
        if number < self.first_track || number > self.last_track {
            return None;
        }
        self.tracks.get(number as usize).filter(|t| t.valid)
    }

    /// Find the track containing `lba`
    ///
    /// Addresses before the first track resolve to the first track (pregap);
    /// addresses at or past the lead-out resolve to `None`.
    pub fn find_track_by_lba(&self, lba: i32) -> Option<u8> {
        if self.validate().is_err() || lba >= self.leadout().lba {
            return None;
        }

        let mut found = None;
        for number in self.first_track..=self.last_track {
            let track = &self.tracks[number as usize];
            if !track.valid {
                continue;
            }
            if found.is_none() || track.lba <= lba {
                found = Some(number);
            }
            if track.lba > lba {
                break;
            }
        }
        found
    }
}

/// Convert an LBA to absolute (minutes, seconds, frames)
pub fn lba_to_msf(lba: i32) -> (u8, u8, u8) {
    let frames = lba.saturating_add(PREGAP_FRAMES).max(0) as u32;
    let f = frames % FRAMES_PER_SECOND;
    let s = (frames / FRAMES_PER_SECOND) % 60;
    let m = frames / FRAMES_PER_SECOND / 60;
    (m.min(u8::MAX as u32) as u8, s as u8, f as u8)
}
