//! Fixed-capacity sector cache shared between the reader thread and consumers
//!
//! Slots are overwritten in ring order rather than by recency of use: access is
//! overwhelmingly sequential, so the oldest write is also the least useful one.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::sector::{zeroed_sector, RawSector};

/// One cached raw sector
struct CacheSlot {
    /// LBA held by this slot, `None` until first written
    lba: Option<i32>,
    data: RawSector,
    /// The read failed; `data` is zero-filled
    error: bool,
}

struct CacheState {
    slots: Vec<CacheSlot>,
    /// Next slot to overwrite
    write_pos: usize,
    /// No further sectors will be published
    closed: bool,
}

/// Ring buffer of raw sectors keyed by LBA
pub struct SectorCache {
    state: Mutex<CacheState>,
    published: Condvar,
}

impl SectorCache {
    /// Create a cache with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| CacheSlot {
                lba: None,
                data: zeroed_sector(),
                error: false,
            })
            .collect();

        Self {
            state: Mutex::new(CacheState {
                slots,
                write_pos: 0,
                closed: false,
            }),
            published: Condvar::new(),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    // Every mutation is a whole-slot copy, so a panicking holder cannot leave a
    // slot half-written in a way readers would observe as valid.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a sector at the write cursor and wake every waiter
    pub fn put(&self, lba: i32, data: &RawSector, error: bool) {
        let mut state = self.lock();
        let pos = state.write_pos;
        let slot = &mut state.slots[pos];
        slot.lba = Some(lba);
        slot.data.copy_from_slice(data);
        slot.error = error;
        state.write_pos = (pos + 1) % state.slots.len();
        drop(state);

        // Waiters want arbitrary LBAs, so wake all of them.
        self.published.notify_all();
    }

    /// Look up `lba` without blocking, returning a copy of the data and its error flag
    pub fn try_get(&self, lba: i32) -> Option<(RawSector, bool)> {
        Self::find(&self.lock(), lba)
    }

    /// Wait until `lba` has been published
    ///
    /// Returns `None` only if the cache was closed before the sector showed up.
    pub fn get_blocking(&self, lba: i32) -> Option<(RawSector, bool)> {
        let mut state = self.lock();
        loop {
            if let Some(found) = Self::find(&state, lba) {
                return Some(found);
            }
            if state.closed {
                return None;
            }
            state = self
                .published
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stop accepting waiters; anyone blocked on a missing sector is released
    pub fn close(&self) {
        self.lock().closed = true;
        self.published.notify_all();
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Scan newest to oldest so the most recent write for an LBA wins
    fn find(state: &CacheState, lba: i32) -> Option<(RawSector, bool)> {
        let len = state.slots.len();
        (1..=len)
            .map(|back| &state.slots[(state.write_pos + len - back) % len])
            .find(|slot| slot.lba == Some(lba))
            .map(|slot| (slot.data, slot.error))
    }
}
