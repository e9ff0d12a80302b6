//! Adaptive read-ahead, run on the reader thread
//!
//! The engine alternates between taking at most one command and reading at
//! most one sector into the [`SectorCache`]. Sequential requests widen the
//! prefetch window up to `max_ahead` sectors past the latest request; any
//! other request restarts it at the requested LBA.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::access::{read_or_zero_fill, DiscAccess};
use super::cache::SectorCache;
use super::channel::{Command, CommandChannel, CompletionEvent};
use super::reader::DiscError;
use super::sector::{zeroed_sector, LBA_READ_MAX};
use crate::config::ReaderConfig;

/// Read-ahead window tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAheadParams {
    /// Maximum distance the cursor may run past the latest request
    pub max_ahead: u32,
    /// Sectors queued after a seek
    pub initial_ahead: u32,
    /// Sectors queued per sequential request while under the limit
    pub step: u32,
}

impl Default for ReadAheadParams {
    fn default() -> Self {
        Self::from(&ReaderConfig::default())
    }
}

impl From<&ReaderConfig> for ReadAheadParams {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            max_ahead: config.max_read_ahead,
            initial_ahead: config.initial_read_ahead,
            step: config.read_ahead_step,
        }
    }
}

/// Prefetch cursor state, owned by the reader thread alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadAheadState {
    /// Next LBA to prefetch
    cursor: i32,
    /// Sectors left to prefetch
    remaining: u32,
    /// LBA of the most recent hint
    last_requested: Option<i32>,
}

impl ReadAheadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> i32 {
        self.cursor
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn last_requested(&self) -> Option<i32> {
        self.last_requested
    }

    /// Adjust the window for a consumer request at `lba`
    pub fn on_hint(&mut self, lba: i32, params: &ReadAheadParams) {
        let sequential = self
            .last_requested
            .and_then(|last| last.checked_add(1))
            .is_some_and(|next| next == lba);

        if sequential {
            if self.cursor < lba {
                // Prefetch fell behind the requests; never leave `lba` unread.
                self.cursor = lba;
            }
            let gap = (self.cursor - lba) as u32;
            if gap <= params.max_ahead {
                self.remaining = params.step.min(1 + params.max_ahead - gap);
            } else {
                self.remaining = (self.remaining + 1).min(params.max_ahead + 1);
            }
        } else if self.last_requested != Some(lba) {
            self.cursor = lba;
            self.remaining = params.initial_ahead;
        }

        self.last_requested = Some(lba);
        self.clamp_to_disc_end();

        log::trace!(
            "Hint {}: cursor={} remaining={}",
            lba,
            self.cursor,
            self.remaining
        );
    }

    /// Take the next LBA to prefetch, advancing the cursor
    pub fn next_read(&mut self) -> Option<i32> {
        self.clamp_to_disc_end();
        if self.remaining == 0 {
            return None;
        }

        let lba = self.cursor;
        self.cursor += 1;
        self.remaining -= 1;
        Some(lba)
    }

    fn clamp_to_disc_end(&mut self) {
        if self.cursor > LBA_READ_MAX {
            self.remaining = 0;
        }
    }
}

/// Body of the reader thread
pub struct ReadAheadEngine<A: DiscAccess> {
    access: A,
    cache: Arc<SectorCache>,
    commands: Arc<CommandChannel>,
    params: ReadAheadParams,
    state: ReadAheadState,
}

/// Closes both shared endpoints when the reader stops, including by panic,
/// so a consumer can never wait on a thread that is gone.
struct ExitGuard {
    cache: Arc<SectorCache>,
    commands: Arc<CommandChannel>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.commands.close();
        self.cache.close();
        log::debug!("Disc reader thread stopped");
    }
}

impl<A: DiscAccess> ReadAheadEngine<A> {
    pub fn new(
        access: A,
        cache: Arc<SectorCache>,
        commands: Arc<CommandChannel>,
        params: ReadAheadParams,
    ) -> Self {
        Self {
            access,
            cache,
            commands,
            params,
            state: ReadAheadState::new(),
        }
    }

    /// Read and validate the TOC, report the outcome, then service commands
    /// until shutdown
    pub fn run(mut self, events: Sender<CompletionEvent>) {
        let _guard = ExitGuard {
            cache: Arc::clone(&self.cache),
            commands: Arc::clone(&self.commands),
        };

        let startup = self
            .access
            .read_toc()
            .map_err(DiscError::TocRead)
            .and_then(|toc| toc.validate().map(|()| toc));

        match startup {
            Ok(toc) => {
                if events.send(CompletionEvent::Ready(Box::new(toc))).is_err() {
                    return;
                }
            }
            Err(e) => {
                log::error!("Disc reader startup failed: {}", e);
                let _ = events.send(CompletionEvent::FatalError(e));
                return;
            }
        }
        drop(events);

        while self.step() {}
    }

    /// One iteration: take a command (blocking only when idle), then
    /// prefetch at most one sector. Returns `false` on shutdown.
    fn step(&mut self) -> bool {
        let command = if self.state.remaining() > 0 {
            self.commands.try_recv()
        } else {
            Some(self.commands.recv())
        };

        match command {
            Some(Command::Shutdown) => return false,
            Some(Command::ReadHint(lba)) => self.state.on_hint(lba, &self.params),
            None => {}
        }

        if let Some(lba) = self.state.next_read() {
            let mut buf = zeroed_sector();
            let ok = read_or_zero_fill(&mut self.access, lba, &mut buf);
            self.cache.put(lba, &buf, !ok);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::channel::{completion_channel, ChannelClosed};
    use crate::disc::testutil::{expected_sector, StubAccess};
    use crate::disc::toc::Toc;
    use crate::disc::sector::LBA_READ_MIN;
    use proptest::prelude::*;

    const PARAMS: ReadAheadParams = ReadAheadParams {
        max_ahead: 16,
        initial_ahead: 1,
        step: 2,
    };

    #[test]
    fn test_seek_resets_window() {
        let mut state = ReadAheadState::new();
        state.on_hint(100, &PARAMS);
        assert_eq!(state.cursor(), 100);
        assert_eq!(state.remaining(), 1);
        assert_eq!(state.last_requested(), Some(100));

        assert_eq!(state.next_read(), Some(100));
        state.on_hint(5000, &PARAMS);
        assert_eq!(state.cursor(), 5000);
        assert_eq!(state.remaining(), 1);
    }

    #[test]
    fn test_sequential_hints_widen_window() {
        let mut state = ReadAheadState::new();
        state.on_hint(0, &PARAMS);
        assert_eq!(state.next_read(), Some(0));

        state.on_hint(1, &PARAMS);
        assert_eq!(state.remaining(), 2);
        assert_eq!(state.next_read(), Some(1));
        assert_eq!(state.next_read(), Some(2));
        assert_eq!(state.next_read(), None);
    }

    #[test]
    fn test_repeat_hint_is_idempotent() {
        let mut state = ReadAheadState::new();
        state.on_hint(20, &PARAMS);
        state.next_read();
        state.on_hint(21, &PARAMS);

        let once = state;
        state.on_hint(21, &PARAMS);
        assert_eq!(state, once);
    }

    fn params_strategy() -> impl Strategy<Value = ReadAheadParams> {
        (1u32..=32).prop_flat_map(|max_ahead| {
            (1..=max_ahead + 1, 1..=max_ahead + 1).prop_map(move |(initial_ahead, step)| {
                ReadAheadParams {
                    max_ahead,
                    initial_ahead,
                    step,
                }
            })
        })
    }

    #[derive(Debug, Clone)]
    enum Request {
        Next,
        Repeat,
        Seek(i32),
    }

    /// A consumer request plus how many prefetch reads happen after it
    fn request_strategy() -> impl Strategy<Value = (Request, u8)> {
        (
            prop_oneof![
                6 => Just(Request::Next),
                1 => Just(Request::Repeat),
                1 => (LBA_READ_MIN..=LBA_READ_MAX).prop_map(Request::Seek),
            ],
            0u8..=20,
        )
    }

    proptest! {
        #[test]
        fn test_window_bounded_for_any_requests(
            params in params_strategy(),
            requests in prop::collection::vec(request_strategy(), 1..500),
        ) {
            let mut state = ReadAheadState::new();
            let mut last = 0;
            for (request, reads) in requests {
                let lba = match request {
                    Request::Next => (last + 1).min(LBA_READ_MAX),
                    Request::Repeat => last,
                    Request::Seek(lba) => lba,
                };
                state.on_hint(lba, &params);
                last = lba;

                let limit = lba as i64 + params.max_ahead as i64 + 1;
                prop_assert!(state.remaining() <= params.max_ahead + 1);
                prop_assert!(state.cursor() as i64 + state.remaining() as i64 <= limit);

                for _ in 0..reads {
                    match state.next_read() {
                        Some(read) => prop_assert!((read as i64) < limit),
                        None => break,
                    }
                }
            }
        }
    }

    #[test]
    fn test_window_saturates_at_max_ahead() {
        let mut state = ReadAheadState::new();
        let mut max_lead = 0;
        for lba in 0..200 {
            state.on_hint(lba, &PARAMS);
            while state.next_read().is_some() {}
            max_lead = max_lead.max(state.cursor() - lba);
        }
        assert_eq!(max_lead, PARAMS.max_ahead as i32 + 1);
    }

    #[test]
    fn test_lagging_cursor_jumps_to_request() {
        let mut state = ReadAheadState::new();
        state.on_hint(0, &PARAMS);
        state.on_hint(1, &PARAMS);
        state.on_hint(2, &PARAMS);
        state.on_hint(3, &PARAMS);
        assert!(state.cursor() <= 3);
        let reads: Vec<i32> = std::iter::from_fn(|| state.next_read()).collect();
        assert!(reads.contains(&3));
    }

    #[test]
    fn test_clamped_at_disc_end() {
        let mut state = ReadAheadState::new();
        state.on_hint(LBA_READ_MAX - 1, &PARAMS);
        assert_eq!(state.next_read(), Some(LBA_READ_MAX - 1));
        state.on_hint(LBA_READ_MAX, &PARAMS);
        assert_eq!(state.next_read(), Some(LBA_READ_MAX));
        assert_eq!(state.next_read(), None);
        assert_eq!(state.remaining(), 0);
    }

    fn engine_for(
        access: StubAccess,
        params: ReadAheadParams,
    ) -> (ReadAheadEngine<StubAccess>, Arc<SectorCache>, Arc<CommandChannel>) {
        let cache = Arc::new(SectorCache::new(256));
        let commands = Arc::new(CommandChannel::new());
        let engine = ReadAheadEngine::new(access, Arc::clone(&cache), Arc::clone(&commands), params);
        (engine, cache, commands)
    }

    #[test]
    fn test_shutdown_preempts_pending_prefetch() {
        let access = StubAccess::new();
        let reads = access.read_counter();
        let params = ReadAheadParams {
            max_ahead: 60,
            initial_ahead: 50,
            step: 2,
        };
        let (engine, cache, commands) = engine_for(access, params);

        commands.send(Command::ReadHint(0)).unwrap();
        commands.send(Command::Shutdown).unwrap();

        let (tx, rx) = completion_channel();
        engine.run(tx);

        assert!(matches!(rx.recv(), Ok(CompletionEvent::Ready(_))));
        assert_eq!(reads.get(), 1);
        assert_eq!(cache.try_get(0).unwrap().0, expected_sector(0));
        assert!(cache.is_closed());
        assert_eq!(commands.send(Command::ReadHint(1)), Err(ChannelClosed));
    }

    #[test]
    fn test_failed_read_is_flagged_and_zeroed() {
        let access = StubAccess::new().failing_when(|lba| lba == 7);
        let (engine, cache, commands) = engine_for(access, PARAMS);

        commands.send(Command::ReadHint(6)).unwrap();
        commands.send(Command::ReadHint(7)).unwrap();
        commands.send(Command::ReadHint(8)).unwrap();
        commands.send(Command::Shutdown).unwrap();

        let (tx, _rx) = completion_channel();
        engine.run(tx);

        let (data, error) = cache.try_get(7).unwrap();
        assert!(error);
        assert!(data.iter().all(|&b| b == 0));

        let (data, error) = cache.try_get(8).unwrap();
        assert!(!error);
        assert_eq!(data, expected_sector(8));
    }

    #[test]
    fn test_bad_toc_is_fatal() {
        let mut toc = Toc::from_tracks(&[(0, true)], 1000).unwrap();
        toc.first_track = 3;
        toc.last_track = 2;
        let access = StubAccess::new().with_toc(toc);
        let reads = access.read_counter();
        let (engine, cache, commands) = engine_for(access, PARAMS);

        let (tx, rx) = completion_channel();
        engine.run(tx);

        assert!(matches!(
            rx.recv(),
            Ok(CompletionEvent::FatalError(DiscError::BadToc { first_track: 3, last_track: 2 }))
        ));
        assert_eq!(reads.get(), 0);
        assert!(cache.is_closed());
        assert!(commands.send(Command::Shutdown).is_err());
    }
}
