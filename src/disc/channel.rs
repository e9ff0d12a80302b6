//! Message passing between a consumer and its reader thread
//!
//! Commands flow consumer → reader through a [`CommandChannel`]; lifecycle
//! events flow back once, at startup, as a [`CompletionEvent`].

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::reader::DiscError;
use super::toc::Toc;

/// Consumer → reader thread request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop the reader thread after the current step
    Shutdown,
    /// The consumer is about to need this LBA
    ReadHint(i32),
}

/// Reader thread → consumer lifecycle event, sent once at startup
#[derive(Debug)]
pub enum CompletionEvent {
    /// TOC read and validated; the reader is servicing hints
    Ready(Box<Toc>),
    /// Startup failed; the reader thread has exited
    FatalError(DiscError),
}

/// The reader side of a command channel has gone away
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("reader thread is no longer accepting commands")]
pub struct ChannelClosed;

struct Queue {
    commands: VecDeque<Command>,
    closed: bool,
}

/// Thread-safe FIFO of [`Command`]s
pub struct CommandChannel {
    queue: Mutex<Queue>,
    available: Condvar,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Queue {
                commands: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a command for the reader thread
    pub fn send(&self, command: Command) -> Result<(), ChannelClosed> {
        let mut queue = self.lock();
        if queue.closed {
            return Err(ChannelClosed);
        }
        queue.commands.push_back(command);
        drop(queue);
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest command if one is pending
    pub fn try_recv(&self) -> Option<Command> {
        self.lock().commands.pop_front()
    }

    /// Block until a command is available
    pub fn recv(&self) -> Command {
        let mut queue = self.lock();
        loop {
            if let Some(command) = queue.commands.pop_front() {
                return command;
            }
            queue = self
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Refuse further sends; pending commands are discarded
    pub fn close(&self) {
        let mut queue = self.lock();
        queue.closed = true;
        queue.commands.clear();
    }

    /// Number of commands waiting
    pub fn len(&self) -> usize {
        self.lock().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create the one-shot startup event channel
pub fn completion_channel() -> (Sender<CompletionEvent>, Receiver<CompletionEvent>) {
    mpsc::channel()
}
