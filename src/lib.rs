//! ODE Disc I/O Library
//!
//! Asynchronous disc image access for emulated optical drives: raw sector
//! reads with read-ahead on a background thread, or direct synchronous reads,
//! behind one interface.

pub mod config;
pub mod disc;

pub use config::{BackendKind, ReaderConfig};
pub use disc::{DiscAccess, DiscError, DiscReader, SectorStream, SectorValidator, Toc};
