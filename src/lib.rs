//! jdelta: streaming binary deltas with bounded-window resynchronization.
//!
//! The crate provides:
//! - Byte cursors over memory, seekable files and forward-only streams (`cursor`)
//! - The greedy matcher producing Copy/Insert spans (`matcher`)
//! - The patch format encoder/decoder (`format`) and the applier (`applier`)
//! - High-level `diff` / `apply` entry points (`engine`)
//! - Threaded read-ahead / write-behind adapters (`pipeline`)
//! - File-oriented helpers with atomic output (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use jdelta::{Config, apply, diff};
//!
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! let patch = diff(old, new, &Config::default()).unwrap();
//! let rebuilt = apply(old, &patch).unwrap();
//! assert_eq!(rebuilt, new);
//! ```

pub mod applier;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod format;
pub mod io;
pub mod matcher;
pub mod pipeline;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::{Config, config_for_level};
pub use engine::{ApplyError, DiffError, apply, diff};
