//! showfill: fills a radio show's time slot from a pool of audio items.
//!
//! The composer (see [`assembler`]) draws items by weighted category or mood,
//! fits them to the show length, spreads artists and sweepers apart and
//! emits a formatted playlist. The CLI in `main.rs` wires it to config,
//! library and playlist files.

pub mod assembler;
pub mod category;
pub mod config;
pub mod duration;
pub mod error;
pub mod fit;
pub mod interleave;
pub mod item;
pub mod library;
pub mod playlist;
pub mod shuffle;
pub mod store;
pub mod timecode;

pub use error::{Error, Result};
