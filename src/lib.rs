//! Extraction of the songs packed in Dynamix MUS containers.
//!
//! A MUS container starts with a table of absolute song offsets,
//! and each song is a small header followed by a raw MIDI event stream.
//! This crate reads the container and re-wraps each song
//! as a single-track Standard MIDI File.
//! A quick overview of the modules:
//!
//! - `mus`: the MUS container (table of contents and song headers)
//! - `smf`: [Standard MIDI File][smf] (format 0) header synthesis
//! - `extract`: writing every song of a container to its own MIDI file
//!   (requires the `std` feature)
//!
//! [smf]: https://www.midi.org/specifications/file-format-specifications/standard-midi-files
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub(crate) mod data_types;
#[cfg(feature = "std")]
pub mod extract;
pub mod mus;
pub mod smf;

#[cfg(feature = "std")]
pub use crate::extract::{extract_all, output_path, ExtractReport, Policy};
pub use crate::mus::{Error as MusError, Mus, ParseError, SongHeader, SongInfo, SubSong};
pub use crate::smf::{Error as SmfError, MidiFile, MidiHeader};
