//! Implementation of the Dynamix MUS song container.
//!
//! A MUS file has no signature.
//! It starts with a table of contents of little endian `u32` absolute offsets,
//! one per song, and the table ends where the first song begins.
//! Each song is an 8 byte [`SongHeader`]
//! followed by the raw MIDI event stream of the song.

use core::fmt;

use snafu::{OptionExt as _, Snafu};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use snafu::ResultExt;

#[cfg(feature = "std")]
use std::path::Path;

use crate::data_types::{le_u16, le_u32};
use crate::smf::{MidiFile, MidiHeader};

/// An error reading or parsing a MUS file
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[cfg(feature = "std")]
pub enum Error {
    /// Failed to read the file
    ReadFile { source: std::io::Error },
    /// Failed to parse MUS data
    ParseMus { source: ParseError },
}

/// An error reading or parsing a MUS file
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[cfg(not(feature = "std"))]
pub enum Error {
    /// Failed to parse MUS data
    ParseMus { source: ParseError },
}

#[derive(Debug, PartialEq, Snafu)]
#[non_exhaustive]
pub enum ParseError {
    /// Insufficient bytes to read the table of contents entry at {position:#06X}
    TruncatedToc { position: usize },
    /// Song #{index} at {offset:#06X} is out of bounds (container has {len} bytes)
    InvalidOffset { index: usize, offset: u32, len: usize },
    /// Song #{index} at {offset:#06X} declares size {size}, smaller than its own header
    CorruptHeader { index: usize, offset: u32, size: u16 },
    /// Song #{index} at {offset:#06X} is truncated: expected {expected} payload bytes, {available} available
    TruncatedPayload {
        index: usize,
        offset: u32,
        expected: usize,
        available: usize,
    },
}

/// Read the table of contents at the start of a MUS container.
///
/// Entries are read until the read position reaches
/// the smallest offset seen so far,
/// which is where the first song begins.
/// The offsets are returned in file order and are not validated.
///
/// A container holding only a table of contents
/// yields one entry pointing at the end of the container.
pub fn read_toc(input: &[u8]) -> Result<Vec<u32>, ParseError> {
    let mut toc = Vec::new();
    let mut first_song_pos = input.len();
    let mut position = 0;

    while position < first_song_pos {
        let offset = le_u32(input, position).context(TruncatedTocSnafu { position })?;
        log::debug!("TOC entry #{} at {:#06X}: {:#06X}", toc.len(), position, offset);
        position += 4;
        toc.push(offset);

        first_song_pos = first_song_pos.min(offset as usize);
    }

    Ok(toc)
}

/// A complete in-memory representation
/// of a MUS song container.
pub struct Mus {
    /// The song offsets, in table of contents order
    pub toc: Vec<u32>,
    /// The raw container bytes, table of contents included
    pub data: Vec<u8>,
}

impl fmt::Debug for Mus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mus")
            .field("toc", &self.toc)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Mus {
    /// Read a MUS container from a file in disk
    #[cfg(feature = "std")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = std::fs::read(path).context(ReadFileSnafu)?;
        Self::parse(data).context(ParseMusSnafu)
    }

    /// Take ownership of the container bytes and read its table of contents.
    ///
    /// Songs are only parsed on access,
    /// see [`song`](Mus::song) and [`songs`](Mus::songs).
    pub fn parse(data: Vec<u8>) -> Result<Self, ParseError> {
        let toc = read_toc(&data)?;
        Ok(Self { toc, data })
    }

    /// The total size of the container in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The number of songs declared in the table of contents
    pub fn song_count(&self) -> usize {
        self.toc.len()
    }

    /// Parse the song at the given table of contents index,
    /// or `None` if there is no such entry.
    pub fn song(&self, index: usize) -> Option<Result<SubSong<'_>, ParseError>> {
        let offset = *self.toc.get(index)?;
        Some(SubSong::parse(&self.data, index, offset))
    }

    /// Iterate over all songs in table of contents order.
    pub fn songs(&self) -> impl Iterator<Item = Result<SubSong<'_>, ParseError>> + '_ {
        self.toc
            .iter()
            .enumerate()
            .map(|(index, &offset)| SubSong::parse(&self.data, index, offset))
    }
}

/// The header at the start of each song
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SongHeader {
    /// Size of the song in bytes, this header included
    pub size: u16,
    /// Unknown, kept for display only
    pub field2: u16,
    /// MIDI ticks per quarter note
    pub resolution: u16,
    /// Unknown, kept for display only (usually `0xFFFF`)
    pub field4: u16,
}

impl SongHeader {
    /// Encoded size of the header
    pub const LEN: usize = 8;

    /// Parse a song header from the start of the slice,
    /// returning the header and the remaining bytes,
    /// or `None` if the slice is shorter than the header.
    pub fn parse(input: &[u8]) -> Option<(Self, &[u8])> {
        let header = Self {
            size: le_u16(input, 0)?,
            field2: le_u16(input, 2)?,
            resolution: le_u16(input, 4)?,
            field4: le_u16(input, 6)?,
        };
        Some((header, &input[Self::LEN..]))
    }

    /// The length of the MIDI payload following the header,
    /// or `None` if the declared size cannot even hold the header.
    pub fn payload_len(&self) -> Option<usize> {
        (self.size as usize).checked_sub(Self::LEN)
    }
}

/// A song borrowed from its container
#[derive(Debug, Clone, PartialEq)]
pub struct SubSong<'a> {
    /// Position in the table of contents
    pub index: usize,
    /// Absolute offset of the song header
    pub offset: u32,
    pub header: SongHeader,
    /// The MIDI event stream, exactly `header.size - 8` bytes
    pub payload: &'a [u8],
}

impl<'a> SubSong<'a> {
    /// Parse the song starting at `offset` in the complete container.
    pub fn parse(container: &'a [u8], index: usize, offset: u32) -> Result<Self, ParseError> {
        let len = container.len();
        let start = offset as usize;

        let (header, body) = container
            .get(start..)
            .and_then(SongHeader::parse)
            .context(InvalidOffsetSnafu { index, offset, len })?;

        let expected = header.payload_len().context(CorruptHeaderSnafu {
            index,
            offset,
            size: header.size,
        })?;

        let payload = body.get(..expected).context(TruncatedPayloadSnafu {
            index,
            offset,
            expected,
            available: body.len(),
        })?;

        Ok(Self {
            index,
            offset,
            header,
            payload,
        })
    }

    /// The diagnostic summary of this song
    pub fn info(&self) -> SongInfo {
        SongInfo {
            index: self.index,
            offset: self.offset,
            header: self.header,
        }
    }

    /// Wrap the song payload in a single track MIDI file
    /// using the song's resolution.
    pub fn to_midi(&self) -> MidiFile {
        MidiFile {
            // the payload length is bounded by the 16-bit size field
            header: MidiHeader::format0(self.header.resolution, self.payload.len() as u32),
            track: self.payload.to_vec(),
        }
    }
}

impl fmt::Display for SubSong<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.info(), f)
    }
}

/// Identification and header fields of a song,
/// without the payload.
///
/// Displays as a one line diagnostic record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SongInfo {
    pub index: usize,
    pub offset: u32,
    pub header: SongHeader,
}

impl fmt::Display for SongInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Song {}: offset = 0x{:04X}, size = 0x{:04X}, field2 = 0x{:04X}, resolution = {}, field4 = 0x{:04X}",
            self.index,
            self.offset,
            self.header.size,
            self.header.field2,
            self.header.resolution,
            self.header.field4
        )
    }
}
