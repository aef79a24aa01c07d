//! Implementation of the single track Standard MIDI File
//! produced for each extracted song.
//!
//! Only the layout written by this crate is supported:
//! a header chunk immediately followed by one track chunk.

use snafu::{ensure, OptionExt as _, Snafu};
#[cfg(feature = "std")]
use std::path::Path;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

#[cfg(feature = "std")]
use snafu::ResultExt;

use crate::data_types::{be_u16, be_u32, Ascii};

/// An error reading or writing a MIDI file
#[cfg(feature = "std")]
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read the file
    ReadFile { source: std::io::Error },
    /// Failed to write the file
    WriteFile { source: std::io::Error },
    /// Failed to write MIDI data
    WriteMidi { source: std::io::Error },
    /// Failed to parse MIDI data
    ParseMidi { source: ParseError },
    /// Track of {len} bytes is too large for a MIDI track chunk
    TrackTooLarge { len: usize },
}

/// An error reading or writing a MIDI file
#[cfg(not(feature = "std"))]
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Failed to parse MIDI data
    ParseMidi { source: ParseError },
    /// Track of {len} bytes is too large for a MIDI track chunk
    TrackTooLarge { len: usize },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error parsing a MIDI file header or track
#[derive(Debug, PartialEq, Snafu)]
pub enum ParseError {
    /// Insufficient bytes to parse {context}
    InsufficientBytes { context: &'static str },
    #[snafu(display("Invalid chunk type {}, expected {}", Ascii(found), Ascii(expected)))]
    InvalidChunkType { found: [u8; 4], expected: [u8; 4] },
    /// Invalid header chunk length {length} (expected 6)
    InvalidHeaderLength { length: u32 },
    /// Track chunk declares {expected} bytes, only {available} available
    TruncatedTrack { expected: u32, available: usize },
}

/// The header of a single track MIDI file,
/// covering both the `MThd` chunk and the `MTrk` chunk header.
///
/// All fields are encoded in big endian.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MidiHeader {
    /// MIDI file format (0 = single multi-channel track)
    pub format_type: u16,
    /// Number of track chunks
    pub track_count: u16,
    /// Ticks per quarter note
    pub resolution: u16,
    /// Length of the track chunk body in bytes
    pub track_length: u32,
}

impl MidiHeader {
    /// `"MThd"`
    pub const HEADER_CHUNK_TYPE: [u8; 4] = *b"MThd";
    /// `"MTrk"`
    pub const TRACK_CHUNK_TYPE: [u8; 4] = *b"MTrk";
    /// Length of the `MThd` chunk body
    pub const HEADER_CHUNK_LEN: u32 = 6;
    /// Size of the encoded header, track chunk length included
    pub const ENCODED_LEN: usize = 22;

    pub const FORMAT_SINGLE_TRACK: u16 = 0;

    /// Create the header of a format 0 file with one track
    pub const fn format0(resolution: u16, track_length: u32) -> Self {
        MidiHeader {
            format_type: Self::FORMAT_SINGLE_TRACK,
            track_count: 1,
            resolution,
            track_length,
        }
    }

    pub fn encoded(&self) -> [u8; Self::ENCODED_LEN] {
        let header_len_bytes = Self::HEADER_CHUNK_LEN.to_be_bytes();
        let format_bytes = self.format_type.to_be_bytes();
        let track_count_bytes = self.track_count.to_be_bytes();
        let resolution_bytes = self.resolution.to_be_bytes();
        let track_length_bytes = self.track_length.to_be_bytes();
        [
            Self::HEADER_CHUNK_TYPE[0],
            Self::HEADER_CHUNK_TYPE[1],
            Self::HEADER_CHUNK_TYPE[2],
            Self::HEADER_CHUNK_TYPE[3],
            header_len_bytes[0],
            header_len_bytes[1],
            header_len_bytes[2],
            header_len_bytes[3],
            format_bytes[0],
            format_bytes[1],
            track_count_bytes[0],
            track_count_bytes[1],
            resolution_bytes[0],
            resolution_bytes[1],
            Self::TRACK_CHUNK_TYPE[0],
            Self::TRACK_CHUNK_TYPE[1],
            Self::TRACK_CHUNK_TYPE[2],
            Self::TRACK_CHUNK_TYPE[3],
            track_length_bytes[0],
            track_length_bytes[1],
            track_length_bytes[2],
            track_length_bytes[3],
        ]
    }

    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if bytes.len() < Self::ENCODED_LEN {
            return Err(ParseError::InsufficientBytes {
                context: "MidiHeader",
            });
        }

        let (bytes, rest) = bytes.split_at(Self::ENCODED_LEN);

        let chunk_type = chunk_type_at(bytes, 0)?;
        ensure!(
            chunk_type == Self::HEADER_CHUNK_TYPE,
            InvalidChunkTypeSnafu {
                found: chunk_type,
                expected: Self::HEADER_CHUNK_TYPE,
            }
        );

        let length = be_u32(bytes, 4).context(InsufficientBytesSnafu {
            context: "MidiHeader.length",
        })?;
        ensure!(
            length == Self::HEADER_CHUNK_LEN,
            InvalidHeaderLengthSnafu { length }
        );

        let chunk_type = chunk_type_at(bytes, 14)?;
        ensure!(
            chunk_type == Self::TRACK_CHUNK_TYPE,
            InvalidChunkTypeSnafu {
                found: chunk_type,
                expected: Self::TRACK_CHUNK_TYPE,
            }
        );

        let field = |at: usize, context: &'static str| {
            be_u16(bytes, at).context(InsufficientBytesSnafu { context })
        };
        let header = MidiHeader {
            format_type: field(8, "MidiHeader.format_type")?,
            track_count: field(10, "MidiHeader.track_count")?,
            resolution: field(12, "MidiHeader.resolution")?,
            track_length: be_u32(bytes, 18).context(InsufficientBytesSnafu {
                context: "MidiHeader.track_length",
            })?,
        };

        Ok((header, rest))
    }
}

fn chunk_type_at(bytes: &[u8], at: usize) -> Result<[u8; 4], ParseError> {
    bytes
        .get(at..at + 4)
        .and_then(|code| code.try_into().ok())
        .context(InsufficientBytesSnafu {
            context: "chunk type",
        })
}

/// A complete in-memory single track MIDI file.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiFile {
    pub header: MidiHeader,
    /// The track chunk body (MIDI events), kept verbatim
    pub track: Vec<u8>,
}

impl MidiFile {
    /// Create a format 0 file holding the given track
    pub fn format0(resolution: u16, track: Vec<u8>) -> Result<Self> {
        let track_length = track_length(&track)?;
        Ok(MidiFile {
            header: MidiHeader::format0(resolution, track_length),
            track,
        })
    }

    #[cfg(feature = "std")]
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(file).context(ReadFileSnafu)?;
        Self::parse(&bytes).context(ParseMidiSnafu)
    }

    /// Parse a file written by this crate.
    ///
    /// Bytes after the track chunk are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let (header, rest) = MidiHeader::parse(bytes)?;
        let track = rest
            .get(..header.track_length as usize)
            .context(TruncatedTrackSnafu {
                expected: header.track_length,
                available: rest.len(),
            })?;

        Ok(Self {
            header,
            track: track.to_vec(),
        })
    }

    /// Write the file to disk.
    ///
    /// The file is not created if the track cannot be encoded.
    /// Failing to create the file is reported as [`Error::WriteFile`],
    /// failures after creation as [`Error::WriteMidi`].
    #[cfg(feature = "std")]
    pub fn write_to_file(&self, file: impl AsRef<Path>) -> Result<()> {
        use std::io::{BufWriter, Write as _};
        track_length(&self.track)?;
        let mut writer = BufWriter::new(std::fs::File::create(file).context(WriteFileSnafu)?);
        self.write_to(&mut writer)?;
        writer.flush().context(WriteMidiSnafu)
    }

    #[cfg(feature = "std")]
    pub fn write_to(&self, writer: impl std::io::Write) -> Result<()> {
        let mut writer = writer;

        let encoded_header = self.encoded_header()?;
        writer.write_all(&encoded_header).context(WriteMidiSnafu)?;
        writer.write_all(&self.track).context(WriteMidiSnafu)?;
        Ok(())
    }

    /// Encode the complete file into a new byte vector
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let encoded_header = self.encoded_header()?;
        let mut out = Vec::with_capacity(MidiHeader::ENCODED_LEN + self.track.len());
        out.extend_from_slice(&encoded_header);
        out.extend_from_slice(&self.track);
        Ok(out)
    }

    fn encoded_header(&self) -> Result<[u8; MidiHeader::ENCODED_LEN]> {
        // do not trust track_length,
        // use the actual track size instead
        let header = MidiHeader {
            track_length: track_length(&self.track)?,
            ..self.header
        };
        Ok(header.encoded())
    }
}

fn track_length(track: &[u8]) -> Result<u32> {
    u32::try_from(track.len())
        .ok()
        .context(TrackTooLargeSnafu { len: track.len() })
}

#[cfg(test)]
mod tests {
    use super::{Error, MidiFile, MidiHeader, ParseError};

    const PAYLOAD: [u8; 8] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE];

    #[test]
    fn can_encode_format0_header() {
        let header = MidiHeader::format0(24, 8);
        assert_eq!(
            header.encoded(),
            [
                b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, // header chunk
                0x00, 0x00, 0x00, 0x01, 0x00, 0x18, // format, tracks, resolution
                b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x08, // track chunk
            ]
        );

        // resolution and length are big endian
        let encoded = MidiHeader::format0(0x01E0, 0x0001_0203).encoded();
        assert_eq!(&encoded[12..14], &[0x01, 0xE0]);
        assert_eq!(&encoded[18..22], &[0x00, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn can_write_midi_file() {
        let midi = MidiFile::format0(24, PAYLOAD.to_vec()).unwrap();
        assert_eq!(midi.header.track_length, 8);

        let mut out = Vec::new();
        midi.write_to(&mut out).unwrap();
        assert_eq!(out.len(), 30);
        assert_eq!(&out[..4], b"MThd");
        assert_eq!(&out[12..14], &[0x00, 0x18]);
        assert_eq!(&out[18..22], &[0x00, 0x00, 0x00, 0x08]);
        assert_eq!(&out[22..], &PAYLOAD);

        assert_eq!(midi.to_vec().unwrap(), out);
    }

    #[test]
    fn empty_track_writes_header_only() {
        let midi = MidiFile::format0(96, Vec::new()).unwrap();
        let out = midi.to_vec().unwrap();
        assert_eq!(out.len(), MidiHeader::ENCODED_LEN);
        assert_eq!(&out[14..18], b"MTrk");
        assert_eq!(&out[18..22], &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn track_length_follows_track() {
        let mut midi = MidiFile::format0(24, PAYLOAD.to_vec()).unwrap();
        midi.track.truncate(3);
        let out = midi.to_vec().unwrap();
        assert_eq!(&out[18..22], &[0x00, 0x00, 0x00, 0x03]);
        assert_eq!(out.len(), 25);
    }

    #[test]
    fn can_write_and_read_back_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mid");
        let midi = MidiFile::format0(96, PAYLOAD.to_vec()).unwrap();

        midi.write_to_file(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), midi.to_vec().unwrap());
        assert_eq!(MidiFile::from_file(&path).unwrap(), midi);

        let missing = dir.path().join("missing").join("song.mid");
        assert!(matches!(
            midi.write_to_file(&missing),
            Err(Error::WriteFile { .. })
        ));
        assert!(!missing.exists());
    }

    #[test]
    fn can_parse_written_file() {
        let midi = MidiFile::format0(480, PAYLOAD.to_vec()).unwrap();
        let mut bytes = midi.to_vec().unwrap();
        // trailing data is ignored
        bytes.push(0x00);

        let parsed = MidiFile::parse(&bytes).unwrap();
        assert_eq!(parsed, midi);
        assert_eq!(parsed.header.format_type, MidiHeader::FORMAT_SINGLE_TRACK);
        assert_eq!(parsed.header.track_count, 1);
    }

    #[test]
    fn parse_errors() {
        let bytes = MidiFile::format0(24, PAYLOAD.to_vec())
            .unwrap()
            .to_vec()
            .unwrap();

        assert_eq!(
            MidiFile::parse(&bytes[..21]),
            Err(ParseError::InsufficientBytes {
                context: "MidiHeader"
            })
        );

        let mut bad = bytes.clone();
        bad[0..4].copy_from_slice(b"RIFF");
        assert_eq!(
            MidiFile::parse(&bad),
            Err(ParseError::InvalidChunkType {
                found: *b"RIFF",
                expected: *b"MThd",
            })
        );

        let mut bad = bytes.clone();
        bad[7] = 0x08;
        assert_eq!(
            MidiFile::parse(&bad),
            Err(ParseError::InvalidHeaderLength { length: 8 })
        );

        let mut bad = bytes.clone();
        bad[14..18].copy_from_slice(b"MTrX");
        assert_eq!(
            MidiFile::parse(&bad),
            Err(ParseError::InvalidChunkType {
                found: *b"MTrX",
                expected: *b"MTrk",
            })
        );

        assert_eq!(
            MidiFile::parse(&bytes[..26]),
            Err(ParseError::TruncatedTrack {
                expected: 8,
                available: 4,
            })
        );

        assert_eq!(
            ParseError::InvalidChunkType {
                found: [b'M', b'T', 0, 0],
                expected: *b"MThd",
            }
            .to_string(),
            "Invalid chunk type MT\\x00\\x00, expected MThd"
        );
    }
}
