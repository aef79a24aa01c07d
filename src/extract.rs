//! Writing every song of a MUS container to its own MIDI file.

use core::fmt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};

use crate::mus::{Mus, ParseError, SongInfo, SubSong};
use crate::smf;

/// An error extracting a single song
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Invalid song #{index} at offset {offset:#06X}
    ReadSong {
        index: usize,
        offset: u32,
        source: ParseError,
    },
    #[snafu(display("Failed to write song #{index} to {}", path.display()))]
    WriteSong {
        index: usize,
        path: PathBuf,
        source: smf::Error,
    },
}

impl Error {
    /// The table of contents index of the failing song
    pub fn index(&self) -> usize {
        match self {
            Error::ReadSong { index, .. } | Error::WriteSong { index, .. } => *index,
        }
    }
}

/// What to do when a song cannot be extracted
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Stop at the first failing song
    FailFast,
    /// Skip failing songs and report them at the end
    #[default]
    KeepGoing,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::FailFast => f.write_str("fail-fast"),
            Policy::KeepGoing => f.write_str("keep-going"),
        }
    }
}

/// A song written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub info: SongInfo,
    pub path: PathBuf,
}

/// The outcome of [`extract_all`]
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Songs written, in table of contents order
    pub extracted: Vec<Extracted>,
    /// Songs which could not be extracted, in table of contents order
    pub errors: Vec<Error>,
}

impl ExtractReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Build the output file name of song `index`
/// by inserting the index between the file stem and the extension.
///
/// `out/song.mid` becomes `out/song2.mid` for index 2.
pub fn output_path(pattern: impl AsRef<Path>, index: usize) -> PathBuf {
    let pattern = pattern.as_ref();
    let mut name = pattern.file_stem().map(OsString::from).unwrap_or_default();
    name.push(index.to_string());
    if let Some(extension) = pattern.extension() {
        name.push(".");
        name.push(extension);
    }
    if pattern.file_name().is_some() {
        pattern.with_file_name(name)
    } else {
        pattern.join(name)
    }
}

/// Write one song to `path` as a format 0 MIDI file.
///
/// The file is removed again if writing fails after it was created.
pub fn extract_song(song: &SubSong<'_>, path: &Path) -> Result<(), Error> {
    let index = song.index;
    let midi = song.to_midi();

    if let Err(e) = midi.write_to_file(path) {
        if matches!(e, smf::Error::WriteMidi { .. }) {
            let _ = std::fs::remove_file(path);
        }
        return Err(e).context(WriteSongSnafu { index, path });
    }

    log::debug!(
        "Wrote song #{} ({} track bytes) to {}",
        index,
        midi.track.len(),
        path.display()
    );
    Ok(())
}

/// Extract every song of the container,
/// naming the files after `pattern` (see [`output_path`]).
pub fn extract_all(mus: &Mus, pattern: impl AsRef<Path>, policy: Policy) -> ExtractReport {
    let pattern = pattern.as_ref();
    let mut report = ExtractReport::default();

    for (index, &offset) in mus.toc.iter().enumerate() {
        let outcome = SubSong::parse(&mus.data, index, offset)
            .context(ReadSongSnafu { index, offset })
            .and_then(|song| {
                let path = output_path(pattern, index);
                extract_song(&song, &path)?;
                Ok(Extracted {
                    info: song.info(),
                    path,
                })
            });

        match outcome {
            Ok(extracted) => report.extracted.push(extracted),
            Err(e) => {
                log::warn!("Song #{} at {:#06X} not extracted: {}", index, offset, e);
                report.errors.push(e);
                if policy == Policy::FailFast {
                    break;
                }
            }
        }
    }

    report
}
