//! Content layer: turns a file into a seekable byte stream for the pager.

pub mod message;

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::info;

use crate::error::{PagerError, Result};
use crate::pager::Markers;

pub use message::{decode_message, DecodedMessage};

/// Bytes read from a raw file to tell a message from plain text.
const HEADER_PROBE_BYTES: u64 = 4096;

/// How a file is turned into pager content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// Decode mail messages, page anything else as is.
    #[default]
    Auto,
    /// Page the file bytes unchanged.
    Raw,
}

/// A byte stream the pager can seek in.
#[derive(Debug)]
pub enum PagerStream {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl Read for PagerStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(buf),
            Self::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for PagerStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(f) => f.seek(pos),
            Self::Memory(c) => c.seek(pos),
        }
    }
}

/// An opened source: the stream plus what to show in the status line.
#[derive(Debug)]
pub struct OpenedSource {
    pub stream: PagerStream,
    pub banner: String,
    /// The content was decoded from a mail message.
    pub is_message: bool,
    /// The content starts with header fields.
    pub has_headers: bool,
}

/// Open `path` for paging.
///
/// In `Auto` mode a file that starts with a header field is decoded with
/// attachment lines tagged by `markers`; other files are paged raw.
pub fn open_stream(path: &Path, mode: SourceMode, markers: &Markers) -> Result<OpenedSource> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if mode == SourceMode::Raw {
        let mut file = File::open(path).map_err(|e| PagerError::io(path, e))?;
        let mut head = Vec::new();
        (&mut file)
            .take(HEADER_PROBE_BYTES)
            .read_to_end(&mut head)
            .map_err(|e| PagerError::io(path, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| PagerError::io(path, e))?;
        let has_headers = message::looks_like_message(&head);
        info!(path = %path.display(), has_headers, "Paging raw file");
        return Ok(OpenedSource {
            stream: PagerStream::File(file),
            banner: name,
            is_message: false,
            has_headers,
        });
    }

    let data = std::fs::read(path).map_err(|e| PagerError::io(path, e))?;
    if !message::looks_like_message(&data) {
        info!(path = %path.display(), bytes = data.len(), "Paging plain text");
        return Ok(OpenedSource {
            stream: PagerStream::Memory(Cursor::new(data)),
            banner: name,
            is_message: false,
            has_headers: false,
        });
    }

    let decoded = decode_message(&data, markers)?;
    info!(
        path = %path.display(),
        attachments = decoded.attachments,
        "Paging decoded message"
    );
    let banner = match decoded.subject {
        Some(ref subject) if !subject.is_empty() => format!("{name}: {subject}"),
        _ => name,
    };
    Ok(OpenedSource {
        stream: PagerStream::Memory(Cursor::new(decoded.text)),
        banner,
        is_message: true,
        has_headers: true,
    })
}
