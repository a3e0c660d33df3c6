//! Line scanner: reads one line at a byte offset with LRU caching.

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use tracing::{debug, trace};

use crate::error::{PagerError, Result};
use crate::pager::escape::{sgr_len, Markers};
use crate::pager::layout::{decode_at, is_printable};

/// Default number of scanned lines kept in the cache.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// One line read from the stream, in two forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    /// Verbatim bytes including the line ending, used to detect markers.
    pub raw: Vec<u8>,
    /// Copy with overstrike collapsed and escape sequences removed.
    pub display: Vec<u8>,
}

impl ScannedLine {
    /// Bytes this line occupies in the stream.
    pub(crate) fn len(&self) -> usize {
        self.raw.len()
    }
}

/// Reads lines from a seekable stream by offset.
///
/// Keeps an LRU cache of [`ScannedLine`]s keyed by offset so that the
/// repeated reads of one redraw pass touch the stream once.
pub struct LineScanner<R> {
    reader: BufReader<R>,
    /// Stream position after the last read.
    position: u64,
    stream_len: u64,
    markers: Markers,
    cache: LruCache<u64, Rc<ScannedLine>>,
}

impl<R: Read + Seek> LineScanner<R> {
    /// Wrap `stream`, measuring its length.
    pub fn new(stream: R, markers: Markers, cache_size: usize) -> Result<Self> {
        let mut reader = BufReader::new(stream);
        let stream_len = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| PagerError::StreamRead {
                offset: 0,
                source: e,
            })?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| PagerError::StreamRead {
                offset: 0,
                source: e,
            })?;
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        debug!(stream_len, cache = cache_size.get(), "Line scanner opened");
        Ok(Self {
            reader,
            position: 0,
            stream_len,
            markers,
            cache: LruCache::new(cache_size),
        })
    }

    /// Total size of the stream in bytes.
    pub fn stream_len(&self) -> u64 {
        self.stream_len
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Read the line starting at `offset`. `Ok(None)` at end of stream.
    pub fn read_line(&mut self, offset: u64) -> Result<Option<Rc<ScannedLine>>> {
        if let Some(line) = self.cache.get(&offset) {
            return Ok(Some(Rc::clone(line)));
        }
        if offset >= self.stream_len {
            return Ok(None);
        }

        if offset != self.position {
            self.reader
                .seek(SeekFrom::Start(offset))
                .map_err(|e| PagerError::StreamRead { offset, source: e })?;
        }
        let mut raw = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut raw)
            .map_err(|e| PagerError::StreamRead { offset, source: e })?;
        self.position = offset + n as u64;
        if n == 0 {
            return Ok(None);
        }
        trace!(offset, len = n, "Scanned line");

        let display = display_copy(&raw, &self.markers);
        let line = Rc::new(ScannedLine { raw, display });
        self.cache.put(offset, Rc::clone(&line));
        Ok(Some(line))
    }

    /// Drop every cached line.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Build the display copy of a raw line.
///
/// Backspace overstrike between two printable characters collapses to one
/// character (`x BS _` keeps `x`, `x BS y` keeps `y`); a backspace anywhere
/// else is kept. ANSI SGR sequences and markers are removed.
pub fn display_copy(raw: &[u8], markers: &Markers) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    // start of the last character written to `out`
    let mut last_start: Option<usize> = None;
    let mut pos = 0;

    while pos < raw.len() {
        let b = raw[pos];
        if b == 0x08 {
            let prev = last_start.and_then(|s| decode_at(&out, s));
            let next = decode_at(raw, pos + 1);
            if let (Some((p, _)), Some((c, len))) = (prev, next) {
                if is_printable(p) && is_printable(c) {
                    if c != '_' {
                        if let Some(s) = last_start {
                            out.truncate(s);
                            out.extend_from_slice(&raw[pos + 1..pos + 1 + len]);
                        }
                    }
                    pos += 1 + len;
                    continue;
                }
            }
            last_start = Some(out.len());
            out.push(b);
            pos += 1;
        } else if let Some(len) = sgr_len(raw, pos) {
            pos += len;
        } else if let Some(len) = markers.marker_len_at(raw, pos) {
            pos += len;
        } else {
            let len = decode_at(raw, pos).map_or(1, |(_, len)| len);
            last_start = Some(out.len());
            out.extend_from_slice(&raw[pos..pos + len]);
            pos += len;
        }
    }
    out
}
