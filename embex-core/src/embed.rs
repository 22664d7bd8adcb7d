//! Decoding of the embedded file table.
//!
//! The table is a slice header followed by a contiguous array of records:
//!
//! ```text
//! header (24 bytes):  [u64 entries vaddr][u64 length][u64 capacity]
//! record (48 bytes):  [u64 name vaddr][u64 name len]
//!                     [u64 content vaddr][u64 content len]
//!                     [16 byte hash]
//! ```
//!
//! All integers are little-endian. Only the array base is translated; each
//! record sits a fixed stride after the previous one.

use crate::error::{Error, Result};
use crate::reader::RandomAccessReader;
use crate::translator::{open_translator, AddressTranslator};
use std::path::Path;

pub const HEADER_WORDS: usize = 3;
pub const SLICE_WORDS: usize = 2;
pub const HASH_LEN: usize = 16;
/// Distance between consecutive records: name slice, content slice, hash.
pub const RECORD_STRIDE: u64 = 48;

const CONTENT_FIELD: u64 = 16;
const HASH_FIELD: u64 = 32;

/// One file recovered from the table, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub name: String,
    /// `None` when the record's content pointer is null, which is distinct
    /// from present-but-empty content.
    pub content: Option<Vec<u8>>,
    pub hash: [u8; HASH_LEN],
}

impl ExtractedEntry {
    /// Names ending in `/` mark directories.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn hash_hex(&self) -> String {
        self.hash.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// The slice header found at the root address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedHeader {
    pub entries: u64,
    pub length: u64,
    pub capacity: u64,
}

impl EmbedHeader {
    pub fn read(
        translator: &dyn AddressTranslator,
        reader: &RandomAccessReader,
        root: u64,
    ) -> Result<Self> {
        let offset = translator.translate(root)?;
        let words = reader.read_words(HEADER_WORDS, offset)?;
        let header = EmbedHeader {
            entries: words[0],
            length: words[1],
            capacity: words[2],
        };
        log::debug!(
            "Embed header at {:#x} (file {:#x}): entries={:#x} len={} cap={}",
            root,
            offset,
            header.entries,
            header.length,
            header.capacity
        );

        if header.length != header.capacity {
            return Err(Error::InvalidHeader {
                length: header.length,
                capacity: header.capacity,
            });
        }
        Ok(header)
    }
}

/// Opens `path`, decodes the table rooted at `root` and releases both
/// the translator and the reader, whether or not decoding succeeded.
pub fn extract<P: AsRef<Path>>(path: P, root: u64) -> Result<Vec<ExtractedEntry>> {
    let path = path.as_ref();
    let mut translator = open_translator(path)?;
    let mut reader = RandomAccessReader::open(path)?;

    let entries = walk(translator.as_ref(), &reader, root);

    reader.close();
    translator.close();

    let entries = entries?;
    log::info!(
        "Extracted {} entries from {} at {:#x}",
        entries.len(),
        path.display(),
        root
    );
    Ok(entries)
}

/// Decodes the table rooted at `root` using already-open collaborators.
///
/// The first failure aborts the walk; no partial list is returned.
pub fn walk(
    translator: &dyn AddressTranslator,
    reader: &RandomAccessReader,
    root: u64,
) -> Result<Vec<ExtractedEntry>> {
    let header = EmbedHeader::read(translator, reader, root)?;
    let base = translator.translate(header.entries)?;

    // A table cannot hold more records than the file has room for.
    let room = reader.len().saturating_sub(base) / RECORD_STRIDE;
    let mut entries = Vec::with_capacity(header.length.min(room) as usize);

    let mut offset = base;
    for index in 0..header.length {
        let entry = read_record(translator, reader, offset)?;
        log::debug!(
            "Record {} at {:#x}: {} ({})",
            index,
            offset,
            entry.name,
            match &entry.content {
                Some(c) => format!("{} bytes", c.len()),
                None => "no content".to_string(),
            }
        );
        entries.push(entry);
        offset = advance(offset, RECORD_STRIDE)?;
    }

    Ok(entries)
}

fn read_record(
    translator: &dyn AddressTranslator,
    reader: &RandomAccessReader,
    offset: u64,
) -> Result<ExtractedEntry> {
    let (name_ptr, name_len) = read_slice(reader, offset)?;
    let name_bytes = read_pointee(translator, reader, name_ptr, name_len)?;
    let name = match String::from_utf8(name_bytes) {
        Ok(name) => name,
        Err(e) => {
            let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
            log::warn!("{}", invalid_name_message(name_ptr, e.as_bytes(), &lossy));
            lossy
        }
    };

    let (content_ptr, content_len) = read_slice(reader, advance(offset, CONTENT_FIELD)?)?;
    let content = if content_ptr == 0 {
        None
    } else {
        Some(read_pointee(translator, reader, content_ptr, content_len)?)
    };

    let hash_bytes = reader.read_bytes(HASH_LEN, advance(offset, HASH_FIELD)?)?;
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&hash_bytes);

    Ok(ExtractedEntry { name, content, hash })
}

fn invalid_name_message(name_ptr: u64, raw: &[u8], lossy: &str) -> String {
    format!(
        "Entry name at {:#x} is not valid UTF-8: {:02x?} (decoded as {:?})",
        name_ptr, raw, lossy
    )
}

/// Reads a `(pointer, length)` pair.
fn read_slice(reader: &RandomAccessReader, offset: u64) -> Result<(u64, u64)> {
    let words = reader.read_words(SLICE_WORDS, offset)?;
    Ok((words[0], words[1]))
}

fn read_pointee(
    translator: &dyn AddressTranslator,
    reader: &RandomAccessReader,
    vaddr: u64,
    len: u64,
) -> Result<Vec<u8>> {
    let offset = translator.translate(vaddr)?;
    let len = usize::try_from(len).map_err(|_| Error::ShortRead { offset, len })?;
    reader.read_bytes(len, offset)
}

fn advance(offset: u64, by: u64) -> Result<u64> {
    offset
        .checked_add(by)
        .ok_or(Error::ShortRead { offset, len: by })
}
