use crate::format::Format;
use thiserror::Error;

/// Failures surfaced by sniffing, translation, reading and persisting.
///
/// Every variant is terminal for the extraction in flight; nothing here is
/// retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The file does not start with an ELF, PE or Mach-O magic.
    #[error("unknown binary format (magic {magic:02x?})")]
    UnknownFormat { magic: [u8; 4] },

    /// The container is malformed for the format it claims to be.
    #[error("malformed {format} container: {source}")]
    Parse {
        format: Format,
        #[source]
        source: goblin::error::Error,
    },

    /// The virtual address is not covered by any section.
    #[error("virtual address {0:#x} is not mapped by any section")]
    AddressNotMapped(u64),

    /// The embed header's length and capacity disagree.
    #[error("invalid embed header: length {length} != capacity {capacity}")]
    InvalidHeader { length: u64, capacity: u64 },

    /// The requested byte range runs past the end of the file.
    #[error("short read: {len} bytes at offset {offset:#x}")]
    ShortRead { offset: u64, len: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The reader or translator has already been closed.
    #[error("resource already closed")]
    Closed,

    /// An entry name would escape the output directory.
    #[error("refusing to write entry with unsafe name {0:?}")]
    UnsafeEntryName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
