use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when classifying a file.
pub const SNIFF_LEN: usize = 4;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const PE_MAGIC: [u8; 2] = [b'M', b'Z'];
const MACHO_MAGIC: [u8; 3] = [0xcf, 0xfa, 0xed];

/// Binary container formats an address translator exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    Elf,
    Pe,
    MachO,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Elf => "ELF",
            Format::Pe => "PE",
            Format::MachO => "Mach-O",
        };
        write!(f, "{}", name)
    }
}

/// Classifies a header prefix by its magic bytes.
///
/// Only the leading bytes each format needs are compared: four for ELF,
/// two for PE (`MZ`) and three for 64-bit little-endian Mach-O.
pub fn sniff_bytes(prefix: &[u8]) -> Result<Format> {
    if prefix.starts_with(&ELF_MAGIC) {
        Ok(Format::Elf)
    } else if prefix.starts_with(&PE_MAGIC) {
        Ok(Format::Pe)
    } else if prefix.starts_with(&MACHO_MAGIC) {
        Ok(Format::MachO)
    } else {
        let mut magic = [0u8; SNIFF_LEN];
        let n = prefix.len().min(SNIFF_LEN);
        magic[..n].copy_from_slice(&prefix[..n]);
        Err(Error::UnknownFormat { magic })
    }
}

/// Reads the first four bytes of `path` and classifies them.
///
/// The file handle is dropped before returning. A file shorter than four
/// bytes fails with [`Error::Io`].
pub fn sniff_path<P: AsRef<Path>>(path: P) -> Result<Format> {
    let mut file = std::fs::File::open(path.as_ref())?;
    let mut magic = [0u8; SNIFF_LEN];
    file.read_exact(&mut magic)?;

    let format = sniff_bytes(&magic)?;
    log::debug!("{} detected as {}", path.as_ref().display(), format);
    Ok(format)
}
