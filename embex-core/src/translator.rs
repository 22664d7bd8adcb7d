pub mod elf;
pub mod macho;
pub mod pe;

pub use elf::ElfTranslator;
pub use macho::MachOTranslator;
pub use pe::PeTranslator;

use crate::error::Result;
use crate::format::{sniff_path, Format};
use crate::sections::Section;
use std::path::Path;

/// Maps virtual addresses of a binary to offsets in its file.
pub trait AddressTranslator: std::fmt::Debug + Send + Sync {
    /// Container format this translator was built for.
    fn format(&self) -> Format;

    /// The section table used for lookups.
    fn sections(&self) -> Result<&[Section]>;

    /// Returns the file offset backing `vaddr`.
    ///
    /// A well-known read-only-data section is checked first with an
    /// inclusive upper bound; otherwise the first section whose half-open
    /// range holds the address wins.
    fn translate(&self, vaddr: u64) -> Result<u64>;

    /// Drops the section table. Later calls fail with `Error::Closed`.
    fn close(&mut self);
}

/// Sniffs `path` and builds the matching translator.
///
/// The container is read fully, its section table copied out, and the
/// buffer released before returning.
pub fn open_translator<P: AsRef<Path>>(path: P) -> Result<Box<dyn AddressTranslator>> {
    let format = sniff_path(&path)?;
    let buf = std::fs::read(path.as_ref())?;
    translator_from_bytes(format, &buf)
}

/// Builds a translator for an in-memory container of a known format.
pub fn translator_from_bytes(format: Format, bytes: &[u8]) -> Result<Box<dyn AddressTranslator>> {
    let translator: Box<dyn AddressTranslator> = match format {
        Format::Elf => Box::new(ElfTranslator::parse(bytes)?),
        Format::Pe => Box::new(PeTranslator::parse(bytes)?),
        Format::MachO => Box::new(MachOTranslator::parse(bytes)?),
    };
    log::debug!(
        "{} translator ready with {} sections",
        format,
        translator.sections()?.len()
    );
    Ok(translator)
}
