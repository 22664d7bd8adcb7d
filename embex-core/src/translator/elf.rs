use crate::error::{Error, Result};
use crate::format::Format;
use crate::sections::Section;
use crate::translator::AddressTranslator;
use goblin::elf::Elf;

/// Read-only data section checked before the full scan.
pub const RODATA: &str = ".rodata";

/// Address translation over an ELF section header table.
///
/// Stripped binaries without section headers fall back to their `PT_LOAD`
/// segments.
#[derive(Debug)]
pub struct ElfTranslator {
    sections: Option<Vec<Section>>,
    rodata: Option<usize>,
    is_stripped: bool,
}

impl ElfTranslator {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let elf = Elf::parse(bytes).map_err(|source| Error::Parse {
            format: Format::Elf,
            source,
        })?;

        let has_sections = !elf.section_headers.is_empty();
        let sections: Vec<Section> = if has_sections {
            elf.section_headers
                .iter()
                .map(|sh| Section::from_goblin_sh(sh, &elf))
                .collect()
        } else {
            log::warn!("Stripped binary; using program headers");
            Section::from_goblin_ph(&elf, bytes.len() as u64)
        };

        let rodata = sections.iter().position(|s| s.name == RODATA);
        if rodata.is_none() {
            log::debug!("{} not found; every lookup scans all sections", RODATA);
        }

        Ok(Self {
            sections: Some(sections),
            rodata,
            is_stripped: !has_sections,
        })
    }

    /// True when the section table was synthesized from program headers.
    pub fn is_stripped(&self) -> bool {
        self.is_stripped
    }

    fn find_section(sections: &[Section], vaddr: u64) -> Option<&Section> {
        sections
            .iter()
            .filter(|s| !s.is_null())
            .find(|s| s.contains(vaddr))
    }
}

impl AddressTranslator for ElfTranslator {
    fn format(&self) -> Format {
        Format::Elf
    }

    fn sections(&self) -> Result<&[Section]> {
        self.sections.as_deref().ok_or(Error::Closed)
    }

    fn translate(&self, vaddr: u64) -> Result<u64> {
        let sections = self.sections()?;

        if let Some(rodata) = self.rodata.map(|i| &sections[i]) {
            if rodata.contains_inclusive(vaddr) {
                return Ok(rodata.offset_of(vaddr));
            }
        }

        let section = Self::find_section(sections, vaddr).ok_or(Error::AddressNotMapped(vaddr))?;
        log::debug!("{:#x} resolved through {}", vaddr, section.name);
        Ok(section.offset_of(vaddr))
    }

    fn close(&mut self) {
        self.sections = None;
        self.rodata = None;
    }
}
