use crate::error::{Error, Result};
use crate::format::Format;
use crate::sections::Section;
use crate::translator::AddressTranslator;
use goblin::pe::PE;

pub const RDATA: &str = ".rdata";

/// Address translation over a PE section table.
///
/// Callers pass absolute virtual addresses; they are rebased onto the
/// image base before being matched against section RVAs.
#[derive(Debug)]
pub struct PeTranslator {
    sections: Option<Vec<Section>>,
    rdata: Option<usize>,
    image_base: u64,
}

impl PeTranslator {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let pe = PE::parse(bytes).map_err(|source| Error::Parse {
            format: Format::Pe,
            source,
        })?;

        // PE32 and PE32+ carry the same field at different widths; goblin
        // widens both. Without an optional header addresses are taken as RVAs.
        let image_base = pe
            .header
            .optional_header
            .as_ref()
            .map(|oh| oh.windows_fields.image_base)
            .unwrap_or(0);

        let sections: Vec<Section> = pe.sections.iter().map(Section::from_goblin_pe).collect();
        let rdata = sections.iter().position(|s| s.name == RDATA);

        log::debug!(
            "PE image base {:#x}, {} sections, {} {}",
            image_base,
            sections.len(),
            RDATA,
            if rdata.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            sections: Some(sections),
            rdata,
            image_base,
        })
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }
}

impl AddressTranslator for PeTranslator {
    fn format(&self) -> Format {
        Format::Pe
    }

    fn sections(&self) -> Result<&[Section]> {
        self.sections.as_deref().ok_or(Error::Closed)
    }

    fn translate(&self, vaddr: u64) -> Result<u64> {
        let sections = self.sections()?;
        let rva = vaddr
            .checked_sub(self.image_base)
            .ok_or(Error::AddressNotMapped(vaddr))?;

        if let Some(rdata) = self.rdata.map(|i| &sections[i]) {
            if rdata.contains_inclusive(rva) {
                return Ok(rdata.offset_of(rva));
            }
        }

        let section = sections
            .iter()
            .find(|s| s.contains(rva))
            .ok_or(Error::AddressNotMapped(vaddr))?;
        log::debug!("{:#x} (rva {:#x}) resolved through {}", vaddr, rva, section.name);
        Ok(section.offset_of(rva))
    }

    fn close(&mut self) {
        self.sections = None;
        self.rdata = None;
    }
}
