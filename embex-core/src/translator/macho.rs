use crate::error::{Error, Result};
use crate::format::Format;
use crate::sections::Section;
use crate::translator::AddressTranslator;
use goblin::mach::MachO;

pub const RODATA: &str = "__rodata";

/// Address translation over the sections of every Mach-O segment.
#[derive(Debug)]
pub struct MachOTranslator {
    sections: Option<Vec<Section>>,
    rodata: Option<usize>,
}

impl MachOTranslator {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let parse_err = |source: goblin::error::Error| Error::Parse {
            format: Format::MachO,
            source,
        };
        let macho = MachO::parse(bytes, 0).map_err(parse_err)?;

        let mut sections = Vec::new();
        for segment in macho.segments.iter() {
            for (section, _) in segment.sections().map_err(parse_err)? {
                sections.push(Section::from_goblin_macho(&section));
            }
        }

        // Matched by section name alone, whichever segment holds it.
        let rodata = sections.iter().position(|s| s.name == RODATA);

        Ok(Self {
            sections: Some(sections),
            rodata,
        })
    }
}

impl AddressTranslator for MachOTranslator {
    fn format(&self) -> Format {
        Format::MachO
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

        sections
            .iter()
            .find(|s| s.contains(vaddr))
            .map(|s| s.offset_of(vaddr))
            .ok_or(Error::AddressNotMapped(vaddr))
    }

    fn close(&mut self) {
        self.sections = None;
        self.rodata = None;
    }
}
