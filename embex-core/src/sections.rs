use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::{SHT_NULL, SHT_PROGBITS};
use goblin::elf::{Elf, SectionHeader};
use goblin::pe::section_table::SectionTable;

/// Format-specific section classification, kept raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// ELF `sh_type`.
    Elf(u32),
    /// PE section characteristics.
    Pe(u32),
    /// Mach-O section flags.
    MachO(u32),
}

/// A section's address range and where it is stored in the file.
///
/// For PE images `virtual_address` is relative to the image base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub virtual_address: u64,
    pub size: u64,
    pub file_offset: u64,
    pub kind: SectionKind,
}

impl Section {
    /// Exclusive end of the section's address range, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.virtual_address.saturating_add(self.size)
    }

    /// Half-open membership: `[virtual_address, virtual_address + size)`.
    pub fn contains(&self, vaddr: u64) -> bool {
        vaddr >= self.virtual_address && vaddr < self.end()
    }

    /// Closed membership: `[virtual_address, virtual_address + size]`.
    ///
    /// Used only by the read-only-data fast paths, which accept an address
    /// pointing one past the end of the section.
    pub fn contains_inclusive(&self, vaddr: u64) -> bool {
        vaddr >= self.virtual_address && vaddr <= self.end()
    }

    /// File offset of `vaddr`, assuming it lies within this section.
    ///
    /// Saturates so a corrupt section offset surfaces as a short read.
    pub fn offset_of(&self, vaddr: u64) -> u64 {
        self.file_offset.saturating_add(vaddr - self.virtual_address)
    }

    /// True for ELF `SHT_NULL` entries, which never map anything.
    pub fn is_null(&self) -> bool {
        self.kind == SectionKind::Elf(SHT_NULL)
    }

    pub fn from_goblin_sh(sh: &SectionHeader, elf: &Elf) -> Self {
        let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("").to_string();
        Section {
            name,
            virtual_address: sh.sh_addr,
            size: sh.sh_size,
            file_offset: sh.sh_offset,
            kind: SectionKind::Elf(sh.sh_type),
        }
    }

    /// Maps loadable segments to sections for binaries without section headers.
    ///
    /// Only the file-backed part of each segment (`p_filesz`) is mapped.
    pub fn from_goblin_ph(elf: &Elf, file_len: u64) -> Vec<Self> {
        let mut sections = vec![];
        for (i, ph) in elf.program_headers.iter().enumerate() {
            if ph.p_type != PT_LOAD {
                continue;
            }

            if ph.p_filesz == 0 || ph.p_offset.saturating_add(ph.p_filesz) > file_len {
                continue;
            }

            sections.push(Section {
                name: format!(".segment_{}", i),
                virtual_address: ph.p_vaddr,
                size: ph.p_filesz,
                file_offset: ph.p_offset,
                kind: SectionKind::Elf(SHT_PROGBITS),
            });
        }
        sections
    }

    pub fn from_goblin_pe(s: &SectionTable) -> Self {
        Section {
            name: s.name().unwrap_or("").to_string(),
            virtual_address: s.virtual_address as u64,
            size: s.size_of_raw_data as u64,
            file_offset: s.pointer_to_raw_data as u64,
            kind: SectionKind::Pe(s.characteristics),
        }
    }

    pub fn from_goblin_macho(s: &goblin::mach::segment::Section) -> Self {
        Section {
            name: s.name().unwrap_or("").to_string(),
            virtual_address: s.addr,
            size: s.size,
            file_offset: s.offset as u64,
            kind: SectionKind::MachO(s.flags),
        }
    }
}
