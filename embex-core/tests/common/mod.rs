//! Synthetic binaries and embed tables for integration tests.
//!
//! The builders emit just enough of each container for goblin to parse a
//! section table: no symbols, no relocations, no code.

#![allow(dead_code)]

use byteorder::{WriteBytesExt, LE};
use std::io::Write;
use tempfile::NamedTempFile;

pub const RECORD_LEN: u64 = 48;

/// Contents placed at `vaddr` (an RVA for PE).
#[derive(Debug, Clone)]
pub struct FixtureSection {
    pub name: &'static str,
    pub vaddr: u64,
    pub data: Vec<u8>,
}

impl FixtureSection {
    pub fn new(name: &'static str, vaddr: u64, data: Vec<u8>) -> Self {
        Self { name, vaddr, data }
    }
}

/// A built container and the file offset of each section's data.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub offsets: Vec<u64>,
}

impl Fixture {
    pub fn write(&self) -> NamedTempFile {
        write_temp(&self.bytes)
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn align(buf: &mut Vec<u8>, to: usize) {
    let len = buf.len().div_ceil(to) * to;
    buf.resize(len, 0);
}

fn name_field<const N: usize>(name: &str) -> [u8; N] {
    let mut field = [0u8; N];
    field[..name.len()].copy_from_slice(name.as_bytes());
    field
}

// ---------------------------------------------------------------- ELF

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHF_ALLOC: u64 = 2;
const PT_LOAD: u32 = 1;

/// ELF64 little-endian executable with one section per fixture section,
/// a leading null section and a trailing `.shstrtab`.
pub fn elf64(sections: &[FixtureSection]) -> Fixture {
    let mut out = vec![0u8; 64];
    let offsets = place_data(&mut out, sections, 16);

    let mut strtab = vec![0u8];
    let mut names = Vec::new();
    for s in sections {
        names.push(strtab.len() as u32);
        strtab.extend_from_slice(s.name.as_bytes());
        strtab.push(0);
    }
    let shstrtab_name = strtab.len() as u32;
    strtab.extend_from_slice(b".shstrtab\0");
    let strtab_off = out.len() as u64;
    out.extend_from_slice(&strtab);

    align(&mut out, 8);
    let shoff = out.len() as u64;
    out.extend_from_slice(&[0u8; 64]);
    for (i, s) in sections.iter().enumerate() {
        write_shdr(
            &mut out,
            names[i],
            SHT_PROGBITS,
            SHF_ALLOC,
            s.vaddr,
            offsets[i],
            s.data.len() as u64,
        );
    }
    write_shdr(&mut out, shstrtab_name, SHT_STRTAB, 0, 0, strtab_off, strtab.len() as u64);

    let shnum = (sections.len() + 2) as u16;
    let header = elf_header(0, 0, shoff, shnum, shnum - 1);
    out[..64].copy_from_slice(&header);
    Fixture {
        bytes: out,
        offsets,
    }
}

/// ELF64 without section headers; each fixture section becomes a `PT_LOAD`.
pub fn elf64_stripped(sections: &[FixtureSection]) -> Fixture {
    let phoff = 64u64;
    let mut out = vec![0u8; 64 + 56 * sections.len()];
    let offsets = place_data(&mut out, sections, 16);

    let mut phdrs = Vec::new();
    for (i, s) in sections.iter().enumerate() {
        let len = s.data.len() as u64;
        phdrs.write_u32::<LE>(PT_LOAD).unwrap();
        phdrs.write_u32::<LE>(4).unwrap();
        phdrs.write_u64::<LE>(offsets[i]).unwrap();
        phdrs.write_u64::<LE>(s.vaddr).unwrap();
        phdrs.write_u64::<LE>(s.vaddr).unwrap();
        phdrs.write_u64::<LE>(len).unwrap();
        phdrs.write_u64::<LE>(len).unwrap();
        phdrs.write_u64::<LE>(1).unwrap();
    }
    out[64..64 + phdrs.len()].copy_from_slice(&phdrs);

    let header = elf_header(phoff, sections.len() as u16, 0, 0, 0);
    out[..64].copy_from_slice(&header);
    Fixture {
        bytes: out,
        offsets,
    }
}

fn place_data(out: &mut Vec<u8>, sections: &[FixtureSection], alignment: usize) -> Vec<u64> {
    let mut offsets = Vec::new();
    for s in sections {
        align(out, alignment);
        offsets.push(out.len() as u64);
        out.extend_from_slice(&s.data);
    }
    offsets
}

fn elf_header(phoff: u64, phnum: u16, shoff: u64, shnum: u16, shstrndx: u16) -> Vec<u8> {
    let mut h = Vec::with_capacity(64);
    h.extend_from_slice(b"\x7fELF");
    h.extend_from_slice(&[2, 1, 1, 0]);
    h.extend_from_slice(&[0u8; 8]);
    h.write_u16::<LE>(2).unwrap(); // ET_EXEC
    h.write_u16::<LE>(62).unwrap(); // EM_X86_64
    h.write_u32::<LE>(1).unwrap();
    h.write_u64::<LE>(0).unwrap();
    h.write_u64::<LE>(phoff).unwrap();
    h.write_u64::<LE>(shoff).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u16::<LE>(64).unwrap();
    h.write_u16::<LE>(56).unwrap();
    h.write_u16::<LE>(phnum).unwrap();
    h.write_u16::<LE>(64).unwrap();
    h.write_u16::<LE>(shnum).unwrap();
    h.write_u16::<LE>(shstrndx).unwrap();
    h
}

fn write_shdr(out: &mut Vec<u8>, name: u32, kind: u32, flags: u64, addr: u64, offset: u64, size: u64) {
    out.write_u32::<LE>(name).unwrap();
    out.write_u32::<LE>(kind).unwrap();
    out.write_u64::<LE>(flags).unwrap();
    out.write_u64::<LE>(addr).unwrap();
    out.write_u64::<LE>(offset).unwrap();
    out.write_u64::<LE>(size).unwrap();
    out.write_u32::<LE>(0).unwrap();
    out.write_u32::<LE>(0).unwrap();
    out.write_u64::<LE>(1).unwrap();
    out.write_u64::<LE>(0).unwrap();
}

// ---------------------------------------------------------------- PE

pub const PE_FILE_ALIGNMENT: usize = 0x200;
const PE_HEADERS_SIZE: usize = 0x400;
const PE_POINTER: usize = 0x80;
const OPTIONAL_HEADER32_SIZE: u16 = 224;
const OPTIONAL_HEADER64_SIZE: u16 = 240;

/// PE32+ image. Section `vaddr`s are RVAs; raw data is file-aligned and
/// `SizeOfRawData` is the aligned length.
pub fn pe64(image_base: u64, sections: &[FixtureSection]) -> Fixture {
    pe_image(image_base, sections, true)
}

/// PE32 image: 32-bit `ImageBase` following `BaseOfData`.
pub fn pe32(image_base: u32, sections: &[FixtureSection]) -> Fixture {
    pe_image(image_base as u64, sections, false)
}

fn pe_image(image_base: u64, sections: &[FixtureSection], is_64: bool) -> Fixture {
    let mut out = vec![0u8; PE_HEADERS_SIZE];
    let offsets = place_data(&mut out, sections, PE_FILE_ALIGNMENT);
    align(&mut out, PE_FILE_ALIGNMENT);

    out[0..2].copy_from_slice(b"MZ");
    out[0x3c..0x40].copy_from_slice(&(PE_POINTER as u32).to_le_bytes());

    let size_of_image = sections
        .iter()
        .map(|s| s.vaddr + s.data.len() as u64)
        .max()
        .unwrap_or(0)
        .next_multiple_of(0x1000) as u32;

    let (machine, optional_size, characteristics, magic) = if is_64 {
        (0x8664u16, OPTIONAL_HEADER64_SIZE, 0x22u16, 0x20bu16)
    } else {
        (0x14c, OPTIONAL_HEADER32_SIZE, 0x102, 0x10b)
    };

    let mut h = Vec::new();
    h.extend_from_slice(b"PE\0\0");
    // COFF file header
    h.write_u16::<LE>(machine).unwrap();
    h.write_u16::<LE>(sections.len() as u16).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u16::<LE>(optional_size).unwrap();
    h.write_u16::<LE>(characteristics).unwrap();
    let optional_start = h.len();
    // optional header, standard fields
    h.write_u16::<LE>(magic).unwrap();
    h.write_u8(14).unwrap();
    h.write_u8(0).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0x1000).unwrap();
    if !is_64 {
        // BaseOfData
        h.write_u32::<LE>(0x2000).unwrap();
    }
    // windows fields
    if is_64 {
        h.write_u64::<LE>(image_base).unwrap();
    } else {
        h.write_u32::<LE>(image_base as u32).unwrap();
    }
    h.write_u32::<LE>(0x1000).unwrap();
    h.write_u32::<LE>(PE_FILE_ALIGNMENT as u32).unwrap();
    for v in [6u16, 0, 0, 0, 6, 0] {
        h.write_u16::<LE>(v).unwrap();
    }
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(size_of_image).unwrap();
    h.write_u32::<LE>(PE_HEADERS_SIZE as u32).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u16::<LE>(3).unwrap();
    h.write_u16::<LE>(if is_64 { 0x8160 } else { 0x8140 }).unwrap();
    for v in [0x10_0000u64, 0x1000, 0x10_0000, 0x1000] {
        if is_64 {
            h.write_u64::<LE>(v).unwrap();
        } else {
            h.write_u32::<LE>(v as u32).unwrap();
        }
    }
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(16).unwrap();
    h.extend_from_slice(&[0u8; 16 * 8]);
    assert_eq!(h.len() - optional_start, optional_size as usize);
    // section table
    for (i, s) in sections.iter().enumerate() {
        let raw_size = s.data.len().div_ceil(PE_FILE_ALIGNMENT) * PE_FILE_ALIGNMENT;
        h.extend_from_slice(&name_field::<8>(s.name));
        h.write_u32::<LE>(s.data.len() as u32).unwrap();
        h.write_u32::<LE>(s.vaddr as u32).unwrap();
        h.write_u32::<LE>(raw_size as u32).unwrap();
        h.write_u32::<LE>(offsets[i] as u32).unwrap();
        h.write_u32::<LE>(0).unwrap();
        h.write_u32::<LE>(0).unwrap();
        h.write_u16::<LE>(0).unwrap();
        h.write_u16::<LE>(0).unwrap();
        h.write_u32::<LE>(0x4000_0040).unwrap();
    }
    assert!(PE_POINTER + h.len() <= PE_HEADERS_SIZE, "too many sections");
    out[PE_POINTER..PE_POINTER + h.len()].copy_from_slice(&h);

    Fixture {
        bytes: out,
        offsets,
    }
}

// ---------------------------------------------------------------- Mach-O

const MH_MAGIC_64: u32 = 0xfeed_facf;
const LC_SEGMENT_64: u32 = 0x19;
const SEGMENT_COMMAND_64_SIZE: usize = 72;
const SECTION_64_SIZE: usize = 80;

/// Mach-O 64 executable with a single `__TEXT` segment spanning the file
/// and one section per fixture section.
pub fn macho64(sections: &[FixtureSection]) -> Fixture {
    let cmdsize = SEGMENT_COMMAND_64_SIZE + SECTION_64_SIZE * sections.len();
    let mut out = vec![0u8; 32 + cmdsize];
    let offsets = place_data(&mut out, sections, 16);
    align(&mut out, 16);
    let file_len = out.len() as u64;

    let mut h = Vec::new();
    h.write_u32::<LE>(MH_MAGIC_64).unwrap();
    h.write_u32::<LE>(0x0100_0007).unwrap();
    h.write_u32::<LE>(3).unwrap();
    h.write_u32::<LE>(2).unwrap(); // MH_EXECUTE
    h.write_u32::<LE>(1).unwrap();
    h.write_u32::<LE>(cmdsize as u32).unwrap();
    h.write_u32::<LE>(0).unwrap();
    h.write_u32::<LE>(0).unwrap();

    let vm_end = sections
        .iter()
        .map(|s| s.vaddr + s.data.len() as u64)
        .max()
        .unwrap_or(0);
    h.write_u32::<LE>(LC_SEGMENT_64).unwrap();
    h.write_u32::<LE>(cmdsize as u32).unwrap();
    h.extend_from_slice(&name_field::<16>("__TEXT"));
    h.write_u64::<LE>(0).unwrap();
    h.write_u64::<LE>(vm_end.next_multiple_of(0x1000)).unwrap();
    h.write_u64::<LE>(0).unwrap();
    h.write_u64::<LE>(file_len).unwrap();
    h.write_u32::<LE>(5).unwrap();
    h.write_u32::<LE>(5).unwrap();
    h.write_u32::<LE>(sections.len() as u32).unwrap();
    h.write_u32::<LE>(0).unwrap();

    for (i, s) in sections.iter().enumerate() {
        h.extend_from_slice(&name_field::<16>(s.name));
        h.extend_from_slice(&name_field::<16>("__TEXT"));
        h.write_u64::<LE>(s.vaddr).unwrap();
        h.write_u64::<LE>(s.data.len() as u64).unwrap();
        h.write_u32::<LE>(offsets[i] as u32).unwrap();
        for _ in 0..7 {
            h.write_u32::<LE>(0).unwrap();
        }
    }
    out[..h.len()].copy_from_slice(&h);

    Fixture {
        bytes: out,
        offsets,
    }
}

// ---------------------------------------------------------------- tables

/// One file to embed: name, optional content, hash.
pub type TableFile = (String, Option<Vec<u8>>, [u8; 16]);

/// An embed table laid out for a section loaded at `base`.
///
/// Records come first (so `entries == base`), then the 24-byte header,
/// then every name and content blob.
#[derive(Debug, Clone)]
pub struct EmbedTable {
    pub data: Vec<u8>,
    pub root: u64,
    pub entries: u64,
    /// Offset of the capacity word within `data`.
    pub capacity_at: usize,
}

impl EmbedTable {
    pub fn new(base: u64, files: &[TableFile]) -> Self {
        Self::with_capacity(base, files, files.len() as u64)
    }

    pub fn with_capacity(base: u64, files: &[TableFile], capacity: u64) -> Self {
        let n = files.len() as u64;
        let header_at = n * RECORD_LEN;
        let mut blob_at = header_at + 24;

        let mut records = Vec::new();
        let mut blobs = Vec::new();
        for (name, content, hash) in files {
            records.write_u64::<LE>(base + blob_at).unwrap();
            records.write_u64::<LE>(name.len() as u64).unwrap();
            blobs.extend_from_slice(name.as_bytes());
            blob_at += name.len() as u64;

            match content {
                Some(c) => {
                    records.write_u64::<LE>(base + blob_at).unwrap();
                    records.write_u64::<LE>(c.len() as u64).unwrap();
                    blobs.extend_from_slice(c);
                    blob_at += c.len() as u64;
                }
                None => {
                    records.write_u64::<LE>(0).unwrap();
                    records.write_u64::<LE>(0).unwrap();
                }
            }
            records.extend_from_slice(hash);
        }

        let mut data = records;
        data.write_u64::<LE>(base).unwrap();
        data.write_u64::<LE>(n).unwrap();
        data.write_u64::<LE>(capacity).unwrap();
        data.extend_from_slice(&blobs);

        Self {
            data,
            root: base + header_at,
            entries: base,
            capacity_at: header_at as usize + 16,
        }
    }
}

/// `file_k.txt` holding `hello k`, hashed as `k` repeated.
pub fn numbered_files(n: usize) -> Vec<TableFile> {
    (0..n)
        .map(|k| {
            (
                format!("file_{k}.txt"),
                Some(format!("hello {k}").into_bytes()),
                [k as u8; 16],
            )
        })
        .collect()
}

pub fn assert_numbered(entries: &[embex_core::ExtractedEntry], n: usize) {
    assert_eq!(entries.len(), n);
    for (k, entry) in entries.iter().enumerate() {
        assert_eq!(entry.name, format!("file_{k}.txt"));
        assert_eq!(entry.content.as_deref(), Some(format!("hello {k}").as_bytes()));
        assert_eq!(entry.hash, [k as u8; 16]);
    }
}
