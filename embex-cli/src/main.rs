use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use embex_core::{open_translator, ExtractedEntry, Format};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

/// Recover files embedded in a compiled executable
#[derive(Parser)]
#[command(
    name = "embex",
    about = "Extract embedded file tables from ELF, PE and Mach-O binaries",
    version,
    author
)]
struct Cli {
    /// Path to binary file
    #[arg(required = true)]
    path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the table at a virtual address and write it to disk
    Extract {
        /// Virtual address of the table header, in hex (e.g. 0x4b9e40)
        #[arg(long, value_parser = parse_vaddr)]
        vaddr: u64,

        /// Directory the entries are written under
        #[arg(long, short, env = "EMBEX_OUTPUT", default_value = "out")]
        output: PathBuf,
    },
    /// List the table at a virtual address without writing anything
    List {
        /// Virtual address of the table header, in hex
        #[arg(long, value_parser = parse_vaddr)]
        vaddr: u64,

        /// Print a JSON manifest instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Translate a virtual address to a file offset
    Translate {
        #[arg(value_parser = parse_vaddr)]
        vaddr: u64,
    },
    /// Show the detected format and section table
    Sections,
}

/// Hex with or without a `0x` prefix; digits are always hexadecimal.
fn parse_vaddr(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address {s:?}: {e}"))
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Hash")]
    hash: String,
}

#[derive(Serialize)]
struct Manifest<'a> {
    path: &'a Path,
    format: Format,
    vaddr: u64,
    entries: Vec<ManifestEntry<'a>>,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    name: &'a str,
    size: Option<usize>,
    hash: String,
}

fn extract(path: &Path, vaddr: u64) -> Result<Vec<ExtractedEntry>> {
    log::debug!("Extracting table at {vaddr:#x} from {}", path.display());
    embex_core::extract(path, vaddr)
        .with_context(|| format!("failed to extract table at {vaddr:#x} from {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = cli.path.as_path();

    match cli.command {
        Command::Extract { vaddr, output } => {
            let entries = extract(path, vaddr)?;
            println!(
                "{} Extracted {} files",
                "[+]".green().bold(),
                entries.len()
            );

            embex_core::save(&entries, &output)
                .with_context(|| format!("failed to save entries to {}", output.display()))?;
            println!("Saved to {}", output.display().to_string().bold());
        }

        Command::List { vaddr, json } => {
            let entries = extract(path, vaddr)?;

            if json {
                let manifest = Manifest {
                    path,
                    format: embex_core::sniff_path(path)?,
                    vaddr,
                    entries: entries
                        .iter()
                        .map(|e| ManifestEntry {
                            name: &e.name,
                            size: e.content.as_ref().map(Vec::len),
                            hash: e.hash_hex(),
                        })
                        .collect(),
                };
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else if entries.is_empty() {
                println!("Table at {vaddr:#x} is empty.");
            } else {
                let rows = entries.iter().enumerate().map(|(index, e)| EntryRow {
                    index,
                    name: e.name.clone(),
                    size: e
                        .content
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |c| c.len().to_string()),
                    hash: e.hash_hex(),
                });
                println!("{}", Table::new(rows).with(Style::modern()));
            }
        }

        Command::Translate { vaddr } => {
            let translator = open_translator(path)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let offset = translator.translate(vaddr)?;
            println!("{vaddr:#x} -> file offset {offset:#x}");
        }

        Command::Sections => {
            let translator = open_translator(path)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let sections = translator.sections()?;
            println!("Format: {}", translator.format().to_string().cyan());
            if sections.is_empty() {
                println!("No sections found.");
            } else {
                println!(
                    "{:<20} {:<18} {:<10} {:<10}",
                    "Section", "VMA", "Size", "Offset"
                );
                println!("{}", "-".repeat(62));
                for s in sections {
                    println!(
                        "{:<20} 0x{:<16x} {:<10x} {:<10x}",
                        s.name, s.virtual_address, s.size, s.file_offset
                    );
                }
            }
        }
    }

    Ok(())
}
