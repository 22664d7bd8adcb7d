use crate::embed::ExtractedEntry;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Writes `entries` beneath `root`.
///
/// Names ending in `/` become directories. Other entries get their parent
/// directories created and, when they carry content, a file written
/// verbatim. Entries without content never produce a file.
pub fn save<P: AsRef<Path>>(entries: &[ExtractedEntry], root: P) -> Result<()> {
    let root = root.as_ref();
    fs::create_dir_all(root)?;

    let mut written = 0usize;
    for entry in entries {
        let target = target_path(root, &entry.name)?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        match &entry.content {
            Some(content) => {
                fs::write(&target, content)?;
                written += 1;
            }
            None => log::debug!("{} has no content; not creating a file", entry.name),
        }
    }

    log::info!("Wrote {} files under {}", written, root.display());
    Ok(())
}

/// Joins `name` onto `root`, refusing names that could land outside it or
/// that resolve to `root` itself.
fn target_path(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let escapes = relative.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    let names_nothing = !relative
        .components()
        .any(|c| matches!(c, Component::Normal(_)));
    if escapes || names_nothing {
        return Err(Error::UnsafeEntryName(name.to_string()));
    }
    Ok(root.join(relative))
}
