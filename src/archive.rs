//! Archive construction and compaction.
//!
//! An [`Archive`] is an ordered mapping from relative member path to bytes,
//! built by walking a staging tree. Compaction writes a single zip file —
//! the format the runtime's `zipimport` loads directly — through a temporary
//! file in the destination directory that is persisted atomically, so no
//! later stage can observe a half-compacted archive. Rebuilding overwrites
//! any prior archive at the same path.

use crate::error::{ForgeError, Result};
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An in-memory archive: relative member path to bytes.
#[derive(Debug, Default)]
pub struct Archive {
    members: BTreeMap<String, Vec<u8>>,
}

impl Archive {
    /// Build an archive from every file under `root`.
    ///
    /// Member paths are relative to `root` and use forward slashes.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be read.
    pub fn from_staging_tree(root: &Utf8Path) -> Result<Self> {
        let mut members = BTreeMap::new();
        collect_members(root, root, &mut members)?;
        Ok(Self { members })
    }

    /// Member paths, in sorted order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Whether the archive holds a member at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.members.contains_key(path)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the archive has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Compact the archive into a zip file at `dest`, replacing any
    /// existing file there.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Archive`] if the zip cannot be written.
    pub fn write_zip(&self, dest: &Utf8Path) -> Result<()> {
        let dir = dest.parent().ok_or_else(|| ForgeError::Archive {
            reason: format!("archive path {dest} has no parent directory"),
        })?;
        let temp = NamedTempFile::new_in(dir)?;
        let mut writer = ZipWriter::new(temp);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in &self.members {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| ForgeError::Archive {
                    reason: format!("member {name}: {e}"),
                })?;
            writer.write_all(bytes)?;
        }

        let temp = writer.finish().map_err(|e| ForgeError::Archive {
            reason: e.to_string(),
        })?;
        temp.persist(dest).map_err(|e| ForgeError::Archive {
            reason: format!("persisting {dest}: {}", e.error),
        })?;
        Ok(())
    }
}

/// Recursively collect files under `dir` into `members`.
fn collect_members(
    root: &Utf8Path,
    dir: &Utf8Path,
    members: &mut BTreeMap<String, Vec<u8>>,
) -> Result<()> {
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_members(root, path, members)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|_| ForgeError::Archive {
                    reason: format!("{path} escapes staging root {root}"),
                })?;
            let name = relative
                .components()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join("/");
            members.insert(name, fs::read(path)?);
        }
    }
    Ok(())
}
