//! Folder scanning for recursive uploads.
//!
//! Walks a local directory and produces one [`SelectedFile`] per regular file.
//! Relative paths start with the folder's own name and use `/` as separator,
//! so `photos/2024/a.jpg` recreates `photos/2024/` under the remote target.

use std::path::Path;

use tracing::debug;

use crate::TransferError;
use crate::types::FileSource;

/// A file picked as part of a folder selection.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Path relative to the selection's parent, `/`-separated.
    pub relative_path: String,
    pub source: FileSource,
    pub size: u64,
}

/// Scans `root` recursively. Returns the files (sorted by relative path) and
/// their total size in bytes.
pub fn scan_folder(root: &Path) -> Result<(Vec<SelectedFile>, u64), TransferError> {
    // `.` and `..` have no file name until resolved.
    let root = std::fs::canonicalize(root)?;
    let root = root.as_path();
    let folder_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::InvalidPath(format!("no folder name: {}", root.display())))?;

    let mut files = Vec::new();
    let mut total_size = 0u64;
    walk_dir(root, root, &folder_name, &mut files, &mut total_size)?;
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    debug!(root = %root.display(), files = files.len(), total_size, "folder scanned");
    Ok((files, total_size))
}

fn walk_dir(
    root: &Path,
    current: &Path,
    folder_name: &str,
    files: &mut Vec<SelectedFile>,
    total_size: &mut u64,
) -> Result<(), TransferError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, folder_name, files, total_size)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");

            files.push(SelectedFile {
                relative_path: format!("{folder_name}/{rel_str}"),
                source: FileSource::Path(path.clone()),
                size: metadata.len(),
            });
            *total_size += metadata.len();
        }
    }

    Ok(())
}
