//! Small filesystem helpers shared by the file stores.

use gauntlet_application::StoreError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` via a sibling temp file and a rename.
///
/// Readers see either the old document or the new one, never a torn write.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::io(path.display(), "path has no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent.display(), e))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(|e| StoreError::io(tmp_path.display(), e))?;
    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path.display(), e))?;
    Ok(())
}

/// Read a file, mapping "does not exist" to `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path.display(), e)),
    }
}

/// Remove a file; a missing file is not an error.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path.display(), e)),
    }
}

/// Entries of `dir` matching `keep`, as paths. A missing directory is empty.
pub(crate) fn list_entries(
    dir: &Path,
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir.display(), e)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir.display(), e))?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Names of the `.json` documents in `dir`, without the extension.
pub(crate) fn json_stems(dir: &Path) -> Result<Vec<String>, StoreError> {
    Ok(list_entries(dir, |p| {
        p.is_file() && p.extension().is_some_and(|ext| ext == "json")
    })?
    .iter()
    .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
    .collect())
}

/// Reject identifiers that would escape their directory.
pub(crate) fn path_component(id: &str) -> Result<&str, StoreError> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.contains('\0');
    if valid {
        Ok(id)
    } else {
        Err(StoreError::NotFound(format!("invalid identifier '{}'", id)))
    }
}
