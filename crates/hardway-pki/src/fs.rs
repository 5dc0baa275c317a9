//! Atomic file persistence
//!
//! Files are staged in the destination directory, fsynced, then renamed over
//! the final path. A reader never observes a half-written file; a crash
//! between stage and commit leaves only a hidden temp file behind.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

const STAGE_PREFIX: &str = ".hardway-";
const STAGE_SUFFIX: &str = ".tmp";

/// Who may read a committed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileMode {
    /// Owner only (0600): private keys and anything embedding them
    Private,
    /// World readable (0644): certificates and configuration
    Public,
}

/// Contents written and fsynced to a temp file, not yet visible at `target`
#[derive(Debug)]
pub(crate) struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Write `contents` to a temp file next to `target`
    pub(crate) fn stage(target: &Path, contents: &[u8], mode: FileMode) -> Result<Self> {
        let dir = parent_dir(target);
        let mut temp = tempfile::Builder::new()
            .prefix(STAGE_PREFIX)
            .suffix(STAGE_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| Error::io(dir, e))?;

        set_mode(temp.as_file(), mode).map_err(|e| Error::io(temp.path(), e))?;
        temp.write_all(contents)
            .map_err(|e| Error::io(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::io(temp.path(), e))?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Rename the temp file over its target
    pub(crate) fn commit(self) -> Result<PathBuf> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| Error::io(&target, e.error))?;
        sync_dir(parent_dir(&target))?;
        debug!(path = %target.display(), "committed file");
        Ok(target)
    }
}

/// Stage and commit a single file
pub(crate) fn write_atomic(target: &Path, contents: &[u8], mode: FileMode) -> Result<PathBuf> {
    StagedFile::stage(target, contents, mode)?.commit()
}

/// Remove `path` if it exists and sync the removal to disk
pub(crate) fn remove_durable(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed file");
            sync_dir(parent_dir(path))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// True when `path` names a temp file left behind by an interrupted write
pub(crate) fn is_staging_file(file_name: &str) -> bool {
    file_name.starts_with(STAGE_PREFIX) && file_name.ends_with(STAGE_SUFFIX)
}

/// Read a file, mapping "not found" to `None`
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn set_mode(file: &File, mode: FileMode) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let bits = match mode {
        FileMode::Private => 0o600,
        FileMode::Public => 0o644,
    };
    file.set_permissions(std::fs::Permissions::from_mode(bits))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: FileMode) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
