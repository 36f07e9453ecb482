use std::fs::create_dir_all;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::debug;
use tracing::error;

use crate::Result;

pub fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(e.into());
            }
        }
    }
    Ok(())
}

pub fn open_file_for_append(path: &Path) -> Result<File> {
    create_parent_dir_if_not_exist(path)?;
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    Ok(file)
}

/// Replaces the content of `path` so readers see either the old or the new
/// bytes, never a partial write.
pub fn write_atomically(
    path: &Path,
    buf: &[u8],
) -> Result<()> {
    create_parent_dir_if_not_exist(path)?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(buf)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    debug!("wrote {} bytes into {:?}", buf.len(), path);
    Ok(())
}

/// Reads the whole file, or `None` when it does not exist.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(buf) => Ok(Some(buf)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
