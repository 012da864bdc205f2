use std::io::Write;
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::common::Result;

/// Atomically replaces the file at `path` with `data`.
///
/// The bytes go to a temporary file in the same directory, which is synced
/// and then renamed over the target, so readers see either the old contents
/// or the new ones and never a partial write.
pub fn save_data<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    debug!("saved {} bytes to {}", data.len(), path.display());
    Ok(())
}
