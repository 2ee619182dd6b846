//! Atomic whole-file replacement.
//!
//! [`write_atomic`] writes to a sibling temp file, fsyncs it, then renames it
//! over the target. `rename(2)`/`MoveFileEx` is atomic on the same
//! filesystem, so a reader never observes a partially written file. This
//! closes the Open Question in spec §9: registry mutations are written to
//! disk *before* they are allowed to be observed as committed, rather than
//! mutating in-memory state first and hoping `store()` succeeds later.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp_path = tmp_path_for(path);
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tmp".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}
