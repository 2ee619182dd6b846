//! Abstract, mountable file-system collaborator used by persistence
//! managers and search indexes (spec §4.4 collaborator list). The
//! repository kernel never touches `std::fs` directly outside this trait
//! and [`crate::io`]: a narrow, testable interface over raw filesystem
//! calls instead of scattering them through the codebase.

use std::io;
use std::path::PathBuf;

/// A mountable filesystem root. Paths passed to trait methods are always
/// relative to the root the implementation was opened with.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
    fn write(&self, path: &str, contents: &[u8]) -> io::Result<()>;
    fn delete(&self, path: &str) -> io::Result<()>;
    fn make_parent_dirs(&self, path: &str) -> io::Result<()>;
    fn list(&self, path: &str) -> io::Result<Vec<String>>;
    /// Release any held resources. A no-op for the local implementation;
    /// present so remote-backed implementations have a place to flush and
    /// disconnect.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Local-disk [`FileSystem`] rooted at a fixed directory, using
/// [`crate::io::write_atomic`] for every write.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn write(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        crate::io::write_atomic(&self.resolve(path), contents)
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        let full = self.resolve(path);
        if full.is_dir() {
            std::fs::remove_dir_all(full)
        } else {
            std::fs::remove_file(full)
        }
    }

    fn make_parent_dirs(&self, path: &str) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let full = self.resolve(path);
        let mut names = Vec::new();
        for entry in std::fs::read_dir(full)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory [`FileSystem`], for workspaces that have no configured
/// on-disk root (tests, transient repositories).
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileSystem for InMemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn write(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        self.files.lock().unwrap().insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn make_parent_dirs(&self, _path: &str) -> io::Result<()> {
        Ok(())
    }

    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(|s| s.to_string()))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn _assert_object_safe(_: &dyn FileSystem) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        fs.write("a/b.txt", b"hello").unwrap();
        assert_eq!(fs.read("a/b.txt").unwrap(), b"hello");
        assert!(fs.exists("a/b.txt"));
    }

    #[test]
    fn list_returns_sorted_entries() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        fs.write("dir/z.txt", b"1").unwrap();
        fs.write("dir/a.txt", b"2").unwrap();
        assert_eq!(fs.list("dir").unwrap(), vec!["a.txt", "z.txt"]);
    }

    #[test]
    fn delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        fs.write("f.txt", b"1").unwrap();
        fs.delete("f.txt").unwrap();
        assert!(!fs.exists("f.txt"));
    }

    #[test]
    fn in_memory_file_system_round_trips() {
        let fs = InMemoryFileSystem::new();
        fs.write("a/b.txt", b"hello").unwrap();
        assert_eq!(fs.read("a/b.txt").unwrap(), b"hello");
        assert_eq!(fs.list("a").unwrap(), vec!["b.txt"]);
        fs.delete("a/b.txt").unwrap();
        assert!(!fs.exists("a/b.txt"));
    }
}
