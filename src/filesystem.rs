use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Abstracts the host's persistent storage so the engine can run against a native filesystem,
/// a flash-backed LittleFS/SPIFFS volume, or (in tests) a pure in-memory map.
///
/// Every operation is synchronous and non-blocking in the sense the original firmware cared
/// about: no operation here may stall the cooperative `loop_tick`, so hosts with slow flash
/// writes are expected to buffer internally.
pub trait FilesystemAdapter: Send {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&mut self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn remove(&mut self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;

    /// List file names directly under `dir` (non-recursive), used by the transaction/meter-value
    /// stores to recover their ring-buffer bounds on boot.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// A [`FilesystemAdapter`] backed by the host OS filesystem.
pub struct NativeFilesystem {
    root: PathBuf,
}

impl NativeFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl FilesystemAdapter for NativeFilesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn write(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, data)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        let full = self.resolve(path);
        if full.exists() {
            std::fs::remove_file(full)
        } else {
            Ok(())
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let full = self.resolve(dir);
        if !full.exists() {
            return Ok(vec![]);
        }
        let mut names = vec![];
        for entry in std::fs::read_dir(full)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// In-memory [`FilesystemAdapter`] used by unit tests and as a reference implementation for
/// hosts without durable storage (volatile configuration only).
#[derive(Default)]
pub struct MemFilesystem {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemFilesystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilesystemAdapter for MemFilesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        self.files.remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter_map(|p| {
                let parent = p.parent()?;
                if parent == dir {
                    p.file_name()?.to_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_filesystem_roundtrip() {
        let mut fs = MemFilesystem::new();
        let path = Path::new("config.json");
        assert!(!fs.exists(path));
        fs.write(path, b"{}").unwrap();
        assert!(fs.exists(path));
        assert_eq!(fs.read(path).unwrap(), b"{}");
        fs.remove(path).unwrap();
        assert!(!fs.exists(path));
    }

    #[test]
    fn mem_filesystem_lists_directory_members() {
        let mut fs = MemFilesystem::new();
        fs.write(Path::new("tx/0000000001"), b"a").unwrap();
        fs.write(Path::new("tx/0000000002"), b"b").unwrap();
        fs.write(Path::new("other.bin"), b"c").unwrap();
        let mut names = fs.list(Path::new("tx")).unwrap();
        names.sort();
        assert_eq!(names, vec!["0000000001", "0000000002"]);
    }

    #[test]
    fn native_filesystem_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = NativeFilesystem::new(dir.path()).unwrap();
        let path = Path::new("a/b.txt");
        fs.write(path, b"hello").unwrap();
        assert_eq!(fs.read(path).unwrap(), b"hello");
        assert_eq!(fs.list(Path::new("a")).unwrap(), vec!["b.txt"]);
    }
}
