use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

/// Storage for mirrored documents, addressed by slash-delimited paths
/// relative to the vault root.
pub trait Vault: Sync {
    /// Remove a directory and everything below it. A missing directory is
    /// not an error.
    fn remove_tree(&self, path: &str) -> io::Result<()>;
    /// Create or overwrite a file, creating parent directories as needed.
    fn write_file(&self, path: &str, content: &str) -> io::Result<()>;
}

/// A vault that is a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsVault { root: root.into() }
    }

    /// Map a vault path onto the filesystem. Empty, `.` and `..` segments are
    /// dropped so a path can never leave the root.
    pub fn full_path(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for component in Path::new(path).components() {
            if let Component::Normal(part) = component {
                full.push(part);
            }
        }
        full
    }
}

impl Vault for FsVault {
    fn remove_tree(&self, path: &str) -> io::Result<()> {
        let full = self.full_path(path);
        if full == self.root {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to remove the vault root",
            ));
        }
        match fs::remove_dir_all(&full) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn write_file(&self, path: &str, content: &str) -> io::Result<()> {
        let full = self.full_path(path);
        if let Some(dir) = full.parent() {
            fs::create_dir_all(dir)?;
        }
        atomic_write(&full, content.as_bytes())
    }
}

/// Write via a temp file in the same directory, then rename over the target.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
