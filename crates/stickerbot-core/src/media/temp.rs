use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::Result;

/// Hands out collision-resistant scratch paths under one directory.
#[derive(Clone, Debug)]
pub struct TempFiles {
    dir: PathBuf,
}

impl TempFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve `<prefix>_<uuid>.<ext>`. Nothing is created on disk; whoever
    /// writes the file gets it removed when the guard drops.
    pub fn allocate(&self, prefix: &str, ext: &str) -> TempPath {
        let name = format!("{prefix}_{}.{ext}", uuid::Uuid::new_v4().simple());
        TempPath {
            path: self.dir.join(name),
        }
    }
}

/// Scratch file removed on drop, on every exit path.
#[derive(Debug)]
pub struct TempPath {
    path: PathBuf,
}

impl TempPath {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for TempPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}
