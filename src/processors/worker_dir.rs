use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::Result;

/// A download directory owned by exactly one worker.
///
/// Created under the staging root so that promoting a file into the shared
/// directory is a same-filesystem rename. Removed when closed or dropped.
#[derive(Debug)]
pub struct WorkerDirectory {
    worker_id: usize,
    dir: TempDir,
}

impl WorkerDirectory {
    pub fn create(staging_root: &Path, worker_id: usize) -> Result<Self> {
        fs::create_dir_all(staging_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("worker-{}-", worker_id))
            .tempdir_in(staging_root)?;

        tracing::debug!(worker = worker_id, path = %dir.path().display(), "worker directory created");
        Ok(Self { worker_id, dir })
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove everything left behind by the previous task.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(self.dir.path())? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            removed += 1;
        }
        if removed > 0 {
            tracing::debug!(worker = self.worker_id, removed, "worker directory cleared");
        }
        Ok(removed)
    }

    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.dir.path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete the directory and its contents.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(worker = self.worker_id, path = %path.display(), "worker directory removed");
        Ok(())
    }
}

/// Remove the staging root if no worker directory is left in it.
pub fn remove_staging_root_if_empty(staging_root: &Path) -> Result<()> {
    match fs::read_dir(staging_root) {
        Ok(mut entries) => {
            if entries.next().is_none() {
                fs::remove_dir(staging_root)?;
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_worker_directories_are_private() -> Result<()> {
        let root = TempDir::new()?;
        let staging = root.path().join(".staging");

        let a = WorkerDirectory::create(&staging, 0)?;
        let b = WorkerDirectory::create(&staging, 1)?;
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(&staging));

        fs::write(a.path().join("export.xls"), b"x")?;
        assert_eq!(a.list_files()?.len(), 1);
        assert!(b.list_files()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_clear_and_close() -> Result<()> {
        let root = TempDir::new()?;
        let staging = root.path().join(".staging");
        let dir = WorkerDirectory::create(&staging, 3)?;
        fs::write(dir.path().join("a.part"), b"x")?;
        fs::write(dir.path().join("b.xls"), b"y")?;

        assert_eq!(dir.clear()?, 2);
        assert!(dir.list_files()?.is_empty());

        let path = dir.path().to_path_buf();
        dir.close()?;
        assert!(!path.exists());

        remove_staging_root_if_empty(&staging)?;
        assert!(!staging.exists());
        Ok(())
    }

    #[test]
    fn test_staging_root_kept_while_in_use() -> Result<()> {
        let root = TempDir::new()?;
        let staging = root.path().join(".staging");
        let _dir = WorkerDirectory::create(&staging, 0)?;

        remove_staging_root_if_empty(&staging)?;
        assert!(staging.exists());
        Ok(())
    }
}
