use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// Names of the regular files present in a directory at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    files: BTreeSet<OsString>,
}

impl DirectorySnapshot {
    /// Capture the directory's current contents. A missing directory is an
    /// empty snapshot.
    pub fn capture(dir: &Path) -> std::io::Result<Self> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        let mut files = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.insert(entry.file_name());
            }
        }
        Ok(Self { files })
    }

    /// Files present now that were not present in `before`.
    pub fn difference(&self, before: &DirectorySnapshot) -> Vec<OsString> {
        self.files.difference(&before.files).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains(std::ffi::OsStr::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_difference_lists_only_new_files() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("old.xls"), b"a")?;
        let before = DirectorySnapshot::capture(dir.path())?;

        fs::write(dir.path().join("new.xls"), b"b")?;
        fs::create_dir(dir.path().join("subdir"))?;
        let after = DirectorySnapshot::capture(dir.path())?;

        assert_eq!(after.difference(&before), vec![OsString::from("new.xls")]);
        assert!(before.difference(&after).is_empty());
        assert_eq!(after.len(), 2);
        assert!(after.contains("old.xls"));
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_empty() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let snapshot = DirectorySnapshot::capture(&dir.path().join("absent"))?;
        assert!(snapshot.is_empty());
        Ok(())
    }
}
