use std::cmp::Ordering;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

use crate::browser::DownloadTrigger;
use crate::error::{HarvestError, Result};
use crate::models::CatalogEntry;
use crate::processors::snapshot::DirectorySnapshot;
use crate::utils::constants::{
    DEFAULT_EXPECTED_EXTENSIONS, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS,
    PARTIAL_DOWNLOAD_SUFFIXES,
};
use crate::utils::filename::canonical_filename;

/// Pairs a triggered download with the file it produced and moves that file
/// to its canonical name.
#[derive(Debug, Clone)]
pub struct Reconciler {
    poll_interval: Duration,
    max_attempts: u32,
    expected_extensions: Vec<String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            expected_extensions: DEFAULT_EXPECTED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_expected_extensions(mut self, extensions: Vec<String>) -> Self {
        self.expected_extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Trigger the download for `entry` and wait for its file to appear in
    /// `worker_dir`, then move it into `output_dir` under its canonical name.
    ///
    /// `worker_dir` must not be written to by anything else while this runs.
    pub async fn reconcile<T>(
        &self,
        entry: &CatalogEntry,
        trigger: &mut T,
        worker_dir: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf>
    where
        T: DownloadTrigger + ?Sized,
    {
        let file_name = canonical_filename(entry);
        self.reconcile_as(entry, &file_name, trigger, worker_dir, output_dir)
            .await
    }

    /// Same as [`Reconciler::reconcile`] with an explicit destination name.
    pub async fn reconcile_as<T>(
        &self,
        entry: &CatalogEntry,
        file_name: &str,
        trigger: &mut T,
        worker_dir: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf>
    where
        T: DownloadTrigger + ?Sized,
    {
        let before = DirectorySnapshot::capture(worker_dir)?;

        trigger.trigger_download(entry).await?;

        let downloaded = self.wait_for_new_file(worker_dir, &before).await?;
        let destination = output_dir.join(file_name);
        promote(&downloaded, &destination)?;

        tracing::info!(
            entry = %entry,
            from = %downloaded.display(),
            to = %destination.display(),
            "download reconciled"
        );
        Ok(destination)
    }

    /// Poll `dir` until a completed file not present in `before` shows up.
    /// Every poll counts as one attempt.
    ///
    /// While partial-download markers are present the poll goes on. On the
    /// last attempt a non-empty file with an expected extension is accepted
    /// even next to a marker that never went away.
    pub async fn wait_for_new_file(
        &self,
        dir: &Path,
        before: &DirectorySnapshot,
    ) -> Result<PathBuf> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let after = DirectorySnapshot::capture(dir)?;
            let delta = after.difference(before);
            if delta.is_empty() {
                tracing::trace!(attempt, "no new file yet");
                continue;
            }

            if delta.iter().any(|name| is_partial_download(name)) {
                if attempt == self.max_attempts {
                    if let Some(path) = self.settled_candidate(dir, &delta) {
                        tracing::warn!(
                            path = %path.display(),
                            "partial-download marker never cleared, taking completed file"
                        );
                        return Ok(path);
                    }
                }
                tracing::debug!(attempt, "download still in progress");
                continue;
            }

            if let Some(path) = self.select_candidate(dir, &delta) {
                tracing::debug!(attempt, path = %path.display(), "new file detected");
                return Ok(path);
            }
        }

        Err(HarvestError::DownloadTimeout {
            attempts: self.max_attempts,
        })
    }

    /// Pick one file out of a non-empty delta: expected extensions first,
    /// then the most recently modified, then the smallest name.
    pub fn select_candidate(&self, dir: &Path, names: &[OsString]) -> Option<PathBuf> {
        let mut candidates: Vec<(bool, SystemTime, &OsString)> = names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (self.is_expected(name), modified, name)
            })
            .collect();

        candidates.sort_by(|a, b| match b.0.cmp(&a.0) {
            Ordering::Equal => b.1.cmp(&a.1).then_with(|| a.2.cmp(b.2)),
            other => other,
        });

        candidates.first().map(|(_, _, name)| dir.join(name))
    }

    /// Non-empty files with an expected extension, ignoring partial markers.
    fn settled_candidate(&self, dir: &Path, names: &[OsString]) -> Option<PathBuf> {
        let settled: Vec<OsString> = names
            .iter()
            .filter(|name| !is_partial_download(name) && self.is_expected(name))
            .filter(|name| {
                fs::metadata(dir.join(name))
                    .map(|m| m.is_file() && m.len() > 0)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        self.select_candidate(dir, &settled)
    }

    fn is_expected(&self, name: &OsString) -> bool {
        extension_of(name)
            .map(|ext| self.expected_extensions.iter().any(|e| *e == ext))
            .unwrap_or(false)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(name: &OsString) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_partial_download(name: &OsString) -> bool {
    extension_of(name)
        .map(|ext| PARTIAL_DOWNLOAD_SUFFIXES.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Move `source` to `destination`, replacing whatever is there.
///
/// Falls back to copy-and-persist when a plain rename is refused, e.g.
/// across filesystems.
pub fn promote(source: &Path, destination: &Path) -> Result<()> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    match fs::remove_file(destination) {
        Ok(()) => tracing::debug!(path = %destination.display(), "replaced existing file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if let Err(e) = fs::rename(source, destination) {
        tracing::debug!("rename failed ({}), copying instead", e);
        let mut temp = NamedTempFile::new_in(parent)?;
        io::copy(&mut File::open(source)?, temp.as_file_mut())?;
        temp.persist(destination).map_err(|e| HarvestError::Io(e.error))?;
        fs::remove_file(source)?;
    }
    Ok(())
}
