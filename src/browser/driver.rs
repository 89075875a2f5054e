use std::fs;
use std::io::{self, Cursor, Read};
use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use flate2::read::GzDecoder;
use tempfile::NamedTempFile;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::error::{HarvestError, Result};
use crate::utils::constants::{
    DEFAULT_INSTALL_RETRIES, DEFAULT_INSTALL_RETRY_DELAY_SECS, DRIVER_CACHE_DIR,
    GECKODRIVER_RELEASE_URL, GECKODRIVER_VERSION,
};
use crate::utils::retry::retry_with_backoff;

const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STARTUP_MAX_POLLS: u32 = 100;

/// Local cache holding a pinned geckodriver binary.
#[derive(Debug, Clone)]
pub struct DriverCache {
    cache_dir: PathBuf,
    version: String,
    release_url: String,
    max_retries: u32,
    initial_delay: Duration,
}

impl DriverCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            version: GECKODRIVER_VERSION.to_string(),
            release_url: GECKODRIVER_RELEASE_URL.to_string(),
            max_retries: DEFAULT_INSTALL_RETRIES,
            initial_delay: Duration::from_secs(DEFAULT_INSTALL_RETRY_DELAY_SECS),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_delay = initial_delay;
        self
    }

    /// Where the driver binary lives once installed.
    pub fn cached_path(&self) -> PathBuf {
        self.cache_dir.join(binary_name(std::env::consts::OS))
    }

    pub fn is_cached(&self) -> bool {
        is_executable(&self.cached_path())
    }

    /// Return the cached driver, downloading it first when it is missing or
    /// not executable.
    pub async fn ensure_installed(&self) -> Result<PathBuf> {
        let path = self.cached_path();
        if is_executable(&path) {
            tracing::debug!(path = %path.display(), "using cached geckodriver");
            return Ok(path);
        }

        let asset = asset_name(&self.version, std::env::consts::OS, std::env::consts::ARCH)
            .ok_or_else(|| HarvestError::DriverInstall {
                attempts: 0,
                message: format!(
                    "no geckodriver build for {}/{}",
                    std::env::consts::OS,
                    std::env::consts::ARCH
                ),
            })?;
        let url = format!("{}/{}/{}", self.release_url, self.version, asset);

        tracing::info!(url = %url, "installing geckodriver");
        let attempts = self.max_retries.max(1);
        retry_with_backoff("geckodriver install", attempts, self.initial_delay, |_| {
            self.install_once(&url, &asset)
        })
        .await
        .map_err(|e| match e {
            e @ HarvestError::DriverInstall { .. } => e,
            other => HarvestError::DriverInstall {
                attempts,
                message: other.to_string(),
            },
        })
    }

    async fn install_once(&self, url: &str, asset: &str) -> Result<PathBuf> {
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;

        fs::create_dir_all(&self.cache_dir)?;
        let dest = self.cached_path();
        let binary = binary_name(std::env::consts::OS);

        let mut temp = NamedTempFile::new_in(&self.cache_dir)?;
        if asset.ends_with(".zip") {
            extract_from_zip(&bytes, binary, temp.as_file_mut())?;
        } else {
            extract_from_tar_gz(&bytes, binary, temp.as_file_mut())?;
        }
        temp.persist(&dest).map_err(|e| HarvestError::Io(e.error))?;
        mark_executable(&dest)?;

        tracing::info!(path = %dest.display(), "geckodriver installed");
        Ok(dest)
    }
}

impl Default for DriverCache {
    fn default() -> Self {
        Self::new(DRIVER_CACHE_DIR)
    }
}

fn binary_name(os: &str) -> &'static str {
    if os == "windows" {
        "geckodriver.exe"
    } else {
        "geckodriver"
    }
}

/// Release asset for a platform, if one is published.
pub fn asset_name(version: &str, os: &str, arch: &str) -> Option<String> {
    let suffix = match (os, arch) {
        ("linux", "x86_64") => "linux64.tar.gz",
        ("linux", "x86") => "linux32.tar.gz",
        ("linux", "aarch64") => "linux-aarch64.tar.gz",
        ("macos", "x86_64") => "macos.tar.gz",
        ("macos", "aarch64") => "macos-aarch64.tar.gz",
        ("windows", "x86_64") => "win64.zip",
        ("windows", "x86") => "win32.zip",
        ("windows", "aarch64") => "win-aarch64.zip",
        _ => return None,
    };
    Some(format!("geckodriver-{}-{}", version, suffix))
}

fn extract_from_tar_gz(bytes: &[u8], binary: &str, out: &mut fs::File) -> Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let matches = entry
            .path()?
            .file_name()
            .is_some_and(|name| name == binary);
        if matches {
            io::copy(&mut entry, out)?;
            return Ok(());
        }
    }
    Err(HarvestError::InvalidFormat(format!(
        "{} not found in release archive",
        binary
    )))
}

fn extract_from_zip(bytes: &[u8], binary: &str, out: &mut fs::File) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(binary)?;
    let mut buffer = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buffer)?;
    io::copy(&mut buffer.as_slice(), out)?;
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// A running geckodriver process bound to its own local port.
///
/// The process is killed when the service is shut down or dropped.
#[derive(Debug)]
pub struct GeckoService {
    child: Child,
    port: u16,
}

impl GeckoService {
    pub async fn start(driver: &Path, firefox_binary: Option<&Path>) -> Result<Self> {
        let port = free_port()?;

        let mut command = Command::new(driver);
        command
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(binary) = firefox_binary {
            command.arg("--binary").arg(binary);
        }

        let child = command
            .spawn()
            .map_err(|e| HarvestError::DriverStart(format!("{}: {}", driver.display(), e)))?;
        let mut service = Self { child, port };

        for _ in 0..STARTUP_MAX_POLLS {
            if TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_ok() {
                tracing::debug!(port, "geckodriver listening");
                return Ok(service);
            }
            if let Some(status) = service.child.try_wait()? {
                return Err(HarvestError::DriverStart(format!(
                    "geckodriver exited early with {}",
                    status
                )));
            }
            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
        }

        service.shutdown().await;
        Err(HarvestError::DriverStart(format!(
            "geckodriver did not listen on port {}",
            port
        )))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(port = self.port, "geckodriver already stopped: {}", e);
        }
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_asset_names() {
        assert_eq!(
            asset_name("v0.36.0", "linux", "x86_64").as_deref(),
            Some("geckodriver-v0.36.0-linux64.tar.gz")
        );
        assert_eq!(
            asset_name("v0.36.0", "macos", "aarch64").as_deref(),
            Some("geckodriver-v0.36.0-macos-aarch64.tar.gz")
        );
        assert_eq!(
            asset_name("v0.36.0", "windows", "x86_64").as_deref(),
            Some("geckodriver-v0.36.0-win64.zip")
        );
        assert_eq!(asset_name("v0.36.0", "freebsd", "x86_64"), None);
    }

    #[test]
    fn test_missing_driver_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = DriverCache::new(dir.path());
        assert!(!cache.is_cached());
        assert_eq!(cache.cached_path().parent(), Some(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_cached_driver_needs_exec_bit() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DriverCache::new(dir.path());
        fs::write(cache.cached_path(), b"#!/bin/sh\n")?;
        assert!(!cache.is_cached());

        mark_executable(&cache.cached_path())?;
        assert!(cache.is_cached());
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_driver_skips_download() -> Result<()> {
        let dir = TempDir::new()?;
        let cache = DriverCache::new(dir.path()).with_release_url("http://127.0.0.1:9/unreachable");
        fs::write(cache.cached_path(), b"binary")?;
        mark_executable(&cache.cached_path())?;

        let path = cache.ensure_installed().await?;
        assert_eq!(path, cache.cached_path());
        Ok(())
    }

    #[tokio::test]
    async fn test_install_failure_is_reported_after_retries() {
        let dir = TempDir::new().unwrap();
        let cache = DriverCache::new(dir.path())
            .with_release_url("http://127.0.0.1:9/unreachable")
            .with_retries(2, Duration::from_millis(1));

        match cache.ensure_installed().await {
            Err(HarvestError::DriverInstall { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected DriverInstall, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_from_tar_gz() -> Result<()> {
        let mut builder = tar::Builder::new(Vec::new());
        let payload = b"driver-bytes";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "geckodriver", &payload[..])?;
        let tarball = builder.into_inner()?;

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        io::Write::write_all(&mut encoder, &tarball)?;
        let gz = encoder.finish()?;

        let mut out = tempfile::tempfile()?;
        extract_from_tar_gz(&gz, "geckodriver", &mut out)?;

        use std::io::Seek;
        out.rewind()?;
        let mut content = Vec::new();
        out.read_to_end(&mut content)?;
        assert_eq!(content, payload);
        Ok(())
    }
}
