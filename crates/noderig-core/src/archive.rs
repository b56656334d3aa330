use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use noderig_backend::{ArchiveFetcher, CollaboratorError};

const CHECKSUMS_FILE: &str = "SHASUMS256.txt";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

impl ArchiveError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

/// Downloads release tarballs over HTTP and unpacks them in place.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
    verify_checksums: bool,
}

impl HttpArchiveFetcher {
    /// # Errors
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(
        download_dir: PathBuf,
        http_timeout: Duration,
        verify_checksums: bool,
    ) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("noderig/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(http_timeout)
            .build()
            .map_err(|error| ArchiveError::http("failed to build HTTP client", error))?;
        Ok(Self::with_client(client, download_dir, verify_checksums))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, download_dir: PathBuf, verify_checksums: bool) -> Self {
        Self {
            client,
            download_dir,
            verify_checksums,
        }
    }

    /// Download `url` (and verify it when enabled) into a scratch directory
    /// that is dropped together with the returned [`StagedArchive`].
    async fn download(&self, url: &str) -> Result<StagedArchive, ArchiveError> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|error| {
                ArchiveError::io_with_path("failed to create download directory", &self.download_dir, &error)
            })?;
        let temp_dir = tempfile::tempdir_in(&self.download_dir)
            .map_err(|error| ArchiveError::io("failed to create temp directory", error))?;

        let file_name = archive_file_name(url)?;
        let path = temp_dir.path().join(file_name);

        info!("Downloading {url}");
        download_file(&self.client, url, &path).await?;
        if self.verify_checksums {
            verify_download_checksum(&self.client, &checksums_url(url), file_name, &path).await?;
        } else {
            debug!("Checksum verification disabled, skipping for {file_name}");
        }

        Ok(StagedArchive {
            _temp_dir: temp_dir,
            path,
        })
    }

    /// Unpack over `destination`. A failure part way leaves whatever was
    /// already there, and whatever got written, untouched.
    async fn unpack(staged: &StagedArchive, destination: &Path) -> Result<(), ArchiveError> {
        let archive = staged.path.clone();
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_tar_gz(&archive, &target))
            .await
            .map_err(|error| ArchiveError::Invalid(format!("unpack task failed: {error}")))??;

        info!("Unpacked {} into {}", staged.path.display(), destination.display());
        Ok(())
    }
}

struct StagedArchive {
    _temp_dir: tempfile::TempDir,
    path: PathBuf,
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch_and_unpack(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<(), CollaboratorError> {
        let staged = self
            .download(url)
            .await
            .map_err(|error| CollaboratorError::Download(error.to_string()))?;
        Self::unpack(&staged, destination)
            .await
            .map_err(|error| CollaboratorError::Unpack(error.to_string()))
    }

    async fn remove(&self, destination: &Path) -> Result<(), CollaboratorError> {
        match tokio::fs::remove_dir_all(destination).await {
            Ok(()) => {
                info!("Removed {}", destination.display());
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} already absent", destination.display());
                Ok(())
            }
            Err(error) => Err(CollaboratorError::Filesystem(
                ArchiveError::io_with_path("failed to remove directory", destination, &error).to_string(),
            )),
        }
    }
}

fn archive_file_name(url: &str) -> Result<&str, ArchiveError> {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains(".."))
        .ok_or_else(|| ArchiveError::Invalid(format!("No archive file name in {url}")))
}

/// The checksum manifest published next to a release archive.
fn checksums_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, _)) => format!("{base}/{CHECKSUMS_FILE}"),
        None => CHECKSUMS_FILE.to_string(),
    }
}

async fn verify_download_checksum(
    client: &reqwest::Client,
    checksum_url: &str,
    asset_name: &str,
    downloaded_path: &Path,
) -> Result<(), ArchiveError> {
    let response = client
        .get(checksum_url)
        .send()
        .await
        .map_err(|error| ArchiveError::http("failed to download checksums", error))?;
    if !response.status().is_success() {
        return Err(ArchiveError::Invalid(format!(
            "Failed to download {checksum_url}: HTTP {}",
            response.status()
        )));
    }

    let checksums = response
        .text()
        .await
        .map_err(|error| ArchiveError::http("failed to read checksums", error))?;
    let expected = parse_expected_checksum(&checksums, asset_name).ok_or_else(|| {
        ArchiveError::Invalid(format!("No checksum entry for '{asset_name}' in {checksum_url}"))
    })?;
    let actual = sha256_file(downloaded_path)?;

    if actual.eq_ignore_ascii_case(&expected) {
        info!("Checksum verified for {asset_name}");
        Ok(())
    } else {
        Err(ArchiveError::Invalid(format!(
            "Checksum mismatch for {asset_name}: expected {expected}, got {actual}"
        )))
    }
}

fn parse_expected_checksum(checksums: &str, asset_name: &str) -> Option<String> {
    checksums.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let hash = parts.next()?;
        let name = parts
            .next()?
            .trim_start_matches('*')
            .trim_start_matches("./");
        (name == asset_name).then(|| hash.to_ascii_lowercase())
    })
}

fn sha256_file(path: &Path) -> Result<String, ArchiveError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        ArchiveError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            ArchiveError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), ArchiveError> {
    use futures_util::StreamExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| ArchiveError::http("download request failed", error))?;

    if !response.status().is_success() {
        return Err(ArchiveError::Invalid(format!(
            "Download of {url} failed with status {}",
            response.status()
        )));
    }

    let mut downloaded: u64 = 0;
    let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
        ArchiveError::io_with_path("failed to create download file", dest, &error)
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| ArchiveError::http("download stream error", error))?;
        file.write_all(&chunk).await.map_err(|error| {
            ArchiveError::io_with_path("failed to write download data", dest, &error)
        })?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await.map_err(|error| {
        ArchiveError::io_with_path("failed to flush download file", dest, &error)
    })?;

    info!("Download complete: {downloaded} bytes");
    Ok(())
}

/// Unpack a `.tar.gz` into `dest`, dropping the archive's top-level directory.
fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = std::fs::File::open(archive_path).map_err(|error| {
        ArchiveError::io_with_path("failed to open archive", archive_path, &error)
    })?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    std::fs::create_dir_all(dest).map_err(|error| {
        ArchiveError::io_with_path("failed to create extraction directory", dest, &error)
    })?;

    let entries = archive
        .entries()
        .map_err(|error| ArchiveError::io("failed to read archive entries", error))?;
    for entry in entries {
        let mut entry = entry.map_err(|error| ArchiveError::io("failed to read archive entry", error))?;
        if matches!(
            entry.header().entry_type(),
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader
        ) {
            continue;
        }

        let path = entry
            .path()
            .map_err(|error| ArchiveError::io("invalid archive entry path", error))?
            .into_owned();
        let Some(relative) = strip_top_level(&path) else {
            warn!("Skipping archive entry with unsafe path {}", path.display());
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                ArchiveError::io_with_path("failed to create extraction parent directory", parent, &error)
            })?;
        }
        entry.unpack(&out_path).map_err(|error| {
            ArchiveError::io_with_path("failed to extract archive entry", &out_path, &error)
        })?;
    }

    debug!("Extraction complete to {}", dest.display());
    Ok(())
}

/// Drop the first path component; `None` if any remaining component could
/// escape the destination.
fn strip_top_level(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(_)) => {}
        Some(Component::CurDir) => {
            // `./node-v8.11.1-linux-x64/...`
            match components.next() {
                Some(Component::Normal(_)) | None => {}
                Some(_) => return None,
            }
        }
        None => return Some(PathBuf::new()),
        Some(_) => return None,
    }

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(relative)
}
