//! Closure source materialization
//!
//! Places the closure's code in the script directory, either from the inline
//! `source` field or from a remote `sourceURL`. Remote archives are unpacked
//! whole; anything else is written to `<module>.<ext>`.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::closure::ClosureDescription;
use crate::config::ExecutionSettings;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Write size used when streaming a plain script download
pub const DOWNLOAD_CHUNK_SIZE: usize = 10 * 1024;

const ARCHIVE_CONTENT_TYPES: &[&str] = &["application/zip", "application/octet-stream"];

/// Whether a declared content type denotes a zip archive
pub fn is_archive(content_type: &str) -> bool {
    ARCHIVE_CONTENT_TYPES.iter().any(|t| content_type.contains(t))
}

/// Writes closure sources into the script directory
pub struct SourceMaterializer {
    transport: Arc<Transport>,
    script_dir: PathBuf,
    extension: String,
}

impl SourceMaterializer {
    pub fn new(transport: Arc<Transport>, settings: &ExecutionSettings) -> Self {
        Self {
            transport,
            script_dir: PathBuf::from(&settings.script_dir),
            extension: settings.script_extension.clone(),
        }
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Path of the script file for `module`
    pub fn script_path(&self, module: &str) -> PathBuf {
        self.script_dir.join(format!("{}.{}", module, self.extension))
    }

    /// Materialize the closure's source for `module`
    pub async fn materialize(&self, description: &ClosureDescription, module: &str) -> Result<()> {
        self.ensure_script_dir().await?;

        match description.remote_source() {
            Some(url) => self.download(url, module).await,
            None => {
                let path = self.script_path(module);
                let source = description.source.as_deref().unwrap_or_default();
                fs::write(&path, source).await.map_err(|e| Error::IoWrite {
                    path: path.clone(),
                    source: e,
                })?;
                debug!(path = %path.display(), bytes = source.len(), "Inline source written");
                Ok(())
            }
        }
    }

    async fn ensure_script_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.script_dir)
            .await
            .map_err(|e| Error::IoWrite {
                path: self.script_dir.clone(),
                source: e,
            })
    }

    async fn download(&self, url: &str, module: &str) -> Result<()> {
        info!(url, "Downloading closure source");
        let response = self.transport.download(url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SourceFetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // A missing content type is treated as a plain script
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if is_archive(&content_type) {
            info!(url, content_type = %content_type, "Processing zip source");
            let bytes = response.bytes().await.map_err(|e| Error::http(url, e))?;
            extract_archive(url, bytes.to_vec(), self.script_dir.clone()).await
        } else {
            let path = self.script_path(module);
            let mut file = fs::File::create(&path).await.map_err(|e| Error::IoWrite {
                path: path.clone(),
                source: e,
            })?;

            let mut written = 0usize;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| Error::http(url, e))?;
                for piece in chunk.chunks(DOWNLOAD_CHUNK_SIZE) {
                    file.write_all(piece).await.map_err(|e| Error::IoWrite {
                        path: path.clone(),
                        source: e,
                    })?;
                }
                written += chunk.len();
            }
            file.flush().await?;

            debug!(path = %path.display(), bytes = written, "Source downloaded");
            Ok(())
        }
    }
}

/// Unpack every archive entry below `dir`
async fn extract_archive(url: &str, bytes: Vec<u8>, dir: PathBuf) -> Result<()> {
    let archive_error = |message: String| Error::SourceArchive {
        url: url.to_string(),
        message,
    };

    let extracted = tokio::task::spawn_blocking(move || -> std::result::Result<usize, String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
        let entries = archive.len();
        archive.extract(&dir).map_err(|e| e.to_string())?;
        Ok(entries)
    })
    .await
    .map_err(|e| Error::Internal(format!("Archive extraction task failed: {}", e)))?
    .map_err(archive_error)?;

    debug!(url, entries = extracted, "Archive extracted");
    Ok(())
}
