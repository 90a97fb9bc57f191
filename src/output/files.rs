//! Download sink that writes resources to disk
//!
//! Each download's destination is rendered from the configured template
//! relative to the output directory. Bodies are streamed into a temporary
//! file next to the destination and renamed into place once complete, so an
//! interrupted run never leaves a truncated file under the final name.

use crate::config::OutputConfig;
use crate::crawler::Body;
use crate::output::template::{Template, TemplateData};
use crate::output::traits::DownloadSink;
use crate::state::PageInfo;
use crate::{ConfigError, SinkError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, warn};

/// Suffix of in-flight download files
pub const TEMP_SUFFIX: &str = ".webdl.tmp";

/// Writes downloads under a root directory
pub struct FileSink {
    root: PathBuf,
    template: Template,
    dry_run: bool,
    temp_counter: AtomicU64,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>, template: Template, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            template,
            dry_run,
            temp_counter: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Result<Self, ConfigError> {
        let template = Template::parse_path(&config.download_format)?;
        Ok(Self::new(&config.directory, template, config.dry_run))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination of a download
    ///
    /// Only normal path components of the rendered template are kept, so a
    /// rendered path can never leave the root directory.
    pub fn destination(&self, info: &PageInfo) -> PathBuf {
        let rendered = self.template.render(&TemplateData::for_download(info));
        let relative: PathBuf = Path::new(&rendered)
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.root.join(relative)
    }

    fn temp_path(&self, dest: &Path) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%f");
        let seq = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = dest.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}-{}-{}{}", stamp, std::process::id(), seq, TEMP_SUFFIX));
        dest.with_file_name(name)
    }
}

#[async_trait]
impl DownloadSink for FileSink {
    async fn should_download(&self, info: &PageInfo) -> bool {
        let dest = self.destination(info);

        if self.dry_run {
            println!(
                "Page: {}\nDownload: {}\nDest: {}",
                info.referer().map(|u| u.as_str()).unwrap_or(""),
                info.url,
                dest.display()
            );
            return false;
        }

        match fs::try_exists(&dest).await {
            Ok(true) => {
                debug!("Skipping {}: {} already exists", info.url, dest.display());
                false
            }
            Ok(false) => true,
            Err(e) => {
                warn!("Could not check {}: {}", dest.display(), e);
                true
            }
        }
    }

    async fn persist(&self, info: &PageInfo, mut body: Body) -> Result<(), SinkError> {
        let dest = self.destination(info);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path(&dest);
        let written = async {
            let mut file = fs::File::create(&temp).await?;
            let n = body.copy_to(&mut file).await?;
            file.sync_all().await?;
            Ok::<u64, SinkError>(n)
        }
        .await;

        let result = match written {
            Ok(n) => fs::rename(&temp, &dest)
                .await
                .map(|_| n)
                .map_err(SinkError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(n) => {
                debug!("Saved {} ({} bytes) to {}", info.url, n, dest.display());
                Ok(())
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&temp).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove {}: {}", temp.display(), rm);
                    }
                }
                Err(e)
            }
        }
    }
}

/// Removes leftover temporary download files under `dir`
///
/// Returns the number of files removed. A missing directory is not an error.
pub async fn cleanup_temp_files(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
    }

    Ok(removed)
}
