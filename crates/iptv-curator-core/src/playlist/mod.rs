//! M3U playlist export
//!
//! Serializes a user's selections into an extended M3U document and writes
//! it to `playlist_<user_id>.m3u` in the export directory.

/// Periodic removal of stale exports
pub mod retention;

pub use retention::{spawn_cleanup_task, sweep_expired};

use crate::config::PlaylistConfig;
use crate::selection::{ContentKind, SelectionItem, SelectionStore, UserSelections};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Prefix of exported file names
pub const EXPORT_FILE_PREFIX: &str = "playlist_";
/// Extension of exported file names
pub const EXPORT_FILE_SUFFIX: &str = ".m3u";

/// Errors raised while writing or removing an export
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File name of the export of `user_id`.
#[must_use]
pub fn export_file_name(user_id: i64) -> String {
    format!("{EXPORT_FILE_PREFIX}{user_id}{EXPORT_FILE_SUFFIX}")
}

/// Whether `name` looks like a file produced by [`PlaylistExporter`].
#[must_use]
pub fn is_export_file_name(name: &str) -> bool {
    name.starts_with(EXPORT_FILE_PREFIX) && name.ends_with(EXPORT_FILE_SUFFIX)
}

/// Stream URL of `item` on the provider.
#[must_use]
pub fn stream_url(config: &PlaylistConfig, kind: ContentKind, item: &SelectionItem) -> String {
    format!(
        "{}/{}/{}/{}/{}.{}",
        config.server,
        kind.url_segment(),
        config.username,
        config.password,
        item.id,
        item.container
    )
}

// A line break inside a field would split the entry in two
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Render the full document: channels, then movies, then series.
#[must_use]
pub fn render_m3u(selections: &UserSelections, config: &PlaylistConfig) -> String {
    let mut out = String::from("#EXTM3U\n");
    for (kind, item) in selections.iter() {
        let name = single_line(&item.name);
        let _ = writeln!(
            out,
            "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{name}\" tvg-logo=\"{}\" group-title=\"{}\",{name}",
            single_line(&item.id),
            single_line(&item.logo),
            single_line(&item.category),
        );
        let _ = writeln!(out, "{}", stream_url(config, kind, item));
    }
    out
}

/// Writes exports for users of a [`SelectionStore`].
#[derive(Debug, Clone)]
pub struct PlaylistExporter {
    store: Arc<SelectionStore>,
    dir: PathBuf,
}

impl PlaylistExporter {
    /// Exporter writing into `dir`.
    #[must_use]
    pub fn new(store: Arc<SelectionStore>, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    /// Export directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the playlist of `user_id`, or `None` when nothing is selected
    /// or writing failed.
    pub async fn export(&self, user_id: i64, config: &PlaylistConfig) -> Option<PathBuf> {
        match self.try_export(user_id, config).await {
            Ok(path) => path,
            Err(e) => {
                error!(user_id, "Playlist export failed: {e}");
                None
            }
        }
    }

    /// Write the playlist of `user_id`.
    ///
    /// Returns `Ok(None)` when every bucket is empty.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Io` if the directory or file cannot be written.
    pub async fn try_export(
        &self,
        user_id: i64,
        config: &PlaylistConfig,
    ) -> Result<Option<PathBuf>, ExportError> {
        let selections = self.store.get(user_id);
        if selections.is_empty() {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExportError::io(&self.dir, e))?;

        let path = self.dir.join(export_file_name(user_id));
        tokio::fs::write(&path, render_m3u(&selections, config))
            .await
            .map_err(|e| ExportError::io(&path, e))?;

        info!(
            user_id,
            entries = selections.total(),
            path = %path.display(),
            "Playlist exported"
        );
        Ok(Some(path))
    }

    /// Remove an export once it has been delivered.
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove delivered playlist: {e}"),
        }
    }
}
