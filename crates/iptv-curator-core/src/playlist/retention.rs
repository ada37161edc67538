use super::{is_export_file_name, ExportError};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delete exports in `dir` last modified more than `max_age` ago.
///
/// Returns the number of files removed. A missing directory counts as empty.
///
/// # Errors
///
/// Returns `ExportError::Io` if the directory cannot be listed.
pub async fn sweep_expired(dir: &Path, max_age: Duration) -> Result<usize, ExportError> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    sweep_older_than(dir, cutoff).await
}

async fn sweep_older_than(dir: &Path, cutoff: SystemTime) -> Result<usize, ExportError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ExportError::io(dir, e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExportError::io(dir, e))?
    {
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_export_file_name) {
            continue;
        }
        let modified = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(file = ?name, "Cannot read modification time: {e}");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                info!(file = ?name, "Removed stale playlist");
                removed += 1;
            }
            Err(e) => warn!(file = ?name, "Failed to remove stale playlist: {e}"),
        }
    }
    Ok(removed)
}

/// Run [`sweep_expired`] every `interval` until `token` is cancelled.
///
/// The first sweep happens one full interval after spawning.
#[must_use]
pub fn spawn_cleanup_task(
    dir: PathBuf,
    interval: Duration,
    max_age: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Playlist cleanup task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match sweep_expired(&dir, max_age).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "Playlist retention sweep finished"),
                        Err(e) => warn!("Playlist retention sweep failed: {e}"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#EXTM3U\n").expect("writable");
        path
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_exports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let export = touch(dir.path(), "playlist_1.m3u");
        let other = touch(dir.path(), "notes.txt");
        let lookalike = touch(dir.path(), "playlist_1.m3u8");

        // Nothing is older than a day yet
        assert_eq!(
            sweep_expired(dir.path(), Duration::from_secs(86_400))
                .await
                .expect("sweep"),
            0
        );
        assert!(export.exists());

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(sweep_older_than(dir.path(), future).await.expect("sweep"), 1);
        assert!(!export.exists());
        assert!(other.exists());
        assert!(lookalike.exists());
    }

    #[tokio::test]
    async fn test_sweep_uses_modification_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stale = touch(dir.path(), "playlist_7.m3u");
        let fresh = touch(dir.path(), "playlist_8.m3u");
        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 86_400);
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .and_then(|f| f.set_modified(two_days_ago))
            .expect("set mtime");

        let removed = sweep_expired(dir.path(), Duration::from_secs(86_400))
            .await
            .expect("sweep");
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        assert_eq!(
            sweep_expired(&missing, Duration::from_secs(1))
                .await
                .expect("sweep"),
            0
        );
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_cancel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let token = CancellationToken::new();
        let handle = spawn_cleanup_task(
            dir.path().to_path_buf(),
            Duration::from_secs(1800),
            Duration::from_secs(86_400),
            token.clone(),
        );
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task finished")
            .expect("task did not panic");
    }
}
