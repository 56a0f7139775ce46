//! Background segment-cleanup reaper: the only deleter of `.ts`
//! segment files, enforcing the bounded on-disk lifetime of HLS artifacts.
//! Packagers never overwrite or remove an existing segment filename, so
//! there is never a race between a packager and the reaper over the same
//! path.

pub mod config;
pub mod error;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use config::ReaperConfig;
pub use error::{ReaperError, Result};

/// Tally of one sweep, surfaced for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub segments_deleted: u64,
    pub dirs_removed: u64,
}

fn is_segment_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("ts")
}

async fn is_expired(path: &Path, age: Duration) -> std::io::Result<bool> {
    let metadata = tokio::fs::metadata(path).await?;
    let modified = metadata.modified()?;
    let elapsed = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    Ok(elapsed > age)
}

/// Unlinks `path`, swallowing a `NotFound` race with a concurrent deleter
/// and retrying once on any other transient error before giving up and
/// logging, scoped to the reaper: these errors never propagate to a user
/// request. Returns whether the file is now gone.
async fn delete_with_retry(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(first_err) => match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(second_err) => {
                error!(
                    path = %path.display(),
                    first_error = %first_err,
                    second_error = %second_err,
                    "reaper: giving up deleting segment after retry"
                );
                false
            }
        },
    }
}

/// Walks `dir` bottom-up, deleting expired `.ts` segments and removing
/// directories left empty by that deletion. `.m3u8`, `.key`, and any other
/// file is left untouched. Returns whether `dir` ended up empty, so a
/// caller one level up can decide whether to remove it too.
///
/// Async recursion needs an explicit `Pin<Box<dyn Future>>` — plain
/// `async fn` can't call itself.
pub fn sweep_dir<'a>(
    dir: &'a Path,
    age: Duration,
    stats: &'a mut SweepStats,
) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(ReaperError::Io(e)),
        };

        let mut remaining = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
                Err(e) => return Err(ReaperError::Io(e)),
            };
            let path = entry.path();

            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "reaper: failed to stat entry, leaving in place");
                    remaining += 1;
                    continue;
                }
            };

            if file_type.is_dir() {
                let child_empty = sweep_dir(&path, age, stats).await?;
                if child_empty {
                    match tokio::fs::remove_dir(&path).await {
                        Ok(()) => stats.dirs_removed += 1,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => {
                            warn!(error = %e, path = %path.display(), "reaper: failed to remove empty directory");
                            remaining += 1;
                        }
                    }
                } else {
                    remaining += 1;
                }
                continue;
            }

            if !is_segment_file(&path) {
                remaining += 1;
                continue;
            }

            match is_expired(&path, age).await {
                Ok(true) => {
                    if delete_with_retry(&path).await {
                        stats.segments_deleted += 1;
                        debug!(path = %path.display(), "reaper: deleted expired segment");
                    } else {
                        remaining += 1;
                    }
                }
                Ok(false) => remaining += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "reaper: failed to stat segment, leaving in place");
                    remaining += 1;
                }
            }
        }

        Ok(remaining == 0)
    })
}

/// One full sweep of `root`.
pub async fn sweep_once(root: &Path, age: Duration) -> Result<SweepStats> {
    let mut stats = SweepStats::default();
    sweep_dir(root, age, &mut stats).await?;
    Ok(stats)
}

/// Runs the reaper loop until `cancel` fires. Each tick sleeps for
/// `config.interval`, then sweeps once; errors are logged and swallowed so
/// a single bad sweep never kills the task. Exits promptly on
/// cancellation — no partial deletes are left dangling because each
/// `unlink` is atomic.
pub async fn run(config: ReaperConfig, cancel: CancellationToken) {
    info!(
        hls_root = %config.hls_root.display(),
        interval_s = config.interval.as_secs(),
        age_s = config.age.as_secs(),
        "reaper: starting"
    );
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("reaper: cancellation received, stopping");
                return;
            }
            _ = tokio::time::sleep(config.interval) => {
                match sweep_once(&config.hls_root, config.age).await {
                    Ok(stats) => {
                        if stats.segments_deleted > 0 || stats.dirs_removed > 0 {
                            info!(
                                segments_deleted = stats.segments_deleted,
                                dirs_removed = stats.dirs_removed,
                                "reaper: sweep complete"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "reaper: sweep failed, will retry next interval"),
                }
            }
        }
    }
}
