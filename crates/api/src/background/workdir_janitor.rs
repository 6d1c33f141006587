//! Periodic sweep of stale artifacts in the work dir.
//!
//! Deferred cleanup normally removes every delivered file, but a crash or a
//! shutdown between delivery and deletion leaves files behind. This task
//! removes `audio_*` files older than the configured age on a fixed
//! interval using `tokio::time::interval`.

use mufy_core::workdir::WorkDir;
use tokio_util::sync::CancellationToken;

use crate::config::JanitorConfig;

/// Run the janitor loop until `cancel` is triggered.
///
/// The first sweep runs immediately, which clears leftovers from a previous
/// run of the server.
pub async fn run(work_dir: WorkDir, config: JanitorConfig, cancel: CancellationToken) {
    tracing::info!(
        work_dir = %work_dir.path().display(),
        interval_secs = config.interval.as_secs(),
        max_age_secs = config.max_age.as_secs(),
        "Work dir janitor started"
    );

    let mut interval = tokio::time::interval(config.interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Work dir janitor stopping");
                break;
            }
            _ = interval.tick() => {
                match work_dir.sweep_older_than(config.max_age).await {
                    Ok(removed) => {
                        if removed > 0 {
                            tracing::info!(removed, "Work dir janitor: removed stale files");
                        } else {
                            tracing::debug!("Work dir janitor: nothing to remove");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Work dir janitor: sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn sweeps_stale_files_and_stops_on_cancel() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let stale = tmp.path().join("audio_1.mp3");
        let unrelated = tmp.path().join("notes.txt");
        tokio::fs::write(&stale, b"x").await.expect("write");
        tokio::fs::write(&unrelated, b"x").await.expect("write");

        let work_dir = WorkDir::ensure(tmp.path()).await.expect("work dir");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            work_dir,
            JanitorConfig {
                interval: Duration::from_millis(20),
                max_age: Duration::ZERO,
            },
            cancel.clone(),
        ));

        for _ in 0..50 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!stale.exists());
        assert!(unrelated.exists());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("janitor stops")
            .expect("janitor task");
    }
}
