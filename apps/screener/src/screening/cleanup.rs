//! Cleanup: deletes uploaded resumes from the provider and clears the cache.
//! Irreversible, so it only runs when the operator opts in.

use std::io::Write;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::llm_client::FileStore;
use crate::models::analysis::ResultRecord;
use crate::screening::upload_cache::UploadCache;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CleanupPolicy {
    /// Prompt on stdin after the report is written.
    #[default]
    Ask,
    Yes,
    No,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Deletes the handle of every successful record, then empties the cache.
/// A failed deletion is logged and skipped.
pub async fn cleanup_uploads<'a>(
    records: impl IntoIterator<Item = &'a ResultRecord>,
    store: &dyn FileStore,
    cache: &mut UploadCache,
) -> CleanupReport {
    info!("Cleaning up uploaded files...");
    let mut report = CleanupReport::default();

    for record in records.into_iter().filter(|r| r.is_success()) {
        let Some(file_id) = record.file_id.as_deref() else {
            continue;
        };
        match store.delete(file_id).await {
            Ok(()) => {
                info!("Deleted {} ({})", record.filename, file_id);
                report.deleted += 1;
            }
            Err(e) => {
                warn!("Could not delete {}: {}", record.filename, e);
                report.failed += 1;
            }
        }
    }

    if let Err(e) = cache.clear() {
        warn!("{e:#}");
    }
    report
}

/// Asks `Clean up uploaded files? (y/N)`; anything but `y` declines.
pub async fn confirm_cleanup() -> bool {
    let answer = tokio::task::spawn_blocking(|| {
        print!("\nClean up uploaded files? (y/N): ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await;

    matches!(answer, Ok(Ok(line)) if line.trim().eq_ignore_ascii_case("y"))
}
