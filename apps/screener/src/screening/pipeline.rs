//! Batch pipeline: job → corpus → per file (upload or extract → score) →
//! ranked report → optional cleanup.
//!
//! Files are processed strictly one at a time in scan order, with a fixed
//! pause between files to stay under the provider's rate limit. Every per-file
//! fault becomes an `error` record; only configuration faults abort the run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::ValueEnum;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::extract::{self, DocumentKind};
use crate::llm_client::FileStore;
use crate::models::analysis::{RecordStatus, ResultRecord};
use crate::screening::cleanup::{cleanup_uploads, confirm_cleanup, CleanupPolicy};
use crate::screening::corpus::{scan_corpus, MAX_CORPUS_FILES};
use crate::screening::job::{load_job_description, JobDescription};
use crate::screening::report::{print_insights, print_summary, write_report, RankedResults, RunSummary};
use crate::screening::scorer::{fallback_result, ResumeInput, ScoreOutcome, Scorer};
use crate::screening::upload_cache::{file_name, CacheKeyMode, UploadCache};

/// How a resume reaches the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ScoringMode {
    /// Upload the file (cached by key) and attach the remote handle.
    #[default]
    Upload,
    /// Extract text locally and inline it; nothing is uploaded.
    Text,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub uploads_dir: PathBuf,
    pub job_file: PathBuf,
    pub cache_file: PathBuf,
    pub report_dir: PathBuf,
    pub cache_key: CacheKeyMode,
    pub mode: ScoringMode,
    pub cleanup: CleanupPolicy,
    pub file_delay: Duration,
}

/// Sequential per-file processor. Owns nothing; borrows the run's collaborators.
pub struct Pipeline<'a> {
    scorer: &'a Scorer,
    store: &'a dyn FileStore,
    cache: &'a mut UploadCache,
    mode: ScoringMode,
    file_delay: Duration,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        scorer: &'a Scorer,
        store: &'a dyn FileStore,
        cache: &'a mut UploadCache,
        mode: ScoringMode,
        file_delay: Duration,
    ) -> Self {
        Self {
            scorer,
            store,
            cache,
            mode,
            file_delay,
        }
    }

    /// Processes every file in order; one record per file.
    pub async fn run(&mut self, files: &[PathBuf], job: &JobDescription) -> Vec<ResultRecord> {
        let started = Instant::now();
        let total = files.len();
        let mut records = Vec::with_capacity(total);

        for (i, path) in files.iter().enumerate() {
            let n = i + 1;
            info!("[{}/{}] Processing {}", n, total, file_name(path));

            let record = self.process_file(path, job).await;
            info!(
                "{}: score {} ({})",
                record.filename,
                record.score,
                record.status.as_str()
            );
            records.push(record);

            let elapsed = started.elapsed().as_secs_f64();
            let remaining = (total - n) as f64 * (elapsed / n as f64);
            info!("Elapsed: {:.1}s | Est. remaining: {:.1}s", elapsed, remaining);

            if n < total {
                tokio::time::sleep(self.file_delay).await;
            }
        }

        records
    }

    /// Runs one file to a terminal record. Never fails.
    ///
    /// Upload mode attaches PDFs by handle. Other formats are not accepted as
    /// chat file inputs, so they are extracted and inlined in either mode.
    pub async fn process_file(&mut self, path: &Path, job: &JobDescription) -> ResultRecord {
        let filename = file_name(path);
        let attach = self.mode == ScoringMode::Upload
            && DocumentKind::from_path(path) == Some(DocumentKind::Pdf);

        if attach {
            self.score_uploaded(path, &filename, job).await
        } else {
            self.score_extracted(path, &filename, job).await
        }
    }

    async fn score_uploaded(
        &mut self,
        path: &Path,
        filename: &str,
        job: &JobDescription,
    ) -> ResultRecord {
        let file_id = match self.cache.get_or_upload(path, self.store).await {
            Ok(file_id) => file_id,
            Err(e) => {
                warn!("Upload failed for {}: {}", filename, e);
                return failed_record(filename, &format!("Failed to upload file: {e}"));
            }
        };
        let input = ResumeInput::RemoteFile {
            filename,
            file_id: &file_id,
        };
        let outcome = self.scorer.score(&input, job).await;
        into_record(filename, outcome, Some(file_id))
    }

    async fn score_extracted(
        &self,
        path: &Path,
        filename: &str,
        job: &JobDescription,
    ) -> ResultRecord {
        let owned = path.to_path_buf();
        let text = match tokio::task::spawn_blocking(move || extract::extract_file(&owned)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Extraction failed for {}: {}", filename, e);
                return failed_record(filename, &e.to_string());
            }
            Err(e) => {
                warn!("Extraction task failed for {}: {}", filename, e);
                return failed_record(filename, &e.to_string());
            }
        };
        let input = ResumeInput::Text {
            filename,
            text: &text,
        };
        let outcome = self.scorer.score(&input, job).await;
        into_record(filename, outcome, None)
    }
}

fn into_record(filename: &str, outcome: ScoreOutcome, file_id: Option<String>) -> ResultRecord {
    let status = if outcome.is_valid() {
        RecordStatus::Success
    } else {
        RecordStatus::Error
    };
    ResultRecord::new(filename, outcome.into_result(), status, file_id)
}

fn failed_record(filename: &str, error: &str) -> ResultRecord {
    ResultRecord::new(
        filename,
        fallback_result(filename, Some(error)),
        RecordStatus::Error,
        None,
    )
}

/// Runs the whole batch and returns the path of the written report.
///
/// Fails only on configuration faults (job description, empty corpus) or when
/// the report cannot be written.
pub async fn run_batch(
    settings: &BatchSettings,
    scorer: &Scorer,
    store: &dyn FileStore,
) -> Result<PathBuf> {
    info!("Loading job description from {}", settings.job_file.display());
    let job = load_job_description(&settings.job_file)?;
    info!("Job description loaded ({} chars)", job.char_len());
    info!("Job preview: {}...", job.preview());

    std::fs::create_dir_all(&settings.uploads_dir).with_context(|| {
        format!(
            "Failed to create uploads folder {}",
            settings.uploads_dir.display()
        )
    })?;
    std::fs::create_dir_all(&settings.report_dir).with_context(|| {
        format!(
            "Failed to create report folder {}",
            settings.report_dir.display()
        )
    })?;

    let scan = scan_corpus(&settings.uploads_dir, MAX_CORPUS_FILES)?;
    if scan.files.is_empty() {
        bail!(
            "No CV files found in {}. Add .pdf or .docx files to the uploads folder",
            settings.uploads_dir.display()
        );
    }
    if scan.truncated() {
        info!(
            "Found {} CV files, processing the first {}",
            scan.found,
            scan.files.len()
        );
    } else {
        info!("Found {} CV files", scan.files.len());
    }

    let mut cache = UploadCache::load(&settings.cache_file, settings.cache_key);
    if !cache.is_empty() {
        info!("Loaded {} cached upload(s)", cache.len());
    }
    let records = Pipeline::new(
        scorer,
        store,
        &mut cache,
        settings.mode,
        settings.file_delay,
    )
    .run(&scan.files, &job)
    .await;

    let ranked = RankedResults::rank(records);
    let summary = RunSummary::from_ranked(&ranked);
    print_summary(&ranked, &summary);

    let report = write_report(&settings.report_dir, &ranked, Local::now())?;
    println!("\nResults saved to: {}", report.display());

    if settings.mode == ScoringMode::Upload && !ranked.successes.is_empty() {
        let run_cleanup = match settings.cleanup {
            CleanupPolicy::Yes => true,
            CleanupPolicy::No => false,
            CleanupPolicy::Ask => confirm_cleanup().await,
        };
        if run_cleanup {
            let outcome = cleanup_uploads(ranked.ordered(), store, &mut cache).await;
            info!(
                "Cleanup finished: {} deleted, {} failed",
                outcome.deleted, outcome.failed
            );
        }
    }

    info!("Analysis complete!");
    print_insights(&ranked, &summary);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::screening::scorer::{ScorerSettings, FALLBACK_SCORE};
    use crate::screening::testing::{valid_reply, FakeEndpoint, FakeReply, FakeStore};

    const JOB: &str = "Senior backend engineer. Rust, PostgreSQL, distributed systems, \
        on-call ownership and mentoring. Five or more years of production experience.";

    fn settings(root: &Path, cleanup: CleanupPolicy) -> BatchSettings {
        BatchSettings {
            uploads_dir: root.join("uploads"),
            job_file: root.join("job.txt"),
            cache_file: root.join("cache.json"),
            report_dir: root.to_path_buf(),
            cache_key: CacheKeyMode::FileName,
            mode: ScoringMode::Upload,
            cleanup,
            file_delay: Duration::from_secs(2),
        }
    }

    /// Seeds the job file and uploads. `.docx` entries get a real document whose
    /// text names the file; everything else is `len` filler bytes.
    fn seed(root: &Path, files: &[(&str, usize)]) {
        std::fs::write(root.join("job.txt"), JOB).unwrap();
        let uploads = root.join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        for (name, len) in files {
            let bytes = if name.ends_with(".docx") {
                docx_bytes(&format!("Resume text of {name}"))
            } else {
                vec![b'x'; *len]
            };
            std::fs::write(uploads.join(name), bytes).unwrap();
        }
    }

    fn docx_bytes(paragraph: &str) -> Vec<u8> {
        use std::io::Write;

        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{paragraph}</w:t></w:r></w:p></w:body></w:document>"#
        );
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn scorer(endpoint: Arc<FakeEndpoint>) -> Scorer {
        Scorer::new(
            endpoint,
            ScorerSettings {
                max_attempts: 2,
                retry_delay: Duration::from_secs(2),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_report_orders_successes_then_failures() {
        let dir = tempfile::tempdir().unwrap();
        // b.pdf is too small to upload and becomes the failure
        seed(
            dir.path(),
            &[("a.pdf", 500), ("b.pdf", 40), ("c.docx", 500), ("d.pdf", 500)],
        );
        let endpoint = Arc::new(FakeEndpoint::new(vec![
            FakeReply::Text(valid_reply(90)),
            FakeReply::Text(valid_reply(55)),
            FakeReply::Text(valid_reply(72)),
        ]));
        let store = FakeStore::default();

        let report = run_batch(
            &settings(dir.path(), CleanupPolicy::No),
            &scorer(endpoint.clone()),
            &store,
        )
        .await
        .unwrap();

        let mut reader = csv::Reader::from_path(&report).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let view: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|r| (&r[0], &r[1], &r[4]))
            .collect();
        assert_eq!(
            view,
            vec![
                ("a.pdf", "90", "success"),
                ("d.pdf", "72", "success"),
                ("c.docx", "55", "success"),
                ("b.pdf", "50", "error"),
            ]
        );
        assert!(rows[3][2].contains("File too small"));
        assert_eq!(
            &rows[3][3],
            "manual_review_needed, analysis_incomplete, requires_human_assessment"
        );
        // c.docx is scored from extracted text, never uploaded
        assert_eq!(store.upload_count(), 2);
        assert_eq!(endpoint.call_count(), 3);

        let cache = UploadCache::load(&dir.path().join("cache.json"), CacheKeyMode::FileName);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c.docx"), None);
    }

    #[tokio::test]
    async fn test_upload_mode_inlines_docx_text_without_uploading() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("jane.docx", 0)]);
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(77)));
        let store = FakeStore::default();
        let scorer = scorer(endpoint.clone());
        let mut cache = UploadCache::load(&dir.path().join("cache.json"), CacheKeyMode::FileName);
        let job = JobDescription::new(JOB).unwrap();

        let record = Pipeline::new(&scorer, &store, &mut cache, ScoringMode::Upload, Duration::ZERO)
            .process_file(&dir.path().join("uploads/jane.docx"), &job)
            .await;

        assert_eq!(record.status, RecordStatus::Success);
        assert_eq!(record.score, 77);
        assert_eq!(record.file_id, None);
        assert_eq!(store.upload_count(), 0);
        assert!(cache.is_empty());

        let parts = &endpoint.requests()[0];
        assert_eq!(parts.len(), 1);
        assert!(matches!(
            &parts[0],
            crate::llm_client::ContentPart::Text { text }
                if text.contains("CV Content:\nResume text of jane.docx")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_report_dir_is_created_before_scoring() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("a.pdf", 500)]);
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(70)));
        let mut settings = settings(dir.path(), CleanupPolicy::No);
        settings.report_dir = dir.path().join("reports/2026");

        let report = run_batch(&settings, &scorer(endpoint), &FakeStore::default())
            .await
            .unwrap();

        assert!(report.starts_with(dir.path().join("reports/2026")));
        assert!(report.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_yes_deletes_and_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("a.pdf", 500), ("b.pdf", 500)]);
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(80)));
        let store = FakeStore::default();

        run_batch(
            &settings(dir.path(), CleanupPolicy::Yes),
            &scorer(endpoint),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(store.deleted(), vec!["file-1", "file-2"]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("cache.json")).unwrap(),
            "{}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_is_not_offered_without_successes() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("a.pdf", 500)]);
        let endpoint = Arc::new(FakeEndpoint::new(vec![FakeReply::ApiError(503)]));
        let store = FakeStore::default();

        run_batch(
            &settings(dir.path(), CleanupPolicy::Yes),
            &scorer(endpoint),
            &store,
        )
        .await
        .unwrap();

        assert!(store.deleted().is_empty());
        let cache = UploadCache::load(&dir.path().join("cache.json"), CacheKeyMode::FileName);
        assert_eq!(cache.get("a.pdf"), Some("file-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_files_are_paced_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("a.pdf", 500), ("b.pdf", 500), ("c.pdf", 500)]);
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(65)));
        let store = FakeStore::default();

        let started = Instant::now();
        run_batch(
            &settings(dir.path(), CleanupPolicy::No),
            &scorer(endpoint),
            &store,
        )
        .await
        .unwrap();

        // two gaps between three files, no pause after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scorer_fallback_keeps_handle_but_marks_error() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("a.pdf", 500)]);
        let endpoint = Arc::new(FakeEndpoint::always("not json at all".to_string()));
        let store = FakeStore::default();
        let scorer = scorer(endpoint.clone());
        let mut cache = UploadCache::load(&dir.path().join("cache.json"), CacheKeyMode::FileName);
        let job = JobDescription::new(JOB).unwrap();

        let record = Pipeline::new(
            &scorer,
            &store,
            &mut cache,
            ScoringMode::Upload,
            Duration::ZERO,
        )
        .process_file(&dir.path().join("uploads/a.pdf"), &job)
        .await;

        assert_eq!(record.status, RecordStatus::Error);
        assert_eq!(record.score, FALLBACK_SCORE);
        assert_eq!(record.file_id.as_deref(), Some("file-1"));
        assert_eq!(endpoint.call_count(), 2);
    }

    #[tokio::test]
    async fn test_text_mode_extraction_failure_is_a_failed_record() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[]);
        std::fs::write(dir.path().join("uploads/broken.docx"), vec![b'x'; 500]).unwrap();
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(65)));
        let store = FakeStore::default();
        let scorer = scorer(endpoint.clone());
        let mut cache = UploadCache::load(&dir.path().join("cache.json"), CacheKeyMode::FileName);
        let job = JobDescription::new(JOB).unwrap();

        let record = Pipeline::new(&scorer, &store, &mut cache, ScoringMode::Text, Duration::ZERO)
            .process_file(&dir.path().join("uploads/broken.docx"), &job)
            .await;

        assert_eq!(record.status, RecordStatus::Error);
        assert!(record.summary.contains("DOCX extraction failed"));
        assert_eq!(endpoint.call_count(), 0);
        assert_eq!(store.upload_count(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_short_job_description_aborts_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("a.pdf", 500)]);
        std::fs::write(dir.path().join("job.txt"), "a".repeat(99)).unwrap();
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(65)));
        let store = FakeStore::default();

        let err = run_batch(
            &settings(dir.path(), CleanupPolicy::No),
            &scorer(endpoint.clone()),
            &store,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("too short"));
        assert_eq!(endpoint.call_count(), 0);
        assert_eq!(store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_a_configuration_fault() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[("notes.txt", 500)]);
        let endpoint = Arc::new(FakeEndpoint::always(valid_reply(65)));

        let err = run_batch(
            &settings(dir.path(), CleanupPolicy::No),
            &scorer(endpoint),
            &FakeStore::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("No CV files found"));
    }
}
