//! The export → extract → check → import loop.

use crate::apictl::Exporter;
use crate::archive::{extract_record, list_archives};
use crate::client::TykClient;
use crate::error::Result;
use crate::matcher::is_duplicate;
use crate::progress::{MigrationPhase, MigrationProgress};
use crate::types::{ApiRecord, MatchPolicy, MigrationConfig, MigrationReport, RecordOutcome};

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Migrates every API exported from WSO2 into a Tyk Dashboard.
pub struct Migrator<E: Exporter> {
    exporter: E,
    tyk: TykClient,
    match_policy: MatchPolicy,
    progress: MigrationProgress,
}

impl<E: Exporter> Migrator<E> {
    /// Create a new migrator.
    pub fn new(exporter: E, config: &MigrationConfig) -> Result<Self> {
        let tyk = TykClient::new(
            &config.tyk_url,
            &config.tyk_token,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self {
            exporter,
            tyk,
            match_policy: config.match_policy,
            progress: MigrationProgress::new(),
        })
    }

    /// Set a progress callback.
    pub fn with_progress(mut self, progress: MigrationProgress) -> Self {
        self.progress = progress;
        self
    }

    /// The Tyk client used for duplicate checks and imports.
    pub fn tyk(&self) -> &TykClient {
        &self.tyk
    }

    /// Run the migration.
    ///
    /// Only a failed export aborts the run. Every archive is attempted once
    /// and its outcome counted in the report.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::new();

        self.progress.set_phase(MigrationPhase::Exporting, 1);
        let dir = self.exporter.export().await?;

        let archives = list_archives(&dir)?;
        info!(count = archives.len(), dir = %dir.display(), "Migrating exported APIs");
        self.progress
            .set_phase(MigrationPhase::Migrating, archives.len() as u64);

        for path in &archives {
            let archive = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            self.migrate_archive(path, &archive, &mut report).await;
            self.progress.increment(Some(&archive));
        }

        self.progress.set_phase(MigrationPhase::Complete, 1);
        report.complete();

        info!(
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed,
            "Migration finished"
        );
        Ok(report)
    }

    async fn migrate_archive(&self, path: &Path, archive: &str, report: &mut MigrationReport) {
        let record = match extract_record(path) {
            Ok(record) => record,
            Err(e) => {
                warn!(archive = %archive, error = %e, "Could not read API from archive");
                report.record(archive, None, RecordOutcome::Failed { reason: e.to_string() });
                return;
            }
        };

        debug!(
            archive = %archive,
            name = %record.name,
            version = %record.version,
            listen_path = %record.listen_path,
            target_url = %record.target_url,
            "Extracted API"
        );

        if record.targets_localhost() {
            let message = format!(
                "{} targets {}; update the upstream in Tyk after migration",
                record.name, record.target_url
            );
            warn!(name = %record.name, target_url = %record.target_url, "Upstream points at localhost");
            report.add_warning(message);
        }

        let outcome = self.process_record(&record).await;
        report.record(archive, Some(&record.name), outcome);
    }

    /// Whether Tyk already has an API with this record's identity.
    pub async fn check_duplicate(&self, record: &ApiRecord) -> Result<bool> {
        let listing = self.tyk.list_apis().await?;
        Ok(is_duplicate(&listing, record, self.match_policy))
    }

    /// Skip or import one record and return its terminal state.
    pub async fn process_record(&self, record: &ApiRecord) -> RecordOutcome {
        match self.check_duplicate(record).await {
            Ok(true) => {
                info!(name = %record.name, listen_path = %record.listen_path, "Already in Tyk, skipping");
                return RecordOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(name = %record.name, error = %e, "Duplicate check failed");
                return RecordOutcome::Failed {
                    reason: format!("duplicate check failed: {e}"),
                };
            }
        }

        match self
            .tyk
            .import_oas(&record.document, &record.listen_path, &record.target_url)
            .await
        {
            Ok(response) if response.is_ok() => {
                info!(name = %record.name, listen_path = %record.listen_path, "Migrated");
                RecordOutcome::Migrated
            }
            Ok(response) => {
                warn!(
                    name = %record.name,
                    status = %response.status,
                    message = %response.message,
                    "Tyk rejected import"
                );
                RecordOutcome::Failed {
                    reason: format!("{}: {}", response.status, response.message),
                }
            }
            Err(e) => {
                warn!(name = %record.name, error = %e, "Import failed");
                RecordOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
