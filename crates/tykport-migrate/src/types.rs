//! Common types for migration operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default name of the control tool environment used for the export.
pub const DEFAULT_ENV_NAME: &str = "migration";

/// Default HTTP timeout for calls to the Tyk Dashboard, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which fields must match for an existing Tyk API to count as a duplicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Name and listen path.
    #[default]
    NameListenPath,
    /// Name, listen path and upstream target URL.
    NameListenPathTarget,
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameListenPath => write!(f, "name+listen_path"),
            Self::NameListenPathTarget => write!(f, "name+listen_path+target_url"),
        }
    }
}

/// Configuration for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Tyk Dashboard base URL.
    pub tyk_url: String,

    /// Tyk Dashboard API token.
    pub tyk_token: String,

    /// Control tool environment the APIs are exported from.
    pub env_name: String,

    /// Directory holding the control tool's `.wso2apictl` state.
    /// Defaults to `$HOME`.
    pub apictl_config_dir: Option<PathBuf>,

    /// Duplicate detection policy.
    pub match_policy: MatchPolicy,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl MigrationConfig {
    /// Create a new migration configuration.
    pub fn new(tyk_url: impl Into<String>, tyk_token: impl Into<String>) -> Self {
        Self {
            tyk_url: tyk_url.into(),
            tyk_token: tyk_token.into(),
            env_name: DEFAULT_ENV_NAME.to_string(),
            apictl_config_dir: None,
            match_policy: MatchPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the control tool environment name.
    pub fn with_env_name(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = env_name.into();
        self
    }

    /// Set the directory holding the control tool state.
    pub fn with_apictl_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.apictl_config_dir = Some(dir.into());
        self
    }

    /// Set the duplicate detection policy.
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// One API extracted from an export archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRecord {
    /// File name of the archive the record came from.
    pub archive: String,
    /// API title.
    pub name: String,
    /// API version.
    pub version: String,
    /// Gateway listen path (WSO2 base path).
    pub listen_path: String,
    /// First production endpoint.
    pub target_url: String,
    /// Parsed description document.
    pub description: serde_json::Value,
    /// Description document bytes exactly as stored in the archive. This is
    /// what gets imported, so key order and formatting survive.
    pub document: Vec<u8>,
}

impl ApiRecord {
    /// Whether the upstream points at a loopback host name.
    pub fn targets_localhost(&self) -> bool {
        self.target_url.to_ascii_lowercase().contains("localhost")
    }
}

/// Terminal state of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RecordOutcome {
    /// Imported into Tyk.
    Migrated,
    /// Already present in Tyk.
    Skipped,
    /// Could not be parsed or imported.
    Failed {
        /// Why the record failed.
        reason: String,
    },
}

/// Outcome of one archive, as kept in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResult {
    /// Archive file name.
    pub archive: String,
    /// API name, if the description could be parsed.
    pub name: Option<String>,
    /// Final state.
    pub outcome: RecordOutcome,
}

/// Report of a completed migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    /// APIs imported into Tyk.
    pub migrated: usize,

    /// APIs skipped because they already exist.
    pub skipped: usize,

    /// APIs that failed to parse or import.
    pub failed: usize,

    /// Per-archive results in processing order.
    pub records: Vec<RecordResult>,

    /// Non-fatal warnings raised during the run.
    pub warnings: Vec<String>,

    /// Start time of migration.
    pub started_at: Option<DateTime<Utc>>,

    /// End time of migration.
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the migration as complete.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Record the outcome of one archive and bump the matching counter.
    pub fn record(&mut self, archive: &str, name: Option<&str>, outcome: RecordOutcome) {
        match &outcome {
            RecordOutcome::Migrated => self.migrated += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
        self.records.push(RecordResult {
            archive: archive.to_string(),
            name: name.map(str::to_string),
            outcome,
        });
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Number of archives processed.
    pub fn total(&self) -> usize {
        self.migrated + self.skipped + self.failed
    }

    /// Whether every archive was either migrated or skipped.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Get the duration of the migration.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Failed records with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&RecordResult, &str)> {
        self.records.iter().filter_map(|r| match &r.outcome {
            RecordOutcome::Failed { reason } => Some((r, reason.as_str())),
            _ => None,
        })
    }

    /// Print a summary of the migration.
    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===\n");
        println!("Archives processed: {}", self.total());
        println!("Migrated:           {}", self.migrated);
        println!("Skipped:            {}", self.skipped);
        println!("Failed:             {}", self.failed);

        if let Some(duration) = self.duration() {
            println!("\nCompleted in {} seconds", duration.num_seconds());
        }

        if self.failed > 0 {
            println!("\nFailures ({}):", self.failed);
            for (record, reason) in self.failures() {
                let label = record.name.as_deref().unwrap_or(&record.archive);
                println!("  [FAILED] {label}: {reason}");
            }
        }

        if !self.warnings.is_empty() {
            println!("\nWarnings ({}):", self.warnings.len());
            for warning in &self.warnings {
                println!("  - {warning}");
            }
        }

        println!(
            "\nMigrated {} APIs, skipped {} duplicates, {} failed",
            self.migrated, self.skipped, self.failed
        );
    }
}
