//! # Tykport Migration Engine
//!
//! This crate moves API definitions from WSO2 API Manager into a Tyk
//! Dashboard. APIs are exported with WSO2's `apictl`, the Swagger document
//! inside each export archive is read, and the document is imported into Tyk
//! unless an API with the same identity already exists there.
//!
//! ## Features
//!
//! - **Export**: drives `apictl` (environments, login, version checks, export)
//! - **Extraction**: reads `Definitions/swagger.json` out of each zip archive
//! - **Duplicate detection**: exact match on name and listen path, optionally
//!   the upstream URL too
//! - **Import**: posts the document to Tyk's OAS import endpoint
//! - **Reporting**: migrated/skipped/failed counts with per-archive detail
//!
//! ## Example
//!
//! ```rust,ignore
//! use tykport_migrate::{Apictl, MigrationConfig, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::new("http://tyk-dashboard:3000", "tyk_token")
//!         .with_env_name("migration");
//!
//!     let apictl = Apictl::new("apictl", None)?;
//!     let migrator = Migrator::new(apictl.exporter(&config.env_name), &config)?;
//!     let report = migrator.migrate().await?;
//!
//!     report.print_summary();
//!     Ok(())
//! }
//! ```

pub mod apictl;
pub mod archive;
pub mod client;
pub mod error;
pub mod matcher;
pub mod migrator;
pub mod progress;
pub mod types;

// Re-export main types
pub use apictl::{Apictl, ApictlExporter, Exporter};
pub use client::TykClient;
pub use error::{MigrationError, Result};
pub use migrator::Migrator;
pub use progress::{ConsoleProgressReporter, MigrationProgress, ProgressCallback};
pub use types::*;

/// Version of the migration tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
