//! CLI command implementations.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tykport_migrate::{
    Apictl, ConsoleProgressReporter, MatchPolicy, MigrationConfig, MigrationError,
    MigrationProgress, MigrationReport, Migrator,
};

/// Fully resolved command-line settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub wso2_host: String,
    pub wso2_username: String,
    pub wso2_password: String,
    pub tyk_host: String,
    pub tyk_token: String,
    pub env_name: String,
    pub apictl_bin: PathBuf,
    pub apictl_config_dir: Option<PathBuf>,
    pub min_apictl_version: String,
    pub match_target: bool,
    pub assume_yes: bool,
    pub report_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Settings {
    fn migration_config(&self) -> MigrationConfig {
        let policy = if self.match_target {
            MatchPolicy::NameListenPathTarget
        } else {
            MatchPolicy::NameListenPath
        };

        let config = MigrationConfig::new(&self.tyk_host, &self.tyk_token)
            .with_env_name(&self.env_name)
            .with_match_policy(policy)
            .with_timeout_secs(self.timeout_secs);

        match &self.apictl_config_dir {
            Some(dir) => config.with_apictl_config_dir(dir),
            None => config,
        }
    }
}

/// Check that `apictl` is installed and recent enough.
pub fn check_apictl(apictl: &Apictl, minimum: &str) -> Result<()> {
    match apictl.check_version(minimum) {
        Ok(version) => {
            tracing::info!(version = %version, "Found apictl");
            Ok(())
        }
        Err(e @ MigrationError::ToolMissing(_)) => {
            Err(e).context("apictl is required; install it and make sure it is on PATH")
        }
        Err(e) => Err(e.into()),
    }
}

/// Register the export environment and log in to it.
///
/// An existing registration with the same name is only replaced after
/// `confirm` agrees.
pub fn prepare_env(
    apictl: &Apictl,
    settings: &Settings,
    confirm: impl FnOnce(&str) -> Result<bool>,
) -> Result<()> {
    let env = &settings.env_name;

    if apictl.env_exists(env)? {
        let prompt = format!("apictl environment '{env}' already exists. Recreate it?");
        if !settings.assume_yes && !confirm(&prompt)? {
            bail!("refusing to modify existing apictl environment '{env}'");
        }
        apictl.remove_env(env)?;
    }

    apictl.add_env(env, &settings.wso2_host)?;
    apictl
        .login(env, &settings.wso2_username, &settings.wso2_password)
        .context("WSO2 login failed")?;
    Ok(())
}

fn confirm_interactive(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("could not read confirmation")
}

/// Write the report as pretty JSON.
pub fn write_report(path: &Path, report: &MigrationReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("could not write report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Report written");
    Ok(())
}

/// Run pre-flight checks, then the full migration.
pub async fn migrate(settings: &Settings) -> Result<MigrationReport> {
    let config = settings.migration_config();
    let apictl = Apictl::new(&settings.apictl_bin, config.apictl_config_dir.clone())?;

    check_apictl(&apictl, &settings.min_apictl_version)?;

    let migrator = Migrator::new(apictl.exporter(&config.env_name), &config)?;
    migrator
        .tyk()
        .health_check()
        .await
        .with_context(|| format!("Tyk Dashboard at {} is not usable", settings.tyk_host))?;

    prepare_env(&apictl, settings, confirm_interactive)?;

    let reporter = ConsoleProgressReporter::new();
    let migrator = migrator.with_progress(MigrationProgress::with_callback(reporter.callback()));
    let report = migrator.migrate().await?;
    reporter.finish("done");

    if let Some(path) = &settings.report_path {
        write_report(path, &report)?;
    }

    Ok(report)
}
