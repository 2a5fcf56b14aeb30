//! Wrapper around the WSO2 `apictl` command-line tool.

use crate::archive::list_archives;
use crate::error::{MigrationError, Result};

use async_trait::async_trait;
use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

/// Oldest `apictl` release whose export layout this crate understands.
pub const MIN_APICTL_VERSION: &str = "4.0.0";

/// Environment variable `apictl` reads its config directory from.
const CONFIG_DIR_VAR: &str = "APICTL_CONFIG_DIR";

/// Produces a directory of export archives, one per API.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Run the export and return the directory the archives were written to.
    async fn export(&self) -> Result<PathBuf>;
}

/// Handle on the `apictl` binary.
#[derive(Debug, Clone)]
pub struct Apictl {
    bin: PathBuf,
    config_dir: PathBuf,
}

impl Apictl {
    /// Create a wrapper for `bin`, keeping its state under `config_dir`.
    ///
    /// `config_dir` is the directory holding `.wso2apictl`; it defaults to
    /// the user's home directory.
    pub fn new(bin: impl Into<PathBuf>, config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
                MigrationError::InvalidConfig(
                    "HOME is not set; pass an apictl config directory".to_string(),
                )
            })?,
        };

        Ok(Self {
            bin: bin.into(),
            config_dir,
        })
    }

    /// Directory `apictl export apis` writes archives for `env` into.
    pub fn export_dir(&self, env: &str) -> PathBuf {
        self.config_dir
            .join(".wso2apictl")
            .join("exported")
            .join("migration")
            .join(env)
            .join("tenant-default")
            .join("apis")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.env(CONFIG_DIR_VAR, &self.config_dir);
        cmd
    }

    fn check_output(&self, args: &[&str], output: Output) -> Result<Output> {
        if output.status.success() {
            return Ok(output);
        }
        Err(MigrationError::ToolFailed(format!(
            "{} {}: {}",
            self.bin.display(),
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    fn spawn_error(&self, e: std::io::Error) -> MigrationError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MigrationError::ToolMissing(self.bin.display().to_string())
        } else {
            MigrationError::IoError(e)
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(bin = %self.bin.display(), ?args, "Running apictl");
        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|e| self.spawn_error(e))?;
        self.check_output(args, output)
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<Output> {
        debug!(bin = %self.bin.display(), ?args, "Running apictl with stdin");
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        self.check_output(args, output)
    }

    /// Installed tool version, e.g. `4.1.0`.
    pub fn version(&self) -> Result<String> {
        let output = self.run(&["version"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version_output(&stdout).ok_or_else(|| {
            MigrationError::ToolFailed(format!("unrecognized version output: {}", stdout.trim()))
        })
    }

    /// Fail unless the installed tool is at least `minimum`.
    pub fn check_version(&self, minimum: &str) -> Result<String> {
        let found = self.version()?;
        if compare_versions(&found, minimum) == Ordering::Less {
            return Err(MigrationError::IncompatibleVersion {
                found,
                required: minimum.to_string(),
            });
        }
        Ok(found)
    }

    /// Names of the registered environments.
    pub fn list_envs(&self) -> Result<Vec<String>> {
        let output = self.run(&["get", "envs"])?;
        Ok(parse_env_names(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Whether an environment called `name` is registered.
    pub fn env_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_envs()?.iter().any(|e| e == name))
    }

    /// Register environment `name` pointing at the API Manager `host`.
    pub fn add_env(&self, name: &str, host: &str) -> Result<()> {
        info!(env = %name, host = %host, "Adding apictl environment");
        self.run(&["add", "env", name, "--apim", host]).map(|_| ())
    }

    /// Remove environment `name`.
    pub fn remove_env(&self, name: &str) -> Result<()> {
        info!(env = %name, "Removing apictl environment");
        self.run(&["remove", "env", name]).map(|_| ())
    }

    /// Log in to environment `name`. The password is passed on stdin.
    pub fn login(&self, name: &str, username: &str, password: &str) -> Result<()> {
        info!(env = %name, user = %username, "Logging in to WSO2");
        self.run_with_stdin(
            &["login", name, "-u", username, "--password-stdin", "-k"],
            password,
        )
        .map(|_| ())
    }

    /// Remove stale archives left in the export directory for `env`.
    pub fn clear_export_dir(&self, env: &str) -> Result<PathBuf> {
        let dir = self.export_dir(env);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!(dir = %dir.display(), "Cleared export directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Export every published API of `env`.
    pub fn export_apis(&self, env: &str) -> Result<()> {
        info!(env = %env, "Exporting APIs from WSO2");
        self.run(&["export", "apis", "-e", env, "-k", "--force"])
            .map(|_| ())
            .map_err(|e| MigrationError::ExportFailed(e.to_string()))
    }

    /// An [`Exporter`] exporting from environment `env`.
    pub fn exporter(&self, env: impl Into<String>) -> ApictlExporter {
        ApictlExporter {
            apictl: self.clone(),
            env: env.into(),
        }
    }
}

/// Exports all APIs of one `apictl` environment.
#[derive(Debug, Clone)]
pub struct ApictlExporter {
    apictl: Apictl,
    env: String,
}

#[async_trait]
impl Exporter for ApictlExporter {
    async fn export(&self) -> Result<PathBuf> {
        let dir = self.apictl.clear_export_dir(&self.env)?;
        self.apictl.export_apis(&self.env)?;
        ensure_not_empty(&dir)?;
        Ok(dir)
    }
}

/// Fail when an export produced no archives.
pub fn ensure_not_empty(dir: &Path) -> Result<usize> {
    let count = list_archives(dir)?.len();
    if count == 0 {
        return Err(MigrationError::ExportFailed(format!(
            "no archives in {}",
            dir.display()
        )));
    }
    info!(count, dir = %dir.display(), "Export complete");
    Ok(count)
}

/// Extract `X.Y.Z` from `apictl version` output.
pub fn parse_version_output(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("version") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn version_parts(version: &str) -> Vec<u64> {
    let core = version.trim().trim_start_matches(['v', 'V']);
    let core = core.split(['-', '+']).next().unwrap_or(core);
    core.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Compare two dotted version strings numerically, component by component.
///
/// Missing components count as zero and pre-release suffixes are ignored.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (version_parts(a), version_parts(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Environment names from the `apictl get envs` table (first column, header
/// row skipped).
pub fn parse_env_names(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
