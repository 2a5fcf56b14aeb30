//! Tykport CLI - migrate WSO2 API Manager APIs into Tyk.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tykport_migrate::apictl::MIN_APICTL_VERSION;
use tykport_migrate::{DEFAULT_ENV_NAME, DEFAULT_TIMEOUT_SECS};

mod commands;

const REQUIRED: [&str; 5] = [
    "--wso2-host",
    "--wso2-username",
    "--wso2-password",
    "--tyk-host",
    "--tyk-token",
];

/// Tykport - migrate APIs from WSO2 API Manager to a Tyk Dashboard
///
/// The five connection settings may be given as flags or, in the same
/// order, as positional arguments.
#[derive(Parser, Debug)]
#[command(name = "tykport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// WSO2_HOST WSO2_USERNAME WSO2_PASSWORD TYK_HOST TYK_TOKEN
    #[arg(value_name = "ARGS")]
    positional: Vec<String>,

    /// WSO2 API Manager URL, e.g. https://wso2.example.com:9443
    #[arg(long)]
    wso2_host: Option<String>,

    /// WSO2 user allowed to export APIs
    #[arg(long)]
    wso2_username: Option<String>,

    /// WSO2 password
    #[arg(long, env = "WSO2_PASSWORD", hide_env_values = true)]
    wso2_password: Option<String>,

    /// Tyk Dashboard URL, e.g. http://tyk-dashboard:3000
    #[arg(long)]
    tyk_host: Option<String>,

    /// Tyk Dashboard API token
    #[arg(long, env = "TYK_TOKEN", hide_env_values = true)]
    tyk_token: Option<String>,

    /// apictl environment to export from (recreated on each run)
    #[arg(long, default_value = DEFAULT_ENV_NAME)]
    env_name: String,

    /// apictl binary
    #[arg(long, default_value = "apictl")]
    apictl_bin: PathBuf,

    /// Directory holding apictl's .wso2apictl state (default: $HOME)
    #[arg(long)]
    apictl_config_dir: Option<PathBuf>,

    /// Oldest apictl version accepted
    #[arg(long, default_value = MIN_APICTL_VERSION)]
    min_apictl_version: String,

    /// Also compare upstream URLs when looking for existing APIs
    #[arg(long)]
    match_target: bool,

    /// Recreate an existing apictl environment without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Write the migration report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Timeout for Tyk API calls, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Merge flags and positional arguments into complete settings.
    ///
    /// Positional argument `i` always fills slot `i`. With all five given
    /// positionally, a flag (or its environment variable) overrides its own
    /// slot. With fewer, a slot set both ways is rejected, since the
    /// positionals after it would land in the wrong slots.
    fn resolve(self) -> Result<commands::Settings, String> {
        let positional = self.positional;
        if positional.len() > REQUIRED.len() {
            return Err(format!(
                "expected at most {} positional arguments, got {}",
                REQUIRED.len(),
                positional.len()
            ));
        }

        let flags = [
            self.wso2_host,
            self.wso2_username,
            self.wso2_password,
            self.tyk_host,
            self.tyk_token,
        ];

        if positional.len() < REQUIRED.len() {
            let clash = flags
                .iter()
                .take(positional.len())
                .position(Option::is_some);
            if let Some(slot) = clash {
                return Err(format!(
                    "{} is also given as positional argument {}; pass all five \
                     positionally or move the later ones to flags",
                    REQUIRED[slot],
                    slot + 1
                ));
            }
        }

        let mut missing = Vec::new();
        let values: Vec<String> = flags
            .into_iter()
            .zip(REQUIRED)
            .enumerate()
            .filter_map(|(slot, (flag, name))| {
                let value = flag
                    .or_else(|| positional.get(slot).cloned())
                    .filter(|v| !v.is_empty());
                if value.is_none() {
                    missing.push(name);
                }
                value
            })
            .collect();

        let Ok([wso2_host, wso2_username, wso2_password, tyk_host, tyk_token]) =
            <[String; 5]>::try_from(values)
        else {
            return Err(format!("missing required arguments: {}", missing.join(", ")));
        };

        Ok(commands::Settings {
            wso2_host,
            wso2_username,
            wso2_password,
            tyk_host,
            tyk_token,
            env_name: self.env_name,
            apictl_bin: self.apictl_bin,
            apictl_config_dir: self.apictl_config_dir,
            min_apictl_version: self.min_apictl_version,
            match_target: self.match_target,
            assume_yes: self.yes,
            report_path: self.report,
            timeout_secs: self.timeout_secs,
        })
    }
}

fn init_logging(verbose: u8, json: bool) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("tykport={log_level},tykport_migrate={log_level}").into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    init_logging(cli.verbose, cli.json_logs);

    let settings = match cli.resolve() {
        Ok(settings) => settings,
        Err(message) => {
            eprintln!("Error: {message}\n");
            eprintln!("{}", Cli::command().render_usage());
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::migrate(&settings)) {
        Ok(report) => report.print_summary(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
