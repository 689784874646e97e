use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use vault_sync_core::http::DEFAULT_TIMEOUT;
use vault_sync_core::{
    AuthMethod, Endpoint, HttpSettings, MigrationOptions, Mount, RunReport, Shutdown, SyncConfig,
    VaultConnector, resolve_credentials,
};

mod telemetry;

use telemetry::LogFormat;

const EXIT_FATAL: u8 = 1;
const EXIT_COPY_FAILURES: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "vault-sync",
    version,
    about = "Copy every KV secret from one Vault server to another"
)]
struct Cli {
    /// Source Vault address.
    #[arg(long, env = "VAULT_SYNC_SRC_ADDR")]
    srcaddr: String,
    /// Source credential; falls back to the token file.
    #[arg(long, env = "VAULT_SYNC_SRC_TOKEN", hide_env_values = true)]
    srctoken: Option<String>,
    /// Destination Vault address.
    #[arg(long, env = "VAULT_SYNC_DST_ADDR")]
    dstaddr: String,
    /// Destination credential; falls back to the token file.
    #[arg(long, env = "VAULT_SYNC_DST_TOKEN", hide_env_values = true)]
    dsttoken: Option<String>,
    /// How credentials are turned into Vault tokens.
    #[arg(long, value_enum, default_value_t = Method::Github, env = "VAULT_SYNC_METHOD")]
    method: Method,
    /// Mount path of the GitHub auth backend.
    #[arg(long, default_value = vault_sync_core::types::DEFAULT_GITHUB_MOUNT)]
    github_mount: String,
    /// Flat (KV v1) mount to copy. Repeatable; replaces the default mounts.
    #[arg(long = "kv-mount")]
    kv_mounts: Vec<String>,
    /// Versioned (KV v2) mount to copy. Repeatable; replaces the default mounts.
    #[arg(long = "kv2-mount")]
    kv2_mounts: Vec<String>,
    /// Copy workers per mount.
    #[arg(long, default_value_t = vault_sync_core::migrate::DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// LIST calls in flight per mount while enumerating.
    #[arg(long, default_value_t = vault_sync_core::enumerate::DEFAULT_LIST_CONCURRENCY)]
    list_concurrency: usize,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
    /// PEM or DER CA bundle trusted for both servers.
    #[arg(long, env = "VAULT_CACERT")]
    ca_cert: Option<PathBuf>,
    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,
    /// Vault Enterprise namespace sent with every request.
    #[arg(long, env = "VAULT_NAMESPACE")]
    namespace: Option<String>,
    /// Shared token file used for any endpoint without an explicit token.
    #[arg(long)]
    token_file: Option<PathBuf>,
    /// Read every secret but write nothing.
    #[arg(long)]
    dry_run: bool,
    /// Write the run report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Method {
    Github,
    Token,
}

impl Cli {
    fn auth_method(&self) -> AuthMethod {
        match self.method {
            Method::Github => AuthMethod::Github {
                mount: self.github_mount.clone(),
            },
            Method::Token => AuthMethod::Token,
        }
    }

    fn mounts(&self) -> Result<Vec<Mount>> {
        if self.kv_mounts.is_empty() && self.kv2_mounts.is_empty() {
            return Ok(Mount::defaults());
        }
        let versioned = self.kv2_mounts.iter().map(Mount::versioned);
        let flat = self.kv_mounts.iter().map(Mount::flat);
        versioned
            .chain(flat)
            .collect::<Result<Vec<_>, _>>()
            .context("invalid mount")
    }

    fn http_settings(&self) -> HttpSettings {
        HttpSettings::default()
            .timeout(Duration::from_secs(self.timeout_secs))
            .ca_bundle(self.ca_cert.clone())
            .insecure_tls(self.insecure)
            .namespace(self.namespace.clone())
    }

    fn config(&self) -> Result<SyncConfig> {
        let credentials = resolve_credentials(
            self.srctoken.clone(),
            self.dsttoken.clone(),
            self.token_file.as_deref(),
        )
        .context("failed to resolve credentials")?;
        let auth = self.auth_method();
        let config = SyncConfig::new(
            Endpoint::new(&self.srcaddr, credentials.source, auth.clone()),
            Endpoint::new(&self.dstaddr, credentials.destination, auth),
        )
        .with_mounts(self.mounts()?)
        .with_migration(MigrationOptions {
            concurrency: self.concurrency,
            dry_run: self.dry_run,
        })
        .with_list_concurrency(self.list_concurrency)
        .with_http(self.http_settings());
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(err) = telemetry::init(cli.log_format) {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_FATAL);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(execute(&cli)) {
        Ok(report) => {
            println!("{report}");
            if report.failed() > 0 {
                ExitCode::from(EXIT_COPY_FAILURES)
            } else if report.cancelled {
                eprintln!("error: run interrupted");
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn execute(cli: &Cli) -> Result<RunReport> {
    let config = cli.config()?;
    let connector = VaultConnector::new(config.http.clone());

    let shutdown = Shutdown::new();
    let signal = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            warn!("shutdown requested; finishing in-flight copies");
            shutdown.trigger();
        }
    });

    let outcome = vault_sync_core::run(&config, &connector, &shutdown).await;
    signal.abort();
    let report = outcome?;

    if let Some(path) = &cli.report {
        let body = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        fs::write(path, body)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    Ok(report)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
