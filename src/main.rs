use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use ftpr::config::{AppConfig, ConfigManager};
use ftpr::models::{find_host, search_hosts, FtpHost};
use ftpr::{FtpError, TransferEvent, TransferSession};

mod app_event;

use app_event::{ChannelListener, TransferUpdate};

#[derive(Debug, Parser)]
#[command(name = "ftpr", version, about = "Upload and download files over FTP")]
struct Cli {
    /// Host alias from hosts.toml (defaults to `default_host` in ftpr.toml)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Scramble payload bytes on the remote side
    #[arg(long, global = true)]
    data_safe: bool,

    /// Print the final transfer event as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List configured hosts, optionally fuzzy filtered
    Hosts { query: Option<String> },
    /// Open hosts.toml in the default editor
    EditHosts,
    Upload {
        local: PathBuf,
        remote: String,
        /// Append to the remote file instead of replacing it
        #[arg(long)]
        append: bool,
    },
    Download {
        remote: String,
        local: PathBuf,
        /// Expected size in bytes, used for progress only
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
    /// Print a remote file as hex
    Cat {
        remote: String,
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
    Delete { remote: String },
}

/// Work handed to the blocking transfer thread.
#[derive(Debug)]
enum Job {
    Upload { local: PathBuf, remote: String, append: bool },
    Download { remote: String, local: PathBuf, size: u64 },
    Cat { remote: String, size: u64 },
    Delete { remote: String },
}

impl Job {
    fn name(&self) -> &str {
        match self {
            Job::Upload { remote, .. }
            | Job::Download { remote, .. }
            | Job::Cat { remote, .. }
            | Job::Delete { remote } => remote,
        }
    }

    fn run(self, session: &mut TransferSession) -> Result<Option<String>, FtpError> {
        match self {
            Job::Upload { local, remote, append } => session.upload(&local, &remote, append).map(|_| None),
            Job::Download { remote, local, size } => session.download(&remote, &local, size).map(|_| None),
            Job::Cat { remote, size } => session.download_hex(&remote, size).map(Some),
            Job::Delete { remote } => session.delete_file(&remote).map(|_| None),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new()?;
    let app_config = config_manager.load_config()?;

    init_logging(&app_config)?;
    debug!("Starting ftpr with {:?}", cli.command);

    let job = match cli.command {
        Command::Hosts { query } => {
            let hosts = config_manager.load_hosts()?;
            print_hosts(&search_hosts(&hosts, query.as_deref().unwrap_or("")));
            return Ok(());
        }
        Command::EditHosts => return edit_hosts(&config_manager),
        Command::Upload { local, remote, append } => Job::Upload { local, remote, append },
        Command::Download { remote, local, size } => Job::Download { remote, local, size },
        Command::Cat { remote, size } => Job::Cat { remote, size },
        Command::Delete { remote } => Job::Delete { remote },
    };

    let hosts = config_manager.load_hosts()?;
    let alias = cli
        .host
        .or_else(|| app_config.default_host.clone())
        .context("No host given and no default_host configured")?;
    let host = find_host(&hosts, &alias)
        .with_context(|| format!("Unknown host alias '{}'", alias))?;

    run_job(host, &app_config, cli.data_safe, cli.json, job).await
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = &config.log_dir;
    if !std::path::Path::new(log_dir).exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let log_file = format!(
        "{}/ftpr_{}.log",
        log_dir,
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let file = File::create(&log_file)?;

    fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(EnvFilter::from_default_env().add_directive("ftpr=debug".parse()?))
        .with_ansi(false)
        .with_writer(file)
        .init();

    Ok(())
}

fn print_hosts(hosts: &[&FtpHost]) {
    for host in hosts {
        println!(
            "{:<16} {}@{}:{}  {}  {}",
            host.alias,
            host.user,
            host.host,
            host.port.unwrap_or(ftpr::profile::DEFAULT_PORT),
            host.group.as_deref().unwrap_or("-"),
            host.description.as_deref().unwrap_or("")
        );
    }
}

fn edit_hosts(config_manager: &ConfigManager) -> Result<()> {
    let hosts_path = config_manager.get_hosts_path();
    if !hosts_path.exists() {
        config_manager.save_hosts(&[])?;
    }

    if let Err(e) = open::that(hosts_path) {
        tracing::error!("Failed to open editor: {}", e);
        return Err(anyhow::anyhow!("Failed to open editor: {}", e));
    }
    Ok(())
}

async fn run_job(
    host: &FtpHost,
    app_config: &AppConfig,
    data_safe: bool,
    json: bool,
    job: Job,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = Arc::new(AtomicBool::new(false));
    let listener = Arc::new(ChannelListener::new(job.name(), tx, cancel.clone()));

    let profile = host.to_profile(app_config.passive_mode);
    let data_safe = data_safe || app_config.data_safe;
    tracing::info!("Running {:?} against {}", job, profile.label());

    let worker = tokio::task::spawn_blocking(move || {
        let mut session = TransferSession::new(profile);
        session.set_data_safe(data_safe);
        session.add_listener(listener);
        session.connect()?;
        let result = job.run(&mut session);
        session.close();
        result
    });

    let mut last_event: Option<TransferEvent> = None;
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(TransferUpdate::UploadProgress(name, done, total))
                | Some(TransferUpdate::DownloadProgress(name, done, total)) => {
                    print_progress(&name, done, total);
                }
                Some(TransferUpdate::Finished(_, event)) => {
                    eprintln!();
                    last_event = Some(event);
                }
                // The session dropped its listeners
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cancelling transfer");
                cancel.store(true, Ordering::SeqCst);
            }
        }
    }

    let output = worker.await.context("Transfer thread panicked")??;

    if json {
        if let Some(event) = &last_event {
            println!("{}", serde_json::to_string_pretty(event)?);
        }
    }
    if let Some(text) = output {
        println!("{}", text);
    } else if !json {
        if let Some(event) = &last_event {
            println!(
                "Done: {} bytes in {:.2}s",
                event.completed_size,
                event.elapsed().as_secs_f64()
            );
        } else {
            println!("Done");
        }
    }

    Ok(())
}

fn print_progress(name: &str, done: u64, total: u64) {
    let mut stderr = std::io::stderr();
    if total > 0 {
        let _ = write!(
            stderr,
            "\r{}: {}/{} bytes ({:.1}%)",
            name,
            done,
            total,
            done as f64 * 100.0 / total as f64
        );
    } else {
        let _ = write!(stderr, "\r{}: {} bytes", name, done);
    }
    let _ = stderr.flush();
}
