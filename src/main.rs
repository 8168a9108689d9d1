#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::cast_precision_loss
)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use remote_fs::client::ops;
use remote_fs::config::Config;
use remote_fs::utils::{join_remote, remote_file_name};
use remote_fs::{Credentials, FtpClient, RemoteFileClient};
use std::path::PathBuf;
use std::time::Duration;

/// Helper function to ensure config has password, prompting if needed
fn ensure_password(config: &mut Config) -> Result<()> {
    if config.password.is_none() {
        use std::io::Write;

        print!("Password (hidden - you won't see it when you type): ");
        std::io::stdout().flush()?;

        // Try to read password securely, fallback to regular input if needed
        match rpassword::prompt_password("") {
            Ok(password) => {
                config.password = Some(password);
            }
            Err(_) => {
                let mut password = String::new();
                std::io::stdin().read_line(&mut password)?;
                config.password = Some(password.trim().to_string());
            }
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log every command sent to the server
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a remote directory
    List {
        /// Directory to list (working directory if omitted)
        path: Option<String>,

        /// Show the server's long listing lines
        #[arg(short, long)]
        long: bool,

        /// Only names matching this pattern, e.g. "*.csv"
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Download a file
    Get {
        remote: String,

        /// Local destination directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,
    },

    /// Upload files
    Put {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination directory on server
        #[arg(short, long)]
        dest: Option<String>,

        /// Append to existing remote files instead of replacing them
        #[arg(short, long)]
        append: bool,
    },

    /// Delete a remote file
    Delete { remote: String },

    /// Rename a remote file
    Rename { from: String, to: String },

    /// Create a remote directory
    Mkdir { dir: String },

    /// Remove a remote directory
    Rmdir { dir: String },

    /// Show a remote file's modification time
    Mtime { path: String },

    /// Show a remote file's size
    Size { path: String },

    /// Check that the server answers
    Ping,

    /// Configure server settings
    Config {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        username: Option<String>,

        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,

        /// Zone the server reports times in: UTC, local, or +HH:MM
        #[arg(long)]
        time_zone: Option<String>,
    },
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

async fn connect(mut config: Config) -> Result<FtpClient> {
    ensure_password(&mut config)?;
    let client = FtpClient::new(config.session_settings()?);
    client.set_transfer_mode(config.transfer_mode).await;

    let mut credentials = Credentials::new(
        config.username.clone(),
        config.password.clone().unwrap_or_default(),
    );
    if let Some(account) = config.account.clone() {
        credentials = credentials.with_account(account);
    }
    client.connect(&credentials).await?;
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = Config::load()?;
    if cli.verbose {
        config.debug = true;
    }
    if !config.is_configured() && !matches!(cli.command, Commands::Config { .. }) {
        config.interactive_setup()?;
    }

    if let Commands::Config {
        host,
        port,
        username,
        password,
        time_zone,
    } = cli.command
    {
        // If no arguments provided, run interactive setup
        if host.is_none() && port.is_none() && username.is_none() && password.is_none() && time_zone.is_none() {
            config.interactive_setup()?;
        } else {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(username) = username {
                config.username = username;
            }
            if let Some(password) = password {
                config.password = Some(password);
            }
            if let Some(zone) = time_zone {
                zone.parse::<remote_fs::ServerZone>()?;
                config.server_time_zone = Some(zone);
            }
            config.configured = true;
            config.save()?;
            println!("Configuration saved successfully!");
        }
        return Ok(());
    }

    let client = connect(config).await?;
    let result = run(&client, cli.command).await;
    client.disconnect().await?;
    result
}

async fn run(client: &FtpClient, command: Commands) -> Result<()> {
    match command {
        Commands::List { path, long, pattern } => {
            let names = match pattern {
                Some(pattern) if long => {
                    ops::dir_long_matching(client, path.as_deref(), &pattern).await?
                }
                Some(pattern) => ops::dir_matching(client, path.as_deref(), &pattern).await?,
                None => client.dir(path.as_deref(), long).await?,
            };
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Get { remote, dest } => {
            let local_path = dest.join(remote_file_name(&remote));
            let pb = spinner(format!("Downloading {}", remote))?;
            let bytes = ops::get_file(client, &remote, &local_path).await;
            pb.finish_and_clear();
            println!(
                "Downloaded {} to {:?} ({})",
                remote,
                local_path,
                human_bytes::human_bytes(bytes? as f64)
            );
        }
        Commands::Put { files, dest, append } => {
            let dest = dest.unwrap_or_else(|| ".".to_string());
            let mut failed = 0;

            for file in &files {
                if !file.exists() {
                    eprintln!("File not found: {:?}", file);
                    failed += 1;
                    continue;
                }
                let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or("file");
                let remote_path = join_remote(&dest, filename);

                let pb = spinner(format!("Uploading {:?} to {}", file, remote_path))?;
                let result = client
                    .put(remote_fs::Source::Path(file.clone()), &remote_path, append)
                    .await;
                pb.finish_and_clear();

                match result {
                    Ok(bytes) => println!(
                        "✓ {} ({})",
                        remote_path,
                        human_bytes::human_bytes(bytes as f64)
                    ),
                    Err(e) => {
                        println!("✗ {}: {}", remote_path, e);
                        failed += 1;
                    }
                }
            }

            println!(
                "\nUpload complete: {} successful, {} failed",
                files.len() - failed,
                failed
            );
            if failed > 0 {
                bail!("{} uploads failed", failed);
            }
        }
        Commands::Delete { remote } => client.delete(&remote).await?,
        Commands::Rename { from, to } => client.rename(&from, &to).await?,
        Commands::Mkdir { dir } => client.mkdir(&dir).await?,
        Commands::Rmdir { dir } => client.rmdir(&dir).await?,
        Commands::Mtime { path } => {
            let modified = client.last_modified_date(&path).await?;
            println!("{}\t{}", modified.to_rfc3339(), path);
        }
        Commands::Size { path } => {
            let size = client.size(&path).await?;
            println!("{}\t{}", human_bytes::human_bytes(size as f64), path);
        }
        Commands::Ping => {
            if client.is_connected().await {
                println!("Server is reachable");
            } else {
                bail!("Server did not answer");
            }
        }
        Commands::Config { .. } => bail!("config does not need a connection"),
    }
    Ok(())
}
