use crate::session::{SessionSettings, TransferMode, DEFAULT_PORT};
use crate::timestamp::ServerZone;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_data_timeout")]
    pub data_timeout_secs: u64,
    #[serde(default)]
    pub keep_alive_secs: Option<u64>,
    /// `UTC`, `local` or an offset like `+02:00`; unset means local.
    #[serde(default)]
    pub server_time_zone: Option<String>,
    #[serde(default)]
    pub transfer_mode: TransferMode,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub configured: bool,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_data_timeout() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: None,
            account: None,
            connect_timeout_secs: default_connect_timeout(),
            data_timeout_secs: default_data_timeout(),
            keep_alive_secs: None,
            server_time_zone: None,
            transfer_mode: TransferMode::default(),
            debug: false,
            configured: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                let content = fs::read_to_string(&config_path)
                    .with_context(|| format!("reading {}", config_path.display()))?;
                let config: Config = serde_json::from_str(&content)
                    .with_context(|| format!("parsing {}", config_path.display()))?;
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_path() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(config_path, content)?;
        }
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "remote-fs", "remote-fs")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn is_configured(&self) -> bool {
        self.configured && !self.host.is_empty() && !self.username.is_empty()
    }

    pub fn server_zone(&self) -> Result<ServerZone> {
        match &self.server_time_zone {
            Some(zone) => Ok(zone.parse()?),
            None => Ok(ServerZone::Local),
        }
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        let mut settings = SessionSettings::new(self.host.clone(), self.port);
        settings.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        settings.data_timeout = Duration::from_secs(self.data_timeout_secs);
        settings.keep_alive = self
            .keep_alive_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        settings.server_zone = self.server_zone()?;
        settings.debug = self.debug;
        Ok(settings)
    }

    pub fn interactive_setup(&mut self) -> Result<()> {
        println!("\nremote-fs setup");
        println!("━━━━━━━━━━━━━━━");
        println!("Let's configure your connection settings:\n");

        self.host = prompt("Server host: ")?;

        let port = prompt(&format!("Port [{}]: ", self.port))?;
        if !port.is_empty() {
            self.port = port.parse().context("port must be a number")?;
        }

        self.username = prompt("Username: ")?;

        // Get password with hidden input
        self.password = Some(rpassword::prompt_password("Password: ").unwrap_or_default());

        let zone = prompt("Server time zone (UTC, local, +02:00) [local]: ")?;
        if !zone.is_empty() {
            zone.parse::<ServerZone>()?;
            self.server_time_zone = Some(zone);
        }

        self.configured = true;
        self.save()?;

        println!("\nConfiguration complete!");
        println!("Your settings have been saved to: {:?}", Self::config_path());
        println!("You can reconfigure at any time by running: remote-fs config\n");
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
