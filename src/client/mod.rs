pub mod ftp;
pub mod ops;

use crate::error::ClientResult;
use crate::listing::{EntryFilter, RemoteFile};
use crate::session::TransferMode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

pub use ftp::FtpClient;

/// Login details. They are sent to the server once and not kept.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub account: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            account: None,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .field("account", &self.account.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Where uploaded bytes come from.
pub enum Source {
    Bytes(Vec<u8>),
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

/// Where downloaded bytes go.
pub enum Destination {
    Path(PathBuf),
    /// Bytes are streamed through as they arrive, never buffered whole.
    Writer(Box<dyn Write + Send>),
}

/// Capability contract of a remote file store.
///
/// Every method may be called concurrently from many tasks; calls on one
/// client run one at a time, in the order they asked for the connection.
#[async_trait]
pub trait RemoteFileClient: Send + Sync {
    /// Authenticate, opening the connection first if needed.
    async fn connect(&self, credentials: &Credentials) -> ClientResult<()>;
    async fn disconnect(&self) -> ClientResult<()>;
    /// Probe the live connection with NOOP. A failed probe drops it.
    async fn is_connected(&self) -> bool;

    /// Upload; `append` adds to an existing remote file instead of replacing it.
    async fn put(&self, source: Source, remote: &str, append: bool) -> ClientResult<u64>;
    async fn get(&self, remote: &str, destination: Destination) -> ClientResult<u64>;
    async fn get_bytes(&self, remote: &str) -> ClientResult<Vec<u8>>;

    /// Entry names, or the server's long lines when `full`.
    async fn dir(&self, path: Option<&str>, full: bool) -> ClientResult<Vec<String>>;
    /// Names accepted by `filter`, each at most once. A missing filter is a
    /// validation error; no match gives an empty list.
    async fn dir_filtered(
        &self,
        path: Option<&str>,
        filter: Option<EntryFilter>,
    ) -> ClientResult<Vec<String>>;
    async fn list_files(&self, path: Option<&str>) -> ClientResult<Vec<RemoteFile>>;

    async fn delete(&self, remote: &str) -> ClientResult<()>;
    async fn rename(&self, from: &str, to: &str) -> ClientResult<()>;
    async fn mkdir(&self, dir: &str) -> ClientResult<()>;
    async fn rmdir(&self, dir: &str) -> ClientResult<()>;
    async fn chdir(&self, dir: &str) -> ClientResult<()>;
    async fn pwd(&self) -> ClientResult<String>;
    async fn size(&self, path: &str) -> ClientResult<u64>;

    /// Modification time in milliseconds since the epoch.
    async fn last_modified(&self, path: &str) -> ClientResult<i64>;
    async fn last_modified_date(&self, path: &str) -> ClientResult<DateTime<Utc>>;

    async fn set_transfer_mode(&self, mode: TransferMode);
    /// Keep-alive interval in seconds; 0 means disabled.
    async fn keep_alive_timeout(&self) -> u64;
    async fn set_keep_alive_timeout(&self, seconds: u64);
}
