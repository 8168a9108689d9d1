use super::{Credentials, Destination, RemoteFileClient, Source};
use crate::error::{require_name, ClientError, ClientResult};
use crate::listing::{apply_filter, long_lines, names, EntryFilter, RemoteFile};
use crate::reply::quoted_path;
use crate::session::{CommandExecutor, SessionSettings, TransferMode};
use crate::timestamp::TimestampResolver;
use crate::transport::{Connector, SuppaConnector};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

/// FTP implementation of [`RemoteFileClient`] over one lazily opened control
/// connection.
pub struct FtpClient {
    executor: CommandExecutor,
    resolver: TimestampResolver,
}

impl FtpClient {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_connector(settings, Arc::new(SuppaConnector))
    }

    pub fn with_connector(settings: SessionSettings, connector: Arc<dyn Connector>) -> Self {
        let resolver = TimestampResolver::new(settings.server_zone);
        Self {
            executor: CommandExecutor::new(settings, connector),
            resolver,
        }
    }

    async fn simple(&self, label: &'static str, command: String) -> ClientResult<()> {
        self.executor
            .execute(label, move |session| session.send_ok(&command).map(|_| ()))
            .await
    }

    async fn entries(&self, path: Option<&str>) -> ClientResult<Vec<RemoteFile>> {
        let path = listed_dir(path)?;
        self.executor
            .execute("list", move |session| session.list(path.as_deref()))
            .await
    }

    async fn raw_lines(&self, path: Option<&str>) -> ClientResult<Vec<String>> {
        let path = listed_dir(path)?;
        self.executor
            .execute("list", move |session| session.list_lines(path.as_deref()))
            .await
    }

    async fn mdtm(&self, path: &str) -> ClientResult<DateTime<Utc>> {
        let command = format!("MDTM {}", require_name("path", path)?);
        let resolver = self.resolver;
        self.executor
            .execute("mdtm", move |session| {
                resolver.resolve_reply(&session.send_raw(&command)?)
            })
            .await
    }
}

fn listed_dir(path: Option<&str>) -> ClientResult<Option<String>> {
    path.map(|path| require_name("directory", path).map(str::to_string))
        .transpose()
}

#[async_trait]
impl RemoteFileClient for FtpClient {
    async fn connect(&self, credentials: &Credentials) -> ClientResult<()> {
        require_name("username", &credentials.username)?;
        let credentials = credentials.clone();
        self.executor
            .execute("login", move |session| session.login(&credentials))
            .await
    }

    async fn disconnect(&self) -> ClientResult<()> {
        self.executor
            .execute("quit", |session| {
                session.quit();
                Ok(())
            })
            .await
    }

    async fn is_connected(&self) -> bool {
        self.executor
            .execute("noop", |session| Ok(session.probe()))
            .await
            .unwrap_or(false)
    }

    async fn put(&self, source: Source, remote: &str, append: bool) -> ClientResult<u64> {
        let remote = require_name("remote name", remote)?.to_string();
        let mut reader: Box<dyn Read + Send> = match source {
            Source::Bytes(bytes) => Box::new(Cursor::new(bytes)),
            Source::Path(path) => Box::new(File::open(&path).map_err(ClientError::Local)?),
            Source::Reader(reader) => reader,
        };
        self.executor
            .execute("store", move |session| {
                session.store(&remote, &mut reader, append)
            })
            .await
    }

    async fn get(&self, remote: &str, destination: Destination) -> ClientResult<u64> {
        let remote = require_name("remote name", remote)?.to_string();
        match destination {
            Destination::Writer(mut writer) => {
                self.executor
                    .execute("retrieve", move |session| {
                        session.retrieve(&remote, &mut writer)
                    })
                    .await
            }
            Destination::Path(path) => {
                // an existing file at `path` is only replaced once the download completes
                let dir = match path.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => dir,
                    _ => Path::new("."),
                };
                let mut temp = NamedTempFile::new_in(dir).map_err(ClientError::Local)?;
                let (bytes, temp) = self
                    .executor
                    .execute("retrieve", move |session| {
                        let bytes = session.retrieve(&remote, temp.as_file_mut())?;
                        Ok((bytes, temp))
                    })
                    .await?;
                temp.persist(&path).map_err(|e| ClientError::Local(e.error))?;
                Ok(bytes)
            }
        }
    }

    async fn get_bytes(&self, remote: &str) -> ClientResult<Vec<u8>> {
        let remote = require_name("remote name", remote)?.to_string();
        self.executor
            .execute("retrieve", move |session| {
                let mut buf = Vec::new();
                session.retrieve(&remote, &mut buf)?;
                Ok(buf)
            })
            .await
    }

    async fn dir(&self, path: Option<&str>, full: bool) -> ClientResult<Vec<String>> {
        if full {
            Ok(long_lines(&self.raw_lines(path).await?))
        } else {
            Ok(names(&self.entries(path).await?))
        }
    }

    async fn dir_filtered(
        &self,
        path: Option<&str>,
        filter: Option<EntryFilter>,
    ) -> ClientResult<Vec<String>> {
        let filter = filter.ok_or_else(|| ClientError::validation("a filter is required"))?;
        Ok(apply_filter(&self.entries(path).await?, &filter))
    }

    async fn list_files(&self, path: Option<&str>) -> ClientResult<Vec<RemoteFile>> {
        self.entries(path).await
    }

    async fn delete(&self, remote: &str) -> ClientResult<()> {
        let command = format!("DELE {}", require_name("remote name", remote)?);
        self.simple("delete", command).await
    }

    async fn rename(&self, from: &str, to: &str) -> ClientResult<()> {
        let from = require_name("rename source", from)?.to_string();
        let to = require_name("rename target", to)?.to_string();
        self.executor
            .execute("rename", move |session| session.rename(&from, &to))
            .await
    }

    async fn mkdir(&self, dir: &str) -> ClientResult<()> {
        let command = format!("MKD {}", require_name("directory", dir)?);
        self.simple("mkdir", command).await
    }

    async fn rmdir(&self, dir: &str) -> ClientResult<()> {
        let command = format!("RMD {}", require_name("directory", dir)?);
        self.simple("rmdir", command).await
    }

    async fn chdir(&self, dir: &str) -> ClientResult<()> {
        let command = format!("CWD {}", require_name("directory", dir)?);
        self.simple("chdir", command).await
    }

    async fn pwd(&self) -> ClientResult<String> {
        self.executor
            .execute("pwd", |session| {
                let reply = session.send("PWD")?.expect("257")?;
                quoted_path(&reply).ok_or_else(|| reply.into_error())
            })
            .await
    }

    async fn size(&self, path: &str) -> ClientResult<u64> {
        let command = format!("SIZE {}", require_name("path", path)?);
        self.executor
            .execute("size", move |session| {
                let reply = session.send(&command)?.expect("213")?;
                reply.text().parse().map_err(|_| reply.into_error())
            })
            .await
    }

    async fn last_modified(&self, path: &str) -> ClientResult<i64> {
        Ok(self.mdtm(path).await?.timestamp_millis())
    }

    async fn last_modified_date(&self, path: &str) -> ClientResult<DateTime<Utc>> {
        self.mdtm(path).await
    }

    async fn set_transfer_mode(&self, mode: TransferMode) {
        self.executor
            .with_session(|session| session.set_transfer_mode(mode))
            .await;
    }

    async fn keep_alive_timeout(&self) -> u64 {
        self.executor
            .with_session(|session| {
                session.settings().keep_alive.map_or(0, |d| d.as_secs())
            })
            .await
    }

    async fn set_keep_alive_timeout(&self, seconds: u64) {
        let interval = (seconds > 0).then(|| Duration::from_secs(seconds));
        self.executor
            .with_session(|session| session.set_keep_alive(interval))
            .await;
    }
}
