//! Command execution over the single control connection.
//!
//! All commands of one client go through [`CommandExecutor`], which holds a
//! `tokio::sync::Mutex` around the [`Session`]. That mutex hands out the lock
//! in the order it was requested, so waiting callers are served first come,
//! first served. The lock is held for the whole command, data transfer
//! included, and is released on every exit path when the guard drops.

use crate::client::Credentials;
use crate::error::{ClientError, ClientResult};
use crate::listing::{parse_listing, RemoteFile};
use crate::reply::Reply;
use crate::timestamp::ServerZone;
use crate::transport::{Connector, Transport};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_PORT: u16 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferMode {
    Ascii,
    #[default]
    Binary,
}

/// Everything needed to (re)open the control connection.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub data_timeout: Duration,
    pub keep_alive: Option<Duration>,
    pub server_zone: ServerZone,
    /// Log every command and reply at `debug` instead of `trace`.
    pub debug: bool,
}

impl SessionSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(30),
            data_timeout: Duration::from_secs(60),
            keep_alive: None,
            server_zone: ServerZone::Local,
            debug: false,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
}

pub struct Session {
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    state: SessionState,
    mode: TransferMode,
    applied_mode: Option<TransferMode>,
}

impl Session {
    pub fn new(settings: SessionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
            transport: None,
            state: SessionState::Disconnected,
            mode: TransferMode::default(),
            applied_mode: None,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn set_keep_alive(&mut self, interval: Option<Duration>) {
        self.settings.keep_alive = interval;
    }

    /// Takes effect before the next data transfer.
    pub fn set_transfer_mode(&mut self, mode: TransferMode) {
        self.mode = mode;
    }

    pub const fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    fn wire_log(&self, direction: &str, line: &str) {
        if self.settings.debug {
            log::debug!("{direction} {line}");
        } else {
            log::trace!("{direction} {line}");
        }
    }

    /// Open the control connection unless one is already live.
    fn ensure_connected(&mut self) -> ClientResult<&mut dyn Transport> {
        if self.transport.is_none() {
            let transport = self.connector.connect(&self.settings)?;
            let greeting = transport
                .greeting()
                .ok_or_else(|| ClientError::connection("server sent no greeting"))?;
            self.wire_log("<<<", &greeting);

            let reply = Reply::parse(&greeting)?;
            if !reply.is_positive_completion() {
                return Err(ClientError::connection(format!(
                    "{} refused the connection: {reply}",
                    self.settings.address()
                )));
            }

            log::debug!("connected to {}", self.settings.address());
            self.transport = Some(transport);
            self.state = SessionState::Connected;
            self.applied_mode = None;
        }

        match self.transport.as_deref_mut() {
            Some(transport) => Ok(transport),
            None => Err(ClientError::connection("no control connection")),
        }
    }

    /// Drop the transport so the next command reconnects.
    pub fn teardown(&mut self) {
        if self.transport.take().is_some() {
            log::warn!("dropping control connection to {}", self.settings.address());
        }
        self.state = SessionState::Disconnected;
        self.applied_mode = None;
    }

    /// Send one command and return the unparsed reply, connecting first if
    /// needed.
    pub fn send_raw(&mut self, command: &str) -> ClientResult<String> {
        let shown = if command.starts_with("PASS ") || command.starts_with("ACCT ") {
            format!("{} ****", &command[..4])
        } else {
            command.to_string()
        };
        self.wire_log(">>>", &shown);

        let raw = self.ensure_connected()?.command(command)?;
        self.wire_log("<<<", raw.trim_end());
        Ok(raw)
    }

    pub fn send(&mut self, command: &str) -> ClientResult<Reply> {
        Reply::parse(&self.send_raw(command)?)
    }

    /// Send a command whose success is any positive completion.
    pub fn send_ok(&mut self, command: &str) -> ClientResult<Reply> {
        self.send(command)?.require_completion()
    }

    /// USER, then PASS and ACCT as far as the server asks for them.
    pub fn login(&mut self, credentials: &Credentials) -> ClientResult<()> {
        let mut reply = self.send(&format!("USER {}", credentials.username))?;

        if reply.code() == "331" {
            reply = self.send(&format!("PASS {}", credentials.password))?;
        }
        if reply.code() == "332" {
            let account = credentials.account.as_deref().ok_or_else(|| {
                ClientError::protocol(reply.code(), "server requires an account")
            })?;
            reply = self.send(&format!("ACCT {account}"))?;
        }

        reply.require_completion()?;
        self.state = SessionState::Authenticated;
        log::debug!("logged in as {}", credentials.username);
        Ok(())
    }

    /// Connect, then apply the transfer type and keep-alive a transfer needs.
    fn prepare_transfer(&mut self) -> ClientResult<&mut dyn Transport> {
        let mode = self.mode;
        let keep_alive = self.settings.keep_alive;
        let needs_mode = self.applied_mode != Some(mode);

        let transport = self.ensure_connected()?;
        if needs_mode {
            transport.set_transfer_mode(mode)?;
        }
        transport.set_keep_alive(keep_alive)?;
        self.applied_mode = Some(mode);

        match self.transport.as_deref_mut() {
            Some(transport) => Ok(transport),
            None => Err(ClientError::connection("no control connection")),
        }
    }

    pub fn store(&mut self, remote: &str, source: &mut dyn Read, append: bool) -> ClientResult<u64> {
        log::debug!("{} {remote}", if append { "APPE" } else { "STOR" });
        self.prepare_transfer()?.store(remote, source, append)
    }

    pub fn retrieve(&mut self, remote: &str, sink: &mut dyn Write) -> ClientResult<u64> {
        log::debug!("RETR {remote}");
        self.prepare_transfer()?.retrieve(remote, sink)
    }

    /// LIST lines exactly as the server sent them.
    pub fn list_lines(&mut self, path: Option<&str>) -> ClientResult<Vec<String>> {
        log::debug!("LIST {}", path.unwrap_or("."));
        self.prepare_transfer()?.list(path)
    }

    pub fn list(&mut self, path: Option<&str>) -> ClientResult<Vec<RemoteFile>> {
        let lines = self.list_lines(path)?;
        Ok(parse_listing(&lines, path.unwrap_or(".")))
    }

    /// Two phase rename: RNFR must be accepted with 350 before RNTO.
    pub fn rename(&mut self, from: &str, to: &str) -> ClientResult<()> {
        self.send(&format!("RNFR {from}"))?.require_intermediate()?;
        self.send_ok(&format!("RNTO {to}"))?;
        Ok(())
    }

    /// NOOP on the live connection; never opens a new one. Any answer other
    /// than 2xx drops the connection.
    pub fn probe(&mut self) -> bool {
        if self.transport.is_none() {
            return false;
        }
        let alive = match self.send("NOOP") {
            Ok(reply) if reply.is_positive_completion() => true,
            Ok(reply) => {
                log::debug!("keep-alive probe refused: {reply}");
                false
            }
            Err(err) => {
                log::debug!("keep-alive probe failed: {err}");
                false
            }
        };
        if !alive {
            self.teardown();
        }
        alive
    }

    /// QUIT if connected, then forget the connection whatever the outcome.
    pub fn quit(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            self.wire_log(">>>", "QUIT");
            if let Err(err) = transport.close() {
                log::debug!("QUIT failed: {err}");
            }
            log::debug!("disconnected from {}", self.settings.address());
        }
        self.state = SessionState::Disconnected;
        self.applied_mode = None;
    }
}

/// Serializes every command of one client over its session.
pub struct CommandExecutor {
    session: Arc<Mutex<Session>>,
}

impl CommandExecutor {
    pub fn new(settings: SessionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(settings, connector))),
        }
    }

    /// Run `op` with exclusive use of the session.
    ///
    /// The blocking I/O runs on tokio's blocking pool while this call keeps
    /// the lock. A connection failure tears the session down before the lock
    /// is released; a rejected reply leaves it connected.
    pub async fn execute<T, F>(&self, label: &'static str, op: F) -> ClientResult<T>
    where
        F: FnOnce(&mut Session) -> ClientResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut session = Arc::clone(&self.session).lock_owned().await;

        tokio::task::spawn_blocking(move || {
            let result = op(&mut session);
            if let Err(err) = &result {
                if err.is_connection() {
                    log::warn!("{label} failed: {err}");
                    session.teardown();
                } else {
                    log::debug!("{label} rejected: {err}");
                }
            }
            result
        })
        .await
        .map_err(|e| ClientError::connection(format!("{label} did not complete: {e}")))?
    }

    /// Lock the session for a change that does not touch the wire.
    pub async fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut session = self.session.lock().await;
        f(&mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Transport answering from a fixed script and recording what it was sent.
    struct Scripted {
        greeting: String,
        replies: VecDeque<ClientResult<String>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(greeting: &str, replies: Vec<ClientResult<String>>) -> (Self, Arc<StdMutex<Vec<String>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let transport = Self {
                greeting: greeting.to_string(),
                replies: replies.into(),
                sent: Arc::clone(&sent),
            };
            (transport, sent)
        }
    }

    impl Transport for Scripted {
        fn greeting(&self) -> Option<String> {
            Some(self.greeting.clone())
        }

        fn command(&mut self, line: &str) -> ClientResult<String> {
            self.sent.lock().unwrap().push(line.to_string());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::connection("script exhausted")))
        }

        fn set_transfer_mode(&mut self, mode: TransferMode) -> ClientResult<()> {
            self.sent.lock().unwrap().push(format!("TYPE {mode:?}"));
            Ok(())
        }

        fn set_keep_alive(&mut self, _interval: Option<Duration>) -> ClientResult<()> {
            Ok(())
        }

        fn store(&mut self, remote: &str, source: &mut dyn Read, _append: bool) -> ClientResult<u64> {
            let mut buf = Vec::new();
            source.read_to_end(&mut buf)?;
            self.sent.lock().unwrap().push(format!("STOR {remote}"));
            Ok(buf.len() as u64)
        }

        fn retrieve(&mut self, remote: &str, _sink: &mut dyn Write) -> ClientResult<u64> {
            self.sent.lock().unwrap().push(format!("RETR {remote}"));
            Ok(0)
        }

        fn list(&mut self, _path: Option<&str>) -> ClientResult<Vec<String>> {
            Ok(vec!["-rw-r--r-- 1 u g 5 Jan 01 00:00 a.txt".to_string()])
        }

        fn close(&mut self) -> ClientResult<()> {
            self.sent.lock().unwrap().push("QUIT".to_string());
            Ok(())
        }
    }

    mock! {
        TestConnector {}

        impl Connector for TestConnector {
            fn connect(&self, settings: &SessionSettings) -> ClientResult<Box<dyn Transport>>;
        }
    }

    fn ok(raw: &str) -> ClientResult<String> {
        Ok(raw.to_string())
    }

    fn session_with(greeting: &str, replies: Vec<ClientResult<String>>) -> (Session, Arc<StdMutex<Vec<String>>>) {
        let (transport, sent) = Scripted::new(greeting, replies);
        let mut transport = Some(transport);
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(move |_| match transport.take() {
                Some(t) => Ok(Box::new(t) as Box<dyn Transport>),
                None => Err(ClientError::connection("no more transports")),
            });
        let session = Session::new(SessionSettings::new("ftp.example.com", 21), Arc::new(connector));
        (session, sent)
    }

    fn creds(account: Option<&str>) -> Credentials {
        Credentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
            account: account.map(str::to_string),
        }
    }

    #[test]
    fn test_login_user_pass() {
        let (mut session, sent) =
            session_with("220 ready", vec![ok("331 need password"), ok("230 welcome")]);
        session.login(&creds(None)).unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(*sent.lock().unwrap(), vec!["USER alice", "PASS secret"]);
    }

    #[test]
    fn test_login_with_account() {
        let (mut session, sent) = session_with(
            "220 ready",
            vec![ok("331 need password"), ok("332 need account"), ok("230 ok")],
        );
        session.login(&creds(Some("billing"))).unwrap();
        assert_eq!(sent.lock().unwrap().last().unwrap(), "ACCT billing");
    }

    #[test]
    fn test_login_account_required_but_missing() {
        let (mut session, _) =
            session_with("220 ready", vec![ok("331 need password"), ok("332 need account")]);
        let err = session.login(&creds(None)).unwrap_err();
        assert_eq!(err.reply_code(), Some("332"));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_login_rejected_keeps_connection() {
        let (mut session, _) =
            session_with("220 ready", vec![ok("331 need password"), ok("530 denied")]);
        let err = session.login(&creds(None)).unwrap_err();
        assert_eq!(err.reply_code(), Some("530"));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_negative_greeting_is_connection_error() {
        let (mut session, _) = session_with("421 too many users", vec![]);
        let err = session.send("NOOP").unwrap_err();
        assert!(err.is_connection());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_connector_failure_propagates() {
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Err(ClientError::connection("refused")));
        let mut session = Session::new(SessionSettings::new("h", 21), Arc::new(connector));
        assert!(session.send("NOOP").unwrap_err().is_connection());
        assert!(!session.probe());
    }

    #[test]
    fn test_rename_requires_pending_reply() {
        let (mut session, sent) = session_with("220 ready", vec![ok("550 no such file")]);
        let err = session.rename("missing", "other").unwrap_err();
        assert_eq!(err.reply_code(), Some("550"));
        assert_eq!(*sent.lock().unwrap(), vec!["RNFR missing"]);
    }

    #[test]
    fn test_transfer_mode_applied_once_per_connection() {
        let (mut session, sent) = session_with("220 ready", vec![]);
        session.store("a", &mut &b"abc"[..], false).unwrap();
        session.store("b", &mut &b"abc"[..], false).unwrap();
        session.set_transfer_mode(TransferMode::Ascii);
        session.retrieve("a", &mut std::io::sink()).unwrap();

        assert_eq!(
            *sent.lock().unwrap(),
            vec!["TYPE Binary", "STOR a", "STOR b", "TYPE Ascii", "RETR a"]
        );
    }

    #[test]
    fn test_list_parses_entries() {
        let (mut session, _) = session_with("220 ready", vec![]);
        let entries = session.list(Some("/pub")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "/pub/a.txt");
    }

    #[test]
    fn test_refused_noop_drops_connection() {
        let (mut session, sent) = session_with(
            "220 ready",
            vec![
                ok("200 ok"),
                ok("421 Service not available, closing control connection"),
            ],
        );
        // no connection yet, so no NOOP goes out
        assert!(!session.probe());
        session.send_ok("NOOP").unwrap();
        assert!(!session.probe());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(*sent.lock().unwrap(), vec!["NOOP", "NOOP"]);
    }

    #[test]
    fn test_answered_noop_keeps_connection() {
        let (mut session, _) = session_with("220 ready", vec![ok("200 ok"), ok("200 ok")]);
        session.send_ok("NOOP").unwrap();
        assert!(session.probe());
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_quit_resets_state() {
        let (mut session, sent) = session_with("220 ready", vec![ok("200 ok")]);
        session.send("NOOP").unwrap();
        session.quit();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.probe());
        assert_eq!(sent.lock().unwrap().last().unwrap(), "QUIT");
    }

    #[tokio::test]
    async fn test_execute_tears_down_on_connection_error() {
        let (transport, _) = Scripted::new("220 ready", vec![ok("200 ok")]);
        let mut transport = Some(transport);
        let mut connector = MockTestConnector::new();
        connector.expect_connect().returning(move |_| match transport.take() {
            Some(t) => Ok(Box::new(t) as Box<dyn Transport>),
            None => Err(ClientError::connection("refused")),
        });
        let executor = CommandExecutor::new(SessionSettings::new("h", 21), Arc::new(connector));

        executor.execute("noop", |s| s.send_ok("NOOP")).await.unwrap();
        let err = executor.execute("noop", |s| s.send_ok("NOOP")).await.unwrap_err();
        assert!(err.is_connection());

        let state = executor.with_session(|s| s.state()).await;
        assert_eq!(state, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_execute_keeps_session_on_protocol_error() {
        let (transport, _) = Scripted::new("220 ready", vec![ok("550 nope"), ok("250 ok")]);
        let mut transport = Some(transport);
        let mut connector = MockTestConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(move |_| Ok(Box::new(transport.take().unwrap()) as Box<dyn Transport>));
        let executor = CommandExecutor::new(SessionSettings::new("h", 21), Arc::new(connector));

        let err = executor.execute("dele", |s| s.send_ok("DELE x")).await.unwrap_err();
        assert_eq!(err.reply_code(), Some("550"));
        executor.execute("dele", |s| s.send_ok("DELE y")).await.unwrap();
    }
}
