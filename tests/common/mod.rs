#![allow(dead_code)]

use remote_fs::session::{SessionSettings, TransferMode};
use remote_fs::transport::{Connector, Transport};
use remote_fs::{ClientError, ClientResult, FtpClient, ServerZone};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory FTP server shared by every connection a client opens.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

#[derive(Default)]
struct ServerState {
    files: BTreeMap<String, Vec<u8>>,
    listings: HashMap<String, Vec<String>>,
    mtimes: HashMap<String, String>,
    log: Vec<String>,
    handshakes: usize,
    fail_next: Option<String>,
    canned: HashMap<String, String>,
    gates: HashMap<String, Receiver<()>>,
    latency: Duration,
    transfer_modes: Vec<TransferMode>,
    keep_alive: Option<Duration>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep between receiving a command and replying to it.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().latency = latency;
        self
    }

    pub fn add_file(&self, name: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(name.to_string(), content.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(name).cloned()
    }

    /// Raw LIST lines returned for `dir`.
    pub fn set_listing(&self, dir: &str, lines: &[&str]) {
        self.state.lock().unwrap().listings.insert(
            dir.to_string(),
            lines.iter().map(|line| (*line).to_string()).collect(),
        );
    }

    pub fn set_mtime(&self, name: &str, stamp: &str) {
        self.state
            .lock()
            .unwrap()
            .mtimes
            .insert(name.to_string(), stamp.to_string());
    }

    /// The next command starting with `prefix` fails as if the socket broke.
    pub fn fail_next(&self, prefix: &str) {
        self.state.lock().unwrap().fail_next = Some(prefix.to_string());
    }

    /// Answer the next `verb` command with `raw` instead of the usual reply.
    pub fn reply_next(&self, verb: &str, raw: &str) {
        self.state
            .lock()
            .unwrap()
            .canned
            .insert(verb.to_string(), raw.to_string());
    }

    /// Hold the reply to `line` until the returned sender fires.
    pub fn gate(&self, line: &str) -> Sender<()> {
        let (tx, rx) = mpsc::channel();
        self.state.lock().unwrap().gates.insert(line.to_string(), rx);
        tx
    }

    pub fn handshakes(&self) -> usize {
        self.state.lock().unwrap().handshakes
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Command and reply lines only, without connection events.
    pub fn wire_log(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|line| line.starts_with("> ") || line.starts_with("< "))
            .collect()
    }

    pub fn transfer_modes(&self) -> Vec<TransferMode> {
        self.state.lock().unwrap().transfer_modes.clone()
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.state.lock().unwrap().keep_alive
    }

    pub fn client(&self) -> FtpClient {
        self.client_in_zone(ServerZone::Local)
    }

    pub fn client_in_zone(&self, zone: ServerZone) -> FtpClient {
        let mut settings = SessionSettings::new("fake.example.com", 21);
        settings.server_zone = zone;
        FtpClient::with_connector(settings, Arc::new(self.clone()))
    }
}

impl Connector for FakeServer {
    fn connect(&self, _settings: &SessionSettings) -> ClientResult<Box<dyn Transport>> {
        let mut state = self.state.lock().unwrap();
        state.handshakes += 1;
        state.log.push("connect".to_string());
        Ok(Box::new(FakeTransport {
            server: self.clone(),
            pending_rename: None,
            broken: false,
        }))
    }
}

struct FakeTransport {
    server: FakeServer,
    pending_rename: Option<String>,
    broken: bool,
}

impl FakeTransport {
    /// Log the request, honour gates and injected failures, then run `reply`.
    fn exchange<T>(
        &mut self,
        line: &str,
        reply: impl FnOnce(&mut ServerState) -> (ClientResult<T>, String),
    ) -> ClientResult<T> {
        if self.broken {
            return Err(ClientError::connection("connection already reset"));
        }

        let (gate, latency) = {
            let mut state = self.server.state.lock().unwrap();
            state.log.push(format!("> {line}"));
            if state
                .fail_next
                .as_deref()
                .is_some_and(|prefix| line.starts_with(prefix))
            {
                state.fail_next = None;
                state.log.push("reset".to_string());
                self.broken = true;
                return Err(ClientError::connection("connection reset by peer"));
            }
            (state.gates.remove(line), state.latency)
        };

        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut state = self.server.state.lock().unwrap();
        let (result, reply_line) = reply(&mut state);
        state.log.push(format!("< {reply_line}"));
        result
    }
}

fn answer(raw: &str) -> (ClientResult<String>, String) {
    (Ok(raw.to_string()), raw.to_string())
}

fn rejected<T>(code: &str, text: &str) -> (ClientResult<T>, String) {
    (
        Err(ClientError::protocol(code, text)),
        format!("{code} {text}"),
    )
}

impl Transport for FakeTransport {
    fn greeting(&self) -> Option<String> {
        Some("220 Fake FTP ready".to_string())
    }

    fn command(&mut self, line: &str) -> ClientResult<String> {
        let (verb, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.to_string();
        let mut pending = self.pending_rename.take();

        let result = self.exchange(line, |state| match verb {
            _ if state.canned.contains_key(verb) => {
                let raw = state.canned.remove(verb).unwrap_or_default();
                answer(&raw)
            }
            "USER" => answer("331 Password required"),
            "PASS" if arg == "bad" => answer("530 Login incorrect"),
            "PASS" => answer("230 Logged in"),
            "NOOP" => answer("200 NOOP ok"),
            "DELE" => match state.files.remove(&arg) {
                Some(_) => answer("250 Deleted"),
                None => answer("550 No such file"),
            },
            "RNFR" if state.files.contains_key(&arg) => {
                pending = Some(arg.clone());
                answer("350 Ready for RNTO")
            }
            "RNFR" => answer("550 No such file"),
            "RNTO" => match pending.take().and_then(|from| state.files.remove(&from)) {
                Some(content) => {
                    state.files.insert(arg.clone(), content);
                    answer("250 Renamed")
                }
                None => answer("503 Bad sequence of commands"),
            },
            "MKD" => answer(&format!("257 \"{arg}\" created")),
            "RMD" | "CWD" => answer("250 Ok"),
            "PWD" => answer("257 \"/home/fake\" is current directory"),
            "MDTM" => match state.mtimes.get(&arg) {
                Some(stamp) => answer(&format!("213 {stamp}")),
                None => answer("550 No such file"),
            },
            "SIZE" => match state.files.get(&arg) {
                Some(content) => answer(&format!("213 {}", content.len())),
                None => answer("550 No such file"),
            },
            _ => answer("502 Command not implemented"),
        });

        self.pending_rename = pending;
        result
    }

    fn set_transfer_mode(&mut self, mode: TransferMode) -> ClientResult<()> {
        self.server.state.lock().unwrap().transfer_modes.push(mode);
        Ok(())
    }

    fn set_keep_alive(&mut self, interval: Option<Duration>) -> ClientResult<()> {
        self.server.state.lock().unwrap().keep_alive = interval;
        Ok(())
    }

    fn store(&mut self, remote: &str, source: &mut dyn Read, append: bool) -> ClientResult<u64> {
        let mut data = Vec::new();
        source.read_to_end(&mut data).map_err(ClientError::Local)?;
        let verb = if append { "APPE" } else { "STOR" };

        self.exchange(&format!("{verb} {remote}"), |state| {
            let file = state.files.entry(remote.to_string()).or_default();
            if !append {
                file.clear();
            }
            file.extend_from_slice(&data);
            (Ok(data.len() as u64), "226 Transfer complete".to_string())
        })
    }

    fn retrieve(&mut self, remote: &str, sink: &mut dyn Write) -> ClientResult<u64> {
        let content = self.exchange(&format!("RETR {remote}"), |state| {
            match state.files.get(remote) {
                Some(content) => (Ok(content.clone()), "226 Transfer complete".to_string()),
                None => rejected("550", "No such file"),
            }
        })?;
        sink.write_all(&content)?;
        Ok(content.len() as u64)
    }

    fn list(&mut self, path: Option<&str>) -> ClientResult<Vec<String>> {
        let dir = path.unwrap_or(".").to_string();
        self.exchange(&format!("LIST {dir}"), |state| {
            let lines = state.listings.get(&dir).cloned().unwrap_or_else(|| {
                state
                    .files
                    .iter()
                    .map(|(name, content)| {
                        format!("-rw-r--r-- 1 ftp ftp {} Jan 15 12:00 {name}", content.len())
                    })
                    .collect()
            });
            (Ok(lines), "226 Directory send OK".to_string())
        })
    }

    fn close(&mut self) -> ClientResult<()> {
        self.exchange("QUIT", |_| (Ok(()), "221 Goodbye".to_string()))
    }
}

/// `Write` handle whose bytes stay readable after it has been handed away.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
