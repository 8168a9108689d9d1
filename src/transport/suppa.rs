use super::{Connector, Transport};
use crate::error::{ClientError, ClientResult};
use crate::session::{SessionSettings, TransferMode};
use socket2::{SockRef, TcpKeepalive};
use std::io::{Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use suppaftp::types::{FileType, FormatControl, Response};
use suppaftp::{FtpError, FtpStream, Status};

/// Opens plain control connections with `suppaftp`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuppaConnector;

impl SuppaConnector {
    fn resolve(settings: &SessionSettings) -> ClientResult<SocketAddr> {
        (settings.host.as_str(), settings.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ClientError::connection(format!("{} did not resolve", settings.address())))
    }
}

impl Connector for SuppaConnector {
    fn connect(&self, settings: &SessionSettings) -> ClientResult<Box<dyn Transport>> {
        let addr = Self::resolve(settings)?;
        log::debug!("connecting to {} ({addr})", settings.address());

        let stream = FtpStream::connect_timeout(addr, settings.connect_timeout).map_err(|e| {
            ClientError::connection(format!("handshake with {} failed: {e}", settings.address()))
        })?;

        let timeout = Some(settings.data_timeout).filter(|d| !d.is_zero());
        stream.get_ref().set_read_timeout(timeout)?;
        stream.get_ref().set_write_timeout(timeout)?;

        let greeting = stream.get_welcome_msg().map(str::to_string);
        Ok(Box::new(SuppaTransport { stream, greeting }))
    }
}

pub struct SuppaTransport {
    stream: FtpStream,
    greeting: Option<String>,
}

impl Transport for SuppaTransport {
    fn greeting(&self) -> Option<String> {
        self.greeting.clone()
    }

    fn command(&mut self, line: &str) -> ClientResult<String> {
        match self.stream.custom_command(line, &[Status::CommandOk]) {
            Ok(response) | Err(FtpError::UnexpectedResponse(response)) => Ok(raw_reply(&response)),
            Err(err) => Err(classify(err)),
        }
    }

    fn set_transfer_mode(&mut self, mode: TransferMode) -> ClientResult<()> {
        let file_type = match mode {
            TransferMode::Ascii => FileType::Ascii(FormatControl::Default),
            TransferMode::Binary => FileType::Binary,
        };
        self.stream.transfer_type(file_type).map_err(classify)
    }

    fn set_keep_alive(&mut self, interval: Option<Duration>) -> ClientResult<()> {
        let socket = SockRef::from(self.stream.get_ref());
        match interval {
            Some(interval) => socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(interval))?,
            None => socket.set_keepalive(false)?,
        }
        Ok(())
    }

    fn store(&mut self, remote: &str, mut source: &mut dyn Read, append: bool) -> ClientResult<u64> {
        let written = if append {
            self.stream.append_file(remote, &mut source)
        } else {
            self.stream.put_file(remote, &mut source)
        };
        written.map_err(classify)
    }

    fn retrieve(&mut self, remote: &str, sink: &mut dyn Write) -> ClientResult<u64> {
        self.stream
            .retr(remote, |reader| {
                std::io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
            })
            .map_err(classify)
    }

    fn list(&mut self, path: Option<&str>) -> ClientResult<Vec<String>> {
        self.stream.list(path).map_err(classify)
    }

    fn close(&mut self) -> ClientResult<()> {
        self.stream.quit().map_err(classify)
    }
}

/// Render a suppaftp response as the raw reply text, code first.
fn raw_reply(response: &Response) -> String {
    let code = response.status.code().to_string();
    let body = String::from_utf8_lossy(&response.body);
    let body = body.trim_end();
    if body.starts_with(&code) {
        body.to_string()
    } else {
        format!("{code} {body}")
    }
}

/// A rejected reply keeps the session; anything else means the wire is gone.
pub(crate) fn classify(err: FtpError) -> ClientError {
    match err {
        FtpError::UnexpectedResponse(response) => {
            let raw = raw_reply(&response);
            match crate::reply::Reply::parse(&raw) {
                Ok(reply) => reply.into_error(),
                Err(err) => err,
            }
        }
        FtpError::ConnectionError(source) => ClientError::Connection {
            message: source.to_string(),
            source: Some(source),
        },
        other => ClientError::connection(other.to_string()),
    }
}
