//! The seam between the session and the wire.
//!
//! A [`Transport`] is one live control connection. It only moves bytes and
//! replies; deciding whether a reply means success is left to the session.

pub mod suppa;

use crate::error::ClientResult;
use crate::session::{SessionSettings, TransferMode};
use std::io::{Read, Write};
use std::time::Duration;

pub use suppa::SuppaConnector;

pub trait Transport: Send {
    /// Raw greeting sent by the server when the connection opened.
    fn greeting(&self) -> Option<String>;

    /// Send one command line and return the raw reply, whatever its code.
    fn command(&mut self, line: &str) -> ClientResult<String>;

    fn set_transfer_mode(&mut self, mode: TransferMode) -> ClientResult<()>;

    /// Apply (or clear) the keep-alive interval before a data transfer.
    fn set_keep_alive(&mut self, interval: Option<Duration>) -> ClientResult<()>;

    /// STOR (or APPE when `append`) the bytes of `source` into `remote`.
    fn store(&mut self, remote: &str, source: &mut dyn Read, append: bool) -> ClientResult<u64>;

    /// RETR `remote`, streaming its bytes into `sink`.
    fn retrieve(&mut self, remote: &str, sink: &mut dyn Write) -> ClientResult<u64>;

    /// LIST lines for `path`, or the working directory when `None`.
    fn list(&mut self, path: Option<&str>) -> ClientResult<Vec<String>>;

    /// Send QUIT and close the connection.
    fn close(&mut self) -> ClientResult<()>;
}

/// Opens control connections; a session calls it again after every teardown.
pub trait Connector: Send + Sync {
    fn connect(&self, settings: &SessionSettings) -> ClientResult<Box<dyn Transport>>;
}
