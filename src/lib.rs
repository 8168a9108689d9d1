#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod client;
pub mod config;
pub mod error;
pub mod listing;
pub mod reply;
pub mod session;
pub mod timestamp;
pub mod transport;
pub mod utils;

pub use client::{Credentials, Destination, FtpClient, RemoteFileClient, Source};
pub use error::{ClientError, ClientResult};
pub use listing::{EntryFilter, FileFilter, GlobFilter, PathFilter, RemoteFile};
pub use reply::Reply;
pub use session::{SessionSettings, SessionState, TransferMode};
pub use timestamp::{ServerZone, TimestampResolver};
