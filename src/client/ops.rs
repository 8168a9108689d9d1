//! Convenience overloads over [`RemoteFileClient`].
//!
//! Each helper only picks arguments for one of the trait's primitives.

use super::{Destination, RemoteFileClient, Source};
use crate::error::ClientResult;
use crate::listing::EntryFilter;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

pub async fn put_bytes<C>(client: &C, bytes: impl Into<Vec<u8>>, remote: &str) -> ClientResult<u64>
where
    C: RemoteFileClient + ?Sized,
{
    client.put(Source::Bytes(bytes.into()), remote, false).await
}

pub async fn append_bytes<C>(
    client: &C,
    bytes: impl Into<Vec<u8>>,
    remote: &str,
) -> ClientResult<u64>
where
    C: RemoteFileClient + ?Sized,
{
    client.put(Source::Bytes(bytes.into()), remote, true).await
}

pub async fn put_file<C>(client: &C, local: &Path, remote: &str) -> ClientResult<u64>
where
    C: RemoteFileClient + ?Sized,
{
    client.put(Source::Path(local.to_path_buf()), remote, false).await
}

pub async fn put_reader<C, R>(client: &C, reader: R, remote: &str, append: bool) -> ClientResult<u64>
where
    C: RemoteFileClient + ?Sized,
    R: Read + Send + 'static,
{
    client.put(Source::Reader(Box::new(reader)), remote, append).await
}

pub async fn get_file<C>(client: &C, remote: &str, local: &Path) -> ClientResult<u64>
where
    C: RemoteFileClient + ?Sized,
{
    client.get(remote, Destination::Path(local.to_path_buf())).await
}

pub async fn get_to_writer<C, W>(client: &C, remote: &str, writer: W) -> ClientResult<u64>
where
    C: RemoteFileClient + ?Sized,
    W: Write + Send + 'static,
{
    client.get(remote, Destination::Writer(Box::new(writer))).await
}

/// Names in the working directory.
pub async fn dir_names<C>(client: &C) -> ClientResult<Vec<String>>
where
    C: RemoteFileClient + ?Sized,
{
    client.dir(None, false).await
}

pub async fn dir_at<C>(client: &C, path: &str) -> ClientResult<Vec<String>>
where
    C: RemoteFileClient + ?Sized,
{
    client.dir(Some(path), false).await
}

/// Names in `path` matching a shell-style pattern such as `*.txt`.
pub async fn dir_matching<C>(client: &C, path: Option<&str>, pattern: &str) -> ClientResult<Vec<String>>
where
    C: RemoteFileClient + ?Sized,
{
    client
        .dir_filtered(path, Some(EntryFilter::glob(pattern)?))
        .await
}

/// Long listing lines of the entries in `path` whose names match `pattern`.
pub async fn dir_long_matching<C>(
    client: &C,
    path: Option<&str>,
    pattern: &str,
) -> ClientResult<Vec<String>>
where
    C: RemoteFileClient + ?Sized,
{
    let filter = EntryFilter::glob(pattern)?;
    let mut seen = HashSet::new();
    Ok(client
        .list_files(path)
        .await?
        .into_iter()
        .filter(|entry| filter.accept(entry) && seen.insert(entry.name.clone()))
        .map(|entry| entry.raw)
        .collect())
}
