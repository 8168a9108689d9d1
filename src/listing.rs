//! Directory listings: LIST line parsing, rendering and filtering.

use crate::error::{ClientError, ClientResult};
use crate::utils::join_remote;
use glob::Pattern;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    /// Directory the listing was taken from (`.` for the working directory).
    pub parent: String,
    pub size: u64,
    pub is_dir: bool,
    /// The server's long-listing line, untouched.
    pub raw: String,
}

impl RemoteFile {
    pub fn path(&self) -> String {
        join_remote(&self.parent, &self.name)
    }
}

/// Parse one LIST line in either unix `ls -l` or DOS/IIS layout.
///
/// Returns `None` for lines that do not describe an entry (`total 12`) and for
/// the `.`/`..` pseudo entries.
pub fn parse_list_line(line: &str, parent: &str) -> Option<RemoteFile> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (is_dir, size, name) = parse_fields(line)?;

    if is_dot_entry(name) {
        return None;
    }

    Some(RemoteFile {
        name: name.to_string(),
        parent: parent.to_string(),
        size,
        is_dir,
        raw: line.to_string(),
    })
}

fn parse_fields(line: &str) -> Option<(bool, u64, &str)> {
    parse_unix(line).or_else(|| parse_dos(line))
}

fn is_dot_entry(name: &str) -> bool {
    name.is_empty() || name == "." || name == ".."
}

/// Field position of the size and number of date fields after it, most
/// common layout first.
const UNIX_LAYOUTS: [(usize, usize); 4] = [
    // drwxr-xr-x 2 user group 4096 Nov 15 10:30 Documents
    (4, 3),
    // -rw-r--r-- 1 user 10 Jan 15 12:00 a.txt
    (3, 3),
    // -rw-r--r-- 1 user group 1024 2023-01-15 12:00 b.txt
    (4, 2),
    // -rw-r--r-- 1 user 1024 2023-01-15 12:00 b.txt
    (3, 2),
];

fn parse_unix(line: &str) -> Option<(bool, u64, &str)> {
    let perms = line.split_whitespace().next()?;
    let kind = perms.chars().next()?;
    if !"-dlbcps".contains(kind) || perms.len() < 10 {
        return None;
    }

    UNIX_LAYOUTS.iter().find_map(|&(size_at, date_len)| {
        let (fields, rest) = split_fields(line, size_at + 1 + date_len)?;
        let size = fields[size_at].parse::<u64>().ok()?;
        let date = fields[size_at + 1];
        let date_ok = if date_len == 3 {
            date.len() == 3 && date.chars().all(|c| c.is_ascii_alphabetic())
        } else {
            is_iso_date(date)
        };
        if !date_ok {
            return None;
        }
        let name = match (kind, rest.split_once(" -> ")) {
            ('l', Some((link, _target))) => link,
            _ => rest,
        };
        Some((kind == 'd', size, name))
    })
}

// 2023-01-15
fn is_iso_date(field: &str) -> bool {
    let bytes = field.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

// 11-15-23  10:30AM       <DIR>          Documents
fn parse_dos(line: &str) -> Option<(bool, u64, &str)> {
    let (fields, rest) = split_fields(line, 3)?;
    let date = fields[0];
    if date.len() < 8 || !date.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '/') {
        return None;
    }
    if fields[2].eq_ignore_ascii_case("<DIR>") {
        Some((true, 0, rest))
    } else {
        Some((false, fields[2].parse().ok()?, rest))
    }
}

/// Split off the first `n` whitespace separated fields; the remainder keeps
/// its inner spacing so names like `my  file.txt` survive.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    if rest.is_empty() {
        return None;
    }
    Some((fields, rest))
}

// total 24
fn is_total_line(line: &str) -> bool {
    let mut words = line.split_whitespace();
    matches!(
        (words.next(), words.next(), words.next()),
        (Some("total"), Some(n), None) if n.parse::<u64>().is_ok()
    )
}

/// Parse a whole LIST response, dropping lines that are not entries.
pub fn parse_listing(lines: &[String], parent: &str) -> Vec<RemoteFile> {
    lines
        .iter()
        .filter_map(|line| {
            let entry = parse_list_line(line, parent);
            if entry.is_none() && !line.trim().is_empty() && !is_total_line(line) {
                log::debug!("unrecognised listing line {line:?}");
            }
            entry
        })
        .collect()
}

/// Entry names in listing order.
pub fn names(entries: &[RemoteFile]) -> Vec<String> {
    entries.iter().map(|entry| entry.name.clone()).collect()
}

/// The server's long lines, minus blank lines, `total` lines and the `.`/`..`
/// entries. Lines in a layout the parser does not know are kept as sent.
pub fn long_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .filter(|line| !line.trim().is_empty() && !is_total_line(line))
        .filter(|line| parse_fields(line).map_or(true, |(_, _, name)| !is_dot_entry(name)))
        .map(str::to_string)
        .collect()
}

/// Predicate over an entry's name as it appears in the listing.
pub trait PathFilter: Send + Sync {
    fn accept(&self, path: &str) -> bool;
}

/// Predicate over a file-like entry (name, parent directory and attributes).
pub trait FileFilter: Send + Sync {
    fn accept(&self, file: &RemoteFile) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accept(&self, path: &str) -> bool {
        self(path)
    }
}

impl<F> FileFilter for F
where
    F: Fn(&RemoteFile) -> bool + Send + Sync,
{
    fn accept(&self, file: &RemoteFile) -> bool {
        self(file)
    }
}

/// Shell-style name pattern (`*.txt`, `report-202?.csv`, `[ab]*`) usable as
/// either filter shape.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    pattern: Pattern,
}

impl GlobFilter {
    pub fn new(pattern: &str) -> ClientResult<Self> {
        let pattern = Pattern::new(pattern).map_err(|e| {
            ClientError::validation(format!("invalid pattern {pattern:?}: {e}"))
        })?;
        Ok(Self { pattern })
    }
}

impl PathFilter for GlobFilter {
    fn accept(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

impl FileFilter for GlobFilter {
    fn accept(&self, file: &RemoteFile) -> bool {
        self.pattern.matches(&file.name)
    }
}

/// Filter handed to a filtered listing.
#[derive(Clone)]
pub enum EntryFilter {
    Path(Arc<dyn PathFilter>),
    File(Arc<dyn FileFilter>),
}

impl EntryFilter {
    pub fn path(filter: impl PathFilter + 'static) -> Self {
        Self::Path(Arc::new(filter))
    }

    pub fn file(filter: impl FileFilter + 'static) -> Self {
        Self::File(Arc::new(filter))
    }

    pub fn glob(pattern: &str) -> ClientResult<Self> {
        GlobFilter::new(pattern).map(Self::path)
    }

    /// Regular files only; directories are dropped.
    pub fn files_only() -> Self {
        Self::file(|file: &RemoteFile| !file.is_dir)
    }

    pub fn accept(&self, entry: &RemoteFile) -> bool {
        match self {
            Self::Path(filter) => filter.accept(&entry.name),
            Self::File(filter) => filter.accept(entry),
        }
    }
}

impl fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(_) => f.write_str("EntryFilter::Path(..)"),
            Self::File(_) => f.write_str("EntryFilter::File(..)"),
        }
    }
}

/// Names of the accepted entries. A name listed twice is returned once, at
/// its first position.
pub fn apply_filter(entries: &[RemoteFile], filter: &EntryFilter) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| filter.accept(entry))
        .filter(|entry| seen.insert(entry.name.as_str()))
        .map(|entry| entry.name.clone())
        .collect()
}
