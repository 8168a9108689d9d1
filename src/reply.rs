//! Structured view of a control-channel reply.
//!
//! Every reply starts with a three digit status code. Multi-line replies
//! repeat the code on the last line (`213-first`, ..., `213 last`); the text
//! keeps every line with its code prefix removed.

use crate::error::{ClientError, ClientResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: String,
    text: String,
}

impl Reply {
    /// Split a raw reply into code and text.
    ///
    /// A reply that does not start with three digits means the control
    /// channel is out of step with the server, so it is reported as a
    /// connection failure rather than a rejection.
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let code = raw
            .get(..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| ClientError::connection(format!("malformed reply: {raw:?}")))?;

        let text = raw
            .lines()
            .map(|line| {
                let line = line.trim_end_matches('\r');
                match line.strip_prefix(code) {
                    Some(rest) => rest.get(1..).unwrap_or(""),
                    None => line,
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            code: code.to_string(),
            text: text.trim().to_string(),
        })
    }

    /// Parse `raw` and require its code to be exactly `expected`.
    pub fn validate(raw: &str, expected: &str) -> ClientResult<Self> {
        Self::parse(raw)?.expect(expected)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn class(&self) -> u8 {
        self.code.as_bytes()[0] - b'0'
    }

    pub fn is_positive_preliminary(&self) -> bool {
        self.class() == 1
    }

    pub fn is_positive_completion(&self) -> bool {
        self.class() == 2
    }

    pub fn is_positive_intermediate(&self) -> bool {
        self.class() == 3
    }

    pub fn is_negative(&self) -> bool {
        self.class() >= 4
    }

    /// Keep the reply only if its code is `expected`.
    pub fn expect(self, expected: &str) -> ClientResult<Self> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Keep the reply only if it is a positive completion (2xx).
    pub fn require_completion(self) -> ClientResult<Self> {
        if self.is_positive_completion() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Keep the reply only if it is a positive intermediate (3xx).
    pub fn require_intermediate(self) -> ClientResult<Self> {
        if self.is_positive_intermediate() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    pub fn into_error(self) -> ClientError {
        ClientError::Protocol {
            code: self.code,
            text: self.text,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// Extract the quoted directory from a `257 "/path" created` reply.
pub fn quoted_path(reply: &Reply) -> Option<String> {
    let text = reply.text();
    let start = text.find('"')?;
    let mut path = String::new();
    let mut chars = text[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            // RFC 959 escapes a quote inside the path by doubling it
            if chars.peek() == Some(&'"') {
                chars.next();
                path.push('"');
            } else {
                return Some(path);
            }
        } else {
            path.push(c);
        }
    }
    None
}
