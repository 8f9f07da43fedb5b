//! Credential line validation
//!
//! Recovers `identifier:secret` pairs from loosely formatted dump lines and
//! rejects noise (spam banners, separators, symbol-only fields).

use crate::rules::Ruleset;
use std::fmt;
use std::ops::Range;

/// Lines shorter than this (in characters, after trimming) are rejected.
pub const MIN_LINE_CHARS: usize = 5;

/// A validated credential line.
///
/// All fields borrow from the line handed to [`LineValidator::validate`];
/// `identifier` and `secret` are sub-slices of `raw_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential<'a> {
    pub identifier: &'a str,
    pub secret: &'a str,
    /// The trimmed input line, kept verbatim for output
    pub raw_line: &'a str,
}

/// Why a line was not accepted as a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    TooShort,
    SpamSignature,
    NoDelimiter,
    EmptyField,
    NoAlphanumeric,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort => "too short",
            Self::SpamSignature => "spam signature",
            Self::NoDelimiter => "no delimiter",
            Self::EmptyField => "empty field",
            Self::NoAlphanumeric => "no alphanumeric",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless line validator bound to a [`Ruleset`]
#[derive(Debug, Clone, Copy)]
pub struct LineValidator<'r> {
    rules: &'r Ruleset,
}

impl<'r> LineValidator<'r> {
    pub fn new(rules: &'r Ruleset) -> Self {
        Self { rules }
    }

    /// Validate one raw line.
    ///
    /// Checks run in a fixed order: length, spam signatures, delimiter
    /// presence, field extraction, empty fields, alphanumeric content. For
    /// lines with three or more fields a URL-looking first field is treated
    /// as a prefix and skipped; otherwise every colon after the first belongs
    /// to the secret.
    pub fn validate<'a>(&self, line: &'a str) -> Result<Credential<'a>, RejectReason> {
        let line = line.trim();

        if line.chars().count() < MIN_LINE_CHARS {
            return Err(RejectReason::TooShort);
        }

        let lower = line.to_lowercase();
        if self
            .rules
            .spam_signatures()
            .iter()
            .any(|sig| lower.contains(sig.as_str()))
        {
            return Err(RejectReason::SpamSignature);
        }

        if !line.contains(':') {
            return Err(RejectReason::NoDelimiter);
        }

        let spans = field_spans(line, self.rules);
        if spans.len() < 2 {
            return Err(RejectReason::NoDelimiter);
        }

        let (identifier, secret) = match spans.len() {
            2 => (&line[spans[0].clone()], &line[spans[1].clone()]),
            _ if self.rules.has_url_prefix(&line[spans[0].clone()]) => {
                (&line[spans[1].clone()], &line[spans[2].start..])
            }
            _ => (&line[spans[0].clone()], &line[spans[1].start..]),
        };

        let identifier = identifier.trim();
        let secret = secret.trim();

        if identifier.is_empty() || secret.is_empty() {
            return Err(RejectReason::EmptyField);
        }

        if !has_alphanumeric(identifier) || !has_alphanumeric(secret) {
            return Err(RejectReason::NoAlphanumeric);
        }

        Ok(Credential {
            identifier,
            secret,
            raw_line: line,
        })
    }

    /// Convenience wrapper when only the verdict matters
    #[inline]
    pub fn is_valid(&self, line: &str) -> bool {
        self.validate(line).is_ok()
    }
}

/// Byte ranges of the colon-separated fields of `line`.
///
/// Only the colon of a leading URL scheme (`http://`, `ftp://`) is not a
/// separator, so `http://site.com:user:pass` has three fields while
/// `admin://secret1` still has two.
pub(crate) fn field_spans(line: &str, rules: &Ruleset) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut spans = Vec::with_capacity(4);
    let mut start = 0;

    for pos in memchr::memchr_iter(b':', bytes) {
        if start == 0 && is_scheme_colon(line, pos, rules) {
            continue;
        }
        spans.push(start..pos);
        start = pos + 1;
    }
    spans.push(start..bytes.len());

    spans
}

/// `line[..colon]` is a known URL prefix and `//` follows the colon
fn is_scheme_colon(line: &str, colon: usize, rules: &Ruleset) -> bool {
    line.as_bytes()[colon + 1..].starts_with(b"//") && rules.has_url_prefix(&line[..colon])
}

#[inline]
fn has_alphanumeric(field: &str) -> bool {
    field.bytes().any(|b| b.is_ascii_alphanumeric())
}
