//! Encoding fallback chain and decoded line iteration
//!
//! Plain-text dumps come in whatever encoding the tool that produced them
//! used. A short ordered chain of candidates is probed against a sample of
//! the file; the first one that decodes the sample cleanly is used for the
//! whole file and malformed bytes further in are replaced, not fatal. UTF-8
//! is also kept when only a few stray bytes in the sample are malformed.

use crate::source::SourceError;
use encoding_rs::Encoding;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Default candidate chain, tried in order
pub const DEFAULT_ENCODING_CHAIN: &[&str] = &["utf-8", "latin1", "cp1252", "iso-8859-1"];

/// Bytes sampled from the head of a file when probing candidates
const PROBE_SAMPLE_SIZE: usize = 64 * 1024;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// UTF-8 stays in use while fewer than this share of the sample's non-ASCII
/// bytes are malformed
const MAX_INVALID_UTF8_SHARE: f64 = 0.5;

/// Outcome of resolving the encoding chain for one file
#[derive(Debug, Clone)]
pub struct EncodingInfo {
    /// The chain label that won
    pub label: String,
    /// The encoding_rs Encoding reference
    pub encoding: &'static Encoding,
    /// Whether a UTF-8 BOM must be skipped
    pub has_bom: bool,
}

impl Default for EncodingInfo {
    fn default() -> Self {
        Self {
            label: "utf-8".to_string(),
            encoding: encoding_rs::UTF_8,
            has_bom: false,
        }
    }
}

/// Build the default chain as owned labels
pub fn default_chain() -> Vec<String> {
    DEFAULT_ENCODING_CHAIN.iter().map(|s| s.to_string()).collect()
}

/// Pick the first encoding in `chain` that decodes the head of `path` cleanly.
///
/// UTF-8 wins over later candidates unless most of the sample's non-ASCII
/// bytes are malformed. Unknown labels are skipped with a warning. A UTF-8
/// BOM short-circuits the probe. Running out of candidates is a source-level
/// failure.
pub fn resolve_encoding(path: &Path, chain: &[String]) -> Result<EncodingInfo, SourceError> {
    let sample = read_sample(path)?;

    if sample.starts_with(&UTF8_BOM) {
        return Ok(EncodingInfo {
            label: "utf-8".to_string(),
            encoding: encoding_rs::UTF_8,
            has_bom: true,
        });
    }

    for label in chain {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            log::warn!("Unknown encoding label '{}' in fallback chain, skipping", label);
            continue;
        };

        if decodes_cleanly(encoding, &sample) {
            log::debug!("Reading {:?} as {} ({})", path, label, encoding.name());
            return Ok(EncodingInfo {
                label: label.clone(),
                encoding,
                has_bom: false,
            });
        }

        if encoding == encoding_rs::UTF_8 {
            let share = invalid_utf8_share(&sample);
            if share < MAX_INVALID_UTF8_SHARE {
                log::debug!(
                    "{:?} is mostly {} ({:.0}% of non-ASCII bytes malformed), replacing the rest",
                    path,
                    label,
                    share * 100.0
                );
                return Ok(EncodingInfo {
                    label: label.clone(),
                    encoding,
                    has_bom: false,
                });
            }
        }

        log::debug!("{:?} is not valid {}, trying next candidate", path, label);
    }

    Err(SourceError::EncodingExhausted {
        path: path.to_path_buf(),
        tried: chain.to_vec(),
    })
}

fn read_sample(path: &Path) -> Result<Vec<u8>, SourceError> {
    let file = File::open(path).map_err(|e| SourceError::open(path, e))?;

    let mut sample = Vec::with_capacity(PROBE_SAMPLE_SIZE);
    file.take(PROBE_SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)
        .map_err(|e| SourceError::read(path, e))?;

    // Cut at the last newline so a multi-byte sequence split by the sample
    // boundary does not count as malformed
    if sample.len() == PROBE_SAMPLE_SIZE {
        if let Some(pos) = memchr::memrchr(b'\n', &sample) {
            sample.truncate(pos + 1);
        }
    }

    Ok(sample)
}

/// Share of the non-ASCII bytes in `sample` that are not part of a valid
/// UTF-8 sequence
fn invalid_utf8_share(sample: &[u8]) -> f64 {
    let non_ascii = sample.iter().filter(|b| !b.is_ascii()).count();
    if non_ascii == 0 {
        return 0.0;
    }

    let mut invalid = 0usize;
    let mut rest = sample;
    while let Err(e) = std::str::from_utf8(rest) {
        let bad = e.error_len().unwrap_or(rest.len() - e.valid_up_to());
        invalid += bad;
        rest = &rest[e.valid_up_to() + bad..];
    }

    invalid as f64 / non_ascii as f64
}

fn decodes_cleanly(encoding: &'static Encoding, sample: &[u8]) -> bool {
    encoding
        .decode_without_bom_handling_and_without_replacement(sample)
        .is_some()
}

/// Newline-delimited line iterator decoding with a fixed encoding.
///
/// Yields lines without their `\n` / `\r\n` terminator. An I/O error is
/// yielded once and ends the iteration.
pub struct EncodedLineIterator {
    reader: BufReader<File>,
    encoding: &'static Encoding,
    path: PathBuf,
    line_buffer: Vec<u8>,
    done: bool,
}

impl EncodedLineIterator {
    /// Open `path`, resolving its encoding through `chain`
    pub fn open(path: &Path, chain: &[String]) -> Result<Self, SourceError> {
        let info = resolve_encoding(path, chain)?;
        Self::with_encoding(path, &info)
    }

    /// Open with an already resolved encoding
    pub fn with_encoding(path: &Path, info: &EncodingInfo) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::open(path, e))?;
        let mut reader = BufReader::with_capacity(64 * 1024, file);

        if info.has_bom {
            let mut bom = [0u8; 3];
            reader
                .read_exact(&mut bom)
                .map_err(|e| SourceError::read(path, e))?;
        }

        Ok(Self {
            reader,
            encoding: info.encoding,
            path: path.to_path_buf(),
            line_buffer: Vec::with_capacity(4096),
            done: false,
        })
    }

    /// Get the encoding in use
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

impl Iterator for EncodedLineIterator {
    type Item = Result<String, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.line_buffer.clear();

        match self.reader.read_until(b'\n', &mut self.line_buffer) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let line = self
                    .line_buffer
                    .strip_suffix(b"\n")
                    .unwrap_or(&self.line_buffer);
                let line = line.strip_suffix(b"\r").unwrap_or(line);

                if self.encoding == encoding_rs::UTF_8 {
                    Some(Ok(String::from_utf8_lossy(line).into_owned()))
                } else {
                    let (decoded, _) = self.encoding.decode_without_bom_handling(line);
                    Some(Ok(decoded.into_owned()))
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(SourceError::read(&self.path, e)))
            }
        }
    }
}
