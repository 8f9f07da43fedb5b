//! Input sources
//!
//! Normalizes plain-text files, zip archives and rar archives into one lazy
//! stream of raw lines. Archive members are only read if they look like text
//! dumps (`.txt`); a member that fails to read is reported and skipped.

use crate::encoding::{resolve_encoding, EncodedLineIterator};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

/// Container format of an input, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    PlainText,
    Zip,
    Rar,
}

impl SourceKind {
    /// Dispatch by extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::PlainText),
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Zip => "zip",
            Self::Rar => "rar",
        }
    }
}

/// One candidate input as handed over by enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub display_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl SourceDescriptor {
    pub fn new(display_name: impl Into<String>, path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            display_name: display_name.into(),
            path: path.into(),
            size_bytes,
        }
    }

    /// Build a descriptor from a path on disk, named after its file name
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let size_bytes = fs::metadata(path)?.len();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(display_name, path, size_bytes))
    }

    pub fn kind(&self) -> Option<SourceKind> {
        SourceKind::from_path(&self.path)
    }
}

/// Source-level failures. Each one aborts the current source only.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no encoding in [{}] could decode {path:?}", .tried.join(", "))]
    EncodingExhausted { path: PathBuf, tried: Vec<String> },

    #[error("cannot open archive {path:?}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("unsupported source type: {path:?}")]
    Unsupported { path: PathBuf },
}

impl SourceError {
    pub(crate) fn open(path: &Path, source: io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    fn archive(path: &Path, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// A container member that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWarning {
    pub entry: String,
    pub reason: String,
}

/// Items produced by a [`LineSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// One raw line, newline stripped
    Line(String),
    /// A container member is about to be read
    EntryStarted(String),
    /// A container member was skipped after a read/decode failure
    EntrySkipped(EntryWarning),
}

/// A finite stream of raw lines from one input.
///
/// An `Err` item is a source-level failure and is always the last item.
pub trait LineSource: Iterator<Item = Result<SourceEvent, SourceError>> {
    /// Name used in progress and log messages
    fn display_name(&self) -> &str;

    fn kind(&self) -> SourceKind;
}

/// Open the reader matching the descriptor's extension
pub fn open_source(
    descriptor: &SourceDescriptor,
    encoding_chain: &[String],
) -> Result<Box<dyn LineSource>, SourceError> {
    match descriptor.kind() {
        Some(SourceKind::PlainText) => Ok(Box::new(PlainTextReader::open(
            descriptor,
            encoding_chain,
        )?)),
        Some(SourceKind::Zip) => Ok(Box::new(ZipReader::open(descriptor)?)),
        Some(SourceKind::Rar) => Ok(Box::new(RarReader::open(descriptor)?)),
        None => Err(SourceError::Unsupported {
            path: descriptor.path.clone(),
        }),
    }
}

/// Upper bound on the buffer reserved from an archive's declared member size
const MAX_ENTRY_PREALLOC: u64 = 64 << 20;

/// Whether an archive member should be read as a text dump
fn is_text_entry(name: &str) -> bool {
    name.to_lowercase().ends_with(".txt")
}

/// Plain-text file read through the encoding fallback chain
pub struct PlainTextReader {
    display_name: String,
    lines: EncodedLineIterator,
}

impl PlainTextReader {
    pub fn open(descriptor: &SourceDescriptor, encoding_chain: &[String]) -> Result<Self, SourceError> {
        let info = resolve_encoding(&descriptor.path, encoding_chain)?;
        log::info!("Reading {} as {}", descriptor.display_name, info.label);

        Ok(Self {
            display_name: descriptor.display_name.clone(),
            lines: EncodedLineIterator::with_encoding(&descriptor.path, &info)?,
        })
    }
}

impl Iterator for PlainTextReader {
    type Item = Result<SourceEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next().map(|r| r.map(SourceEvent::Line))
    }
}

impl LineSource for PlainTextReader {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::PlainText
    }
}

/// Lines of one fully decoded archive member, split on `\n`.
///
/// A trailing newline does not produce an extra empty line.
struct MemberLines {
    content: String,
    position: usize,
}

impl MemberLines {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            content: String::from_utf8_lossy(bytes).into_owned(),
            position: 0,
        }
    }
}

impl Iterator for MemberLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.position >= self.content.len() {
            return None;
        }

        let remaining = &self.content[self.position..];
        let (line, advance) = match memchr::memchr(b'\n', remaining.as_bytes()) {
            Some(i) => (&remaining[..i], i + 1),
            None => (remaining, remaining.len()),
        };

        let line = line.to_string();
        self.position += advance;
        Some(line)
    }
}

/// Zip archive; every `.txt` member is decoded as lossy UTF-8
pub struct ZipReader {
    display_name: String,
    archive: ZipArchive<BufReader<File>>,
    next_index: usize,
    pending: Option<MemberLines>,
}

impl ZipReader {
    pub fn open(descriptor: &SourceDescriptor) -> Result<Self, SourceError> {
        let file = File::open(&descriptor.path).map_err(|e| SourceError::open(&descriptor.path, e))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| SourceError::archive(&descriptor.path, e))?;

        log::debug!("{} holds {} zip entries", descriptor.display_name, archive.len());

        Ok(Self {
            display_name: descriptor.display_name.clone(),
            archive,
            next_index: 0,
            pending: None,
        })
    }

    /// Read member `index`; `Ok(None)` for members that are not text dumps
    fn load_entry(&mut self, index: usize) -> Result<Option<(String, MemberLines)>, EntryWarning> {
        let mut entry = self.archive.by_index(index).map_err(|e| EntryWarning {
            entry: format!("#{}", index),
            reason: e.to_string(),
        })?;

        let name = entry.name().to_string();
        if entry.is_dir() || !is_text_entry(&name) {
            return Ok(None);
        }

        let mut bytes = Vec::with_capacity(entry.size().min(MAX_ENTRY_PREALLOC) as usize);
        entry.read_to_end(&mut bytes).map_err(|e| EntryWarning {
            entry: name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Some((name, MemberLines::from_bytes(&bytes))))
    }
}

impl Iterator for ZipReader {
    type Item = Result<SourceEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lines) = self.pending.as_mut() {
                if let Some(line) = lines.next() {
                    return Some(Ok(SourceEvent::Line(line)));
                }
                self.pending = None;
            }

            if self.next_index >= self.archive.len() {
                return None;
            }

            let index = self.next_index;
            self.next_index += 1;

            match self.load_entry(index) {
                Ok(Some((name, lines))) => {
                    self.pending = Some(lines);
                    return Some(Ok(SourceEvent::EntryStarted(name)));
                }
                Ok(None) => continue,
                Err(warning) => return Some(Ok(SourceEvent::EntrySkipped(warning))),
            }
        }
    }
}

impl LineSource for ZipReader {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Zip
    }
}

type RarCursor = unrar::OpenArchive<unrar::Process, unrar::CursorBeforeHeader>;

/// Rar archive with the same member rules as [`ZipReader`].
///
/// The unrar cursor is consumed by a failed extraction, so after a member
/// fails the archive is reopened and advanced past it.
pub struct RarReader {
    display_name: String,
    path: PathBuf,
    cursor: Option<RarCursor>,
    headers_read: usize,
    pending: Option<MemberLines>,
}

impl RarReader {
    pub fn open(descriptor: &SourceDescriptor) -> Result<Self, SourceError> {
        let cursor = open_rar(&descriptor.path)
            .map_err(|e| SourceError::archive(&descriptor.path, e))?;

        Ok(Self {
            display_name: descriptor.display_name.clone(),
            path: descriptor.path.clone(),
            cursor: Some(cursor),
            headers_read: 0,
            pending: None,
        })
    }

    /// Reopen the archive positioned after the first `skip` members
    fn reopen_after(&self, skip: usize) -> Option<RarCursor> {
        let mut cursor = match open_rar(&self.path) {
            Ok(cursor) => cursor,
            Err(e) => {
                log::warn!("Could not reopen {}: {}", self.display_name, e);
                return None;
            }
        };

        for _ in 0..skip {
            let header = cursor.read_header().ok()??;
            cursor = header.skip().ok()?;
        }

        Some(cursor)
    }
}

fn open_rar(path: &Path) -> unrar::UnrarResult<RarCursor> {
    unrar::Archive::new(path).open_for_processing()
}

impl Iterator for RarReader {
    type Item = Result<SourceEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lines) = self.pending.as_mut() {
                if let Some(line) = lines.next() {
                    return Some(Ok(SourceEvent::Line(line)));
                }
                self.pending = None;
            }

            let cursor = self.cursor.take()?;

            let header = match cursor.read_header() {
                Ok(Some(header)) => header,
                Ok(None) => return None,
                Err(e) => {
                    // A broken header leaves no way to reach later members
                    return Some(Ok(SourceEvent::EntrySkipped(EntryWarning {
                        entry: format!("#{}", self.headers_read),
                        reason: e.to_string(),
                    })));
                }
            };
            self.headers_read += 1;

            let name = header.entry().filename.to_string_lossy().into_owned();

            if !header.entry().is_file() || !is_text_entry(&name) {
                match header.skip() {
                    Ok(cursor) => {
                        self.cursor = Some(cursor);
                        continue;
                    }
                    Err(e) => {
                        return Some(Ok(SourceEvent::EntrySkipped(EntryWarning {
                            entry: name,
                            reason: e.to_string(),
                        })));
                    }
                }
            }

            match header.read() {
                Ok((bytes, cursor)) => {
                    self.cursor = Some(cursor);
                    self.pending = Some(MemberLines::from_bytes(&bytes));
                    return Some(Ok(SourceEvent::EntryStarted(name)));
                }
                Err(e) => {
                    self.cursor = self.reopen_after(self.headers_read);
                    return Some(Ok(SourceEvent::EntrySkipped(EntryWarning {
                        entry: name,
                        reason: e.to_string(),
                    })));
                }
            }
        }
    }
}

impl LineSource for RarReader {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::default_chain;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_zip(dir: &Path, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (member, content) in members {
            writer.start_file(*member, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    /// RAR 4 archive, stored method: notes.md, docs/, a.txt, c.txt
    const RAR_FIXTURE: &[u8] = &[
        0x52, 0x61, 0x72, 0x21, 0x1a, 0x07, 0x00, 0xcf, 0x90, 0x73, 0x00, 0x00, 0x0d, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0xe4, 0x58, 0x74, 0x00, 0x80, 0x28, 0x00, 0x0b, 0x00, 0x00, 0x00, 0x0b,
        0x00, 0x00, 0x00, 0x00, 0x7f, 0xa8, 0x2b, 0x88, 0x00, 0x00, 0x21, 0x5a, 0x14, 0x30, 0x08, 0x00,
        0x20, 0x00, 0x00, 0x00, 0x6e, 0x6f, 0x74, 0x65, 0x73, 0x2e, 0x6d, 0x64, 0x6e, 0x6f, 0x74, 0x20,
        0x61, 0x20, 0x64, 0x75, 0x6d, 0x70, 0x0a, 0xd0, 0x9d, 0x74, 0xe0, 0x80, 0x24, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x21, 0x5a, 0x14,
        0x30, 0x04, 0x00, 0x10, 0x00, 0x00, 0x00, 0x64, 0x6f, 0x63, 0x73, 0x13, 0xc7, 0x74, 0x00, 0x80,
        0x25, 0x00, 0x20, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x76, 0xbc, 0x6d, 0x9c, 0x00,
        0x00, 0x21, 0x5a, 0x14, 0x30, 0x05, 0x00, 0x20, 0x00, 0x00, 0x00, 0x61, 0x2e, 0x74, 0x78, 0x74,
        0x61, 0x40, 0x6d, 0x61, 0x69, 0x6c, 0x2e, 0x63, 0x6f, 0x6d, 0x3a, 0x70, 0x77, 0x31, 0x0a, 0x62,
        0x40, 0x75, 0x6f, 0x6c, 0x2e, 0x63, 0x6f, 0x6d, 0x2e, 0x62, 0x72, 0x3a, 0x70, 0x77, 0x32, 0x0a,
        0x65, 0xb5, 0x74, 0x00, 0x80, 0x25, 0x00, 0x0f, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x00, 0x00,
        0x29, 0x21, 0x2e, 0xc7, 0x00, 0x00, 0x21, 0x5a, 0x14, 0x30, 0x05, 0x00, 0x20, 0x00, 0x00, 0x00,
        0x63, 0x2e, 0x74, 0x78, 0x74, 0x63, 0x40, 0x6d, 0x61, 0x69, 0x6c, 0x2e, 0x63, 0x6f, 0x6d, 0x3a,
        0x70, 0x77, 0x33, 0x0a, 0xc4, 0x3d, 0x7b, 0x00, 0x40, 0x07, 0x00,
    ];
    /// Same archive with a wrong data checksum on a.txt
    const RAR_BAD_MEMBER: &[u8] = &[
        0x52, 0x61, 0x72, 0x21, 0x1a, 0x07, 0x00, 0xcf, 0x90, 0x73, 0x00, 0x00, 0x0d, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0xe4, 0x58, 0x74, 0x00, 0x80, 0x28, 0x00, 0x0b, 0x00, 0x00, 0x00, 0x0b,
        0x00, 0x00, 0x00, 0x00, 0x7f, 0xa8, 0x2b, 0x88, 0x00, 0x00, 0x21, 0x5a, 0x14, 0x30, 0x08, 0x00,
        0x20, 0x00, 0x00, 0x00, 0x6e, 0x6f, 0x74, 0x65, 0x73, 0x2e, 0x6d, 0x64, 0x6e, 0x6f, 0x74, 0x20,
        0x61, 0x20, 0x64, 0x75, 0x6d, 0x70, 0x0a, 0xd0, 0x9d, 0x74, 0xe0, 0x80, 0x24, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x21, 0x5a, 0x14,
        0x30, 0x04, 0x00, 0x10, 0x00, 0x00, 0x00, 0x64, 0x6f, 0x63, 0x73, 0x67, 0xfd, 0x74, 0x00, 0x80,
        0x25, 0x00, 0x20, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x89, 0x43, 0x92, 0x63, 0x00,
        0x00, 0x21, 0x5a, 0x14, 0x30, 0x05, 0x00, 0x20, 0x00, 0x00, 0x00, 0x61, 0x2e, 0x74, 0x78, 0x74,
        0x61, 0x40, 0x6d, 0x61, 0x69, 0x6c, 0x2e, 0x63, 0x6f, 0x6d, 0x3a, 0x70, 0x77, 0x31, 0x0a, 0x62,
        0x40, 0x75, 0x6f, 0x6c, 0x2e, 0x63, 0x6f, 0x6d, 0x2e, 0x62, 0x72, 0x3a, 0x70, 0x77, 0x32, 0x0a,
        0x65, 0xb5, 0x74, 0x00, 0x80, 0x25, 0x00, 0x0f, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x00, 0x00,
        0x29, 0x21, 0x2e, 0xc7, 0x00, 0x00, 0x21, 0x5a, 0x14, 0x30, 0x05, 0x00, 0x20, 0x00, 0x00, 0x00,
        0x63, 0x2e, 0x74, 0x78, 0x74, 0x63, 0x40, 0x6d, 0x61, 0x69, 0x6c, 0x2e, 0x63, 0x6f, 0x6d, 0x3a,
        0x70, 0x77, 0x33, 0x0a, 0xc4, 0x3d, 0x7b, 0x00, 0x40, 0x07, 0x00,
    ];

    fn write_rar(dir: &Path, name: &str, bytes: &[u8]) -> SourceDescriptor {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        SourceDescriptor::from_path(&path).unwrap()
    }

    fn collect(source: Box<dyn LineSource>) -> Vec<SourceEvent> {
        source.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a/Dump.TXT")), Some(SourceKind::PlainText));
        assert_eq!(SourceKind::from_path(Path::new("b.zip")), Some(SourceKind::Zip));
        assert_eq!(SourceKind::from_path(Path::new("c.Rar")), Some(SourceKind::Rar));
        assert_eq!(SourceKind::from_path(Path::new("d.7z")), None);
        assert_eq!(SourceKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_plain_text_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.txt");
        fs::write(&path, "a@b.com:pw1\r\n\nc@d.com:pw2\n").unwrap();

        let desc = SourceDescriptor::from_path(&path).unwrap();
        assert_eq!(desc.display_name, "dump.txt");

        let source = open_source(&desc, &default_chain()).unwrap();
        assert_eq!(source.kind(), SourceKind::PlainText);
        assert_eq!(
            collect(source),
            vec![
                SourceEvent::Line("a@b.com:pw1".into()),
                SourceEvent::Line("".into()),
                SourceEvent::Line("c@d.com:pw2".into()),
            ]
        );
    }

    #[test]
    fn test_zip_reads_only_text_members() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            dir.path(),
            "pack.zip",
            &[
                ("one.txt", b"u1@x.com:p1\nu2@x.com:p2\n"),
                ("image.png", b"\x89PNG"),
                ("nested/TWO.TXT", b"u3@x.com:p3"),
            ],
        );

        let desc = SourceDescriptor::from_path(&path).unwrap();
        let events = collect(open_source(&desc, &default_chain()).unwrap());

        assert_eq!(
            events,
            vec![
                SourceEvent::EntryStarted("one.txt".into()),
                SourceEvent::Line("u1@x.com:p1".into()),
                SourceEvent::Line("u2@x.com:p2".into()),
                SourceEvent::EntryStarted("nested/TWO.TXT".into()),
                SourceEvent::Line("u3@x.com:p3".into()),
            ]
        );
    }

    #[test]
    fn test_zip_member_decoded_lossy() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(dir.path(), "bad.zip", &[("x.txt", b"jo\xe3o:senha\n")]);

        let desc = SourceDescriptor::from_path(&path).unwrap();
        let events = collect(open_source(&desc, &default_chain()).unwrap());

        assert_eq!(events[1], SourceEvent::Line("jo\u{FFFD}o:senha".into()));
    }

    #[test]
    fn test_zip_oversized_declared_size() {
        // Local and central headers both claim a 4 GiB member
        let dir = TempDir::new().unwrap();
        let path = write_zip(dir.path(), "big.zip", &[("x.txt", b"u@x.com:pw1\n")]);
        let mut bytes = fs::read(&path).unwrap();
        let declared = 0xFFFF_FFF0u32.to_le_bytes();
        // Uncompressed size sits 22 bytes into a local header and 24 into a central one
        for (sig, offset) in [(b"PK\x03\x04", 22usize), (b"PK\x01\x02", 24usize)] {
            let at = bytes.windows(4).position(|w| w == sig).unwrap();
            bytes[at + offset..at + offset + 4].copy_from_slice(&declared);
        }
        fs::write(&path, &bytes).unwrap();

        let desc = SourceDescriptor::from_path(&path).unwrap();
        let events = collect(open_source(&desc, &default_chain()).unwrap());

        // Reserved space is capped; the real content still reads back
        assert_eq!(
            events,
            vec![
                SourceEvent::EntryStarted("x.txt".into()),
                SourceEvent::Line("u@x.com:pw1".into()),
            ]
        );
    }

    #[test]
    fn test_corrupt_zip_is_source_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        fs::write(&path, b"this is not a zip archive").unwrap();

        let desc = SourceDescriptor::from_path(&path).unwrap();
        let err = open_source(&desc, &default_chain()).err().unwrap();
        assert!(matches!(err, SourceError::Archive { .. }));
    }

    #[test]
    fn test_corrupt_rar_is_source_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.rar");
        fs::write(&path, b"Rar! but not really").unwrap();

        let desc = SourceDescriptor::from_path(&path).unwrap();
        let err = open_source(&desc, &default_chain()).err().unwrap();
        assert!(matches!(err, SourceError::Archive { .. }));
    }

    #[test]
    fn test_rar_reads_only_text_members() {
        let dir = TempDir::new().unwrap();
        let desc = write_rar(dir.path(), "pack.rar", RAR_FIXTURE);

        let source = open_source(&desc, &default_chain()).unwrap();
        assert_eq!(source.kind(), SourceKind::Rar);
        assert_eq!(
            collect(source),
            vec![
                SourceEvent::EntryStarted("a.txt".into()),
                SourceEvent::Line("a@mail.com:pw1".into()),
                SourceEvent::Line("b@uol.com.br:pw2".into()),
                SourceEvent::EntryStarted("c.txt".into()),
                SourceEvent::Line("c@mail.com:pw3".into()),
            ]
        );
    }

    #[test]
    fn test_rar_failed_member_is_skipped() {
        let dir = TempDir::new().unwrap();
        let desc = write_rar(dir.path(), "damaged.rar", RAR_BAD_MEMBER);

        let events = collect(open_source(&desc, &default_chain()).unwrap());

        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            SourceEvent::EntrySkipped(w) if w.entry == "a.txt"
        ));
        assert_eq!(events[1], SourceEvent::EntryStarted("c.txt".into()));
        assert_eq!(events[2], SourceEvent::Line("c@mail.com:pw3".into()));
    }

    #[test]
    fn test_unsupported_extension() {
        let desc = SourceDescriptor::new("x.7z", "x.7z", 0);
        let err = open_source(&desc, &default_chain()).err().unwrap();
        assert!(matches!(err, SourceError::Unsupported { .. }));
    }

    #[test]
    fn test_member_lines_trailing_newline() {
        let lines: Vec<_> = MemberLines::from_bytes(b"a\n\nb\n").collect();
        assert_eq!(lines, vec!["a", "", "b"]);

        let lines: Vec<_> = MemberLines::from_bytes(b"").collect();
        assert!(lines.is_empty());
    }
}
