//! Output management module
//!
//! Writes credential lines to flat UTF-8 files, one line each, with
//! buffering and periodic write progress.

use crate::progress::WriteProgress;
use hashbrown::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Default buffer size for file writing (8MB)
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Records between two write-progress reports
pub const DEFAULT_PROGRESS_STEP: u64 = 1000;

/// Output file writer with buffering
pub struct OutputWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    lines_written: u64,
    bytes_written: u64,
}

impl OutputWriter {
    /// Create a new output writer, truncating any existing file
    pub fn new(path: PathBuf, buffer_size: usize) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Cannot create output {:?}: {}", path, e))?;

        Ok(Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path,
            lines_written: 0,
            bytes_written: 0,
        })
    }

    /// Write a line to the output
    pub fn write_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.lines_written += 1;
        self.bytes_written += line.len() as u64 + 1;
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Write `records` to `path`, reporting progress every `step` records.
///
/// Returns the number of lines written.
pub fn write_records<F>(
    path: &Path,
    records: &[String],
    buffer_size: usize,
    step: u64,
    mut on_progress: F,
) -> anyhow::Result<u64>
where
    F: FnMut(&WriteProgress),
{
    let started = Instant::now();
    let total = records.len() as u64;
    let step = step.max(1);
    let mut writer = OutputWriter::new(path.to_path_buf(), buffer_size)?;

    for record in records {
        writer.write_line(record)?;

        if writer.lines_written() % step == 0 {
            on_progress(&WriteProgress {
                written: writer.lines_written(),
                total,
                elapsed: started.elapsed(),
            });
        }
    }

    writer.flush()?;
    on_progress(&WriteProgress {
        written: writer.lines_written(),
        total,
        elapsed: started.elapsed(),
    });

    log::debug!(
        "Wrote {} lines ({} bytes) to {:?}",
        writer.lines_written(),
        writer.bytes_written(),
        writer.path()
    );

    Ok(writer.lines_written())
}

/// Output filename for a stem, e.g. `dump_general.txt`
pub fn generate_output_name(stem: &str, suffix: &str) -> String {
    format!("{}_{}.txt", stem, suffix)
}

/// File stem of a display name, `output` when there is none
pub fn plain_stem(display_name: &str) -> &str {
    Path::new(display_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("output")
}

/// Hands out distinct output stems for the sources of one run.
///
/// The first source gets its plain file stem. A later source with the same
/// stem gets its extension appended (`dump_zip`), then a counter.
#[derive(Debug, Default)]
pub struct OutputNamer {
    taken: HashSet<String>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, display_name: &str) -> String {
        let path = Path::new(display_name);
        let stem = plain_stem(display_name);

        let mut candidate = stem.to_string();
        if self.taken.contains(&candidate) {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                candidate = format!("{}_{}", stem, ext.to_lowercase());
            }
        }

        let base = candidate.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }

        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Ensure output directory exists
pub fn ensure_output_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.txt");

        let mut writer = OutputWriter::new(path.clone(), 1024).unwrap();
        writer.write_line("a@x.com:1").unwrap();
        writer.write_line("b@x.com:2").unwrap();
        writer.flush().unwrap();

        assert_eq!(writer.lines_written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a@x.com:1\nb@x.com:2\n");
    }

    #[test]
    fn test_write_records_progress() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.txt");
        let records: Vec<String> = (0..2500).map(|i| format!("user{}@x.com:pw", i)).collect();

        let mut reports = Vec::new();
        let written = write_records(&path, &records, 1024, 1000, |p| reports.push(p.written)).unwrap();

        assert_eq!(written, 2500);
        assert_eq!(reports, vec![1000, 2000, 2500]);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2500);
        assert!(content.ends_with("user2499@x.com:pw\n"));
    }

    #[test]
    fn test_generate_output_name() {
        assert_eq!(generate_output_name("combos", "general"), "combos_general.txt");
        assert_eq!(generate_output_name("pack", "regional"), "pack_regional.txt");
    }

    #[test]
    fn test_output_namer_distinct_stems() {
        let mut namer = OutputNamer::new();
        assert_eq!(namer.claim("dump.txt"), "dump");
        assert_eq!(namer.claim("dump.zip"), "dump_zip");
        assert_eq!(namer.claim("other/dump.txt"), "dump_txt");
        assert_eq!(namer.claim("again/dump.txt"), "dump_txt_2");
        assert_eq!(namer.claim("pack.rar"), "pack");
        assert_eq!(namer.claim(""), "output");
    }
}
