//! Bounded-memory processing for oversized inputs
//!
//! Lines are pulled in fixed-size batches and accepted records go straight
//! to temporary spill files instead of growing in-memory vectors. The spill
//! files are read back once the source is exhausted and removed on every
//! path, including a failed read-back.

use crate::processor::{LinePipeline, LineVerdict};
use crate::source::{LineSource, SourceError, SourceEvent};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Inputs larger than this go through the chunked path (5 GiB)
pub const DEFAULT_GIANT_THRESHOLD: u64 = 5 * 1024 * 1024 * 1024;

/// Lines per batch
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Spill storage failures. Fatal to the source being processed.
#[derive(Debug, Error)]
pub enum SpillError {
    #[error("failed to create spill file in {dir:?}: {source}")]
    Create {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write spill file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read back spill file {path:?}: {source}")]
    ReadBack {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove spill file {path:?}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only line store backed by a temporary file.
///
/// The file is deleted when the store is drained or dropped.
pub struct SpillStore {
    writer: BufWriter<NamedTempFile>,
    path: PathBuf,
    lines: u64,
}

impl SpillStore {
    /// Create a spill file in `dir`, or the system temp directory
    pub fn create(dir: Option<&Path>, label: &str) -> Result<Self, SpillError> {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);

        let file = tempfile::Builder::new()
            .prefix(&format!("combo-spill-{}-", label))
            .suffix(".txt")
            .tempfile_in(&dir)
            .map_err(|source| SpillError::Create { dir, source })?;

        let path = file.path().to_path_buf();
        log::debug!("Spilling {} records to {:?}", label, path);

        Ok(Self {
            writer: BufWriter::with_capacity(1024 * 1024, file),
            path,
            lines: 0,
        })
    }

    pub fn append(&mut self, line: &str) -> Result<(), SpillError> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|source| SpillError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.lines += 1;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored line back and delete the file
    pub fn drain(self) -> Result<Vec<String>, SpillError> {
        let path = self.path;
        let capacity = self.lines as usize;

        // On a failed flush the temp file is dropped, and removed, with the error
        let file = self.writer.into_inner().map_err(|e| SpillError::Write {
            path: path.clone(),
            source: e.into_error(),
        })?;

        let read_back = file
            .reopen()
            .and_then(|f| read_lines(f, capacity))
            .map_err(|source| SpillError::ReadBack {
                path: path.clone(),
                source,
            });

        let cleanup = file.close().map_err(|source| SpillError::Cleanup {
            path: path.clone(),
            source,
        });

        let lines = read_back?;
        cleanup?;
        Ok(lines)
    }
}

fn read_lines(file: File, capacity: usize) -> io::Result<Vec<String>> {
    let mut lines = Vec::with_capacity(capacity);
    for line in BufReader::new(file).lines() {
        lines.push(line?);
    }
    Ok(lines)
}

/// What a chunked pass produced
#[derive(Debug)]
pub struct ChunkedOutput {
    pub records: Vec<String>,
    pub regional_records: Vec<String>,
    /// Source failure that ended the pass early; records hold what came before it
    pub source_failure: Option<SourceError>,
    pub batches: u64,
}

/// Batch-wise processor with spill-to-disk intermediate storage
#[derive(Debug, Clone)]
pub struct ChunkedProcessor {
    chunk_size: usize,
    spill_dir: Option<PathBuf>,
}

impl ChunkedProcessor {
    pub fn new(chunk_size: usize, spill_dir: Option<PathBuf>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            spill_dir,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Drain `source` through `pipeline` batch by batch.
    ///
    /// Counters are updated per line by the pipeline. A spill failure is
    /// returned as `Err`; a source failure stops reading but still returns
    /// the records gathered so far.
    pub fn run(
        &self,
        source: &mut dyn LineSource,
        pipeline: &mut LinePipeline<'_>,
    ) -> Result<ChunkedOutput, SpillError> {
        let spill_dir = self.spill_dir.as_deref();
        let mut general = SpillStore::create(spill_dir, "general")?;
        let mut regional = SpillStore::create(spill_dir, "regional")?;

        let mut batch: Vec<String> = Vec::with_capacity(self.chunk_size);
        let mut source_failure = None;
        let mut batches = 0u64;

        loop {
            batch.clear();
            let mut exhausted = false;

            while batch.len() < self.chunk_size {
                match source.next() {
                    Some(Ok(SourceEvent::Line(line))) => batch.push(line),
                    Some(Ok(event)) => pipeline.note_event(event),
                    Some(Err(e)) => {
                        source_failure = Some(e);
                        break;
                    }
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if !batch.is_empty() {
                batches += 1;
            }

            for raw in &batch {
                if let LineVerdict::Accepted { line, regional: is_regional } = pipeline.process_line(raw) {
                    general.append(line)?;
                    if is_regional {
                        regional.append(line)?;
                    }
                }
            }

            log::trace!(
                "{}: batch {} done, {} records spilled",
                source.display_name(),
                batches,
                general.len()
            );

            if exhausted || source_failure.is_some() {
                break;
            }
        }

        // Drain both even if the first fails, so neither file outlives the pass
        let records = general.drain();
        let regional_records = regional.drain();

        Ok(ChunkedOutput {
            records: records?,
            regional_records: regional_records?,
            source_failure,
            batches,
        })
    }
}
