//! Core processing engine
//!
//! Drives one source at a time through validation and classification,
//! picks the direct or chunked path by input size, and runs a progress
//! monitor alongside. Batch runs merge every source into one deduplicated
//! pair of outputs.

use crate::aggregate::{AggregateResultSet, Aggregator, ResultSet};
use crate::chunked::{ChunkedProcessor, SpillError, DEFAULT_CHUNK_SIZE, DEFAULT_GIANT_THRESHOLD};
use crate::classifier::RegionClassifier;
use crate::cli::Args;
use crate::encoding::default_chain;
use crate::output::{
    ensure_output_dir, generate_output_name, plain_stem, write_records, OutputNamer, DEFAULT_BUFFER_SIZE, DEFAULT_PROGRESS_STEP,
};
use crate::progress::{
    create_progress_bar, create_spinner, format_duration, format_number, print_bullet, print_error,
    print_header, print_info, print_success, print_summary, print_warning, spinner_reporter, Counters,
    ProgressMonitor, DEFAULT_MONITOR_INTERVAL,
};
use crate::rules::Ruleset;
use crate::source::{open_source, EntryWarning, SourceDescriptor, SourceError, SourceEvent, SourceKind};
use crate::validator::{LineValidator, RejectReason};

use bytesize::ByteSize;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::WalkDir;

/// Rejected lines kept as debugging samples are cut to this many characters
pub const REJECTED_SAMPLE_CHARS: usize = 100;

/// Processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub output_dir: PathBuf,
    pub batch: bool,
    pub recursive: bool,
    pub extensions: Vec<String>,
    /// Plain-text inputs above this size use the chunked path
    pub giant_threshold: u64,
    pub chunk_size: usize,
    /// Where spill files go; system temp directory when `None`
    pub spill_dir: Option<PathBuf>,
    pub encoding_chain: Vec<String>,
    pub monitor_interval: Duration,
    pub progress_step: u64,
    pub buffer_size: usize,
    pub rejected_samples: usize,
    pub sort_output: bool,
    pub dry_run: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            batch: false,
            recursive: false,
            extensions: vec!["txt".to_string(), "zip".to_string(), "rar".to_string()],
            giant_threshold: DEFAULT_GIANT_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            spill_dir: None,
            encoding_chain: default_chain(),
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            progress_step: DEFAULT_PROGRESS_STEP,
            buffer_size: DEFAULT_BUFFER_SIZE,
            rejected_samples: 5,
            sort_output: false,
            dry_run: false,
            quiet: false,
            verbose: false,
        }
    }
}

impl ProcessorConfig {
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        Ok(Self {
            output_dir: args.get_output_dir(),
            batch: args.batch,
            recursive: args.recursive,
            extensions: args.get_extensions(),
            giant_threshold: args.parse_giant_threshold()?,
            chunk_size: args.chunk_size,
            spill_dir: args.spill_dir.clone(),
            encoding_chain: args.get_encodings(),
            monitor_interval: Duration::from_millis(args.monitor_interval_ms),
            progress_step: DEFAULT_PROGRESS_STEP,
            buffer_size: args.parse_buffer_size()?,
            rejected_samples: args.rejected_samples,
            sort_output: args.sort,
            dry_run: args.dry_run,
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }
}

/// How a source is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Records accumulate in memory
    Direct,
    /// Batches with spill-to-disk storage
    Chunked,
}

/// Why a source stopped early
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Spill(#[from] SpillError),
}

/// Everything known about one processed source
#[derive(Debug)]
pub struct SourceOutcome {
    pub descriptor: SourceDescriptor,
    pub mode: ProcessingMode,
    pub result: ResultSet,
    pub warnings: Vec<EntryWarning>,
    pub rejected_samples: Vec<String>,
    /// Set when the source aborted; `result` then holds the partial output
    pub failure: Option<ProcessError>,
    pub elapsed: Duration,
    pub monitor_samples: u64,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of pushing one raw line through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict<'a> {
    /// Empty after trimming; counted as seen, nothing else
    Blank,
    Rejected(RejectReason),
    /// `line` is the trimmed raw line
    Accepted { line: &'a str, regional: bool },
}

/// Per-source validation and classification state.
///
/// Owns the writer side of the source's [`Counters`] and collects the side
/// channels (entry warnings, rejected samples).
pub struct LinePipeline<'r> {
    validator: LineValidator<'r>,
    classifier: RegionClassifier<'r>,
    counters: Arc<Counters>,
    display_name: String,
    warnings: Vec<EntryWarning>,
    rejected_samples: Vec<String>,
    sample_limit: usize,
}

impl<'r> LinePipeline<'r> {
    pub fn new(
        rules: &'r Ruleset,
        counters: Arc<Counters>,
        display_name: impl Into<String>,
        sample_limit: usize,
    ) -> Self {
        Self {
            validator: LineValidator::new(rules),
            classifier: RegionClassifier::new(rules),
            counters,
            display_name: display_name.into(),
            warnings: Vec::new(),
            rejected_samples: Vec::new(),
            sample_limit,
        }
    }

    /// Validate and classify one raw line, updating the counters
    pub fn process_line<'a>(&mut self, raw: &'a str) -> LineVerdict<'a> {
        self.counters.add_line();

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return LineVerdict::Blank;
        }

        match self.validator.validate(trimmed) {
            Ok(credential) => {
                self.counters.add_valid();
                let regional = self.classifier.is_regional(credential.raw_line);
                if regional {
                    self.counters.add_regional();
                }
                LineVerdict::Accepted {
                    line: credential.raw_line,
                    regional,
                }
            }
            Err(reason) => {
                self.counters.add_rejected();
                if self.rejected_samples.len() < self.sample_limit {
                    self.rejected_samples
                        .push(trimmed.chars().take(REJECTED_SAMPLE_CHARS).collect());
                }
                log::trace!("{}: rejected ({}): {}", self.display_name, reason, trimmed);
                LineVerdict::Rejected(reason)
            }
        }
    }

    /// Handle a non-line event from the source
    pub fn note_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Line(_) => {}
            SourceEvent::EntryStarted(entry) => {
                log::info!("{}: processing entry {}", self.display_name, entry);
            }
            SourceEvent::EntrySkipped(warning) => {
                log::warn!(
                    "{}: skipping entry {}: {}",
                    self.display_name,
                    warning.entry,
                    warning.reason
                );
                self.warnings.push(warning);
            }
        }
    }

    /// `(warnings, rejected_samples)`
    pub fn into_parts(self) -> (Vec<EntryWarning>, Vec<String>) {
        (self.warnings, self.rejected_samples)
    }
}

type Drained = (Vec<String>, Vec<String>, Option<ProcessError>);

/// Main processor
pub struct Processor {
    config: ProcessorConfig,
    rules: Ruleset,
}

impl Processor {
    pub fn new(config: ProcessorConfig, rules: Ruleset) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Oversized plain-text inputs take the chunked path
    pub fn select_mode(&self, descriptor: &SourceDescriptor) -> ProcessingMode {
        match descriptor.kind() {
            Some(SourceKind::PlainText) if descriptor.size_bytes > self.config.giant_threshold => {
                ProcessingMode::Chunked
            }
            _ => ProcessingMode::Direct,
        }
    }

    /// Process a single source. Never fails: a source-level failure is
    /// recorded in the outcome next to whatever was salvaged before it.
    pub fn process_source(&self, descriptor: &SourceDescriptor) -> SourceOutcome {
        let started = Instant::now();
        let mode = self.select_mode(descriptor);
        let name = descriptor.display_name.clone();

        log::debug!(
            "{}: {} bytes, {:?} mode",
            name,
            descriptor.size_bytes,
            mode
        );

        let counters = Arc::new(Counters::new());
        let mut pipeline = LinePipeline::new(
            &self.rules,
            Arc::clone(&counters),
            name.as_str(),
            self.config.rejected_samples,
        );

        let spinner = if self.config.quiet {
            ProgressBar::hidden()
        } else {
            create_spinner(&format!("Processing {}...", name))
        };
        let monitor = ProgressMonitor::spawn(
            Arc::clone(&counters),
            self.config.monitor_interval,
            spinner_reporter(spinner.clone(), name.clone()),
        );

        let (records, regional_records, failure) = self.drain(descriptor, mode, &mut pipeline);

        let monitor_samples = monitor.stop();
        spinner.finish_and_clear();

        if let Some(ref e) = failure {
            log::error!("{}: {}", name, e);
        }

        let counters = counters
            .snapshot()
            .reconciled(records.len(), regional_records.len());
        let (warnings, rejected_samples) = pipeline.into_parts();

        SourceOutcome {
            descriptor: descriptor.clone(),
            mode,
            result: ResultSet {
                records,
                regional_records,
                counters,
            },
            warnings,
            rejected_samples,
            failure,
            elapsed: started.elapsed(),
            monitor_samples,
        }
    }

    fn drain(
        &self,
        descriptor: &SourceDescriptor,
        mode: ProcessingMode,
        pipeline: &mut LinePipeline<'_>,
    ) -> Drained {
        let mut source = match open_source(descriptor, &self.config.encoding_chain) {
            Ok(source) => source,
            Err(e) => return (Vec::new(), Vec::new(), Some(e.into())),
        };

        match mode {
            ProcessingMode::Direct => {
                let mut records = Vec::new();
                let mut regional_records = Vec::new();

                for item in source {
                    match item {
                        Ok(SourceEvent::Line(raw)) => {
                            if let LineVerdict::Accepted { line, regional } = pipeline.process_line(&raw) {
                                records.push(line.to_string());
                                if regional {
                                    regional_records.push(line.to_string());
                                }
                            }
                        }
                        Ok(event) => pipeline.note_event(event),
                        Err(e) => return (records, regional_records, Some(e.into())),
                    }
                }

                (records, regional_records, None)
            }
            ProcessingMode::Chunked => {
                let chunked = ChunkedProcessor::new(self.config.chunk_size, self.config.spill_dir.clone());
                match chunked.run(&mut *source, pipeline) {
                    Ok(output) => (
                        output.records,
                        output.regional_records,
                        output.source_failure.map(ProcessError::from),
                    ),
                    Err(e) => (Vec::new(), Vec::new(), Some(e.into())),
                }
            }
        }
    }

    /// Process sources one after another and merge them.
    ///
    /// `on_outcome` sees every outcome as soon as its source is done. Failed
    /// sources contribute their partial results. The returned outcomes keep
    /// their counters but not their records, which have moved into the
    /// aggregate.
    pub fn process_batch<F>(
        &self,
        sources: &[SourceDescriptor],
        mut on_outcome: F,
    ) -> (AggregateResultSet, Vec<SourceOutcome>)
    where
        F: FnMut(usize, &SourceOutcome),
    {
        let mut aggregator = Aggregator::new();
        let mut outcomes = Vec::with_capacity(sources.len());

        for (i, descriptor) in sources.iter().enumerate() {
            let mut outcome = self.process_source(descriptor);
            on_outcome(i, &outcome);

            let result = std::mem::take(&mut outcome.result);
            outcome.result.counters = result.counters;
            aggregator.add(result);
            outcomes.push(outcome);
        }

        (aggregator.finish(), outcomes)
    }

    /// Enumerate, process and write outputs for `inputs`
    pub fn run(&self, inputs: &[PathBuf]) -> anyhow::Result<()> {
        if !self.config.quiet {
            print_header("Scanning input...");
        }

        let sources = self.collect_sources(inputs)?;

        if sources.is_empty() {
            print_warning("No txt/zip/rar files found to process!");
            return Ok(());
        }

        let total_size: u64 = sources.iter().map(|s| s.size_bytes).sum();
        if !self.config.quiet {
            print_info(&format!("Found {} sources ({} total)", sources.len(), ByteSize(total_size)));
        }

        if self.config.dry_run {
            self.dry_run_report(&sources);
            return Ok(());
        }

        ensure_output_dir(&self.config.output_dir)?;

        if self.config.batch {
            self.run_batch(&sources)
        } else {
            self.run_individual(&sources)
        }
    }

    fn run_individual(&self, sources: &[SourceDescriptor]) -> anyhow::Result<()> {
        let mut failed = 0usize;
        let mut namer = OutputNamer::new();

        for (i, descriptor) in sources.iter().enumerate() {
            if !self.config.quiet {
                print_header(&format!(
                    "[{}/{}] Processing: {}",
                    i + 1,
                    sources.len(),
                    descriptor.display_name
                ));
            }

            let mut outcome = self.process_source(descriptor);
            if !outcome.is_success() {
                failed += 1;
            }
            self.report_outcome(&outcome);

            let stem = namer.claim(&descriptor.display_name);
            if stem != plain_stem(&descriptor.display_name) && !self.config.quiet {
                print_warning(&format!(
                    "Output name for {} taken by an earlier source, writing {}_*.txt",
                    descriptor.display_name, stem
                ));
            }
            let general_name = generate_output_name(&stem, "general");
            let regional_name = generate_output_name(&stem, "regional");
            self.write_outputs(
                &general_name,
                &regional_name,
                &mut outcome.result.records,
                &mut outcome.result.regional_records,
            );

            if !self.config.quiet {
                print_summary(
                    &format!("SUMMARY: {}", descriptor.display_name),
                    &outcome.result.counters,
                    outcome.elapsed,
                );
            }
        }

        if failed > 0 {
            print_warning(&format!("{} of {} sources failed", failed, sources.len()));
        }

        Ok(())
    }

    fn run_batch(&self, sources: &[SourceDescriptor]) -> anyhow::Result<()> {
        if !self.config.quiet {
            print_header(&format!("Batch processing: {} sources", sources.len()));
        }

        let started = Instant::now();
        let (mut aggregate, outcomes) = self.process_batch(sources, |i, outcome| {
            if !self.config.quiet {
                print_header(&format!(
                    "[{}/{}] Processed: {}",
                    i + 1,
                    sources.len(),
                    outcome.descriptor.display_name
                ));
            }
            self.report_outcome(outcome);
        });
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let elapsed = started.elapsed();

        self.write_outputs(
            "batch_general.txt",
            "batch_regional.txt",
            &mut aggregate.records,
            &mut aggregate.regional_records,
        );

        if !self.config.quiet {
            print_summary("BATCH SUMMARY (pre-dedup counts)", &aggregate.counters, elapsed);
            let (unique, unique_regional) = aggregate.unique_counts();
            print_info(&format!(
                "Sources: {} ({} failed), unique output: {} general, {} regional",
                aggregate.sources,
                failed,
                format_number(unique as u64),
                format_number(unique_regional as u64)
            ));
        }

        Ok(())
    }

    /// Write the non-empty sequences; a failed write is reported, not fatal
    fn write_outputs(
        &self,
        general_name: &str,
        regional_name: &str,
        records: &mut Vec<String>,
        regional_records: &mut Vec<String>,
    ) {
        if self.config.sort_output {
            records.sort_unstable();
            regional_records.sort_unstable();
        }

        if records.is_empty() && !self.config.quiet {
            print_warning("No valid credentials found");
        }

        for (name, lines) in [(general_name, &*records), (regional_name, &*regional_records)] {
            if lines.is_empty() {
                continue;
            }

            let path = self.config.output_dir.join(name);
            let pb = if self.config.quiet {
                ProgressBar::hidden()
            } else {
                create_progress_bar(lines.len() as u64, &format!("Writing {}", name))
            };

            let written = write_records(
                &path,
                lines,
                self.config.buffer_size,
                self.config.progress_step,
                |p| {
                    pb.set_position(p.written);
                    log::trace!("{}: {}", name, p.describe());
                },
            );
            pb.finish_and_clear();

            match written {
                Ok(count) if !self.config.quiet => {
                    print_success(&format!("Saved {:?} ({} lines)", path, format_number(count)));
                }
                Ok(_) => {}
                Err(e) => print_error(&format!("Failed to write {:?}: {}", path, e)),
            }
        }
    }

    fn report_outcome(&self, outcome: &SourceOutcome) {
        for warning in &outcome.warnings {
            print_warning(&format!("Skipped entry {}: {}", warning.entry, warning.reason));
        }

        if let Some(ref e) = outcome.failure {
            print_error(&format!("{} aborted: {}", outcome.descriptor.display_name, e));
        }

        if self.config.quiet {
            return;
        }

        let counters = &outcome.result.counters;
        print_info(&format!(
            "{} valid, {} regional, {} removed in {}",
            format_number(counters.valid_lines),
            format_number(counters.regional_lines),
            format_number(counters.rejected_lines),
            format_duration(outcome.elapsed)
        ));

        if !outcome.rejected_samples.is_empty() {
            print_info("Rejected line samples:");
            for (i, sample) in outcome.rejected_samples.iter().enumerate() {
                print_bullet(&format!("{}. {}", i + 1, sample));
            }
        }
    }

    /// Collect sources from files and directories, sorted by display name
    pub fn collect_sources(&self, inputs: &[PathBuf]) -> anyhow::Result<Vec<SourceDescriptor>> {
        let mut sources = Vec::new();

        for input in inputs {
            if input.is_file() {
                if SourceKind::from_path(input).is_none() {
                    print_warning(&format!("Skipping unsupported input {:?}", input));
                    continue;
                }
                sources.push(SourceDescriptor::from_path(input)?);
            } else if input.is_dir() {
                let walker = if self.config.recursive {
                    WalkDir::new(input)
                } else {
                    WalkDir::new(input).max_depth(1)
                };

                for entry in walker.into_iter().filter_map(|e| e.ok()) {
                    let path = entry.path();
                    if !path.is_file() || !self.has_wanted_extension(path) {
                        continue;
                    }

                    let mut descriptor = SourceDescriptor::from_path(path)?;
                    if let Ok(relative) = path.strip_prefix(input) {
                        descriptor.display_name = relative.display().to_string();
                    }
                    sources.push(descriptor);
                }
            } else {
                anyhow::bail!("Input path does not exist: {:?}", input);
            }
        }

        sources.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(sources)
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.config.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
            && SourceKind::from_path(path).is_some()
    }

    /// Dry run report
    fn dry_run_report(&self, sources: &[SourceDescriptor]) {
        print_header("DRY RUN - No files will be written");

        for descriptor in sources {
            let kind = descriptor.kind().map(|k| k.as_str()).unwrap_or("unknown");
            print_bullet(&format!(
                "{} ({}, {}, {:?})",
                descriptor.display_name,
                kind,
                ByteSize(descriptor.size_bytes),
                self.select_mode(descriptor)
            ));
        }

        print_bullet(&format!("Output directory: {:?}", self.config.output_dir));
        print_bullet(&format!(
            "Mode: {}",
            if self.config.batch { "batch (merged, deduplicated)" } else { "per source" }
        ));
    }
}
