//! Command-line interface definition for combo-filter
//!
//! Provides argument parsing and validation for the credential extractor.

use clap::Parser;
use std::path::PathBuf;

/// Credential line extractor for leaked combo dumps
///
/// Reads text files, zip and rar archives, keeps well-formed
/// `identifier:secret` lines and splits out the regional subset.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "combo-filter",
    version,
    about = "Extract and classify credential lines from combo dumps",
    long_about = r#"
Reads plain-text dumps and zip/rar archives, drops spam and malformed lines,
and writes two files per source: every valid credential line (_general) and
the subset belonging to regional sites (_regional).

Plain-text inputs above --giant-threshold are processed in fixed-size batches
with intermediate results spilled to disk.

EXAMPLES:
    # Process one dump
    combo-filter -i leak.txt -o out/

    # Every txt/zip/rar in a directory tree, merged and deduplicated
    combo-filter -i dumps/ -r --batch -o out/

    # Force chunked processing for anything above 512MB
    combo-filter -i huge.txt --giant-threshold 512MB --chunk-size 20000

    # Extra regional sites, one per line
    combo-filter -i leak.txt --sites-file sites.txt
"#
)]
pub struct Args {
    /// Input files or directories
    #[arg(short, long, required = true, num_args = 1.., value_name = "PATH")]
    pub input: Vec<PathBuf>,

    /// Output directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Merge every source into batch_general.txt / batch_regional.txt
    #[arg(long, default_value_t = false)]
    pub batch: bool,

    /// Process directories recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// File extensions to pick up from directories
    #[arg(long, value_name = "EXT", default_value = "txt,zip,rar")]
    pub extensions: String,

    /// Plain-text files larger than this are processed in chunks
    #[arg(long, value_name = "SIZE", default_value = "5GB")]
    pub giant_threshold: String,

    /// Lines per batch in chunked mode
    #[arg(long, value_name = "LINES", default_value_t = 5000)]
    pub chunk_size: usize,

    /// Directory for spill files (default: system temp directory)
    #[arg(long, value_name = "DIR")]
    pub spill_dir: Option<PathBuf>,

    /// Encoding fallback chain for plain-text files
    #[arg(long, value_name = "LIST", default_value = "utf-8,latin1,cp1252,iso-8859-1")]
    pub encodings: String,

    /// Progress sampling interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub monitor_interval_ms: u64,

    /// Buffer size for output files
    #[arg(long, value_name = "SIZE", default_value = "8MB")]
    pub buffer_size: String,

    /// Additional regional sites, one per line
    #[arg(long, value_name = "FILE")]
    pub sites_file: Option<PathBuf>,

    /// Number of rejected lines to show per source
    #[arg(long, value_name = "NUM", default_value_t = 5)]
    pub rejected_samples: usize,

    /// Number of threads (default: auto-detect)
    #[arg(short = 't', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Sort output alphabetically
    #[arg(long, default_value_t = false)]
    pub sort: bool,

    /// Dry run - show what would be done without writing files
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose mode - detailed logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Parse buffer size string to bytes
    pub fn parse_buffer_size(&self) -> anyhow::Result<usize> {
        Ok(parse_size(&self.buffer_size)? as usize)
    }

    /// Parse the giant-file threshold to bytes
    pub fn parse_giant_threshold(&self) -> anyhow::Result<u64> {
        parse_size(&self.giant_threshold)
    }

    /// Get output directory, defaulting to current directory
    pub fn get_output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Parse file extensions to process
    pub fn get_extensions(&self) -> Vec<String> {
        split_list(&self.extensions)
    }

    /// Encoding labels in fallback order
    pub fn get_encodings(&self) -> Vec<String> {
        split_list(&self.encodings)
    }

    /// Check argument combinations clap cannot express
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("--chunk-size must be at least 1");
        }
        if self.monitor_interval_ms == 0 {
            anyhow::bail!("--monitor-interval-ms must be at least 1");
        }
        if self.get_encodings().is_empty() {
            anyhow::bail!("--encodings needs at least one label");
        }
        if self.get_extensions().is_empty() {
            anyhow::bail!("--extensions needs at least one extension");
        }
        self.parse_giant_threshold()?;
        self.parse_buffer_size()?;
        Ok(())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse human-readable size string to bytes
pub fn parse_size(size_str: &str) -> anyhow::Result<u64> {
    let size_str = size_str.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = size_str.strip_suffix("TB") {
        (n, 1024u64 * 1024 * 1024 * 1024)
    } else if let Some(n) = size_str.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = size_str.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = size_str.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = size_str.strip_suffix('B') {
        (n, 1)
    } else {
        (size_str.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size format: '{}'", size_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size too large: '{}'", size_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["combo-filter", "-i", "dump.txt"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.input, vec![PathBuf::from("dump.txt")]);
        assert_eq!(args.chunk_size, 5000);
        assert_eq!(args.monitor_interval_ms, 500);
        assert_eq!(args.rejected_samples, 5);
        assert_eq!(args.get_extensions(), vec!["txt", "zip", "rar"]);
        assert_eq!(
            args.get_encodings(),
            vec!["utf-8", "latin1", "cp1252", "iso-8859-1"]
        );
        assert_eq!(args.parse_giant_threshold().unwrap(), 5 * 1024 * 1024 * 1024);
        assert_eq!(args.get_output_dir(), PathBuf::from("."));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_multiple_inputs() {
        let args = Args::try_parse_from(["combo-filter", "-i", "a.txt", "b.zip", "--batch"]).unwrap();
        assert_eq!(args.input.len(), 2);
        assert!(args.batch);
    }

    #[test]
    fn test_input_required() {
        assert!(Args::try_parse_from(["combo-filter"]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let args = parse(&["--chunk-size", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let args = parse(&["--giant-threshold", "lots"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_extensions_normalized() {
        let args = parse(&["--extensions", " TXT, ,Zip "]);
        assert_eq!(args.get_extensions(), vec!["txt", "zip"]);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("64MB").unwrap(), 64 * 1024 * 1024);
        assert_eq!(parse_size("8GB").unwrap(), 8 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("1024KB").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("2tb").unwrap(), 2 * 1024 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert!(parse_size("GB").is_err());
    }
}
