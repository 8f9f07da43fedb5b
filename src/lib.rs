//! # Combo Filter
//!
//! Credential line extraction from leaked combo dumps.
//!
//! ## Features
//!
//! - **Validation**: keeps well-formed `identifier:secret` lines, drops spam and noise
//! - **Regional split**: lines tied to regional sites go to a second output
//! - **Archives**: reads `.txt` members of zip and rar containers
//! - **Encoding fallback**: plain-text files are decoded through a configurable chain
//! - **Giant inputs**: oversized files are processed in batches with spill-to-disk storage
//! - **Batch mode**: merges every source and removes duplicate lines
//!
//! ## Usage
//!
//! ```bash
//! # One dump, two outputs (leak_general.txt, leak_regional.txt)
//! combo-filter -i leak.txt -o out/
//!
//! # A directory tree merged into batch_general.txt / batch_regional.txt
//! combo-filter -i dumps/ -r --batch -o out/
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use combo_filter::processor::{Processor, ProcessorConfig};
//! use combo_filter::rules::Ruleset;
//! use combo_filter::source::SourceDescriptor;
//! use std::path::{Path, PathBuf};
//!
//! let config = ProcessorConfig {
//!     output_dir: PathBuf::from("./output"),
//!     ..ProcessorConfig::default()
//! };
//!
//! let processor = Processor::new(config, Ruleset::default());
//! let source = SourceDescriptor::from_path(Path::new("leak.txt")).unwrap();
//! let outcome = processor.process_source(&source);
//! println!("{} valid lines", outcome.result.records.len());
//! ```

pub mod aggregate;
pub mod chunked;
pub mod classifier;
pub mod cli;
pub mod dedup;
pub mod encoding;
pub mod output;
pub mod processor;
pub mod progress;
pub mod rules;
pub mod source;
pub mod validator;

pub use aggregate::{merge, AggregateResultSet, Aggregator, ResultSet};
pub use classifier::RegionClassifier;
pub use cli::Args;
pub use processor::{Processor, ProcessorConfig};
pub use rules::Ruleset;
pub use source::{open_source, LineSource, SourceDescriptor, SourceError, SourceKind};
pub use validator::{Credential, LineValidator, RejectReason};
