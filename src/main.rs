//! Combo Filter - credential line extraction from leaked dumps
//!
//! Main entry point for the command-line application.

use clap::Parser;
use std::process;

use combo_filter::cli::Args;
use combo_filter::processor::{Processor, ProcessorConfig};
use combo_filter::progress::{print_error, print_header, print_info};
use combo_filter::rules::Ruleset;

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging; RUST_LOG still wins when set
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Configure thread pool
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    if let Err(e) = run(args) {
        print_error(&format!("{}", e));

        // Print chain of errors
        let mut source = e.source();
        while let Some(err) = source {
            print_error(&format!("  Caused by: {}", err));
            source = err.source();
        }

        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    args.validate()?;

    for input in &args.input {
        if !input.exists() {
            anyhow::bail!("Input path does not exist: {:?}", input);
        }
    }

    let mut rules = Ruleset::default();
    if let Some(ref sites_file) = args.sites_file {
        let added = rules.load_sites_file(sites_file)?;
        log::info!("Loaded {} extra regional sites from {:?}", added, sites_file);
    }

    let config = ProcessorConfig::from_args(&args)?;

    if !args.quiet && args.verbose {
        print_config(&args, &config, &rules);
    }

    let processor = Processor::new(config, rules);
    processor.run(&args.input)?;

    Ok(())
}

/// Print configuration summary
fn print_config(args: &Args, config: &ProcessorConfig, rules: &Ruleset) {
    print_header("Configuration");

    print_info(&format!("Inputs:          {:?}", args.input));
    print_info(&format!("Output dir:      {:?}", config.output_dir));
    print_info(&format!("Batch:           {}", config.batch));
    print_info(&format!("Recursive:       {}", config.recursive));
    print_info(&format!("Extensions:      {:?}", config.extensions));
    print_info(&format!("Encodings:       {:?}", config.encoding_chain));
    print_info(&format!("Giant threshold: {}", bytesize::ByteSize(config.giant_threshold)));
    print_info(&format!("Chunk size:      {}", config.chunk_size));
    print_info(&format!("Regional sites:  {}", rules.regional_sites().len()));
    print_info(&format!("Buffer size:     {} MB", config.buffer_size / (1024 * 1024)));
    print_info(&format!("Threads:         {}", args.threads.unwrap_or_else(num_cpus::get)));
}
