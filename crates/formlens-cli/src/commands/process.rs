//! Process command - extract fields from a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use formlens_core::filter::{filled_count, filter_filled};
use formlens_core::input::DocumentInput;
use formlens_core::pipeline::FormExtractor;
use formlens_core::progress::ProgressUpdate;

use super::output::{OutputFormat, render};
use super::{StrategyArg, cancel_on_interrupt, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, JPEG or PNG)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Extraction strategy (overrides the config file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Keep only fields with a meaningful value
    #[arg(long)]
    filled_only: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    // Input errors are reported before configuration errors.
    let input = DocumentInput::from_path(&args.input)?;
    let extractor = FormExtractor::from_config(&config)?;

    info!(
        "Processing {} with {} strategy",
        args.input.display(),
        extractor.strategy_name()
    );

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")?
            .progress_chars("##-"),
    );

    let bar = pb.clone();
    let sink = move |update: &ProgressUpdate| {
        bar.set_position(update.percent as u64);
        bar.set_message(update.message.clone());
    };

    let cancel = cancel_on_interrupt();
    let result = extractor.extract(&input, Some(&sink), &cancel).await;

    let data = match result {
        Ok(data) => {
            pb.finish_with_message("Done");
            data
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };

    let total = data.form_fields.len();
    let filled = filled_count(&data);
    let data = if args.filled_only {
        filter_filled(&data)
    } else {
        data
    };

    let output = render(&data, args.format, args.pretty)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    eprintln!(
        "{} {} of {} fields filled across {} sections",
        style("ℹ").blue(),
        filled,
        total,
        data.sections.len()
    );

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
