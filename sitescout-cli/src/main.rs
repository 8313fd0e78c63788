use clap::Parser;
use colored::Colorize;
use sitescout::{
    config::{CliOverrides, EncodingMode, ScoutConfig},
    logging::init_logging,
    results::RunSummary,
    scout, ScoutError,
};
use std::{num::NonZeroUsize, path::PathBuf, process, str::FromStr};
use tracing::debug;

type Result<T> = std::result::Result<T, ScoutError>;

/// Fetch every listed website and report which ones contain a pattern
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV file listing the targets (first row is a header)
    #[arg(short = 'i', long = "in-file")]
    in_file: Option<PathBuf>,

    /// Where to write the results CSV
    #[arg(short = 'o', long = "out-file")]
    out_file: Option<PathBuf>,

    /// Pattern to search each page for
    #[arg(short = 's', long = "search-term")]
    search_term: Option<String>,

    /// Treat the search term as a literal string instead of a regex
    #[arg(short = 'F', long = "fixed-strings")]
    fixed_strings: bool,

    /// Match case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Maximum number of targets in flight at once
    #[arg(short = 'j', long)]
    concurrency: Option<NonZeroUsize>,

    /// Per-request timeout in seconds
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Zero-based CSV column holding the target
    #[arg(long)]
    column: Option<usize>,

    /// Scheme used for targets given as bare hostnames
    #[arg(long)]
    scheme: Option<String>,

    /// Report non-2xx responses as errors instead of searching their bodies
    #[arg(long)]
    fail_on_status: bool,

    /// How to handle invalid UTF-8 in responses (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Additional configuration file (yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show a progress spinner on stderr
    #[arg(long)]
    progress: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Result<CliOverrides> {
        let encoding_mode = self
            .encoding
            .as_deref()
            .map(EncodingMode::from_str)
            .transpose()?;

        Ok(CliOverrides {
            input_path: self.in_file.clone(),
            output_path: self.out_file.clone(),
            pattern: self.search_term.clone(),
            literal: self.fixed_strings,
            case_insensitive: self.ignore_case,
            concurrency: self.concurrency,
            timeout_secs: self.timeout,
            target_column: self.column,
            default_scheme: self.scheme.clone(),
            fail_on_status: self.fail_on_status,
            encoding_mode,
            show_progress: self.progress,
            log_level: self.log_level.clone(),
        })
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{} {}", "Error:".red(), e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = ScoutConfig::load_from(cli.config.as_deref())?.merge_with_cli(cli.overrides()?);
    init_logging(&config.log_level);
    debug!("Resolved configuration: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(scout(&config))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::from)?;
        println!("{}", json);
    } else {
        print_summary(&summary, &config);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, config: &ScoutConfig) {
    println!(
        "Website search took: {}",
        humantime::format_duration(summary.elapsed)
    );
    println!(
        "Checked {} targets: {} matched, {} not matched, {} errors",
        summary.targets,
        summary.matched.to_string().green(),
        summary.not_matched.to_string().yellow(),
        summary.errors.to_string().red()
    );
    println!("Results written to {}", config.output_path.display().to_string().blue());
}
