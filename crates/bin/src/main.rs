//! Unroll CLI binary.
//!
//! Converts month-to-date cumulative returns into validated daily log returns,
//! from a CSV file or from Yahoo Finance through the local cache.

mod integration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager::{get_cache_path, open_cache, print_cache_info};
use integration::data_pipeline::{CachedYahooSource, DEFAULT_CONCURRENCY, FetchConfig};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration as StdDuration;
use tracing_subscriber::EnvFilter;
use unroll::{Conversion, ConversionConfig, MtdInput, MtdRequest, excess_conversion};
use unroll_data::units::percent_to_decimal;
use unroll_data::{CsvMtdSource, MTD_RETURN_COL, YahooMtdSource};
use unroll_output::{DailyReturnExport, ExportFormat, Exporter, ReportBuilder};
use unroll_returns::ReturnMatrix;

#[derive(Parser)]
#[command(name = "unroll")]
#[command(about = "Unroll: MTD cumulative returns to validated daily log returns", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a wide MTD CSV file
    Convert {
        /// CSV file with a date column followed by one column per security
        input: PathBuf,

        /// Values are in percent rather than decimal units
        #[arg(long)]
        percent: bool,

        #[command(flatten)]
        conversion: ConversionArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fetch MTD returns from Yahoo Finance and convert them
    Fetch {
        /// Comma-separated security symbols
        #[arg(long, value_delimiter = ',', required = true)]
        securities: Vec<String>,

        /// First date of interest (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Disable caching (always fetch fresh data)
        #[arg(long)]
        no_cache: bool,

        /// Force refresh cached data
        #[arg(long)]
        refresh: bool,

        /// Maximum concurrent requests
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        #[command(flatten)]
        conversion: ConversionArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show or clear the MTD cache
    Cache {
        /// Delete all cached observations
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args)]
struct ConversionArgs {
    /// JSON file with conversion settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Convert month groups in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Write daily log returns to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (csv, json or pretty-json)
    #[arg(long, default_value = "csv")]
    format: ExportFormat,

    /// Write a JSON conversion report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "unroll=debug" } else { "unroll=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Convert {
            input,
            percent,
            conversion,
            output,
        } => {
            let config = conversion.load()?;
            convert_file(&input, percent, &config, &output).await?;
        }
        Commands::Fetch {
            securities,
            start,
            no_cache,
            refresh,
            concurrency,
            conversion,
            output,
        } => {
            let config = conversion.load()?;
            let fetch = FetchConfig {
                use_cache: !no_cache,
                force_refresh: refresh,
                concurrency,
            };
            fetch_and_convert(securities, start, fetch, &config, &output).await?;
        }
        Commands::Cache { clear } => {
            manage_cache(clear)?;
        }
    }

    Ok(())
}

impl ConversionArgs {
    fn load(&self) -> Result<ConversionConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str::<ConversionConfig>(&text)?
            }
            None => ConversionConfig::default(),
        };
        config.tolerance.check()?;
        config.parallel |= self.parallel;
        tracing::debug!(?config, "conversion settings");
        Ok(config)
    }
}

async fn convert_file(
    input: &Path,
    percent: bool,
    config: &ConversionConfig,
    output: &OutputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = CsvMtdSource::new(input);
    let df = source.read_all()?;
    let df = if percent { percent_to_decimal(df)? } else { df };
    let mtd = ReturnMatrix::from_long_frame(&df, MTD_RETURN_COL)?;

    tracing::info!(
        dates = mtd.n_dates(),
        securities = mtd.n_securities(),
        input = %input.display(),
        "loaded MTD matrix"
    );

    let conversion = excess_conversion(MtdInput::Matrix(mtd), &source, config).await?;
    write_outputs(&conversion, &input.display().to_string(), output)
}

fn fetch_progress_bar() -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(StdDuration::from_millis(100));
    pb.set_message("Fetching MTD returns...");
    Ok(pb)
}

async fn fetch_and_convert(
    securities: Vec<String>,
    start: NaiveDate,
    fetch: FetchConfig,
    config: &ConversionConfig,
    output: &OutputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let securities: Vec<String> = securities
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    if fetch.use_cache {
        print_cache_info();
        if fetch.force_refresh {
            println!("  Mode: Force refresh (re-fetching all data)");
        }
    }

    let pb = fetch_progress_bar()?;
    let source = CachedYahooSource::new(YahooMtdSource::new()?, fetch, Some(pb.clone()));
    let label = format!("yahoo:{}", securities.join(","));
    let request = MtdRequest::new(securities, start);

    let result = excess_conversion(MtdInput::Fetch(request), &source, config).await;
    pb.finish_and_clear();

    write_outputs(&result?, &label, output)
}

fn write_outputs(
    conversion: &Conversion,
    source: &str,
    output: &OutputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &output.output {
        DailyReturnExport::from_matrix(&conversion.daily).export_to_file(path, output.format)?;
        println!("Daily log returns written to {}", path.display());
    }

    if let Some(path) = &output.report {
        let report = ReportBuilder::new()
            .source(source)
            .conversion(conversion)
            .build()?;
        std::fs::write(path, report.to_json()?)?;
        println!("Report written to {}", path.display());
    }

    if output.output.is_none() {
        let summary = ReportBuilder::new()
            .source(source)
            .conversion(conversion)
            .reconciliation(false)
            .build()?;
        println!("{}", summary.to_ascii_table());
    }

    Ok(())
}

fn manage_cache(clear: bool) -> Result<(), Box<dyn std::error::Error>> {
    if clear {
        let cache = open_cache()?;
        cache.clear_all()?;
        println!("Cache cleared: {}", get_cache_path().display());
        return Ok(());
    }

    println!("\nUnroll cache");
    print_cache_info();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::parse_from([
            "unroll",
            "fetch",
            "--securities",
            "AAPL,MSFT",
            "--start",
            "2024-01-01",
            "--format",
            "pretty-json",
        ]);

        match cli.command {
            Commands::Fetch {
                securities,
                start,
                concurrency,
                output,
                ..
            } => {
                assert_eq!(securities, vec!["AAPL".to_string(), "MSFT".to_string()]);
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
                assert_eq!(concurrency, DEFAULT_CONCURRENCY);
                assert_eq!(output.format, ExportFormat::PrettyJson);
            }
            _ => panic!("expected fetch command"),
        }
    }

    #[test]
    fn test_parse_convert_with_verbose() {
        let cli = Cli::parse_from(["unroll", "convert", "mtd.csv", "--percent", "-v", "--parallel"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Convert {
                input,
                percent,
                conversion,
                ..
            } => {
                assert_eq!(input, PathBuf::from("mtd.csv"));
                assert!(percent);
                assert!(conversion.parallel);
            }
            _ => panic!("expected convert command"),
        }
    }

    #[test]
    fn test_conversion_args_load_default() {
        let args = ConversionArgs {
            config: None,
            parallel: true,
        };
        let config = args.load().unwrap();
        assert!(config.parallel);
    }

    #[tokio::test]
    async fn test_convert_file_writes_output() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("unroll-bin-{}-in.csv", process::id()));
        let out = dir.join(format!("unroll-bin-{}-out.csv", process::id()));
        std::fs::write(&input, "date,AAA\n2024-01-30,2.0\n2024-01-31,5.0\n2024-02-01,3.0\n")
            .unwrap();

        let output = OutputArgs {
            output: Some(out.clone()),
            format: ExportFormat::Csv,
            report: None,
        };
        convert_file(&input, true, &ConversionConfig::default(), &output)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("date,security,log_return\n2024-01-30,AAA,"));
        assert_eq!(written.lines().count(), 4);

        std::fs::remove_file(input).ok();
        std::fs::remove_file(out).ok();
    }
}
