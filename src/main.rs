//! Rekt Charts CLI - fetch the rekts database and chart losses per issue type

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rekt_charts::fetcher::page_progress_bar;
use rekt_charts::report::summarize;
use rekt_charts::{Config, Fetcher, HttpTransport, Incident, Reporter};

#[derive(Parser)]
#[command(name = "rekt-charts")]
#[command(about = "Cumulative loss charts from the rekts incident database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Env file holding API_KEY / API_URL
    #[arg(short, long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all incidents and write charts per issue type (default)
    Report {
        /// Directory for the charts (overrides OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Fetch all incidents and dump them as JSON
    Fetch {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch all incidents and print totals per issue type
    Summary {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(&cli.env_file).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Report { output_dir: None }) {
        Commands::Report { output_dir } => {
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            run_report(&config, &output_dir)?;
        }

        Commands::Fetch { output } => {
            let records = fetch_incidents(&config)?;
            let json = serde_json::to_string_pretty(&records)?;
            match output {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
                    eprintln!("Wrote {} incidents to {:?}", records.len(), path);
                }
                None => println!("{}", json),
            }
        }

        Commands::Summary { format } => {
            let records = fetch_incidents(&config)?;
            print_summary(&records, format)?;
        }
    }

    Ok(())
}

fn fetch_incidents(config: &Config) -> Result<Vec<Incident>> {
    eprintln!("Getting data from 'rekts' API endpoint:");

    let transport = HttpTransport::from_config(config).context("Failed to build HTTP client")?;
    tracing::info!("Endpoint: {}", transport.url());

    let fetcher = Fetcher::from_config(transport, config).with_progress(page_progress_bar());
    let records = fetcher.fetch_all().context("Failed to fetch incidents")?;
    Ok(records)
}

fn run_report(config: &Config, output_dir: &Path) -> Result<()> {
    let records = fetch_incidents(config)?;

    let reporter = Reporter::new(output_dir);
    let summary = reporter.run(&records)?;

    println!("\n{}", "Report complete".bold());
    println!("Incidents:      {}", records.len());
    println!("Issue types:    {}", summary.groups);
    println!("Charts written: {}", summary.charts_written.len().to_string().green());
    println!("Undated:        {}", summary.skipped_records);
    if !summary.empty_groups.is_empty() {
        println!(
            "No charts for:  {}",
            summary.empty_groups.join(", ").yellow()
        );
    }
    println!("Output:         {:?}", reporter.output_dir());

    Ok(())
}

fn print_summary(records: &[Incident], format: OutputFormat) -> Result<()> {
    let totals = summarize(records);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    println!("\n=== Incidents by Issue Type ===\n");
    for t in &totals {
        let span = match (t.first_seen, t.last_seen) {
            (Some(first), Some(last)) => format!(
                "{} .. {}",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            ),
            _ => "undated".to_string(),
        };
        println!(
            "{:<32} {:>6} incidents  {:>18} USD  {}",
            t.issue_type.bold(),
            t.incidents,
            t.funds_lost,
            span
        );
    }
    println!("\nTotal incidents: {}", records.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_format_values() {
        let cli = Cli::try_parse_from(["rekt-charts", "summary", "--format", "json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Summary { format: OutputFormat::Json })));

        let cli = Cli::try_parse_from(["rekt-charts", "summary"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Summary { format: OutputFormat::Text })));
    }

    #[test]
    fn test_summary_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["rekt-charts", "summary", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_report_is_default_command() {
        let cli = Cli::try_parse_from(["rekt-charts", "--verbose"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.verbose);
        assert_eq!(cli.env_file, PathBuf::from(".env"));
    }
}
