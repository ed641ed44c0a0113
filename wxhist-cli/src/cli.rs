use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode};
use tracing::{debug, info};
use wxhist_core::{
    Config, ExportFormat, FetchMode, Metric, ProviderId, RangePreset, TabularExporter,
    WeatherAggregationService, geocoder_from_config, pivot_by_month_day, provider_from_config,
};

use crate::{logging, output};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "wxhist",
    version,
    about = "Historical weather for the same dates across past years"
)]
pub struct Cli {
    /// Read configuration from this file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a date window for a location and the same window in past years.
    Fetch(FetchArgs),

    /// List supported providers.
    Providers,

    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,

        /// Provider to store as the default.
        #[arg(short, long)]
        provider: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Location name, e.g. "Paris" or "Kyiv".
    pub location: String,

    /// First day of the window (YYYY-MM-DD).
    #[arg(long, required_unless_present = "last", requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last day of the window, inclusive (YYYY-MM-DD).
    #[arg(long, required_unless_present = "last", requires = "start")]
    pub end: Option<NaiveDate>,

    /// Window ending today instead of --start/--end: 7d, 14d, 30d, 3m, 6m, 12m...
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub last: Option<RangePreset>,

    /// How many preceding years to include.
    #[arg(
        short = 'y',
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(0..=50)
    )]
    pub years_back: u32,

    /// Provider short name; defaults to the configured one.
    #[arg(short, long)]
    pub provider: Option<String>,

    /// API key for this run only; never saved.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Request all years at once.
    #[arg(long)]
    pub concurrent: bool,

    /// Write the records to this file.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export format; inferred from the file extension when omitted.
    #[arg(long, value_enum, requires = "export")]
    pub format: Option<FormatArg>,

    /// Also print a month-day by year table of this metric.
    #[arg(long, value_enum)]
    pub pivot: Option<MetricArg>,

    /// Print records as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl FetchArgs {
    /// The window to query, with `--last` counted back from `today`.
    fn window(&self, today: NaiveDate) -> anyhow::Result<(NaiveDate, NaiveDate)> {
        match (self.last, self.start, self.end) {
            (Some(preset), _, _) => {
                let window = preset
                    .window_ending(today)
                    .with_context(|| format!("Range '{preset}' reaches past the calendar"))?;
                Ok((window.start(), window.end()))
            }
            (None, Some(start), Some(end)) => Ok((start, end)),
            _ => bail!("Pass --start and --end, or --last."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Xlsx,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Xlsx => ExportFormat::Xlsx,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    MaxTemp,
    MinTemp,
    Precipitation,
}

impl From<MetricArg> for Metric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::MaxTemp => Metric::MaxTemp,
            MetricArg::MinTemp => Metric::MinTemp,
            MetricArg::Precipitation => Metric::Precipitation,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Fetch(args) => {
                let config = load_config(self.config.as_deref())?;
                let log_file = logging::init(&config.log_filter, config.log_dir.as_deref())?;
                if let Some(path) = log_file {
                    info!(path = %path.display(), "Logging to file");
                }
                fetch(args, &config).await
            }
            Command::Providers => {
                for id in ProviderId::all() {
                    let key = if id.requires_api_key() {
                        format!("API key required ({})", Config::api_key_env_var(*id))
                    } else {
                        "no API key required".to_string()
                    };
                    println!("{:<14} {key}", id.as_str());
                }
                Ok(())
            }
            Command::InitConfig { force, provider } => {
                let mut config = Config::default();
                if let Some(name) = provider.as_deref() {
                    config.set_default_provider(ProviderId::try_from(name)?);
                }

                let existing = match &self.config {
                    Some(path) => path.clone(),
                    None => Config::config_file_path()?,
                };
                if existing.exists() && !force {
                    bail!(
                        "Config file already exists at {}.\n\
                         Hint: pass --force to overwrite it.",
                        existing.display()
                    );
                }

                let written = match self.config {
                    Some(path) => {
                        config.save_to(&path)?;
                        path
                    }
                    None => config.save()?,
                };
                println!("Wrote default config to {}", written.display());
                Ok(())
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn fetch(args: FetchArgs, config: &Config) -> anyhow::Result<()> {
    let provider_id = match args.provider.as_deref() {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };
    let (start, end) = args.window(Local::now().date_naive())?;
    let api_key = resolve_api_key(provider_id, args.api_key)?;

    let provider = provider_from_config(provider_id, config, api_key)?;
    let geocoder = geocoder_from_config(config)?;
    let mode = if args.concurrent {
        FetchMode::Concurrent
    } else {
        config.fetch_mode
    };
    let service = WeatherAggregationService::new(geocoder, provider).with_fetch_mode(mode);

    let report = service
        .fetch_range_report(&args.location, start, end, args.years_back)
        .await?;

    for line in output::render_failures(&report) {
        eprintln!("{line}");
    }

    let records = report.into_records();
    if records.is_empty() {
        println!("No data found for the selected criteria.");
        return Ok(());
    }

    let pivot = args
        .pivot
        .map(|metric| pivot_by_month_day(&records, metric.into()));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        if let Some(pivot) = &pivot {
            println!("{}", serde_json::to_string_pretty(pivot)?);
        }
    } else {
        println!("{}", output::render_records(&records));
        if let Some(pivot) = &pivot {
            println!();
            println!("{}", output::render_pivot(pivot));
        }
    }

    if let Some(path) = args.export {
        let format = args
            .format
            .map(ExportFormat::from)
            .or_else(|| ExportFormat::from_path(&path))
            .unwrap_or(ExportFormat::Csv);
        TabularExporter::new()
            .export(&records, &path, format)
            .with_context(|| format!("Failed to export records to {}", path.display()))?;
        eprintln!("Exported {} records to {}", records.len(), path.display());
    }

    Ok(())
}

/// `--api-key` first, then the provider's environment variable, then a prompt
/// for providers that cannot work without one.
fn resolve_api_key(id: ProviderId, flag: Option<String>) -> anyhow::Result<Option<String>> {
    if let Some(key) = flag.filter(|key| !key.trim().is_empty()) {
        debug!(provider = %id, "Using API key from command line");
        return Ok(Some(key));
    }
    if let Some(key) = Config::api_key_from_env(id) {
        debug!(provider = %id, "Using API key from environment");
        return Ok(Some(key));
    }
    if !id.requires_api_key() {
        return Ok(None);
    }

    let key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message("Used for this run only, not saved")
        .prompt()
        .with_context(|| format!("Failed to read API key for '{id}'"))?;
    Ok(Some(key))
}
