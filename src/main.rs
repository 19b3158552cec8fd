//! Property Offload - command line entry point
//!
//! Runs listing processing through the dispatcher so operators can check a
//! record export and a configuration file without the hosting application.

use clap::{Parser, Subcommand, ValueEnum};
use property_offload::observability::init_default_logging;
use property_offload::{
    Dispatcher, OffloadConfig, OffloadResult, ProcessingOptions, Record, SortDirection, SortKey,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

/// Background processing for property listings
#[derive(Parser)]
#[command(name = "property-offload")]
#[command(about = "Filter, sort and summarise property listings on a background worker")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "PROPERTY_OFFLOAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter, sort and limit a JSON array of records
    Process {
        /// JSON file holding an array of CMS records
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Keep only records with this transaction type (e.g. Venda, Aluguel)
        #[arg(long)]
        filter_by_type: Option<String>,

        /// Sort key; only "price" (exact, lowercase) reorders records
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort direction
        #[arg(long, value_enum)]
        direction: Option<Direction>,

        /// Maximum number of records returned
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Summarise price, area, room and location ranges
    Features {
        /// JSON file holding an array of CMS records
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for SortDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => SortDirection::Asc,
            Direction::Desc => SortDirection::Desc,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting property-offload v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Process {
            input,
            filter_by_type,
            sort_by,
            direction,
            limit,
        } => {
            let options = ProcessingOptions {
                filter_by_type,
                sort_by: sort_by.as_deref().map(SortKey::from_name),
                sort_direction: direction.map(SortDirection::from),
                limit,
            };
            run_process(&config, &input, options).await
        }
        Commands::Features { input } => run_features(&config, &input).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: Option<&Path>) -> OffloadResult<OffloadConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(OffloadConfig::load_from_file(path)?);
    }

    // Try default locations
    for path_str in ["property-offload.toml", "config/property-offload.toml"] {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(OffloadConfig::load_from_file(path)?);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(OffloadConfig::default())
}

fn read_records(path: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&content)?;
    info!(count = records.len(), input = %path.display(), "Loaded records");
    Ok(records)
}

async fn run_process(
    config: &OffloadConfig,
    input: &Path,
    options: ProcessingOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(input)?;
    let dispatcher = Dispatcher::new(&config.dispatcher);

    let outcome = dispatcher.process_properties(records, options).await;
    dispatcher.shutdown().await?;

    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_features(config: &OffloadConfig, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(input)?;
    let dispatcher = Dispatcher::new(&config.dispatcher);

    let outcome = dispatcher.extract_features(records).await;
    dispatcher.shutdown().await?;

    let features = outcome?;
    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}

fn handle_config_command(config: &OffloadConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    println!("Configuration is valid");
    Ok(())
}
