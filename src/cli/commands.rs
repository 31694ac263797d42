//! Command implementations for the CLI
//!
//! Loads layered configuration, installs logging and dispatches to the
//! library for each subcommand.

use crate::cli::args::{Args, Commands, DiscoverArgs, IngestArgs, LoadArgs, SecretArgs};
use crate::config::EtlConfig;
use crate::constants::DEFAULT_SCHEMA;
use crate::dates::parse_date_input;
use crate::models::LoadSummary;
use crate::processor::discovery::discover_across;
use crate::processor::ingest::FixedWidthIngester;
use crate::processor::normalize::normalize;
use crate::processor::{ArchiveLoader, process_zipped_dat_files};
use crate::sink::SqlSink;
use anyhow::{Context, Result};
use colored::*;
use tracing::{debug, info};

/// Main command runner
pub fn run(args: Args) -> Result<()> {
    let Some(command) = args.command.clone() else {
        return Ok(());
    };

    let config = load_configuration(&args, &command)?;
    setup_logging(&args, &config);
    debug!("Resolved configuration: {:?}", config);

    match command {
        Commands::Discover(discover) => run_discover(&discover, &config),
        Commands::Ingest(ingest) => run_ingest(&ingest, &config),
        Commands::Load(load) => {
            let summary = run_load(&load, &config, args.show_progress())?;
            print_summary(&summary, &load.table, &config);
            Ok(())
        }
        Commands::Secret(secret) => run_secret(&secret, &config),
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args, config: &EtlConfig) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level(&config.logging.level);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chestnut_etl={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Load configuration using the layered approach (file -> env -> args)
pub fn load_configuration(args: &Args, command: &Commands) -> Result<EtlConfig> {
    let mut config = EtlConfig::load_layered(args.config_file.as_deref())
        .context("Failed to load configuration")?;

    apply_cli_overrides(&mut config, command);

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Apply subcommand arguments over the loaded configuration
pub fn apply_cli_overrides(config: &mut EtlConfig, command: &Commands) {
    match command {
        Commands::Discover(args) => {
            if let Some(strategy) = args.strategy {
                config.discovery.strategy = strategy;
            }
            if let Some(extension) = &args.extension {
                config.discovery.extension = extension.clone();
            }
        }
        Commands::Ingest(args) => {
            if args.keep {
                config.extraction.keep_extracted = true;
            }
            if let Some(output_dir) = &args.output_dir {
                config.extraction.output_dir = output_dir.clone();
            }
            if let Some(mode) = args.mode {
                config.normalize.mode = mode;
            }
        }
        Commands::Load(args) => {
            if let Some(database) = &args.database {
                config.sink.database = database.clone();
            }
            if let Some(schema) = &args.schema {
                config.sink.schema = schema.clone();
            }
            if let Some(batch_size) = args.batch_size {
                config.sink.batch_size = batch_size;
            }
            if let Some(strategy) = args.strategy {
                config.discovery.strategy = strategy;
            }
            if args.keep {
                config.extraction.keep_extracted = true;
            }
            if let Some(output_dir) = &args.output_dir {
                config.extraction.output_dir = output_dir.clone();
            }
            if let Some(mode) = args.mode {
                config.normalize.mode = mode;
            }
        }
        Commands::Secret(args) => {
            if let Some(env_file) = &args.env_file {
                config.credentials.broker.env_file = env_file.clone();
            }
            if let Some(program) = &args.program {
                config.credentials.broker.program = program.clone();
            }
        }
    }
}

fn run_discover(args: &DiscoverArgs, config: &EtlConfig) -> Result<()> {
    let interval = parse_date_input(&args.dates)?;
    info!("Discovering archives from {}", interval);

    let files = discover_across(
        &args.base_dirs,
        &interval,
        config.discovery.strategy,
        &config.discovery.extension,
    )
    .context("Discovery failed")?;

    for file in &files {
        println!("{}", file.path.display());
    }
    eprintln!(
        "{} {} files in {}",
        "Found".bright_green(),
        files.len().to_string().bright_white().bold(),
        interval.to_string().bright_cyan()
    );
    Ok(())
}

fn run_ingest(args: &IngestArgs, config: &EtlConfig) -> Result<()> {
    let ingester = FixedWidthIngester::new(config.extraction.infer_rows);
    let df = process_zipped_dat_files(&args.zip, &config.extraction.extract_options(), &ingester)
        .with_context(|| format!("Failed to ingest {}", args.zip.display()))?;
    let df = normalize(df, config.normalize.mode)?;

    println!("{}", df.head(Some(args.rows)));
    eprintln!(
        "{} {} rows x {} columns from {}",
        "Ingested".bright_green(),
        df.height().to_string().bright_white().bold(),
        df.width().to_string().bright_white().bold(),
        args.zip.display()
    );
    Ok(())
}

/// Open the database, attaching a sibling `<schema>.db` for non-default schemas
fn open_sink(config: &EtlConfig) -> Result<SqlSink> {
    let database = &config.sink.database;
    if let Some(parent) = database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let sink = SqlSink::open(database)
        .with_context(|| format!("Failed to open database {}", database.display()))?;

    let schema = config.sink.schema.as_str();
    if schema != DEFAULT_SCHEMA && schema != "temp" {
        let attached = database.with_file_name(format!("{}.db", schema));
        sink.attach_schema(schema, &attached)
            .with_context(|| format!("Failed to attach {}", attached.display()))?;
        info!("Attached {} as schema '{}'", attached.display(), schema);
    }
    Ok(sink)
}

fn run_load(args: &LoadArgs, config: &EtlConfig, show_progress: bool) -> Result<LoadSummary> {
    let interval = parse_date_input(&args.dates)?;
    info!("Loading archives from {} into {}", interval, args.table);

    let archives = discover_across(
        &args.base_dirs,
        &interval,
        config.discovery.strategy,
        &config.discovery.extension,
    )
    .context("Discovery failed")?;

    let mut sink = open_sink(config)?;
    let summary = ArchiveLoader::new(config)
        .with_progress(show_progress)
        .load_all(&mut sink, &archives, &args.table)?;
    Ok(summary)
}

fn print_summary(summary: &LoadSummary, table: &str, config: &EtlConfig) {
    println!("\n{}", "Load Summary".bright_green().bold());
    println!(
        "  {} {}.{} in {}",
        "Target:".bright_cyan(),
        config.sink.schema,
        table,
        config.sink.database.display()
    );
    println!(
        "  {} {}",
        "Archives found:".bright_cyan(),
        summary.archives_found.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Archives loaded:".bright_cyan(),
        summary.archives_loaded.to_string().bright_white()
    );
    if summary.archives_failed > 0 {
        println!(
            "  {} {}",
            "Archives failed:".bright_red(),
            summary.archives_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Rows written:".bright_cyan(),
        summary.rows_written.to_string().bright_white().bold()
    );
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        summary.processing_time_ms.to_string().bright_white()
    );
}

fn run_secret(args: &SecretArgs, config: &EtlConfig) -> Result<()> {
    let name = args
        .name
        .as_deref()
        .unwrap_or(&config.credentials.token_name);
    let value = config.credentials.broker.fetch(name)?;
    println!("{}", value);
    Ok(())
}
