use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use logocluster::batch::load_domains;
use logocluster::cli::{Cli, Commands};
use logocluster::config::{self, AppConfig, CONFIG_PATH};
use logocluster::export::{load_hashes, write_failed, write_groups, write_hashes, write_log};
use logocluster::grouping::cluster;
use logocluster::logger::{init_tracing, RunLogger, VerbosityLevel};
use logocluster::{HashStore, LogoPipeline, PerceptualHash};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_PATH));

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config(&config_path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run logocluster again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut app_config = match AppConfig::load_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config(&path) {
            Ok(Some(created_path)) => {
                println!("✅ Created default configuration file at: {}", created_path.display());
                println!("   Edit this file to customize settings, then run logocluster again.");
                std::process::exit(0);
            }
            Ok(None) => {
                eprintln!("❌ Configuration file not found at: {}", path.display());
                eprintln!("   Run with --init to create a default configuration file.");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut app_config);

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    init_tracing(verbosity);

    let mut logger = RunLogger::new(verbosity);
    if cli.no_progress || !io::stderr().is_terminal() {
        logger = logger.without_progress();
    }

    if let Err(e) = execute(&cli, &app_config, &logger).await {
        logger.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    logger.print_final_summary();
}

/// Run the selected subcommand against the loaded configuration
async fn execute(cli: &Cli, config: &AppConfig, logger: &RunLogger) -> Result<()> {
    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", cli.output_dir.display()))?;

    match cli.command() {
        Commands::Run => {
            let hashes = fetch_phase(cli, config, logger).await?;
            group_phase(cli, config, logger, &hashes)?;
        }
        Commands::Fetch => {
            fetch_phase(cli, config, logger).await?;
        }
        Commands::Group { hashes } => {
            let hashes_path = hashes.unwrap_or_else(|| cli.output_path(&config.output.hashes_file));
            let hashes = load_hashes(&hashes_path)?;
            logger.info(&format!("Loaded {} hashes from {}", hashes.len(), hashes_path.display()));
            logger.record_hashes_saved(hashes.len());
            group_phase(cli, config, logger, &hashes)?;
        }
    }

    Ok(())
}

/// Fetch every domain's logo and write the hash, failure and log files
async fn fetch_phase(cli: &Cli, config: &AppConfig, logger: &RunLogger) -> Result<IndexMap<String, PerceptualHash>> {
    let domains = load_domains(&cli.input, &config.input.domain_column)?;
    logger.info(&format!("Loaded {} domains from {}", domains.len(), cli.input.display()));

    let pipeline = LogoPipeline::new(config)?;
    let store = HashStore::new();

    logger.start_progress(domains.len() as u64);
    let report = pipeline.run(&domains, config.fetch.workers, &store, logger).await;
    logger.finish_progress(&format!(
        "Fetch complete: {} of {} logos retrieved, {} failed",
        report.succeeded,
        report.total,
        report.failed.len()
    ));

    let hashes = store.snapshot();
    let hashes_path = cli.output_path(&config.output.hashes_file);
    write_hashes(&hashes, &hashes_path)?;
    logger.record_hashes_saved(hashes.len());
    record_output(logger, &hashes_path);

    if !report.failed.is_empty() {
        let failed_path = cli.output_path(&config.output.failed_file);
        write_failed(&report.failed, &failed_path)?;
        record_output(logger, &failed_path);
    }

    if !report.log_lines.is_empty() {
        let log_path = cli.output_path(&config.output.log_file);
        write_log(&report.log_lines, &log_path)?;
        record_output(logger, &log_path);
    }

    Ok(hashes)
}

/// Cluster the hashes and write the group file
fn group_phase(cli: &Cli, config: &AppConfig, logger: &RunLogger, hashes: &IndexMap<String, PerceptualHash>) -> Result<()> {
    let groups = cluster(hashes, config.grouping.threshold);
    logger.info(&format!(
        "Grouped {} logos into {} groups (threshold {})",
        hashes.len(),
        groups.len(),
        config.grouping.threshold
    ));

    let groups_path = cli.output_path(&config.output.groups_file);
    write_groups(&groups, &groups_path)?;
    logger.record_groups_written(groups.len());
    record_output(logger, &groups_path);
    Ok(())
}

fn record_output(logger: &RunLogger, path: &Path) {
    logger.record_output_file(&path.display().to_string());
}
