mod config;
mod location;
mod monitor;
mod notify;
mod store;
mod transfer;
mod web;

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::Config;
use crate::location::{to_datetime, LocationSample};
use crate::monitor::{LocationMonitor, RemoteSensor, SensorEvent};
use crate::notify::NotificationCenter;
use crate::store::{PointWriter, Storage};

#[derive(Parser)]
#[command(name = "locus")]
#[command(about = "Battery-aware location tracking with daily CSV transfer")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "locus.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Write one CSV file per day under <data_root>/export
    Export {
        /// Rewrite closed days that already have a file
        #[arg(long)]
        force: bool,
    },
    /// Load every CSV file under <data_root>/import
    Import {
        /// Keep stored points that overlap the imported files
        #[arg(long)]
        no_override: bool,
    },
    /// Print the oldest and newest stored timestamps
    Bounds,
    /// Feed recorded fixes from a CSV file through the monitor
    Replay { csv: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Export { force } => export(&config, force),
        Commands::Import { no_override } => import(&config, !no_override),
        Commands::Bounds => bounds(&config),
        Commands::Replay { csv } => replay(config, &csv).await,
    }
}

fn open_storage(config: &Config) -> Option<Storage> {
    match Storage::open(config.storage.path.clone()) {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!(
                "Error opening track store {}: {}",
                config.storage.path.display(),
                e
            );
            None
        }
    }
}

async fn serve(config: Config) -> ExitCode {
    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn export(config: &Config, force: bool) -> ExitCode {
    let Some(storage) = open_storage(config) else {
        return ExitCode::FAILURE;
    };

    match transfer::export_with_calendar(
        &storage,
        &config.storage.data_root,
        config.export.calendar,
        chrono::Utc::now(),
        force,
    ) {
        Ok(report) => {
            println!(
                "Exported {} day files ({} unchanged)",
                report.written, report.skipped
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn import(config: &Config, override_existing: bool) -> ExitCode {
    let Some(storage) = open_storage(config) else {
        return ExitCode::FAILURE;
    };
    let notifications =
        NotificationCenter::new(config.notifications.authorized, config.notifications.history);

    match transfer::import_all(
        &storage,
        &config.storage.data_root,
        &notifications,
        override_existing,
    ) {
        Ok(report) => {
            for file in &report.imported {
                println!("  {}: {} points ({} replaced)", file.file, file.points, file.replaced);
            }
            for file in &report.failed {
                println!("  {}: FAILED {}", file.file, file.error);
            }
            if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Import failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn bounds(config: &Config) -> ExitCode {
    let Some(storage) = open_storage(config) else {
        return ExitCode::FAILURE;
    };

    let Some(max) = storage.max_timestamp() else {
        println!("No points stored");
        return ExitCode::SUCCESS;
    };
    let min = storage.min_timestamp();

    let describe = |t: f64| match to_datetime(t) {
        Some(dt) => format!("{} ({})", t, dt.to_rfc3339()),
        None => t.to_string(),
    };
    println!("{} points", storage.len());
    println!("  oldest: {}", describe(min));
    println!("  newest: {}", describe(max));
    ExitCode::SUCCESS
}

async fn replay(config: Config, csv_path: &Path) -> ExitCode {
    let content = match fs::read_to_string(csv_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let samples: Vec<LocationSample> = match transfer::csv::parse(&content) {
        Ok(points) => points.into_iter().map(LocationSample::from).collect(),
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(storage) = open_storage(&config) else {
        return ExitCode::FAILURE;
    };
    let storage = Arc::new(storage);
    let before = storage.len();

    let notifications =
        NotificationCenter::new(config.notifications.authorized, config.notifications.history);
    let (writer, writer_task) = PointWriter::spawn(storage.clone());
    let mut monitor = LocationMonitor::start(
        RemoteSensor::new(),
        Arc::new(notifications.clone()),
        config.monitor.clone(),
        config.filter.clone(),
        Box::new(writer),
    );

    for sample in &samples {
        monitor.handle(SensorEvent::SampleArrived(*sample));
    }
    let status = monitor.status();
    drop(monitor);

    if !store::drain(writer_task).await {
        eprintln!("Writer task failed, some points were not stored");
        return ExitCode::FAILURE;
    }

    println!(
        "Replayed {} fixes, stored {} points, monitor ended in {:?}",
        samples.len(),
        storage.len() - before,
        status.mode
    );
    if let Some(dt) = status.last_accepted.and_then(|p| p.datetime()) {
        println!("  last accepted at {}", dt.to_rfc3339());
    }
    for n in notifications.recent().iter().rev() {
        println!("  [{}] {} {}", n.created_at.to_rfc3339(), n.title, n.body);
    }
    ExitCode::SUCCESS
}
