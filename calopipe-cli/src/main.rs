//! calopipe command-line interface.
//!
//! Inspects detector layouts and defect tables, and runs synthetic
//! single-electron events through the full digitization and reconstruction
//! chain.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use calopipe_digit::{Defect, DefectIndex, DefectTable};
use calopipe_geometry::DetectorLayout;
use calopipe_run::{ElectronGun, GunConfig, Pipeline, PipelineConfig, RunOptions};
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] calopipe_geometry::Error),

    #[error("Digitization error: {0}")]
    Digit(#[from] calopipe_digit::Error),

    #[error("Pipeline error: {0}")]
    Run(#[from] calopipe_run::Error),

    #[error("Core error: {0}")]
    Core(#[from] calopipe_core::StoreError),
}

/// Calorimeter digitization and reconstruction.
#[derive(Parser)]
#[command(name = "calopipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the eta/phi lattice of every volume
    Geometry {
        /// Geometry document (built-in barrel when omitted)
        #[arg(short, long)]
        layout: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a defect table against a layout
    Defects {
        /// Defect table document
        table: PathBuf,

        /// Geometry document (built-in barrel when omitted)
        #[arg(short, long)]
        layout: Option<PathBuf>,

        /// Report the affected cells of this event number
        #[arg(short, long)]
        event: Option<u64>,
    },

    /// Run synthetic single-electron events through the chain
    Simulate {
        /// Number of events
        #[arg(short = 'n', long, default_value = "10")]
        events: usize,

        /// Worker threads (0 = all cores)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Pipeline configuration document
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Geometry document (built-in barrel when omitted)
        #[arg(short, long)]
        layout: Option<PathBuf>,

        /// Defect table; enables defect injection
        #[arg(short, long)]
        defects: Option<PathBuf>,

        /// Electron energy (MeV)
        #[arg(long, default_value = "50000.0")]
        energy: f64,

        /// Largest |eta| of the generated electrons
        #[arg(long, default_value = "0.5")]
        max_eta: f64,

        /// Run seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write the electron candidates of every event as JSON lines
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct VolumeSummary<'a> {
    name: &'a str,
    sampling: &'static str,
    module: u32,
    collection_key: &'a str,
    orientation: String,
    n_eta: u32,
    n_phi: u32,
    eta_min: f64,
    eta_max: f64,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "calopipe=debug" } else { "calopipe=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_layout(path: Option<&Path>) -> Result<DetectorLayout> {
    Ok(match path {
        Some(path) => DetectorLayout::from_file(path)?,
        None => DetectorLayout::reference_barrel()?,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Geometry { layout, json } => {
            let layout = load_layout(layout.as_deref())?;
            let volumes: Vec<VolumeSummary> = layout
                .volumes()
                .iter()
                .map(|v| VolumeSummary {
                    name: v.name(),
                    sampling: v.sampling().name(),
                    module: v.module(),
                    collection_key: v.collection_key(),
                    orientation: format!("{:?}", v.orientation()),
                    n_eta: v.n_eta(),
                    n_phi: v.n_phi(),
                    eta_min: v.eta_min(),
                    eta_max: v.eta_max(),
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&volumes)?);
            } else {
                println!(
                    "{:<12} {:<9} {:>6} {:<8} {:>6} {:>6} {:>9} {:>9}",
                    "volume", "sampling", "module", "layout", "n_eta", "n_phi", "eta_min", "eta_max"
                );
                for v in &volumes {
                    println!(
                        "{:<12} {:<9} {:>6} {:<8} {:>6} {:>6} {:>9.4} {:>9.4}",
                        v.name, v.sampling, v.module, v.orientation, v.n_eta, v.n_phi, v.eta_min, v.eta_max
                    );
                }
                println!("Total cells: {}", layout.n_cells());
            }
        }

        Commands::Defects {
            table,
            layout,
            event,
        } => {
            let layout = load_layout(layout.as_deref())?;
            let table = DefectTable::from_file(&table)?;
            let index = DefectIndex::build(&table, |name| layout.module_index(name))?;
            println!("Rules: {}", index.len());
            for (i, rule) in table.runs.iter().enumerate() {
                println!(
                    "  [{}] events {}..={} {} targets={}",
                    i,
                    rule.start_event,
                    rule.end_event,
                    if rule.dead_modules {
                        "dead".to_string()
                    } else {
                        format!("noise x{}", rule.noise_std_factor)
                    },
                    rule.cells.len()
                );
            }

            if let Some(event) = event {
                println!("Event {}:", event);
                for volume in layout.volumes() {
                    let (mut dead, mut noisy) = (0usize, 0usize);
                    for (id, _) in volume.cells() {
                        match index.lookup(event, id.hash()) {
                            Some(Defect::Dead) => dead += 1,
                            Some(Defect::Noisy { .. }) => noisy += 1,
                            None => {}
                        }
                    }
                    if dead + noisy > 0 {
                        println!("  {:<12} dead={} noisy={}", volume.name(), dead, noisy);
                    }
                }
            }
        }

        Commands::Simulate {
            events,
            threads,
            config,
            layout,
            defects,
            energy,
            max_eta,
            seed,
            output,
        } => {
            let layout = Arc::new(load_layout(layout.as_deref())?);
            let mut config = match config {
                Some(path) => PipelineConfig::from_file(path)?,
                None => PipelineConfig::default(),
            }
            .with_run_seed(seed);
            let table = match defects {
                Some(path) => {
                    config = config.with_defects(true);
                    Some(DefectTable::from_file(path)?)
                }
                None => None,
            };

            let pipeline = Pipeline::new(config, Arc::clone(&layout), table.as_ref())?;
            let gun = ElectronGun::new(
                GunConfig::default()
                    .with_energy(energy)
                    .with_eta_range(-max_eta, max_eta)
                    .with_seed(seed),
                pipeline.config().keys.clone(),
                Arc::clone(&layout),
            )?;

            let start = Instant::now();
            let options = RunOptions::default()
                .with_threads(threads)
                .with_keep_stores(output.is_some());
            let run = pipeline.run_events(events, &options, |i| gun.event(i))?;
            let elapsed = start.elapsed();
            info!(
                seconds = elapsed.as_secs_f64(),
                events_per_second = events as f64 / elapsed.as_secs_f64().max(1e-9),
                "Simulation done"
            );

            if let Some(path) = output {
                let mut writer = BufWriter::new(File::create(&path)?);
                let key = &pipeline.config().keys.electrons;
                for outcome in &run.events {
                    let Some(store) = &outcome.store else {
                        continue;
                    };
                    if outcome.result.is_err() {
                        continue;
                    }
                    let electrons = store.electrons(key)?;
                    serde_json::to_writer(&mut writer, electrons)?;
                    writeln!(writer)?;
                }
                writer.flush()?;
                info!(path = %path.display(), "Wrote electron candidates");
            }

            println!("{}", serde_json::to_string_pretty(&run.summary)?);
        }
    }

    Ok(())
}
