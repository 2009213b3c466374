use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use gasdrift::grid::{sample_points, Spacing};
use gasdrift::{
    evaluate_at, Axis, Conditions, Engine, EngineConfig, FixedValues, GasRepository, Medium,
    Settings, SweepRequest,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Electron drift velocity curves for gas mixtures", long_about = None)]
struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep one axis and print the drift velocity curve.
    Sweep(SweepArgs),
    /// Print a gas file's conditions and table summary.
    Show {
        /// Gas file, relative to the gas directory or absolute
        gas: PathBuf,

        /// Also evaluate the drift velocity at this field [V/cm]
        #[arg(long)]
        field: Option<f64>,

        /// Pressure for the evaluation [bar]; the gas's reference when omitted
        #[arg(long, requires = "field")]
        pressure: Option<f64>,

        /// Temperature for the evaluation [K]; the gas's reference when omitted
        #[arg(long, requires = "field")]
        temperature: Option<f64>,
    },
    /// List gas files.
    Gases {
        /// List the remote archive instead of the local directory
        #[arg(long)]
        remote: bool,
    },
    /// Download the remote archive into the local gas directory.
    Fetch,
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Gas file, relative to the gas directory or absolute
    gas: PathBuf,

    /// Swept axis: field, pressure or temperature
    #[arg(short, long)]
    axis: Option<Axis>,

    #[arg(long)]
    start: Option<f64>,

    #[arg(long)]
    stop: Option<f64>,

    /// Number of samples
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// linear or log
    #[arg(long)]
    spacing: Option<Spacing>,

    /// Fixed electric field [V/cm]
    #[arg(long)]
    field: Option<f64>,

    /// Fixed pressure [bar]; the gas's current pressure when omitted
    #[arg(long)]
    pressure: Option<f64>,

    /// Fixed temperature [K]; the gas's current temperature when omitted
    #[arg(long)]
    temperature: Option<f64>,

    /// Print JSON instead of CSV
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SweepOutput<'a> {
    gas: &'a str,
    axis: Axis,
    fixed: FixedValues,
    x: &'a [f64],
    y: &'a [f64],
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings =
        Settings::load_or_default(cli.config.as_deref()).context("loading settings")?;
    settings.gas_dir = EngineConfig::gas_dir_or(settings.gas_dir);

    match cli.command {
        Commands::Sweep(args) => run_sweep(&settings, args),
        Commands::Show {
            gas,
            field,
            pressure,
            temperature,
        } => {
            let engine = start_engine(&settings)?;
            let mut gas = engine
                .load_gas(&gas)
                .with_context(|| format!("loading {}", gas.display()))?;
            println!("{}", gas.summary());
            if let Some(field) = field {
                let mut at = Conditions::current(&gas, field);
                at.pressure = pressure.unwrap_or(at.pressure);
                at.temperature = temperature.unwrap_or(at.temperature);
                let v = evaluate_at(&mut gas, &at)?;
                println!(
                    "  drift velocity at {} V/cm, {} bar, {} K: {v:.6} cm/\u{b5}s",
                    at.electric_field, at.pressure, at.temperature
                );
            }
            Ok(())
        }
        Commands::Gases { remote } => {
            let repo = GasRepository::new(&settings.gas_dir, &settings.remote_url);
            if remote {
                for url in repo.list_remote_urls().await.context("listing remote archive")? {
                    println!("{url}");
                }
            } else {
                for path in repo.list_local_files()? {
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
        Commands::Fetch => {
            let repo = GasRepository::new(&settings.gas_dir, &settings.remote_url);
            info!("fetching gas files from {}", repo.remote_url());
            let written = repo.fetch_all().await.context("fetching gas files")?;
            info!("{} gas files written to {:?}", written.len(), repo.local_dir());
            Ok(())
        }
    }
}

fn start_engine(settings: &Settings) -> Result<Engine> {
    Ok(Engine::initialize(
        EngineConfig::default().with_gas_dir(&settings.gas_dir),
    )?)
}

fn run_sweep(settings: &Settings, args: SweepArgs) -> Result<()> {
    let d = &settings.defaults;
    let axis = args.axis.unwrap_or(d.axis);
    let (start, stop) = match (args.start, args.stop) {
        (Some(a), Some(b)) => (a, b),
        (None, None) if axis == d.axis => (d.start, d.stop),
        _ => bail!("--start and --stop are required when sweeping {axis}"),
    };
    let spacing = args.spacing.unwrap_or(if axis == d.axis {
        d.spacing
    } else {
        Spacing::Linear
    });
    let values = sample_points(start, stop, args.count.unwrap_or(d.count), spacing)?;

    let fixed = FixedValues {
        electric_field: match axis {
            Axis::ElectricField => None,
            _ => Some(args.field.unwrap_or(d.electric_field)),
        },
        pressure: args.pressure,
        temperature: args.temperature,
    };

    let engine = start_engine(settings)?;
    let mut gas = engine
        .load_gas(&args.gas)
        .with_context(|| format!("loading {}", args.gas.display()))?;
    info!("{gas}");

    let curve = SweepRequest::new(axis, values).fixed(fixed).run(&mut gas)?;

    if args.json {
        let out = SweepOutput {
            gas: gas.name(),
            axis,
            fixed,
            x: &curve.x,
            y: &curve.y,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{},drift_velocity_cm_per_us", axis.as_str());
        for (x, y) in curve.points() {
            println!("{x},{y}");
        }
    }
    Ok(())
}
