use clap::Parser;
use parcel_aoi::batch::{self, LoadedParcel, ParcelJob, ParcelReport};
use parcel_aoi::config::Config;
use parcel_aoi::error::ScoreError;
use parcel_aoi::render;
use parcel_aoi::score::{ParcelInput, ParcelLayers};
use parcel_aoi::types::ParcelStatus;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "parcel_aoi",
    about = "Parcel suitability scoring and AOI window search"
)]
struct Cli {
    /// Parcel JSON files ({"id": ..., "layers": {...}})
    #[arg(required = true)]
    parcels: Vec<PathBuf>,

    /// JSON config file (weights, search constants, acreage)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum AOI size in acres
    #[arg(long)]
    min_acres: Option<f64>,

    /// Maximum AOI size in acres
    #[arg(long)]
    max_acres: Option<f64>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    jobs: Option<usize>,

    /// Per-parcel search deadline in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Write a CSV summary row per parcel
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Show ASCII layout of each winning window and footprint
    #[arg(long)]
    layout: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn load_config(&self) -> Result<Config, String> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?,
            None => Config::default(),
        };
        if let Some(min) = self.min_acres {
            config.min_acres = min;
        }
        if let Some(max) = self.max_acres {
            config.max_acres = max;
        }
        if self.deadline_ms.is_some() {
            config.search.deadline_ms = self.deadline_ms;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn load_parcel(id: &str) -> Result<LoadedParcel, ScoreError> {
    let text = std::fs::read_to_string(id).map_err(|e| ScoreError::Unreadable {
        reason: e.to_string(),
    })?;
    let input: ParcelInput = serde_json::from_str(&text).map_err(|e| ScoreError::Unreadable {
        reason: e.to_string(),
    })?;
    Ok(LoadedParcel {
        id: input.id,
        layers: ParcelLayers::from_rows(input.layers)?,
    })
}

fn print_report(report: &ParcelReport, layout: bool) {
    println!("Parcel {}:", report.id);
    match (&report.status, &report.placement) {
        (ParcelStatus::Found, Some(p)) => {
            println!(
                "  score {:.1} @ {} rotated {}° ({} ms)",
                p.score, p.window, p.rotation, report.elapsed_ms
            );
            if layout {
                print!("{}", render::render_window(p));
                if let Some(footprint) = &report.footprint {
                    println!();
                    print!("{}", render::render_footprint(footprint));
                }
            }
        }
        (status, _) => println!("  {}: {}", status.code(), status.detail()),
    }
    println!();
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(cli.log_level())
        .init();

    let config = cli.load_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let jobs: Vec<ParcelJob> = cli
        .parcels
        .iter()
        .map(|path| ParcelJob {
            id: path.display().to_string(),
            size_hint: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        })
        .collect();

    let reports = batch::run(jobs, load_parcel, &config, cli.jobs).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    for report in &reports {
        print_report(report, cli.layout);
    }

    let found = reports
        .iter()
        .filter(|r| matches!(r.status, ParcelStatus::Found))
        .count();
    println!(
        "Summary: {} parcel{}, {} with AOI",
        reports.len(),
        if reports.len() == 1 { "" } else { "s" },
        found,
    );

    if let Some(path) = &cli.summary {
        let written = std::fs::File::create(path)
            .map_err(csv::Error::from)
            .and_then(|file| batch::write_summary(&reports, file));
        if let Err(e) = written {
            eprintln!("Error: {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
