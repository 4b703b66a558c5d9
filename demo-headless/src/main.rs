use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use landslide_ews_core::core_types::{SensorFeed, SensorReading, SourceType, Vec2};
use landslide_ews_core::grid::{FieldData, GridCoords, TerrainGrid};
use landslide_ews_core::preprocess::TextureFields;
use landslide_ews_core::backtest::DEFAULT_DECISION_THRESHOLD;
use landslide_ews_core::rainfall::DownscaleMode;
use landslide_ews_core::risk::AlertOutcome;
use landslide_ews_core::{
    alert_lead_time_hours, compute_metrics, BackgroundRain, CycleInput, EarlyWarningEngine,
    EwsConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::path::PathBuf;

/// Landslide early-warning demo on a synthetic hillside storm
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
#[command(name = "ews-demo")]
#[command(about = "Runs the early-warning cycle through a synthetic storm", long_about = None)]
struct Args {
    /// Grid cells per side
    #[arg(long, default_value_t = 64)]
    size: usize,

    /// Cell size in meters
    #[arg(long, default_value_t = 10.0)]
    cell_size: f32,

    /// Hill height above the valley floor (m)
    #[arg(long, default_value_t = 250.0)]
    hill_height: f32,

    /// Number of cycles to run
    #[arg(short, long, default_value_t = 12)]
    cycles: u32,

    /// Minutes between cycles
    #[arg(long, default_value_t = 60)]
    cycle_minutes: i64,

    /// Peak gauge rain rate (mm/hr)
    #[arg(short, long, default_value_t = 45.0)]
    peak_rain: f32,

    /// Add a gauge that reports implausible spikes
    #[arg(long)]
    faulty_gauge: bool,

    /// Feed a coarse satellite product as the fusion background
    #[arg(long)]
    satellite: bool,

    /// RNG seed for gauge noise
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// JSON file overriding the default configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print one JSON status line per cycle instead of the table
    #[arg(long)]
    json: bool,

    /// Score the peak risk grid against the cells that end up failing
    #[arg(short, long)]
    validate: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let config: EwsConfig = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            config.validate()?;
            config
        }
        None => EwsConfig::default(),
    };
    let cycle_hours = args.cycle_minutes as f32 / 60.0;
    let config = EwsConfig {
        cycle: landslide_ews_core::CycleConfig {
            cycle_hours,
            ..config.cycle
        },
        ..config
    };

    if !args.json {
        println!("=== Landslide Early-Warning Demo ===\n");
    }

    let extent = args.size as f32 * args.cell_size;
    let terrain = TerrainGrid::single_hill(
        args.size,
        args.size,
        args.cell_size,
        300.0,
        args.hill_height,
        extent / 4.0,
    )?;
    let coords = GridCoords::regular(args.size, args.size, args.cell_size);
    // Silty loam over the whole hill
    let texture = TextureFields::uniform(args.size, args.size, 18.0, 30.0, 52.0, 130.0);
    let mut engine = EarlyWarningEngine::from_texture(terrain, coords, &texture, config)?;

    if !args.json {
        let slope = engine.terrain().slope();
        println!(
            "Terrain: {}x{} cells at {:.0}m, slope {:.1}..{:.1} deg",
            args.size,
            args.size,
            args.cell_size,
            slope.min().unwrap_or(0.0),
            slope.max().unwrap_or(0.0)
        );
        println!(
            "Storm: {} cycles of {} min, peak {:.0} mm/hr{}{}\n",
            args.cycles,
            args.cycle_minutes,
            args.peak_rain,
            if args.faulty_gauge { ", faulty gauge" } else { "" },
            if args.satellite { ", satellite background" } else { "" }
        );
        println!("Time  | Active | Max risk | High cells | Clusters | Alert");
        println!("------|--------|----------|------------|----------|------------------");
    }

    let start = Utc.with_ymd_and_hms(2025, 7, 14, 0, 0, 0).single().ok_or("bad start time")?;
    let step = Duration::minutes(args.cycle_minutes);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut alert_times = Vec::new();
    let mut peak_risk: Option<FieldData> = None;
    let mut peak_max = f32::NEG_INFINITY;
    let mut final_fos = None;

    for i in 0..args.cycles {
        let now = start + step * i as i32;
        let rain = hyetograph(i, args.cycles, args.peak_rain);
        let sensors = gauge_feed(extent, rain, now, args.faulty_gauge && i % 3 == 1, &mut rng);
        let background = args.satellite.then(|| BackgroundRain::Coarse {
            grid: FieldData::with_value(4, 4, rain * 0.8),
            cell_size: extent / 4.0,
            source: SourceType::Satellite,
            mode: DownscaleMode::Stochastic {
                seed: Some(args.seed + u64::from(i)),
            },
        });

        let report = engine.run_cycle(CycleInput {
            timestamp: now,
            sensors,
            background,
        })?;

        if report.outcome.is_alert() {
            alert_times.push(now);
        }
        if report.summary.max_risk > peak_max {
            peak_max = report.summary.max_risk;
            peak_risk = Some(report.risk.clone());
        }

        if args.json {
            println!("{}", serde_json::to_string(&report.status)?);
        } else {
            let alert = match &report.outcome {
                AlertOutcome::Clear => String::from("-"),
                AlertOutcome::Sent(messages) => format!("SENT x{}", messages.len()),
                AlertOutcome::Suppressed {
                    remaining_seconds, ..
                } => format!("held ({remaining_seconds}s)"),
            };
            println!(
                "{} | {:6} | {:8.3} | {:10} | {:8} | {}",
                now.format("%H:%M"),
                report.status.active_sensors,
                report.summary.max_risk,
                report.summary.high_risk_cells,
                report.clusters.len(),
                alert
            );
        }
        final_fos = Some(report.fos);
    }

    if args.json {
        return Ok(());
    }

    println!("\n=== Outbox ===");
    let outbox = engine.dispatcher_mut().drain_outbox();
    if outbox.is_empty() {
        println!("(no messages)");
    }
    for entry in &outbox {
        println!(
            "{} [{:3}] {}",
            entry.timestamp.format("%H:%M"),
            entry.message.chars().count(),
            entry.message
        );
    }

    if args.validate {
        if let (Some(risk), Some(fos)) = (peak_risk, final_fos) {
            run_validation(&risk, &fos, &alert_times, start + step * (args.cycles as i32 / 2))?;
        }
    }
    Ok(())
}

/// Triangular storm: dry start, peak halfway, dry again at the end.
fn hyetograph(cycle: u32, cycles: u32, peak: f32) -> f32 {
    let half = (cycles.max(2) / 2) as f32;
    let distance = (cycle as f32 - half).abs() / half;
    (peak * (1.0 - distance)).max(0.0)
}

/// 3x3 gauge network with a few percent of measurement noise.
fn gauge_feed(
    extent: f32,
    rain: f32,
    now: DateTime<Utc>,
    spike: bool,
    rng: &mut StdRng,
) -> SensorFeed {
    let mut feed = SensorFeed::default();
    for row in 0..3 {
        for col in 0..3 {
            let id = format!("RG-{row}{col}");
            let location = Vec2::new(
                (col as f32 + 0.5) * extent / 3.0,
                (row as f32 + 0.5) * extent / 3.0,
            );
            let value = (rain * (1.0 + rng.random_range(-0.05..0.05))).max(0.0);
            feed.insert(id.clone(), SensorReading::new(id, location, value, now));
        }
    }
    if spike {
        let location = Vec2::new(extent * 0.45, extent * 0.55);
        feed.insert(
            "RG-FAULT".to_string(),
            SensorReading::new("RG-FAULT", location, 480.0, now),
        );
    }
    feed
}

fn run_validation(
    peak_risk: &FieldData,
    final_fos: &FieldData,
    alert_times: &[DateTime<Utc>],
    event_time: DateTime<Utc>,
) -> Result<(), Box<dyn Error>> {
    println!("\n=== Backtest ===\n");
    let observed: Vec<bool> = final_fos.as_slice().iter().map(|&f| f < 1.0).collect();
    let failures = observed.iter().filter(|&&o| o).count();
    println!("Cells with FoS < 1 at storm end: {failures}");

    let metrics = compute_metrics(&observed, peak_risk, DEFAULT_DECISION_THRESHOLD)?;
    println!(
        "Precision {:.3}  Recall {:.3}  F1 {:.3}  AUC {:.3}",
        metrics.precision, metrics.recall, metrics.f1, metrics.auc
    );
    println!(
        "Lead time before storm peak: {:.1} h",
        alert_lead_time_hours(alert_times, event_time)
    );
    Ok(())
}
