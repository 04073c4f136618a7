//! Beacon CLI - command line front end for landmark localization runs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use beacon_core::Pose;
use beacon_sim::{run_scenario, FilterResult, ScenarioConfig, SweepParam, PRESETS};
use clap::{Parser, ValueEnum};
use tracing::info;

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::parse_from(args);
    run(args)
}

#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Planar landmark localization with an extended Kalman filter")]
#[command(version)]
pub struct Args {
    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    // ── Scenario ──────────────────────────────────────────────
    /// Scenario JSON file; overrides --preset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in scenario (convergence, arena)
    #[arg(short, long, default_value = "convergence")]
    preset: String,

    #[arg(long)]
    steps: Option<usize>,

    // ── Sensor options ────────────────────────────────────────
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    noise_scale: Option<f64>,

    /// Landmarks farther than this are not observed
    #[arg(long)]
    max_range: Option<f64>,

    // ── Filter options ────────────────────────────────────────
    /// Use the Joseph form covariance update
    #[arg(long)]
    joseph: bool,

    /// Accept every innovation regardless of its NIS
    #[arg(long)]
    no_gate: bool,

    /// Draws from the final belief written to the summary
    #[arg(long)]
    samples: Option<usize>,

    // ── Sweep options ──────────────────────────────────────────
    /// Sweep one parameter instead of a single run
    #[arg(long)]
    sweep: Option<SweepParam>,

    #[arg(long, default_value_t = 5)]
    sweep_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

pub fn run(args: Args) -> Result<()> {
    let scenario = build_scenario(&args)?;
    info!(
        scenario = %scenario.name,
        steps = scenario.steps,
        landmarks = scenario.landmarks.len(),
        "beacon localization"
    );

    match args.sweep {
        Some(param) => run_sweep(&args, &scenario, param),
        None => run_single(&args, &scenario),
    }
}

// ---------------------------------------------------------------------------
// Single Run
// ---------------------------------------------------------------------------
fn run_single(args: &Args, scenario: &ScenarioConfig) -> Result<()> {
    let result = run_scenario(scenario)
        .with_context(|| format!("running scenario {:?}", scenario.name))?;

    info!(
        rmse = result.rmse(),
        final_error = result.final_position_error().unwrap_or(0.0),
        final_trace = result.final_trace(),
        skipped = result.skipped.iter().sum::<usize>(),
        "run complete"
    );

    write_output(args, &result)
}

// ---------------------------------------------------------------------------
// Sweep Run
// ---------------------------------------------------------------------------
fn run_sweep(args: &Args, base: &ScenarioConfig, param: SweepParam) -> Result<()> {
    if args.sweep_steps == 0 {
        bail!("--sweep-steps must be at least 1");
    }
    let spec = param.spec();
    info!(param = %param, min = spec.min, max = spec.max, "sweeping {}", spec.label);

    let mut rows = Vec::with_capacity(args.sweep_steps);
    for (i, value) in spec.linspace(args.sweep_steps).into_iter().enumerate() {
        let mut scenario = base.clone();
        scenario.apply(param, value)?;
        let res = run_scenario(&scenario)
            .with_context(|| format!("sweep run {param} = {value}"))?;

        info!(
            run = i + 1,
            of = args.sweep_steps,
            value,
            rmse = res.rmse(),
            final_error = res.final_position_error().unwrap_or(0.0),
            "sweep point"
        );
        rows.push(SweepRow {
            value,
            rmse: res.rmse(),
            final_error: res.final_position_error().unwrap_or(0.0),
            final_trace: res.final_trace(),
        });
    }

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let path = match args.format {
        OutputFormat::Csv => {
            let path = args.output_dir.join("sweep_summary.csv");
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([param.name(), "rmse", "final_error", "final_trace"])?;
            for row in &rows {
                wtr.write_record([
                    format!("{:.6}", row.value),
                    format!("{:.6}", row.rmse),
                    format!("{:.6}", row.final_error),
                    format!("{:.6}", row.final_trace),
                ])?;
            }
            wtr.flush()?;
            path
        }
        OutputFormat::Json => {
            let path = args.output_dir.join("sweep_summary.json");
            let json = serde_json::json!({
                "param": param.name(),
                "runs": rows.iter().map(|r| serde_json::json!({
                    "value": r.value,
                    "rmse": r.rmse,
                    "final_error": r.final_error,
                    "final_trace": r.final_trace,
                })).collect::<Vec<_>>(),
            });
            fs::write(&path, serde_json::to_string_pretty(&json)?)?;
            path
        }
    };

    info!(path = %path.display(), "sweep complete");
    Ok(())
}

struct SweepRow {
    value: f64,
    rmse: f64,
    final_error: f64,
    final_trace: f64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scenario from file or preset, with command line flags applied on top.
fn build_scenario(args: &Args) -> Result<ScenarioConfig> {
    let mut scenario = match &args.config {
        Some(path) => ScenarioConfig::from_path(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => ScenarioConfig::preset(&args.preset).with_context(|| {
            format!("choose a scenario file or one of: {}", PRESETS.join(", "))
        })?,
    };

    if let Some(steps) = args.steps {
        scenario.steps = steps;
    }
    if let Some(seed) = args.seed {
        scenario.sensor.seed = seed;
    }
    if let Some(scale) = args.noise_scale {
        scenario.apply(SweepParam::SensorNoise, scale)?;
    }
    if args.max_range.is_some() {
        scenario.sensor.max_range = args.max_range;
    }
    if args.joseph {
        scenario.covariance_update = beacon_sim::CovarianceForm::Joseph;
    }
    if args.no_gate {
        scenario.innovation_gate = None;
    }
    if let Some(samples) = args.samples {
        scenario.samples = samples;
    }
    Ok(scenario)
}

fn pose_cells(p: &Pose) -> [String; 3] {
    [
        format!("{:.4}", p.x),
        format!("{:.4}", p.y),
        format!("{:.4}", p.z),
    ]
}

fn write_output(args: &Args, res: &FilterResult) -> Result<()> {
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let path = match args.format {
        OutputFormat::Csv => write_trajectory_csv(&args.output_dir, res)?,
        OutputFormat::Json => write_trajectory_json(&args.output_dir, res)?,
    };
    info!(path = %path.display(), "trajectory written");

    let summary_path = args.output_dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&res.summary())?)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    info!(path = %summary_path.display(), "summary written");
    Ok(())
}

fn write_trajectory_csv(dir: &Path, res: &FilterResult) -> Result<PathBuf> {
    let path = dir.join("trajectory.csv");
    let mut wtr = csv::Writer::from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;

    wtr.write_record([
        "time",
        // Truth
        "true_x",
        "true_y",
        "true_phi",
        // Filter estimate
        "est_x",
        "est_y",
        "est_phi",
        "cov_trace",
        "applied",
        "skipped",
    ])?;

    for i in 0..res.len() {
        let [tx, ty, tphi] = pose_cells(&res.truth[i]);
        let [ex, ey, ephi] = pose_cells(&res.estimate[i]);
        wtr.write_record([
            format!("{:.4}", res.time[i]),
            tx,
            ty,
            tphi,
            ex,
            ey,
            ephi,
            format!("{:.6}", res.covariance_trace[i]),
            res.applied[i].to_string(),
            res.skipped[i].to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(path)
}

fn write_trajectory_json(dir: &Path, res: &FilterResult) -> Result<PathBuf> {
    let path = dir.join("trajectory.json");
    let rows: Vec<_> = (0..res.len())
        .map(|i| {
            let (t, e) = (&res.truth[i], &res.estimate[i]);
            serde_json::json!({
                "time": res.time[i],
                "truth": [t.x, t.y, t.z],
                "estimate": [e.x, e.y, e.z],
                "cov_trace": res.covariance_trace[i],
                "applied": res.applied[i],
                "skipped": res.skipped[i],
            })
        })
        .collect();
    fs::write(&path, serde_json::to_string_pretty(&rows)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
