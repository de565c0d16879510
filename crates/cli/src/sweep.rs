use std::io::Write;
use std::path::PathBuf;

use rayon::prelude::*;

use apexsim_shared::*;
use apexsim_sim::SimulationCore;

/// A sweepable car parameter with its range and accessor.
struct SweepParam {
    name: &'static str,
    min: f32,
    default: f32,
    max: f32,
    /// Apply this parameter value to a CarConfig.
    apply: fn(&mut CarConfig, f32),
}

const SWEEP_PARAMS: &[SweepParam] = &[
    SweepParam {
        name: "mass_kg",
        min: 650.0,
        default: 798.0,
        max: 950.0,
        apply: |c, v| c.mass_kg = v,
    },
    SweepParam {
        name: "cla",
        min: 2.0,
        default: 3.2,
        max: 4.5,
        apply: |c, v| c.cla = v,
    },
    SweepParam {
        name: "cda",
        min: 0.8,
        default: 1.12,
        max: 1.5,
        apply: |c, v| c.cda = v,
    },
    SweepParam {
        name: "mu_long",
        min: 1.2,
        default: 1.85,
        max: 2.4,
        apply: |c, v| c.mu_long = v,
    },
    SweepParam {
        name: "mu_lat",
        min: 1.4,
        default: 2.1,
        max: 2.8,
        apply: |c, v| c.mu_lat = v,
    },
    SweepParam {
        name: "brake_force_max_n",
        min: 12_000.0,
        default: 18_500.0,
        max: 24_000.0,
        apply: |c, v| c.brake_force_max_n = v,
    },
    SweepParam {
        name: "rolling_resistance_n",
        min: 80.0,
        default: 180.0,
        max: 320.0,
        apply: |c, v| c.rolling_resistance_n = v,
    },
    SweepParam {
        name: "steer_gain",
        min: 0.1,
        default: 0.22,
        max: 0.4,
        apply: |c, v| c.steer_gain = v,
    },
];

struct SweepResult {
    value: f32,
    best_lap_time_s: f32,
    mean_lap_time_s: f32,
    laps_completed: u32,
}

/// One independent core per job; instances share nothing, so the jobs
/// parallelise freely.
fn run_job(param: &SweepParam, value: f32, laps: u32) -> SweepResult {
    let mut car = CarConfig::default();
    (param.apply)(&mut car, value);

    let sim = SimConfig::default();
    let track = TrackConfig::default();
    let result = match SimulationCore::new(&sim, &car, &track) {
        Ok(mut core) => {
            core.set_car_count(1);
            core.run_batch_laps(0, laps)
        }
        Err(_) => BatchLapResult::default(),
    };

    SweepResult {
        value,
        best_lap_time_s: result.best_lap_time_s,
        mean_lap_time_s: result.mean_lap_time_s,
        laps_completed: result.laps_completed,
    }
}

fn sweep_param(param: &SweepParam, steps: usize, laps: u32) -> Vec<SweepResult> {
    let values: Vec<f32> = if steps == 1 {
        vec![param.default]
    } else {
        (0..steps)
            .map(|i| param.min + (param.max - param.min) * i as f32 / (steps - 1) as f32)
            .collect()
    };

    values
        .par_iter()
        .map(|&value| run_job(param, value, laps))
        .collect()
}

fn print_param_table(param_name: &str, results: &[SweepResult]) {
    println!("\n--- {param_name} ---");
    println!("{:>12} {:>10} {:>10} {:>6}", "value", "best", "mean", "laps");
    println!("{:-<42}", "");

    let best_idx = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.laps_completed > 0)
        .min_by(|(_, a), (_, b)| {
            a.best_lap_time_s
                .partial_cmp(&b.best_lap_time_s)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i);

    for (i, r) in results.iter().enumerate() {
        let marker = if Some(i) == best_idx { " *" } else { "" };
        println!(
            "{:>12.3} {:>10.3} {:>10.3} {:>6}{}",
            r.value, r.best_lap_time_s, r.mean_lap_time_s, r.laps_completed, marker,
        );
    }
}

fn write_csv(path: &std::path::Path, all_results: &[(&str, Vec<SweepResult>)]) {
    let mut file = match std::fs::File::create(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to create CSV file: {e}");
            std::process::exit(1);
        }
    };

    let mut write_all = || -> std::io::Result<()> {
        writeln!(file, "parameter,value,best_lap_time_s,mean_lap_time_s,laps")?;
        for (param_name, results) in all_results {
            for r in results {
                writeln!(
                    file,
                    "{},{:.4},{:.4},{:.4},{}",
                    param_name, r.value, r.best_lap_time_s, r.mean_lap_time_s, r.laps_completed,
                )?;
            }
        }
        Ok(())
    };
    if let Err(e) = write_all() {
        eprintln!("Failed to write CSV: {e}");
        std::process::exit(1);
    }
    println!("\nCSV written to {}", path.display());
}

pub fn cmd_sweep(param_filter: Option<&str>, steps: usize, laps: u32, output: Option<PathBuf>) {
    let params_to_sweep: Vec<&SweepParam> = if let Some(name) = param_filter {
        match SWEEP_PARAMS.iter().find(|p| p.name == name) {
            Some(p) => vec![p],
            None => {
                eprintln!(
                    "Unknown parameter '{}'. Available: {}",
                    name,
                    SWEEP_PARAMS
                        .iter()
                        .map(|p| p.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                std::process::exit(1);
            }
        }
    } else {
        SWEEP_PARAMS.iter().collect()
    };

    println!(
        "=== Lap-Time Sweep ===\nParams: {} | Values each: {} | Laps per value: {}",
        params_to_sweep.len(),
        steps,
        laps,
    );

    let start = std::time::Instant::now();

    let mut all_results: Vec<(&str, Vec<SweepResult>)> = Vec::new();
    for param in &params_to_sweep {
        let results = sweep_param(param, steps, laps);
        print_param_table(param.name, &results);
        all_results.push((param.name, results));
    }

    println!("\nDone in {:.1}s", start.elapsed().as_secs_f32());

    if let Some(path) = &output {
        write_csv(path, &all_results);
    }
}
