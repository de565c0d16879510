mod sweep;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use apexsim_shared::*;
use apexsim_sim::{load_scenario, Scenario, SimulationCore};

#[derive(Parser)]
#[command(name = "apexsim", about = "Vehicle simulation core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run self-piloted batch laps for one car
    Laps {
        /// Scenario JSON; library defaults when omitted
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Number of cars on the grid
        #[arg(long, default_value_t = 1)]
        cars: u32,

        /// Which car drives
        #[arg(long, default_value_t = 0)]
        car: u32,

        /// Laps to complete
        #[arg(long, default_value_t = 3)]
        laps: u32,

        /// Output path for the result JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Capture a randomized input stream and verify it replays bit-true
    ReplayCheck {
        /// Scenario JSON; library defaults when omitted
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Steps to record
        #[arg(long, default_value_t = 2000)]
        steps: u32,

        /// Number of cars on the grid
        #[arg(long, default_value_t = 4)]
        cars: u32,

        /// Seed for the input stream
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Sweep one car parameter across its range and compare lap times
    Sweep {
        /// Parameter to sweep; all of them when omitted
        #[arg(long)]
        param: Option<String>,

        /// Values per parameter
        #[arg(long, default_value_t = 7)]
        steps: usize,

        /// Laps per value
        #[arg(long, default_value_t = 2)]
        laps: u32,

        /// Output path for CSV results
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn resolve_scenario(path: Option<&PathBuf>) -> Scenario {
    match path {
        Some(path) => match load_scenario(path) {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("Failed to load scenario: {e}");
                std::process::exit(1);
            }
        },
        None => Scenario::default(),
    }
}

fn build_core(scenario: &Scenario) -> SimulationCore {
    match SimulationCore::new(&scenario.sim, &scenario.car, &scenario.track) {
        Ok(core) => core,
        Err(e) => {
            eprintln!("Failed to build simulation: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Laps {
            scenario,
            cars,
            car,
            laps,
            output,
        } => cmd_laps(scenario.as_ref(), cars, car, laps, output),

        Commands::ReplayCheck {
            scenario,
            steps,
            cars,
            seed,
        } => cmd_replay_check(scenario.as_ref(), steps, cars, seed),

        Commands::Sweep {
            param,
            steps,
            laps,
            output,
        } => sweep::cmd_sweep(param.as_deref(), steps, laps, output),
    }
}

fn cmd_laps(scenario: Option<&PathBuf>, cars: u32, car: u32, laps: u32, output: Option<PathBuf>) {
    let scenario = resolve_scenario(scenario);
    let mut core = build_core(&scenario);
    core.set_car_count(cars);

    if car >= core.car_count() {
        eprintln!(
            "Car index {} out of range for a {}-car grid.",
            car,
            core.car_count()
        );
        std::process::exit(1);
    }

    println!(
        "Running {} lap(s), car {} of {}, track {:.0} m",
        laps,
        car,
        core.car_count(),
        core.track().length()
    );

    let result = core.run_batch_laps(car, laps);

    println!();
    println!("=== Lap Summary ===");
    println!("Laps completed: {}", result.laps_completed);
    println!("Best lap:       {:.3} s", result.best_lap_time_s);
    println!("Mean lap:       {:.3} s", result.mean_lap_time_s);

    let mut snap = CarSnapshot::default();
    core.snapshot(car, &mut snap);
    println!(
        "Final state:    {:.1} m/s, gear {}, {:.0} rpm",
        snap.speed_mps, snap.gear, snap.engine_rpm
    );

    if let Some(path) = output {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => match std::fs::write(&path, json) {
                Ok(()) => println!("\nResult written to {}", path.display()),
                Err(e) => eprintln!("\nFailed to write result: {e}"),
            },
            Err(e) => eprintln!("\nFailed to serialize result: {e}"),
        }
    }
}

fn cmd_replay_check(scenario: Option<&PathBuf>, steps: u32, cars: u32, seed: u64) {
    let scenario = resolve_scenario(scenario);
    let mut core = build_core(&scenario);
    core.set_car_count(cars);

    let cars = core.car_count() as usize;
    let mut rng = Pcg64::seed_from_u64(seed);

    println!("Recording {steps} steps, {cars} car(s), seed {seed}");

    core.start_replay_capture();
    for _ in 0..steps {
        let inputs: Vec<DriverInput> = (0..cars)
            .map(|_| DriverInput {
                throttle: rng.gen_range(0.0..=1.0),
                brake: rng.gen_range(0.0..=1.0),
                steer: rng.gen_range(-1.0..=1.0),
            })
            .collect();
        core.step(&inputs);
    }
    core.stop_replay_capture();

    if core.replay_captured_deterministic() {
        println!("Replay check PASSED: {steps} frame(s) reproduced.");
    } else {
        eprintln!("Replay check FAILED.");
        std::process::exit(1);
    }
}
