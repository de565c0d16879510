//! Reduced single-instance surface for sandboxed hosts.
//!
//! One flattened init record configures one process-wide simulation; the
//! host drives car 0 through `set_controls` and pumps wall-clock time into
//! `step_sim`, which converts it into fixed steps through an accumulator.
//! Cars 1.. are self-driven by a phase-offset throttle/steer pattern so a
//! host gets a populated grid for free. Access must be serialised by the
//! caller; that is part of this surface's contract.

use std::ptr;
use std::slice;
use std::sync::Mutex;

use apexsim_shared::constants::MAX_GEARS;
use apexsim_shared::{
    CarConfig, CarSnapshot, DriverInput, PowertrainConfig, SimConfig, TorquePoint, TrackConfig,
    TrackNode,
};
use apexsim_sim::SimulationCore;

/// Upper bound on fixed steps drained per `step_sim` call; time beyond it
/// is discarded.
const MAX_STEPS_PER_CALL: u32 = 8192;

/// Everything needed to build the instance, flattened into one record.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedInitConfig {
    pub fixed_dt: f32,
    pub max_cars: u32,
    pub replay_capacity_steps: u32,
    pub active_cars: u32,

    pub mass_kg: f32,
    pub wheelbase_m: f32,
    pub cg_to_front_m: f32,
    pub cg_to_rear_m: f32,
    pub tire_radius_m: f32,
    pub mu_long: f32,
    pub mu_lat: f32,
    pub cda: f32,
    pub cla: f32,
    pub rolling_resistance_n: f32,
    pub brake_force_max_n: f32,
    pub steer_gain: f32,

    pub gear_ratios: [f32; MAX_GEARS],
    pub gear_count: u32,
    pub final_drive: f32,
    pub driveline_efficiency: f32,
    pub shift_rpm_up: f32,
    pub shift_rpm_down: f32,

    pub track_nodes: *const TrackNode,
    pub track_node_count: u32,
    pub track_length_m: f32,
    pub torque_curve: *const TorquePoint,
    pub torque_curve_count: u32,
}

struct Runtime {
    core: SimulationCore,
    inputs: Vec<DriverInput>,
    dt_remainder_s: f32,
}

static RUNTIME: Mutex<Option<Runtime>> = Mutex::new(None);

fn with_runtime<R>(f: impl FnOnce(&mut Option<Runtime>) -> R) -> R {
    let mut guard = RUNTIME.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

/// Throttle/brake/steer pattern for the self-driven grid, phased by car
/// index and track position.
fn ai_input(car_index: usize, s_m: f32, speed_mps: f32) -> DriverInput {
    let phase = car_index as f32 * 0.35 + s_m * 0.003;
    DriverInput {
        throttle: (0.70 + 0.22 * phase.sin()).clamp(0.0, 1.0),
        brake: if speed_mps > 83.0 { 0.2 } else { 0.0 },
        steer: 0.16 * (phase * 0.8).sin(),
    }
}

fn refresh_ai_inputs(rt: &mut Runtime) {
    let cars = rt.core.car_count() as usize;
    if rt.inputs.len() != cars {
        rt.inputs.resize(cars, DriverInput::coast());
    }
    for i in 1..cars {
        rt.inputs[i] = ai_input(i, rt.core.state().s_m[i], rt.core.state().speed_mps[i]);
    }
}

/// Build the process-wide instance. Returns 1 on success, 0 on a null or
/// degenerate config. Replaces any previous instance.
#[no_mangle]
pub unsafe extern "C" fn init_sim(cfg: *const EmbeddedInitConfig) -> i32 {
    let Some(cfg) = cfg.as_ref() else {
        return 0;
    };
    if cfg.track_nodes.is_null()
        || cfg.torque_curve.is_null()
        || cfg.track_node_count < 2
        || cfg.torque_curve_count < 2
    {
        return 0;
    }

    let track_cfg = TrackConfig {
        nodes: slice::from_raw_parts(cfg.track_nodes, cfg.track_node_count as usize).to_vec(),
        length_m: cfg.track_length_m,
    };
    let car_cfg = CarConfig {
        mass_kg: cfg.mass_kg,
        wheelbase_m: cfg.wheelbase_m,
        cg_to_front_m: cfg.cg_to_front_m,
        cg_to_rear_m: cfg.cg_to_rear_m,
        tire_radius_m: cfg.tire_radius_m,
        mu_long: cfg.mu_long,
        mu_lat: cfg.mu_lat,
        cda: cfg.cda,
        cla: cfg.cla,
        rolling_resistance_n: cfg.rolling_resistance_n,
        brake_force_max_n: cfg.brake_force_max_n,
        steer_gain: cfg.steer_gain,
        powertrain: PowertrainConfig {
            gear_ratios: cfg.gear_ratios,
            gear_count: cfg.gear_count.min(MAX_GEARS as u32),
            final_drive: cfg.final_drive,
            driveline_efficiency: cfg.driveline_efficiency,
            shift_rpm_up: cfg.shift_rpm_up,
            shift_rpm_down: cfg.shift_rpm_down,
            torque_curve: slice::from_raw_parts(cfg.torque_curve, cfg.torque_curve_count as usize)
                .to_vec(),
        },
    };
    let sim_cfg = SimConfig {
        fixed_dt: cfg.fixed_dt,
        max_cars: cfg.max_cars,
        replay_capacity_steps: cfg.replay_capacity_steps,
    };

    let Ok(mut core) = SimulationCore::new(&sim_cfg, &car_cfg, &track_cfg) else {
        return 0;
    };
    core.set_car_count(cfg.active_cars.min(cfg.max_cars));
    core.start_replay_capture();

    let inputs = vec![DriverInput::coast(); core.car_count() as usize];
    with_runtime(|slot| {
        *slot = Some(Runtime {
            core,
            inputs,
            dt_remainder_s: 0.0,
        });
    });
    1
}

#[no_mangle]
pub extern "C" fn reset_sim() {
    with_runtime(|slot| {
        if let Some(rt) = slot.as_mut() {
            rt.core.reset();
            rt.dt_remainder_s = 0.0;
        }
    });
}

/// Host controls for car 0, clamped on the way in.
#[no_mangle]
pub extern "C" fn set_controls(throttle: f32, brake: f32, steering: f32) {
    with_runtime(|slot| {
        if let Some(rt) = slot.as_mut() {
            if let Some(first) = rt.inputs.first_mut() {
                *first = DriverInput {
                    throttle,
                    brake,
                    steer: steering,
                }
                .clamped();
            }
        }
    });
}

/// Convert a wall-clock interval into fixed steps. The remainder carries
/// across calls; at most `MAX_STEPS_PER_CALL` steps drain per call.
#[no_mangle]
pub extern "C" fn step_sim(dt: f32) {
    with_runtime(|slot| {
        let Some(rt) = slot.as_mut() else {
            return;
        };

        let fixed_dt = rt.core.dt();
        rt.dt_remainder_s += dt.max(0.0);
        refresh_ai_inputs(rt);

        let mut budget = MAX_STEPS_PER_CALL;
        while rt.dt_remainder_s >= fixed_dt && budget > 0 {
            rt.dt_remainder_s -= fixed_dt;
            rt.core.step(&rt.inputs);
            budget -= 1;
        }
    });
}

#[no_mangle]
pub unsafe extern "C" fn get_vehicle_state(car_index: u32, out_state: *mut CarSnapshot) {
    let Some(out) = out_state.as_mut() else {
        return;
    };
    with_runtime(|slot| {
        if let Some(rt) = slot.as_mut() {
            rt.core.snapshot(car_index, out);
        }
    });
}

/// Self-piloted single lap for car 0; returns the best lap time, or zero
/// when no instance or no cars exist.
#[no_mangle]
pub extern "C" fn run_lap() -> f32 {
    with_runtime(|slot| {
        let Some(rt) = slot.as_mut() else {
            return 0.0;
        };
        if rt.core.car_count() == 0 {
            return 0.0;
        }
        rt.core.run_batch_laps(0, 1).best_lap_time_s
    })
}

fn column_ptr(select: impl Fn(&SimulationCore) -> *const f32) -> *const f32 {
    with_runtime(|slot| match slot.as_ref() {
        Some(rt) => select(&rt.core),
        None => ptr::null(),
    })
}

#[no_mangle]
pub extern "C" fn state_x_ptr() -> *const f32 {
    column_ptr(|core| core.state().x_m.as_ptr())
}

#[no_mangle]
pub extern "C" fn state_y_ptr() -> *const f32 {
    column_ptr(|core| core.state().y_m.as_ptr())
}

#[no_mangle]
pub extern "C" fn state_yaw_ptr() -> *const f32 {
    column_ptr(|core| core.state().yaw_rad.as_ptr())
}

#[no_mangle]
pub extern "C" fn state_speed_ptr() -> *const f32 {
    column_ptr(|core| core.state().speed_mps.as_ptr())
}

#[no_mangle]
pub extern "C" fn state_s_ptr() -> *const f32 {
    column_ptr(|core| core.state().s_m.as_ptr())
}

#[no_mangle]
pub extern "C" fn state_car_count() -> u32 {
    with_runtime(|slot| match slot.as_ref() {
        Some(rt) => rt.core.car_count(),
        None => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use apexsim_shared::{DEFAULT_TORQUE_CURVE, DEFAULT_TRACK_NODES};

    fn default_init_config() -> EmbeddedInitConfig {
        let car = CarConfig::default();
        let sim = SimConfig::default();
        EmbeddedInitConfig {
            fixed_dt: sim.fixed_dt,
            max_cars: sim.max_cars,
            replay_capacity_steps: sim.replay_capacity_steps,
            active_cars: 4,
            mass_kg: car.mass_kg,
            wheelbase_m: car.wheelbase_m,
            cg_to_front_m: car.cg_to_front_m,
            cg_to_rear_m: car.cg_to_rear_m,
            tire_radius_m: car.tire_radius_m,
            mu_long: car.mu_long,
            mu_lat: car.mu_lat,
            cda: car.cda,
            cla: car.cla,
            rolling_resistance_n: car.rolling_resistance_n,
            brake_force_max_n: car.brake_force_max_n,
            steer_gain: car.steer_gain,
            gear_ratios: car.powertrain.gear_ratios,
            gear_count: car.powertrain.gear_count,
            final_drive: car.powertrain.final_drive,
            driveline_efficiency: car.powertrain.driveline_efficiency,
            shift_rpm_up: car.powertrain.shift_rpm_up,
            shift_rpm_down: car.powertrain.shift_rpm_down,
            track_nodes: DEFAULT_TRACK_NODES.as_ptr(),
            track_node_count: DEFAULT_TRACK_NODES.len() as u32,
            track_length_m: 4600.0,
            torque_curve: DEFAULT_TORQUE_CURVE.as_ptr(),
            torque_curve_count: DEFAULT_TORQUE_CURVE.len() as u32,
        }
    }

    // One test drives the whole surface: the runtime is process-wide, so
    // interleaving separate tests would race on it.
    #[test]
    fn test_embedded_surface_lifecycle() {
        unsafe {
            assert_eq!(init_sim(ptr::null()), 0);

            let mut bad = default_init_config();
            bad.track_node_count = 1;
            assert_eq!(init_sim(&bad), 0);

            let cfg = default_init_config();
            assert_eq!(init_sim(&cfg), 1);
            assert_eq!(state_car_count(), 4);

            // Host floors it; AI cars drive themselves.
            set_controls(1.0, 0.0, 0.0);
            for _ in 0..120 {
                step_sim(1.0 / 60.0);
            }

            let mut snap = CarSnapshot::default();
            get_vehicle_state(0, &mut snap);
            assert!(snap.speed_mps > 0.0, "car 0 should move under host throttle");
            get_vehicle_state(1, &mut snap);
            assert!(snap.speed_mps > 0.0, "AI car should drive itself");

            let speeds = state_speed_ptr();
            assert!(!speeds.is_null());
            let speed0 = *speeds;
            get_vehicle_state(0, &mut snap);
            assert_eq!(speed0, snap.speed_mps);

            // Sub-tick intervals accumulate instead of vanishing.
            reset_sim();
            set_controls(1.0, 0.0, 0.0);
            let fixed_dt = cfg.fixed_dt;
            step_sim(fixed_dt * 0.6);
            get_vehicle_state(0, &mut snap);
            assert_eq!(snap.speed_mps, 0.0);
            step_sim(fixed_dt * 0.6);
            get_vehicle_state(0, &mut snap);
            assert!(snap.speed_mps > 0.0);

            // A huge interval is capped, not an infinite loop.
            reset_sim();
            step_sim(3600.0);
            get_vehicle_state(0, &mut snap);
            assert!(snap.lap_time_s <= fixed_dt * 8192.0 + 0.05);

            let lap_time = run_lap();
            assert!(lap_time > 0.0);
        }
    }
}
