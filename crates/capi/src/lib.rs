//! Stable C ABI over the simulation core.
//!
//! Everything crossing the boundary is a value type or a raw pointer +
//! count pair; `apexsim_create` deep-copies the node and torque arrays, so
//! callers may free their inputs as soon as it returns. Errors surface as
//! data: a null handle from `apexsim_create`, zeroed results elsewhere.

use std::ptr;
use std::slice;

use apexsim_shared::constants::{API_VERSION, DEFAULT_TRACK_LENGTH_M, MAX_GEARS};
use apexsim_shared::{
    BatchLapResult, CarConfig, CarSnapshot, DriverInput, PowertrainConfig, SimConfig, TorquePoint,
    TrackConfig, TrackNode, DEFAULT_TORQUE_CURVE, DEFAULT_TRACK_NODES,
};
use apexsim_sim::SimulationCore;

static DEFAULT_NODES: [TrackNode; 16] = DEFAULT_TRACK_NODES;
static DEFAULT_CURVE: [TorquePoint; 7] = DEFAULT_TORQUE_CURVE;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CSimConfig {
    pub fixed_dt: f32,
    pub max_cars: u32,
    pub replay_capacity_steps: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CPowertrainConfig {
    pub gear_ratios: [f32; MAX_GEARS],
    pub gear_count: u32,
    pub final_drive: f32,
    pub driveline_efficiency: f32,
    pub shift_rpm_up: f32,
    pub shift_rpm_down: f32,
    pub torque_curve: *const TorquePoint,
    pub torque_curve_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CCarConfig {
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
    pub powertrain: CPowertrainConfig,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CTrackConfig {
    pub nodes: *const TrackNode,
    pub node_count: u32,
    pub length_m: f32,
}

unsafe fn sim_config_from_c(c: &CSimConfig) -> SimConfig {
    SimConfig {
        fixed_dt: c.fixed_dt,
        max_cars: c.max_cars,
        replay_capacity_steps: c.replay_capacity_steps,
    }
}

unsafe fn powertrain_from_c(c: &CPowertrainConfig) -> PowertrainConfig {
    let torque_curve = if c.torque_curve.is_null() || c.torque_curve_count == 0 {
        Vec::new()
    } else {
        slice::from_raw_parts(c.torque_curve, c.torque_curve_count as usize).to_vec()
    };
    PowertrainConfig {
        gear_ratios: c.gear_ratios,
        gear_count: c.gear_count,
        final_drive: c.final_drive,
        driveline_efficiency: c.driveline_efficiency,
        shift_rpm_up: c.shift_rpm_up,
        shift_rpm_down: c.shift_rpm_down,
        torque_curve,
    }
}

unsafe fn car_config_from_c(c: &CCarConfig) -> CarConfig {
    CarConfig {
        mass_kg: c.mass_kg,
        wheelbase_m: c.wheelbase_m,
        cg_to_front_m: c.cg_to_front_m,
        cg_to_rear_m: c.cg_to_rear_m,
        tire_radius_m: c.tire_radius_m,
        mu_long: c.mu_long,
        mu_lat: c.mu_lat,
        cda: c.cda,
        cla: c.cla,
        rolling_resistance_n: c.rolling_resistance_n,
        brake_force_max_n: c.brake_force_max_n,
        steer_gain: c.steer_gain,
        powertrain: powertrain_from_c(&c.powertrain),
    }
}

unsafe fn track_config_from_c(c: &CTrackConfig) -> TrackConfig {
    let nodes = if c.nodes.is_null() || c.node_count == 0 {
        Vec::new()
    } else {
        slice::from_raw_parts(c.nodes, c.node_count as usize).to_vec()
    };
    TrackConfig {
        nodes,
        length_m: c.length_m,
    }
}

#[no_mangle]
pub extern "C" fn apexsim_api_version() -> u32 {
    API_VERSION
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_default_sim_config(out_cfg: *mut CSimConfig) {
    if out_cfg.is_null() {
        return;
    }
    let d = SimConfig::default();
    *out_cfg = CSimConfig {
        fixed_dt: d.fixed_dt,
        max_cars: d.max_cars,
        replay_capacity_steps: d.replay_capacity_steps,
    };
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_default_car_config(out_cfg: *mut CCarConfig) {
    if out_cfg.is_null() {
        return;
    }
    let d = CarConfig::default();
    *out_cfg = CCarConfig {
        mass_kg: d.mass_kg,
        wheelbase_m: d.wheelbase_m,
        cg_to_front_m: d.cg_to_front_m,
        cg_to_rear_m: d.cg_to_rear_m,
        tire_radius_m: d.tire_radius_m,
        mu_long: d.mu_long,
        mu_lat: d.mu_lat,
        cda: d.cda,
        cla: d.cla,
        rolling_resistance_n: d.rolling_resistance_n,
        brake_force_max_n: d.brake_force_max_n,
        steer_gain: d.steer_gain,
        powertrain: CPowertrainConfig {
            gear_ratios: d.powertrain.gear_ratios,
            gear_count: d.powertrain.gear_count,
            final_drive: d.powertrain.final_drive,
            driveline_efficiency: d.powertrain.driveline_efficiency,
            shift_rpm_up: d.powertrain.shift_rpm_up,
            shift_rpm_down: d.powertrain.shift_rpm_down,
            torque_curve: DEFAULT_CURVE.as_ptr(),
            torque_curve_count: DEFAULT_CURVE.len() as u32,
        },
    };
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_default_track_config(out_cfg: *mut CTrackConfig) {
    if out_cfg.is_null() {
        return;
    }
    *out_cfg = CTrackConfig {
        nodes: DEFAULT_NODES.as_ptr(),
        node_count: DEFAULT_NODES.len() as u32,
        length_m: DEFAULT_TRACK_LENGTH_M,
    };
}

/// Null configs or configs that fail validation yield a null handle; no
/// partial state is observable.
#[no_mangle]
pub unsafe extern "C" fn apexsim_create(
    sim_cfg: *const CSimConfig,
    car_cfg: *const CCarConfig,
    track_cfg: *const CTrackConfig,
) -> *mut SimulationCore {
    if sim_cfg.is_null() || car_cfg.is_null() || track_cfg.is_null() {
        return ptr::null_mut();
    }

    let sim = sim_config_from_c(&*sim_cfg);
    let car = car_config_from_c(&*car_cfg);
    let track = track_config_from_c(&*track_cfg);

    match SimulationCore::new(&sim, &car, &track) {
        Ok(mut core) => {
            core.set_car_count(sim.max_cars.min(1));
            Box::into_raw(Box::new(core))
        }
        Err(_) => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_destroy(handle: *mut SimulationCore) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_set_car_count(handle: *mut SimulationCore, count: u32) {
    if let Some(core) = handle.as_mut() {
        core.set_car_count(count);
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_reset(handle: *mut SimulationCore) {
    if let Some(core) = handle.as_mut() {
        core.reset();
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_step(
    handle: *mut SimulationCore,
    inputs: *const DriverInput,
    input_count: u32,
) {
    if let Some(core) = handle.as_mut() {
        let inputs = if inputs.is_null() || input_count == 0 {
            &[]
        } else {
            slice::from_raw_parts(inputs, input_count as usize)
        };
        core.step(inputs);
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_start_replay_capture(handle: *mut SimulationCore) {
    if let Some(core) = handle.as_mut() {
        core.start_replay_capture();
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_stop_replay_capture(handle: *mut SimulationCore) {
    if let Some(core) = handle.as_mut() {
        core.stop_replay_capture();
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_replay_captured_deterministic(handle: *mut SimulationCore) -> i32 {
    match handle.as_mut() {
        Some(core) => core.replay_captured_deterministic() as i32,
        None => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_run_batch_laps(
    handle: *mut SimulationCore,
    car_index: u32,
    laps: u32,
) -> BatchLapResult {
    match handle.as_mut() {
        Some(core) => core.run_batch_laps(car_index, laps),
        None => BatchLapResult::default(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_snapshot(
    handle: *const SimulationCore,
    car_index: u32,
    out_snapshot: *mut CarSnapshot,
) {
    if let (Some(core), Some(out)) = (handle.as_ref(), out_snapshot.as_mut()) {
        core.snapshot(car_index, out);
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_state_speed_ptr(handle: *const SimulationCore) -> *const f32 {
    match handle.as_ref() {
        Some(core) => core.state().speed_mps.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_state_x_ptr(handle: *const SimulationCore) -> *const f32 {
    match handle.as_ref() {
        Some(core) => core.state().x_m.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_state_y_ptr(handle: *const SimulationCore) -> *const f32 {
    match handle.as_ref() {
        Some(core) => core.state().y_m.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_state_yaw_ptr(handle: *const SimulationCore) -> *const f32 {
    match handle.as_ref() {
        Some(core) => core.state().yaw_rad.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_state_s_ptr(handle: *const SimulationCore) -> *const f32 {
    match handle.as_ref() {
        Some(core) => core.state().s_m.as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn apexsim_car_count(handle: *const SimulationCore) -> u32 {
    match handle.as_ref() {
        Some(core) => core.car_count(),
        None => 0,
    }
}
