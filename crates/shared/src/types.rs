use serde::{Deserialize, Serialize};

use crate::constants::*;

/// One arc-length sample of the track centreline. Curvature is signed
/// (left-positive); elevation is advisory and unused by the dynamics.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackNode {
    pub s: f32,
    pub curvature: f32,
    pub elevation: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorquePoint {
    pub rpm: f32,
    pub torque_nm: f32,
}

/// Library-owned 16-node closed loop, 4600 m.
pub const DEFAULT_TRACK_NODES: [TrackNode; 16] = [
    TrackNode { s: 0.0, curvature: 0.000, elevation: 0.0 },
    TrackNode { s: 350.0, curvature: 0.000, elevation: 0.0 },
    TrackNode { s: 620.0, curvature: 0.018, elevation: 0.5 },
    TrackNode { s: 810.0, curvature: 0.040, elevation: 1.0 },
    TrackNode { s: 980.0, curvature: 0.008, elevation: 1.5 },
    TrackNode { s: 1220.0, curvature: -0.010, elevation: 1.2 },
    TrackNode { s: 1600.0, curvature: -0.024, elevation: 0.8 },
    TrackNode { s: 1880.0, curvature: -0.006, elevation: 0.3 },
    TrackNode { s: 2250.0, curvature: 0.000, elevation: -0.2 },
    TrackNode { s: 2600.0, curvature: 0.022, elevation: -0.5 },
    TrackNode { s: 2820.0, curvature: 0.048, elevation: -0.8 },
    TrackNode { s: 3000.0, curvature: 0.005, elevation: -1.0 },
    TrackNode { s: 3400.0, curvature: -0.010, elevation: -0.6 },
    TrackNode { s: 3800.0, curvature: -0.030, elevation: -0.1 },
    TrackNode { s: 4150.0, curvature: -0.004, elevation: 0.2 },
    TrackNode { s: 4500.0, curvature: 0.000, elevation: 0.0 },
];

/// Library-owned default torque curve (Nm vs rpm).
pub const DEFAULT_TORQUE_CURVE: [TorquePoint; 7] = [
    TorquePoint { rpm: 4000.0, torque_nm: 510.0 },
    TorquePoint { rpm: 6000.0, torque_nm: 640.0 },
    TorquePoint { rpm: 8000.0, torque_nm: 760.0 },
    TorquePoint { rpm: 9500.0, torque_nm: 810.0 },
    TorquePoint { rpm: 11000.0, torque_nm: 780.0 },
    TorquePoint { rpm: 12000.0, torque_nm: 730.0 },
    TorquePoint { rpm: 13000.0, torque_nm: 640.0 },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub nodes: Vec<TrackNode>,
    pub length_m: f32,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_TRACK_NODES.to_vec(),
            length_m: DEFAULT_TRACK_LENGTH_M,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowertrainConfig {
    pub gear_ratios: [f32; MAX_GEARS],
    pub gear_count: u32,
    pub final_drive: f32,
    pub driveline_efficiency: f32,
    pub shift_rpm_up: f32,
    pub shift_rpm_down: f32,
    pub torque_curve: Vec<TorquePoint>,
}

impl Default for PowertrainConfig {
    fn default() -> Self {
        Self {
            gear_ratios: [3.18, 2.31, 1.79, 1.45, 1.22, 1.05, 0.92, 0.82],
            gear_count: 8,
            final_drive: 3.05,
            driveline_efficiency: 0.92,
            shift_rpm_up: 11_800.0,
            shift_rpm_down: 6_200.0,
            torque_curve: DEFAULT_TORQUE_CURVE.to_vec(),
        }
    }
}

/// Scalar vehicle parameters shared by every active car in an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarConfig {
    pub mass_kg: f32,
    pub wheelbase_m: f32,
    pub cg_to_front_m: f32,
    pub cg_to_rear_m: f32,
    pub tire_radius_m: f32,
    pub mu_long: f32,
    pub mu_lat: f32,
    /// Drag coefficient times frontal area, m^2.
    pub cda: f32,
    /// Lift coefficient times frontal area, m^2; positive is downforce.
    pub cla: f32,
    pub rolling_resistance_n: f32,
    pub brake_force_max_n: f32,
    pub steer_gain: f32,
    pub powertrain: PowertrainConfig,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            mass_kg: 798.0,
            wheelbase_m: 3.6,
            cg_to_front_m: 1.6,
            cg_to_rear_m: 2.0,
            tire_radius_m: 0.34,
            mu_long: 1.85,
            mu_lat: 2.1,
            cda: 1.12,
            cla: 3.2,
            rolling_resistance_n: 180.0,
            brake_force_max_n: 18_500.0,
            steer_gain: 0.22,
            powertrain: PowertrainConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimConfig {
    pub fixed_dt: f32,
    pub max_cars: u32,
    pub replay_capacity_steps: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_dt: DEFAULT_FIXED_DT,
            max_cars: DEFAULT_MAX_CARS,
            replay_capacity_steps: DEFAULT_REPLAY_CAPACITY_STEPS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverInput {
    pub throttle: f32,
    pub brake: f32,
    pub steer: f32,
}

impl DriverInput {
    pub fn coast() -> Self {
        Self {
            throttle: 0.0,
            brake: 0.0,
            steer: 0.0,
        }
    }

    /// Inputs outside their declared ranges are accepted and clamped.
    pub fn clamped(self) -> Self {
        Self {
            throttle: self.throttle.clamp(0.0, 1.0),
            brake: self.brake.clamp(0.0, 1.0),
            steer: self.steer.clamp(-1.0, 1.0),
        }
    }
}

impl Default for DriverInput {
    fn default() -> Self {
        Self::coast()
    }
}

/// Per-car observable state copied out by value.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarSnapshot {
    pub s_m: f32,
    pub x_m: f32,
    pub y_m: f32,
    pub yaw_rad: f32,
    pub speed_mps: f32,
    pub accel_long_mps2: f32,
    pub accel_lat_mps2: f32,
    pub engine_rpm: f32,
    pub gear: u32,
    pub lap: u32,
    pub lap_time_s: f32,
    pub last_lap_time_s: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchLapResult {
    pub mean_lap_time_s: f32,
    pub best_lap_time_s: f32,
    pub laps_completed: u32,
}
