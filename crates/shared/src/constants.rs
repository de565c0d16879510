// Environment
pub const RHO_AIR: f32 = 1.225; // kg/m^3
pub const GRAVITY: f32 = 9.80665; // m/s^2

// Engine
pub const MIN_RPM: f32 = 4000.0;
pub const MAX_RPM: f32 = 13000.0;
pub const MAX_GEARS: usize = 8;
pub const RADPS_TO_RPM: f32 = 60.0 / std::f32::consts::TAU;

// Geometry guards for degenerate configs
pub const MIN_TIRE_RADIUS_M: f32 = 0.05;
pub const MIN_WHEELBASE_M: f32 = 1.0;

// Grip-limit scrub: longitudinal bleed when lateral demand saturates
pub const SCRUB_DECEL_MPS2: f32 = 4.0;
// Below this speed the yaw rate is forced to zero
pub const YAW_RATE_MIN_SPEED_MPS: f32 = 0.1;

// Self-piloted batch driver
pub const PILOT_CORNER_CURVATURE: f32 = 0.02; // below: full throttle
pub const PILOT_BRAKE_CURVATURE: f32 = 0.05;
pub const PILOT_BRAKE_SPEED_MPS: f32 = 72.0;
pub const PILOT_STEER_GAIN: f32 = 60.0;
pub const PILOT_PART_THROTTLE: f32 = 0.6;
pub const PILOT_BRAKE_LEVEL: f32 = 0.55;

// Replay equivalence tolerances
pub const REPLAY_SPEED_TOL_MPS: f32 = 1e-5;
pub const REPLAY_S_TOL_M: f32 = 1e-4;

// Simulation defaults
pub const DEFAULT_FIXED_DT: f32 = 1.0 / 240.0;
pub const DEFAULT_MAX_CARS: u32 = 20;
pub const DEFAULT_REPLAY_CAPACITY_STEPS: u32 = 120_000;
pub const DEFAULT_TRACK_LENGTH_M: f32 = 4600.0;

// Stable ABI
pub const API_VERSION: u32 = 1;
