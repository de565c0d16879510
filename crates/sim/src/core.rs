use thiserror::Error;

use apexsim_shared::constants::*;
use apexsim_shared::{
    BatchLapResult, CarConfig, CarSnapshot, DriverInput, SimConfig, TrackConfig,
};

use crate::powertrain::Powertrain;
use crate::soa::CarStateSoA;
use crate::track::{TrackError, TrackProfile};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error("fixed_dt must be positive, got {0}")]
    BadTimestep(f32),
}

/// Deterministic multi-car simulation over one closed-loop track.
///
/// One instance is strictly single-threaded: `step` is a bounded pure
/// computation over owned memory with no clock reads and no RNG, so an
/// identical input sequence from an identical reset state reproduces the
/// observable columns. Independent instances share nothing.
pub struct SimulationCore {
    sim_cfg: SimConfig,
    car: CarConfig,
    powertrain: Powertrain,
    track: TrackProfile,
    state: CarStateSoA,
    replay: Vec<Vec<DriverInput>>,
    capturing: bool,
}

impl SimulationCore {
    /// Deep-copies the track nodes and torque points out of the configs;
    /// the caller may drop its inputs immediately.
    pub fn new(
        sim_cfg: &SimConfig,
        car_cfg: &CarConfig,
        track_cfg: &TrackConfig,
    ) -> Result<Self, BuildError> {
        if !(sim_cfg.fixed_dt > 0.0) {
            return Err(BuildError::BadTimestep(sim_cfg.fixed_dt));
        }
        let track = TrackProfile::load(track_cfg)?;
        let powertrain = Powertrain::new(&car_cfg.powertrain);

        Ok(Self {
            sim_cfg: *sim_cfg,
            car: car_cfg.clone(),
            powertrain,
            track,
            state: CarStateSoA::default(),
            replay: Vec::new(),
            capturing: false,
        })
    }

    pub fn dt(&self) -> f32 {
        self.sim_cfg.fixed_dt
    }

    pub fn car_count(&self) -> u32 {
        self.state.len() as u32
    }

    pub fn track(&self) -> &TrackProfile {
        &self.track
    }

    /// Borrowed view of the state columns; invalidated by any mutating
    /// call on this instance.
    pub fn state(&self) -> &CarStateSoA {
        &self.state
    }

    /// Sizes the grid, silently capped at `max_cars`, and re-applies the
    /// default-reset state to every car.
    pub fn set_car_count(&mut self, count: u32) {
        let count = count.min(self.sim_cfg.max_cars);
        self.state.resize(count as usize);
    }

    /// Re-zeroes all cars without resizing and clears the replay buffer.
    pub fn reset(&mut self) {
        self.state.reset();
        self.replay.clear();
    }

    /// Advance every active car by one fixed timestep. Inputs shorter
    /// than the grid are zero-padded; out-of-range values are clamped.
    pub fn step(&mut self, inputs: &[DriverInput]) {
        let cars = self.state.len();
        let dt = self.sim_cfg.fixed_dt;

        if self.capturing && self.replay.len() < self.sim_cfg.replay_capacity_steps as usize {
            let mut frame = vec![DriverInput::coast(); cars];
            for (slot, input) in frame.iter_mut().zip(inputs) {
                *slot = *input;
            }
            self.replay.push(frame);
        }

        for i in 0..cars {
            let input = inputs.get(i).copied().unwrap_or_default().clamped();
            self.step_car(i, input, dt);
        }
    }

    fn step_car(&mut self, i: usize, input: DriverInput, dt: f32) {
        let st = &mut self.state;
        let car = &self.car;

        let v = st.speed_mps[i].max(0.0);
        let kappa_track = self.track.curvature(st.s_m[i]);

        let gear = self.powertrain.auto_shift(st.gear[i], st.engine_rpm[i]);
        st.gear[i] = gear;

        let rpm = self.powertrain.rpm_from_speed(v, gear, car.tire_radius_m);
        st.engine_rpm[i] = rpm;

        // Longitudinal force budget
        let f_drive = self
            .powertrain
            .drive_force(rpm, input.throttle, gear, car.tire_radius_m);
        let f_down = 0.5 * RHO_AIR * car.cla * v * v;
        let normal = car.mass_kg * GRAVITY + f_down;
        let f_drive = f_drive.min(car.mu_long * normal);
        let f_brake = input.brake * car.brake_force_max_n;
        let f_drag = 0.5 * RHO_AIR * car.cda * v * v;
        let f_net = f_drive - f_brake - car.rolling_resistance_n - f_drag;
        let a_long = f_net / car.mass_kg;

        // Lateral demand from track plus steer, clamped by the grip circle
        let kappa_cmd =
            kappa_track + input.steer * car.steer_gain / car.wheelbase_m.max(MIN_WHEELBASE_M);
        let a_lat_raw = v * v * kappa_cmd;
        let a_lat_max = car.mu_lat * normal / car.mass_kg;
        let a_lat = a_lat_raw.clamp(-a_lat_max, a_lat_max);

        // Saturated lateral demand bleeds longitudinal speed
        let sat = if a_lat_raw.abs() > 1e-3 {
            (a_lat.abs() / a_lat_raw.abs()).min(1.0)
        } else {
            1.0
        };
        let a_scrub = (1.0 - sat) * SCRUB_DECEL_MPS2;

        // Semi-implicit Euler; position uses the post-update yaw
        let v_next = (v + (a_long - a_scrub) * dt).max(0.0);
        let yaw_rate = if v_next > YAW_RATE_MIN_SPEED_MPS {
            a_lat / v_next
        } else {
            0.0
        };
        st.yaw_rad[i] += yaw_rate * dt;
        st.x_m[i] += st.yaw_rad[i].cos() * v_next * dt;
        st.y_m[i] += st.yaw_rad[i].sin() * v_next * dt;

        let length = self.track.length();
        let mut s = st.s_m[i] + v_next * dt;
        while s >= length {
            s -= length;
            st.last_lap_time_s[i] = st.lap_time_s[i];
            st.lap_time_s[i] = 0.0;
            st.lap[i] += 1;
        }
        st.s_m[i] = s;
        st.lap_time_s[i] += dt;

        st.speed_mps[i] = v_next;
        st.accel_long_mps2[i] = a_long;
        st.accel_lat_mps2[i] = a_lat;
    }

    /// Clears the replay buffer and records subsequent input frames, up
    /// to the configured capacity; frames beyond it are dropped.
    pub fn start_replay_capture(&mut self) {
        self.replay.clear();
        self.capturing = true;
    }

    pub fn stop_replay_capture(&mut self) {
        self.capturing = false;
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Re-run the recorded input frames from a reset state and compare
    /// the end state against the current one.
    ///
    /// This is a destructive self-test: it leaves the core in the
    /// replayed end-state. Returns false if nothing was recorded.
    pub fn replay_captured_deterministic(&mut self) -> bool {
        if self.replay.is_empty() {
            return false;
        }

        let frames = self.replay.clone();
        let baseline_speed = self.state.speed_mps.clone();
        let baseline_s = self.state.s_m.clone();
        let baseline_lap = self.state.lap.clone();

        self.reset();
        for frame in &frames {
            self.step(frame);
        }

        for i in 0..self.state.len() {
            if (self.state.speed_mps[i] - baseline_speed[i]).abs() >= REPLAY_SPEED_TOL_MPS {
                return false;
            }
            if (self.state.s_m[i] - baseline_s[i]).abs() >= REPLAY_S_TOL_M {
                return false;
            }
            if self.state.lap[i] != baseline_lap[i] {
                return false;
            }
        }
        true
    }

    /// Self-piloted session for one car from a reset baseline, driven by
    /// track curvature alone. The global step advances every active car,
    /// so the rest of the grid rolls forward under zero input.
    pub fn run_batch_laps(&mut self, car_index: u32, n_laps: u32) -> BatchLapResult {
        let mut out = BatchLapResult::default();
        let idx = car_index as usize;
        if idx >= self.state.len() || n_laps == 0 {
            return out;
        }

        self.reset();

        let mut inputs = vec![DriverInput::coast(); self.state.len()];
        let mut prev_lap = self.state.lap[idx];
        let mut time_sum = 0.0f32;
        let mut best = f32::MAX;
        let mut completed = 0u32;

        while completed < n_laps {
            inputs[idx] = pilot_input(
                self.track.curvature(self.state.s_m[idx]),
                self.state.speed_mps[idx],
            );
            self.step(&inputs);

            let lap_now = self.state.lap[idx];
            while prev_lap < lap_now && completed < n_laps {
                let lap_time = self.state.last_lap_time_s[idx];
                time_sum += lap_time;
                best = best.min(lap_time);
                completed += 1;
                prev_lap += 1;
            }
            prev_lap = lap_now;
        }

        out.laps_completed = completed;
        out.mean_lap_time_s = time_sum / completed as f32;
        out.best_lap_time_s = best;
        out
    }

    /// Copy one car's scalars into the caller's snapshot. Out-of-range
    /// indices are a no-op.
    pub fn snapshot(&self, car_index: u32, out: &mut CarSnapshot) {
        let i = car_index as usize;
        if i >= self.state.len() {
            return;
        }
        *out = CarSnapshot {
            s_m: self.state.s_m[i],
            x_m: self.state.x_m[i],
            y_m: self.state.y_m[i],
            yaw_rad: self.state.yaw_rad[i],
            speed_mps: self.state.speed_mps[i],
            accel_long_mps2: self.state.accel_long_mps2[i],
            accel_lat_mps2: self.state.accel_lat_mps2[i],
            engine_rpm: self.state.engine_rpm[i],
            gear: self.state.gear[i],
            lap: self.state.lap[i],
            lap_time_s: self.state.lap_time_s[i],
            last_lap_time_s: self.state.last_lap_time_s[i],
        };
    }
}

/// Inputs the batch driver synthesises from the local track curvature.
fn pilot_input(kappa: f32, speed_mps: f32) -> DriverInput {
    let throttle = if kappa.abs() < PILOT_CORNER_CURVATURE {
        1.0
    } else {
        PILOT_PART_THROTTLE
    };
    let brake = if kappa.abs() > PILOT_BRAKE_CURVATURE && speed_mps > PILOT_BRAKE_SPEED_MPS {
        PILOT_BRAKE_LEVEL
    } else {
        0.0
    };
    let steer = (kappa * PILOT_STEER_GAIN).clamp(-1.0, 1.0);
    DriverInput {
        throttle,
        brake,
        steer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_core() -> SimulationCore {
        let core = SimulationCore::new(
            &SimConfig::default(),
            &CarConfig::default(),
            &TrackConfig::default(),
        );
        core.expect("default configs build")
    }

    fn full_throttle() -> DriverInput {
        DriverInput {
            throttle: 1.0,
            brake: 0.0,
            steer: 0.0,
        }
    }

    #[test]
    fn test_build_rejects_bad_timestep() {
        let sim_cfg = SimConfig {
            fixed_dt: 0.0,
            ..SimConfig::default()
        };
        let core = SimulationCore::new(&sim_cfg, &CarConfig::default(), &TrackConfig::default());
        assert!(matches!(core, Err(BuildError::BadTimestep(_))));
    }

    #[test]
    fn test_set_car_count_caps_at_max() {
        let mut core = default_core();
        core.set_car_count(999);
        assert_eq!(core.car_count(), SimConfig::default().max_cars);
    }

    #[test]
    fn test_stationary_car_stays_put() {
        let mut core = default_core();
        core.set_car_count(1);
        for _ in 0..100 {
            core.step(&[DriverInput::coast()]);
        }
        let st = core.state();
        assert_eq!(st.speed_mps[0], 0.0);
        assert_eq!(st.s_m[0], 0.0);
        assert_eq!(st.x_m[0], 0.0);
        assert_eq!(st.y_m[0], 0.0);
        assert_eq!(st.yaw_rad[0], 0.0);
    }

    #[test]
    fn test_out_of_range_inputs_match_clamped_inputs() {
        let wild = DriverInput {
            throttle: 3.5,
            brake: -2.0,
            steer: 9.0,
        };
        let tame = wild.clamped();

        let mut a = default_core();
        a.set_car_count(1);
        let mut b = default_core();
        b.set_car_count(1);

        for _ in 0..200 {
            a.step(&[wild]);
            b.step(&[tame]);
        }
        assert_eq!(a.state().speed_mps[0], b.state().speed_mps[0]);
        assert_eq!(a.state().s_m[0], b.state().s_m[0]);
        assert_eq!(a.state().yaw_rad[0], b.state().yaw_rad[0]);
    }

    #[test]
    fn test_short_input_slice_zero_pads_the_rest() {
        let mut core = default_core();
        core.set_car_count(3);
        for _ in 0..50 {
            core.step(&[full_throttle()]);
        }
        let st = core.state();
        assert!(st.speed_mps[0] > 0.0);
        assert_eq!(st.speed_mps[1], 0.0);
        assert_eq!(st.speed_mps[2], 0.0);
    }

    #[test]
    fn test_speed_never_negative_under_full_brake() {
        let mut core = default_core();
        core.set_car_count(1);
        let brake = DriverInput {
            throttle: 0.0,
            brake: 1.0,
            steer: 0.0,
        };
        for _ in 0..500 {
            core.step(&[brake]);
            assert!(core.state().speed_mps[0] >= 0.0);
        }
    }

    #[test]
    fn test_saturated_corner_bleeds_speed() {
        let mut core = default_core();
        core.set_car_count(1);

        // Get up to speed on the opening straight, then yank the wheel.
        for _ in 0..960 {
            core.step(&[full_throttle()]);
        }
        let entry_speed = core.state().speed_mps[0];
        let hard_left = DriverInput {
            throttle: 0.0,
            brake: 0.0,
            steer: 1.0,
        };
        for _ in 0..240 {
            core.step(&[hard_left]);
        }
        let exit_speed = core.state().speed_mps[0];
        assert!(
            exit_speed < entry_speed,
            "scrub should bleed speed: {entry_speed} -> {exit_speed}"
        );
        // Lateral acceleration pinned to the grip limit while saturated
        let st = core.state();
        let normal = CarConfig::default().mass_kg * GRAVITY
            + 0.5 * RHO_AIR * CarConfig::default().cla * exit_speed * exit_speed;
        let a_lat_max = CarConfig::default().mu_lat * normal / CarConfig::default().mass_kg;
        assert!(st.accel_lat_mps2[0].abs() <= a_lat_max * 1.01);
    }

    #[test]
    fn test_snapshot_out_of_range_is_noop() {
        let mut core = default_core();
        core.set_car_count(1);
        let mut snap = CarSnapshot {
            speed_mps: -99.0,
            ..CarSnapshot::default()
        };
        core.snapshot(5, &mut snap);
        assert_eq!(snap.speed_mps, -99.0);
    }

    #[test]
    fn test_batch_laps_invalid_args_zeroed() {
        let mut core = default_core();
        core.set_car_count(1);
        assert_eq!(core.run_batch_laps(3, 1), BatchLapResult::default());
        assert_eq!(core.run_batch_laps(0, 0), BatchLapResult::default());
    }

    #[test]
    fn test_replay_check_without_frames_is_false() {
        let mut core = default_core();
        core.set_car_count(1);
        assert!(!core.replay_captured_deterministic());
        core.start_replay_capture();
        assert!(!core.replay_captured_deterministic());
    }

    #[test]
    fn test_replay_capacity_drops_excess_frames() {
        let sim_cfg = SimConfig {
            replay_capacity_steps: 10,
            ..SimConfig::default()
        };
        let mut core =
            SimulationCore::new(&sim_cfg, &CarConfig::default(), &TrackConfig::default())
                .expect("core builds");
        core.set_car_count(1);
        core.start_replay_capture();
        for _ in 0..25 {
            core.step(&[full_throttle()]);
        }
        assert_eq!(core.replay_len(), 10);
    }

    #[test]
    fn test_replay_check_passes_when_capture_covers_session() {
        let mut core = default_core();
        core.set_car_count(2);
        core.start_replay_capture();
        for _ in 0..300 {
            core.step(&[full_throttle()]);
        }
        assert!(core.replay_captured_deterministic());
    }

    #[test]
    fn test_instances_do_not_interfere() {
        let mut a = default_core();
        let mut b = default_core();
        a.set_car_count(2);
        b.set_car_count(5);

        for _ in 0..100 {
            a.step(&[full_throttle(), full_throttle()]);
        }
        assert_eq!(b.car_count(), 5);
        assert!(b.state().speed_mps.iter().all(|&v| v == 0.0));

        b.reset();
        assert_eq!(a.car_count(), 2);
        assert!(a.state().speed_mps[0] > 0.0);
    }
}
