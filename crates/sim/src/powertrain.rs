use apexsim_shared::constants::*;
use apexsim_shared::PowertrainConfig;

/// Torque-curve powertrain with an automatic shift policy. Owns its copy
/// of the curve; gear count is silently capped to the table size.
#[derive(Debug, Clone)]
pub struct Powertrain {
    gear_ratios: [f32; MAX_GEARS],
    gear_count: u32,
    final_drive: f32,
    driveline_efficiency: f32,
    shift_rpm_up: f32,
    shift_rpm_down: f32,
    curve_rpm: Vec<f32>,
    curve_torque: Vec<f32>,
}

impl Powertrain {
    pub fn new(cfg: &PowertrainConfig) -> Self {
        Self {
            gear_ratios: cfg.gear_ratios,
            gear_count: cfg.gear_count.clamp(1, MAX_GEARS as u32),
            final_drive: cfg.final_drive,
            driveline_efficiency: cfg.driveline_efficiency,
            shift_rpm_up: cfg.shift_rpm_up,
            shift_rpm_down: cfg.shift_rpm_down,
            curve_rpm: cfg.torque_curve.iter().map(|p| p.rpm).collect(),
            curve_torque: cfg.torque_curve.iter().map(|p| p.torque_nm).collect(),
        }
    }

    pub fn gear_count(&self) -> u32 {
        self.gear_count
    }

    /// Overall ratio from engine to wheel for a 1-based gear.
    pub fn ratio(&self, gear: u32) -> f32 {
        let idx = (gear.clamp(1, self.gear_count) - 1) as usize;
        self.gear_ratios[idx] * self.final_drive
    }

    /// At most one shift per step, driven by the previous step's rpm.
    pub fn auto_shift(&self, gear: u32, engine_rpm: f32) -> u32 {
        if self.gear_count < 2 {
            return gear;
        }
        if engine_rpm > self.shift_rpm_up && gear < self.gear_count {
            gear + 1
        } else if engine_rpm < self.shift_rpm_down && gear > 1 {
            gear - 1
        } else {
            gear
        }
    }

    /// Engine speed implied by wheel speed in the given gear, clamped to
    /// the operating band.
    pub fn rpm_from_speed(&self, speed_mps: f32, gear: u32, tire_radius_m: f32) -> f32 {
        let wheel_radps = speed_mps / tire_radius_m.max(MIN_TIRE_RADIUS_M);
        (wheel_radps * self.ratio(gear) * RADPS_TO_RPM).clamp(MIN_RPM, MAX_RPM)
    }

    /// Piecewise-linear torque lookup with flat extrapolation outside the
    /// curve's rpm range.
    pub fn torque_at(&self, rpm: f32) -> f32 {
        let n = self.curve_rpm.len();
        if n == 0 {
            return 0.0;
        }
        if rpm <= self.curve_rpm[0] {
            return self.curve_torque[0];
        }
        if rpm >= self.curve_rpm[n - 1] {
            return self.curve_torque[n - 1];
        }

        let i1 = self.curve_rpm.partition_point(|&r| r <= rpm);
        let i0 = i1 - 1;
        let span = self.curve_rpm[i1] - self.curve_rpm[i0];
        if span <= 0.0 {
            return self.curve_torque[i0];
        }
        let t = (rpm - self.curve_rpm[i0]) / span;
        self.curve_torque[i0] + (self.curve_torque[i1] - self.curve_torque[i0]) * t
    }

    /// Tractive force at the contact patch before the grip limit.
    pub fn drive_force(&self, rpm: f32, throttle: f32, gear: u32, tire_radius_m: f32) -> f32 {
        let engine_torque = self.torque_at(rpm) * throttle;
        let drive_torque = engine_torque * self.ratio(gear) * self.driveline_efficiency;
        drive_torque / tire_radius_m.max(MIN_TIRE_RADIUS_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_powertrain() -> Powertrain {
        Powertrain::new(&PowertrainConfig::default())
    }

    #[test]
    fn test_torque_flat_outside_curve() {
        let pt = default_powertrain();
        assert_eq!(pt.torque_at(1000.0), 510.0);
        assert_eq!(pt.torque_at(4000.0), 510.0);
        assert_eq!(pt.torque_at(20_000.0), 640.0);
    }

    #[test]
    fn test_torque_interpolates_linearly() {
        let pt = default_powertrain();
        assert!((pt.torque_at(5000.0) - 575.0).abs() < 1e-3);
        assert!((pt.torque_at(8750.0) - 785.0).abs() < 1e-3);
    }

    #[test]
    fn test_gear_count_capped_to_table() {
        let cfg = PowertrainConfig {
            gear_count: 12,
            ..PowertrainConfig::default()
        };
        let pt = Powertrain::new(&cfg);
        assert_eq!(pt.gear_count(), MAX_GEARS as u32);
    }

    #[test]
    fn test_auto_shift_hysteresis() {
        let pt = default_powertrain();
        assert_eq!(pt.auto_shift(1, 12_000.0), 2);
        assert_eq!(pt.auto_shift(3, 5000.0), 2);
        assert_eq!(pt.auto_shift(3, 8000.0), 3);
        // Saturated at the ends of the box
        assert_eq!(pt.auto_shift(8, 12_500.0), 8);
        assert_eq!(pt.auto_shift(1, 4500.0), 1);
    }

    #[test]
    fn test_single_gear_never_shifts() {
        let cfg = PowertrainConfig {
            gear_count: 1,
            ..PowertrainConfig::default()
        };
        let pt = Powertrain::new(&cfg);
        assert_eq!(pt.auto_shift(1, 12_900.0), 1);
    }

    #[test]
    fn test_rpm_clamped_to_operating_band() {
        let pt = default_powertrain();
        assert_eq!(pt.rpm_from_speed(0.0, 1, 0.34), MIN_RPM);
        assert_eq!(pt.rpm_from_speed(500.0, 1, 0.34), MAX_RPM);
    }

    #[test]
    fn test_tiny_tire_radius_guarded() {
        let pt = default_powertrain();
        let rpm = pt.rpm_from_speed(10.0, 1, 0.0);
        assert!(rpm.is_finite());
        assert!(rpm <= MAX_RPM);
    }
}
