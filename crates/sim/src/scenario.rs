use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use apexsim_shared::{CarConfig, SimConfig, TrackConfig};

/// One JSON file bundling everything a core needs. Missing sections fall
/// back to the library defaults, so `{}` is a valid scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub car: CarConfig,
    #[serde(default)]
    pub track: TrackConfig,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let scenario: Scenario =
        serde_json::from_str(&text).map_err(|source| ScenarioError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    validate(&scenario)?;
    Ok(scenario)
}

fn validate(scenario: &Scenario) -> Result<(), ScenarioError> {
    if scenario.track.nodes.len() < 2 {
        return Err(ScenarioError::Invalid(format!(
            "track needs at least 2 nodes, got {}",
            scenario.track.nodes.len()
        )));
    }
    if scenario.track.length_m <= 1.0 {
        return Err(ScenarioError::Invalid(format!(
            "track length must exceed 1 m, got {}",
            scenario.track.length_m
        )));
    }
    if !(scenario.sim.fixed_dt > 0.0) {
        return Err(ScenarioError::Invalid(format!(
            "fixed_dt must be positive, got {}",
            scenario.sim.fixed_dt
        )));
    }
    if scenario.sim.max_cars == 0 {
        return Err(ScenarioError::Invalid("max_cars must be at least 1".into()));
    }

    let curve = &scenario.car.powertrain.torque_curve;
    if curve.len() < 2 {
        return Err(ScenarioError::Invalid(format!(
            "torque curve needs at least 2 points, got {}",
            curve.len()
        )));
    }
    for pair in curve.windows(2) {
        if pair[1].rpm <= pair[0].rpm {
            return Err(ScenarioError::Invalid(format!(
                "torque curve rpm must be strictly increasing ({} then {})",
                pair[0].rpm, pair[1].rpm
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default_scenario() {
        let scenario: Scenario = serde_json::from_str("{}").expect("parses");
        assert!(validate(&scenario).is_ok());
        assert_eq!(scenario.sim.max_cars, SimConfig::default().max_cars);
        assert_eq!(scenario.track.nodes.len(), 16);
    }

    #[test]
    fn test_roundtrip_preserves_configs() {
        let scenario = Scenario::default();
        let json = serde_json::to_string(&scenario).expect("serializes");
        let back: Scenario = serde_json::from_str(&json).expect("parses");
        assert_eq!(back.car.mass_kg, scenario.car.mass_kg);
        assert_eq!(back.track.nodes, scenario.track.nodes);
    }

    #[test]
    fn test_non_monotone_torque_curve_rejected() {
        let mut scenario = Scenario::default();
        scenario.car.powertrain.torque_curve[3].rpm = 100.0;
        assert!(matches!(
            validate(&scenario),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_sparse_track_rejected() {
        let mut scenario = Scenario::default();
        scenario.track.nodes.truncate(1);
        assert!(matches!(
            validate(&scenario),
            Err(ScenarioError::Invalid(_))
        ));
    }
}
