pub mod core;
pub mod powertrain;
pub mod scenario;
pub mod soa;
pub mod track;

pub use self::core::{BuildError, SimulationCore};
pub use self::powertrain::Powertrain;
pub use self::scenario::{load_scenario, Scenario, ScenarioError};
pub use self::soa::CarStateSoA;
pub use self::track::{TrackError, TrackProfile};
