/*!
 * Simulation Module
 * Command/status facade, configuration and scenario files
 */

pub mod config;
pub mod engine;
pub mod scenario;

// Re-export for convenience
pub use config::{parse_interval, SimulationConfig};
pub use engine::Simulation;
pub use scenario::{ProcessDef, ResourceDef, Scenario};
