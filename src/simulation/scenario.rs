/*!
 * Scenario Files
 *
 * JSON description of the resources and processes to start a simulation
 * with. Loading goes through the normal command surface, so every entry is
 * validated exactly like an interactive command.
 */

use crate::core::errors::SimResult;
use crate::core::id::ResourceId;
use crate::process::RequestPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: u32,
    pub name: String,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDef {
    pub id: u32,
    pub request_period_secs: f64,
    pub hold_secs: f64,
    #[serde(default)]
    pub policy: RequestPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub processes: Vec<ProcessDef>,
}

impl Scenario {
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Two single-unit resources and three processes
    ///
    /// P0 and P1 take the two resources in opposite order and hold long
    /// enough to ask for the second one, so a circular wait forms within a
    /// few seconds. P2 picks at random and holds briefly.
    pub fn demo() -> Self {
        Self {
            resources: vec![
                ResourceDef {
                    id: 0,
                    name: "Printer".to_string(),
                    total: 1,
                },
                ResourceDef {
                    id: 1,
                    name: "Scanner".to_string(),
                    total: 1,
                },
            ],
            processes: vec![
                ProcessDef {
                    id: 0,
                    request_period_secs: 1.0,
                    hold_secs: 4.0,
                    policy: RequestPolicy::Cycle(vec![ResourceId(0), ResourceId(1)]),
                    seed: None,
                },
                ProcessDef {
                    id: 1,
                    request_period_secs: 1.0,
                    hold_secs: 4.0,
                    policy: RequestPolicy::Cycle(vec![ResourceId(1), ResourceId(0)]),
                    seed: None,
                },
                ProcessDef {
                    id: 2,
                    request_period_secs: 2.0,
                    hold_secs: 1.0,
                    policy: RequestPolicy::Random,
                    seed: None,
                },
            ],
        }
    }
}
