/*!
 * Allocation Snapshot
 * Derived Allocation / Request / Available matrices and their text rendering
 */

use crate::core::id::ProcessId;
use crate::resource::ResourceSummary;
use serde::Serialize;
use std::fmt::Write;

const EMPTY_SYSTEM: &str = "No processes or resources registered.";
const CELL: usize = 8;

/// Point-in-time matrices built under one coordinator lock
///
/// Rows follow process registration order, columns resource registration
/// order. Never authoritative; rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSnapshot {
    pub processes: Vec<ProcessId>,
    pub resources: Vec<ResourceSummary>,
    /// `allocation[i][j]`: units of resource j held by process i
    pub allocation: Vec<Vec<u32>>,
    /// `request[i][j]`: 1 if process i waits for resource j
    pub request: Vec<Vec<u32>>,
    /// `available[j]`: free units of resource j
    pub available: Vec<u32>,
}

impl AllocationSnapshot {
    pub fn empty() -> Self {
        Self {
            processes: Vec::new(),
            resources: Vec::new(),
            allocation: Vec::new(),
            request: Vec::new(),
            available: Vec::new(),
        }
    }

    #[inline]
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    #[inline]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty() || self.resources.is_empty()
    }

    /// Conservation check: `available[j] + sum_i allocation[i][j] == total[j]`
    pub fn conservation_violations(&self) -> Vec<String> {
        self.resources
            .iter()
            .enumerate()
            .filter_map(|(j, res)| {
                let held: u32 = self.allocation.iter().map(|row| row[j]).sum();
                let accounted = self.available[j] + held;
                (accounted != res.total).then(|| {
                    format!(
                        "{}: available {} + allocated {} != total {}",
                        res.name, self.available[j], held, res.total
                    )
                })
            })
            .collect()
    }

    pub fn render_allocation(&self) -> String {
        self.render_matrix(&self.allocation)
    }

    pub fn render_request(&self) -> String {
        self.render_matrix(&self.request)
    }

    /// `Available: R0: 1 | R1: 0`
    pub fn render_available(&self) -> String {
        let cells: Vec<String> = self
            .resources
            .iter()
            .zip(&self.available)
            .map(|(res, free)| format!("{}: {}", res.name, free))
            .collect();
        format!("Available: {}", cells.join(" | "))
    }

    fn render_matrix(&self, rows: &[Vec<u32>]) -> String {
        if self.is_empty() {
            return EMPTY_SYSTEM.to_string();
        }

        let mut out = String::new();
        let _ = write!(out, "{:<CELL$}", "");
        for res in &self.resources {
            let _ = write!(out, "{:<CELL$}", res.name);
        }
        out.push('\n');

        for (pid, row) in self.processes.iter().zip(rows) {
            let _ = write!(out, "{:<CELL$}", format!("P{}", pid));
            for cell in row {
                let _ = write!(out, "{:<CELL$}", cell);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id::ResourceId;
    use pretty_assertions::assert_eq;

    fn two_by_two() -> AllocationSnapshot {
        AllocationSnapshot {
            processes: vec![ProcessId(0), ProcessId(1)],
            resources: vec![
                ResourceSummary {
                    id: ResourceId(0),
                    name: "R0".into(),
                    available: 0,
                    total: 1,
                },
                ResourceSummary {
                    id: ResourceId(1),
                    name: "R1".into(),
                    available: 1,
                    total: 2,
                },
            ],
            allocation: vec![vec![1, 0], vec![0, 1]],
            request: vec![vec![0, 1], vec![0, 0]],
            available: vec![0, 1],
        }
    }

    #[test]
    fn test_render_allocation_table() {
        let text = two_by_two().render_allocation();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].trim_end(), "        R0      R1");
        assert_eq!(lines[1].trim_end(), "P0      1       0");
        assert_eq!(lines[2].trim_end(), "P1      0       1");
    }

    #[test]
    fn test_render_available() {
        assert_eq!(two_by_two().render_available(), "Available: R0: 0 | R1: 1");
        assert_eq!(AllocationSnapshot::empty().render_available(), "Available: ");
    }

    #[test]
    fn test_render_empty_system() {
        assert_eq!(AllocationSnapshot::empty().render_request(), EMPTY_SYSTEM);
    }

    #[test]
    fn test_conservation() {
        assert!(two_by_two().conservation_violations().is_empty());

        let mut broken = two_by_two();
        broken.available[0] = 1;
        assert_eq!(broken.conservation_violations().len(), 1);
    }
}
