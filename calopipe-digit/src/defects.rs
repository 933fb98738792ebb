//! Run/event indexed defect table.
//!
//! The table is a JSON document with a top-level `runs` list:
//!
//! ```json
//! {"runs": [{"StartEventNumber": 0, "EndEventNumber": 10,
//!            "DeadModules": true, "NoiseStdFactor": 1.0, "Cells": ["M1"]}]}
//! ```
//!
//! Numeric `Cells` entries are module indices in dead rules and cell hashes
//! in noise rules. String entries always name modules.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use calopipe_core::CellId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// One entry of a rule's `Cells` list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefectTarget {
    /// Module index or cell hash, depending on the rule kind.
    Id(u64),
    /// Module name.
    Module(String),
}

/// One block of affected events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefectRule {
    /// First affected event number (inclusive).
    #[serde(rename = "StartEventNumber")]
    pub start_event: u64,
    /// Last affected event number (inclusive).
    #[serde(rename = "EndEventNumber")]
    pub end_event: u64,
    /// Whether the listed modules are dead rather than noisy.
    #[serde(rename = "DeadModules")]
    pub dead_modules: bool,
    /// Extra noise deviation, in units of the nominal one.
    #[serde(rename = "NoiseStdFactor")]
    pub noise_std_factor: f64,
    /// Affected modules or cells.
    #[serde(rename = "Cells")]
    pub cells: Vec<DefectTarget>,
}

impl DefectRule {
    /// Returns true if the event number lies inside the rule's range.
    pub fn contains(&self, event_number: u64) -> bool {
        (self.start_event..=self.end_event).contains(&event_number)
    }
}

/// Ordered list of defect rules.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefectTable {
    pub runs: Vec<DefectRule>,
}

impl DefectTable {
    /// Parses and validates a table.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Reads, parses and validates a table file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks every rule.
    pub fn validate(&self) -> Result<()> {
        for (index, rule) in self.runs.iter().enumerate() {
            if rule.start_event > rule.end_event {
                return Err(Error::DefectRule {
                    index,
                    reason: format!(
                        "start event {} is after end event {}",
                        rule.start_event, rule.end_event
                    ),
                });
            }
            if !(rule.noise_std_factor >= 0.0 && rule.noise_std_factor.is_finite()) {
                return Err(Error::DefectRule {
                    index,
                    reason: format!("noise factor {} must be >= 0", rule.noise_std_factor),
                });
            }
        }
        Ok(())
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Condition of one cell in one event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Defect {
    /// Signal removed.
    Dead,
    /// Extra noise with deviation `factor * nominal`.
    Noisy { factor: f64 },
}

#[derive(Clone, Debug)]
struct IndexedRule {
    order: usize,
    start: u64,
    end: u64,
    dead: bool,
    factor: f64,
    modules: HashSet<u64>,
    cells: HashSet<u64>,
}

impl IndexedRule {
    fn matches(&self, hash: u64) -> bool {
        self.modules.contains(&CellId::module_of(hash)) || self.cells.contains(&hash)
    }
}

/// Defect rules sorted by start event for interval lookups.
///
/// When several rules cover the same cell and event, the one listed first
/// in the table wins.
#[derive(Clone, Debug, Default)]
pub struct DefectIndex {
    rules: Vec<IndexedRule>,
}

impl DefectIndex {
    /// Resolves module names with `module_index` and sorts the rules.
    pub fn build<F>(table: &DefectTable, module_index: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<u32>,
    {
        table.validate()?;
        let mut rules = Vec::with_capacity(table.runs.len());
        for (order, rule) in table.runs.iter().enumerate() {
            let mut modules = HashSet::new();
            let mut cells = HashSet::new();
            for target in &rule.cells {
                match target {
                    DefectTarget::Id(id) if rule.dead_modules => {
                        modules.insert(*id);
                    }
                    DefectTarget::Id(hash) => {
                        cells.insert(*hash);
                    }
                    DefectTarget::Module(name) => {
                        let module = module_index(name).ok_or_else(|| Error::UnknownModule {
                            index: order,
                            module: name.clone(),
                        })?;
                        modules.insert(u64::from(module));
                    }
                }
            }
            rules.push(IndexedRule {
                order,
                start: rule.start_event,
                end: rule.end_event,
                dead: rule.dead_modules,
                factor: rule.noise_std_factor,
                modules,
                cells,
            });
        }
        rules.sort_by_key(|r| r.start);
        info!(rules = rules.len(), "Defect table indexed");
        Ok(Self { rules })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if any rule covers the event.
    pub fn covers(&self, event_number: u64) -> bool {
        self.candidates(event_number).next().is_some()
    }

    /// Condition of a cell in an event, `None` when healthy.
    pub fn lookup(&self, event_number: u64, hash: u64) -> Option<Defect> {
        self.candidates(event_number)
            .filter(|r| r.matches(hash))
            .min_by_key(|r| r.order)
            .map(|r| {
                if r.dead {
                    Defect::Dead
                } else {
                    Defect::Noisy { factor: r.factor }
                }
            })
    }

    fn candidates(&self, event_number: u64) -> impl Iterator<Item = &IndexedRule> {
        let upto = self.rules.partition_point(|r| r.start <= event_number);
        self.rules[..upto]
            .iter()
            .filter(move |r| r.end >= event_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calopipe_core::{CaloSampling, MODULE_STRIDE};

    fn resolve(name: &str) -> Option<u32> {
        match name {
            "M0" => Some(0),
            "M1" => Some(1),
            _ => None,
        }
    }

    #[test]
    fn test_dead_module_by_name() {
        let table = DefectTable::from_json_str(
            r#"{"runs": [{"StartEventNumber": 0, "EndEventNumber": 10,
                         "DeadModules": true, "NoiseStdFactor": 1.0, "Cells": ["M1"]}]}"#,
        )
        .unwrap();
        let index = DefectIndex::build(&table, resolve).unwrap();
        let hash = CellId::new(CaloSampling::EMB2, 1, 20, 30).hash();
        assert_eq!(index.lookup(5, hash), Some(Defect::Dead));
        assert_eq!(index.lookup(10, hash), Some(Defect::Dead));
        assert_eq!(index.lookup(11, hash), None);
        assert_eq!(index.lookup(5, hash - MODULE_STRIDE), None);
    }

    #[test]
    fn test_numeric_targets_depend_on_rule_kind() {
        let hash = CellId::new(CaloSampling::EMB2, 0, 4, 7).hash();
        let table = DefectTable {
            runs: vec![
                DefectRule {
                    start_event: 0,
                    end_event: 5,
                    dead_modules: false,
                    noise_std_factor: 3.0,
                    cells: vec![DefectTarget::Id(hash)],
                },
                DefectRule {
                    start_event: 6,
                    end_event: 9,
                    dead_modules: true,
                    noise_std_factor: 0.0,
                    cells: vec![DefectTarget::Id(0)],
                },
            ],
        };
        let index = DefectIndex::build(&table, resolve).unwrap();
        assert_eq!(index.lookup(2, hash), Some(Defect::Noisy { factor: 3.0 }));
        assert_eq!(index.lookup(2, hash + 1), None);
        assert_eq!(index.lookup(7, hash + 1), Some(Defect::Dead));
    }

    #[test]
    fn test_first_listed_rule_wins_on_overlap() {
        let table = DefectTable {
            runs: vec![
                DefectRule {
                    start_event: 10,
                    end_event: 20,
                    dead_modules: false,
                    noise_std_factor: 2.0,
                    cells: vec![DefectTarget::Module("M0".into())],
                },
                DefectRule {
                    start_event: 0,
                    end_event: 30,
                    dead_modules: true,
                    noise_std_factor: 0.0,
                    cells: vec![DefectTarget::Module("M0".into())],
                },
            ],
        };
        let index = DefectIndex::build(&table, resolve).unwrap();
        assert_eq!(index.lookup(15, 42), Some(Defect::Noisy { factor: 2.0 }));
        assert_eq!(index.lookup(25, 42), Some(Defect::Dead));
        assert!(index.covers(0));
        assert!(!index.covers(31));
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let json = r#"{"runs": [{"StartEventNumber": 0, "EndEventNumber": 10, "Cells": []}]}"#;
        assert!(matches!(DefectTable::from_json_str(json), Err(Error::Json(_))));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let json = r#"{"runs": [{"StartEventNumber": 9, "EndEventNumber": 1,
                                 "DeadModules": false, "NoiseStdFactor": 1.0, "Cells": []}]}"#;
        assert!(matches!(
            DefectTable::from_json_str(json),
            Err(Error::DefectRule { index: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_module_rejected() {
        let table = DefectTable {
            runs: vec![DefectRule {
                start_event: 0,
                end_event: 1,
                dead_modules: true,
                noise_std_factor: 1.0,
                cells: vec![DefectTarget::Module("M9".into())],
            }],
        };
        assert!(matches!(
            DefectIndex::build(&table, resolve),
            Err(Error::UnknownModule { .. })
        ));
    }
}
