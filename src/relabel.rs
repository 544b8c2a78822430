use crate::grid::{Cell, Grid};
use crate::lookup::LookupTable;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const MISSING_LABEL: &str = "Missing";

/// Resolved class name, or the sentinel for codes absent from the legend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Resolved(String),
    Missing,
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Resolved(label) => label,
            Label::Missing => MISSING_LABEL,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Label::Missing)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelabeledCell {
    pub x: f64,
    pub y: f64,
    pub code: i64,
    pub label: Label,
}

/// Cell count for one label, with every code that carries it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    pub label: Label,
    pub codes: Vec<i64>,
    pub cells: usize,
    pub fraction: f64,
}

/// Grid cells with their labels, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelabeledGrid {
    cells: Vec<RelabeledCell>,
}

fn label_cell(cell: &Cell, table: &LookupTable) -> RelabeledCell {
    let label = match table.get(cell.code) {
        Some(label) => Label::Resolved(label.to_string()),
        None => Label::Missing,
    };
    RelabeledCell {
        x: cell.x,
        y: cell.y,
        code: cell.code,
        label,
    }
}

/// Left join of grid codes against the lookup table.
///
/// Every cell survives; codes absent from the table get [`Label::Missing`].
pub fn relabel(grid: &Grid, table: &LookupTable) -> RelabeledGrid {
    let cells: Vec<RelabeledCell> = grid.iter().map(|cell| label_cell(cell, table)).collect();
    let relabeled = RelabeledGrid { cells };
    report(&relabeled);
    relabeled
}

/// Same as [`relabel`], with cells labelled on the rayon pool
pub fn relabel_par(grid: &Grid, table: &LookupTable) -> RelabeledGrid {
    let cells: Vec<RelabeledCell> = grid
        .cells()
        .par_iter()
        .map(|cell| label_cell(cell, table))
        .collect();
    let relabeled = RelabeledGrid { cells };
    report(&relabeled);
    relabeled
}

fn report(relabeled: &RelabeledGrid) {
    let missing = relabeled.missing_count();
    if missing > 0 {
        warn!(
            "{} of {} cells have codes not in the legend: {:?}",
            missing,
            relabeled.len(),
            relabeled.unresolved_codes()
        );
    } else {
        debug!("All {} cells resolved", relabeled.len());
    }
}

impl RelabeledGrid {
    pub(crate) fn from_cells(cells: Vec<RelabeledCell>) -> Self {
        RelabeledGrid { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RelabeledCell> {
        self.cells.iter()
    }

    pub fn cells(&self) -> &[RelabeledCell] {
        &self.cells
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.label.is_missing()).count()
    }

    /// Sorted resolved labels, excluding the sentinel
    pub fn distinct_labels(&self) -> Vec<&str> {
        let labels: BTreeSet<&str> = self
            .cells
            .iter()
            .filter(|c| !c.label.is_missing())
            .map(|c| c.label.as_str())
            .collect();
        labels.into_iter().collect()
    }

    /// Sorted codes that fell back to the sentinel
    pub fn unresolved_codes(&self) -> Vec<i64> {
        let codes: BTreeSet<i64> = self
            .cells
            .iter()
            .filter(|c| c.label.is_missing())
            .map(|c| c.code)
            .collect();
        codes.into_iter().collect()
    }

    /// Per-label cell counts, ordered by label with `Missing` last.
    /// Labels merged by a recode are counted once.
    pub fn class_summary(&self) -> Vec<ClassSummary> {
        let mut counts: BTreeMap<&Label, (BTreeSet<i64>, usize)> = BTreeMap::new();
        for cell in &self.cells {
            let entry = counts.entry(&cell.label).or_default();
            entry.0.insert(cell.code);
            entry.1 += 1;
        }

        let total = self.cells.len() as f64;
        let summary: Vec<ClassSummary> = counts
            .into_iter()
            .map(|(label, (codes, cells))| ClassSummary {
                label: label.clone(),
                codes: codes.into_iter().collect(),
                cells,
                fraction: cells as f64 / total,
            })
            .collect();

        info!("{} classes in relabeled grid", summary.len());
        summary
    }
}
