use crate::error::{RelabelError, Result};
use crate::relabel::{Label, RelabeledCell, RelabeledGrid};
use log::debug;
use std::collections::HashMap;

pub const DEFAULT_MISSING_COLOR: &str = "#BEBEBE";

/// Verbose legend label to short display label.
///
/// Best-effort: labels not in the table pass through unchanged and the
/// `Missing` sentinel is never rewritten.
#[derive(Debug, Clone, Default)]
pub struct RecodeTable {
    map: HashMap<String, String>,
}

impl RecodeTable {
    pub fn new(map: HashMap<String, String>) -> Self {
        RecodeTable { map }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn display<'a>(&'a self, label: &'a str) -> &'a str {
        self.map.get(label).map(String::as_str).unwrap_or(label)
    }

    pub fn recode_label(&self, label: &Label) -> Label {
        match label {
            Label::Resolved(text) => Label::Resolved(self.display(text).to_string()),
            Label::Missing => Label::Missing,
        }
    }

    pub fn apply(&self, grid: &RelabeledGrid) -> RelabeledGrid {
        let cells = grid
            .iter()
            .map(|cell| RelabeledCell {
                label: self.recode_label(&cell.label),
                ..cell.clone()
            })
            .collect();
        debug!("Applied {} display-name substitutions", self.map.len());
        RelabeledGrid::from_cells(cells)
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Display label to `#RRGGBB` colour, handed to the renderer with each cell
#[derive(Debug, Clone)]
pub struct Palette {
    colors: HashMap<String, String>,
    missing_color: String,
}

impl Palette {
    pub fn new(colors: HashMap<String, String>, missing_color: Option<String>) -> Result<Self> {
        for (label, color) in &colors {
            if !is_hex_color(color) {
                return Err(RelabelError::InvalidColor {
                    label: label.clone(),
                    color: color.clone(),
                });
            }
        }
        let missing_color = missing_color.unwrap_or_else(|| DEFAULT_MISSING_COLOR.to_string());
        if !is_hex_color(&missing_color) {
            return Err(RelabelError::InvalidColor {
                label: Label::Missing.to_string(),
                color: missing_color,
            });
        }
        Ok(Palette {
            colors,
            missing_color,
        })
    }

    pub fn color_for(&self, label: &Label) -> Option<&str> {
        match label {
            Label::Resolved(text) => self.colors.get(text).map(String::as_str),
            Label::Missing => Some(&self.missing_color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, Grid};
    use crate::lookup::LookupTable;
    use crate::relabel::relabel;

    fn recode_table() -> RecodeTable {
        RecodeTable::new(HashMap::from([(
            "Forest - lowland".to_string(),
            "Forest".to_string(),
        )]))
    }

    #[test]
    fn test_display_passes_through_unknown() {
        let table = recode_table();
        assert_eq!(table.display("Forest - lowland"), "Forest");
        assert_eq!(table.display("Water"), "Water");
    }

    #[test]
    fn test_apply_keeps_missing_and_order() {
        let grid = Grid::from_cells(vec![
            Cell { x: 0.0, y: 0.0, code: 1400 },
            Cell { x: 1.0, y: 0.0, code: 5 },
            Cell { x: 2.0, y: 0.0, code: 9 },
        ]);
        let lookup = LookupTable::from_pairs(vec![(1400, "Forest - lowland"), (5, "Water")]).unwrap();
        let recoded = recode_table().apply(&relabel(&grid, &lookup));

        let labels: Vec<String> = recoded.iter().map(|c| c.label.to_string()).collect();
        assert_eq!(labels, vec!["Forest", "Water", "Missing"]);
        assert!(recoded.cells()[2].label.is_missing());
        assert_eq!(recoded.cells()[0].code, 1400);
    }

    #[test]
    fn test_merged_labels_summarised_once() {
        let grid = Grid::from_cells(vec![
            Cell { x: 0.0, y: 0.0, code: 1400 },
            Cell { x: 1.0, y: 0.0, code: 1500 },
            Cell { x: 2.0, y: 0.0, code: 1400 },
        ]);
        let lookup =
            LookupTable::from_pairs(vec![(1400, "Forest - lowland"), (1500, "Forest - upland")]).unwrap();
        let recode = RecodeTable::new(HashMap::from([
            ("Forest - lowland".to_string(), "Forest".to_string()),
            ("Forest - upland".to_string(), "Forest".to_string()),
        ]));
        let summary = recode.apply(&relabel(&grid, &lookup)).class_summary();

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].label, Label::Resolved("Forest".to_string()));
        assert_eq!(summary[0].codes, vec![1400, 1500]);
        assert_eq!(summary[0].cells, 3);
    }

    #[test]
    fn test_recode_to_sentinel_text_stays_resolved() {
        let table = RecodeTable::new(HashMap::from([("Unknown".to_string(), "Missing".to_string())]));
        let label = table.recode_label(&Label::Resolved("Unknown".to_string()));
        assert!(!label.is_missing());
    }

    #[test]
    fn test_palette_colors() {
        let palette = Palette::new(
            HashMap::from([("Forest".to_string(), "#1a9641".to_string())]),
            None,
        )
        .unwrap();
        assert_eq!(palette.color_for(&Label::Resolved("Forest".into())), Some("#1a9641"));
        assert_eq!(palette.color_for(&Label::Resolved("Urban".into())), None);
        assert_eq!(palette.color_for(&Label::Missing), Some(DEFAULT_MISSING_COLOR));
    }

    #[test]
    fn test_palette_rejects_bad_color() {
        let err = Palette::new(HashMap::from([("Forest".to_string(), "green".to_string())]), None)
            .unwrap_err();
        assert!(matches!(err, RelabelError::InvalidColor { .. }));
        assert!(Palette::new(HashMap::new(), Some("#12345".to_string())).is_err());
    }
}
