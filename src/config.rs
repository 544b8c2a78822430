use crate::error::Result;
use crate::recode::{Palette, RecodeTable};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Presentation policy for the renderer: display names and colours.
///
/// ```json
/// {
///   "recode": { "Forest - lowland": "Forest" },
///   "palette": { "Forest": "#1a9641" },
///   "missing_color": "#bebebe"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    /// Legend label to display label
    pub recode: HashMap<String, String>,
    /// Display label to `#RRGGBB`
    pub palette: HashMap<String, String>,
    pub missing_color: Option<String>,
}

impl StyleConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading style config: {}", path.display());
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    pub fn recode_table(&self) -> RecodeTable {
        RecodeTable::new(self.recode.clone())
    }

    /// `None` when no palette section was given
    pub fn palette(&self) -> Result<Option<Palette>> {
        if self.palette.is_empty() {
            return Ok(None);
        }
        Palette::new(self.palette.clone(), self.missing_color.clone()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelabelError;
    use crate::relabel::Label;

    #[test]
    fn test_sections_default_to_empty() {
        let config: StyleConfig = serde_json::from_str(r#"{"recode": {"A long": "A"}}"#).unwrap();
        assert_eq!(config.recode.len(), 1);
        assert!(config.palette.is_empty());
        assert!(config.palette().unwrap().is_none());
        assert_eq!(config.recode_table().display("A long"), "A");
    }

    #[test]
    fn test_palette_section() {
        let config: StyleConfig = serde_json::from_str(
            r##"{"palette": {"Forest": "#1a9641"}, "missing_color": "#000000"}"##,
        )
        .unwrap();
        let palette = config.palette().unwrap().unwrap();
        assert_eq!(palette.color_for(&Label::Missing), Some("#000000"));
    }

    #[test]
    fn test_invalid_palette_color() {
        let config: StyleConfig =
            serde_json::from_str(r#"{"palette": {"Forest": "forestgreen"}}"#).unwrap();
        assert!(matches!(config.palette(), Err(RelabelError::InvalidColor { .. })));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.json");
        std::fs::write(&path, r#"{"recode": {"Water body": "Water"}}"#).unwrap();
        let config = StyleConfig::from_file(&path).unwrap();
        assert_eq!(config.recode_table().display("Water body"), "Water");
    }
}
