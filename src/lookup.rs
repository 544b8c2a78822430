use crate::error::{RelabelError, Result};
use crate::grid::integral;
use log::debug;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A minus sign only counts when it does not follow a word character ("class-5" is 5)
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:(?:^|[^0-9A-Za-z])(-))?(\d+(?:\.\d+)?)").expect("valid code pattern")
    })
}

/// Extract the first numeric token from a decorated legend value.
///
/// `"1400"`, `"LC1400"` and `"class 1400 (lowland)"` give 1400, `"12.0"` gives 12.
/// Returns `None` when there is no number or the number is not integral.
pub fn extract_code(value: &str) -> Option<i64> {
    let caps = code_pattern().captures(value)?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let number = format!("{}{}", sign, &caps[2]);
    match number.parse::<i64>() {
        Ok(code) => Some(code),
        Err(_) => number.parse::<f64>().ok().and_then(integral),
    }
}

/// Unique code to label mapping with an O(1) hash index
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: Vec<(i64, String)>,
    index: HashMap<i64, usize>,
}

impl LookupTable {
    /// Build from numeric pairs. A code repeated with the same label is
    /// collapsed; repeated with a different label it is ambiguous.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        let mut table = LookupTable::default();
        for (code, label) in pairs {
            let label = label.into();
            if let Some(&pos) = table.index.get(&code) {
                let existing = &table.entries[pos].1;
                if *existing != label {
                    return Err(RelabelError::MalformedLookup {
                        code,
                        first: existing.clone(),
                        second: label,
                    });
                }
                debug!("Collapsing repeated legend entry {} -> {:?}", code, label);
                continue;
            }
            table.index.insert(code, table.entries.len());
            table.entries.push((code, label));
        }
        Ok(table)
    }

    /// Build from pairs whose codes are still strings, as legend files store them
    pub fn from_raw_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let parsed = pairs
            .into_iter()
            .map(|(value, label)| match extract_code(&value) {
                Some(code) => Ok((code, label)),
                None => Err(RelabelError::UnparseableCode(value)),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_pairs(parsed)
    }

    pub fn get(&self, code: i64) -> Option<&str> {
        self.index.get(&code).map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.entries.iter().map(|(code, label)| (*code, label.as_str()))
    }
}
