use crate::error::{RelabelError, Result};
use crate::lookup::LookupTable;
use log::{debug, info};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Turns legend bytes into raw `(value, label)` pairs; codes stay strings
/// until [`LookupTable::from_raw_pairs`] extracts them.
pub trait LegendParser {
    /// Raw `(value, label)` pairs in document order
    fn parse(&self, bytes: &[u8]) -> Result<Vec<(String, String)>>;
}

/// Parse legend bytes and build the lookup table in one step
pub fn load_lookup_table(parser: &dyn LegendParser, bytes: &[u8]) -> Result<LookupTable> {
    let pairs = parser.parse(bytes)?;
    let table = LookupTable::from_raw_pairs(pairs)?;
    info!("Lookup table has {} classes", table.len());
    Ok(table)
}

/// QGIS style file (`.qml`): palette, colour-ramp and category entries
#[derive(Debug, Clone, Copy, Default)]
pub struct QmlLegend;

fn element_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Quoted attribute values may contain '>'
        Regex::new(r#"<(?:paletteEntry|item|category)\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
            .expect("valid element pattern")
    })
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("valid attribute pattern")
    })
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"))
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);").expect("valid entity pattern")
    })
}

/// Decode the predefined XML entities and character references
pub fn unescape_xml(text: &str) -> String {
    entity_pattern()
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let number = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    number.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn attributes(body: &str) -> HashMap<&str, &str> {
    attribute_pattern()
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, value))
        })
        .collect()
}

impl LegendParser for QmlLegend {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<(String, String)>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| RelabelError::Legend(format!("legend is not UTF-8: {}", e)))?;

        let live = comment_pattern().replace_all(text, "");

        let mut pairs = Vec::new();
        for caps in element_pattern().captures_iter(&live) {
            let attrs = attributes(&caps[1]);
            if let (Some(value), Some(label)) = (attrs.get("value"), attrs.get("label")) {
                pairs.push((unescape_xml(value), unescape_xml(label)));
            }
        }

        if pairs.is_empty() {
            return Err(RelabelError::Legend(
                "no entries with both value and label attributes".to_string(),
            ));
        }
        debug!("Parsed {} legend entries", pairs.len());
        Ok(pairs)
    }
}

/// JSON legend: `[{"value": 1400, "label": "Forest"}, ...]`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLegend;

#[derive(Deserialize)]
struct JsonEntry {
    value: serde_json::Value,
    label: String,
}

impl LegendParser for JsonLegend {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<(String, String)>> {
        let entries: Vec<JsonEntry> = serde_json::from_slice(bytes)?;
        if entries.is_empty() {
            return Err(RelabelError::Legend("empty JSON legend".to_string()));
        }
        entries
            .into_iter()
            .map(|entry| {
                let value = match entry.value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    other => {
                        return Err(RelabelError::Legend(format!(
                            "legend value must be a number or string, got {}",
                            other
                        )))
                    }
                };
                Ok((value, entry.label))
            })
            .collect()
    }
}
