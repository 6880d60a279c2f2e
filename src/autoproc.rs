//! `autoPROC.xml` normalization.
//!
//! The report is read as text (UTF-8, falling back to Latin-1), parsed into
//! a generic nested mapping and reshaped into an [`AutoprocRecord`]:
//!
//! ```text
//! AutoProcContainer
//! ├── AutoProc                       → cell_data + pass-through fields
//! └── AutoProcScalingContainer
//!     └── AutoProcScalingStatistics  → scale_data (first entry only)
//! ```
//!
//! Missing containers yield empty sections. Read and parse failures are
//! logged by [`read_autoproc`] and produce an empty record.

use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{error, warn};

use crate::error::CollectError;
use crate::models::AutoprocRecord;

/// Lower-cased source field name → report label for scaling statistics.
pub const SCALING_STATISTICS_LABELS: [(&str, &str); 18] = [
    ("scalingstatisticstype", "Scaling Statistics Type"),
    ("resolutionlimitlow", "Resolution Limit Low"),
    ("resolutionlimithigh", "Resolution Limit High"),
    ("rmerge", "RMerge"),
    ("rmeaswithiniplusiminus", "RMeas Within IPlus IMinus"),
    ("rmeasalliplusiminus", "RMeas All IPlus IMinus"),
    ("rpimwithiniplusiminus", "RPim Within IPlus IMinus"),
    ("rpimalliplusiminus", "RPim All IPlus IMinus"),
    ("ntotalobservations", "N Total Observations"),
    ("ntotaluniqueobservations", "N Total Unique Observations"),
    ("meanioversigi", "Mean I Over SigI"),
    ("completeness", "Completeness"),
    ("multiplicity", "Multiplicity"),
    ("cchalf", "CC Half"),
    ("anomalouscompleteness", "Anomalous Completeness"),
    ("anomalousmultiplicity", "Anomalous Multiplicity"),
    ("ccanomalous", "CC Anomalous"),
    ("danooversigdanotool", "DAno Over SigDAno Tool"),
];

const CONTAINER: &str = "AutoProcContainer";
const AUTOPROC: &str = "AutoProc";
const SCALING_CONTAINER: &str = "AutoProcScalingContainer";
const SCALING_STATISTICS: &str = "AutoProcScalingStatistics";

/// Tolerant entry point used by the `processing` extractor.
pub fn read_autoproc(path: &Path) -> AutoprocRecord {
    if !path.is_file() {
        warn!("XML file not found: {}", path.display());
        return AutoprocRecord::default();
    }
    match load_autoproc(path) {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!("Empty XML file: {}", path.display());
            AutoprocRecord::default()
        }
        Err(e) => {
            error!("{}", e);
            AutoprocRecord::default()
        }
    }
}

/// Read, parse and normalize one report. `Ok(None)` for a blank file.
pub fn load_autoproc(path: &Path) -> Result<Option<AutoprocRecord>, CollectError> {
    let text = read_xml_text(path)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let doc = parse_xml(&text).map_err(|message| CollectError::XmlParse {
        path: path.to_path_buf(),
        message,
    })?;
    normalize(&doc)
        .map(Some)
        .map_err(|message| CollectError::XmlParse {
            path: path.to_path_buf(),
            message,
        })
}

/// File contents as text: UTF-8 when valid, otherwise Latin-1.
pub fn read_xml_text(path: &Path) -> Result<String, CollectError> {
    let bytes = std::fs::read(path).map_err(|e| CollectError::XmlRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    };
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let mut children = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            children.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            children,
            text: String::new(),
        })
    }

    /// Text-only elements collapse to their text, empty ones to null.
    fn close(self) -> (String, Value) {
        let value = if self.children.is_empty() {
            if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            }
        } else {
            let mut children = self.children;
            if !self.text.is_empty() {
                children.insert("#text".to_string(), Value::String(self.text));
            }
            Value::Object(children)
        };
        (self.name, value)
    }
}

/// Repeated sibling elements accumulate into an array.
fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        None => {
            parent.insert(name, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Parse an XML document into a nested mapping keyed by element name.
pub fn parse_xml(text: &str) -> Result<Value, String> {
    let mut reader = quick_xml::Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut root = Map::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)?),
            Ok(Event::Empty(e)) => {
                let (name, value) = Frame::open(&e)?.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "{} at position {}",
                    e,
                    reader.error_position()
                ))
            }
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document: unclosed element".to_string());
    }
    if root.is_empty() {
        return Err("no element found".to_string());
    }
    Ok(Value::Object(root))
}

/// Reshape a parsed report into cell parameters, scaling statistics and
/// the remaining top-level `AutoProc` fields.
pub fn normalize(doc: &Value) -> Result<AutoprocRecord, String> {
    let container = doc.get(CONTAINER);
    let mut record = AutoprocRecord::default();

    if let Some(Value::Object(autoproc)) = container.and_then(|c| c.get(AUTOPROC)) {
        for (key, value) in autoproc {
            if key.contains("Cell") {
                let (label, formatted) = cell_parameter(key, value)?;
                record.cell_data.insert(label, formatted);
            } else {
                record.fields.insert(key.clone(), value.clone());
            }
        }
    }

    let statistics = container
        .and_then(|c| c.get(SCALING_CONTAINER))
        .and_then(|s| s.get(SCALING_STATISTICS));
    if let Some(Value::Object(first)) = first_entry(statistics) {
        for (key, value) in first {
            record.scale_data.insert(scaling_label(key), value.clone());
        }
    }

    Ok(record)
}

/// `refinedCell_alpha = "90.0"` → `("ALPHA", "90.00")`.
fn cell_parameter(key: &str, value: &Value) -> Result<(String, String), String> {
    let label = key
        .split('_')
        .nth(1)
        .ok_or_else(|| format!("cell field without axis suffix: {}", key))?
        .to_uppercase();
    let number = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| format!("could not convert {} to float: {}", key, value))?;
    Ok((label, format!("{:.2}", number)))
}

/// Only the first scaling pass is reported. A lone
/// `AutoProcScalingStatistics` element counts as a one-entry list, so a
/// report with a single pass still fills `scale_data` rather than leaving
/// it empty.
fn first_entry(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

/// Case-insensitive rename; unknown fields keep their original name.
pub fn scaling_label(key: &str) -> String {
    let lower = key.to_lowercase();
    SCALING_STATISTICS_LABELS
        .iter()
        .find(|(source, _)| *source == lower)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AutoProcContainer>
  <AutoProc>
    <spaceGroup>P 21 21 21</spaceGroup>
    <wavelength>0.97918</wavelength>
    <refinedCell_a>79.12345</refinedCell_a>
    <refinedCell_b>79.125001</refinedCell_b>
    <refinedCell_alpha>90</refinedCell_alpha>
  </AutoProc>
  <AutoProcScalingContainer>
    <AutoProcScalingStatistics>
      <scalingStatisticsType>overall</scalingStatisticsType>
      <rMerge>0.061</rMerge>
      <completeness>99.8</completeness>
      <foo>bar</foo>
    </AutoProcScalingStatistics>
    <AutoProcScalingStatistics>
      <scalingStatisticsType>innerShell</scalingStatisticsType>
      <rMerge>0.021</rMerge>
    </AutoProcScalingStatistics>
  </AutoProcScalingContainer>
</AutoProcContainer>
"#;

    #[test]
    fn cell_fields_are_relabelled_and_rounded() {
        let doc = parse_xml(REPORT).unwrap();
        let record = normalize(&doc).unwrap();
        assert_eq!(record.cell_data["A"], "79.12");
        assert_eq!(record.cell_data["B"], "79.13");
        assert_eq!(record.cell_data["ALPHA"], "90.00");
        assert_eq!(record.fields["spaceGroup"], "P 21 21 21");
        assert!(!record.fields.contains_key("refinedCell_a"));
    }

    #[test]
    fn bare_cell_key_uses_segment_after_first_underscore() {
        let doc = parse_xml(
            "<AutoProcContainer><AutoProc><Cell_a>79.12345</Cell_a></AutoProc></AutoProcContainer>",
        )
        .unwrap();
        let record = normalize(&doc).unwrap();
        assert_eq!(record.cell_data["A"], "79.12");
    }

    #[test]
    fn scaling_uses_first_pass_and_renames_known_fields() {
        let doc = parse_xml(REPORT).unwrap();
        let record = normalize(&doc).unwrap();
        assert_eq!(record.scale_data["Scaling Statistics Type"], "overall");
        assert_eq!(record.scale_data["RMerge"], "0.061");
        assert_eq!(record.scale_data["Completeness"], "99.8");
        assert_eq!(record.scale_data["foo"], "bar");
        assert_eq!(record.scale_data.len(), 4);
    }

    #[test]
    fn single_scaling_pass_is_read() {
        let doc = parse_xml(
            "<AutoProcContainer><AutoProcScalingContainer><AutoProcScalingStatistics>\
             <rMerge>0.05</rMerge></AutoProcScalingStatistics>\
             </AutoProcScalingContainer></AutoProcContainer>",
        )
        .unwrap();
        let record = normalize(&doc).unwrap();
        assert_eq!(record.scale_data["RMerge"], "0.05");
    }

    #[test]
    fn scaling_label_lookup() {
        assert_eq!(scaling_label("rmerge"), "RMerge");
        assert_eq!(scaling_label("ccHalf"), "CC Half");
        assert_eq!(scaling_label("foo"), "foo");
    }

    #[test]
    fn missing_containers_give_empty_sections() {
        let doc = parse_xml("<Other><AutoProc><x>1</x></AutoProc></Other>").unwrap();
        let record = normalize(&doc).unwrap();
        assert!(record.is_empty());

        let doc = parse_xml(
            "<AutoProcContainer><AutoProc><Cell_a>10</Cell_a></AutoProc></AutoProcContainer>",
        )
        .unwrap();
        let record = normalize(&doc).unwrap();
        assert_eq!(record.cell_data.len(), 1);
        assert!(record.scale_data.is_empty());
    }

    #[test]
    fn non_numeric_cell_value_is_a_parse_failure() {
        let doc = parse_xml(
            "<AutoProcContainer><AutoProc><Cell_a>n/a</Cell_a></AutoProc></AutoProcContainer>",
        )
        .unwrap();
        assert!(normalize(&doc).is_err());
    }

    #[test]
    fn parse_keeps_attributes_and_repeats() {
        let doc = parse_xml(r#"<r v="1"><i>a</i><i>b</i><e/></r>"#).unwrap();
        assert_eq!(doc["r"]["@v"], "1");
        assert_eq!(doc["r"]["i"], serde_json::json!(["a", "b"]));
        assert!(doc["r"]["e"].is_null());
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(parse_xml("<a><b></a>").is_err());
        assert!(parse_xml("<a>").is_err());
        assert!(parse_xml("just text").is_err());
    }

    #[test]
    fn latin1_file_is_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("autoPROC.xml");
        let mut bytes = b"<AutoProcContainer><AutoProc><comment>".to_vec();
        bytes.push(0xC5); // Å in Latin-1, invalid as UTF-8
        bytes.extend_from_slice(b"</comment></AutoProc></AutoProcContainer>");
        fs::write(&path, bytes).unwrap();

        let record = load_autoproc(&path).unwrap().unwrap();
        assert_eq!(record.fields["comment"], "\u{c5}");
    }

    #[test]
    fn tolerant_reader_returns_empty_record_on_failure() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("autoPROC.xml");
        assert!(read_autoproc(&missing).is_empty());

        fs::write(&missing, "   \n").unwrap();
        assert!(read_autoproc(&missing).is_empty());

        fs::write(&missing, "<AutoProcContainer><AutoProc>").unwrap();
        assert!(read_autoproc(&missing).is_empty());

        fs::write(&missing, REPORT).unwrap();
        assert_eq!(read_autoproc(&missing).cell_data["A"], "79.12");
    }
}
