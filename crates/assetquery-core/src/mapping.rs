use crate::errors::{QueryError, Result};
use std::collections::HashSet;
use std::path::Path;

const INTENT_COLUMN: &str = "Intent";
const ENTITIES_COLUMN: &str = "Entities";

#[derive(Debug, Clone, PartialEq)]
pub struct MappingRow {
    pub intent: String,
    pub entities: Vec<String>,
}

/// Intent -> entity-field lookup loaded from the mapping CSV.
#[derive(Debug, Clone, Default)]
pub struct IntentMappingTable {
    rows: Vec<MappingRow>,
}

impl IntentMappingTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = read_text_latin1_fallback(path.as_ref())?;
        let table = Self::from_reader(text.as_bytes())?;
        tracing::info!(
            path = %path.as_ref().display(),
            rows = table.rows.len(),
            "loaded intent mapping table"
        );
        Ok(table)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| QueryError::Config(format!("mapping file has no `{name}` column")))
        };
        let intent_idx = column(INTENT_COLUMN)?;
        let entities_idx = column(ENTITIES_COLUMN)?;
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let intent = record.get(intent_idx).unwrap_or_default().to_string();
            let entities = split_entities(record.get(entities_idx).unwrap_or_default());
            rows.push(MappingRow { intent, entities });
        }
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<MappingRow>) -> Self {
        Self { rows }
    }

    /// First row whose intent matches exactly.
    pub fn lookup(&self, intent: &str) -> Option<&MappingRow> {
        self.rows.iter().find(|r| r.intent == intent)
    }

    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }

    pub fn label_space(&self) -> LabelSpace {
        let mut seen = HashSet::new();
        let labels = self
            .rows
            .iter()
            .filter(|r| seen.insert(r.intent.as_str()))
            .map(|r| r.intent.clone())
            .collect();
        LabelSpace { labels }
    }
}

fn split_entities(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a text file as UTF-8, falling back to ISO-8859-1 when it is not valid UTF-8.
pub fn read_text_latin1_fallback(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    })
}

/// Classifier output space: unique intents in order of first appearance in the mapping file.
///
/// Index `i` of the classifier's logits belongs to `labels[i]`; the model must have been trained
/// against the same ordering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelSpace {
    labels: Vec<String>,
}

impl LabelSpace {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn validate(&self, logits: usize) -> Result<()> {
        if logits != self.labels.len() {
            return Err(QueryError::LabelSpaceMismatch {
                labels: self.labels.len(),
                logits,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
Intent,Entities,Example
open_ports,\"IP Address, Port ,Protocol\",which ports are open
asset_count,,how many assets
open_ports,\"Host\",duplicate row
vuln_details,\"Plugin Name,, Vuln Publication Date\",details
";

    #[test]
    fn first_row_wins_and_entities_are_trimmed() {
        let table = IntentMappingTable::from_reader(CSV.as_bytes()).unwrap();
        let row = table.lookup("open_ports").unwrap();
        assert_eq!(row.entities, ["IP Address", "Port", "Protocol"]);
        let details = table.lookup("vuln_details").unwrap();
        assert_eq!(details.entities, ["Plugin Name", "Vuln Publication Date"]);
        assert!(table.lookup("asset_count").unwrap().entities.is_empty());
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn label_space_follows_first_appearance() {
        let table = IntentMappingTable::from_reader(CSV.as_bytes()).unwrap();
        let labels = table.label_space();
        assert_eq!(labels.labels(), ["open_ports", "asset_count", "vuln_details"]);
        assert_eq!(labels.label(1), Some("asset_count"));
        assert!(labels.validate(3).is_ok());
        assert!(matches!(
            labels.validate(4),
            Err(QueryError::LabelSpaceMismatch {
                labels: 3,
                logits: 4
            })
        ));
    }

    #[test]
    fn missing_column_is_a_config_error() {
        let err = IntentMappingTable::from_reader("Intent,Fields\na,b\n".as_bytes()).unwrap_err();
        assert_eq!(err.code(), "config");
    }

    #[test]
    fn latin1_files_are_decoded() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"Intent,Entities\nlab_caf\xe9,Lab name\n").unwrap();
        let table = IntentMappingTable::from_path(f.path()).unwrap();
        assert_eq!(table.rows()[0].intent, "lab_caf\u{e9}");
    }
}
