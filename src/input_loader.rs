use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{error, info};
use serde::Deserialize;

use crate::listing::Condition;

/// One row of a batch file: what to price and in which condition.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct QueryRecord {
    #[serde(rename = "query", alias = "Query", alias = "product", alias = "Product", alias = "produto")]
    pub query: String,
    #[serde(rename = "condition", alias = "Condition", alias = "estado", default)]
    pub condition: Option<String>,
}

impl QueryRecord {
    pub fn condition_or(&self, fallback: Condition) -> Condition {
        match self.condition.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => Condition::from_label_or_default(label),
            _ => fallback,
        }
    }
}

pub fn load_records<P: AsRef<Path>>(filename: P) -> Vec<QueryRecord> {
    let path = filename.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Could not open CSV file {:?}: {}", path, e);
            return Vec::new();
        }
    };
    let records = read_records(file);
    info!("Loaded {} queries from {:?}", records.len(), path);
    records
}

/// Parses CSV rows, skipping rows that do not deserialize or have no query.
pub fn read_records<R: Read>(reader: R) -> Vec<QueryRecord> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in rdr.deserialize::<QueryRecord>() {
        match result {
            Ok(record) if !record.query.is_empty() => records.push(record),
            Ok(_) => error!("Skipping CSV row with empty query"),
            Err(e) => error!("Error parsing CSV record: {}", e),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_with_header_aliases() {
        let csv = "Product,Condition\nteclado apex pro v3,new\nbotas modalfa,\n";
        let records = read_records(csv.as_bytes());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].query, "teclado apex pro v3");
        assert_eq!(records[0].condition_or(Condition::Good), Condition::New);
        assert_eq!(records[1].condition_or(Condition::VeryGood), Condition::VeryGood);
    }

    #[test]
    fn condition_column_is_optional() {
        let records = read_records("query\nrato logitech\n".as_bytes());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].condition, None);
    }

    #[test]
    fn skips_empty_queries() {
        let records = read_records("query,condition\n,new\nmochila,bom\n".as_bytes());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].condition_or(Condition::New), Condition::Good);
    }

    #[test]
    fn missing_file_yields_no_records() {
        assert!(load_records("/definitely/not/here.csv").is_empty());
    }
}
