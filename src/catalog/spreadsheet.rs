use crate::error::{AgentError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

pub const HEADER_DATABASE_NATIVE: &str = "库名中文";
pub const HEADER_DATABASE_FOREIGN: &str = "库名英文";
pub const HEADER_TABLE_FOREIGN: &str = "表英文";
pub const HEADER_TABLE_NATIVE: &str = "表中文";
pub const HEADER_DESCRIPTION: &str = "表描述";

/// One data dictionary row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableRecord {
    #[serde(rename = "库名中文")]
    pub database_name_native: String,
    #[serde(rename = "库名英文")]
    pub database_name_foreign: String,
    #[serde(rename = "表英文")]
    pub table_name_foreign: String,
    #[serde(rename = "表中文")]
    pub table_name_native: String,
    #[serde(rename = "表描述")]
    pub description: String,
}

/// Read records from a `.csv` file or from the first worksheet of a workbook.
pub fn read_table_records(path: &Path) -> Result<Vec<TableRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_csv_records(std::fs::File::open(path)?),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook_records(path),
        other => Err(AgentError::Spreadsheet(format!(
            "Unsupported data dictionary format '{}' for {:?}",
            other, path
        ))),
    }
}

pub fn read_csv_records<R: Read>(reader: R) -> Result<Vec<TableRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

fn read_workbook_records(path: &Path) -> Result<Vec<TableRecord>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AgentError::Spreadsheet(format!("Failed to open {:?}: {}", path, e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AgentError::Spreadsheet(format!("No worksheet in {:?}", path)))?
        .map_err(|e| AgentError::Spreadsheet(format!("Failed to read {:?}: {}", path, e)))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| AgentError::Spreadsheet(format!("Empty worksheet in {:?}", path)))?
        .iter()
        .map(cell_text)
        .collect();

    let index = HeaderIndex::new(&header)?;
    Ok(rows.map(|row| index.record(row)).collect())
}

struct HeaderIndex {
    database_native: usize,
    database_foreign: usize,
    table_foreign: usize,
    table_native: usize,
    description: usize,
}

impl HeaderIndex {
    fn new(header: &[String]) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AgentError::Spreadsheet(format!("Missing required column '{}'", name)))
        };

        Ok(Self {
            database_native: find(HEADER_DATABASE_NATIVE)?,
            database_foreign: find(HEADER_DATABASE_FOREIGN)?,
            table_foreign: find(HEADER_TABLE_FOREIGN)?,
            table_native: find(HEADER_TABLE_NATIVE)?,
            description: find(HEADER_DESCRIPTION)?,
        })
    }

    fn record(&self, row: &[Data]) -> TableRecord {
        let cell = |i: usize| row.get(i).map(cell_text).unwrap_or_default();
        TableRecord {
            database_name_native: cell(self.database_native),
            database_name_foreign: cell(self.database_foreign),
            table_name_foreign: cell(self.table_foreign),
            table_name_native: cell(self.table_native),
            description: cell(self.description),
        }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}
