//! Schema catalog
//!
//! In-memory table/column metadata for the financial databases. Table identities come
//! from the data dictionary spreadsheet; column definitions are layered on afterwards
//! from the fixed-width schema dump. The catalog is read-only once loaded.

pub mod schema_text;
pub mod spreadsheet;

use crate::error::{AgentError, Result};
use crate::query_service::{QueryService, QUERY_ROW_LIMIT};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub use spreadsheet::TableRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub comment: String,
    pub example: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub database_name_native: String,
    pub database_name_foreign: String,
    pub table_name_foreign: String,
    pub table_name_native: String,
    pub description: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Table {
    /// `<db>.<table>` with the original casing.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database_name_foreign, self.table_name_foreign)
    }

    /// Lowercase catalog key.
    pub fn key(&self) -> String {
        self.qualified_name().to_lowercase()
    }
}

impl From<TableRecord> for Table {
    fn from(record: TableRecord) -> Self {
        Self {
            database_name_native: record.database_name_native,
            database_name_foreign: record.database_name_foreign,
            table_name_foreign: record.table_name_foreign,
            table_name_native: record.table_name_native,
            description: record.description,
            columns: Vec::new(),
        }
    }
}

/// Compact view sent to the model for table selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub description: String,
}

/// Column-level view of one table, keyed by the name the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDetail {
    pub table: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: IndexMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the data dictionary, then enrich it with the schema dump.
    pub fn load(data_dict: impl AsRef<Path>, schema_file: impl AsRef<Path>) -> Result<Self> {
        let mut catalog = Self::new();

        info!("Loading data dictionary from {:?}", data_dict.as_ref());
        catalog.load_table_descriptions(data_dict)?;

        info!("Loading table schema from {:?}", schema_file.as_ref());
        catalog.load_column_definitions(schema_file)?;

        info!("Catalog ready: {} tables", catalog.len());
        for (key, table) in &catalog.tables {
            debug!("- {}: {} columns", key, table.columns.len());
        }

        Ok(catalog)
    }

    /// Read table identities from a workbook or CSV file.
    pub fn load_table_descriptions(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let records = spreadsheet::read_table_records(path.as_ref()).map_err(|e| {
            error!("Failed to load data dictionary: {}", e);
            e
        })?;
        Ok(self.insert_records(records))
    }

    /// Read table identities from CSV text with the data dictionary headers.
    pub fn load_table_descriptions_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let records = spreadsheet::read_csv_records(reader).map_err(|e| {
            error!("Failed to load data dictionary: {}", e);
            e
        })?;
        Ok(self.insert_records(records))
    }

    fn insert_records(&mut self, records: Vec<TableRecord>) -> usize {
        let count = records.len();
        for record in records {
            self.insert_table(Table::from(record));
        }
        count
    }

    /// Insert a table, replacing any existing table with the same key.
    pub fn insert_table(&mut self, table: Table) {
        let key = table.key();
        if self.tables.insert(key.clone(), table).is_some() {
            debug!("Duplicate table key '{}' overwritten", key);
        }
    }

    /// Append column definitions from the schema dump to known tables.
    pub fn load_column_definitions(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            error!("Failed to read schema file {:?}: {}", path, e);
            AgentError::SchemaFile(format!("{}: {}", path.display(), e))
        })?;
        Ok(self.load_column_definitions_from_str(&text))
    }

    pub fn load_column_definitions_from_str(&mut self, text: &str) -> usize {
        let blocks = schema_text::parse_blocks(text, |name| self.tables.contains_key(name));

        let mut added = 0;
        for block in blocks {
            if let Some(table) = self.tables.get_mut(&block.table) {
                added += block.columns.len();
                table.columns.extend(block.columns);
            }
        }
        added
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn database_summary(&self) -> Vec<TableSummary> {
        self.tables
            .values()
            .map(|t| TableSummary {
                name: t.qualified_name(),
                description: t.description.clone(),
            })
            .collect()
    }

    /// Column details for each name found; misses are logged and left out.
    pub fn table_details<S: AsRef<str>>(&self, names: &[S]) -> Vec<TableDetail> {
        let mut details = Vec::new();
        for name in names {
            let name = name.as_ref();
            debug!("Looking up table {}", name);
            match self.get(name) {
                Some(table) => details.push(TableDetail {
                    table: name.to_string(),
                    columns: table.columns.clone(),
                }),
                None => warn!("Table {} not found in catalog", name),
            }
        }
        details
    }

    /// Run a statement on the remote query service with the fixed row limit.
    pub async fn execute_query(
        &self,
        service: &dyn QueryService,
        sql: &str,
    ) -> Result<serde_json::Value> {
        service.execute(sql, QUERY_ROW_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    const DICT_CSV: &str = "库名中文,库名英文,表英文,表中文,表描述
上市公司基本资料,AStockBasicInfoDB,LC_StockArchives,公司概况,收录上市公司的基本情况
上市公司基本资料,AStockBasicInfoDB,LC_NameChange,公司名称更改状况,收录公司名称历次变更情况
";

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .load_table_descriptions_csv(DICT_CSV.as_bytes())
            .unwrap();
        catalog
    }

    #[test]
    fn test_keys_are_lowercase() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("astockbasicinfodb.lc_stockarchives").is_some());
        assert!(catalog.get("AStockBasicInfoDB.LC_StockArchives").is_some());
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let mut catalog = catalog();
        let csv = "库名中文,库名英文,表英文,表中文,表描述
上市公司基本资料,astockbasicinfodb,lc_stockarchives,公司概况,新描述
";
        catalog.load_table_descriptions_csv(csv.as_bytes()).unwrap();

        assert_eq!(catalog.len(), 2);
        let table = catalog.get("astockbasicinfodb.lc_stockarchives").unwrap();
        assert_eq!(table.description, "新描述");
        // overwritten entry keeps its slot
        assert_eq!(
            catalog.database_summary()[0].name,
            "astockbasicinfodb.lc_stockarchives"
        );
    }

    #[test]
    fn test_missing_header_fails_load() {
        let mut catalog = Catalog::new();
        let csv = "库名中文,库名英文,表英文\nA,B,C\n";
        assert!(catalog.load_table_descriptions_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_database_summary_preserves_order_and_casing() {
        let summary = catalog().database_summary();
        assert_eq!(
            summary,
            vec![
                TableSummary {
                    name: "AStockBasicInfoDB.LC_StockArchives".to_string(),
                    description: "收录上市公司的基本情况".to_string(),
                },
                TableSummary {
                    name: "AStockBasicInfoDB.LC_NameChange".to_string(),
                    description: "收录公司名称历次变更情况".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_table_details_keeps_requested_name() {
        let mut catalog = catalog();
        catalog.load_column_definitions_from_str(&format!(
            "=== AStockBasicInfoDB.LC_NameChange 表结构 ===\nheader\n-----\n{:<20}{:<30}{}\n",
            "InnerCode", "证券内部编码", "1120"
        ));

        let details = catalog.table_details(&["ASTOCKBASICINFODB.LC_NAMECHANGE"]);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].table, "ASTOCKBASICINFODB.LC_NAMECHANGE");
        assert_eq!(details[0].columns[0].name, "InnerCode");
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_table_details_lookup_miss() {
        let catalog = catalog();
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let details = tracing::subscriber::with_default(subscriber, || {
            catalog.table_details(&["nonexistent.table", "astockbasicinfodb.lc_namechange"])
        });
        assert_eq!(details.len(), 1);

        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("not found in catalog").count(), 1);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("nonexistent.table"));
    }

    #[test]
    fn test_missing_schema_file_is_schema_error() {
        let mut catalog = catalog();
        let err = catalog
            .load_column_definitions("/nonexistent/all_tables_schema.txt")
            .unwrap_err();
        assert!(matches!(err, AgentError::SchemaFile(ref msg) if msg.contains("all_tables_schema.txt")));
    }
}
