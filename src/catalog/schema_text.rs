//! Fixed-width schema dump parsing
//!
//! The dump is a sequence of blocks:
//!
//! ```text
//! === AStockBasicInfoDB.LC_StockArchives 表结构 ===
//! 列名                 注释                            数据示例
//! ----------------------------------------------------------------
//! InnerCode            证券内部编码                      1120
//! ```
//!
//! Data lines are split by character offsets: name `[0,19)`, comment `[20,49)`,
//! example `[50,..)`. A block ends at a blank line or the next marker.

use super::Column;
use tracing::debug;

const MARKER_PREFIX: &str = "=== ";
const MARKER_SUFFIX: &str = " 表结构 ===";
const HEADER_LINES: usize = 2;
const MIN_DATA_LINE_CHARS: usize = 50;

/// Columns collected for one known table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBlock {
    pub table: String,
    pub columns: Vec<Column>,
}

enum ScanState {
    SeekingMarker,
    SkippingHeader {
        table: Option<String>,
        remaining: usize,
    },
    InBlock {
        table: Option<String>,
    },
}

/// Lowercased table name of a marker line, or `None` if the line is not a marker.
pub fn marker_table_name(line: &str) -> Option<String> {
    let name = line
        .strip_prefix(MARKER_PREFIX)?
        .strip_suffix(MARKER_SUFFIX)?
        .trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// Split one trimmed data line into a column; `None` for short lines or empty names.
pub fn parse_column_line(line: &str) -> Option<Column> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() < MIN_DATA_LINE_CHARS {
        return None;
    }

    let field = |start: usize, end: usize| -> String {
        chars[start..end.min(chars.len())]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    };

    let name = field(0, 19);
    if name.is_empty() {
        return None;
    }

    Some(Column {
        name,
        comment: field(20, 49),
        example: field(50, chars.len()),
    })
}

/// Parse every block whose table name satisfies `is_known`. Blocks for other tables
/// are skipped without reading their lines.
pub fn parse_blocks<F>(text: &str, is_known: F) -> Vec<ColumnBlock>
where
    F: Fn(&str) -> bool,
{
    let mut blocks: Vec<ColumnBlock> = Vec::new();
    let mut state = ScanState::SeekingMarker;

    for raw in text.lines() {
        let line = raw.trim();

        state = match state {
            ScanState::SeekingMarker => match marker_table_name(line) {
                Some(name) => start_block(name, &is_known, &mut blocks),
                None => ScanState::SeekingMarker,
            },
            ScanState::SkippingHeader { table, remaining } => {
                if remaining > 1 {
                    ScanState::SkippingHeader {
                        table,
                        remaining: remaining - 1,
                    }
                } else {
                    ScanState::InBlock { table }
                }
            }
            ScanState::InBlock { table } => {
                if line.is_empty() {
                    ScanState::SeekingMarker
                } else if line.starts_with("===") {
                    match marker_table_name(line) {
                        Some(name) => start_block(name, &is_known, &mut blocks),
                        None => ScanState::SeekingMarker,
                    }
                } else {
                    if table.is_some() {
                        if let (Some(column), Some(block)) =
                            (parse_column_line(line), blocks.last_mut())
                        {
                            block.columns.push(column);
                        }
                    }
                    ScanState::InBlock { table }
                }
            }
        };
    }

    blocks
}

fn start_block<F>(name: String, is_known: &F, blocks: &mut Vec<ColumnBlock>) -> ScanState
where
    F: Fn(&str) -> bool,
{
    let table = if is_known(&name) {
        blocks.push(ColumnBlock {
            table: name.clone(),
            columns: Vec::new(),
        });
        Some(name)
    } else {
        debug!("Skipping schema block for unknown table {}", name);
        None
    };

    ScanState::SkippingHeader {
        table,
        remaining: HEADER_LINES,
    }
}
