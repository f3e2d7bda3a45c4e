//! In-memory representation of a parsed CSV payload.
//!
//! Column types are inferred from the cell values: a column is an integer
//! column when every non-empty cell parses as `i64`, otherwise a float column
//! when every non-empty cell parses as `f64`, otherwise a boolean column when
//! every non-empty cell is `true`/`false` (any case), otherwise text. Empty
//! cells become NULL. Headers and text cells are kept byte for byte; only the
//! numeric and boolean parses ignore surrounding whitespace.

use crate::services::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn infer_column(values: &[&str]) -> ColumnType {
    let present: Vec<&str> = values.iter().copied().filter(|v| !v.is_empty()).collect();

    if present.is_empty() {
        ColumnType::Text
    } else if present.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if present.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        ColumnType::Float
    } else if present.iter().all(|v| parse_bool(v).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

fn to_cell(value: &str, kind: ColumnType) -> Cell {
    if value.is_empty() {
        return Cell::Null;
    }
    // Inference guarantees the parses below succeed for every non-empty cell.
    match kind {
        ColumnType::Integer => value.trim().parse().map(Cell::Integer).unwrap_or(Cell::Null),
        ColumnType::Float => value.trim().parse().map(Cell::Float).unwrap_or(Cell::Null),
        ColumnType::Boolean => parse_bool(value).map(Cell::Boolean).unwrap_or(Cell::Null),
        ColumnType::Text => Cell::Text(value.to_string()),
    }
}

/// Header names come straight from the file; blanks get a positional name
/// and repeats get a numeric suffix so the table can be created.
fn column_names(headers: &csv::StringRecord) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    for (i, raw) in headers.iter().enumerate() {
        let base = if raw.is_empty() {
            format!("column_{}", i)
        } else {
            raw.to_string()
        };
        let mut name = base.clone();
        let mut n = 1;
        while names.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Parse comma-delimited bytes with a mandatory header row.
pub fn parse_csv(data: &[u8]) -> Result<RawTable, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    let names = column_names(&headers);

    let records = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

    let columns: Vec<Column> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<&str> = records.iter().map(|r| r.get(i).unwrap_or("")).collect();
            Column {
                name,
                kind: infer_column(&values),
            }
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| to_cell(record.get(i).unwrap_or(""), col.kind))
                .collect()
        })
        .collect();

    Ok(RawTable { columns, rows })
}
