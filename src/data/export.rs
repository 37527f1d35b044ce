use std::io::Write;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::Result;

use super::model::CellValue;
use super::table::Table;

/// Write `table` as CSV: header row, then rows in table order, no index
/// column. Missing cells are empty fields.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&table.columns)?;
    for row in &table.rows {
        out.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    Ok(buf)
}

/// `{"columns": [...], "data": [[...], ...]}`, the column order kept.
#[derive(Serialize)]
struct SplitTable<'a> {
    columns: &'a [String],
    data: Vec<Vec<JsonValue>>,
}

fn cell_to_json(cell: &CellValue) -> JsonValue {
    match cell {
        CellValue::Text(s) => JsonValue::from(s.as_str()),
        CellValue::Integer(i) => JsonValue::from(*i),
        CellValue::Float(f) => JsonValue::from(*f),
        CellValue::Null => JsonValue::Null,
    }
}

pub fn write_json<W: Write>(table: &Table, writer: W) -> Result<()> {
    let split = SplitTable {
        columns: &table.columns,
        data: table
            .rows
            .iter()
            .map(|row| row.iter().map(cell_to_json).collect())
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &split)?;
    Ok(())
}
