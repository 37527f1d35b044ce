use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{Batch, CellValue};

// ---------------------------------------------------------------------------
// Column kinds
// ---------------------------------------------------------------------------

/// What a column holds, decided once when a batch is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// No non-missing value seen yet.
    Empty,
    /// Only "Yes" / "No"; stored as 1 / 0 after normalization.
    Boolean,
    Numeric,
    Text,
}

impl ColumnKind {
    /// Kind of a column seen in two batches.
    pub fn merge(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => k,
            (a, b) if a == b => a,
            (Boolean, Numeric) | (Numeric, Boolean) => Numeric,
            _ => Text,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Boolean | ColumnKind::Numeric)
    }
}

/// Column name → kind. Columns never seen are `Empty`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub columns: BTreeMap<String, ColumnKind>,
}

impl Schema {
    pub fn kind(&self, column: &str) -> ColumnKind {
        self.columns
            .get(column)
            .copied()
            .unwrap_or(ColumnKind::Empty)
    }

    pub fn merge(&mut self, other: &Schema) {
        for (col, kind) in &other.columns {
            let merged = self.kind(col).merge(*kind);
            self.columns.insert(col.clone(), merged);
        }
    }
}

// ---------------------------------------------------------------------------
// Inference and normalization
// ---------------------------------------------------------------------------

fn is_yes_no(v: &CellValue) -> bool {
    matches!(v.as_text(), Some("Yes") | Some("No"))
}

/// Classify a column from its values.
pub fn infer_kind<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> ColumnKind {
    let mut kind = ColumnKind::Empty;
    for v in values {
        let this = match v {
            CellValue::Null => continue,
            CellValue::Integer(_) | CellValue::Float(_) => ColumnKind::Numeric,
            v if is_yes_no(v) => ColumnKind::Boolean,
            CellValue::Text(_) => ColumnKind::Text,
        };
        kind = match (kind, this) {
            (ColumnKind::Empty, k) => k,
            (a, b) if a == b => a,
            // A mix of Yes/No and numbers is not boolean-like.
            _ => ColumnKind::Text,
        };
        if kind == ColumnKind::Text {
            break;
        }
    }
    kind
}

/// Infer the kind of every column of a batch.
pub fn infer_schema(batch: &Batch) -> Schema {
    let columns = batch
        .columns
        .iter()
        .map(|col| {
            let kind = infer_kind(batch.records.iter().map(|r| r.get(col)));
            (col.clone(), kind)
        })
        .collect();
    Schema { columns }
}

/// Rewrite every `Boolean` column of the batch to 1 / 0, leaving missing
/// cells missing. Running it again is a no-op since the rewritten columns no
/// longer hold "Yes" / "No".
pub fn normalize_booleans(batch: &mut Batch, schema: &Schema) {
    let boolean_cols: Vec<&String> = schema
        .columns
        .iter()
        .filter(|(_, k)| **k == ColumnKind::Boolean)
        .map(|(c, _)| c)
        .collect();
    if boolean_cols.is_empty() {
        return;
    }
    log::debug!("{}: recoding Yes/No columns {boolean_cols:?}", batch.source);

    for rec in &mut batch.records {
        for col in &boolean_cols {
            if let Some(cell) = rec.cells.get_mut(col.as_str()) {
                let recoded = match cell.as_text() {
                    Some("Yes") => 1,
                    Some("No") => 0,
                    _ => continue,
                };
                *cell = CellValue::Integer(recoded);
            }
        }
    }
}
