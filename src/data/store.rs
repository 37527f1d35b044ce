use std::collections::BTreeMap;

use crate::error::{PortalError, Result};

use super::model::{Batch, CellValue, Dataset, Record, THEME};
use super::schema::{infer_schema, normalize_booleans};

/// What a single ingest changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Theme → rows appended, for every theme the batch touched.
    pub rows_by_theme: BTreeMap<String, usize>,
}

impl IngestSummary {
    pub fn total_rows(&self) -> usize {
        self.rows_by_theme.values().sum()
    }
}

// ---------------------------------------------------------------------------
// DatasetStore
// ---------------------------------------------------------------------------

/// Theme → accumulated dataset. Only ever appended to; lives as long as the
/// session that owns it.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    datasets: BTreeMap<String, Dataset>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a batch and append its rows to the dataset of each theme
    /// present in it.
    ///
    /// Rows carrying no `Theme` value take `declared_theme`. A batch with
    /// neither is rejected before anything is stored.
    pub fn ingest(&mut self, mut batch: Batch, declared_theme: Option<&str>) -> Result<IngestSummary> {
        let has_theme_col = batch.has_column(THEME);
        if declared_theme.is_none()
            && (!has_theme_col || batch.records.iter().any(|r| r.get(THEME).is_null()))
        {
            return Err(PortalError::MissingColumn {
                column: THEME.to_string(),
                context: batch.source.clone(),
            });
        }

        let schema = infer_schema(&batch);
        normalize_booleans(&mut batch, &schema);

        let mut columns = batch.columns.clone();
        if !has_theme_col {
            columns.insert(0, THEME.to_string());
        }

        // Split by theme, keeping the batch's row order inside each theme.
        let mut parts: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for mut rec in batch.records {
            let theme = match rec.get(THEME) {
                CellValue::Null => declared_theme.unwrap_or_default().to_string(),
                v => v.to_string(),
            };
            rec.set(THEME, CellValue::Text(theme.clone()));
            parts.entry(theme).or_default().push(rec);
        }

        let mut summary = IngestSummary::default();
        for (theme, records) in parts {
            summary.rows_by_theme.insert(theme.clone(), records.len());
            self.datasets
                .entry(theme.clone())
                .or_insert_with(|| Dataset::new(theme))
                .append(&columns, &schema, records);
        }

        log::info!(
            "ingested {} rows from {} into themes {:?}",
            summary.total_rows(),
            batch.source,
            summary.rows_by_theme.keys().collect::<Vec<_>>()
        );
        Ok(summary)
    }

    /// Sorted theme names.
    pub fn themes(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn dataset(&self, theme: &str) -> Result<&Dataset> {
        self.datasets
            .get(theme)
            .ok_or_else(|| PortalError::ThemeNotFound(theme.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::ColumnKind;

    fn rows(cols: &[&str], data: &[&[&str]]) -> Batch {
        let columns: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
        let records = data
            .iter()
            .map(|row| {
                cols.iter()
                    .zip(row.iter())
                    .map(|(c, v)| (*c, CellValue::guess(v)))
                    .collect()
            })
            .collect();
        Batch::new("test.csv", columns, records)
    }

    #[test]
    fn splits_batch_by_theme() {
        let mut store = DatasetStore::new();
        let batch = rows(
            &["Theme", "Country", "Score"],
            &[&["Health", "Chile", "1"], &["Water", "Peru", "2"], &["Health", "Peru", "3"]],
        );
        let summary = store.ingest(batch, None).unwrap();
        assert_eq!(summary.total_rows(), 3);
        assert_eq!(store.themes(), vec!["Health", "Water"]);
        assert_eq!(store.dataset("Health").unwrap().len(), 2);
        assert_eq!(store.dataset("Water").unwrap().len(), 1);
    }

    #[test]
    fn declared_theme_fills_missing_column() {
        let mut store = DatasetStore::new();
        let batch = rows(&["Country", "Score"], &[&["Chile", "1"]]);
        store.ingest(batch, Some("education")).unwrap();
        let ds = store.dataset("education").unwrap();
        assert_eq!(ds.records[0].get(THEME), &CellValue::from("education"));
        assert_eq!(ds.column_names[0], THEME);
    }

    #[test]
    fn batch_without_any_theme_is_rejected() {
        let mut store = DatasetStore::new();
        let batch = rows(&["Country"], &[&["Chile"]]);
        let err = store.ingest(batch, None).unwrap_err();
        assert!(matches!(err, PortalError::MissingColumn { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_theme_is_not_found() {
        let store = DatasetStore::new();
        assert!(matches!(
            store.dataset("Nope"),
            Err(PortalError::ThemeNotFound(t)) if t == "Nope"
        ));
    }

    #[test]
    fn repeated_ingest_appends_duplicates() {
        let mut store = DatasetStore::new();
        let batch = rows(&["Theme", "Country"], &[&["Health", "Chile"]]);
        store.ingest(batch.clone(), None).unwrap();
        store.ingest(batch, None).unwrap();
        assert_eq!(store.dataset("Health").unwrap().len(), 2);
    }

    #[test]
    fn ingest_records_boolean_kind() {
        let mut store = DatasetStore::new();
        let batch = rows(&["Theme", "Law"], &[&["Health", "Yes"], &["Health", "No"]]);
        store.ingest(batch, None).unwrap();
        let ds = store.dataset("Health").unwrap();
        assert_eq!(ds.kind("Law"), ColumnKind::Boolean);
        assert_eq!(ds.records[0].get("Law"), &CellValue::Integer(1));
        assert_eq!(ds.numeric_indicators(), vec!["Law"]);
    }
}
