use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use calamine::{open_workbook_auto, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Batch, CellValue, Record};

/// Extensions `load_file` understands.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["csv", "xlsx", "xls", "xlsm", "xlsb", "json", "parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// A file that was skipped, and why.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not read {}: {}", self.path.display(), self.message)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// File stem, used as the theme of rows that carry none.
fn source_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

/// Load one tabular file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`                 – header row, one record per line
/// * `.xlsx` / `.xls` / …   – first worksheet, header row first
/// * `.json`                – `[{ "Country": "...", ... }, ...]`
/// * `.parquet`             – flat columns of strings, ints, floats, bools
pub fn load_file(path: &Path) -> Result<Batch> {
    let source = source_name(path);
    match extension(path).as_str() {
        "csv" => load_csv(path, source),
        "xlsx" | "xls" | "xlsm" | "xlsb" => load_excel(path, source),
        "json" => load_json(path, source),
        "parquet" | "pq" => load_parquet(path, source),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Load each file, collecting a warning instead of failing on the bad ones.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> (Vec<Batch>, Vec<LoadWarning>) {
    let mut batches = Vec::new();
    let mut warnings = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match load_file(path) {
            Ok(batch) => {
                log::info!(
                    "Loaded {} rows with columns {:?} from {}",
                    batch.len(),
                    batch.columns,
                    path.display()
                );
                batches.push(batch);
            }
            Err(e) => {
                let warning = LoadWarning {
                    path: path.to_path_buf(),
                    message: format!("{e:#}"),
                };
                log::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }
    (batches, warnings)
}

/// Load every supported file directly inside `dir`, in file-name order.
/// A missing directory simply yields nothing.
pub fn load_dir(dir: &Path) -> (Vec<Batch>, Vec<LoadWarning>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("not auto-loading from {}: {e}", dir.display());
            return (Vec::new(), Vec::new());
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && SUPPORTED_EXTENSIONS.contains(&extension(p).as_str()))
        .collect();
    paths.sort();
    load_files(&paths)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, then one record per line.
/// Cells are typed by [`CellValue::guess`]; empty cells are missing.
fn load_csv(path: &Path, source: String) -> Result<Batch> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let columns: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        let record: Record = columns
            .iter()
            .zip(row.iter())
            .map(|(col, value)| (col.as_str(), CellValue::guess(value)))
            .collect();
        records.push(record);
    }

    Ok(Batch::new(source, columns, records))
}

// ---------------------------------------------------------------------------
// Excel loader
// ---------------------------------------------------------------------------

/// First worksheet; the first row holds the column names.
fn load_excel(path: &Path, source: String) -> Result<Batch> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Batch::new(source, Vec::new(), Vec::new()));
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.to_string().trim() {
            "" => format!("column_{}", i + 1),
            name => name.to_string(),
        })
        .collect();

    let records = rows
        .map(|row| {
            columns
                .iter()
                .zip(row.iter())
                .map(|(col, cell)| (col.as_str(), excel_to_cell(cell)))
                .collect()
        })
        .collect();

    Ok(Batch::new(source, columns, records))
}

/// Excel stores every number as a float; whole values come back as integers
/// so they match what the CSV loader produces for the same sheet.
fn excel_to_cell(cell: &Data) -> CellValue {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT => CellValue::Integer(*f as i64),
        Data::Float(f) => CellValue::from(*f),
        Data::String(s) if s.trim().is_empty() || CellValue::is_na_token(s) => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Country": "Chile", "Region": "LAC", "Income": "High", "Score": 3 },
///   ...
/// ]
/// ```
fn load_json(path: &Path, source: String) -> Result<Batch> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    let mut columns: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut record = Record::default();
        for (key, val) in obj {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
            record.set(key.clone(), json_to_cell(val));
        }
        records.push(record);
    }

    Ok(Batch::new(source, columns, records))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) if s.is_empty() => CellValue::Null,
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::from(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet file: one column per dataset column.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path, source: String) -> Result<Batch> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        // Pandas writes its row index as an extra column.
        .filter(|f| f.name() != "__index_level_0__")
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let arrays: Vec<(&String, &Arc<dyn Array>)> = columns
            .iter()
            .filter_map(|name| {
                let idx = schema.index_of(name).ok()?;
                Some((name, batch.column(idx)))
            })
            .collect();

        for row in 0..batch.num_rows() {
            let record: Record = arrays
                .iter()
                .map(|(name, col)| (name.as_str(), extract_cell(col, row)))
                .collect();
            records.push(record);
        }
    }

    Ok(Batch::new(source, columns, records))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::guess(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => CellValue::guess(col.as_string::<i64>().value(row)),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::from(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::from(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Text(col.as_boolean().value(row).to_string()),
        other => CellValue::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_cells_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "water.csv",
            "Country,Region,Income,Access,Law\nChile,LAC,High,87.5,Yes\nPeru,LAC,Upper middle,,No\n",
        );
        let batch = load_file(&path).unwrap();
        assert_eq!(batch.source, "water");
        assert_eq!(batch.columns, vec!["Country", "Region", "Income", "Access", "Law"]);
        assert_eq!(batch.records[0].get("Access"), &CellValue::Float(87.5));
        assert!(batch.records[1].get("Access").is_null());
        assert_eq!(batch.records[1].get("Law"), &CellValue::from("No"));
    }

    #[test]
    fn json_records_keep_first_seen_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "health.json",
            r#"[{"Country": "Chile", "Beds": 2}, {"Country": "Peru", "Beds": null, "Extra": "x"}]"#,
        );
        let batch = load_file(&path).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.has_column("Extra"));
        assert_eq!(batch.records[0].get("Beds"), &CellValue::Integer(2));
        assert!(batch.records[1].get("Beds").is_null());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.txt", "hello");
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn bad_files_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_good.csv", "Country,Region\nChile,LAC\n");
        write(dir.path(), "b_bad.json", "{ not json");
        write(dir.path(), "c_ignored.txt", "skip me");
        let (batches, warnings) = load_dir(dir.path());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].source, "a_good");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("b_bad.json"));
    }

    #[test]
    fn missing_dir_loads_nothing() {
        let (batches, warnings) = load_dir(Path::new("/definitely/not/here"));
        assert!(batches.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn whole_excel_floats_become_integers() {
        assert_eq!(excel_to_cell(&Data::Float(3.0)), CellValue::Integer(3));
        assert_eq!(excel_to_cell(&Data::Float(2.5)), CellValue::Float(2.5));
        assert!(excel_to_cell(&Data::Empty).is_null());
    }

    #[test]
    fn csv_na_spellings_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "t.csv",
            "Country,x,Law
Chile,2,Yes
Peru,NA,No
Kenya,6,N/A
",
        );
        let batch = load_file(&path).unwrap();
        assert!(batch.records[1].get("x").is_null());
        assert!(batch.records[2].get("Law").is_null());
        assert_eq!(batch.records[2].get("x"), &CellValue::Integer(6));
    }

    #[test]
    fn parquet_columns_nulls_and_pandas_index() {
        use arrow::array::{Float64Array, Int64Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("Country", DataType::Utf8, true),
            Field::new("Code", DataType::Utf8, true),
            Field::new("Beds", DataType::Float64, true),
            Field::new("__index_level_0__", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![Some("Chile"), None, Some("Kenya")])),
                Arc::new(StringArray::from(vec![Some("CL"), Some("NA"), Some("KE")])),
                Arc::new(Float64Array::from(vec![Some(2.5), Some(3.0), None])),
                Arc::new(Int64Array::from(vec![0, 1, 2])),
            ],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded.source, "health");
        assert_eq!(loaded.columns, vec!["Country", "Code", "Beds"]);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.records[0].get("Country"), &CellValue::from("Chile"));
        assert!(loaded.records[1].get("Country").is_null());
        assert!(loaded.records[1].get("Code").is_null());
        assert_eq!(loaded.records[2].get("Code"), &CellValue::from("KE"));
        assert_eq!(loaded.records[0].get("Beds"), &CellValue::Float(2.5));
        assert!(loaded.records[2].get("Beds").is_null());
        assert!(!loaded.records[0].cells.contains_key("__index_level_0__"));
    }

    #[test]
    fn xlsx_first_sheet_with_blank_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Country").unwrap();
        sheet.write_string(0, 2, "Access").unwrap();
        sheet.write_string(1, 0, "Chile").unwrap();
        sheet.write_string(1, 1, "north").unwrap();
        sheet.write_number(1, 2, 3.0).unwrap();
        sheet.write_string(2, 0, "Peru").unwrap();
        sheet.write_number(2, 2, 2.5).unwrap();
        sheet.write_string(3, 0, "Kenya").unwrap();
        sheet.write_string(3, 2, "N/A").unwrap();
        workbook.save(&path).unwrap();

        let batch = load_file(&path).unwrap();
        assert_eq!(batch.source, "water");
        assert_eq!(batch.columns, vec!["Country", "column_2", "Access"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.records[0].get("column_2"), &CellValue::from("north"));
        assert_eq!(batch.records[0].get("Access"), &CellValue::Integer(3));
        assert_eq!(batch.records[1].get("Access"), &CellValue::Float(2.5));
        assert!(batch.records[1].get("column_2").is_null());
        assert!(batch.records[2].get("Access").is_null());
    }
}
