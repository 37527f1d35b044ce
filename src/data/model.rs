use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::schema::{ColumnKind, Schema};

// ---------------------------------------------------------------------------
// Reserved column names
// ---------------------------------------------------------------------------

pub const THEME: &str = "Theme";
pub const COUNTRY: &str = "Country";
pub const REGION: &str = "Region";
pub const INCOME: &str = "Income";

/// Per-country link to a policy snapshot document. Carried through untouched.
pub const SNAPSHOT_URL: &str = "SnapshotURL";

/// Columns that are never offered as indicators.
pub const RESERVED_COLUMNS: [&str; 5] = [THEME, COUNTRY, REGION, INCOME, SNAPSHOT_URL];

/// Text read as a missing value by the CSV, Excel and Parquet loaders.
pub const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// CellValue – a single cell of a dataset
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes a spreadsheet yields.
/// Used as a `BTreeMap` / `BTreeSet` key downstream, so it must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

static NULL: CellValue = CellValue::Null;

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Integer(_) | Float(_) => 1,
                Text(_) => 2,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            // Mixed numbers compare by value; the integer sorts first on a tie
            // so Integer(2) and Float(2.0) stay distinct keys.
            (Integer(a), Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Float(a), Integer(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Text(a), Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Null => {}
        }
    }
}

/// Missing cells render as the empty string, which is also what the CSV
/// export writes for them.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            CellValue::Null
        } else {
            CellValue::Float(v)
        }
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl CellValue {
    /// Interpret the value as an `f64` without parsing text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric reading of the cell: numbers pass through, text is parsed,
    /// anything unparseable becomes `Null`.
    pub fn to_numeric(&self) -> CellValue {
        match self {
            CellValue::Integer(_) | CellValue::Float(_) => self.clone(),
            CellValue::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    CellValue::Integer(i)
                } else if let Ok(f) = s.parse::<f64>() {
                    CellValue::from(f)
                } else {
                    CellValue::Null
                }
            }
            CellValue::Null => CellValue::Null,
        }
    }

    /// Whether a raw text cell is one of the usual spreadsheet spellings of
    /// "no value".
    pub fn is_na_token(s: &str) -> bool {
        s.is_empty() || NA_TOKENS.contains(&s)
    }

    /// Best-effort typing of a raw text cell (CSV field, Parquet string).
    pub fn guess(s: &str) -> CellValue {
        if CellValue::is_na_token(s) {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::from(f);
        }
        CellValue::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Record – one row of a dataset
// ---------------------------------------------------------------------------

/// A single row. Columns the row never had read as `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub cells: BTreeMap<String, CellValue>,
}

impl Record {
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&NULL)
    }

    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch – one parsed input file, before it is split by theme
// ---------------------------------------------------------------------------

/// Raw rows as handed over by the loader.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Where the rows came from; the file stem doubles as the default theme.
    pub source: String,
    /// Column names in file order.
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(source: impl Into<String>, columns: Vec<String>, records: Vec<Record>) -> Self {
        Batch {
            source: source.into(),
            columns,
            records,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dataset – all rows of one theme
// ---------------------------------------------------------------------------

/// Accumulated rows of a theme with pre-computed column indices.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub theme: String,
    pub records: Vec<Record>,
    /// Column names in first-appearance order across every appended batch.
    pub column_names: Vec<String>,
    /// Column kinds, merged over every appended batch.
    pub schema: Schema,
    /// For each column the sorted set of distinct non-missing values.
    pub unique_values: BTreeMap<String, BTreeSet<CellValue>>,
}

impl Dataset {
    pub fn new(theme: impl Into<String>) -> Self {
        Dataset {
            theme: theme.into(),
            records: Vec::new(),
            column_names: Vec::new(),
            schema: Schema::default(),
            unique_values: BTreeMap::new(),
        }
    }

    /// Append rows, widening the column set. Rows already held that lack a
    /// new column simply read it as `Null`.
    pub fn append(&mut self, columns: &[String], schema: &Schema, records: Vec<Record>) {
        for col in columns {
            if !self.column_names.contains(col) {
                self.column_names.push(col.clone());
            }
        }
        self.schema.merge(schema);

        for rec in &records {
            for (col, val) in &rec.cells {
                if val.is_null() {
                    continue;
                }
                self.unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        self.records.extend(records);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    pub fn kind(&self, column: &str) -> ColumnKind {
        self.schema.kind(column)
    }

    /// Every column that is not reserved, in column order.
    pub fn indicator_columns(&self) -> Vec<String> {
        self.column_names
            .iter()
            .filter(|c| !RESERVED_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    /// Whether `column` yields at least one number once parsed the way
    /// `pipeline::coerce_numeric` parses it.
    pub fn has_numbers(&self, column: &str) -> bool {
        if self.kind(column).is_numeric() {
            return true;
        }
        self.records
            .iter()
            .any(|r| !r.get(column).to_numeric().is_null())
    }

    /// Indicators that can be plotted (booleans count, as 0/1; text columns
    /// count when some of their cells parse as numbers).
    pub fn numeric_indicators(&self) -> Vec<String> {
        self.indicator_columns()
            .into_iter()
            .filter(|c| self.has_numbers(c))
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_reads_as_null() {
        let rec: Record = [("Country", "Chile")].into_iter().collect();
        assert_eq!(rec.get("Country"), &CellValue::from("Chile"));
        assert!(rec.get("Literacy").is_null());
    }

    #[test]
    fn to_numeric_parses_text_and_drops_garbage() {
        assert_eq!(CellValue::from(" 42 ").to_numeric(), CellValue::Integer(42));
        assert_eq!(CellValue::from("2.5").to_numeric(), CellValue::Float(2.5));
        assert_eq!(CellValue::from("n/a").to_numeric(), CellValue::Null);
        assert_eq!(CellValue::Float(1.5).to_numeric(), CellValue::Float(1.5));
    }

    #[test]
    fn numbers_sort_by_value_across_variants() {
        let mut vals = vec![
            CellValue::Float(2.5),
            CellValue::from("a"),
            CellValue::Integer(3),
            CellValue::Null,
            CellValue::Integer(1),
        ];
        vals.sort();
        assert_eq!(
            vals,
            vec![
                CellValue::Null,
                CellValue::Integer(1),
                CellValue::Float(2.5),
                CellValue::Integer(3),
                CellValue::from("a"),
            ]
        );
    }

    #[test]
    fn append_unions_columns_in_first_seen_order() {
        let mut ds = Dataset::new("Health");
        let a: Vec<String> = vec!["Country".into(), "Beds".into()];
        let b: Vec<String> = vec!["Country".into(), "Nurses".into()];
        ds.append(&a, &Schema::default(), vec![Record::default()]);
        ds.append(&b, &Schema::default(), vec![Record::default()]);
        assert_eq!(ds.column_names, vec!["Country", "Beds", "Nurses"]);
        assert_eq!(ds.indicator_columns(), vec!["Beds", "Nurses"]);
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn na_spellings_guess_as_missing() {
        for token in ["NA", "N/A", "n/a", "NULL", "null", "None", "#N/A", "nan", ""] {
            assert!(CellValue::guess(token).is_null(), "{token:?}");
        }
        assert_eq!(CellValue::guess("Nauru"), CellValue::from("Nauru"));
        assert_eq!(CellValue::guess("7"), CellValue::Integer(7));
    }

    #[test]
    fn mostly_numeric_text_column_counts_as_numeric() {
        let cols: Vec<String> = vec!["Country".into(), "x".into(), "Note".into()];
        let mut ds = Dataset::new("T");
        let records = [("2", "ok"), ("..", "fine"), ("6", "")]
            .into_iter()
            .map(|(x, note)| {
                [("Country", "Chile"), ("x", x), ("Note", note)]
                    .into_iter()
                    .collect::<Record>()
            })
            .collect();
        let schema = Schema {
            columns: [
                ("x".to_string(), ColumnKind::Text),
                ("Note".to_string(), ColumnKind::Text),
            ]
            .into(),
        };
        ds.append(&cols, &schema, records);
        assert!(ds.has_numbers("x"));
        assert!(!ds.has_numbers("Note"));
        assert_eq!(ds.numeric_indicators(), vec!["x"]);
    }
}
