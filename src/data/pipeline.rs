use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};

use super::model::{CellValue, Dataset, COUNTRY, INCOME, REGION};
use super::table::Table;

/// Leading columns of every projected table.
pub const LEADING_COLUMNS: [&str; 3] = [COUNTRY, REGION, INCOME];

/// Placeholder some indicators use for "not applicable / no data".
pub const DEFAULT_SENTINEL: f64 = 999.0;

// ---------------------------------------------------------------------------
// Statistic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    #[default]
    Mean,
    Median,
}

impl Statistic {
    /// Apply to the non-missing values of a group; `None` when there are none.
    pub fn compute(self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Statistic::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Statistic::Median => {
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    Some((values[mid - 1] + values[mid]) / 2.0)
                } else {
                    Some(values[mid])
                }
            }
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean => f.write_str("Mean"),
            Statistic::Median => f.write_str("Median"),
        }
    }
}

impl FromStr for Statistic {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            _ => Err(PortalError::InvalidChoice {
                kind: "statistic",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Table transforms
// ---------------------------------------------------------------------------

/// `Country, Region, Income` followed by `indicators`, for the given rows.
pub fn project(dataset: &Dataset, rows: &[usize], indicators: &[String]) -> Result<Table> {
    for col in LEADING_COLUMNS {
        if !dataset.has_column(col) {
            return Err(PortalError::MissingColumn {
                column: col.to_string(),
                context: format!("theme '{}'", dataset.theme),
            });
        }
    }
    if let Some(unknown) = indicators
        .iter()
        .find(|c| !dataset.has_column(c) || LEADING_COLUMNS.contains(&c.as_str()))
    {
        return Err(PortalError::UnknownIndicator(unknown.clone()));
    }

    let columns: Vec<String> = LEADING_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(indicators.iter().cloned())
        .collect();
    let mut table = Table::new(columns);
    for &i in rows {
        let rec = &dataset.records[i];
        let row = table.columns.iter().map(|c| rec.get(c).clone()).collect();
        table.push_row(row);
    }
    Ok(table)
}

/// Parse the named columns as numbers; whatever does not parse becomes
/// missing. Other columns, and names the table does not have, are ignored.
pub fn coerce_numeric(mut table: Table, columns: &[String]) -> Table {
    let targets: Vec<usize> = columns
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    for row in &mut table.rows {
        for &idx in &targets {
            row[idx] = row[idx].to_numeric();
        }
    }
    table
}

/// Recode `sentinel` in `column` to missing.
pub fn sentinel_to_missing(mut table: Table, column: &str, sentinel: f64) -> Table {
    let Some(idx) = table.column_index(column) else {
        return table;
    };
    let mut recoded = 0usize;
    for row in &mut table.rows {
        if row[idx].as_f64() == Some(sentinel) {
            row[idx] = CellValue::Null;
            recoded += 1;
        }
    }
    if recoded > 0 {
        log::debug!("{column}: {recoded} sentinel value(s) {sentinel} recoded to missing");
    }
    table
}

/// Group rows by the value of `group_by` and reduce each requested column
/// with `statistic` over its non-missing numeric values.
///
/// The output has `group_by` followed by `columns`, one row per distinct key
/// in ascending key order. Rows with a missing key are dropped. A group with
/// no numeric value in a column yields a missing cell there.
pub fn aggregate(
    table: &Table,
    group_by: &str,
    columns: &[String],
    statistic: Statistic,
) -> Result<Table> {
    let key_idx = table
        .column_index(group_by)
        .ok_or_else(|| PortalError::MissingColumn {
            column: group_by.to_string(),
            context: "the filtered table".to_string(),
        })?;
    let value_idx: Vec<usize> = columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| PortalError::UnknownIndicator(c.clone()))
        })
        .collect::<Result<_>>()?;

    // BTreeMap keeps keys sorted; rows are pushed in table order.
    let mut groups: BTreeMap<&CellValue, Vec<&Vec<CellValue>>> = BTreeMap::new();
    for row in &table.rows {
        let key = &row[key_idx];
        if key.is_null() {
            continue;
        }
        groups.entry(key).or_default().push(row);
    }

    let out_columns: Vec<String> = std::iter::once(group_by.to_string())
        .chain(columns.iter().cloned())
        .collect();
    let mut out = Table::new(out_columns);
    for (key, rows) in groups {
        let mut out_row = Vec::with_capacity(columns.len() + 1);
        out_row.push(key.clone());
        for &idx in &value_idx {
            let mut values: Vec<f64> = rows.iter().filter_map(|r| r[idx].as_f64()).collect();
            out_row.push(
                statistic
                    .compute(&mut values)
                    .map(CellValue::from)
                    .unwrap_or(CellValue::Null),
            );
        }
        out.push_row(out_row);
    }
    log::debug!(
        "aggregated {} rows into {} {group_by} groups ({statistic})",
        table.len(),
        out.len()
    );
    Ok(out)
}
