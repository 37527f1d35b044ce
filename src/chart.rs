use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::country::{map_join, CountryCodes};
use crate::data::model::CellValue;
use crate::data::table::Table;
use crate::error::{PortalError, Result};

// ---------------------------------------------------------------------------
// Chart kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Scatter,
    Radar,
    Funnel,
    Map,
}

impl ChartKind {
    pub const ALL: [ChartKind; 6] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Scatter,
        ChartKind::Radar,
        ChartKind::Funnel,
        ChartKind::Map,
    ];

    /// Whether the chart draws one mark per group rather than per row.
    pub fn aggregates(self) -> bool {
        matches!(
            self,
            ChartKind::Bar | ChartKind::Radar | ChartKind::Funnel | ChartKind::Map
        )
    }

    pub fn min_indicators(self) -> usize {
        match self {
            ChartKind::Scatter | ChartKind::Radar => 2,
            _ => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar",
            ChartKind::Line => "Line",
            ChartKind::Scatter => "Scatter",
            ChartKind::Radar => "Radar",
            ChartKind::Funnel => "Funnel",
            ChartKind::Map => "Map",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartKind {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        ChartKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PortalError::InvalidChoice {
                kind: "chart type",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Renderer-ready data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// One vertex of a radar trace: long form of the aggregated table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPoint {
    pub group: String,
    pub indicator: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScale {
    Continuous,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub iso3: String,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapData {
    pub indicator: String,
    pub points: Vec<MapPoint>,
    /// Rows dropped because their name had no ISO3 code.
    pub unmapped: usize,
    pub scale: ColorScale,
}

impl MapData {
    /// "N countries could not be mapped", or nothing if all were.
    pub fn unmapped_notice(&self) -> Option<String> {
        (self.unmapped > 0).then(|| format!("{} countries could not be mapped", self.unmapped))
    }
}

/// What a renderer needs for the chosen chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartData {
    /// Nothing survived filtering; show a neutral "no data" state.
    Empty,
    /// Bar and line charts: x from `key`, one series per indicator.
    Series { kind: ChartKind, key: String, table: SeriesTable },
    Scatter { x: String, y: String, points: Vec<ScatterPoint> },
    Radar { points: Vec<RadarPoint> },
    Funnel { stages: Vec<FunnelStage> },
    Map(MapData),
}

/// Serializable view of a [`Table`] for the series charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<SeriesCell>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesCell {
    Number(f64),
    Text(String),
}

impl From<&Table> for SeriesTable {
    fn from(table: &Table) -> Self {
        let rows = table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        CellValue::Null => None,
                        CellValue::Text(s) => Some(SeriesCell::Text(s.clone())),
                        other => other.as_f64().map(SeriesCell::Number),
                    })
                    .collect()
            })
            .collect();
        SeriesTable {
            columns: table.columns.clone(),
            rows,
        }
    }
}

/// Settings that shape chart preparation.
#[derive(Debug, Clone)]
pub struct ChartOptions<'a> {
    pub codes: &'a CountryCodes,
    pub map_category_threshold: usize,
}

/// Turn a pipeline table into chart data.
///
/// `table` must already be numeric in `indicators` and, for aggregating
/// kinds, grouped by `key`.
pub fn prepare(
    kind: ChartKind,
    table: &Table,
    key: &str,
    indicators: &[String],
    options: &ChartOptions<'_>,
) -> Result<ChartData> {
    if indicators.is_empty() {
        return Err(PortalError::NoNumericIndicator);
    }
    if indicators.len() < kind.min_indicators() {
        return Err(PortalError::NotEnoughIndicators {
            chart: kind.name(),
            needed: kind.min_indicators(),
            got: indicators.len(),
        });
    }
    if table.is_empty() {
        return Ok(ChartData::Empty);
    }

    let data = match kind {
        ChartKind::Bar | ChartKind::Line => ChartData::Series {
            kind,
            key: key.to_string(),
            table: SeriesTable::from(table),
        },
        ChartKind::Scatter => scatter(table, key, &indicators[0], &indicators[1]),
        ChartKind::Radar => radar(table, key, indicators),
        ChartKind::Funnel => funnel(table, indicators),
        ChartKind::Map => ChartData::Map(map(table, key, &indicators[0], options)),
    };
    Ok(data)
}

fn numbers(table: &Table, column: &str) -> Vec<Option<f64>> {
    table
        .column(column)
        .map(|vals| vals.map(CellValue::as_f64).collect())
        .unwrap_or_else(|| vec![None; table.len()])
}

fn labels(table: &Table, column: &str) -> Vec<String> {
    table
        .column(column)
        .map(|vals| vals.map(|v| v.to_string()).collect())
        .unwrap_or_else(|| vec![String::new(); table.len()])
}

fn scatter(table: &Table, key: &str, x: &str, y: &str) -> ChartData {
    let points = labels(table, key)
        .into_iter()
        .zip(numbers(table, x))
        .zip(numbers(table, y))
        .filter_map(|((label, x), y)| Some(ScatterPoint { label, x: x?, y: y? }))
        .collect();
    ChartData::Scatter {
        x: x.to_string(),
        y: y.to_string(),
        points,
    }
}

fn radar(table: &Table, key: &str, indicators: &[String]) -> ChartData {
    let groups = labels(table, key);
    let mut points = Vec::new();
    for (row, group) in groups.iter().enumerate() {
        for ind in indicators {
            if let Some(value) = table
                .column_index(ind)
                .and_then(|idx| table.rows[row][idx].as_f64())
            {
                points.push(RadarPoint {
                    group: group.clone(),
                    indicator: ind.clone(),
                    value,
                });
            }
        }
    }
    ChartData::Radar { points }
}

fn funnel(table: &Table, indicators: &[String]) -> ChartData {
    let stages = indicators
        .iter()
        .map(|ind| FunnelStage {
            stage: ind.clone(),
            value: numbers(table, ind).into_iter().flatten().sum(),
        })
        .collect();
    ChartData::Funnel { stages }
}

fn map(table: &Table, key: &str, indicator: &str, options: &ChartOptions<'_>) -> MapData {
    let (joined, unmapped) = map_join(options.codes, table, key);
    let key_idx = table.column_index(key);
    let value_idx = table.column_index(indicator);

    let points: Vec<MapPoint> = joined
        .into_iter()
        .filter_map(|(iso3, row)| {
            let value = row[value_idx?].as_f64()?;
            Some(MapPoint {
                iso3,
                name: row[key_idx?].to_string(),
                value,
            })
        })
        .collect();

    let distinct: BTreeSet<u64> = points.iter().map(|p| p.value.to_bits()).collect();
    let scale = if distinct.len() > options.map_category_threshold {
        ColorScale::Continuous
    } else {
        ColorScale::Categorical
    };
    MapData {
        indicator: indicator.to_string(),
        points,
        unmapped,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped() -> Table {
        let mut t = Table::new(vec!["Country".into(), "a".into(), "b".into()]);
        t.push_row(vec!["Chile".into(), CellValue::Float(1.0), CellValue::Float(4.0)]);
        t.push_row(vec!["Atlantis".into(), CellValue::Float(2.0), CellValue::Null]);
        t.push_row(vec!["Côte d'Ivoire".into(), CellValue::Null, CellValue::Float(6.0)]);
        t
    }

    fn inds(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    fn prep(kind: ChartKind, table: &Table, indicators: &[String]) -> Result<ChartData> {
        let codes = CountryCodes::default();
        let options = ChartOptions {
            codes: &codes,
            map_category_threshold: 10,
        };
        prepare(kind, table, "Country", indicators, &options)
    }

    #[test]
    fn scatter_and_radar_need_two_indicators() {
        for kind in [ChartKind::Scatter, ChartKind::Radar] {
            assert!(matches!(
                prep(kind, &grouped(), &inds(&["a"])),
                Err(PortalError::NotEnoughIndicators { needed: 2, got: 1, .. })
            ));
        }
        assert!(matches!(
            prep(ChartKind::Bar, &grouped(), &[]),
            Err(PortalError::NoNumericIndicator)
        ));
    }

    #[test]
    fn empty_table_is_a_signal_not_an_error() {
        let t = Table::new(vec!["Country".into(), "a".into()]);
        assert_eq!(prep(ChartKind::Bar, &t, &inds(&["a"])).unwrap(), ChartData::Empty);
    }

    #[test]
    fn funnel_sums_each_indicator() {
        let data = prep(ChartKind::Funnel, &grouped(), &inds(&["a", "b"])).unwrap();
        let ChartData::Funnel { stages } = data else {
            panic!("expected funnel, got {data:?}");
        };
        assert_eq!(stages[0], FunnelStage { stage: "a".into(), value: 3.0 });
        assert_eq!(stages[1], FunnelStage { stage: "b".into(), value: 10.0 });
    }

    #[test]
    fn radar_skips_missing_values() {
        let data = prep(ChartKind::Radar, &grouped(), &inds(&["a", "b"])).unwrap();
        let ChartData::Radar { points } = data else {
            panic!("expected radar, got {data:?}");
        };
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn scatter_needs_both_coordinates() {
        let data = prep(ChartKind::Scatter, &grouped(), &inds(&["a", "b"])).unwrap();
        let ChartData::Scatter { points, .. } = data else {
            panic!("expected scatter, got {data:?}");
        };
        assert_eq!(points, vec![ScatterPoint { label: "Chile".into(), x: 1.0, y: 4.0 }]);
    }

    #[test]
    fn map_drops_unmapped_and_missing() {
        let data = prep(ChartKind::Map, &grouped(), &inds(&["b"])).unwrap();
        let ChartData::Map(map) = data else {
            panic!("expected map, got {data:?}");
        };
        let codes: Vec<&str> = map.points.iter().map(|p| p.iso3.as_str()).collect();
        assert_eq!(codes, vec!["CHL", "CIV"]);
        assert_eq!(map.unmapped, 1);
        assert_eq!(map.scale, ColorScale::Categorical);
        assert_eq!(
            map.unmapped_notice().as_deref(),
            Some("1 countries could not be mapped")
        );
    }

    #[test]
    fn many_distinct_values_use_continuous_scale() {
        let mut t = Table::new(vec!["Country".into(), "v".into()]);
        for (i, name) in ["Chile", "Peru", "Kenya", "Nepal", "Ghana", "Mali", "Chad", "Togo", "Fiji", "Oman", "Iraq"]
            .iter()
            .enumerate()
        {
            t.push_row(vec![(*name).into(), CellValue::Float(i as f64)]);
        }
        let ChartData::Map(map) = prep(ChartKind::Map, &t, &inds(&["v"])).unwrap() else {
            panic!("expected map");
        };
        assert_eq!(map.points.len(), 11);
        assert_eq!(map.scale, ColorScale::Continuous);
    }

    #[test]
    fn chart_kind_round_trips_through_text() {
        for kind in ChartKind::ALL {
            assert_eq!(kind.to_string().parse::<ChartKind>().unwrap(), kind);
        }
    }
}
