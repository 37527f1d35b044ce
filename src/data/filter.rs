use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};

use super::model::{CellValue, Dataset, Record, COUNTRY, INCOME, REGION, SNAPSHOT_URL};

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

/// A categorical column usable as a filter or grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Facet {
    Country,
    Region,
    Income,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Country, Facet::Region, Facet::Income];

    pub fn column(self) -> &'static str {
        match self {
            Facet::Country => COUNTRY,
            Facet::Region => REGION,
            Facet::Income => INCOME,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Facet::Country => "country",
            Facet::Region => "region",
            Facet::Income => "income group",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Facet {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        Facet::ALL
            .into_iter()
            .find(|f| f.column().eq_ignore_ascii_case(s))
            .ok_or_else(|| PortalError::InvalidChoice {
                kind: "facet",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Filter predicate: which values are selected per facet
// ---------------------------------------------------------------------------

/// What an empty facet selection means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySelection {
    /// Empty selection = no constraint on that facet.
    MatchAll,
    /// Empty Region or Income selection is a deliberate "nothing chosen" and
    /// the request is refused. Country stays an optional refinement.
    #[default]
    Reject,
}

impl FromStr for EmptySelection {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "match_all" | "all" => Ok(EmptySelection::MatchAll),
            "reject" | "none" => Ok(EmptySelection::Reject),
            _ => Err(PortalError::InvalidChoice {
                kind: "empty-selection policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Selected values per facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub regions: BTreeSet<String>,
    pub incomes: BTreeSet<String>,
    pub countries: BTreeSet<String>,
}

impl FilterSpec {
    /// Every region and income group selected, no country refinement.
    pub fn select_all(dataset: &Dataset) -> Self {
        FilterSpec {
            regions: facet_values(dataset, Facet::Region).into_iter().collect(),
            incomes: facet_values(dataset, Facet::Income).into_iter().collect(),
            countries: BTreeSet::new(),
        }
    }

    pub fn selected(&self, facet: Facet) -> &BTreeSet<String> {
        match facet {
            Facet::Country => &self.countries,
            Facet::Region => &self.regions,
            Facet::Income => &self.incomes,
        }
    }

    pub fn selected_mut(&mut self, facet: Facet) -> &mut BTreeSet<String> {
        match facet {
            Facet::Country => &mut self.countries,
            Facet::Region => &mut self.regions,
            Facet::Income => &mut self.incomes,
        }
    }

    pub fn with<I, S>(mut self, facet: Facet, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_mut(facet)
            .extend(values.into_iter().map(Into::into));
        self
    }
}

/// Facet value as text; non-text cells compare by their rendering.
fn facet_text(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Null => None,
        CellValue::Text(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Sorted distinct non-missing values of a facet.
pub fn facet_values(dataset: &Dataset, facet: Facet) -> Vec<String> {
    dataset
        .unique_values
        .get(facet.column())
        .map(|vals| vals.iter().filter_map(facet_text).collect::<BTreeSet<_>>())
        .unwrap_or_default()
        .into_iter()
        .collect()
}

/// Countries offered for refinement: those whose region is selected.
pub fn country_options(dataset: &Dataset, regions: &BTreeSet<String>) -> Vec<String> {
    dataset
        .records
        .iter()
        .filter(|r| facet_text(r.get(REGION)).is_some_and(|reg| regions.contains(&reg)))
        .filter_map(|r| facet_text(r.get(COUNTRY)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Return indices of records that pass all facet constraints.
///
/// A record passes a facet when:
/// * The selection is empty and the policy is `MatchAll` → passes
/// * The record's value is in the selected set → passes
/// * The record's value is missing → fails
pub fn filtered_indices(
    dataset: &Dataset,
    filters: &FilterSpec,
    policy: EmptySelection,
) -> Result<Vec<usize>> {
    let mut active: Vec<(&'static str, &BTreeSet<String>)> = Vec::new();
    for facet in [Facet::Region, Facet::Income, Facet::Country] {
        let selected = filters.selected(facet);
        if selected.is_empty() {
            if policy == EmptySelection::Reject && facet != Facet::Country {
                return Err(PortalError::EmptySelection(facet.label()));
            }
            continue;
        }
        if !dataset.has_column(facet.column()) {
            return Err(PortalError::MissingColumn {
                column: facet.column().to_string(),
                context: format!("theme '{}'", dataset.theme),
            });
        }
        active.push((facet.column(), selected));
    }

    let indices = dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            active.iter().all(|(col, selected)| {
                facet_text(rec.get(col)).is_some_and(|v| selected.contains(&v))
            })
        })
        .map(|(i, _)| i)
        .collect();
    Ok(indices)
}

/// The filtered records themselves, in dataset order.
pub fn filter<'a>(
    dataset: &'a Dataset,
    filters: &FilterSpec,
    policy: EmptySelection,
) -> Result<Vec<&'a Record>> {
    Ok(filtered_indices(dataset, filters, policy)?
        .into_iter()
        .map(|i| &dataset.records[i])
        .collect())
}

/// First snapshot link recorded for `country` among `records`.
pub fn snapshot_url<'a>(records: impl IntoIterator<Item = &'a Record>, country: &str) -> Option<String> {
    records
        .into_iter()
        .filter(|r| r.get(COUNTRY).as_text() == Some(country))
        .find_map(|r| match r.get(SNAPSHOT_URL) {
            CellValue::Null => None,
            v => Some(v.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Batch;
    use crate::data::store::DatasetStore;

    fn dataset() -> Dataset {
        let columns: Vec<String> = ["Theme", "Country", "Region", "Income", "SnapshotURL"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = [
            ["Health", "Chile", "LAC", "High", "https://x/chile"],
            ["Health", "Peru", "LAC", "Upper middle", ""],
            ["Health", "Kenya", "SSA", "Lower middle", "https://x/kenya"],
            ["Health", "Nepal", "SAR", "Lower middle", ""],
        ];
        let records = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.as_str(), CellValue::guess(v)))
                    .collect()
            })
            .collect();
        let mut store = DatasetStore::new();
        store
            .ingest(Batch::new("t", columns, records), None)
            .unwrap();
        store.dataset("Health").unwrap().clone()
    }

    #[test]
    fn select_all_passes_everything() {
        let ds = dataset();
        let spec = FilterSpec::select_all(&ds);
        for policy in [EmptySelection::MatchAll, EmptySelection::Reject] {
            assert_eq!(filtered_indices(&ds, &spec, policy).unwrap(), vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn absent_region_yields_empty_under_both_policies() {
        let ds = dataset();
        let base = FilterSpec::select_all(&ds);
        let spec = FilterSpec {
            regions: ["Antarctica".to_string()].into(),
            ..base
        };
        for policy in [EmptySelection::MatchAll, EmptySelection::Reject] {
            assert!(filtered_indices(&ds, &spec, policy).unwrap().is_empty());
        }
    }

    #[test]
    fn empty_selection_policies_differ() {
        let ds = dataset();
        let spec = FilterSpec::default();
        assert_eq!(
            filtered_indices(&ds, &spec, EmptySelection::MatchAll).unwrap().len(),
            4
        );
        assert!(matches!(
            filtered_indices(&ds, &spec, EmptySelection::Reject),
            Err(PortalError::EmptySelection("region"))
        ));
    }

    #[test]
    fn country_refinement_is_optional_under_reject() {
        let ds = dataset();
        let spec = FilterSpec::select_all(&ds).with(Facet::Country, ["Kenya"]);
        assert_eq!(
            filtered_indices(&ds, &spec, EmptySelection::Reject).unwrap(),
            vec![2]
        );
    }

    #[test]
    fn facets_combine_with_and() {
        let ds = dataset();
        let spec = FilterSpec::default()
            .with(Facet::Region, ["LAC", "SSA"])
            .with(Facet::Income, ["Lower middle"]);
        assert_eq!(
            filtered_indices(&ds, &spec, EmptySelection::MatchAll).unwrap(),
            vec![2]
        );
    }

    #[test]
    fn country_options_follow_region_selection() {
        let ds = dataset();
        let regions = ["LAC".to_string()].into();
        assert_eq!(country_options(&ds, &regions), vec!["Chile", "Peru"]);
        assert_eq!(facet_values(&ds, Facet::Income).len(), 3);
    }

    #[test]
    fn snapshot_lookup_by_exact_country() {
        let ds = dataset();
        assert_eq!(
            snapshot_url(&ds.records, "Kenya").as_deref(),
            Some("https://x/kenya")
        );
        assert_eq!(snapshot_url(&ds.records, "Peru"), None);
        assert_eq!(snapshot_url(&ds.records, "kenya"), None);
    }

    #[test]
    fn facet_parses_case_insensitively() {
        assert_eq!("region".parse::<Facet>().unwrap(), Facet::Region);
        assert!("Continent".parse::<Facet>().is_err());
    }
}
