use std::path::Path;

use crate::chart::{self, ChartData, ChartKind, ChartOptions};
use crate::config::PortalConfig;
use crate::data::country::CountryCodes;
use crate::data::filter::{self, Facet, FilterSpec};
use crate::data::loader::{self, LoadWarning};
use crate::data::model::{Batch, Dataset, COUNTRY};
use crate::data::pipeline::{self, Statistic};
use crate::data::store::{DatasetStore, IngestSummary};
use crate::data::table::Table;
use crate::error::{PortalError, Result};

// ---------------------------------------------------------------------------
// Selection state
// ---------------------------------------------------------------------------

/// How rows are grouped for aggregating charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    /// Country when countries are selected, otherwise Region.
    #[default]
    Auto,
    By(Facet),
    /// Plot every row as is.
    Ungrouped,
}

/// Everything the user has chosen for the current theme.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub theme: Option<String>,
    pub filters: FilterSpec,
    pub indicators: Vec<String>,
    pub statistic: Statistic,
    pub grouping: Grouping,
    pub chart: ChartKind,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One user's portal state: the datasets they loaded and what they selected.
///
/// Sessions share nothing. Every mutation goes through `&mut self`, so two
/// ingests into the same session can never interleave.
pub struct Session {
    config: PortalConfig,
    store: DatasetStore,
    codes: CountryCodes,
    pub selection: Selection,
    /// Files skipped while loading, most recent last.
    pub warnings: Vec<LoadWarning>,
}

impl Session {
    pub fn new(config: PortalConfig) -> Self {
        let codes = CountryCodes::with_overrides(&config.country_overrides);
        Self {
            config,
            store: DatasetStore::new(),
            codes,
            selection: Selection::default(),
            warnings: Vec::new(),
        }
    }

    /// New session with the configured data directory already loaded.
    pub fn start(config: PortalConfig) -> Self {
        let mut session = Session::new(config);
        let dir = session.config.data_dir.clone();
        session.load_dir(&dir);
        session
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Add a batch; rows without a theme are filed under the batch source.
    pub fn ingest(&mut self, batch: Batch) -> Result<IngestSummary> {
        let declared = batch.source.clone();
        let summary = self.store.ingest(batch, Some(&declared))?;
        match self.selection.theme.clone() {
            None => {
                if let Some(first) = self.store.themes().into_iter().next() {
                    self.select_theme(&first)?;
                }
            }
            Some(theme) if summary.rows_by_theme.contains_key(&theme) => {
                self.refresh_facets(&theme)?;
            }
            Some(_) => {}
        }
        Ok(summary)
    }

    /// Auto-load every supported file in `dir`.
    pub fn load_dir(&mut self, dir: &Path) -> Vec<LoadWarning> {
        let (batches, warnings) = loader::load_dir(dir);
        self.absorb(batches, warnings)
    }

    /// Load uploaded files.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<LoadWarning> {
        let (batches, warnings) = loader::load_files(paths);
        self.absorb(batches, warnings)
    }

    fn absorb(&mut self, batches: Vec<Batch>, mut warnings: Vec<LoadWarning>) -> Vec<LoadWarning> {
        for batch in batches {
            let source = batch.source.clone();
            if let Err(e) = self.ingest(batch) {
                log::warn!("Could not ingest {source}: {e}");
                warnings.push(LoadWarning {
                    path: source.into(),
                    message: e.to_string(),
                });
            }
        }
        self.warnings.extend(warnings.iter().cloned());
        warnings
    }

    pub fn themes(&self) -> Vec<String> {
        self.store.themes()
    }

    /// Dataset of the selected theme.
    pub fn dataset(&self) -> Result<&Dataset> {
        let theme = self
            .selection
            .theme
            .as_deref()
            .ok_or(PortalError::NoThemeSelected)?;
        self.store.dataset(theme)
    }

    /// Switch theme and reset the selection to its defaults: every region
    /// and income group, no country refinement, the first indicator.
    pub fn select_theme(&mut self, theme: &str) -> Result<()> {
        let ds = self.store.dataset(theme)?;
        let filters = FilterSpec::select_all(ds);
        let indicators = ds.indicator_columns().into_iter().take(1).collect();
        self.selection = Selection {
            theme: Some(theme.to_string()),
            filters,
            indicators,
            statistic: self.selection.statistic,
            grouping: self.selection.grouping,
            chart: self.selection.chart,
        };
        Ok(())
    }

    /// Widen the region and income selections to every value the theme now
    /// holds, so rows from an upload are not hidden. Countries, indicators
    /// and chart choices are kept.
    fn refresh_facets(&mut self, theme: &str) -> Result<()> {
        let all = FilterSpec::select_all(self.store.dataset(theme)?);
        log::debug!("{theme}: facet selection refreshed after ingest");
        self.selection.filters.regions = all.regions;
        self.selection.filters.incomes = all.incomes;
        Ok(())
    }

    /// Toggle a single value in a facet's selection.
    pub fn toggle_filter_value(&mut self, facet: Facet, value: &str) {
        let selected = self.selection.filters.selected_mut(facet);
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
    }

    /// Select every value of a facet.
    pub fn select_all(&mut self, facet: Facet) -> Result<()> {
        let all = filter::facet_values(self.dataset()?, facet);
        *self.selection.filters.selected_mut(facet) = all.into_iter().collect();
        Ok(())
    }

    /// Deselect every value of a facet.
    pub fn select_none(&mut self, facet: Facet) {
        self.selection.filters.selected_mut(facet).clear();
    }

    /// Countries offered for the current region selection.
    pub fn country_options(&self) -> Result<Vec<String>> {
        Ok(filter::country_options(
            self.dataset()?,
            &self.selection.filters.regions,
        ))
    }

    /// The grouping column actually used, `None` when ungrouped.
    pub fn group_key(&self) -> Option<Facet> {
        match self.selection.grouping {
            Grouping::Auto if self.selection.filters.countries.is_empty() => Some(Facet::Region),
            Grouping::Auto => Some(Facet::Country),
            Grouping::By(facet) => Some(facet),
            Grouping::Ungrouped => None,
        }
    }

    /// Filtered rows, projected onto `Country, Region, Income` and the
    /// selected indicators.
    pub fn filtered_table(&self) -> Result<Table> {
        let ds = self.dataset()?;
        let rows = filter::filtered_indices(ds, &self.selection.filters, self.config.empty_selection)?;
        log::debug!("{} of {} rows pass the filters", rows.len(), ds.len());
        pipeline::project(ds, &rows, &self.selection.indicators)
    }

    /// Selected indicators that hold numbers once coerced. A column with a
    /// stray ".." among its values still qualifies.
    pub fn numeric_selection(&self) -> Result<Vec<String>> {
        let ds = self.dataset()?;
        Ok(self
            .selection
            .indicators
            .iter()
            .filter(|c| ds.has_numbers(c))
            .cloned()
            .collect())
    }

    /// Numeric, sentinel-free table, aggregated by the group key when
    /// `aggregate` is set and a key applies. Returns the table and the name
    /// of its label column.
    pub fn plot_table(&self, aggregate: bool) -> Result<(Table, String)> {
        let numeric = self.numeric_selection()?;
        if numeric.is_empty() {
            return Err(PortalError::NoNumericIndicator);
        }

        let mut table =
            pipeline::coerce_numeric(self.filtered_table()?, &self.selection.indicators);
        if let Some(sentinel) = self.config.sentinel {
            for col in &numeric {
                table = pipeline::sentinel_to_missing(table, col, sentinel);
            }
        }

        match self.group_key() {
            Some(facet) if aggregate => {
                let grouped =
                    pipeline::aggregate(&table, facet.column(), &numeric, self.selection.statistic)?;
                Ok((grouped, facet.column().to_string()))
            }
            Some(facet) => Ok((table, facet.column().to_string())),
            None => Ok((table, COUNTRY.to_string())),
        }
    }

    /// Data for the selected chart, or [`ChartData::Empty`] if no rows are
    /// left after filtering.
    pub fn chart_data(&self) -> Result<ChartData> {
        let kind = self.selection.chart;
        let (table, key) = self.plot_table(kind.aggregates())?;
        let numeric = self.numeric_selection()?;
        let options = ChartOptions {
            codes: &self.codes,
            map_category_threshold: self.config.map_category_threshold,
        };
        chart::prepare(kind, &table, &key, &numeric, &options)
    }

    /// Snapshot link of a country among the currently filtered rows.
    pub fn snapshot_url(&self, country: &str) -> Result<Option<String>> {
        let ds = self.dataset()?;
        let rows = filter::filter(ds, &self.selection.filters, self.config.empty_selection)?;
        Ok(filter::snapshot_url(rows, country))
    }
}
