use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::EmptySelection;
use crate::data::pipeline::DEFAULT_SENTINEL;

/// Deployment settings. Every field has a default, so an empty JSON object
/// (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Directory auto-loaded when a session starts.
    pub data_dir: PathBuf,
    /// What an empty Region / Income selection means.
    pub empty_selection: EmptySelection,
    /// "No data" placeholder recoded to missing before aggregation; `null`
    /// turns the recoding off.
    pub sentinel: Option<f64>,
    /// Maps with more distinct values than this use a continuous scale.
    pub map_category_threshold: usize,
    /// Extra country name → ISO3 entries on top of the built-in overrides.
    pub country_overrides: BTreeMap<String, String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            empty_selection: EmptySelection::default(),
            sentinel: Some(DEFAULT_SENTINEL),
            map_category_threshold: 10,
            country_overrides: BTreeMap::new(),
        }
    }
}

impl PortalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PortalConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded config from {}: {config:?}", path.display());
        Ok(config)
    }
}
