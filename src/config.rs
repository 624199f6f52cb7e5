//! Dataset configuration: header blocks, categories and run options

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Category, Info, License};
use crate::split::SplitRatios;

/// Default polygon simplification tolerance, in pixels
pub const DEFAULT_TOLERANCE: f64 = 2.0;

/// Static dataset description shared by all three output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub info: Info,
    #[serde(default = "default_licenses")]
    pub licenses: Vec<License>,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
}

fn default_licenses() -> Vec<License> {
    vec![License::default()]
}

// COCO defines ids up to 91, so custom classes start at 92.
fn default_categories() -> Vec<Category> {
    vec![
        Category::new(92, "box", "furniture"),
        Category::new(93, "chicken", "animal"),
    ]
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            info: Info::default(),
            licenses: default_licenses(),
            categories: default_categories(),
        }
    }
}

impl DatasetConfig {
    /// Configuration with the default header blocks and the given categories.
    pub fn with_categories(categories: Vec<Category>) -> Result<Self> {
        let config = Self {
            categories,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file. Missing blocks fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("at least one category is required".into()));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "category {} has an empty name",
                    category.id
                )));
            }
            if !names.insert(category.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate category name '{}'",
                    category.name
                )));
            }
            if !ids.insert(category.id) {
                return Err(Error::Config(format!(
                    "duplicate category id {}",
                    category.id
                )));
            }
        }
        Ok(())
    }
}

/// Knobs for a single conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub split: SplitRatios,
    pub tolerance: f64,
    /// `None` draws a seed from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            split: SplitRatios::default(),
            tolerance: DEFAULT_TOLERANCE,
            seed: None,
        }
    }
}
