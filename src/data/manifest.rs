use std::fs;
use std::path::Path;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One labeling category as it appears in `notes.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Parsed `notes.json` shipped alongside the labeled dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryManifest {
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl CategoryManifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read category manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse category manifest {}", path.display()))?;
        Ok(manifest)
    }

    /// Class count is max(id) + 1 over the observed ids, NOT the number of
    /// categories. Ids need not be contiguous; downstream training configs
    /// depend on this exact arithmetic.
    pub fn class_count(&self) -> i64 {
        self.categories
            .iter()
            .map(|c| c.id + 1)
            .max()
            .unwrap_or(0)
            .max(0)
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }
}

/// The training configuration written as `data.yaml` and consumed by the
/// external training routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: i64,
    pub names: Vec<String>,
}

impl SplitManifest {
    /// `nc` derives from max id + 1 while `names` derives from the category
    /// list length; `len(names) == nc` is deliberately not enforced.
    pub fn from_categories(categories: &CategoryManifest) -> Self {
        Self {
            train: "../train/images".to_string(),
            val: "../valid/images".to_string(),
            test: "../test/images".to_string(),
            nc: categories.class_count(),
            names: categories.category_names(),
        }
    }

    pub fn write_yaml(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)
            .with_context(|| format!("failed to write split manifest {}", path.display()))?;
        tracing::info!("{} file created successfully", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_ids(ids: &[i64]) -> CategoryManifest {
        CategoryManifest {
            categories: ids
                .iter()
                .map(|&id| Category {
                    id,
                    name: format!("class_{id}"),
                })
                .collect(),
        }
    }

    #[test]
    fn class_count_is_max_id_plus_one() {
        let manifest = manifest_with_ids(&[0, 2, 5]);
        assert_eq!(manifest.class_count(), 6);
    }

    #[test]
    fn class_count_of_empty_manifest_is_zero() {
        assert_eq!(CategoryManifest::default().class_count(), 0);
    }

    #[test]
    fn names_and_nc_may_disagree() {
        // Three categories but a top id of 5: nc is 6 while names has 3
        // entries. The mismatch is part of the observed contract.
        let manifest = SplitManifest::from_categories(&manifest_with_ids(&[0, 2, 5]));
        assert_eq!(manifest.nc, 6);
        assert_eq!(manifest.names.len(), 3);
    }

    #[test]
    fn split_paths_are_relative() {
        let manifest = SplitManifest::from_categories(&manifest_with_ids(&[0]));
        assert_eq!(manifest.train, "../train/images");
        assert_eq!(manifest.val, "../valid/images");
        assert_eq!(manifest.test, "../test/images");
    }

    #[test]
    fn yaml_round_trips() {
        let manifest = SplitManifest::from_categories(&manifest_with_ids(&[0, 1]));
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let back: SplitManifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, manifest);
    }
}
