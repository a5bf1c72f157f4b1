use std::fs;
use std::path::Path;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use crate::config::PipelineConfig;
use crate::data::{CategoryManifest, SplitManifest};

pub const IMAGE_EXT: &str = ".jpg";
pub const LABEL_EXT: &str = ".txt";

/// Train/test fractions are honored exactly (by floor); valid absorbs all
/// rounding error and any ratio-sum deficit or excess.
#[derive(Debug, Clone, Copy)]
pub struct SplitRatios {
    pub train: f64,
    pub test: f64,
    pub valid: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            test: 0.1,
            valid: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub test: usize,
    pub valid: usize,
}

/// Partitions the staged images and their same-stem label files into
/// `<dest>/<train|test|valid>/{images,labels}`. Files are copied, not moved;
/// destinations are created if absent and never cleared. Any copy failure,
/// including a missing label file, aborts the whole split.
///
/// The shuffle is unseeded by default; pass a seed for a reproducible
/// partition.
pub fn split_dataset(
    images_dir: &Path,
    labels_dir: &Path,
    dest_root: &Path,
    ratios: SplitRatios,
    seed: Option<u64>,
) -> anyhow::Result<SplitCounts> {
    for split in ["train", "test", "valid"] {
        for sub in ["images", "labels"] {
            fs::create_dir_all(dest_root.join(split).join(sub))?;
        }
    }

    let mut image_files: Vec<String> = fs::read_dir(images_dir)
        .with_context(|| format!("failed to list images dir {}", images_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(IMAGE_EXT))
        .collect();
    // Directory order is platform-dependent; sort before shuffling so a
    // seeded run is reproducible.
    image_files.sort();

    match seed {
        Some(seed) => image_files.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => image_files.shuffle(&mut rand::thread_rng()),
    }

    let total = image_files.len();
    let train_count = (ratios.train * total as f64).floor() as usize;
    let test_count = (ratios.test * total as f64).floor() as usize;

    // Whatever is left after the two floors goes to valid, regardless of the
    // nominal valid ratio.
    let (train_files, rest) = image_files.split_at(train_count.min(total));
    let (test_files, valid_files) = rest.split_at(test_count.min(rest.len()));

    copy_split(train_files, images_dir, labels_dir, &dest_root.join("train"))?;
    copy_split(test_files, images_dir, labels_dir, &dest_root.join("test"))?;
    copy_split(valid_files, images_dir, labels_dir, &dest_root.join("valid"))?;

    let counts = SplitCounts {
        train: train_files.len(),
        test: test_files.len(),
        valid: valid_files.len(),
    };
    tracing::info!(
        "split {total} images into train={} test={} valid={}",
        counts.train,
        counts.test,
        counts.valid
    );
    Ok(counts)
}

fn copy_split(
    files: &[String],
    images_dir: &Path,
    labels_dir: &Path,
    dest: &Path,
) -> anyhow::Result<()> {
    for file in files {
        fs::copy(images_dir.join(file), dest.join("images").join(file))
            .with_context(|| format!("failed to copy image {file}"))?;

        let label_file = file.replace(IMAGE_EXT, LABEL_EXT);
        fs::copy(
            labels_dir.join(&label_file),
            dest.join("labels").join(&label_file),
        )
        .with_context(|| format!("failed to copy label {label_file}"))?;
    }
    Ok(())
}

/// Splits the staging area into the local dataset tree and derives the
/// training configuration from the staged category manifest.
pub fn split_staged(config: &PipelineConfig, seed: Option<u64>) -> anyhow::Result<SplitCounts> {
    let staging = &config.local.staging_path;
    let counts = split_dataset(
        &staging.join("images"),
        &staging.join("labels"),
        &config.local.datasets_local_path,
        SplitRatios::default(),
        seed,
    )?;

    let categories = CategoryManifest::from_file(&staging.join("notes.json"))?;
    let manifest = SplitManifest::from_categories(&categories);
    manifest.write_yaml(&config.manifest_path())?;

    Ok(counts)
}
