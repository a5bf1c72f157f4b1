use std::fs;
use std::path::Path;
use anyhow::Context;
use crate::config::PipelineConfig;
use crate::object_store::ObjectStore;

const SPLIT_NAMES: [&str; 3] = ["train", "test", "valid"];

/// Stages the remote labeled dataset locally: `images/`, `labels/`,
/// `notes.json`, `classes.txt`. Also pre-creates the split tree the
/// splitter and trainer expect.
pub struct DatasetFetcher<'a, S: ObjectStore> {
    store: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, S: ObjectStore> DatasetFetcher<'a, S> {
    pub fn new(store: &'a S, config: &'a PipelineConfig) -> Self {
        Self { store, config }
    }

    pub async fn fetch(&self) -> anyhow::Result<()> {
        self.create_dataset_tree()?;
        self.create_staging_tree()?;
        self.download_folder("images").await?;
        self.download_folder("labels").await?;
        self.download_file("notes.json").await?;
        self.download_file("classes.txt").await?;
        Ok(())
    }

    /// Split destination tree plus an empty `data.yaml`, created if absent,
    /// never cleared.
    fn create_dataset_tree(&self) -> anyhow::Result<()> {
        let root = &self.config.local.datasets_local_path;
        for split in SPLIT_NAMES {
            for sub in ["images", "labels"] {
                fs::create_dir_all(root.join(split).join(sub))?;
            }
        }
        let data_yaml = root.join("data.yaml");
        if !data_yaml.exists() {
            fs::write(&data_yaml, "")?;
            tracing::info!("data.yaml file created inside {}", root.display());
        }
        Ok(())
    }

    /// Staging area with empty manifest placeholders, created if absent.
    fn create_staging_tree(&self) -> anyhow::Result<()> {
        let staging = &self.config.local.staging_path;
        fs::create_dir_all(staging.join("images"))?;
        fs::create_dir_all(staging.join("labels"))?;

        let notes = staging.join("notes.json");
        if !notes.exists() {
            fs::write(&notes, "{}")?;
        }
        let classes = staging.join("classes.txt");
        if !classes.exists() {
            fs::write(&classes, "")?;
        }
        tracing::info!("staging area ready at {}", staging.display());
        Ok(())
    }

    async fn download_folder(&self, folder: &str) -> anyhow::Result<()> {
        let prefix = format!("{}/{folder}/", self.config.store.datasets_path);
        let dest_dir = self.config.local.staging_path.join(folder);

        let keys = self.store.list(&prefix).await?;
        // The first listed object under a folder prefix is the folder
        // placeholder in this bucket layout; skip it.
        for key in keys.iter().skip(1) {
            let file_name = Path::new(key)
                .file_name()
                .with_context(|| format!("listed key has no file name: {key:?}"))?;
            self.store.get(key, &dest_dir.join(file_name)).await?;
        }
        tracing::info!(
            "finished downloading {folder} ({} objects) into {}",
            keys.len().saturating_sub(1),
            dest_dir.display()
        );
        Ok(())
    }

    async fn download_file(&self, name: &str) -> anyhow::Result<()> {
        let key = format!("{}/{name}", self.config.store.datasets_path);
        let dest = self.config.local.staging_path.join(name);
        self.store.get(&key, &dest).await?;
        tracing::info!("finished downloading {}", dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use async_trait::async_trait;

    struct FakeStore {
        keys: Vec<String>,
        downloads: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new(keys: &[&str]) -> Self {
            Self {
                keys: keys.iter().map(|k| k.to_string()).collect(),
                downloads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
            Ok(self
                .keys
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn get(&self, key: &str, dest: &Path) -> anyhow::Result<()> {
            self.downloads.lock().unwrap().push(key.to_string());
            fs::write(dest, b"fake")?;
            Ok(())
        }
    }

    fn test_config(root: &Path) -> PipelineConfig {
        let raw = format!(
            r#"
            [store]
            endpoint = "http://localhost:9000"
            access_key = "k"
            secret_key = "s"
            bucket = "b"
            datasets_path = "omr/v6"

            [local]
            datasets_local_path = "{root}/datasets"
            staging_path = "{root}/datasets_temp"

            [train]
            num_of_epochs = 1
            image_size = 640
            model = "yolov8n"

            [tracking]
            uri = "http://localhost:5000"

            [model]
            weights = "w.onnx"
            ort_lib = "lib.so"
            classes = "classes.txt"
            "#,
            root = root.display()
        );
        toml::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn fetch_skips_first_listed_object_per_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&[
            "omr/v6/images/",
            "omr/v6/images/a.jpg",
            "omr/v6/images/b.jpg",
            "omr/v6/labels/",
            "omr/v6/labels/a.txt",
        ]);
        let config = test_config(dir.path());

        DatasetFetcher::new(&store, &config).fetch().await.unwrap();

        let downloads = store.downloads.lock().unwrap().clone();
        // Folder markers are skipped; single-file manifests are not.
        assert!(!downloads.contains(&"omr/v6/images/".to_string()));
        assert!(!downloads.contains(&"omr/v6/labels/".to_string()));
        assert!(downloads.contains(&"omr/v6/images/a.jpg".to_string()));
        assert!(downloads.contains(&"omr/v6/images/b.jpg".to_string()));
        assert!(downloads.contains(&"omr/v6/notes.json".to_string()));
        assert!(downloads.contains(&"omr/v6/classes.txt".to_string()));

        let staging = dir.path().join("datasets_temp");
        assert!(staging.join("images/a.jpg").exists());
        assert!(staging.join("labels/a.txt").exists());
    }

    #[tokio::test]
    async fn creates_split_tree_and_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&[]);
        let config = test_config(dir.path());
        let fetcher = DatasetFetcher::new(&store, &config);

        fetcher.create_dataset_tree().unwrap();
        fetcher.create_staging_tree().unwrap();

        let datasets = dir.path().join("datasets");
        for split in ["train", "test", "valid"] {
            assert!(datasets.join(split).join("images").is_dir());
            assert!(datasets.join(split).join("labels").is_dir());
        }
        assert!(datasets.join("data.yaml").exists());

        let staging = dir.path().join("datasets_temp");
        assert_eq!(fs::read_to_string(staging.join("notes.json")).unwrap(), "{}");
        assert!(staging.join("classes.txt").exists());
    }

    #[tokio::test]
    async fn rerun_does_not_clear_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&[]);
        let config = test_config(dir.path());
        let fetcher = DatasetFetcher::new(&store, &config);

        fetcher.fetch().await.unwrap();
        let stale = PathBuf::from(dir.path()).join("datasets/train/images/stale.jpg");
        fs::write(&stale, b"old").unwrap();
        fetcher.fetch().await.unwrap();

        assert!(stale.exists());
    }
}
