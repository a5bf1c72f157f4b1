use std::path::Path;
use anyhow::Context;
use tokio::process::Command;
use crate::config::TrainConfig;

/// Thin wrapper over the external detection training command. The command
/// writes `results.csv` and `weights/{best,last}.pt` under its run
/// directory; this wrapper only sequences and checks the exit status.
pub struct Trainer<'a> {
    config: &'a TrainConfig,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a TrainConfig) -> Self {
        Self { config }
    }

    pub async fn train(&self, manifest_path: &Path) -> anyhow::Result<()> {
        let model_file = format!("{}.pt", self.config.model);
        tracing::info!(
            "training {model_file} for {} epochs at imgsz={}",
            self.config.num_of_epochs,
            self.config.image_size
        );

        let status = Command::new(&self.config.command)
            .arg("detect")
            .arg("train")
            .arg(format!("data={}", manifest_path.display()))
            .arg(format!("epochs={}", self.config.num_of_epochs))
            .arg(format!("imgsz={}", self.config.image_size))
            .arg(format!("model={model_file}"))
            .status()
            .await
            .with_context(|| format!("failed to launch trainer {:?}", self.config.command))?;

        anyhow::ensure!(status.success(), "training command exited with {status}");
        tracing::info!("Finish train model {model_file}");
        Ok(())
    }
}
