use crate::config::PipelineConfig;
use crate::ingest::DatasetFetcher;
use crate::object_store::ObjectStore;
use crate::split;
use crate::track::{ExperimentRecorder, RunRecord};
use crate::train::Trainer;

/// The training pipeline: fetch, split, train, record, strictly in that
/// order. No stage is retried; the first failure aborts everything after it.
/// Re-runs are not idempotent: staging and split directories accumulate
/// whatever earlier runs left behind.
pub struct TrainingPipeline<'a, S: ObjectStore> {
    store: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, S: ObjectStore> TrainingPipeline<'a, S> {
    pub fn new(store: &'a S, config: &'a PipelineConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) -> anyhow::Result<RunRecord> {
        tracing::info!("pipeline stage 1/4: fetch");
        DatasetFetcher::new(self.store, self.config).fetch().await?;

        tracing::info!("pipeline stage 2/4: split");
        split::split_staged(self.config, None)?;

        tracing::info!("pipeline stage 3/4: train");
        Trainer::new(&self.config.train)
            .train(&self.config.manifest_path())
            .await?;

        tracing::info!("pipeline stage 4/4: record");
        let record = ExperimentRecorder::new(self.config).record().await?;

        Ok(record)
    }
}
