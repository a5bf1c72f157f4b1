use std::path::{Path, PathBuf};
use anyhow::Context;
use chrono::Utc;
use serde_json::{json, Value};
use crate::config::PipelineConfig;
use crate::data::TrainingMetrics;

/// Run output files logged to the tracker after every training invocation.
/// All of them must exist; a missing file fails the whole recording step.
pub const ARTIFACT_FILES: [&str; 16] = [
    "args.yaml",
    "confusion_matrix_normalized.png",
    "confusion_matrix.png",
    "F1_curve.png",
    "labels_correlogram.jpg",
    "labels.jpg",
    "P_curve.png",
    "PR_curve.png",
    "R_curve.png",
    "results.csv",
    "results.png",
    "train_batch0.jpg",
    "train_batch1.jpg",
    "train_batch2.jpg",
    "val_batch0_labels.jpg",
    "val_batch0_pred.jpg",
];

/// One closed training run as recorded in the tracking store.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub experiment_id: String,
    pub run_id: String,
    pub parameters: Vec<(String, String)>,
    pub metrics: TrainingMetrics,
    pub artifacts: Vec<PathBuf>,
}

/// Minimal MLflow REST client. Only the handful of endpoints the recorder
/// needs; artifact bytes go through the tracking server's proxied
/// `mlflow-artifacts` route.
pub struct MlflowClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlflowClient {
    pub fn new(uri: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: uri.trim_end_matches('/').to_string(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let response = self
            .http
            .post(self.api(path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("tracking server unreachable at {}", self.base_url))?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        anyhow::ensure!(status.is_success(), "mlflow {path} returned {status}: {payload}");
        Ok(payload)
    }

    /// Create-or-get semantics: an existing experiment with the same name is
    /// success, not failure.
    pub async fn create_or_get_experiment(
        &self,
        name: &str,
        artifact_location: &str,
    ) -> anyhow::Result<String> {
        let created = self
            .post(
                "experiments/create",
                json!({
                    "name": name,
                    "artifact_location": artifact_location,
                    "tags": [
                        {"key": "env", "value": "dev"},
                        {"key": "version", "value": "1.0.0"},
                    ],
                }),
            )
            .await;

        match created {
            Ok(payload) => payload["experiment_id"]
                .as_str()
                .map(str::to_string)
                .context("experiments/create response missing experiment_id"),
            Err(_) => {
                tracing::info!("Experiment {name} already exists.");
                let response = self
                    .http
                    .get(self.api("experiments/get-by-name"))
                    .query(&[("experiment_name", name)])
                    .send()
                    .await?
                    .error_for_status()
                    .with_context(|| format!("experiment {name} could not be looked up"))?;
                let payload: Value = response.json().await?;
                payload["experiment"]["experiment_id"]
                    .as_str()
                    .map(str::to_string)
                    .context("get-by-name response missing experiment_id")
            }
        }
    }

    pub async fn create_run(&self, experiment_id: &str, run_name: &str) -> anyhow::Result<String> {
        let payload = self
            .post(
                "runs/create",
                json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": Utc::now().timestamp_millis(),
                }),
            )
            .await?;
        payload["run"]["info"]["run_id"]
            .as_str()
            .map(str::to_string)
            .context("runs/create response missing run_id")
    }

    pub async fn log_batch(
        &self,
        run_id: &str,
        params: &[(String, String)],
        metrics: &[(&str, f64)],
    ) -> anyhow::Result<()> {
        let timestamp = Utc::now().timestamp_millis();
        let params: Vec<Value> = params
            .iter()
            .map(|(key, value)| json!({"key": key, "value": value}))
            .collect();
        let metrics: Vec<Value> = metrics
            .iter()
            .map(|(key, value)| {
                json!({"key": key, "value": value, "timestamp": timestamp, "step": 0})
            })
            .collect();
        self.post(
            "runs/log-batch",
            json!({"run_id": run_id, "params": params, "metrics": metrics}),
        )
        .await?;
        Ok(())
    }

    /// Uploads one local file under the run's artifact root, optionally below
    /// `artifact_path`.
    pub async fn log_artifact(
        &self,
        experiment_id: &str,
        run_id: &str,
        local_path: &Path,
        artifact_path: Option<&str>,
    ) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("missing artifact file {}", local_path.display()))?;
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("artifact has no file name: {}", local_path.display()))?;
        let relative = match artifact_path {
            Some(prefix) => format!("{prefix}/{file_name}"),
            None => file_name.to_string(),
        };

        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{experiment_id}/{run_id}/artifacts/{relative}",
            self.base_url
        );
        self.http
            .put(&url)
            .body(bytes)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("artifact upload failed for {relative}"))?;
        Ok(())
    }

    pub async fn terminate_run(&self, run_id: &str) -> anyhow::Result<()> {
        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": "FINISHED",
                "end_time": Utc::now().timestamp_millis(),
            }),
        )
        .await?;
        Ok(())
    }
}

/// Opens exactly one run per training invocation and logs the fixed
/// parameter set, the 13 metrics from the metrics log, and the fixed
/// artifact list plus the two weight files.
pub struct ExperimentRecorder<'a> {
    client: MlflowClient,
    config: &'a PipelineConfig,
}

impl<'a> ExperimentRecorder<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            client: MlflowClient::new(&config.tracking.uri),
            config,
        }
    }

    pub async fn record(&self) -> anyhow::Result<RunRecord> {
        let tracking = &self.config.tracking;
        let experiment_id = self
            .client
            .create_or_get_experiment(&tracking.experiment, &tracking.artifact_location)
            .await?;
        let run_id = self.client.create_run(&experiment_id, &tracking.run_name).await?;

        let parameters = vec![
            ("model".to_string(), self.config.train.model.clone()),
            ("epochs".to_string(), self.config.train.num_of_epochs.to_string()),
            ("image_size".to_string(), self.config.train.image_size.to_string()),
        ];
        let metrics =
            TrainingMetrics::from_results_csv(&self.config.train.results_path.join("results.csv"))?;
        self.client
            .log_batch(&run_id, &parameters, &metrics.entries())
            .await?;
        tracing::info!("Parameters and metrics logged.");

        let mut artifacts = Vec::new();
        for file_name in ARTIFACT_FILES {
            let path = tracking.artifact_path.join(file_name);
            self.client
                .log_artifact(&experiment_id, &run_id, &path, None)
                .await?;
            artifacts.push(path);
        }
        for weights in ["best.pt", "last.pt"] {
            let path = tracking.artifact_path.join("weights").join(weights);
            self.client
                .log_artifact(&experiment_id, &run_id, &path, Some("weights"))
                .await?;
            artifacts.push(path);
        }
        tracing::info!("Artifacts logged.");

        self.client.terminate_run(&run_id).await?;
        tracing::info!("run_id: {run_id}");

        Ok(RunRecord {
            experiment_id,
            run_id,
            parameters,
            metrics,
            artifacts,
        })
    }
}
