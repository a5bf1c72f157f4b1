use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use omr_pipeline::config::PipelineConfig;
use omr_pipeline::object_store::S3Store;
use omr_pipeline::predict::Predictor;
use omr_pipeline::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = PipelineConfig::from_file(Path::new(&config_path))?;

    let model_details = config.model.to_model_config()?;
    tracing::info!("{}", model_details.summary());

    let predictor = Predictor::new(&model_details)?;
    let store = S3Store::new(&config.store);

    let state = Arc::new(AppState {
        config,
        store,
        predictor: Mutex::new(predictor),
    });
    server::serve(state).await
}
