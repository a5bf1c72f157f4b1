use std::sync::Arc;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use crate::config::PipelineConfig;
use crate::object_store::S3Store;
use crate::pipeline::TrainingPipeline;
use crate::predict::Predictor;
use crate::utils;

// Legacy response strings, preserved verbatim (including the double space)
// for existing clients.
const TRAIN_SUCCESS_RESPONSE: &str = "Training Successfull!!";
const KEY_ERROR_RESPONSE: &str = "Key value error incorrect key passed";
const VALUE_ERROR_RESPONSE: &str = "Value not found inside  json data";
const INVALID_INPUT_RESPONSE: &str = "Invalid input";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>OMR Shade Detection</title></head>
<body>
<h1>OMR Shade Detection</h1>
<p>POST a JSON body {"image": "<base64>"} to /predict, or GET /train to run the training pipeline.</p>
</body>
</html>
"#;

pub struct AppState {
    pub config: PipelineConfig,
    pub store: S3Store,
    /// The detector serves one request at a time; concurrent requests queue
    /// on this lock.
    pub predictor: Mutex<Predictor>,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/train", get(train_route))
        .route("/predict", post(predict_route))
        .with_state(state)
}

pub async fn serve(state: SharedState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn train_route(State(state): State<SharedState>) -> Response {
    let pipeline = TrainingPipeline::new(&state.store, &state.config);
    match pipeline.run().await {
        Ok(record) => {
            tracing::info!("training pipeline finished, run_id: {}", record.run_id);
            TRAIN_SUCCESS_RESPONSE.into_response()
        }
        Err(err) => {
            tracing::error!("training pipeline failed: {err:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Training failed").into_response()
        }
    }
}

async fn predict_route(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return VALUE_ERROR_RESPONSE.into_response();
    };

    let image_bytes = match extract_image(&payload) {
        Ok(bytes) => bytes,
        Err(PredictRequestError::MissingKey) => return KEY_ERROR_RESPONSE.into_response(),
        Err(PredictRequestError::Undecodable) => return VALUE_ERROR_RESPONSE.into_response(),
        Err(PredictRequestError::NotAString) => {
            return Json(json!(INVALID_INPUT_RESPONSE)).into_response()
        }
    };

    let mut predictor = state.predictor.lock().await;
    match predictor.predict(&image_bytes) {
        Ok(prediction) => {
            let encoded = utils::encode_image_base64(&prediction.image_jpeg);
            Json(json!({"image": encoded})).into_response()
        }
        Err(err) => {
            tracing::warn!("prediction failed: {err}");
            Json(json!(INVALID_INPUT_RESPONSE)).into_response()
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PredictRequestError {
    MissingKey,
    NotAString,
    Undecodable,
}

fn extract_image(payload: &Value) -> Result<Vec<u8>, PredictRequestError> {
    match payload.get("image") {
        None => Err(PredictRequestError::MissingKey),
        Some(Value::String(encoded)) => {
            utils::decode_image_base64(encoded).map_err(|_| PredictRequestError::Undecodable)
        }
        Some(_) => Err(PredictRequestError::NotAString),
    }
}
