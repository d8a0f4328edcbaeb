use crate::classifier::Classify;
use crate::prediction::Prediction;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    Rejected(JsonRejection),
    Inference(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Rejected(rejection) => {
                warn!(status = %rejection.status(), "rejected request: {}", rejection.body_text());
                (rejection.status(), rejection.body_text())
            }
            Self::Inference(detail) => {
                error!("inference failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Built once at startup and handed to every request.
pub struct AppState {
    classifier: Arc<dyn Classify>,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classify>) -> Arc<Self> {
        Arc::new(Self { classifier })
    }
}

pub fn router(state: Arc<AppState>, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([cors_origin]))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/api/predict", post(predict))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn predict(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(request) = request.map_err(ApiError::Rejected)?;
    let classifier = state.classifier.clone();
    let prediction = tokio::task::spawn_blocking(move || classifier.classify(&request.text))
        .await
        .map_err(|e| ApiError::Inference(e.to_string()))?
        .map_err(|e| ApiError::Inference(e.to_string()))?;
    Ok(Json(prediction))
}
