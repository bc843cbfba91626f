use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Request, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::docs;
use crate::error::AppError;
use crate::model::{ModelError, Predictor};
use crate::types::{name_of, CropEncodingOut, MessageOut, PredictionOut, PredictionRequest};
use crate::validate::{validate_request, ValidationError};

pub const WELCOME: &str =
    "Welcome to the Hydroponic pH Prediction API! Go to /docs for API documentation.";

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub predictor: Predictor,
    pub log_predictions: bool,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            predictor,
            log_predictions: false,
        }
    }
}

// ---------- Handlers ----------

#[utoipa::path(get, path = "/", responses((status = 200, body = MessageOut)))]
pub async fn root() -> Json<MessageOut> {
    Json(MessageOut { message: WELCOME })
}

#[utoipa::path(get, path = "/crop-encoding", responses((status = 200, body = CropEncodingOut)))]
pub async fn crop_encoding() -> Json<CropEncodingOut> {
    Json(CropEncodingOut::new())
}

/// Decode and validate a raw body. Malformed JSON is a validation failure, not a 400.
fn parse_body(body: &[u8]) -> Result<PredictionRequest, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::body_missing());
    }
    let v: Value =
        serde_json::from_slice(body).map_err(|e| ValidationError::json_invalid(body, &e))?;
    validate_request(&v)
}

#[utoipa::path(
    post,
    path = "/predict",
    request_body = PredictionRequest,
    responses(
        (status = 200, body = PredictionOut),
        (status = 400, description = "Prediction failed", body = ErrorOut),
        (status = 422, description = "Validation error", body = ValidationErrorOut),
    )
)]
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionOut>, AppError> {
    let req = parse_body(&body)?;

    // Inference is CPU-bound; keep it off the reactor
    let predictor = state.predictor.clone();
    let job = req.clone();
    let y = tokio::task::spawn_blocking(move || predictor.predict(&job))
        .await
        .map_err(|e| ModelError::Inference(format!("inference task failed: {e}")))??;

    if state.log_predictions {
        tracing::info!(
            "predict crop={} ({}) x={:?} -> pH={:.3}",
            req.crop,
            name_of(req.crop).unwrap_or("?"),
            req.features().as_slice(),
            y
        );
    }

    Ok(Json(PredictionOut { predicted_ph: y }))
}

// ---------- Router ----------

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!("request", method = %req.method(), uri = %req.uri())
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                status = res.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "finished processing request"
            );
        });

    Router::new()
        .route("/", get(root))
        .route("/crop-encoding", get(crop_encoding))
        .route("/predict", post(predict))
        .merge(docs::routes())
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
