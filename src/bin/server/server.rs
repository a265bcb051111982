//! HTTP server for CAPTCHA recognition.

use crate::config::ServerConfig;
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use captcha_ocr::core::{CaptchaError, IMG_HEIGHT, IMG_WIDTH, MAX_SEQUENCE_LENGTH};
use captcha_ocr::pipeline::{CaptchaEngine, Prediction};
use captcha_ocr::processors::decode_base64_image;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
struct AppState {
    engine: CaptchaEngine,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    model_loaded: bool,
    version: String,
}

/// Model description embedded in the info response.
#[derive(Serialize)]
struct ModelDescription {
    /// [height, width] of the model input.
    image_size: [u32; 2],
    max_sequence_length: usize,
    alphabet_size: usize,
}

/// Endpoint listing entry in the info response.
#[derive(Serialize)]
struct EndpointDescription {
    endpoint: &'static str,
    description: &'static str,
}

/// API metadata response.
#[derive(Serialize)]
struct InfoResponse {
    name: &'static str,
    version: &'static str,
    description: &'static str,
    model: ModelDescription,
    endpoints: Vec<EndpointDescription>,
}

/// JSON body for single-image prediction.
#[derive(Deserialize)]
struct PredictRequest {
    /// Base64-encoded image, with or without a `data:image/...;base64,` prefix.
    image: String,
}

/// Single-image prediction response.
#[derive(Serialize)]
struct PredictResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl PredictResponse {
    fn ok(prediction: Prediction) -> Self {
        Self {
            success: true,
            prediction: Some(prediction.text),
            confidence: Some(prediction.confidence),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            prediction: None,
            confidence: None,
            error: Some(message),
        }
    }
}

/// JSON body for batch prediction.
#[derive(Deserialize)]
struct PredictBatchRequest {
    /// Base64-encoded images.
    images: Vec<String>,
}

/// Per-item result in a batch prediction response.
#[derive(Serialize)]
struct BatchItemResponse {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    success: bool,
}

/// Batch prediction response.
#[derive(Serialize)]
struct PredictBatchResponse {
    success: bool,
    total: usize,
    results: Vec<BatchItemResponse>,
}

/// Run the HTTP server.
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing recognition engine...");
    let engine = config.engine.build_engine()?;
    info!(
        alphabet_size = engine.alphabet().len(),
        "Recognition engine initialized successfully"
    );

    let state = Arc::new(AppState { engine });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/predict", post(predict_handler))
        .route("/predict-batch", post(predict_batch_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health        - Health check");
    info!("  GET  /info          - API and model metadata");
    info!("  POST /predict       - Single-image prediction");
    info!("  POST /predict-batch - Batch prediction");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Health check endpoint.
///
/// The server only starts serving after the engine is built, so a reachable
/// endpoint implies a loaded model.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// API metadata endpoint.
async fn info_handler(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "CAPTCHA OCR API",
        version: env!("CARGO_PKG_VERSION"),
        description: "REST API for CAPTCHA text recognition",
        model: ModelDescription {
            image_size: [IMG_HEIGHT, IMG_WIDTH],
            max_sequence_length: MAX_SEQUENCE_LENGTH,
            alphabet_size: state.engine.alphabet().len(),
        },
        endpoints: vec![
            EndpointDescription {
                endpoint: "GET /health",
                description: "Health check",
            },
            EndpointDescription {
                endpoint: "GET /info",
                description: "API and model metadata",
            },
            EndpointDescription {
                endpoint: "POST /predict",
                description: "Single-image prediction (multipart 'image' field or JSON base64)",
            },
            EndpointDescription {
                endpoint: "POST /predict-batch",
                description: "Batch prediction over a JSON array of base64 images",
            },
        ],
    })
}

/// Single-image prediction endpoint.
///
/// Accepts either a multipart upload with an `image` field or a JSON body
/// `{"image": "<base64>"}` where the payload may carry a `data:` prefix.
async fn predict_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let start = Instant::now();

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let image_bytes = if content_type.starts_with("multipart/form-data") {
        match read_multipart_image(request).await {
            Ok(bytes) => bytes,
            Err(response) => return response,
        }
    } else {
        match Json::<PredictRequest>::from_request(request, &()).await {
            Ok(Json(body)) => match decode_base64_image(&body.image) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return error_response(StatusCode::BAD_REQUEST, e.to_string());
                }
            },
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid request body: {e}"),
                );
            }
        }
    };

    info!(request_id = %request_id, bytes = image_bytes.len(), "Processing prediction request");

    match state.engine.recognize(&image_bytes) {
        Ok(prediction) => {
            info!(
                request_id = %request_id,
                prediction = %prediction.text,
                confidence = prediction.confidence,
                total_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Prediction completed"
            );
            (StatusCode::OK, Json(PredictResponse::ok(prediction))).into_response()
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Prediction failed");
            error_response(status_for(&e), e.to_string())
        }
    }
}

/// Batch prediction endpoint.
///
/// Each element is decoded and recognized independently; a failure on one
/// element never aborts the batch.
async fn predict_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictBatchRequest>,
) -> impl IntoResponse {
    let start = Instant::now();
    let total = request.images.len();

    let mut results = Vec::with_capacity(total);
    for (index, payload) in request.images.iter().enumerate() {
        let outcome =
            decode_base64_image(payload).and_then(|bytes| state.engine.recognize(&bytes));
        match outcome {
            Ok(prediction) => results.push(BatchItemResponse {
                index,
                prediction: Some(prediction.text),
                confidence: Some(prediction.confidence),
                error: None,
                success: true,
            }),
            Err(e) => results.push(BatchItemResponse {
                index,
                prediction: None,
                confidence: None,
                error: Some(e.to_string()),
                success: false,
            }),
        }
    }

    info!(
        total,
        total_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Batch prediction completed"
    );

    Json(PredictBatchResponse {
        success: true,
        total,
        results,
    })
}

/// Extracts the `image` field from a multipart upload.
async fn read_multipart_image(request: Request) -> Result<Vec<u8>, Response> {
    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid multipart body: {e}"),
        )
    })?;

    loop {
        let field = multipart.next_field().await.map_err(|e| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("failed to read multipart field: {e}"),
            )
        })?;
        let Some(field) = field else {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "no image provided".to_string(),
            ));
        };
        if field.name() == Some("image") {
            let data = field.bytes().await.map_err(|e| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed to read image field: {e}"),
                )
            })?;
            return Ok(data.to_vec());
        }
    }
}

/// Maps a pipeline error to the HTTP status it should surface as.
fn status_for(error: &CaptchaError) -> StatusCode {
    match error {
        CaptchaError::ImageDecode { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(PredictResponse::error(message))).into_response()
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
