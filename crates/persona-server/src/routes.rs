//! API routes: `POST /predict` and `GET /health`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use persona_ai::PredictError;
use persona_core::{ErrorBody, HealthResponse, PersonaRequest, PersonaResponse};
use tracing::{error, info, warn};

use crate::AppState;

type AppStateArc = Arc<AppState>;

/// Status code plus a message rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::ModeUnavailable(_) => {
                warn!(error = %err, "rejected prediction request");
                Self {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    detail: err.to_string(),
                }
            }
            other => {
                error!(error = %other, "prediction failed");
                Self::internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

// ============================================================================
// Prediction
// ============================================================================

pub fn predict_routes() -> Router<AppStateArc> {
    Router::new().route("/predict", post(predict))
}

async fn predict(
    State(state): State<AppStateArc>,
    Json(req): Json<PersonaRequest>,
) -> Result<Json<PersonaResponse>, ApiError> {
    info!(
        mode = req.mode.as_str(),
        posts = req.posts.len(),
        "received prediction request"
    );

    // Inference is CPU-bound; keep it off the async workers.
    let worker = Arc::clone(&state);
    let prediction = tokio::task::spawn_blocking(move || {
        let mut predictor = worker.predictor.blocking_lock();
        predictor.predict(&req.bio, &req.posts, req.mode)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "prediction task panicked");
        ApiError::internal(format!("prediction task failed: {e}"))
    })??;

    info!(
        persona = %prediction.label,
        confidence = prediction.confidence,
        "returning prediction"
    );
    Ok(Json(prediction.into()))
}

// ============================================================================
// Health
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let predictor = state.predictor.lock().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        zero_shot: predictor.has_zero_shot(),
        classes: predictor.classes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use persona_ai::{
        FitParams, LabelEncoder, LogisticRegression, ModelMeta, Predictor, TextEmbedder,
        TrainedArtifact, TrainingOptions, ZeroShotClassifier,
    };
    use persona_core::Persona;
    use tower::ServiceExt;

    /// Sorted like the label encoder: one keyword per class.
    const KEYWORDS: [&str; 4] = ["gym", "pasta", "laptop", "beach"];

    /// One-hot on the first keyword found; fails on "boom".
    struct OneHotEmbedder;

    impl TextEmbedder for OneHotEmbedder {
        fn model_name(&self) -> &str {
            "one-hot-test"
        }

        fn dim(&self) -> usize {
            KEYWORDS.len()
        }

        fn embed_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    anyhow::ensure!(!lower.contains("boom"), "embedding backend crashed");
                    Ok(KEYWORDS
                        .iter()
                        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                        .collect())
                })
                .collect()
        }
    }

    struct FixedZeroShot;

    impl ZeroShotClassifier for FixedZeroShot {
        fn classify(&mut self, _text: &str, labels: &[&str]) -> anyhow::Result<Vec<(String, f32)>> {
            Ok(vec![(labels[3].to_string(), 0.9), (labels[0].to_string(), 0.1)])
        }
    }

    fn artifact() -> TrainedArtifact {
        let encoder = LabelEncoder::fit(Persona::labels());
        let x: Vec<Vec<f32>> = (0..8)
            .map(|i| {
                let mut v = vec![0.0; 4];
                v[i % 4] = 1.0;
                v
            })
            .collect();
        let y: Vec<usize> = (0..8).map(|i| i % 4).collect();
        let classifier = LogisticRegression::fit(&x, &y, 4, &FitParams::default()).unwrap();
        TrainedArtifact {
            meta: ModelMeta {
                embedding_model: "one-hot-test".into(),
                dim: 4,
                examples: 8,
                trained_at: chrono::Utc::now(),
            },
            classifier,
            encoder,
        }
    }

    fn app(zero_shot: bool) -> Router {
        let zs: Option<Box<dyn ZeroShotClassifier>> = if zero_shot {
            Some(Box::new(FixedZeroShot))
        } else {
            None
        };
        let predictor = Predictor::from_parts(
            Box::new(OneHotEmbedder),
            zs,
            artifact(),
            TrainingOptions::default(),
        );
        router(Arc::new(AppState::new(predictor)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn predict_trained_model() {
        let resp = app(false)
            .oneshot(post_json(
                r#"{"bio": "Personal trainer", "posts": ["Leg day at the gym"]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["persona"], "Fitness Guru");
        assert_eq!(json["description"], Persona::FitnessGuru.description());
        let confidence = json["confidence"].as_f64().unwrap();
        assert!(confidence > 25.0 && confidence <= 100.0, "{confidence}");
    }

    #[tokio::test]
    async fn predict_zero_shot() {
        let resp = app(true)
            .oneshot(post_json(
                r#"{"bio": "Backpacker", "posts": ["Lisbon"], "mode": "zero_shot"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["persona"], "Travel Adventurer");
        assert_eq!(json["confidence"], 90.0);
    }

    #[tokio::test]
    async fn zero_shot_without_model_is_503() {
        let resp = app(false)
            .oneshot(post_json(r#"{"bio": "x", "posts": [], "mode": "zero_shot"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(resp).await;
        assert!(json["detail"].as_str().unwrap().contains("zero_shot"));
    }

    #[tokio::test]
    async fn inference_failure_is_500() {
        let resp = app(false)
            .oneshot(post_json(r#"{"bio": "boom", "posts": []}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(json["detail"].as_str().unwrap().contains("crashed"));
    }

    #[tokio::test]
    async fn unknown_mode_rejected() {
        let resp = app(false)
            .oneshot(post_json(r#"{"bio": "x", "posts": [], "mode": "ensemble"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_body_rejected() {
        let resp = app(false).oneshot(post_json("{not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_state() {
        let resp = app(true)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["zero_shot"], true);
        assert_eq!(json["classes"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn cors_mirrors_origin() {
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let resp = app(false).oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }
}
