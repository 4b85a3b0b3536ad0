//! Request/response types for the `/predict` endpoint.

use serde::{Deserialize, Serialize};

/// Which classifier answers a prediction request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// Logistic regression over sentence embeddings, trained from the dataset.
    #[default]
    TrainedModel,
    /// NLI zero-shot classifier scoring the persona labels directly.
    ZeroShot,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrainedModel => "trained_model",
            Self::ZeroShot => "zero_shot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaRequest {
    pub bio: String,
    pub posts: Vec<String>,
    #[serde(default)]
    pub mode: PredictionMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaResponse {
    pub persona: String,
    /// Percentage in `[0, 100]`, rounded to two decimals.
    pub confidence: f64,
    pub description: String,
}

/// A predicted label with its confidence and canned description.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub description: &'static str,
}

impl From<Prediction> for PersonaResponse {
    fn from(p: Prediction) -> Self {
        Self {
            persona: p.label,
            confidence: p.confidence,
            description: p.description.to_string(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// Whether `zero_shot` mode can be served.
    pub zero_shot: bool,
    /// Labels the trained classifier can return.
    pub classes: Vec<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Join a bio and its posts into the single text fed to the classifiers.
pub fn compose_text(bio: &str, posts: &[String]) -> String {
    format!("{bio} {}", posts.join(". "))
}

/// Convert a probability to a percentage rounded to two decimals.
pub fn to_percent(p: f32) -> f64 {
    (f64::from(p) * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_trained_model() {
        let req: PersonaRequest =
            serde_json::from_str(r#"{"bio": "I code", "posts": ["Rust 2024 is out"]}"#).unwrap();
        assert_eq!(req.mode, PredictionMode::TrainedModel);
        assert_eq!(req.posts.len(), 1);
    }

    #[test]
    fn mode_parses_snake_case() {
        let req: PersonaRequest =
            serde_json::from_str(r#"{"bio": "", "posts": [], "mode": "zero_shot"}"#).unwrap();
        assert_eq!(req.mode, PredictionMode::ZeroShot);
    }

    #[test]
    fn unknown_mode_rejected() {
        let res: Result<PersonaRequest, _> =
            serde_json::from_str(r#"{"bio": "", "posts": [], "mode": "ensemble"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn missing_posts_rejected() {
        let res: Result<PersonaRequest, _> = serde_json::from_str(r#"{"bio": "hi"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn compose_text_joins_posts() {
        let posts = vec!["Built a robot".to_string(), "Learning Rust".to_string()];
        assert_eq!(
            compose_text("Engineer.", &posts),
            "Engineer. Built a robot. Learning Rust"
        );
    }

    #[test]
    fn compose_text_no_posts_keeps_trailing_space() {
        assert_eq!(compose_text("Chef", &[]), "Chef ");
    }

    #[test]
    fn to_percent_rounds_to_two_decimals() {
        assert_eq!(to_percent(0.87654), 87.65);
        assert_eq!(to_percent(1.0), 100.0);
        assert_eq!(to_percent(0.0), 0.0);
    }

    #[test]
    fn health_round_trips() {
        let json = r#"{"status":"ok","uptime_secs":3,"zero_shot":false,"classes":["Fitness Guru"]}"#;
        let health: HealthResponse = serde_json::from_str(json).unwrap();
        assert!(!health.zero_shot);
        assert_eq!(health.classes, ["Fitness Guru"]);
    }

    #[test]
    fn response_from_prediction() {
        let resp = PersonaResponse::from(Prediction {
            label: "Fitness Guru".into(),
            confidence: 91.5,
            description: "gym",
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["persona"], "Fitness Guru");
        assert_eq!(json["confidence"], 91.5);
        assert_eq!(json["description"], "gym");
    }
}
