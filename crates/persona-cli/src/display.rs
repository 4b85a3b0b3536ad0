//! Plain-text cards for predictions, training runs and server health.
//!
//! Each `format_*` builds the card as a string so it can be tested;
//! `print_*` writes it to stdout.

use std::fmt::Write;

use persona_ai::TrainedArtifact;
use persona_core::{HealthResponse, PersonaResponse, PredictionMode};

const BAR_WIDTH: usize = 30;

// ── Public API ──

pub fn print_prediction(resp: &PersonaResponse, mode: PredictionMode) {
    print!("{}", format_prediction(resp, mode));
}

pub fn print_training_summary(artifact: &TrainedArtifact) {
    print!("{}", format_training_summary(artifact));
}

pub fn print_health(url: &str, health: &HealthResponse) {
    print!("{}", format_health(url, health));
}

// ── Card rendering ──

pub fn format_prediction(resp: &PersonaResponse, mode: PredictionMode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", resp.persona);
    let _ = writeln!(out, "{}", resp.description);
    let _ = writeln!(out);
    let _ = writeln!(out, "  {:<14} {:.2}%", "confidence", resp.confidence);
    let _ = writeln!(out, "  {:<14} {}", "", confidence_bar(resp.confidence));
    let _ = writeln!(out, "  {:<14} {}", "mode", mode.as_str());
    out
}

pub fn format_training_summary(artifact: &TrainedArtifact) -> String {
    let meta = &artifact.meta;
    let mut out = String::new();
    let _ = writeln!(out, "=== Trained classifier ===");
    let _ = writeln!(out, "  {:<14} {}", "examples", meta.examples);
    let _ = writeln!(out, "  {:<14} {}", "classes", artifact.encoder.len());
    let _ = writeln!(out, "  {:<14} {}", "embedder", meta.embedding_model);
    let _ = writeln!(out, "  {:<14} {}", "dimension", meta.dim);
    let _ = writeln!(
        out,
        "  {:<14} {}",
        "trained at",
        meta.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for class in artifact.encoder.classes() {
        let _ = writeln!(out, "    - {class}");
    }
    out
}

pub fn format_health(url: &str, health: &HealthResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {url} ===");
    let _ = writeln!(out, "  {:<14} {}", "status", health.status);
    let _ = writeln!(out, "  {:<14} {}s", "uptime", health.uptime_secs);
    let _ = writeln!(
        out,
        "  {:<14} {}",
        "zero-shot",
        if health.zero_shot { "yes" } else { "no" }
    );
    let _ = writeln!(out, "  {:<14} {}", "classes", health.classes.join(", "));
    out
}

/// `[#########.....]` scaled to a percentage in `[0, 100]`.
fn confidence_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}
