//! Core types shared by the persona classifier, server, client and CLI.

pub mod api;
pub mod example;
pub mod persona;

pub use api::{
    ErrorBody, HealthResponse, PersonaRequest, PersonaResponse, Prediction, PredictionMode,
    compose_text, to_percent,
};
pub use example::TrainingExample;
pub use persona::{Persona, UNKNOWN_DESCRIPTION, UnknownPersona, describe};
