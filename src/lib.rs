//! Pun identification backed by a text generator and the FrameNet frame graph.
//!
//! ```
//! use punid::{EngineOptions, PieError, PunIdentificationEngine};
//!
//! let engine = PunIdentificationEngine::new(EngineOptions::default());
//! let result = tokio_test::block_on(engine.analyze("Time flies like an arrow."));
//! assert!(matches!(result, Err(PieError::NotConfigured)));
//! ```

// Declare modules
pub mod corpus;
pub mod data;
pub mod db;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod framenet;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod parse;
pub mod progress;
pub mod prompts;
pub mod response;
pub mod syntax;
pub mod validator;

// Re-export key types for easier use
pub use engine::{EngineOptions, EngineStatus, FrameStrategy, PunIdentificationEngine};
pub use error::{PieError, Result};
pub use estimator::FrameDistanceEstimator;
pub use framenet::{FrameNet, LoadOptions};
pub use knowledge::{FrameKnowledge, FrameService, Unavailable};
pub use llm::{AnthropicClient, TextGenerator, resolve_api_key};
pub use models::{
    DistanceType,
    FrameDescriptor,
    FrameDistance,
    FrameOrigin,
    PunAnalysisResult,
    PunCandidate,
    PunInstance,
    PunType,
    ValidationResult,
};
pub use syntax::{SyntacticAnalyzer, Token};
pub use validator::PunValidator;
