//! The pun analysis pipeline.
//!
//! One call to [`PunIdentificationEngine::analyze`]:
//!
//! 1. asks the text generator for a JSON analysis of the sentence,
//! 2. parses it tolerantly into pun candidates,
//! 3. measures the frame distance between each candidate's two senses, falling back to an
//!    estimate when the frame graph has no answer,
//! 4. optionally validates every candidate and scores its confidence.
//!
//! Only a missing generator or a failed analysis request are errors; everything after
//! that degrades into explanations and defaults.

use crate::error::{PieError, Result};
use crate::estimator::FrameDistanceEstimator;
use crate::knowledge::{FrameKnowledge, FrameService};
use crate::llm::{AnthropicClient, DEFAULT_MODEL, TextGenerator};
use crate::models::{
    DistanceType, FrameDistance, PunAnalysisResult, PunCandidate, PunInstance,
};
use crate::prompts;
use crate::response::parse_analysis;
use crate::syntax::SyntacticAnalyzer;
use crate::validator::PunValidator;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Frame name used when the analyzer names no frame for a sense.
const UNKNOWN_FRAME: &str = "Unknown";

/// How the two frames of a pun are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStrategy {
    /// Frames named by the analyzer for each sense.
    #[default]
    SenseFrames,
    /// The first two distinct frames evoked by the pun word. Frames are not aligned
    /// with the senses.
    WordLookup,
}

impl FromStr for FrameStrategy {
    type Err = PieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "sense-frames" => Ok(FrameStrategy::SenseFrames),
            "word-lookup" => Ok(FrameStrategy::WordLookup),
            other => Err(PieError::InvalidArgument(format!(
                "unknown frame strategy '{}' (expected sense-frames or word-lookup)",
                other
            ))),
        }
    }
}

impl fmt::Display for FrameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameStrategy::SenseFrames => "sense-frames",
            FrameStrategy::WordLookup => "word-lookup",
        })
    }
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Model for [`PunIdentificationEngine::configure`]; `ANTHROPIC_MODEL` or the default
    /// model when `None`.
    pub model: Option<String>,
    /// Run the validation pass on every detected pun.
    pub validate: bool,
    pub analysis_max_tokens: u32,
    /// Token budget of each estimation and validation request.
    pub check_max_tokens: u32,
    pub frame_strategy: FrameStrategy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            model: None,
            validate: true,
            analysis_max_tokens: 2000,
            check_max_tokens: 500,
            frame_strategy: FrameStrategy::default(),
        }
    }
}

/// Capability summary reported by [`PunIdentificationEngine::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub configured: bool,
    pub model: String,
    pub validation_enabled: bool,
    pub frame_strategy: FrameStrategy,
    pub knowledge_provider_available: bool,
    pub syntactic_analyzer_available: bool,
}

pub struct PunIdentificationEngine {
    options: EngineOptions,
    generator: Option<Arc<dyn TextGenerator>>,
    frames: Arc<FrameService>,
    analyzer: Option<Arc<dyn SyntacticAnalyzer>>,
}

impl PunIdentificationEngine {
    /// Creates an unconfigured engine without a frame corpus.
    pub fn new(options: EngineOptions) -> Self {
        PunIdentificationEngine {
            options,
            generator: None,
            frames: Arc::new(FrameService::unavailable()),
            analyzer: None,
        }
    }

    /// Sets or replaces the API credential used for every text generation request.
    pub fn configure(&mut self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(PieError::InvalidArgument("empty API key".to_string()));
        }
        let client = AnthropicClient::new(api_key.to_string(), self.options.model.as_deref());
        info!("Engine configured with model {}", client.model_name());
        self.generator = Some(Arc::new(client));
        Ok(())
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn FrameKnowledge>) -> Self {
        self.frames = Arc::new(FrameService::new(knowledge));
        self
    }

    pub fn with_syntactic_analyzer(mut self, analyzer: Arc<dyn SyntacticAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn frame_service(&self) -> &Arc<FrameService> {
        &self.frames
    }

    pub fn status(&self) -> EngineStatus {
        let model = match &self.generator {
            Some(generator) => generator.model_name().to_string(),
            None => self
                .options
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };
        EngineStatus {
            configured: self.is_configured(),
            model,
            validation_enabled: self.options.validate,
            frame_strategy: self.options.frame_strategy,
            knowledge_provider_available: self.frames.knowledge_available(),
            syntactic_analyzer_available: self.analyzer.is_some(),
        }
    }

    /// Analyzes one sentence for puns.
    ///
    /// Fails with [`PieError::NotConfigured`] before doing any work when no generator
    /// is set, and with [`PieError::Transport`] when the analysis request fails.
    pub async fn analyze(&self, sentence: &str) -> Result<PunAnalysisResult> {
        let generator = self.generator.as_ref().ok_or(PieError::NotConfigured)?;

        let system = prompts::analysis_system_prompt();
        let user = prompts::analysis_user_message(sentence);
        let raw = generator
            .complete(Some(system.as_str()), &user, self.options.analysis_max_tokens)
            .await
            .map_err(|e| match e {
                PieError::Transport(message) => PieError::Transport(message),
                other => PieError::Transport(other.to_string()),
            })?;

        let parsed = parse_analysis(&raw);
        debug!(
            "Analysis of {:?}: {} candidate(s), parsed={}",
            sentence,
            parsed.candidates.len(),
            parsed.parsed
        );

        let estimator = FrameDistanceEstimator::new(Some(generator.clone()), self.frames.clone())
            .with_max_tokens(self.options.check_max_tokens);
        let mut puns = Vec::with_capacity(parsed.candidates.len());
        for candidate in parsed.candidates {
            let frame_distance = self.frame_distance_for(&candidate, &estimator).await;
            let pun = PunInstance::from_candidate(candidate, Some(frame_distance));
            if pun.pun_type_enum.is_none() {
                warn!("Unknown pun type: {}", pun.pun_type);
            }
            puns.push(pun);
        }

        if self.options.validate {
            let validator = PunValidator::new(Some(generator.clone()), self.analyzer.clone())
                .with_max_tokens(self.options.check_max_tokens);
            for pun in &mut puns {
                validator.validate_pun(sentence, pun).await;
            }
        }

        Ok(PunAnalysisResult::new(
            sentence,
            puns,
            parsed.analysis_notes,
            raw,
        ))
    }

    /// Analyzes sentences in order. The first failure aborts the batch.
    pub async fn analyze_batch(&self, sentences: &[String]) -> Result<Vec<PunAnalysisResult>> {
        let mut results = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            results.push(self.analyze(sentence).await?);
        }
        Ok(results)
    }

    async fn frame_distance_for(
        &self,
        candidate: &PunCandidate,
        estimator: &FrameDistanceEstimator,
    ) -> FrameDistance {
        match self.options.frame_strategy {
            FrameStrategy::SenseFrames => {
                let frame1 = frame_name_or_unknown(candidate.sense1_frame.as_deref());
                let frame2 = frame_name_or_unknown(candidate.sense2_frame.as_deref());
                self.resolve_distance(frame1, frame2, candidate, estimator).await
            }
            FrameStrategy::WordLookup => {
                let word = candidate.word_or_expression.trim();
                let mut names: Vec<String> = Vec::new();
                for frame in self.frames.frames_for_word(word, None) {
                    if !names.contains(&frame.name) {
                        names.push(frame.name);
                    }
                }
                match names.as_slice() {
                    [] => FrameDistance {
                        sense1_frame: None,
                        sense2_frame: None,
                        distance: 0.0,
                        distance_type: DistanceType::NoFrames,
                        explanation: format!("No frames found for '{}'", word),
                    },
                    [only] => FrameDistance {
                        sense1_frame: self.frames.frame_by_name(only),
                        sense2_frame: None,
                        distance: 0.0,
                        distance_type: DistanceType::InsufficientFrames,
                        explanation: format!("Only one frame found for '{}': {}", word, only),
                    },
                    [first, second, ..] => {
                        self.resolve_distance(first, second, candidate, estimator).await
                    }
                }
            }
        }
    }

    /// Graph distance, or an estimate when the graph cannot tell.
    async fn resolve_distance(
        &self,
        frame1: &str,
        frame2: &str,
        candidate: &PunCandidate,
        estimator: &FrameDistanceEstimator,
    ) -> FrameDistance {
        let distance = self.frames.calculate_frame_distance(frame1, frame2);
        if distance.distance >= 0.0 {
            return distance;
        }
        debug!(
            "No graph distance for {} / {} ({}); estimating",
            frame1, frame2, distance.explanation
        );
        estimator
            .estimate(frame1, frame2, &candidate.sense1, &candidate.sense2)
            .await
    }
}

fn frame_name_or_unknown(name: Option<&str>) -> &str {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_FRAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framenet::tests::fixture_framenet;
    use crate::llm::testing::FnGenerator;
    use crate::models::{FrameOrigin, PunType, UNRESOLVED_DISTANCE};
    use crate::response::PARSE_FAILURE_NOTE;

    const FLIES: &str = "Time flies like an arrow; fruit flies like a banana.";

    fn analysis_json(word: &str, pun_type: &str, frame1: &str, frame2: &str) -> String {
        serde_json::json!({
            "has_pun": 1,
            "puns": [{
                "word_or_expression": word,
                "pun_type": pun_type,
                "sense1": "moves through the air",
                "sense2": "small winged insects",
                "sense1_frame": frame1,
                "sense2_frame": frame2,
                "explanation": "garden path"
            }],
            "analysis_notes": "classic"
        })
        .to_string()
    }

    /// Routes each request by its reply format.
    fn scripted(analysis: String) -> Arc<FnGenerator> {
        Arc::new(FnGenerator::new(move |system, prompt| {
            Ok(if system.is_some() {
                analysis.clone()
            } else if prompt.contains("DISTANCE:") {
                "DISTANCE: 7\nFRAME1_DEFINITION: Moving\nFRAME2_DEFINITION: Insects\nEXPLANATION: different domains".to_string()
            } else if prompt.contains("BOTH_ACTIVATED") {
                "BOTH_ACTIVATED: yes\nEXPLANATION: both senses fit".to_string()
            } else {
                "TEST_PASSED: yes\nEXPLANATION: both readings parse".to_string()
            })
        }))
    }

    fn engine_with(generator: Arc<FnGenerator>, options: EngineOptions) -> PunIdentificationEngine {
        PunIdentificationEngine::new(options).with_generator(generator)
    }

    fn no_validation() -> EngineOptions {
        EngineOptions {
            validate: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_homographic_pun_without_frame_graph() {
        let _ = env_logger::builder().is_test(true).try_init();
        let generator = scripted(analysis_json("flies", "HOMOGRAPHIC", "Motion", "Animals"));
        let engine = engine_with(generator.clone(), EngineOptions::default());

        let result = engine.analyze(FLIES).await.unwrap();
        assert_eq!(result.sentence, FLIES);
        assert_eq!(result.has_pun, 1);
        assert_eq!(result.analysis_notes, "classic");
        assert_eq!(result.puns.len(), 1);

        let pun = &result.puns[0];
        assert_eq!(pun.word_or_expression, "flies");
        assert_eq!(pun.pun_type_enum, Some(PunType::Homographic));
        let distance = pun.frame_distance.as_ref().unwrap();
        assert_eq!(distance.distance_type, DistanceType::Estimated);
        assert_eq!(distance.distance, 7.0);
        assert_eq!(
            distance.sense1_frame.as_ref().unwrap().origin,
            FrameOrigin::Estimated
        );
        assert!(pun.validation.as_ref().unwrap().distributional_valid);
        assert!((0.0..=1.0).contains(&pun.confidence));
        assert_eq!(pun.confidence, 1.0);

        // analysis + estimate + two checks
        assert_eq!(generator.call_count(), 4);
        let calls = generator.calls.lock().unwrap();
        let (system, user, max_tokens) = &calls[0];
        assert!(system.as_deref().unwrap().contains("HOMOGRAPHIC"));
        assert_eq!(user, &format!("Analyze this sentence for puns:\n\n\"{}\"", FLIES));
        assert_eq!(*max_tokens, 2000);
        assert!(calls[1..].iter().all(|(_, _, tokens)| *tokens == 500));
    }

    #[tokio::test]
    async fn test_malformed_response_is_not_an_error() {
        let generator = Arc::new(FnGenerator::fixed("Sorry, I can't produce JSON today."));
        let engine = engine_with(generator.clone(), EngineOptions::default());

        let result = engine.analyze("Just a sentence.").await.unwrap();
        assert_eq!(result.has_pun, 0);
        assert!(result.puns.is_empty());
        assert_eq!(result.analysis_notes, PARSE_FAILURE_NOTE);
        assert_eq!(result.raw_llm_response, "Sorry, I can't produce JSON today.");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_engine_rejects() {
        let engine = PunIdentificationEngine::new(EngineOptions::default());
        assert!(!engine.is_configured());
        assert!(matches!(
            engine.analyze(FLIES).await,
            Err(PieError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let engine = engine_with(Arc::new(FnGenerator::failing("503")), EngineOptions::default());
        match engine.analyze(FLIES).await {
            Err(PieError::Transport(message)) => assert_eq!(message, "503"),
            other => panic!("expected transport error, got {:?}", other.map(|r| r.has_pun)),
        }
    }

    #[tokio::test]
    async fn test_graph_distance_skips_estimate() {
        let generator = scripted(analysis_json("flies", "HOMOGRAPHIC", "Motion", "Self_motion"));
        let engine = engine_with(generator.clone(), no_validation())
            .with_knowledge(Arc::new(fixture_framenet()));

        let result = engine.analyze(FLIES).await.unwrap();
        let distance = result.puns[0].frame_distance.as_ref().unwrap();
        assert_eq!(distance.distance_type, DistanceType::Graph);
        assert_eq!(distance.distance, 1.0);
        assert_eq!(distance.sense2_frame.as_ref().unwrap().core_elements, vec!["Self_mover"]);
        assert!(result.puns[0].validation.is_none());
        assert_eq!(result.puns[0].confidence, 0.0);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_frame_is_estimated_never_sentinel() {
        let generator = scripted(analysis_json("flies", "HOMOGRAPHIC", "Motion", "Insects"));
        let engine = engine_with(generator, no_validation()).with_knowledge(Arc::new(fixture_framenet()));

        let result = engine.analyze(FLIES).await.unwrap();
        let distance = result.puns[0].frame_distance.as_ref().unwrap();
        assert_eq!(distance.distance_type, DistanceType::Estimated);
        assert_ne!(distance.distance, UNRESOLVED_DISTANCE);
        // Estimated frames become visible to later lookups.
        assert!(engine.frame_service().frame_by_name("Insects").is_some());
    }

    #[tokio::test]
    async fn test_word_lookup_strategy() {
        let options = EngineOptions {
            validate: false,
            frame_strategy: FrameStrategy::WordLookup,
            ..Default::default()
        };
        let cases = [
            ("fly", DistanceType::Graph, 1.0),
            ("walk", DistanceType::InsufficientFrames, 0.0),
            ("banana", DistanceType::NoFrames, 0.0),
        ];
        for (word, expected_type, expected_distance) in cases {
            let generator = scripted(analysis_json(word, "HOMOGRAPHIC", "", ""));
            let engine = engine_with(generator, options.clone())
                .with_knowledge(Arc::new(fixture_framenet()));
            let result = engine.analyze(FLIES).await.unwrap();
            let distance = result.puns[0].frame_distance.as_ref().unwrap();
            assert_eq!(distance.distance_type, expected_type, "word {}", word);
            assert_eq!(distance.distance, expected_distance, "word {}", word);
        }
    }

    #[tokio::test]
    async fn test_unmapped_pun_type_is_kept() {
        let generator = scripted(analysis_json("flies", "Paronomasia", "Motion", "Motion"));
        let engine = engine_with(generator, no_validation());

        let result = engine.analyze(FLIES).await.unwrap();
        let pun = &result.puns[0];
        assert_eq!(pun.pun_type, "Paronomasia");
        assert_eq!(pun.pun_type_enum, None);
        let distance = pun.frame_distance.as_ref().unwrap();
        assert_eq!(distance.distance, 0.0);
        assert_eq!(distance.explanation, "Same frame");
        // No frame graph behind the engine, so the zero distance is not graph-sourced.
        assert_eq!(distance.distance_type, DistanceType::Estimated);
    }

    #[tokio::test]
    async fn test_analyze_batch() {
        let generator = scripted(analysis_json("flies", "HOMOGRAPHIC", "Motion", "Animals"));
        let engine = engine_with(generator, no_validation());
        let sentences = vec![FLIES.to_string(), "Another one.".to_string()];

        let results = engine.analyze_batch(&sentences).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].sentence, "Another one.");

        let failing = PunIdentificationEngine::new(EngineOptions::default())
            .with_generator(Arc::new(FnGenerator::failing("down")));
        assert!(failing.analyze_batch(&sentences).await.is_err());
        assert!(engine.analyze_batch(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_status_and_configure() {
        let mut engine = PunIdentificationEngine::new(EngineOptions {
            model: Some("claude-test".to_string()),
            ..Default::default()
        });
        let status = engine.status();
        assert!(!status.configured);
        assert_eq!(status.model, "claude-test");
        assert!(status.validation_enabled);
        assert!(!status.knowledge_provider_available);
        assert!(!status.syntactic_analyzer_available);

        assert!(matches!(engine.configure("   "), Err(PieError::InvalidArgument(_))));
        engine.configure("sk-test").unwrap();
        assert!(engine.is_configured());
        assert_eq!(engine.status().model, "claude-test");
    }

    #[test]
    fn test_frame_strategy_parsing() {
        assert_eq!("word-lookup".parse::<FrameStrategy>().unwrap(), FrameStrategy::WordLookup);
        assert_eq!("SENSE_FRAMES".parse::<FrameStrategy>().unwrap(), FrameStrategy::SenseFrames);
        assert!("nearest".parse::<FrameStrategy>().is_err());
        assert_eq!(FrameStrategy::WordLookup.to_string(), "word-lookup");
    }
}
