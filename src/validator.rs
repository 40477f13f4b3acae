//! Second-pass checks on detected puns and confidence scoring.
//!
//! Two independent checks are asked of the text generator for every pun:
//!
//! * **sense activation**: are both senses supported by the surrounding words?
//! * **substitution**: does the sentence stay coherent when the pun word is replaced by
//!   a paraphrase of either sense?
//!
//! Both run concurrently. A failed or missing generator never rejects a pun; it passes
//! the check with an explanation saying why.

use crate::llm::TextGenerator;
use crate::models::{FrameDistance, PunInstance, ValidationResult};
use crate::prompts;
use crate::response::{both_activated, extract_explanation, test_passed};
use crate::syntax::{self, SyntacticAnalyzer};
use log::{debug, error};
use std::sync::Arc;

const CHECK_MAX_TOKENS: u32 = 500;
const MAX_FRAME_BONUS: f64 = 0.2;
const FRAME_BONUS_PER_UNIT: f64 = 0.04;

pub struct PunValidator {
    generator: Option<Arc<dyn TextGenerator>>,
    analyzer: Option<Arc<dyn SyntacticAnalyzer>>,
    max_tokens: u32,
}

impl PunValidator {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        analyzer: Option<Arc<dyn SyntacticAnalyzer>>,
    ) -> Self {
        PunValidator {
            generator,
            analyzer,
            max_tokens: CHECK_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn analyzer_available(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Asks whether both senses are activated by the sentence context.
    pub async fn validate_sense_activation(
        &self,
        sentence: &str,
        word: &str,
        sense1: &str,
        sense2: &str,
    ) -> (bool, String) {
        let prompt = prompts::sense_activation(sentence, word, sense1, sense2);
        self.run_check(&prompt, both_activated).await
    }

    /// Asks whether the pun word can be replaced by either sense coherently.
    pub async fn validate_substitution(
        &self,
        sentence: &str,
        word: &str,
        sense1: &str,
        sense2: &str,
    ) -> (bool, String) {
        let prompt = prompts::substitution(sentence, word, sense1, sense2);
        self.run_check(&prompt, test_passed).await
    }

    async fn run_check(&self, prompt: &str, verdict: fn(&str) -> bool) -> (bool, String) {
        let Some(generator) = &self.generator else {
            return (true, "LLM validator not configured".to_string());
        };
        match generator.complete(None, prompt, self.max_tokens).await {
            Ok(text) => (verdict(&text), extract_explanation(&text)),
            Err(e) => {
                error!("LLM validation error: {}", e);
                (true, format!("Validation error: {}", e))
            }
        }
    }

    /// Context words for `word`; empty without an analyzer.
    pub fn context_words(&self, sentence: &str, word: &str) -> Vec<String> {
        match &self.analyzer {
            Some(analyzer) => syntax::context_words(analyzer.as_ref(), sentence, word),
            None => Vec::new(),
        }
    }

    pub fn check_grammatical_substitution(
        &self,
        sentence: &str,
        original: &str,
        substitute: &str,
    ) -> (bool, String) {
        match &self.analyzer {
            Some(analyzer) => {
                syntax::check_grammatical_substitution(analyzer.as_ref(), sentence, original, substitute)
            }
            None => (
                true,
                "Syntactic analyzer not available for grammatical check".to_string(),
            ),
        }
    }

    /// Analyzer similarity of two words, 0.0 without an analyzer.
    pub fn word_similarity(&self, a: &str, b: &str) -> f32 {
        self.analyzer
            .as_ref()
            .map_or(0.0, |analyzer| analyzer.similarity(a, b))
    }

    /// Runs both checks and attaches the outcome to `pun`.
    pub async fn validate_pun(&self, sentence: &str, pun: &mut PunInstance) {
        let word = pun.word_or_expression.as_str();
        let (sense1, sense2) = (pun.sense1.as_str(), pun.sense2.as_str());

        let ((dist_valid, dist_explanation), (sub_valid, sub_explanation)) = tokio::join!(
            self.validate_sense_activation(sentence, word, sense1, sense2),
            self.validate_substitution(sentence, word, sense1, sense2),
        );
        let context_words = self.context_words(sentence, word);

        let overall_confidence =
            score_confidence(dist_valid, sub_valid, pun.frame_distance.as_ref());
        debug!(
            "Validated '{}': activation={}, substitution={}, confidence={:.2}",
            word, dist_valid, sub_valid, overall_confidence
        );

        pun.attach_validation(
            ValidationResult {
                distributional_valid: dist_valid,
                distributional_explanation: dist_explanation,
                substitution_valid: sub_valid,
                substitution_explanation: sub_explanation,
                overall_confidence,
            },
            context_words,
        );
    }
}

/// 0.5 per passed check, plus up to 0.2 for a resolved frame distance when at least one
/// check passed. Capped at 1.0.
pub fn score_confidence(
    distributional_valid: bool,
    substitution_valid: bool,
    frame_distance: Option<&FrameDistance>,
) -> f64 {
    let mut confidence = 0.0;
    if distributional_valid {
        confidence += 0.5;
    }
    if substitution_valid {
        confidence += 0.5;
    }

    if confidence > 0.0 {
        if let Some(distance) = frame_distance.filter(|d| d.is_resolved()) {
            let bonus = (distance.distance * FRAME_BONUS_PER_UNIT).min(MAX_FRAME_BONUS);
            confidence += bonus;
        }
    }
    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::FnGenerator;
    use crate::models::{DistanceType, PunCandidate};
    use crate::syntax::testing::LexiconAnalyzer;

    fn distance(distance: f64, distance_type: DistanceType) -> FrameDistance {
        FrameDistance {
            sense1_frame: None,
            sense2_frame: None,
            distance,
            distance_type,
            explanation: String::new(),
        }
    }

    fn banker_pun() -> PunInstance {
        PunInstance::from_candidate(
            PunCandidate {
                word_or_expression: "interest".to_string(),
                pun_type: "HOMOGRAPHIC".to_string(),
                sense1: "money earned on deposits".to_string(),
                sense2: "curiosity".to_string(),
                ..Default::default()
            },
            Some(distance(3.0, DistanceType::Graph)),
        )
    }

    /// Answers each check according to its marker.
    fn answering(activated: &'static str, passed: &'static str) -> Arc<FnGenerator> {
        Arc::new(FnGenerator::new(move |_, prompt| {
            if prompt.contains("BOTH_ACTIVATED") {
                Ok(format!(
                    "SENSE1_CONTEXT: banker\nBOTH_ACTIVATED: {}\nEXPLANATION: activation checked",
                    activated
                ))
            } else {
                Ok(format!(
                    "SUBSTITUTION1_VALID: yes\nTEST_PASSED: {}\nEXPLANATION: substitution checked",
                    passed
                ))
            }
        }))
    }

    #[test]
    fn test_score_confidence() {
        let graph = distance(3.0, DistanceType::Graph);
        assert_eq!(score_confidence(true, true, None), 1.0);
        assert_eq!(score_confidence(true, true, Some(&graph)), 1.0);
        assert!((score_confidence(true, false, Some(&graph)) - 0.62).abs() < 1e-9);
        assert!((score_confidence(false, true, Some(&distance(10.0, DistanceType::Estimated))) - 0.7).abs() < 1e-9);
        assert_eq!(score_confidence(false, false, Some(&graph)), 0.0);
        assert_eq!(score_confidence(false, false, None), 0.0);

        // Unresolved distances never add a bonus.
        let insufficient = distance(0.0, DistanceType::InsufficientFrames);
        assert_eq!(score_confidence(true, false, Some(&insufficient)), 0.5);
        let unknown = distance(-1.0, DistanceType::Unknown);
        assert_eq!(score_confidence(true, false, Some(&unknown)), 0.5);
    }

    #[tokio::test]
    async fn test_validate_pun_attaches_result() {
        let generator = answering("YES", "no");
        let validator = PunValidator::new(Some(generator.clone()), None);
        let mut pun = banker_pun();

        validator.validate_pun("I used to be a banker but lost interest.", &mut pun).await;

        let validation = pun.validation.as_ref().expect("validation attached");
        assert!(validation.distributional_valid);
        assert_eq!(validation.distributional_explanation, "activation checked");
        assert!(!validation.substitution_valid);
        assert_eq!(validation.substitution_explanation, "substitution checked");
        assert!((pun.confidence - 0.62).abs() < 1e-9);
        assert_eq!(pun.confidence, validation.overall_confidence);
        assert!(pun.context_words.is_empty());
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_and_failing_generator_pass() {
        let validator = PunValidator::new(None, None);
        let (ok, explanation) = validator.validate_sense_activation("s", "w", "a", "b").await;
        assert!(ok);
        assert_eq!(explanation, "LLM validator not configured");

        let failing = PunValidator::new(Some(Arc::new(FnGenerator::failing("timeout"))), None);
        let (ok, explanation) = failing.validate_substitution("s", "w", "a", "b").await;
        assert!(ok);
        assert!(explanation.starts_with("Validation error: "));
        assert!(explanation.contains("timeout"));
    }

    #[tokio::test]
    async fn test_both_checks_failing_gives_zero() {
        let validator = PunValidator::new(Some(answering("no", "no")), None);
        let mut pun = banker_pun();
        validator.validate_pun("I used to be a banker but lost interest.", &mut pun).await;
        assert_eq!(pun.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_analyzer_enrichment() {
        let analyzer = Arc::new(LexiconAnalyzer::new(&[
            ("used", "VERB"),
            ("banker", "NOUN"),
            ("interest", "NOUN"),
            ("curiosity", "NOUN"),
        ]));
        let validator = PunValidator::new(Some(answering("yes", "yes")), Some(analyzer));
        assert!(validator.analyzer_available());

        let mut pun = banker_pun();
        validator.validate_pun("I used to be a banker but lost interest.", &mut pun).await;
        assert_eq!(pun.context_words, vec!["used", "banker"]);
        assert_eq!(pun.confidence, 1.0);

        assert_eq!(validator.word_similarity("bank", "BANK"), 1.0);
        assert!(validator.check_grammatical_substitution("lost interest", "interest", "curiosity").0);
    }

    #[test]
    fn test_without_analyzer() {
        let validator = PunValidator::new(None, None);
        assert!(validator.context_words("lost interest", "interest").is_empty());
        assert_eq!(validator.word_similarity("bank", "bank"), 0.0);
        assert_eq!(
            validator.check_grammatical_substitution("lost interest", "interest", "curiosity"),
            (
                true,
                "Syntactic analyzer not available for grammatical check".to_string()
            )
        );
    }
}
