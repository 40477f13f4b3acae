use crate::knowledge::FrameService;
use crate::llm::TextGenerator;
use crate::models::{DistanceType, FrameDescriptor, FrameDistance};
use crate::prompts;
use crate::response::{DEFAULT_ESTIMATED_DISTANCE, parse_distance_estimate};
use log::{debug, error};
use std::sync::Arc;

const ESTIMATE_MAX_TOKENS: u32 = 500;
const MAX_ESTIMATED_DISTANCE: f64 = 10.0;

/// Asks the text generator for a frame distance when the frame graph has none.
///
/// Estimated frame descriptions are remembered in the shared [`FrameService`].
pub struct FrameDistanceEstimator {
    generator: Option<Arc<dyn TextGenerator>>,
    frames: Arc<FrameService>,
    max_tokens: u32,
}

impl FrameDistanceEstimator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, frames: Arc<FrameService>) -> Self {
        FrameDistanceEstimator {
            generator,
            frames,
            max_tokens: ESTIMATE_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Never fails; problems yield a `default` distance of 5 explaining the cause.
    pub async fn estimate(
        &self,
        frame1: &str,
        frame2: &str,
        sense1: &str,
        sense2: &str,
    ) -> FrameDistance {
        let Some(generator) = &self.generator else {
            return default_distance("no text generator configured");
        };

        let prompt = prompts::distance_estimation(frame1, sense1, frame2, sense2);
        let text = match generator.complete(None, &prompt, self.max_tokens).await {
            Ok(text) => text,
            Err(e) => {
                error!("Frame distance estimation error: {}", e);
                return default_distance(&e.to_string());
            }
        };

        let estimate = parse_distance_estimate(&text);
        let distance = estimate.distance.clamp(0.0, MAX_ESTIMATED_DISTANCE);
        debug!("Estimated distance {} <-> {}: {}", frame1, frame2, distance);

        let sense1_frame = FrameDescriptor::estimated(frame1, estimate.frame1_definition);
        let sense2_frame = FrameDescriptor::estimated(frame2, estimate.frame2_definition);
        self.frames.cache_estimated_frame(sense1_frame.clone());
        self.frames.cache_estimated_frame(sense2_frame.clone());

        FrameDistance {
            sense1_frame: Some(sense1_frame),
            sense2_frame: Some(sense2_frame),
            distance,
            distance_type: DistanceType::Estimated,
            explanation: estimate.explanation,
        }
    }
}

fn default_distance(cause: &str) -> FrameDistance {
    FrameDistance {
        sense1_frame: None,
        sense2_frame: None,
        distance: DEFAULT_ESTIMATED_DISTANCE,
        distance_type: DistanceType::Default,
        explanation: format!("Could not estimate: {}", cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::FnGenerator;
    use crate::models::FrameOrigin;

    fn build(generator: Option<Arc<FnGenerator>>) -> (FrameDistanceEstimator, Arc<FrameService>) {
        let frames = Arc::new(FrameService::unavailable());
        let generator = generator.map(|g| g as Arc<dyn TextGenerator>);
        (FrameDistanceEstimator::new(generator, frames.clone()), frames)
    }

    #[tokio::test]
    async fn test_estimate_parses_and_caches() {
        let generator = Arc::new(FnGenerator::fixed(
            "DISTANCE: 6\nFRAME1_DEFINITION: Moving\nFRAME2_DEFINITION: Bugs\nEXPLANATION: unrelated",
        ));
        let (estimator, frames) = build(Some(generator.clone()));

        let distance = estimator.estimate("Motion", "Insects", "moves", "bugs").await;
        assert_eq!(distance.distance, 6.0);
        assert_eq!(distance.distance_type, DistanceType::Estimated);
        assert_eq!(distance.explanation, "unrelated");
        let sense1 = distance.sense1_frame.unwrap();
        assert_eq!(sense1.definition, "Moving");
        assert_eq!(sense1.origin, FrameOrigin::Estimated);

        assert_eq!(frames.frame_by_name("Insects").unwrap().definition, "Bugs");

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (system, user, max_tokens) = &calls[0];
        assert!(system.is_none());
        assert!(user.contains("Frame 1: Motion\nSense 1: moves"));
        assert_eq!(*max_tokens, ESTIMATE_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_estimate_clamps_and_defaults() {
        let generator = Arc::new(FnGenerator::fixed("DISTANCE: 42\nno other fields"));
        let (estimator, _) = build(Some(generator));
        let distance = estimator.estimate("A", "B", "", "").await;
        assert_eq!(distance.distance, 10.0);
        assert_eq!(distance.explanation, "");

        let generator = Arc::new(FnGenerator::fixed("I cannot say."));
        let (estimator, _) = build(Some(generator));
        let distance = estimator.estimate("A", "B", "", "").await;
        assert_eq!(distance.distance, DEFAULT_ESTIMATED_DISTANCE);
        assert_eq!(distance.distance_type, DistanceType::Estimated);
    }

    #[tokio::test]
    async fn test_estimate_failure_is_default() {
        let generator = Arc::new(FnGenerator::failing("rate limited"));
        let (estimator, frames) = build(Some(generator));
        let distance = estimator.estimate("Motion", "Insects", "", "").await;
        assert_eq!(distance.distance, 5.0);
        assert_eq!(distance.distance_type, DistanceType::Default);
        assert!(distance.sense1_frame.is_none());
        assert!(distance.explanation.starts_with("Could not estimate: "));
        assert!(distance.explanation.contains("rate limited"));
        assert!(frames.estimated_frame("Motion").is_none());

        let (estimator, _) = build(None);
        let distance = estimator.estimate("Motion", "Insects", "", "").await;
        assert_eq!(distance.distance_type, DistanceType::Default);
    }
}
