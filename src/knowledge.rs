//! Frame knowledge capability and the frame service used by the engine.
//!
//! Providers degrade instead of failing: an unavailable provider answers every lookup
//! with an empty result, and lookup errors are logged and absorbed.

use crate::framenet::FrameNet;
use crate::models::{DistanceType, FrameDescriptor, FrameDistance, UNRESOLVED_DISTANCE};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Source of lexical frames and frame-to-frame distances.
pub trait FrameKnowledge: Send + Sync {
    fn is_available(&self) -> bool;

    /// Frames evoked by `word`. `pos` restricts matches to lexical units `word.<pos>`.
    fn frames_for_word(&self, word: &str, pos: Option<&str>) -> Vec<FrameDescriptor>;

    fn frame_by_name(&self, name: &str) -> Option<FrameDescriptor>;

    /// `(distance, explanation)`; a negative distance means "could not compute".
    fn frame_distance(&self, frame1: &str, frame2: &str) -> (f64, String);
}

impl FrameKnowledge for FrameNet {
    fn is_available(&self) -> bool {
        true
    }

    fn frames_for_word(&self, word: &str, pos: Option<&str>) -> Vec<FrameDescriptor> {
        self.lookup_frames(word, pos).unwrap_or_else(|e| {
            error!("Error looking up frames for '{}': {}", word, e);
            Vec::new()
        })
    }

    fn frame_by_name(&self, name: &str) -> Option<FrameDescriptor> {
        self.get_frame(name).unwrap_or_else(|e| {
            error!("Error getting frame '{}': {}", name, e);
            None
        })
    }

    fn frame_distance(&self, frame1: &str, frame2: &str) -> (f64, String) {
        self.relation_distance(frame1, frame2).unwrap_or_else(|e| {
            error!("Error calculating frame distance: {}", e);
            (UNRESOLVED_DISTANCE, format!("Error: {}", e))
        })
    }
}

/// Provider used when no frame corpus could be loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

impl FrameKnowledge for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    fn frames_for_word(&self, _word: &str, _pos: Option<&str>) -> Vec<FrameDescriptor> {
        Vec::new()
    }

    fn frame_by_name(&self, _name: &str) -> Option<FrameDescriptor> {
        None
    }

    fn frame_distance(&self, _frame1: &str, _frame2: &str) -> (f64, String) {
        (UNRESOLVED_DISTANCE, "FrameNet not available".to_string())
    }
}

/// Frame provider plus the cache of frames described by the estimator.
pub struct FrameService {
    knowledge: Arc<dyn FrameKnowledge>,
    estimated: Mutex<HashMap<String, FrameDescriptor>>,
}

impl FrameService {
    pub fn new(knowledge: Arc<dyn FrameKnowledge>) -> Self {
        FrameService {
            knowledge,
            estimated: Mutex::new(HashMap::new()),
        }
    }

    /// Service without a frame corpus; every distance must be estimated.
    pub fn unavailable() -> Self {
        Self::new(Arc::new(Unavailable))
    }

    pub fn knowledge_available(&self) -> bool {
        self.knowledge.is_available()
    }

    pub fn frames_for_word(&self, word: &str, pos: Option<&str>) -> Vec<FrameDescriptor> {
        self.knowledge.frames_for_word(word, pos)
    }

    /// Looks a frame up in the provider, then among estimated frames.
    pub fn frame_by_name(&self, name: &str) -> Option<FrameDescriptor> {
        self.knowledge
            .frame_by_name(name)
            .or_else(|| self.estimated_frame(name))
    }

    pub fn estimated_frame(&self, name: &str) -> Option<FrameDescriptor> {
        match self.estimated.lock() {
            Ok(cache) => cache.get(name).cloned(),
            Err(_) => {
                warn!("Estimated frame cache poisoned; ignoring lookup of '{}'", name);
                None
            }
        }
    }

    /// Remembers an estimated frame, replacing any earlier description of the same name.
    pub fn cache_estimated_frame(&self, frame: FrameDescriptor) {
        if frame.name.is_empty() {
            return;
        }
        match self.estimated.lock() {
            Ok(mut cache) => {
                cache.insert(frame.name.clone(), frame);
            }
            Err(_) => warn!("Estimated frame cache poisoned; dropping '{}'", frame.name),
        }
    }

    /// Distance between two named frames using the provider's graph.
    ///
    /// When the provider cannot compute a distance the result is `unknown` with the
    /// unresolved sentinel, to be settled by the estimator.
    pub fn calculate_frame_distance(&self, frame1: &str, frame2: &str) -> FrameDistance {
        let sense1_frame = self.frame_by_name(frame1);
        let sense2_frame = self.frame_by_name(frame2);

        if frame1 == frame2 {
            let distance_type = if self.knowledge.is_available() {
                DistanceType::Graph
            } else {
                DistanceType::Estimated
            };
            return FrameDistance {
                sense1_frame,
                sense2_frame,
                distance: 0.0,
                distance_type,
                explanation: "Same frame".to_string(),
            };
        }

        let (distance, explanation) = self.knowledge.frame_distance(frame1, frame2);
        debug!(
            "Frame distance {} <-> {}: {} ({})",
            frame1, frame2, distance, explanation
        );
        if distance >= 0.0 {
            FrameDistance {
                sense1_frame,
                sense2_frame,
                distance,
                distance_type: DistanceType::Graph,
                explanation,
            }
        } else {
            FrameDistance::unresolved(sense1_frame, sense2_frame, explanation)
        }
    }
}
