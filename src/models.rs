use serde::{Deserialize, Serialize};
use std::fmt;

// --- Pun taxonomy ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunType {
    Homophonic,   // Similar-sounding words
    Homographic,  // Same spelling, different meanings
    Recursive,    // Self-referential / term-dependent
    Antanaclasis, // Same word repeated with different senses
}

impl PunType {
    pub const ALL: [PunType; 4] = [
        PunType::Homophonic,
        PunType::Homographic,
        PunType::Recursive,
        PunType::Antanaclasis,
    ];

    /// Matches a label against the known categories, ignoring case and surrounding
    /// whitespace.
    pub fn from_label(label: &str) -> Option<PunType> {
        let label = label.trim();
        PunType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(label))
    }

    /// Upper-case label used in prompts and LLM responses.
    pub fn label(self) -> &'static str {
        match self {
            PunType::Homophonic => "HOMOPHONIC",
            PunType::Homographic => "HOMOGRAPHIC",
            PunType::Recursive => "RECURSIVE",
            PunType::Antanaclasis => "ANTANACLASIS",
        }
    }

    /// One-line definition with an example.
    pub fn description(self) -> &'static str {
        match self {
            PunType::Homophonic => r#"Similar-sounding words (e.g., "prophet" / "profit")"#,
            PunType::Homographic => {
                r#"Same spelling, different meanings (e.g., "foot" as body part / unit of measurement)"#
            }
            PunType::Recursive => {
                r#"Self-referential or term-dependent (e.g., "Immanuel doesn't pun, he Kant")"#
            }
            PunType::Antanaclasis => {
                r#"Same word repeated with different senses (e.g., "hang together" / "hang separately")"#
            }
        }
    }
}

impl fmt::Display for PunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PunType::Homophonic => "homophonic",
            PunType::Homographic => "homographic",
            PunType::Recursive => "recursive",
            PunType::Antanaclasis => "antanaclasis",
        })
    }
}

// --- Raw candidate (as decoded from the analysis response) ---

/// A pun as declared by the analyzer. Fields absent from the response decode to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunCandidate {
    pub word_or_expression: String,
    /// Label exactly as the analyzer wrote it, even when it matches no known category.
    pub pun_type: String,
    pub sense1: String,
    pub sense2: String,
    pub sense1_frame: Option<String>,
    pub sense2_frame: Option<String>,
    pub explanation: String,
}

// --- Frames ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOrigin {
    Graph,     // Looked up in the frame graph
    Estimated, // Described by the text generator
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub name: String,
    pub definition: String,
    /// `word.pos` when found through a word lookup, empty otherwise.
    #[serde(default)]
    pub lexical_unit: String,
    #[serde(default)]
    pub core_elements: Vec<String>,
    pub origin: FrameOrigin,
}

impl FrameDescriptor {
    pub fn estimated(name: impl Into<String>, definition: impl Into<String>) -> Self {
        FrameDescriptor {
            name: name.into(),
            definition: definition.into(),
            lexical_unit: String::new(),
            core_elements: Vec::new(),
            origin: FrameOrigin::Estimated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceType {
    Graph,
    Estimated,
    Unknown,
    NoFrames,
    InsufficientFrames,
    Default,
}

impl DistanceType {
    /// Types that mark a distance as not computed.
    pub fn is_unresolved(self) -> bool {
        matches!(
            self,
            DistanceType::Unknown | DistanceType::NoFrames | DistanceType::InsufficientFrames
        )
    }
}

impl fmt::Display for DistanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DistanceType::Graph => "graph",
            DistanceType::Estimated => "estimated",
            DistanceType::Unknown => "unknown",
            DistanceType::NoFrames => "no_frames",
            DistanceType::InsufficientFrames => "insufficient_frames",
            DistanceType::Default => "default",
        })
    }
}

/// Sentinel distance for "could not be computed". Never attached to a final result.
pub const UNRESOLVED_DISTANCE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDistance {
    pub sense1_frame: Option<FrameDescriptor>,
    pub sense2_frame: Option<FrameDescriptor>,
    /// 0 = same frame, higher = more distant.
    pub distance: f64,
    pub distance_type: DistanceType,
    pub explanation: String,
}

impl FrameDistance {
    pub fn unresolved(
        sense1_frame: Option<FrameDescriptor>,
        sense2_frame: Option<FrameDescriptor>,
        explanation: impl Into<String>,
    ) -> Self {
        FrameDistance {
            sense1_frame,
            sense2_frame,
            distance: UNRESOLVED_DISTANCE,
            distance_type: DistanceType::Unknown,
            explanation: explanation.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.distance >= 0.0 && !self.distance_type.is_unresolved()
    }
}

// --- Validation ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub distributional_valid: bool,
    pub distributional_explanation: String,
    pub substitution_valid: bool,
    pub substitution_explanation: String,
    /// In `[0.0, 1.0]`.
    pub overall_confidence: f64,
}

// --- Results ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunInstance {
    pub word_or_expression: String,
    /// Raw label from the analyzer.
    pub pun_type: String,
    /// Matched category, `None` when the label is not one of the known four.
    pub pun_type_enum: Option<PunType>,
    pub sense1: String,
    pub sense2: String,
    pub frame_distance: Option<FrameDistance>,
    pub explanation: String,
    #[serde(default)]
    pub context_words: Vec<String>,
    pub validation: Option<ValidationResult>,
    pub confidence: f64,
}

impl PunInstance {
    /// Builds an unvalidated instance from a decoded candidate.
    pub fn from_candidate(candidate: PunCandidate, frame_distance: Option<FrameDistance>) -> Self {
        let pun_type_enum = PunType::from_label(&candidate.pun_type);
        PunInstance {
            word_or_expression: candidate.word_or_expression,
            pun_type: candidate.pun_type,
            pun_type_enum,
            sense1: candidate.sense1,
            sense2: candidate.sense2,
            frame_distance,
            explanation: candidate.explanation,
            context_words: Vec::new(),
            validation: None,
            confidence: 0.0,
        }
    }

    /// Attaches validation output. Called once per instance by the validator.
    pub fn attach_validation(&mut self, validation: ValidationResult, context_words: Vec<String>) {
        if !context_words.is_empty() {
            self.context_words = context_words;
        }
        self.confidence = validation.overall_confidence.clamp(0.0, 1.0);
        self.validation = Some(validation);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunAnalysisResult {
    pub sentence: String,
    /// 1 if the sentence contains one or more puns, 0 otherwise.
    pub has_pun: u8,
    pub puns: Vec<PunInstance>,
    pub analysis_notes: String,
    /// Kept for audit; not part of the exchange format.
    #[serde(skip_serializing, default)]
    pub raw_llm_response: String,
}

impl PunAnalysisResult {
    pub fn new(
        sentence: impl Into<String>,
        puns: Vec<PunInstance>,
        analysis_notes: impl Into<String>,
        raw_llm_response: impl Into<String>,
    ) -> Self {
        PunAnalysisResult {
            sentence: sentence.into(),
            has_pun: u8::from(!puns.is_empty()),
            puns,
            analysis_notes: analysis_notes.into(),
            raw_llm_response: raw_llm_response.into(),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
