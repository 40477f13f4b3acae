//! Tolerant parsing of text generator replies.
//!
//! Nothing in here fails: malformed replies fall back to documented defaults.

use crate::models::PunCandidate;
use log::warn;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Notes attached when no JSON object could be recovered from the analysis reply.
pub const PARSE_FAILURE_NOTE: &str = "Failed to parse response";
/// Distance assumed when an estimate carries no usable number.
pub const DEFAULT_ESTIMATED_DISTANCE: f64 = 5.0;

static DISTANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DISTANCE:\s*(\d+(?:\.\d+)?)").unwrap());
static FRAME1_DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FRAME1_DEFINITION:[ \t]*([^\n]*)").unwrap());
static FRAME2_DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FRAME2_DEFINITION:[ \t]*([^\n]*)").unwrap());
static EXPLANATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)EXPLANATION:\s*(.+)").unwrap());
const ESTIMATE_FIELDS: [&str; 3] = ["DISTANCE:", "FRAME1_DEFINITION:", "FRAME2_DEFINITION:"];

static BOTH_ACTIVATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)BOTH_ACTIVATED:\s*\[?\s*yes\b").unwrap());
static TEST_PASSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TEST_PASSED:\s*\[?\s*yes\b").unwrap());

// --- Pun analysis ---

/// Outcome of parsing the primary analysis reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedAnalysis {
    pub candidates: Vec<PunCandidate>,
    pub analysis_notes: String,
    /// False when the fallback was used.
    pub parsed: bool,
}

impl ParsedAnalysis {
    fn fallback() -> Self {
        ParsedAnalysis {
            candidates: Vec::new(),
            analysis_notes: PARSE_FAILURE_NOTE.to_string(),
            parsed: false,
        }
    }
}

/// Decodes the analysis reply.
///
/// Tries the whole text as JSON, then the first balanced `{...}` block inside it (so
/// prose or code fences around the object are tolerated), then gives up with an empty
/// analysis noting the failure.
pub fn parse_analysis(raw: &str) -> ParsedAnalysis {
    let object = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => first_json_object(raw)
            .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            }),
    };

    match object {
        Some(map) => analysis_from_object(&map),
        None => {
            let preview: String = raw.chars().take(200).collect();
            warn!("Could not parse LLM response as JSON: {}...", preview);
            ParsedAnalysis::fallback()
        }
    }
}

fn analysis_from_object(map: &Map<String, Value>) -> ParsedAnalysis {
    let candidates = match map.get("puns") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(candidate_from_object(fields)),
                other => {
                    warn!("Ignoring non-object pun entry: {}", other);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    ParsedAnalysis {
        candidates,
        analysis_notes: text_field(map, "analysis_notes"),
        parsed: true,
    }
}

fn candidate_from_object(fields: &Map<String, Value>) -> PunCandidate {
    let optional = |key: &str| match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(_) => Some(text_field(fields, key)),
    };
    PunCandidate {
        word_or_expression: text_field(fields, "word_or_expression"),
        pun_type: text_field(fields, "pun_type"),
        sense1: text_field(fields, "sense1"),
        sense2: text_field(fields, "sense2"),
        sense1_frame: optional("sense1_frame"),
        sense2_frame: optional("sense2_frame"),
        explanation: text_field(fields, "explanation"),
    }
}

/// String value of `key`; other scalars are rendered, absent and null become "".
fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// The first balanced `{...}` substring, skipping braces inside JSON strings.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// --- Distance estimate ---

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceEstimate {
    /// As written by the generator; not clamped.
    pub distance: f64,
    pub frame1_definition: String,
    pub frame2_definition: String,
    pub explanation: String,
}

/// Reads the line-prefixed estimate format. Missing fields take their defaults.
pub fn parse_distance_estimate(text: &str) -> DistanceEstimate {
    let distance = DISTANCE_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .unwrap_or(DEFAULT_ESTIMATED_DISTANCE);

    DistanceEstimate {
        distance,
        frame1_definition: line_field(&FRAME1_DEFINITION_RE, text, "FRAME2"),
        frame2_definition: line_field(&FRAME2_DEFINITION_RE, text, "EXPLANATION"),
        explanation: EXPLANATION_RE
            .captures(text)
            .map(|caps| until_next_field(&caps[1]).trim().to_string())
            .unwrap_or_default(),
    }
}

/// Multi-line value up to the first line that opens another estimate field.
fn until_next_field(value: &str) -> &str {
    let mut end = value.len();
    let mut offset = 0;
    for line in value.split_inclusive('\n') {
        let start = line.trim_start();
        if offset > 0 && ESTIMATE_FIELDS.iter().any(|field| start.starts_with(field)) {
            end = offset;
            break;
        }
        offset += line.len();
    }
    &value[..end]
}

/// Single-line field value, cut short if the next field follows on the same line.
fn line_field(re: &Regex, text: &str, next_field: &str) -> String {
    re.captures(text)
        .map(|caps| {
            let value = &caps[1];
            let value = value.find(next_field).map_or(value, |end| &value[..end]);
            value.trim().to_string()
        })
        .unwrap_or_default()
}

// --- Yes/no checks ---

/// True when the reply carries `BOTH_ACTIVATED: yes` (any case).
pub fn both_activated(text: &str) -> bool {
    BOTH_ACTIVATED_RE.is_match(text)
}

/// True when the reply carries `TEST_PASSED: yes` (any case).
pub fn test_passed(text: &str) -> bool {
    TEST_PASSED_RE.is_match(text)
}

/// Text after the last `EXPLANATION:` marker, empty when there is none.
pub fn extract_explanation(text: &str) -> String {
    text.rsplit_once("EXPLANATION:")
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default()
}
