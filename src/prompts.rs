//! Prompt texts sent to the text generator.
//!
//! Each reply format here has a matching parser in [`crate::response`].

use crate::models::PunType;

/// System prompt for the primary pun analysis, listing the pun categories and the JSON
/// reply schema.
pub fn analysis_system_prompt() -> String {
    let categories: String = PunType::ALL
        .iter()
        .map(|t| format!("   - {}: {}\n", t.label(), t.description()))
        .collect();
    let labels = PunType::ALL.map(PunType::label).join("|");

    format!(
        r#"You are a linguistic expert specializing in pun identification and analysis.

Your task is to analyze a sentence and identify any puns it contains. For each pun found, provide:

1. The word or expression that creates the pun
2. The type of pun:
{categories}
3. The two senses/meanings being played upon
4. FrameNet frames that best capture each sense (use standard FrameNet frame names if you know them)
5. An explanation of how the pun works

Respond in this exact JSON format:
{{
  "has_pun": 1 or 0,
  "puns": [
    {{
      "word_or_expression": "the pun word/phrase",
      "pun_type": "{labels}",
      "sense1": "first meaning",
      "sense2": "second meaning",
      "sense1_frame": "FrameNet frame name for sense 1",
      "sense2_frame": "FrameNet frame name for sense 2",
      "explanation": "explanation of how the pun works"
    }}
  ],
  "analysis_notes": "any additional observations"
}}

Be thorough but precise. Only identify genuine puns where multiple meanings are simultaneously activated.
If there is no pun, return {{"has_pun": 0, "puns": [], "analysis_notes": "explanation of why no pun"}}
"#
    )
}

pub fn analysis_user_message(sentence: &str) -> String {
    format!("Analyze this sentence for puns:\n\n\"{}\"", sentence)
}

/// Asks for a 0-10 distance between two frames in `DISTANCE:` / `FRAME1_DEFINITION:` /
/// `FRAME2_DEFINITION:` / `EXPLANATION:` lines.
pub fn distance_estimation(frame1: &str, sense1: &str, frame2: &str, sense2: &str) -> String {
    format!(
        "Estimate the semantic frame distance between two word senses.

Frame 1: {frame1}
Sense 1: {sense1}

Frame 2: {frame2}
Sense 2: {sense2}

Using FrameNet's conceptual framework, estimate how semantically distant these frames are.
Consider:
- Are they in the same domain? (e.g., both about commerce, both about motion)
- Do they share frame elements?
- How many relation links would connect them in FrameNet's frame hierarchy?

Respond in this exact format:
DISTANCE: [number from 0-10, where 0=same frame, 10=maximally distant]
FRAME1_DEFINITION: [brief definition of frame 1]
FRAME2_DEFINITION: [brief definition of frame 2]
EXPLANATION: [explain the semantic distance between these frames]"
    )
}

pub fn sense_activation(sentence: &str, word: &str, sense1: &str, sense2: &str) -> String {
    format!(
        "Analyze whether both meanings of a potential pun word are activated in this sentence.

Sentence: \"{sentence}\"
Pun word: \"{word}\"
Sense 1: {sense1}
Sense 2: {sense2}

For each sense, identify:
1. What context words in the sentence support/activate this sense?
2. How strongly is this sense activated (weak/moderate/strong)?

Then determine: Are BOTH senses plausibly activated by the context?
A true pun requires both meanings to be simultaneously accessible to the reader.

Respond in this exact format:
SENSE1_CONTEXT: [list context words]
SENSE1_STRENGTH: [weak/moderate/strong]
SENSE2_CONTEXT: [list context words]
SENSE2_STRENGTH: [weak/moderate/strong]
BOTH_ACTIVATED: [yes/no]
EXPLANATION: [brief explanation]"
    )
}

pub fn substitution(sentence: &str, word: &str, sense1: &str, sense2: &str) -> String {
    format!(
        "Perform a substitution test for a potential pun.

Original sentence: \"{sentence}\"
Pun word: \"{word}\"
Sense 1: {sense1}
Sense 2: {sense2}

Substitution test:
1. Replace \"{word}\" with a word/phrase clearly meaning \"{sense1}\" - is the sentence grammatical and semantically coherent?
2. Replace \"{word}\" with a word/phrase clearly meaning \"{sense2}\" - is the sentence grammatical and semantically coherent?

For a true pun, BOTH substitutions should produce grammatical sentences (even if the meanings differ).

Respond in this exact format:
SUBSTITUTION1: [the rewritten sentence with sense 1]
SUBSTITUTION1_VALID: [yes/no]
SUBSTITUTION2: [the rewritten sentence with sense 2]
SUBSTITUTION2_VALID: [yes/no]
TEST_PASSED: [yes/no]
EXPLANATION: [brief explanation]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_every_category() {
        let prompt = analysis_system_prompt();
        for pun_type in PunType::ALL {
            assert!(prompt.contains(pun_type.label()));
            assert!(prompt.contains(pun_type.description()));
        }
        assert!(prompt.contains("\"pun_type\": \"HOMOPHONIC|HOMOGRAPHIC|RECURSIVE|ANTANACLASIS\""));
        assert!(prompt.contains("{\"has_pun\": 0, \"puns\": []"));
    }

    #[test]
    fn test_user_message_quotes_sentence() {
        assert_eq!(
            analysis_user_message("I used to be a banker."),
            "Analyze this sentence for puns:\n\n\"I used to be a banker.\""
        );
    }
}
