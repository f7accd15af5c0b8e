//! Topic and progression configuration.
//!
//! A [`Topic`] is the static curriculum description for one subtopic: its
//! display names, learning objectives, key formulas, the per-agent prompt
//! customizations, and a [`ProgressionStructure`] of ordered sections the
//! student moves through. Section lookup failures are configuration errors;
//! the engine never guesses past an unknown section id.

use crate::agents::AgentKind;
use crate::error::{Result, TutorError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default hint budget per problem when a topic profile does not override it.
pub const DEFAULT_MAX_HINTS: u32 = 2;

/// Default number of correct final answers that satisfies a section's
/// mastery signals.
pub const DEFAULT_MASTERY_THRESHOLD: u32 = 2;

/// Section difficulty bands, mirrored into generated problem instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Foundational,
    Intermediate,
    Advanced,
}

/// One step of a topic's progression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    /// Free-text rubric describing what mastery looks like. Carried into
    /// evaluator-style prompt sections.
    pub mastery_signals: String,
    /// Machine-checkable progression criterion: correct final answers in
    /// this section required before it counts as mastered.
    #[serde(default = "default_mastery_threshold")]
    pub mastery_threshold: u32,
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub relevant_formulas: Vec<String>,
}

fn default_mastery_threshold() -> u32 {
    DEFAULT_MASTERY_THRESHOLD
}

/// The ordered sections of one topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressionStructure {
    pub sections: Vec<Section>,
}

impl ProgressionStructure {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Looks up a section by id, failing with a configuration error when the
    /// id is unknown.
    pub fn section(&self, id: &str) -> Result<&Section> {
        self.sections.iter().find(|s| s.id == id).ok_or_else(|| {
            TutorError::Configuration(format!("section '{id}' not found in progression"))
        })
    }

    /// Human-readable position of a section, e.g. "2 of 5".
    pub fn position(&self, id: &str) -> Result<String> {
        let index = self
            .sections
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| {
                TutorError::Configuration(format!("section '{id}' not found in progression"))
            })?;
        Ok(format!("{} of {}", index + 1, self.sections.len()))
    }

    /// The section after `id`, or `None` when `id` is the last one.
    pub fn next_section(&self, id: &str) -> Result<Option<&Section>> {
        let index = self
            .sections
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| {
                TutorError::Configuration(format!("section '{id}' not found in progression"))
            })?;
        Ok(self.sections.get(index + 1))
    }
}

/// Static curriculum configuration for one subtopic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Flat registry id, e.g. `topic.math.linear-equations`.
    pub id: String,
    pub display_name: String,
    pub topic_name: String,
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub key_formulas: Vec<String>,
    #[serde(default = "default_max_hints")]
    pub max_hints: u32,
    pub progression: ProgressionStructure,
    /// Per-agent prompt customization sections, merged by the registry when
    /// a topic-scoped agent prompt is built.
    #[serde(default)]
    pub agent_customizations: HashMap<AgentKind, String>,
    /// Visual tools available for this topic, `name -> description`. `Null`
    /// when the topic has none.
    #[serde(default)]
    pub math_tools: Value,
}

fn default_max_hints() -> u32 {
    DEFAULT_MAX_HINTS
}

impl Topic {
    pub fn first_section(&self) -> Result<&Section> {
        self.progression
            .sections
            .first()
            .ok_or_else(|| TutorError::Configuration(format!("topic '{}' has no sections", self.id)))
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    /// A two-section linear-equations topic used across the crate's tests.
    pub(crate) fn sample_topic() -> Topic {
        Topic {
            id: "topic.math.linear-equations".to_string(),
            display_name: "Linear Equations".to_string(),
            topic_name: "solving linear equations".to_string(),
            learning_objectives: vec![
                "Solve one- and two-step linear equations".to_string(),
                "Check a solution by substitution".to_string(),
            ],
            key_formulas: vec!["ax + b = c".to_string()],
            max_hints: 2,
            progression: ProgressionStructure::new(vec![
                Section {
                    id: "sec-1".to_string(),
                    title: "One-step equations".to_string(),
                    difficulty: Difficulty::Foundational,
                    mastery_signals: "Solves one-step equations without hints".to_string(),
                    mastery_threshold: 2,
                    learning_objectives: vec![
                        "Isolate the variable with one inverse operation".to_string(),
                    ],
                    relevant_formulas: vec![],
                },
                Section {
                    id: "sec-2".to_string(),
                    title: "Two-step equations".to_string(),
                    difficulty: Difficulty::Intermediate,
                    mastery_signals: "Solves two-step equations consistently".to_string(),
                    mastery_threshold: 2,
                    learning_objectives: vec!["Undo addition before division".to_string()],
                    relevant_formulas: vec!["ax + b = c".to_string()],
                },
            ]),
            agent_customizations: HashMap::new(),
            math_tools: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::sample_topic;
    use super::*;

    #[test]
    fn test_section_lookup() {
        let topic = sample_topic();
        assert_eq!(
            topic.progression.section("sec-2").unwrap().title,
            "Two-step equations"
        );
    }

    #[test]
    fn test_unknown_section_is_configuration_error() {
        let topic = sample_topic();
        let err = topic.progression.section("sec-9").unwrap_err();
        assert!(matches!(err, TutorError::Configuration(_)));
    }

    #[test]
    fn test_position_string() {
        let topic = sample_topic();
        assert_eq!(topic.progression.position("sec-2").unwrap(), "2 of 2");
    }

    #[test]
    fn test_next_section_and_end_of_progression() {
        let topic = sample_topic();
        assert_eq!(
            topic.progression.next_section("sec-1").unwrap().unwrap().id,
            "sec-2"
        );
        assert!(topic.progression.next_section("sec-2").unwrap().is_none());
    }

    #[test]
    fn test_mastery_threshold_defaults_on_deserialize() {
        let json = r#"{
            "id": "sec-x",
            "title": "X",
            "difficulty": "foundational",
            "masterySignals": "does X",
            "learningObjectives": ["x"]
        }"#;
        let section: Section = serde_json::from_str(json).unwrap();
        assert_eq!(section.mastery_threshold, DEFAULT_MASTERY_THRESHOLD);
    }

    #[test]
    fn test_first_section() {
        let topic = sample_topic();
        assert_eq!(topic.first_section().unwrap().id, "sec-1");
    }
}
