//! Generation-agent definitions.
//!
//! Each agent kind is a prompt-builder specialization: it owns a role, a
//! responsibility list, constraints, and the output schema its replies must
//! match. An agent consumes exactly one instruction variant (the one its
//! action produces) plus the formatting contract, and resolves to a prompt
//! whose expected reply is the speech/display pair. Invoking the LLM with
//! that prompt is the caller's business.

use crate::builder::PromptBuilder;
use crate::error::{Result, TutorError};
use crate::instruction::{Action, HintDepth, Instruction};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// The escalation ladder embedded into hint prompts. One rung per hint
/// level; the last rung stops just short of the answer.
pub const HINT_LADDER: [(HintDepth, &str); 3] = [
    (
        HintDepth::GentleNudge,
        "Level 1 (gentle nudge): point at the relevant idea with a guiding question; do not name the operation",
    ),
    (
        HintDepth::SpecificGuidance,
        "Level 2 (specific guidance): name the operation or rule to apply and ask the student to carry it out",
    ),
    (
        HintDepth::NearAnswer,
        "Level 3 (near-answer): walk through every step except the final one and ask for that last step",
    ),
];

/// The five downstream content generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentKind {
    Hint,
    Solution,
    Question,
    Celebration,
    ConceptClarifier,
}

impl AgentKind {
    /// The agent that consumes the instruction produced by `action`.
    pub fn for_action(action: Action) -> AgentKind {
        match action {
            Action::GiveHint => AgentKind::Hint,
            Action::GiveSolution => AgentKind::Solution,
            Action::NewProblem => AgentKind::Question,
            Action::Celebrate => AgentKind::Celebration,
            Action::ClarifyConcept => AgentKind::ConceptClarifier,
        }
    }

    /// Flat registry address, e.g. `core.agent.hint`.
    pub fn registry_id(&self) -> String {
        format!("core.agent.{self}")
    }

    pub const ALL: [AgentKind; 5] = [
        AgentKind::Hint,
        AgentKind::Solution,
        AgentKind::Question,
        AgentKind::Celebration,
        AgentKind::ConceptClarifier,
    ];
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentKind::Hint => "hint",
            AgentKind::Solution => "solution",
            AgentKind::Question => "question",
            AgentKind::Celebration => "celebration",
            AgentKind::ConceptClarifier => "concept-clarifier",
        };
        write!(f, "{name}")
    }
}

/// A registered agent: role, responsibilities, constraints, and the schema
/// its replies must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub kind: AgentKind,
    pub role: String,
    pub responsibilities: Vec<String>,
    pub constraints: Vec<String>,
    pub output_schema: Value,
}

impl AgentDefinition {
    /// The canonical definition for an agent kind.
    pub fn for_kind(kind: AgentKind) -> AgentDefinition {
        match kind {
            AgentKind::Hint => AgentDefinition {
                kind,
                role: "You are a warm, encouraging Socratic mathematics tutor. You guide \
                       discovery with progressive hints instead of revealing answers."
                    .to_string(),
                responsibilities: vec![
                    "Craft one progressive hint matched to the requested depth".to_string(),
                    "Use the student's error to target what they actually missed".to_string(),
                    "End the hint with something for the student to do next".to_string(),
                ],
                constraints: vec![
                    "Never reveal the final answer in a hint".to_string(),
                    "Keep speech to one or two conversational sentences".to_string(),
                    "Ask only one question unless the second part uses the answer from the first"
                        .to_string(),
                ],
                output_schema: default_output_schema("hint"),
            },
            AgentKind::Solution => AgentDefinition {
                kind,
                role: "You are a patient mathematics tutor walking a student through a \
                       complete worked solution after their own attempts ran out."
                    .to_string(),
                responsibilities: vec![
                    "Break the solution into clearly numbered steps".to_string(),
                    "Explain why each step is taken, not just what it is".to_string(),
                    "Address the struggle points named in the instruction".to_string(),
                ],
                constraints: vec![
                    "Keep speech to a short supportive acknowledgment".to_string(),
                    "Put the full worked solution in the display channel".to_string(),
                ],
                output_schema: default_output_schema("solution"),
            },
            AgentKind::Question => AgentDefinition {
                kind,
                role: "You are the curriculum expert responsible for generating the next \
                       practice problem at the right difficulty."
                    .to_string(),
                responsibilities: vec![
                    "Generate one problem targeting the named section and objectives".to_string(),
                    "Acknowledge a section transition when the instruction advances".to_string(),
                    "Vary contexts and numbers; never repeat the previous problem".to_string(),
                ],
                constraints: vec![
                    "The problem must have a single part unless the second part uses the answer \
                     from the first"
                        .to_string(),
                    "Match the difficulty of the target section".to_string(),
                ],
                output_schema: default_output_schema("question"),
            },
            AgentKind::Celebration => AgentDefinition {
                kind,
                role: "You are an enthusiastic tutor celebrating that the student has \
                       completed the whole topic."
                    .to_string(),
                responsibilities: vec![
                    "Congratulate the student by name of achievement, not generically".to_string(),
                    "Reference how many sections they mastered".to_string(),
                    "Point them toward what they are ready for next".to_string(),
                ],
                constraints: vec![
                    "Speech only; leave the display channel empty".to_string(),
                    "Three or four sentences at most".to_string(),
                ],
                output_schema: default_output_schema("celebration"),
            },
            AgentKind::ConceptClarifier => AgentDefinition {
                kind,
                role: "You are a mathematics tutor explaining the why behind a rule the \
                       student just asked about."
                    .to_string(),
                responsibilities: vec![
                    "Answer the student's conceptual question directly".to_string(),
                    "Connect the explanation back to the current problem".to_string(),
                    "Check understanding with one short follow-up question".to_string(),
                ],
                constraints: vec![
                    "Do not solve the current problem for the student".to_string(),
                    "Do not introduce a new problem".to_string(),
                ],
                output_schema: default_output_schema("clarification"),
            },
        }
    }

    /// Whether this agent consumes the given instruction variant.
    pub fn accepts(&self, instruction: &Instruction) -> bool {
        AgentKind::for_action(instruction.action()) == self.kind
    }

    /// The builder seeded with this agent's fixed sections: role,
    /// responsibilities, constraints, formatting rules, and output schema.
    pub fn base_builder(&self) -> PromptBuilder {
        PromptBuilder::new()
            .add_role(self.role.as_str())
            .add_section("RESPONSIBILITIES", self.responsibilities.clone())
            .add_constraints(self.constraints.clone())
            .add_formatting_rules()
            .add_output_schema(&self.output_schema)
    }

    /// Extends a builder with the instruction payload this agent consumes.
    /// Fails when the instruction belongs to a different agent kind.
    pub fn apply_instruction(
        &self,
        builder: PromptBuilder,
        instruction: &Instruction,
    ) -> Result<PromptBuilder> {
        if !self.accepts(instruction) {
            return Err(TutorError::Configuration(format!(
                "agent '{}' cannot consume a {} instruction",
                self.kind,
                instruction.action()
            )));
        }
        let payload = serde_json::to_string_pretty(instruction)
            .map_err(|e| TutorError::Configuration(format!("unserializable instruction: {e}")))?;
        let builder = builder.add_section("INSTRUCTION", payload);
        let builder = match instruction {
            Instruction::GiveHint { depth, .. } => {
                let ladder: Vec<String> =
                    HINT_LADDER.iter().map(|(_, rung)| rung.to_string()).collect();
                builder
                    .add_section("HINT LADDER", ladder)
                    .add_section("REQUESTED DEPTH", format!("{depth}"))
            }
            _ => builder,
        };
        Ok(builder
            .add_section("CRITICAL", "Return ONLY valid JSON exactly matching the OUTPUT SCHEMA. \
                          Provide every field even when unused; leave unused fields blank."))
    }
}

fn default_output_schema(display_kind: &str) -> Value {
    json!({
        "speech": {
            "text": "string - plain words for the avatar, no markup",
            "emotion": "encouraging | celebratory | supportive | neutral | warm | excited"
        },
        "display": {
            "content": "string or null - visual content, markdown and Unicode math allowed",
            "showAfterSpeech": "boolean",
            "type": display_kind
        },
        "mathTool": {
            "toolName": "string - technical key (optional)",
            "parameters": "object - tool parameters (optional)",
            "caption": "string - short explanation (optional)"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::Difficulty;

    fn hint_instruction() -> Instruction {
        Instruction::GiveHint {
            focus_concept: "two-step equations".to_string(),
            student_error: "subtracted instead of dividing".to_string(),
            hint_strategy: "ask what undoes multiplication".to_string(),
            depth: HintDepth::SpecificGuidance,
        }
    }

    #[test]
    fn test_action_to_agent_mapping_is_total() {
        assert_eq!(AgentKind::for_action(Action::GiveHint), AgentKind::Hint);
        assert_eq!(AgentKind::for_action(Action::GiveSolution), AgentKind::Solution);
        assert_eq!(AgentKind::for_action(Action::NewProblem), AgentKind::Question);
        assert_eq!(AgentKind::for_action(Action::Celebrate), AgentKind::Celebration);
        assert_eq!(
            AgentKind::for_action(Action::ClarifyConcept),
            AgentKind::ConceptClarifier
        );
    }

    #[test]
    fn test_registry_ids_are_flat_strings() {
        assert_eq!(AgentKind::Hint.registry_id(), "core.agent.hint");
        assert_eq!(
            AgentKind::ConceptClarifier.registry_id(),
            "core.agent.concept-clarifier"
        );
    }

    #[test]
    fn test_base_builder_carries_contract_sections() {
        let agent = AgentDefinition::for_kind(AgentKind::Hint);
        let prompt = agent.base_builder().build();
        assert!(prompt.contains("ROLE:"));
        assert!(prompt.contains("FORMATTING RULES:"));
        assert!(prompt.contains("OUTPUT SCHEMA:"));
        assert!(prompt.contains("speech.text rules"));
    }

    #[test]
    fn test_hint_agent_embeds_ladder_and_depth() {
        let agent = AgentDefinition::for_kind(AgentKind::Hint);
        let builder = agent
            .apply_instruction(agent.base_builder(), &hint_instruction())
            .unwrap();
        let prompt = builder.build();
        assert!(prompt.contains("HINT LADDER:"));
        assert!(prompt.contains("REQUESTED DEPTH:\nspecific guidance"));
        assert!(prompt.contains("\"focusConcept\": \"two-step equations\""));
    }

    #[test]
    fn test_mismatched_instruction_is_rejected() {
        let agent = AgentDefinition::for_kind(AgentKind::Question);
        let err = agent
            .apply_instruction(agent.base_builder(), &hint_instruction())
            .unwrap_err();
        assert!(matches!(err, TutorError::Configuration(_)));
    }

    #[test]
    fn test_question_agent_accepts_new_problem() {
        let agent = AgentDefinition::for_kind(AgentKind::Question);
        let instruction = Instruction::NewProblem {
            target_section: "sec-2".to_string(),
            target_concept: "two-step equations".to_string(),
            difficulty: Difficulty::Intermediate,
            focus_objectives: vec!["Undo addition before division".to_string()],
            advance_to_next_section: true,
        };
        let prompt = agent
            .apply_instruction(agent.base_builder(), &instruction)
            .unwrap()
            .build();
        assert!(prompt.contains("\"advanceToNextSection\": true"));
    }
}
