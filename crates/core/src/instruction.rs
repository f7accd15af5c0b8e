//! Pedagogical actions and the typed instruction payloads behind them.
//!
//! Every decision produces exactly one [`Action`] and exactly one matching
//! [`Instruction`] variant. The instruction is the contract between the
//! decision engine and the one generation agent that consumes it; it is
//! built per turn and never persisted.

use crate::topic::Difficulty;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of pedagogical outcomes a student turn can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ClarifyConcept,
    GiveHint,
    GiveSolution,
    NewProblem,
    Celebrate,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::ClarifyConcept => "CLARIFY_CONCEPT",
            Action::GiveHint => "GIVE_HINT",
            Action::GiveSolution => "GIVE_SOLUTION",
            Action::NewProblem => "NEW_PROBLEM",
            Action::Celebrate => "CELEBRATE",
        };
        write!(f, "{name}")
    }
}

/// How close a hint comes to revealing the answer. Level 1 is a gentle
/// nudge; the last level stops just short of the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HintDepth {
    GentleNudge,
    SpecificGuidance,
    NearAnswer,
}

impl HintDepth {
    /// Maps an escalating hint level (1-based) to a depth. Levels beyond the
    /// ladder clamp to the deepest rung.
    pub fn from_level(level: u32) -> Self {
        match level {
            0 | 1 => HintDepth::GentleNudge,
            2 => HintDepth::SpecificGuidance,
            _ => HintDepth::NearAnswer,
        }
    }
}

impl fmt::Display for HintDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HintDepth::GentleNudge => "gentle nudge",
            HintDepth::SpecificGuidance => "specific guidance",
            HintDepth::NearAnswer => "near-answer",
        };
        write!(f, "{name}")
    }
}

/// The typed payload handed from the decision engine to one generation
/// agent. Exactly one variant is produced per decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    #[serde(rename_all = "camelCase")]
    ClarifyConcept {
        concept: String,
        student_question: String,
    },
    #[serde(rename_all = "camelCase")]
    GiveHint {
        focus_concept: String,
        student_error: String,
        hint_strategy: String,
        depth: HintDepth,
    },
    #[serde(rename_all = "camelCase")]
    GiveSolution {
        focus_concept: String,
        student_error: String,
        struggle_points: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    NewProblem {
        target_section: String,
        target_concept: String,
        difficulty: Difficulty,
        focus_objectives: Vec<String>,
        advance_to_next_section: bool,
    },
    #[serde(rename_all = "camelCase")]
    Celebrate {
        topic_name: String,
        sections_mastered: u32,
        closing_note: String,
    },
}

impl Instruction {
    /// The action this instruction realizes.
    pub fn action(&self) -> Action {
        match self {
            Instruction::ClarifyConcept { .. } => Action::ClarifyConcept,
            Instruction::GiveHint { .. } => Action::GiveHint,
            Instruction::GiveSolution { .. } => Action::GiveSolution,
            Instruction::NewProblem { .. } => Action::NewProblem,
            Instruction::Celebrate { .. } => Action::Celebrate,
        }
    }
}
