//! Per-session learner state.
//!
//! [`SessionState`] tracks the active problem, a bounded conversation
//! history, per-section progression, and the rolling assessment window. Only
//! the decision engine mutates it, once per student turn; starting a new
//! problem resets the per-problem counters.

use crate::assessment::AssessmentWindow;
use crate::instruction::Action;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Maximum turns retained in the rolling conversation history.
pub const MAX_HISTORY_TURNS: usize = 20;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
}

/// One conversation turn, most-recent-last in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn student(content: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            content: content.into(),
        }
    }

    pub fn tutor(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tutor,
            content: content.into(),
        }
    }
}

/// State of the problem currently in front of the student.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemState {
    pub current_problem: String,
    pub correct_answer: String,
    pub student_response: Option<String>,
    pub hints_given: u32,
    pub attempts: u32,
    pub previous_action: Option<Action>,
}

/// Per-section counters, kept for mastery checks and resume prompts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStats {
    pub questions_attempted: u32,
    pub questions_correct: u32,
    pub hints_used: u32,
}

/// The student's progress through a topic's sections. Mastery is
/// forward-only: a section id, once recorded here, is never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    pub current_section: String,
    mastered: Vec<String>,
    stats: BTreeMap<String, SectionStats>,
}

impl ProgressionState {
    pub fn new(current_section: impl Into<String>) -> Self {
        Self {
            current_section: current_section.into(),
            mastered: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    pub fn is_mastered(&self, section_id: &str) -> bool {
        self.mastered.iter().any(|id| id == section_id)
    }

    /// Records a section as mastered. Idempotent, and there is deliberately
    /// no inverse operation.
    pub fn mark_mastered(&mut self, section_id: &str) {
        if !self.is_mastered(section_id) {
            self.mastered.push(section_id.to_string());
        }
    }

    pub fn mastered_sections(&self) -> &[String] {
        &self.mastered
    }

    pub fn advance_to(&mut self, section_id: impl Into<String>) {
        self.current_section = section_id.into();
    }

    pub fn stats(&self, section_id: &str) -> SectionStats {
        self.stats.get(section_id).copied().unwrap_or_default()
    }

    pub fn record_attempt(&mut self, section_id: &str, correct: bool) {
        let entry = self.stats.entry(section_id.to_string()).or_default();
        entry.questions_attempted += 1;
        if correct {
            entry.questions_correct += 1;
        }
    }

    pub fn record_hint(&mut self, section_id: &str) {
        self.stats.entry(section_id.to_string()).or_default().hints_used += 1;
    }
}

/// Everything the decision engine reads and writes for one student session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub problem: ProblemState,
    pub progression: ProgressionState,
    pub assessment_window: AssessmentWindow,
    history: VecDeque<Turn>,
    /// Concept questions asked this session. A non-penalizing signal only;
    /// never enters the scored assessment window.
    pub concept_questions_asked: u32,
}

impl SessionState {
    pub fn new(first_section: impl Into<String>) -> Self {
        Self {
            problem: ProblemState::default(),
            progression: ProgressionState::new(first_section),
            assessment_window: AssessmentWindow::default(),
            history: VecDeque::new(),
            concept_questions_asked: 0,
        }
    }

    /// Installs a new problem, resetting the per-problem counters. This is
    /// the only place `hints_given` returns to zero.
    pub fn begin_problem(&mut self, problem: impl Into<String>, answer: impl Into<String>) {
        self.problem = ProblemState {
            current_problem: problem.into(),
            correct_answer: answer.into(),
            student_response: None,
            hints_given: 0,
            attempts: 0,
            previous_action: None,
        };
    }

    /// Appends a turn, discarding the oldest once the bound is reached.
    pub fn push_turn(&mut self, turn: Turn) {
        if self.history.len() == MAX_HISTORY_TURNS {
            self.history.pop_front();
        }
        self.history.push_back(turn);
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    /// Conversation history formatted for prompt context, most-recent-last.
    pub fn history_text(&self) -> String {
        self.history
            .iter()
            .map(|turn| {
                let who = match turn.role {
                    Role::Student => "Student",
                    Role::Tutor => "Tutor",
                };
                format!("{}: {}", who, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_problem_resets_counters() {
        let mut state = SessionState::new("sec-1");
        state.begin_problem("Solve x + 1 = 2", "1");
        state.problem.hints_given = 2;
        state.problem.attempts = 3;
        state.problem.previous_action = Some(Action::GiveSolution);

        state.begin_problem("Solve x + 2 = 5", "3");
        assert_eq!(state.problem.hints_given, 0);
        assert_eq!(state.problem.attempts, 0);
        assert_eq!(state.problem.previous_action, None);
        assert_eq!(state.problem.correct_answer, "3");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = SessionState::new("sec-1");
        for i in 0..(MAX_HISTORY_TURNS + 5) {
            state.push_turn(Turn::student(format!("turn {i}")));
        }
        assert_eq!(state.history().count(), MAX_HISTORY_TURNS);
        // Oldest turns were discarded, most recent kept.
        assert_eq!(
            state.history().last().unwrap().content,
            format!("turn {}", MAX_HISTORY_TURNS + 4)
        );
    }

    #[test]
    fn test_history_text_labels_roles() {
        let mut state = SessionState::new("sec-1");
        state.push_turn(Turn::tutor("What is 2 + 2?"));
        state.push_turn(Turn::student("4"));
        assert_eq!(state.history_text(), "Tutor: What is 2 + 2?\nStudent: 4");
    }

    #[test]
    fn test_mastery_is_forward_only() {
        let mut progression = ProgressionState::new("sec-1");
        assert!(!progression.is_mastered("sec-1"));
        progression.mark_mastered("sec-1");
        progression.mark_mastered("sec-1");
        assert!(progression.is_mastered("sec-1"));
        assert_eq!(progression.mastered_sections().len(), 1);
    }

    #[test]
    fn test_section_stats_accumulate() {
        let mut progression = ProgressionState::new("sec-1");
        progression.record_attempt("sec-1", true);
        progression.record_attempt("sec-1", false);
        progression.record_hint("sec-1");
        let stats = progression.stats("sec-1");
        assert_eq!(stats.questions_attempted, 2);
        assert_eq!(stats.questions_correct, 1);
        assert_eq!(stats.hints_used, 1);
    }
}
