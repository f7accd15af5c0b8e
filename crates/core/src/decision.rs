//! The pedagogical decision engine.
//!
//! One call to [`decide`] turns the student's latest input into exactly one
//! [`Action`] with its matching [`Instruction`]. The decision matrix is an
//! explicit ordered table of guards evaluated top to bottom; the first
//! matching guard wins. Each guard is a named [`DecisionRule`] so boundary
//! behavior (exactly `max_hints`, last unmastered section, and so on) can be
//! tested in isolation.

use crate::assessment::{Assessment, TurnScore};
use crate::error::Result;
use crate::instruction::{Action, HintDepth, Instruction};
use crate::session::SessionState;
use crate::topic::{Section, Topic};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use regex::Regex;
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::sync::LazyLock;
use tracing::debug;

static ANSWER_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\sxX=+\-*/.\d()]+\??$").unwrap());

static SOLUTION_REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(show|give|tell)\s+me\s+the\s+(solution|answer)\b|\bi\s+give\s+up\b|\bjust\s+(tell|show|solve)\b|\bwhat('?s|\s+is)\s+the\s+answer\b",
    )
    .unwrap()
});

static CONCEPTUAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(why|how|what|when|which|can|could|do|does|explain)\b|(?i)\b(why|how\s+come|what\s+does|what\s+is|how\s+do|how\s+does|explain|confused|don'?t\s+understand)\b",
    )
    .unwrap()
});

/// How the classifier read the student's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    /// An interrogative about why/what/how a rule works.
    ConceptualQuestion,
    /// An explicit request to be shown the solution.
    SolutionRequest,
    /// An attempted answer, to be checked against the expected one.
    Answer,
}

/// Classifies a student turn. Answer-shaped input (numbers, fractions,
/// simple algebra) is never treated as a question, even with a trailing
/// question mark.
pub fn classify_input(input: &str) -> InputClass {
    let trimmed = input.trim();
    if trimmed.is_empty() || ANSWER_LIKE_RE.is_match(trimmed) {
        return InputClass::Answer;
    }
    if SOLUTION_REQUEST_RE.is_match(trimmed) {
        return InputClass::SolutionRequest;
    }
    if CONCEPTUAL_RE.is_match(trimmed) {
        return InputClass::ConceptualQuestion;
    }
    InputClass::Answer
}

fn normalize_answer(text: &str) -> String {
    let mut s = text.trim().to_lowercase();
    while let Some(stripped) = s.strip_suffix(['.', '!', '?', ' ']) {
        s = stripped.to_string();
    }
    for prefix in ["x =", "x="] {
        if let Some(stripped) = s.strip_prefix(prefix) {
            s = stripped.trim_start().to_string();
        }
    }
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn numeric_value(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    let (numerator, denominator) = text.split_once('/')?;
    let n = numerator.trim().parse::<f64>().ok()?;
    let d = denominator.trim().parse::<f64>().ok()?;
    if d == 0.0 { None } else { Some(n / d) }
}

/// Checks a student answer against the known correct one: numeric
/// equivalence first (including simple fractions), then exact normalized
/// text, then a fuzzy match for longer textual answers.
pub fn is_correct_answer(student: &str, expected: &str) -> bool {
    let student = normalize_answer(student);
    let expected = normalize_answer(expected);
    if expected.is_empty() || student.is_empty() {
        return false;
    }
    if student == expected {
        return true;
    }
    if let (Some(a), Some(b)) = (numeric_value(&student), numeric_value(&expected)) {
        return (a - b).abs() < 1e-9;
    }
    if expected.len() >= 4 && expected.chars().any(|c| c.is_alphabetic()) {
        let matcher = SkimMatcherV2::default();
        let self_score = matcher.fuzzy_match(&expected, &expected).unwrap_or(0);
        if let Some(score) = matcher.fuzzy_match(&student, &expected) {
            return score * 4 >= self_score * 3;
        }
    }
    false
}

/// The named guards of the decision matrix, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionRule {
    ConceptualQuestion,
    SolutionAlreadyShown,
    SolutionRequested,
    TopicComplete,
    CorrectAnswer,
    HintBudgetRemaining,
    HintBudgetExhausted,
}

/// The decision matrix. Evaluated top to bottom; the first matching guard
/// wins.
pub const DECISION_RULES: [DecisionRule; 7] = [
    DecisionRule::ConceptualQuestion,
    DecisionRule::SolutionAlreadyShown,
    DecisionRule::SolutionRequested,
    DecisionRule::TopicComplete,
    DecisionRule::CorrectAnswer,
    DecisionRule::HintBudgetRemaining,
    DecisionRule::HintBudgetExhausted,
];

/// Everything a guard needs to decide whether it applies.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext {
    pub input_class: InputClass,
    pub solution_just_shown: bool,
    pub answer_correct: bool,
    /// A correct answer now would satisfy the current section's mastery
    /// threshold.
    pub masters_section: bool,
    /// Every other section is already mastered.
    pub last_unmastered_section: bool,
    pub hints_given: u32,
    pub max_hints: u32,
}

impl DecisionRule {
    /// Whether this guard applies to the given turn.
    pub fn matches(&self, cx: &GuardContext) -> bool {
        match self {
            DecisionRule::ConceptualQuestion => {
                cx.input_class == InputClass::ConceptualQuestion
            }
            DecisionRule::SolutionAlreadyShown => cx.solution_just_shown,
            DecisionRule::SolutionRequested => cx.input_class == InputClass::SolutionRequest,
            DecisionRule::TopicComplete => {
                cx.answer_correct && cx.masters_section && cx.last_unmastered_section
            }
            DecisionRule::CorrectAnswer => cx.answer_correct,
            DecisionRule::HintBudgetRemaining => cx.hints_given < cx.max_hints,
            DecisionRule::HintBudgetExhausted => cx.hints_given >= cx.max_hints,
        }
    }
}

fn first_matching_rule(cx: &GuardContext) -> DecisionRule {
    // HintBudgetExhausted is a catch-all for evaluated wrong answers, so the
    // table always yields a rule.
    DECISION_RULES
        .iter()
        .copied()
        .find(|rule| rule.matches(cx))
        .unwrap_or(DecisionRule::HintBudgetExhausted)
}

/// Progression outcome attached to every decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionUpdate {
    pub current_section: String,
    pub section_mastered: bool,
    pub advance_to_next_section: bool,
}

/// The full outcome of one student turn.
///
/// Serialization follows the downstream consumer contract: the instruction
/// lands under `tutorInstruction`, `questionInstruction`, or
/// `solutionInstruction` depending on which agent consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub answer_correct: bool,
    pub is_main_problem_solved: bool,
    pub assessment: Assessment,
    pub progression: ProgressionUpdate,
    pub action: Action,
    pub hint_level: Option<u32>,
    pub instruction: Instruction,
    /// Plain-text rationale for logs and downstream agents. Never shown to
    /// the learner as-is and never contains math markup.
    pub reasoning: String,
}

impl Decision {
    /// The field name the instruction serializes under, per consuming agent.
    pub fn instruction_field(&self) -> &'static str {
        match self.action {
            Action::ClarifyConcept | Action::GiveHint | Action::Celebrate => "tutorInstruction",
            Action::NewProblem => "questionInstruction",
            Action::GiveSolution => "solutionInstruction",
        }
    }
}

impl Serialize for Decision {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Decision", 8)?;
        state.serialize_field("answerCorrect", &self.answer_correct)?;
        state.serialize_field("isMainProblemSolved", &self.is_main_problem_solved)?;
        state.serialize_field("assessment", &self.assessment)?;
        state.serialize_field("progression", &self.progression)?;
        state.serialize_field("action", &self.action)?;
        if let Some(level) = self.hint_level {
            state.serialize_field("hintLevel", &level)?;
        }
        state.serialize_field(self.instruction_field(), &self.instruction)?;
        state.serialize_field("reasoning", &self.reasoning)?;
        state.end()
    }
}

/// Evaluates one student turn against the session state and the topic's
/// progression structure.
///
/// Fails with a configuration error when the session's current section does
/// not exist in the topic; the engine never advances past an unknown
/// section. All session mutation (hint budget, attempts, progression,
/// assessment window, previous action) happens here and nowhere else.
pub fn decide(state: &mut SessionState, topic: &Topic, student_input: &str) -> Result<Decision> {
    let section = topic
        .progression
        .section(&state.progression.current_section)?
        .clone();

    let input_class = classify_input(student_input);
    let answer_correct = input_class == InputClass::Answer
        && is_correct_answer(student_input, &state.problem.correct_answer);

    let stats = state.progression.stats(&section.id);
    let masters_section = answer_correct
        && !state.progression.is_mastered(&section.id)
        && stats.questions_correct + 1 >= section.mastery_threshold;
    let last_unmastered_section = topic
        .progression
        .sections
        .iter()
        .filter(|s| !state.progression.is_mastered(&s.id))
        .all(|s| s.id == section.id);

    let cx = GuardContext {
        input_class,
        solution_just_shown: state.problem.previous_action == Some(Action::GiveSolution),
        answer_correct,
        masters_section,
        last_unmastered_section,
        hints_given: state.problem.hints_given,
        max_hints: topic.max_hints,
    };
    let rule = first_matching_rule(&cx);
    debug!(?rule, ?input_class, answer_correct, "decision guard matched");

    state.problem.student_response = Some(student_input.to_string());

    let mut hint_level = None;
    let mut is_main_problem_solved = false;
    let mut concept_gaps: Vec<String> = Vec::new();
    let mut progression = ProgressionUpdate {
        current_section: section.id.clone(),
        section_mastered: false,
        advance_to_next_section: false,
    };

    let (instruction, reasoning) = match rule {
        DecisionRule::ConceptualQuestion => {
            state.concept_questions_asked += 1;
            let instruction = Instruction::ClarifyConcept {
                concept: section.title.clone(),
                student_question: student_input.to_string(),
            };
            let reasoning = format!(
                "The student asked a conceptual question about {}. Clarifying the concept \
                 without touching the hint budget or attempt count.",
                section.title
            );
            (instruction, reasoning)
        }
        DecisionRule::SolutionAlreadyShown => {
            let reasoning = "A full solution was already shown on the previous turn, so the \
                             stale answer is not re-evaluated. Issuing a fresh problem in the \
                             current section."
                .to_string();
            (new_problem_instruction(&section, false), reasoning)
        }
        DecisionRule::SolutionRequested => {
            concept_gaps = section.learning_objectives.clone();
            let instruction = Instruction::GiveSolution {
                focus_concept: section.title.clone(),
                student_error: "Asked for the solution instead of attempting the problem"
                    .to_string(),
                struggle_points: concept_gaps.clone(),
            };
            let reasoning = "The student asked for the solution directly. Walking through the \
                             full solution rather than withholding it."
                .to_string();
            (instruction, reasoning)
        }
        DecisionRule::TopicComplete => {
            state.problem.attempts += 1;
            state.progression.record_attempt(&section.id, true);
            state.assessment_window.push(TurnScore {
                correct: true,
                hint_used: false,
            });
            state.progression.mark_mastered(&section.id);
            is_main_problem_solved = true;
            progression.section_mastered = true;
            let instruction = Instruction::Celebrate {
                topic_name: topic.topic_name.clone(),
                sections_mastered: state.progression.mastered_sections().len() as u32,
                closing_note: "Ready for a brand-new skill".to_string(),
            };
            let reasoning = format!(
                "Correct final answer mastered {}, the last remaining section. The whole \
                 topic is complete.",
                section.title
            );
            (instruction, reasoning)
        }
        DecisionRule::CorrectAnswer => {
            state.problem.attempts += 1;
            state.progression.record_attempt(&section.id, true);
            state.assessment_window.push(TurnScore {
                correct: true,
                hint_used: false,
            });
            is_main_problem_solved = true;
            let mut advance = false;
            let mut target = section.clone();
            if masters_section {
                state.progression.mark_mastered(&section.id);
                progression.section_mastered = true;
                if let Some(next) = first_unmastered(topic, state) {
                    state.progression.advance_to(next.id.clone());
                    progression.advance_to_next_section = true;
                    advance = true;
                    target = next;
                }
            }
            let reasoning = if advance {
                format!(
                    "Correct final answer satisfied the mastery signals for {}. Advancing to \
                     {} with an introductory problem.",
                    section.title, target.title
                )
            } else {
                format!(
                    "Correct final answer in {}. Staying in the section with a new problem to \
                     consolidate mastery.",
                    section.title
                )
            };
            (new_problem_instruction(&target, advance), reasoning)
        }
        DecisionRule::HintBudgetRemaining => {
            state.problem.attempts += 1;
            state.progression.record_attempt(&section.id, false);
            state.progression.record_hint(&section.id);
            state.assessment_window.push(TurnScore {
                correct: false,
                hint_used: true,
            });
            let level = state.problem.hints_given + 1;
            state.problem.hints_given = level;
            hint_level = Some(level);
            concept_gaps = section.learning_objectives.clone();
            let depth = HintDepth::from_level(level);
            let instruction = Instruction::GiveHint {
                focus_concept: section.title.clone(),
                student_error: format!(
                    "Answered '{}' which does not match the expected result",
                    student_input.trim()
                ),
                hint_strategy: hint_strategy_for(depth),
                depth,
            };
            let reasoning = format!(
                "Incorrect answer with {} of {} hints used. Guiding with a {} hint at level {}.",
                level - 1,
                topic.max_hints,
                depth,
                level
            );
            (instruction, reasoning)
        }
        DecisionRule::HintBudgetExhausted => {
            state.problem.attempts += 1;
            state.progression.record_attempt(&section.id, false);
            state.assessment_window.push(TurnScore {
                correct: false,
                hint_used: true,
            });
            concept_gaps = section.learning_objectives.clone();
            let instruction = Instruction::GiveSolution {
                focus_concept: section.title.clone(),
                student_error: format!(
                    "Answered '{}' after the hint budget was exhausted",
                    student_input.trim()
                ),
                struggle_points: concept_gaps.clone(),
            };
            let reasoning = format!(
                "Incorrect answer with all {} hints already used. Showing the full worked \
                 solution instead of another hint.",
                topic.max_hints
            );
            (instruction, reasoning)
        }
    };

    let action = instruction.action();
    state.problem.previous_action = Some(action);
    progression.current_section = state.progression.current_section.clone();

    // A stale answer after a shown solution was never evaluated.
    let answer_correct = answer_correct && rule != DecisionRule::SolutionAlreadyShown;

    Ok(Decision {
        answer_correct,
        is_main_problem_solved,
        assessment: Assessment {
            understanding: state.assessment_window.understanding(),
            concept_gaps,
        },
        progression,
        action,
        hint_level,
        instruction,
        reasoning,
    })
}

fn new_problem_instruction(section: &Section, advance: bool) -> Instruction {
    Instruction::NewProblem {
        target_section: section.id.clone(),
        target_concept: section.title.clone(),
        difficulty: section.difficulty,
        focus_objectives: section.learning_objectives.clone(),
        advance_to_next_section: advance,
    }
}

fn first_unmastered(topic: &Topic, state: &SessionState) -> Option<Section> {
    topic
        .progression
        .sections
        .iter()
        .find(|s| !state.progression.is_mastered(&s.id))
        .cloned()
}

fn hint_strategy_for(depth: HintDepth) -> String {
    match depth {
        HintDepth::GentleNudge => {
            "Ask a guiding question that points at the first step without naming it".to_string()
        }
        HintDepth::SpecificGuidance => {
            "Name the operation to apply next and ask the student to carry it out".to_string()
        }
        HintDepth::NearAnswer => {
            "Walk through every step except the final computation and ask for that last step"
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::Understanding;
    use crate::topic::test_fixtures::sample_topic;

    fn fresh_session(topic: &Topic) -> SessionState {
        let mut state = SessionState::new(topic.first_section().unwrap().id.clone());
        state.begin_problem("Solve 2x + 3 = 11", "4");
        state
    }

    #[test]
    fn test_classify_conceptual_question() {
        assert_eq!(
            classify_input("why do we subtract 3 first?"),
            InputClass::ConceptualQuestion
        );
        assert_eq!(
            classify_input("Can you explain what an inverse operation is?"),
            InputClass::ConceptualQuestion
        );
    }

    #[test]
    fn test_classify_answer_shapes() {
        assert_eq!(classify_input("4"), InputClass::Answer);
        assert_eq!(classify_input("x = 4"), InputClass::Answer);
        assert_eq!(classify_input("3/4?"), InputClass::Answer);
        assert_eq!(classify_input("i think it is four"), InputClass::Answer);
    }

    #[test]
    fn test_classify_solution_request_beats_conceptual() {
        assert_eq!(
            classify_input("what is the answer"),
            InputClass::SolutionRequest
        );
        assert_eq!(classify_input("I give up"), InputClass::SolutionRequest);
    }

    #[test]
    fn test_answer_matching_numeric_and_fraction() {
        assert!(is_correct_answer("4", "4"));
        assert!(is_correct_answer("x = 4", "4"));
        assert!(is_correct_answer("4.0", "4"));
        assert!(is_correct_answer("2/8", "1/4"));
        assert!(!is_correct_answer("5", "4"));
    }

    #[test]
    fn test_answer_matching_textual_fuzzy() {
        assert!(is_correct_answer("One Half", "one half"));
        assert!(is_correct_answer("one halff", "one half"));
        assert!(!is_correct_answer("two thirds", "one half"));
    }

    #[test]
    fn test_guard_order_is_the_documented_matrix() {
        assert_eq!(DECISION_RULES[0], DecisionRule::ConceptualQuestion);
        assert_eq!(DECISION_RULES[1], DecisionRule::SolutionAlreadyShown);
        assert_eq!(DECISION_RULES[6], DecisionRule::HintBudgetExhausted);
    }

    #[test]
    fn test_guard_hint_budget_boundary() {
        let base = GuardContext {
            input_class: InputClass::Answer,
            solution_just_shown: false,
            answer_correct: false,
            masters_section: false,
            last_unmastered_section: false,
            hints_given: 1,
            max_hints: 2,
        };
        assert!(DecisionRule::HintBudgetRemaining.matches(&base));
        let exhausted = GuardContext {
            hints_given: 2,
            ..base
        };
        assert!(!DecisionRule::HintBudgetRemaining.matches(&exhausted));
        assert!(DecisionRule::HintBudgetExhausted.matches(&exhausted));
    }

    #[test]
    fn test_correct_answer_yields_new_problem() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        let decision = decide(&mut state, &topic, "4").unwrap();
        assert!(decision.answer_correct);
        assert!(decision.is_main_problem_solved);
        assert_eq!(decision.action, Action::NewProblem);
        assert_eq!(decision.instruction_field(), "questionInstruction");
        assert_eq!(state.problem.hints_given, 0);
    }

    #[test]
    fn test_conceptual_question_never_touches_hint_budget() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        state.problem.hints_given = 1;
        let before_attempts = state.problem.attempts;

        let decision = decide(&mut state, &topic, "why do we subtract 3 first?").unwrap();
        assert_eq!(decision.action, Action::ClarifyConcept);
        assert_eq!(decision.hint_level, None);
        assert_eq!(state.problem.hints_given, 1);
        assert_eq!(state.problem.attempts, before_attempts);
        assert_eq!(state.concept_questions_asked, 1);
    }

    #[test]
    fn test_conceptual_question_wins_even_after_correct_answer() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        decide(&mut state, &topic, "4").unwrap();
        state.begin_problem("Solve 3x = 12", "4");
        let decision = decide(&mut state, &topic, "how does dividing both sides work?").unwrap();
        assert_eq!(decision.action, Action::ClarifyConcept);
        assert_eq!(state.problem.hints_given, 0);
    }

    #[test]
    fn test_wrong_answer_escalates_hints_then_solution() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);

        let first = decide(&mut state, &topic, "5").unwrap();
        assert_eq!(first.action, Action::GiveHint);
        assert_eq!(first.hint_level, Some(1));
        assert_eq!(state.problem.hints_given, 1);
        match &first.instruction {
            Instruction::GiveHint { depth, .. } => assert_eq!(*depth, HintDepth::GentleNudge),
            other => panic!("expected GiveHint, got {other:?}"),
        }

        let second = decide(&mut state, &topic, "6").unwrap();
        assert_eq!(second.action, Action::GiveHint);
        assert_eq!(second.hint_level, Some(2));
        assert_eq!(state.problem.hints_given, 2);

        let third = decide(&mut state, &topic, "7").unwrap();
        assert_eq!(third.action, Action::GiveSolution);
        assert_eq!(third.hint_level, None);
        assert_eq!(state.problem.hints_given, 2, "solution must not consume hints");
        assert_eq!(third.instruction_field(), "solutionInstruction");
    }

    #[test]
    fn test_turn_after_solution_forces_new_problem() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        state.problem.hints_given = topic.max_hints;
        decide(&mut state, &topic, "7").unwrap();
        assert_eq!(state.problem.previous_action, Some(Action::GiveSolution));

        let decision = decide(&mut state, &topic, "4").unwrap();
        assert_eq!(decision.action, Action::NewProblem);
        assert!(!decision.answer_correct, "stale answer is not re-evaluated");
    }

    #[test]
    fn test_solution_request_bypasses_hint_budget() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        let decision = decide(&mut state, &topic, "just tell me the answer please").unwrap();
        assert_eq!(decision.action, Action::GiveSolution);
        assert_eq!(state.problem.hints_given, 0);
    }

    #[test]
    fn test_mastery_advances_to_next_section() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        // One prior correct answer; threshold is 2.
        state.progression.record_attempt("sec-1", true);

        let decision = decide(&mut state, &topic, "4").unwrap();
        assert_eq!(decision.action, Action::NewProblem);
        assert!(decision.progression.section_mastered);
        assert!(decision.progression.advance_to_next_section);
        assert_eq!(state.progression.current_section, "sec-2");
        match &decision.instruction {
            Instruction::NewProblem {
                target_section,
                advance_to_next_section,
                ..
            } => {
                assert_eq!(target_section, "sec-2");
                assert!(advance_to_next_section);
            }
            other => panic!("expected NewProblem, got {other:?}"),
        }
    }

    #[test]
    fn test_mastered_section_never_reverts() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        state.progression.record_attempt("sec-1", true);
        decide(&mut state, &topic, "4").unwrap();
        assert!(state.progression.is_mastered("sec-1"));

        // Wrong answers in the next section cannot un-master sec-1.
        state.begin_problem("Solve 2x + 1 = 9", "4");
        decide(&mut state, &topic, "99").unwrap();
        assert!(state.progression.is_mastered("sec-1"));
    }

    #[test]
    fn test_last_section_mastery_celebrates() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        state.progression.mark_mastered("sec-1");
        state.progression.advance_to("sec-2");
        state.progression.record_attempt("sec-2", true);
        state.begin_problem("Solve 5x + 1 = 21", "4");

        let decision = decide(&mut state, &topic, "4").unwrap();
        assert_eq!(decision.action, Action::Celebrate);
        assert!(decision.progression.section_mastered);
        assert!(state.progression.is_mastered("sec-2"));
        match &decision.instruction {
            Instruction::Celebrate {
                sections_mastered, ..
            } => assert_eq!(*sections_mastered, 2),
            other => panic!("expected Celebrate, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_section_is_configuration_error() {
        let topic = sample_topic();
        let mut state = SessionState::new("sec-404");
        state.begin_problem("Solve x = 1", "1");
        let err = decide(&mut state, &topic, "1").unwrap_err();
        assert!(matches!(err, crate::error::TutorError::Configuration(_)));
    }

    #[test]
    fn test_struggling_assessment_after_repeated_misses() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        decide(&mut state, &topic, "5").unwrap();
        decide(&mut state, &topic, "6").unwrap();
        let decision = decide(&mut state, &topic, "7").unwrap();
        assert_eq!(decision.assessment.understanding, Understanding::Struggling);
        assert!(!decision.assessment.concept_gaps.is_empty());
    }

    #[test]
    fn test_decision_serializes_instruction_under_agent_field() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        let decision = decide(&mut state, &topic, "5").unwrap();
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["action"], "GIVE_HINT");
        assert_eq!(value["hintLevel"], 1);
        assert_eq!(value["tutorInstruction"]["action"], "GIVE_HINT");
        assert!(value.get("questionInstruction").is_none());
        assert_eq!(value["answerCorrect"], false);
    }

    #[test]
    fn test_reasoning_is_plain_text() {
        let topic = sample_topic();
        let mut state = fresh_session(&topic);
        let decision = decide(&mut state, &topic, "5").unwrap();
        assert!(!decision.reasoning.contains('$'));
        assert!(!decision.reasoning.contains('\\'));
    }
}
