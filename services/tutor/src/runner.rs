//! Session runner: drives one tutoring session turn by turn.
//!
//! Each student turn runs the fixed sequence: decide → build the instruction
//! prompt → execute it against the LLM → parse the reply → validate the
//! formatting contract. A reply with formatting errors gets exactly one
//! corrective re-prompt; a second violation fails the turn.

use anyhow::{Context, Result, bail};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};
use tutor_core::agents::AgentKind;
use tutor_core::decision::{Decision, decide};
use tutor_core::format::validate_formatting;
use tutor_core::instruction::Action;
use tutor_core::llm_client::LlmClient;
use tutor_core::registry::{Registry, install_core_agents};
use tutor_core::response::{AgentResponse, parse_agent_response};
use tutor_core::session::{SessionState, Turn};
use tutor_core::topic::{Difficulty, ProgressionStructure, Section, Topic};
use tutor_core::{Command, commands_for};

/// System prompt shared by every agent invocation.
pub const SYSTEM_PROMPT: &str = "You are part of a structured math tutoring system. \
    Follow the prompt sections exactly and reply with a single JSON object only.";

/// One problem with its known correct answer, queued per section order.
#[derive(Debug, Clone)]
pub struct ProblemCard {
    pub text: String,
    pub answer: String,
}

/// The result of one handled turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub decision: Decision,
    pub response: AgentResponse,
    pub commands: Vec<Command>,
    pub session_complete: bool,
}

/// Drives one student session against a topic, a registry, and an LLM
/// client. Exactly one decide-then-resolve sequence is in flight at a time.
pub struct SessionRunner {
    registry: Registry,
    topic: Topic,
    state: SessionState,
    client: Arc<dyn LlmClient>,
    bank: VecDeque<ProblemCard>,
}

impl SessionRunner {
    pub fn new(
        mut registry: Registry,
        topic: Topic,
        client: Arc<dyn LlmClient>,
        mut bank: VecDeque<ProblemCard>,
    ) -> Result<Self> {
        install_core_agents(&mut registry);
        registry.register_topic(topic.id.clone(), topic.clone());

        let first_section = topic.first_section()?.id.clone();
        let mut state = SessionState::new(first_section);
        let first = bank
            .pop_front()
            .context("problem bank is empty; nothing to teach")?;
        state.begin_problem(&first.text, &first.answer);
        state.push_turn(Turn::tutor(first.text));

        Ok(Self {
            registry,
            topic,
            state,
            client,
            bank,
        })
    }

    /// The problem currently in front of the student.
    pub fn current_problem(&self) -> &str {
        &self.state.problem.current_problem
    }

    /// Handles one student turn end to end.
    pub async fn handle_turn(&mut self, input: &str) -> Result<TurnOutcome> {
        self.state.push_turn(Turn::student(input));
        let decision = decide(&mut self.state, &self.topic, input)?;
        info!(action = %decision.action, "decision made");

        let mut context = json!({
            "currentProblem": self.state.problem.current_problem,
            "studentResponse": input,
            "recentHistory": self.state.history_text(),
            "hintsGiven": self.state.problem.hints_given,
            "attempts": self.state.problem.attempts,
            "evaluatorReasoning": decision.reasoning,
        });
        if decision.action == Action::NewProblem {
            if let Some(next) = self.bank.front() {
                context["nextProblem"] = json!(next.text);
            }
        }

        let prompt =
            self.registry
                .build_instruction_prompt(&self.topic.id, &decision.instruction, Some(&context))?;

        let reply = self.client.complete(SYSTEM_PROMPT, &prompt).await?;
        let mut response = parse_agent_response(&reply)?;

        let report = validate_formatting(&response);
        for warning in &report.warnings {
            warn!(agent = %AgentKind::for_action(decision.action), "{warning}");
        }
        if !report.valid {
            warn!(errors = ?report.errors, "formatting contract violated; re-prompting once");
            let retry_prompt = format!(
                "{prompt}\n\nYOUR PREVIOUS REPLY VIOLATED THE FORMATTING CONTRACT:\n{}\n\
                 Return a corrected JSON object only.",
                report.errors.join("\n")
            );
            let retry = self.client.complete(SYSTEM_PROMPT, &retry_prompt).await?;
            response = parse_agent_response(&retry)?;
            let second = validate_formatting(&response);
            if !second.valid {
                bail!(
                    "agent reply violated the formatting contract after a retry: {}",
                    second.errors.join("; ")
                );
            }
        }

        self.state.push_turn(Turn::tutor(response.speech.text.clone()));
        if let Some(content) = &response.display.content {
            self.state.push_turn(Turn::tutor(content.clone()));
        }

        let mut session_complete = decision.action == Action::Celebrate;
        if decision.action == Action::NewProblem {
            match self.bank.pop_front() {
                Some(card) => {
                    self.state.begin_problem(&card.text, &card.answer);
                }
                None => {
                    info!("problem bank exhausted; ending session");
                    session_complete = true;
                }
            }
        }

        let commands = commands_for(&response, session_complete);
        Ok(TurnOutcome {
            decision,
            response,
            commands,
            session_complete,
        })
    }
}

/// The bundled demo topic: solving linear equations, two sections.
pub fn demo_topic() -> Topic {
    Topic {
        id: "topic.math.linear-equations".to_string(),
        display_name: "Linear Equations".to_string(),
        topic_name: "solving linear equations".to_string(),
        learning_objectives: vec![
            "Solve one-step linear equations with one inverse operation".to_string(),
            "Solve two-step linear equations by undoing addition before division".to_string(),
            "Check a solution by substituting it back".to_string(),
        ],
        key_formulas: vec!["ax + b = c  =>  x = (c - b) / a".to_string()],
        max_hints: 2,
        progression: ProgressionStructure::new(vec![
            Section {
                id: "one-step".to_string(),
                title: "One-step equations".to_string(),
                difficulty: Difficulty::Foundational,
                mastery_signals: "Solves one-step equations without hints on the first attempt"
                    .to_string(),
                mastery_threshold: 2,
                learning_objectives: vec![
                    "Isolate the variable with a single inverse operation".to_string(),
                ],
                relevant_formulas: vec![],
            },
            Section {
                id: "two-step".to_string(),
                title: "Two-step equations".to_string(),
                difficulty: Difficulty::Intermediate,
                mastery_signals: "Solves two-step equations consistently, undoing the constant \
                                  before the coefficient"
                    .to_string(),
                mastery_threshold: 2,
                learning_objectives: vec![
                    "Undo addition or subtraction before multiplication or division".to_string(),
                ],
                relevant_formulas: vec!["ax + b = c".to_string()],
            },
        ]),
        agent_customizations: HashMap::from([(
            AgentKind::Hint,
            "Relate hints to balancing both sides of a scale".to_string(),
        )]),
        math_tools: json!({
            "balanceScale": "Shows an equation as a two-pan balance with removable weights"
        }),
    }
}

/// Problems for the demo topic, in progression order.
pub fn demo_bank() -> VecDeque<ProblemCard> {
    VecDeque::from(vec![
        ProblemCard {
            text: "Solve x + 5 = 9".to_string(),
            answer: "4".to_string(),
        },
        ProblemCard {
            text: "Solve 3x = 12".to_string(),
            answer: "4".to_string(),
        },
        ProblemCard {
            text: "Solve 2x + 3 = 11".to_string(),
            answer: "4".to_string(),
        },
        ProblemCard {
            text: "Solve 5x - 4 = 16".to_string(),
            answer: "4".to_string(),
        },
    ])
}
