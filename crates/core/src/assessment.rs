//! Understanding assessment over a rolling window of scored turns.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of scored turns the window retains.
pub const ASSESSMENT_WINDOW: usize = 5;

/// Minimum scored turns before the window commits to a non-neutral level.
const MIN_SCORED_TURNS: usize = 2;

/// Understanding level derived from recent correctness and hint consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Understanding {
    Strong,
    Developing,
    Struggling,
}

/// The assessment attached to every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub understanding: Understanding,
    pub concept_gaps: Vec<String>,
}

/// One evaluated answer: whether it was correct and whether the student
/// consumed a hint on that turn. Concept questions never enter the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnScore {
    pub correct: bool,
    pub hint_used: bool,
}

/// Bounded window over the most recent scored turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentWindow {
    scores: VecDeque<TurnScore>,
}

impl AssessmentWindow {
    pub fn push(&mut self, score: TurnScore) {
        if self.scores.len() == ASSESSMENT_WINDOW {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Derives the understanding level. Fewer than two scored turns yield
    /// the neutral `Developing`; otherwise a high correct ratio without hint
    /// reliance reads as `Strong` and a low ratio as `Struggling`.
    pub fn understanding(&self) -> Understanding {
        if self.scores.len() < MIN_SCORED_TURNS {
            return Understanding::Developing;
        }
        let total = self.scores.len() as f64;
        let correct = self.scores.iter().filter(|s| s.correct).count() as f64;
        let hinted = self.scores.iter().filter(|s| s.hint_used).count() as f64;
        let correct_ratio = correct / total;
        let hint_ratio = hinted / total;

        if correct_ratio >= 0.8 && hint_ratio <= 0.2 {
            Understanding::Strong
        } else if correct_ratio >= 0.5 {
            Understanding::Developing
        } else {
            Understanding::Struggling
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_n(window: &mut AssessmentWindow, n: usize, correct: bool, hint_used: bool) {
        for _ in 0..n {
            window.push(TurnScore { correct, hint_used });
        }
    }

    #[test]
    fn test_sparse_window_is_neutral() {
        let mut window = AssessmentWindow::default();
        assert_eq!(window.understanding(), Understanding::Developing);
        window.push(TurnScore {
            correct: true,
            hint_used: false,
        });
        assert_eq!(window.understanding(), Understanding::Developing);
    }

    #[test]
    fn test_consistent_correct_answers_read_strong() {
        let mut window = AssessmentWindow::default();
        push_n(&mut window, 4, true, false);
        assert_eq!(window.understanding(), Understanding::Strong);
    }

    #[test]
    fn test_hint_reliance_blocks_strong() {
        let mut window = AssessmentWindow::default();
        push_n(&mut window, 4, true, true);
        assert_eq!(window.understanding(), Understanding::Developing);
    }

    #[test]
    fn test_mostly_wrong_reads_struggling() {
        let mut window = AssessmentWindow::default();
        push_n(&mut window, 1, true, false);
        push_n(&mut window, 3, false, true);
        assert_eq!(window.understanding(), Understanding::Struggling);
    }

    #[test]
    fn test_window_is_bounded_and_recency_weighted() {
        let mut window = AssessmentWindow::default();
        push_n(&mut window, 5, false, true);
        assert_eq!(window.understanding(), Understanding::Struggling);
        // Five recent correct answers displace the old failures entirely.
        push_n(&mut window, 5, true, false);
        assert_eq!(window.len(), ASSESSMENT_WINDOW);
        assert_eq!(window.understanding(), Understanding::Strong);
    }
}
