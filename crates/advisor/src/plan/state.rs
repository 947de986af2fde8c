use crate::error::{AdvisorError, Result};
use serde::Serialize;

/// Stages of one plan request.
///
/// ```text
/// INIT -> GATE -> SKIPPED
///              -> GENERATING -> PARSING -> DONE | FAILED
///                            -> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    Init,
    Gate,
    Skipped,
    Generating,
    Parsing,
    Done,
    Failed,
}

impl PlanState {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Gate)
                | (Self::Gate, Self::Skipped | Self::Generating)
                | (Self::Generating, Self::Parsing | Self::Failed)
                | (Self::Parsing, Self::Done | Self::Failed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Done | Self::Failed)
    }
}

/// The path one request took through [`PlanState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRun {
    trace: Vec<PlanState>,
}

impl Default for PlanRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanRun {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace: vec![PlanState::Init],
        }
    }

    #[must_use]
    pub fn state(&self) -> PlanState {
        self.trace.last().copied().unwrap_or(PlanState::Init)
    }

    pub fn advance(&mut self, next: PlanState) -> Result<()> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(AdvisorError::InvalidTransition { from, to: next });
        }
        log::debug!("plan state {from:?} -> {next:?}");
        self.trace.push(next);
        Ok(())
    }

    #[must_use]
    pub fn trace(&self) -> &[PlanState] {
        &self.trace
    }

    #[must_use]
    pub fn into_trace(self) -> Vec<PlanState> {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use PlanState::*;

    #[test]
    fn legal_paths_reach_terminal_states() {
        for path in [
            vec![Gate, Skipped],
            vec![Gate, Generating, Failed],
            vec![Gate, Generating, Parsing, Done],
            vec![Gate, Generating, Parsing, Failed],
        ] {
            let mut run = PlanRun::new();
            for step in &path {
                run.advance(*step).unwrap();
            }
            assert!(run.state().is_terminal(), "{path:?}");
            assert_eq!(run.trace().len(), path.len() + 1);
        }
    }

    #[test]
    fn skipping_the_gate_is_rejected() {
        let mut run = PlanRun::new();
        let err = run.advance(Generating).unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::InvalidTransition {
                from: Init,
                to: Generating
            }
        ));
        assert_eq!(run.state(), Init);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [Init, Gate, Skipped, Generating, Parsing, Done, Failed];
        for terminal in [Skipped, Done, Failed] {
            assert!(all.iter().all(|next| !terminal.can_transition_to(*next)));
        }
        assert!(!Skipped.can_transition_to(Generating));
    }
}
