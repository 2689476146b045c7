use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// Where the trainer is in a run.
///
/// Every entry point (`fit`, `validate`, `test`) starts from `Setup` and ends
/// in `Done`. Allowed transitions:
///
/// | from       | to                              |
/// |------------|---------------------------------|
/// | Setup      | Training, Validating, Testing   |
/// | Training   | Validating, Done                |
/// | Validating | Training, Done                  |
/// | Testing    | Done                            |
/// | Done       | Setup                           |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Setup,
    Training,
    Validating,
    Testing,
    Done,
}

impl Stage {
    pub fn can_transition_to(self, to: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, to),
            (Setup, Training)
                | (Setup, Validating)
                | (Setup, Testing)
                | (Training, Validating)
                | (Training, Done)
                | (Validating, Training)
                | (Validating, Done)
                | (Testing, Done)
                | (Done, Setup)
        )
    }
}

/// Stage holder that rejects transitions outside the table above.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    stage: Stage,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle { stage: Stage::Setup }
    }
}

impl Lifecycle {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn transition(&mut self, to: Stage) -> Result<()> {
        if !self.stage.can_transition_to(to) {
            return Err(Error::InvalidTransition { from: self.stage, to });
        }
        log::debug!("Stage {:?} -> {:?}", self.stage, to);
        self.stage = to;
        Ok(())
    }

    /// Moves to `Setup` from `Done`; a no-op when already there.
    pub fn restart(&mut self) -> Result<()> {
        if self.stage == Stage::Setup {
            return Ok(());
        }
        self.transition(Stage::Setup)
    }

    /// Moves to `to` unless already there.
    pub fn enter(&mut self, to: Stage) -> Result<()> {
        if self.stage == to {
            return Ok(());
        }
        self.transition(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_path_is_allowed() {
        let mut lc = Lifecycle::default();
        for to in [Stage::Validating, Stage::Training, Stage::Validating, Stage::Training, Stage::Done] {
            lc.transition(to).unwrap();
        }
        assert_eq!(lc.stage(), Stage::Done);
        lc.restart().unwrap();
        lc.transition(Stage::Testing).unwrap();
        lc.transition(Stage::Done).unwrap();
    }

    #[test]
    fn test_rejects_skipping_setup() {
        let mut lc = Lifecycle::default();
        lc.transition(Stage::Testing).unwrap();
        let err = lc.transition(Stage::Training).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: Stage::Testing, to: Stage::Training }));
        lc.transition(Stage::Done).unwrap();
        assert!(lc.transition(Stage::Testing).is_err());
    }

    #[test]
    fn test_enter_and_restart_are_idempotent() {
        let mut lc = Lifecycle::default();
        lc.restart().unwrap();
        lc.enter(Stage::Training).unwrap();
        lc.enter(Stage::Training).unwrap();
        assert_eq!(lc.stage(), Stage::Training);
    }
}
