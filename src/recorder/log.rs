//! Step log with a time-travel cursor.
//!
//! Rewinding only moves the cursor; hidden steps stay in the backing vector
//! until a divergent action confirms that their future is gone.

use crate::engine::{EngineInfo, Observation, Transition};

/// Observable part of one log entry
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub observation: Observation,
    pub terminated: bool,
    pub truncated: bool,
    pub info: EngineInfo,
}

impl Frame {
    /// Entry 0: the post-reset observation
    pub fn initial(observation: Observation) -> Self {
        Self {
            observation,
            terminated: false,
            truncated: false,
            info: EngineInfo::none(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// One recorded action and the transition it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Index into the engine action set
    pub action: usize,
    /// Lives reported by the engine just before the action
    pub lives_before: i32,
    pub reward: f64,
    pub frame: Frame,
}

impl Step {
    pub fn from_transition(action: usize, lives_before: i32, transition: Transition) -> Self {
        Self {
            action,
            lives_before,
            reward: transition.reward,
            frame: Frame {
                observation: transition.observation,
                terminated: transition.terminated,
                truncated: transition.truncated,
                info: transition.info,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepLog {
    initial: Frame,
    steps: Vec<Step>,
    /// Steps hidden by time travel, counted back from the end of `steps`
    cursor: usize,
}

impl StepLog {
    pub fn new(initial: Frame) -> Self {
        Self {
            initial,
            steps: Vec::new(),
            cursor: 0,
        }
    }

    /// Rebuild a log from persisted parts; every step is visible.
    pub fn from_parts(initial: Frame, steps: Vec<Step>) -> Self {
        Self {
            initial,
            steps,
            cursor: 0,
        }
    }

    /// Visible entries, including the reset entry.
    pub fn len(&self) -> usize {
        self.action_count() + 1
    }

    /// Always false: the reset entry is never hidden.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Recorded actions on the visible path.
    pub fn action_count(&self) -> usize {
        self.steps.len() - self.cursor
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_displaced(&self) -> bool {
        self.cursor > 0
    }

    pub fn initial(&self) -> &Frame {
        &self.initial
    }

    /// Newest visible entry
    pub fn head(&self) -> &Frame {
        self.visible().last().map_or(&self.initial, |s| &s.frame)
    }

    pub fn head_is_done(&self) -> bool {
        self.head().is_done()
    }

    pub fn visible(&self) -> &[Step] {
        &self.steps[..self.action_count()]
    }

    /// Steps hidden by time travel, oldest first.
    pub fn provisional(&self) -> &[Step] {
        &self.steps[self.action_count()..]
    }

    /// Visible actions starting at recorded action `from`.
    pub fn actions_from(&self, from: usize) -> impl Iterator<Item = usize> + '_ {
        self.visible().iter().skip(from).map(|s| s.action)
    }

    /// Append a step at the head. The log must not be displaced.
    pub fn push(&mut self, step: Step) {
        debug_assert_eq!(self.cursor, 0, "push while displaced into the past");
        self.steps.push(step);
    }

    /// Hide the newest visible step. Returns its reward, or `None` at the reset entry.
    pub fn rewind(&mut self) -> Option<f64> {
        let head = self.visible().last()?.reward;
        self.cursor += 1;
        Some(head)
    }

    /// Detach the hidden steps, oldest first. The visible head becomes the end of the log.
    pub fn take_provisional(&mut self) -> Vec<Step> {
        let keep = self.action_count();
        self.cursor = 0;
        self.steps.split_off(keep)
    }

    /// Put back steps detached by [`StepLog::take_provisional`], hidden again.
    pub fn reinstate_provisional(&mut self, hidden: Vec<Step>) {
        self.cursor += hidden.len();
        self.steps.extend(hidden);
    }
}
