//! Edge-triggered glow overlay state machine.
//!
//! The overlay turns on when either expression score rises above its
//! threshold and turns off once both are back at or below. Only the
//! crossings produce a transition; steady frames produce nothing.

use crate::types::ExpressionScores;

pub const PUCKER_THRESHOLD: f32 = 0.3;
pub const SHRUG_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlowState {
    #[default]
    Off,
    On,
}

/// A state change the overlay must mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlowTransition {
    TurnedOn,
    TurnedOff,
}

#[derive(Debug, Default)]
pub struct GlowMachine {
    state: GlowState,
}

impl GlowMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GlowState {
        self.state
    }

    pub fn is_glowing(&self) -> bool {
        self.state == GlowState::On
    }

    /// Feed one frame's scores. Returns a transition only on a threshold crossing.
    pub fn update(&mut self, scores: ExpressionScores) -> Option<GlowTransition> {
        let above = scores.pucker > PUCKER_THRESHOLD || scores.shrug > SHRUG_THRESHOLD;

        match self.state {
            GlowState::Off if above => {
                self.state = GlowState::On;
                tracing::debug!(pucker = scores.pucker, shrug = scores.shrug, "glow on");
                Some(GlowTransition::TurnedOn)
            }
            GlowState::On if !above => {
                self.state = GlowState::Off;
                tracing::debug!(pucker = scores.pucker, shrug = scores.shrug, "glow off");
                Some(GlowTransition::TurnedOff)
            }
            _ => None,
        }
    }

    /// Force the machine to `Off` regardless of its current state.
    pub fn reset(&mut self) {
        self.state = GlowState::Off;
    }
}
