//! Arm/Disarm Latch
//!
//! Edge detector that turns a per-frame "centered" signal into one fire per
//! entry into the centered zone.
//!
//! State transitions:
//!
//! ```text
//! Armed --(centered)--> Fired      [fires]
//! Fired --(!centered)--> Armed     [re-arms, unless spent]
//! ```
//!
//! With [`FireMode::Once`] the first fire spends the latch: it stays
//! `Fired` until [`Latch::reset`].

use serde::{Deserialize, Serialize};

/// Current latch state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LatchState {
    /// Waiting for the target to become centered
    #[default]
    Armed,
    /// Fired; waiting for the target to leave the centered zone
    Fired,
}

/// Whether a trigger may fire more than once
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// Fire on every entry into the centered zone
    #[default]
    Repeat,
    /// Fire on the first entry only
    Once,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Latch {
    state: LatchState,
    mode: FireMode,
    spent: bool,
}

impl Latch {
    pub fn new(mode: FireMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    pub fn mode(&self) -> FireMode {
        self.mode
    }

    /// True once a [`FireMode::Once`] latch has fired
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Feed one frame's centering result. Returns true exactly on the frame
    /// the latch fires.
    pub fn observe(&mut self, centered: bool) -> bool {
        match (self.state, centered) {
            (LatchState::Armed, true) => {
                self.state = LatchState::Fired;
                if self.mode == FireMode::Once {
                    self.spent = true;
                }
                tracing::trace!("latch fired");
                true
            }
            (LatchState::Fired, false) if !self.spent => {
                self.state = LatchState::Armed;
                tracing::trace!("latch re-armed");
                false
            }
            _ => false,
        }
    }

    /// Re-arm, clearing a spent one-shot latch
    pub fn reset(&mut self) {
        self.state = LatchState::Armed;
        self.spent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fires(latch: &mut Latch, frames: &[bool]) -> Vec<bool> {
        frames.iter().map(|&c| latch.observe(c)).collect()
    }

    #[test]
    fn test_fires_once_per_entry() {
        let mut latch = Latch::default();
        let frames = [false, true, true, true, false, false, true, true];
        assert_eq!(
            fires(&mut latch, &frames),
            [false, true, false, false, false, false, true, false]
        );
    }

    #[test]
    fn test_no_fire_without_centering() {
        let mut latch = Latch::default();
        assert!(fires(&mut latch, &[false; 16]).iter().all(|f| !f));
        assert_eq!(latch.state(), LatchState::Armed);
    }

    #[test]
    fn test_alternating_signal_fires_every_other_frame() {
        let mut latch = Latch::default();
        let frames: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
        let fired = fires(&mut latch, &frames);
        assert_eq!(fired.iter().filter(|f| **f).count(), 5);
        assert_eq!(fired, frames);
    }

    #[test]
    fn test_once_mode_stays_spent() {
        let mut latch = Latch::new(FireMode::Once);
        let frames = [true, false, true, false, true];
        assert_eq!(
            fires(&mut latch, &frames),
            [true, false, false, false, false]
        );
        assert!(latch.is_spent());
        assert_eq!(latch.state(), LatchState::Fired);

        latch.reset();
        assert!(!latch.is_spent());
        assert!(latch.observe(true));
    }

    #[test]
    fn test_reset_rearms_while_centered() {
        let mut latch = Latch::default();
        assert!(latch.observe(true));
        latch.reset();
        assert!(latch.observe(true));
    }
}
