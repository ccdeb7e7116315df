//! Folio Animation
//!
//! Timed effects for scroll-triggered pages.
//!
//! # Features
//!
//! - **Easing**: curves applied to fade progress
//! - **Sequences**: ordered wait / fade / visibility / media / custom steps
//! - **Sequencer**: cooperative, frame-stepped runner with supersede-on-restart,
//!   configurable stop behavior and exactly-once completion
//! - **Step specs**: serde descriptions of sequences for scene files

pub mod easing;
pub mod sequence;
pub mod sequencer;

pub use easing::Easing;
pub use sequence::{CustomStep, Sequence, SequenceSpec, SequenceStep, StepSpec, StopBehavior};
pub use sequencer::{
    FinishCallback, SequenceFinished, SequenceId, SequenceOutcome, Sequencer, SequencerConfig,
    SequencerHandle,
};
