//! Sequences of timed steps
//!
//! A [`Sequence`] is an ordered list of [`SequenceStep`]s that a
//! [`Sequencer`](crate::Sequencer) runs one frame at a time. Sequences are
//! plain values: build one per trigger fire (or clone a template) and hand it
//! to `run()`.
//!
//! ```rust
//! use folio_animation::{Easing, Sequence};
//!
//! let reveal = Sequence::new()
//!     .labeled("page-3 reveal")
//!     .on_panel("page-3")
//!     .wait(1.0)
//!     .fade_to_with(1.0, 0.5, Easing::EaseOut)
//!     .set_active(true);
//!
//! assert_eq!(reveal.steps().len(), 3);
//! assert_eq!(reveal.total_duration(), 1.5);
//! ```

use std::fmt;
use std::sync::Arc;

use folio_core::{MediaHandle, PanelId};
use serde::{Deserialize, Serialize};

use crate::easing::Easing;

/// Callback run by a [`SequenceStep::Custom`] step
pub type CustomStep = Arc<dyn Fn() + Send + Sync>;

/// One step of a sequence
#[derive(Clone)]
pub enum SequenceStep {
    /// Suspend for the given number of seconds
    Wait(f32),
    /// Interpolate the panel's opacity from its current value to `target`
    FadeTo {
        target: f32,
        duration: f32,
        easing: Easing,
    },
    /// Show or hide the panel
    SetActive(bool),
    PlayMedia(MediaHandle),
    StopMedia(MediaHandle),
    /// Suspend until the clip stops playing
    WaitForMedia(MediaHandle),
    Custom(CustomStep),
}

impl SequenceStep {
    /// Fixed duration in seconds, for timed steps
    pub fn duration(&self) -> Option<f32> {
        match self {
            SequenceStep::Wait(duration) | SequenceStep::FadeTo { duration, .. } => Some(*duration),
            _ => None,
        }
    }
}

impl fmt::Debug for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceStep::Wait(duration) => f.debug_tuple("Wait").field(duration).finish(),
            SequenceStep::FadeTo {
                target,
                duration,
                easing,
            } => f
                .debug_struct("FadeTo")
                .field("target", target)
                .field("duration", duration)
                .field("easing", easing)
                .finish(),
            SequenceStep::SetActive(active) => f.debug_tuple("SetActive").field(active).finish(),
            SequenceStep::PlayMedia(handle) => f.debug_tuple("PlayMedia").field(handle).finish(),
            SequenceStep::StopMedia(handle) => f.debug_tuple("StopMedia").field(handle).finish(),
            SequenceStep::WaitForMedia(handle) => {
                f.debug_tuple("WaitForMedia").field(handle).finish()
            }
            SequenceStep::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// What a sequence leaves behind when stopped before it finishes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBehavior {
    /// Leave opacity wherever the interrupted fade had reached
    Hold,
    /// Snap the interrupted fade to its target
    #[default]
    SnapStep,
    /// Apply the end state of every remaining fade and visibility step
    /// (media and custom steps are skipped)
    Finish,
}

pub(crate) type SequenceParts = (
    Option<String>,
    Option<PanelId>,
    Vec<SequenceStep>,
    StopBehavior,
);

/// An ordered list of steps plus the panel they drive
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    label: Option<String>,
    panel: Option<PanelId>,
    steps: Vec<SequenceStep>,
    stop_behavior: StopBehavior,
}

/// Negative or non-finite durations collapse to an instant step
fn sanitize_duration(seconds: f32) -> f32 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in logs and completion events
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Panel whose opacity and visibility the steps drive
    pub fn on_panel(mut self, panel: impl Into<PanelId>) -> Self {
        self.panel = Some(panel.into());
        self
    }

    pub fn stop_behavior(mut self, behavior: StopBehavior) -> Self {
        self.stop_behavior = behavior;
        self
    }

    pub fn step(mut self, step: SequenceStep) -> Self {
        let step = match step {
            SequenceStep::Wait(duration) => SequenceStep::Wait(sanitize_duration(duration)),
            SequenceStep::FadeTo {
                target,
                duration,
                easing,
            } => SequenceStep::FadeTo {
                target: target.clamp(0.0, 1.0),
                duration: sanitize_duration(duration),
                easing,
            },
            other => other,
        };
        self.steps.push(step);
        self
    }

    pub fn wait(self, seconds: f32) -> Self {
        self.step(SequenceStep::Wait(seconds))
    }

    /// Linear fade to `target` opacity
    pub fn fade_to(self, target: f32, seconds: f32) -> Self {
        self.fade_to_with(target, seconds, Easing::Linear)
    }

    pub fn fade_to_with(self, target: f32, seconds: f32, easing: Easing) -> Self {
        self.step(SequenceStep::FadeTo {
            target,
            duration: seconds,
            easing,
        })
    }

    pub fn fade_in(self, seconds: f32) -> Self {
        self.fade_to(1.0, seconds)
    }

    pub fn fade_out(self, seconds: f32) -> Self {
        self.fade_to(0.0, seconds)
    }

    pub fn set_active(self, active: bool) -> Self {
        self.step(SequenceStep::SetActive(active))
    }

    pub fn play_media(self, handle: impl Into<MediaHandle>) -> Self {
        self.step(SequenceStep::PlayMedia(handle.into()))
    }

    pub fn stop_media(self, handle: impl Into<MediaHandle>) -> Self {
        self.step(SequenceStep::StopMedia(handle.into()))
    }

    pub fn wait_for_media(self, handle: impl Into<MediaHandle>) -> Self {
        self.step(SequenceStep::WaitForMedia(handle.into()))
    }

    pub fn custom<F>(self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.step(SequenceStep::Custom(Arc::new(callback)))
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn panel(&self) -> Option<&PanelId> {
        self.panel.as_ref()
    }

    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    pub fn behavior_on_stop(&self) -> StopBehavior {
        self.stop_behavior
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of the fixed step durations (media waits count as zero)
    pub fn total_duration(&self) -> f32 {
        self.steps.iter().filter_map(SequenceStep::duration).sum()
    }

    pub(crate) fn into_parts(self) -> SequenceParts {
        (self.label, self.panel, self.steps, self.stop_behavior)
    }
}

// ============================================================================
// Data-driven sequences
// ============================================================================

/// A step as written in a scene file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepSpec {
    Wait {
        seconds: f32,
    },
    FadeTo {
        target: f32,
        seconds: f32,
        #[serde(default)]
        easing: Easing,
    },
    SetActive {
        active: bool,
    },
    PlayMedia {
        media: MediaHandle,
    },
    StopMedia {
        media: MediaHandle,
    },
    WaitForMedia {
        media: MediaHandle,
    },
}

impl From<StepSpec> for SequenceStep {
    fn from(spec: StepSpec) -> Self {
        match spec {
            StepSpec::Wait { seconds } => SequenceStep::Wait(seconds),
            StepSpec::FadeTo {
                target,
                seconds,
                easing,
            } => SequenceStep::FadeTo {
                target,
                duration: seconds,
                easing,
            },
            StepSpec::SetActive { active } => SequenceStep::SetActive(active),
            StepSpec::PlayMedia { media } => SequenceStep::PlayMedia(media),
            StepSpec::StopMedia { media } => SequenceStep::StopMedia(media),
            StepSpec::WaitForMedia { media } => SequenceStep::WaitForMedia(media),
        }
    }
}

/// A sequence as written in a scene file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceSpec {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub panel: Option<PanelId>,
    #[serde(default)]
    pub stop_behavior: StopBehavior,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl SequenceSpec {
    pub fn to_sequence(&self) -> Sequence {
        let mut sequence = Sequence::new().stop_behavior(self.stop_behavior);
        if let Some(label) = &self.label {
            sequence = sequence.labeled(label.clone());
        }
        if let Some(panel) = &self.panel {
            sequence = sequence.on_panel(panel.clone());
        }
        self.steps
            .iter()
            .cloned()
            .fold(sequence, |sequence, spec| sequence.step(spec.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sanitizes_steps() {
        let sequence = Sequence::new()
            .wait(-1.0)
            .fade_to(2.0, f32::NAN)
            .fade_out(0.25);

        match &sequence.steps()[0] {
            SequenceStep::Wait(d) => assert_eq!(*d, 0.0),
            other => panic!("unexpected step {other:?}"),
        }
        match &sequence.steps()[1] {
            SequenceStep::FadeTo {
                target, duration, ..
            } => {
                assert_eq!(*target, 1.0);
                assert_eq!(*duration, 0.0);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(sequence.total_duration(), 0.25);
    }

    #[test]
    fn test_spec_to_sequence() {
        let spec = SequenceSpec {
            label: Some("intro".into()),
            panel: Some(PanelId::from("page-1")),
            stop_behavior: StopBehavior::Finish,
            steps: vec![
                StepSpec::Wait { seconds: 1.0 },
                StepSpec::FadeTo {
                    target: 1.0,
                    seconds: 0.5,
                    easing: Easing::EaseOut,
                },
                StepSpec::PlayMedia {
                    media: MediaHandle::from("chime"),
                },
            ],
        };

        let sequence = spec.to_sequence();
        assert_eq!(sequence.label(), Some("intro"));
        assert_eq!(sequence.panel(), Some(&PanelId::from("page-1")));
        assert_eq!(sequence.behavior_on_stop(), StopBehavior::Finish);
        assert_eq!(sequence.steps().len(), 3);
        assert!(matches!(
            sequence.steps()[2],
            SequenceStep::PlayMedia(ref h) if h.as_str() == "chime"
        ));
    }

    #[test]
    fn test_custom_step_debug() {
        let sequence = Sequence::new().custom(|| {});
        assert_eq!(format!("{:?}", sequence.steps()[0]), "Custom(..)");
    }
}
