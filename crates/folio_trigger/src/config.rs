//! Trigger and scene configuration
//!
//! Scene files are TOML:
//!
//! ```toml
//! name = "storybook"
//!
//! [[trigger]]
//! name = "page-3"
//! tolerance = 0.1
//! audio_cue = "chime"
//! modal = "quiz"
//!
//! [trigger.sequence]
//! panel = "page-3"
//! steps = [
//!     { step = "wait", seconds = 1.0 },
//!     { step = "fade_to", target = 1.0, seconds = 0.5 },
//! ]
//! ```

use std::path::Path;

use folio_animation::{SequenceSpec, SequencerConfig};
use folio_core::{MediaHandle, ModalId, PanelId};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::centering::{Axis, CenteringEvaluator, Tolerance};
use crate::container::ScrollSettings;
use crate::latch::FireMode;

/// Errors from loading or validating a scene
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scene file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("trigger {trigger:?} has non-finite tolerance {value}")]
    InvalidTolerance { trigger: String, value: f32 },

    #[error("max_dt must be a positive number of seconds, got {0}")]
    InvalidMaxDt(f32),

    #[error("trigger names must not be empty")]
    EmptyName,

    #[error("duplicate trigger {0:?}")]
    DuplicateTrigger(String),
}

/// When a dispatcher runs the centering test
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    #[default]
    EveryFrame,
    /// Only after the container reports movement (and on the first tick)
    OnScrollChanged,
}

/// When a lock taken on fire is released
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockPolicy {
    /// As soon as the sequence completes
    #[default]
    OnComplete,
    /// Only through `TriggerDispatcher::unlock` (e.g. when a modal closes)
    Manual,
    /// Never; the scroll stays frozen until teardown
    Never,
}

/// Per-trigger behavior
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub axis: Axis,
    /// Fraction of the target's extent, clamped to `[0, 0.5]`
    pub tolerance: f32,
    pub fire_mode: FireMode,
    pub evaluation: Evaluation,
    /// Freeze the scroll container on fire
    pub lock_scroll: bool,
    pub unlock: UnlockPolicy,
    /// Release the lock when the sequence is cancelled or superseded
    pub unlock_on_cancel: bool,
    /// Stop the running sequence when the target leaves the centered zone
    pub cancel_on_leave: bool,
    /// Clip played on fire
    pub audio_cue: Option<MediaHandle>,
    /// Modal shown when the sequence completes
    pub modal: Option<ModalId>,
    /// Panel made visible and opaque when the sequence completes
    pub reveal_panel: Option<PanelId>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Vertical,
            tolerance: Tolerance::DEFAULT.fraction(),
            fire_mode: FireMode::Repeat,
            evaluation: Evaluation::EveryFrame,
            lock_scroll: true,
            unlock: UnlockPolicy::OnComplete,
            unlock_on_cancel: true,
            cancel_on_leave: false,
            audio_cue: None,
            modal: None,
            reveal_panel: None,
        }
    }
}

impl TriggerConfig {
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance)
    }

    pub fn evaluator(&self) -> CenteringEvaluator {
        CenteringEvaluator::new(self.axis, self.tolerance())
    }
}

/// One `[[trigger]]` entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Unique within the scene; hosts bind target nodes by this name
    pub name: String,
    #[serde(flatten)]
    pub config: TriggerConfig,
    #[serde(default)]
    pub sequence: Option<SequenceSpec>,
}

impl TriggerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: TriggerConfig::default(),
            sequence: None,
        }
    }
}

fn default_max_dt() -> f32 {
    SequencerConfig::default().max_dt
}

/// A whole scene file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Largest frame delta the sequencer accepts, in seconds
    #[serde(default = "default_max_dt")]
    pub max_dt: f32,
    /// Settings applied when a lock is released without a snapshot
    #[serde(default)]
    pub fallback_scroll: ScrollSettings,
    #[serde(default, rename = "trigger")]
    pub triggers: Vec<TriggerSpec>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_dt: default_max_dt(),
            fallback_scroll: ScrollSettings::default(),
            triggers: Vec::new(),
        }
    }
}

impl SceneConfig {
    /// Parse and validate a scene from TOML text
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject what cannot be repaired. Out-of-range tolerances are clamped
    /// (with a warning) when the trigger is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_dt.is_finite() && self.max_dt > 0.0) {
            return Err(ConfigError::InvalidMaxDt(self.max_dt));
        }

        let mut seen = FxHashSet::default();
        for trigger in &self.triggers {
            if trigger.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(trigger.name.as_str()) {
                return Err(ConfigError::DuplicateTrigger(trigger.name.clone()));
            }
            if !trigger.config.tolerance.is_finite() {
                return Err(ConfigError::InvalidTolerance {
                    trigger: trigger.name.clone(),
                    value: trigger.config.tolerance,
                });
            }
            if Tolerance::checked(trigger.config.tolerance).is_none() {
                tracing::warn!(
                    trigger = %trigger.name,
                    tolerance = trigger.config.tolerance,
                    "tolerance outside [0, 0.5] will be clamped"
                );
            }
        }
        Ok(())
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            max_dt: self.max_dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_animation::StepSpec;

    const SCENE: &str = r#"
name = "storybook"

[[trigger]]
name = "page-3"
tolerance = 0.2
fire_mode = "once"
audio_cue = "chime"
modal = "quiz"

[trigger.sequence]
panel = "page-3"
stop_behavior = "finish"
steps = [
    { step = "wait", seconds = 1.0 },
    { step = "fade_to", target = 1.0, seconds = 0.5, easing = "ease_out" },
]

[[trigger]]
name = "page-4"
axis = "horizontal"
lock_scroll = false
evaluation = "on_scroll_changed"
"#;

    #[test]
    fn test_parse_scene() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        assert_eq!(scene.name.as_deref(), Some("storybook"));
        assert_eq!(scene.max_dt, 0.25);
        assert_eq!(scene.triggers.len(), 2);

        let first = &scene.triggers[0];
        assert_eq!(first.config.tolerance, 0.2);
        assert_eq!(first.config.fire_mode, FireMode::Once);
        assert_eq!(first.config.audio_cue, Some(MediaHandle::from("chime")));
        assert_eq!(first.config.modal, Some(ModalId::from("quiz")));
        assert!(first.config.lock_scroll);

        let sequence = first.sequence.as_ref().unwrap();
        assert_eq!(sequence.steps.len(), 2);
        assert_eq!(sequence.steps[0], StepSpec::Wait { seconds: 1.0 });

        let second = &scene.triggers[1];
        assert_eq!(second.config.axis, Axis::Horizontal);
        assert_eq!(second.config.evaluation, Evaluation::OnScrollChanged);
        assert!(!second.config.lock_scroll);
        assert_eq!(second.config.tolerance, 0.1);
        assert!(second.sequence.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = TriggerConfig::default();
        assert_eq!(config.tolerance(), Tolerance::DEFAULT);
        assert_eq!(config.unlock, UnlockPolicy::OnComplete);
        assert!(config.unlock_on_cancel);
        assert!(!config.cancel_on_leave);
    }

    #[test]
    fn test_out_of_range_tolerance_is_clamped_not_rejected() {
        let scene = SceneConfig::from_toml_str(
            r#"
[[trigger]]
name = "wide"
tolerance = 0.8
"#,
        )
        .unwrap();
        assert_eq!(scene.triggers[0].config.tolerance().fraction(), 0.5);
    }

    #[test]
    fn test_non_finite_tolerance_is_rejected() {
        let scene = SceneConfig {
            triggers: vec![TriggerSpec {
                config: TriggerConfig {
                    tolerance: f32::NAN,
                    ..TriggerConfig::default()
                },
                ..TriggerSpec::new("broken")
            }],
            ..SceneConfig::default()
        };
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let duplicate = SceneConfig {
            triggers: vec![TriggerSpec::new("a"), TriggerSpec::new("a")],
            ..SceneConfig::default()
        };
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::DuplicateTrigger(name)) if name == "a"
        ));

        let empty = SceneConfig {
            triggers: vec![TriggerSpec::new(" ")],
            ..SceneConfig::default()
        };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyName)));
    }

    #[test]
    fn test_invalid_max_dt() {
        let err = SceneConfig::from_toml_str("max_dt = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxDt(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = SceneConfig::from_toml_str("[[trigger]]\ntolerance = 0.1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
