//! Runtime-switchable action mode.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// What the scheduler does with notified listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Observe and notify only.
    #[default]
    Off,
    /// Compose messages and send them to the operator instead of the landlord.
    Preview,
    /// Submit contact requests.
    On,
}

impl ActionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Preview => "preview",
            Self::On => "on",
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action mode \"{0}\" (expected off, preview or on)")]
pub struct ParseActionModeError(String);

impl FromStr for ActionMode {
    type Err = ParseActionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "observe" => Ok(Self::Off),
            "preview" | "test" => Ok(Self::Preview),
            "on" | "contact" => Ok(Self::On),
            other => Err(ParseActionModeError(other.to_string())),
        }
    }
}

/// Result of [`ActionModeController::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Unchanged(ActionMode),
    Changed { from: ActionMode, to: ActionMode },
}

/// Shared handle to the current [`ActionMode`].
///
/// Clones observe the same value. Writes are last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct ActionModeController {
    mode: Arc<RwLock<ActionMode>>,
}

impl ActionModeController {
    pub fn new(initial: ActionMode) -> Self {
        Self {
            mode: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn current(&self) -> ActionMode {
        // A poisoned lock still holds a valid mode.
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, mode: ActionMode) -> ModeChange {
        let mut guard = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *guard;
        if previous == mode {
            return ModeChange::Unchanged(mode);
        }
        *guard = mode;
        tracing::info!(from = %previous, to = %mode, "action mode changed");
        ModeChange::Changed {
            from: previous,
            to: mode,
        }
    }
}
