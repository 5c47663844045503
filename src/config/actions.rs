use super::locator::Locator;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A setup step run on the primary context before the event list is read.
#[derive(Debug, Clone)]
pub enum Action {
    // Navigation
    Goto(GotoAction),

    // Interaction
    Click(TargetAction),
    TryClickAll(TargetAction),
    Fill(FillAction),
    PressKey(PressKeyAction),
    ScrollToBottom,

    // Waiting
    WaitFor(WaitForAction),
    Pause(PauseAction),

    // Debug
    Screenshot(ScreenshotAction),
    Log(LogAction),
    WarnIfPresent(WarnIfPresentAction),
}

impl Action {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Goto(_) => "goto",
            Self::Click(_) => "click",
            Self::TryClickAll(_) => "try_click_all",
            Self::Fill(_) => "fill",
            Self::PressKey(_) => "press_key",
            Self::ScrollToBottom => "scroll_to_bottom",
            Self::WaitFor(_) => "wait_for",
            Self::Pause(_) => "pause",
            Self::Screenshot(_) => "screenshot",
            Self::Log(_) => "log",
            Self::WarnIfPresent(_) => "warn_if_present",
        }
    }

    /// Locators this action will resolve, for config validation.
    pub(crate) fn locator(&self) -> Option<&Locator> {
        match self {
            Self::Click(a) | Self::TryClickAll(a) => Some(&a.target),
            Self::Fill(a) => Some(&a.target),
            Self::WaitFor(a) => Some(&a.target),
            Self::WarnIfPresent(a) => Some(&a.target),
            _ => None,
        }
    }
}

const ACTION_NAMES: &[&str] = &[
    "goto",
    "click",
    "try_click_all",
    "fill",
    "press_key",
    "scroll_to_bottom",
    "wait_for",
    "pause",
    "screenshot",
    "log",
    "warn_if_present",
];

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ActionVisitor)
    }
}

struct ActionVisitor;

impl<'de> Visitor<'de> for ActionVisitor {
    type Value = Action;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an action (string for unit variants, or map with single key)")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match value {
            "scroll_to_bottom" => Ok(Action::ScrollToBottom),
            other => Err(de::Error::unknown_variant(other, &["scroll_to_bottom"])),
        }
    }

    fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected action type key"))?;

        let action = match key.as_str() {
            "goto" => Action::Goto(map.next_value()?),
            "click" => Action::Click(map.next_value()?),
            "try_click_all" => Action::TryClickAll(map.next_value()?),
            "fill" => Action::Fill(map.next_value()?),
            "press_key" => Action::PressKey(map.next_value()?),
            "scroll_to_bottom" => {
                let _: serde_yaml::Value = map.next_value()?;
                Action::ScrollToBottom
            }
            "wait_for" => Action::WaitFor(map.next_value()?),
            "pause" => Action::Pause(map.next_value()?),
            "screenshot" => Action::Screenshot(map.next_value()?),
            "log" => Action::Log(map.next_value()?),
            "warn_if_present" => Action::WarnIfPresent(map.next_value()?),
            other => return Err(de::Error::unknown_variant(other, ACTION_NAMES)),
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom(format!(
                "action '{}' must be the only key in its map",
                key
            )));
        }

        Ok(action)
    }
}

// --- Action payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct GotoAction {
    pub url: String,
}

/// Generic action that just needs a target element.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetAction {
    #[serde(flatten)]
    pub target: Locator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillAction {
    #[serde(flatten)]
    pub target: Locator,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PressKeyAction {
    pub key: String,
}

fn default_timeout_ms() -> u64 {
    20_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitForAction {
    #[serde(flatten)]
    pub target: Locator,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PauseAction {
    pub ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotAction {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogAction {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarnIfPresentAction {
    #[serde(flatten)]
    pub target: Locator,
    pub message: String,
}
