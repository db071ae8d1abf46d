//! Keys persisted by the dashboard and the types stored under them. Each
//! key owns its own document, so writers never read-modify-write a shared
//! blob.

use crate::store::PrefKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow::anyhow!("unknown theme '{}'", other)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThemePreference {
    pub theme: Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopwatchState {
    pub running: bool,
    /// Wall-clock epoch millis of the last start, set while running.
    pub start_time: Option<i64>,
    /// Millis accumulated over completed runs.
    pub elapsed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WidgetPosition {
    pub x: f64,
    pub y: f64,
}

/// Visual overlay switches keyed by overlay name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverlayToggles(pub BTreeMap<String, bool>);

impl OverlayToggles {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn set(&mut self, name: &str, enabled: bool) {
        self.0.insert(name.to_string(), enabled);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FounderMode {
    pub unlocked: bool,
}

/// Hand-entered Buffett Indicator value that replaces the fetched one on the
/// dashboard while set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedBuffett {
    pub value: Option<f64>,
}

pub struct ThemeKey;
pub struct StopwatchKey;
pub struct WidgetPositionKey;
pub struct OverlaysKey;
pub struct FounderModeKey;
pub struct SimulatedBuffettKey;

impl PrefKey for ThemeKey {
    const KEY: &'static str = "theme";
    type Value = ThemePreference;
}

impl PrefKey for StopwatchKey {
    const KEY: &'static str = "stopwatch";
    type Value = StopwatchState;
}

impl PrefKey for WidgetPositionKey {
    const KEY: &'static str = "widget-position";
    type Value = WidgetPosition;
}

impl PrefKey for OverlaysKey {
    const KEY: &'static str = "overlays";
    type Value = OverlayToggles;
}

impl PrefKey for FounderModeKey {
    const KEY: &'static str = "founder-mode";
    type Value = FounderMode;
}

impl PrefKey for SimulatedBuffettKey {
    const KEY: &'static str = "simulated-buffett";
    type Value = SimulatedBuffett;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PreferenceStore;

    #[test]
    fn test_round_trip_each_key_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = PreferenceStore::on_disk(dir.path()).unwrap();

        let theme = ThemePreference { theme: Theme::Light };
        let stopwatch = StopwatchState {
            running: true,
            start_time: Some(1_700_000_000_123),
            elapsed: 4_500,
        };
        let position = WidgetPosition { x: 12.5, y: -3.0 };
        let mut overlays = OverlayToggles::default();
        overlays.set("scanlines", true);
        overlays.set("grain", false);
        let founder = FounderMode { unlocked: true };
        let simulated = SimulatedBuffett { value: Some(187.25) };

        prefs.save::<ThemeKey>(&theme).unwrap();
        prefs.save::<StopwatchKey>(&stopwatch).unwrap();
        prefs.save::<WidgetPositionKey>(&position).unwrap();
        prefs.save::<OverlaysKey>(&overlays).unwrap();
        prefs.save::<FounderModeKey>(&founder).unwrap();
        prefs.save::<SimulatedBuffettKey>(&simulated).unwrap();

        // Reopen to make sure nothing is served from memory.
        let reopened = PreferenceStore::on_disk(dir.path()).unwrap();
        assert_eq!(reopened.load::<ThemeKey>().unwrap(), Some(theme));
        assert_eq!(reopened.load::<StopwatchKey>().unwrap(), Some(stopwatch));
        assert_eq!(reopened.load::<WidgetPositionKey>().unwrap(), Some(position));
        assert_eq!(reopened.load::<OverlaysKey>().unwrap(), Some(overlays));
        assert_eq!(reopened.load::<FounderModeKey>().unwrap(), Some(founder));
        assert_eq!(reopened.load::<SimulatedBuffettKey>().unwrap(), Some(simulated));
    }

    #[test]
    fn test_keys_are_independent() {
        let prefs = PreferenceStore::in_memory();
        let position = WidgetPosition { x: 1.0, y: 2.0 };
        prefs.save::<WidgetPositionKey>(&position).unwrap();

        prefs.save::<ThemeKey>(&ThemePreference { theme: Theme::Light }).unwrap();
        prefs.clear::<FounderModeKey>().unwrap();
        prefs.save::<FounderModeKey>(&FounderMode { unlocked: true }).unwrap();
        prefs.clear::<ThemeKey>().unwrap();

        assert_eq!(prefs.load::<WidgetPositionKey>().unwrap(), Some(position));
        assert_eq!(prefs.load::<ThemeKey>().unwrap(), None);
    }

    #[test]
    fn test_stopwatch_wire_shape() {
        let state = StopwatchState {
            running: false,
            start_time: None,
            elapsed: 10,
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json, serde_json::json!({"running": false, "startTime": null, "elapsed": 10}));
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("sepia".parse::<Theme>().is_err());
    }
}
