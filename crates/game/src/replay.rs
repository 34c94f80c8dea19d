use std::fs;
use std::path::Path;

use serde::Deserialize;

pub(crate) type ReplayResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum InputKind {
    Press,
    Release,
    Use,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct InputEvent {
    pub at_ms: u64,
    pub kind: InputKind,
    #[serde(default)]
    pub dx: i32,
    #[serde(default)]
    pub dy: i32,
}

/// A deterministic input script for the headless driver: timestamped
/// press/release/use events replayed against the player controller.
#[derive(Debug, Deserialize)]
pub(crate) struct InputRecording {
    pub events: Vec<InputEvent>,
}

impl InputRecording {
    pub(crate) fn load(path: &Path) -> ReplayResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|error| format!("failed to read {}: {error}", path.display()))?;
        let recording: InputRecording = serde_json::from_str(&raw)
            .map_err(|error| format!("failed to parse {}: {error}", path.display()))?;
        let sorted = recording
            .events
            .windows(2)
            .all(|pair| pair[0].at_ms <= pair[1].at_ms);
        if !sorted {
            return Err(format!("{}: events are not in time order", path.display()));
        }
        Ok(recording)
    }

    /// Events due in the half-open window `(from_ms, to_ms]`.
    pub(crate) fn events_between(
        &self,
        from_ms: u64,
        to_ms: u64,
    ) -> impl Iterator<Item = &InputEvent> {
        self.events
            .iter()
            .filter(move |event| event.at_ms > from_ms && event.at_ms <= to_ms)
    }
}
