use std::collections::HashMap;

use super::coords::IVec3;
use super::entity::EntityId;

/// A tile-triggered script. Resolved from its registered name once at area
/// load; the body is opaque to the runtime.
pub type ScriptFn = fn(&mut ScriptContext<'_>);

/// A deferred or per-tick area hook. Runs without a triggering entity.
pub type AreaHookFn = fn(&mut DataArea, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileTrigger {
    Enter,
    Leave,
    Use,
}

impl TileTrigger {
    pub(crate) const COUNT: usize = 3;

    pub(crate) const fn index(self) -> usize {
        match self {
            TileTrigger::Enter => 0,
            TileTrigger::Leave => 1,
            TileTrigger::Use => 2,
        }
    }
}

/// What a tile script gets to see: the triggering entity, the tile it
/// fired on, and the area's behavior state. Scripts never receive the
/// whole area, which keeps dispatch single-writer.
pub struct ScriptContext<'a> {
    pub area_name: &'a str,
    pub data: &'a mut DataArea,
    pub entity: EntityId,
    pub tile: IVec3,
    pub now_ms: u64,
}

/// Name-to-function table the loader resolves script properties against.
/// Unresolvable names are a load-time error, so dispatch never misses.
#[derive(Default)]
pub struct ScriptRegistry {
    by_name: HashMap<String, ScriptFn>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, script: ScriptFn) {
        self.by_name.insert(name.into(), script);
    }

    pub fn resolve(&self, name: &str) -> Option<ScriptFn> {
        self.by_name.get(name).copied()
    }
}

#[derive(Debug)]
struct DeferredAction {
    remaining_ms: u64,
    hook: AreaHookFn,
}

/// Per-area behavior state: a scratch store for scripts plus queued timed
/// actions and an optional per-tick callback. Due actions always fire
/// before the tick callback.
#[derive(Debug, Default)]
pub struct DataArea {
    values: HashMap<String, f32>,
    deferred: Vec<DeferredAction>,
    on_tick: Option<AreaHookFn>,
}

impl DataArea {
    pub fn set_value(&mut self, key: impl Into<String>, value: f32) {
        self.values.insert(key.into(), value);
    }

    pub fn value(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    pub fn bump_value(&mut self, key: &str) {
        *self.values.entry(key.to_string()).or_insert(0.0) += 1.0;
    }

    pub fn defer(&mut self, delay_ms: u64, hook: AreaHookFn) {
        self.deferred.push(DeferredAction {
            remaining_ms: delay_ms,
            hook,
        });
    }

    pub fn set_tick_hook(&mut self, hook: AreaHookFn) {
        self.on_tick = Some(hook);
    }

    pub(crate) fn tick(&mut self, now_ms: u64, dt_ms: u64) {
        let mut due = Vec::new();
        let mut pending = Vec::new();
        for mut action in std::mem::take(&mut self.deferred) {
            if action.remaining_ms <= dt_ms {
                due.push(action.hook);
            } else {
                action.remaining_ms -= dt_ms;
                pending.push(action);
            }
        }
        // Hooks queued by a firing hook land behind the survivors.
        self.deferred = pending;
        for hook in due {
            hook(self, now_ms);
        }
        if let Some(hook) = self.on_tick {
            hook(self, now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark_deferred(data: &mut DataArea, now_ms: u64) {
        data.set_value("deferred_at", now_ms as f32);
        // The tick hook must not have run yet this tick.
        assert_eq!(data.value("ticks"), None);
    }

    fn count_ticks(data: &mut DataArea, _now_ms: u64) {
        data.bump_value("ticks");
    }

    #[test]
    fn registry_resolves_registered_names_only() {
        fn noop(_context: &mut ScriptContext<'_>) {}
        let mut registry = ScriptRegistry::new();
        registry.register("chime", noop);
        assert!(registry.resolve("chime").is_some());
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn deferred_actions_fire_before_the_tick_hook() {
        let mut data = DataArea::default();
        data.defer(30, mark_deferred);
        data.set_tick_hook(count_ticks);

        data.tick(1_016, 16);
        assert_eq!(data.value("deferred_at"), None);
        assert_eq!(data.value("ticks"), Some(1.0));

        // Second tick crosses the 30 ms deadline; the assert inside
        // mark_deferred proves ordering relative to the tick hook.
        let mut data = DataArea::default();
        data.defer(10, mark_deferred);
        data.set_tick_hook(count_ticks);
        data.tick(1_016, 16);
        assert_eq!(data.value("deferred_at"), Some(1_016.0));
        assert_eq!(data.value("ticks"), Some(1.0));
    }
}
