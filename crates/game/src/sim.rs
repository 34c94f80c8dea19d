use engine::{
    Animation, Area, AreaLoader, AssetPaths, DataArea, Entity, EntityId, ExitRequest, IVec2,
    IVec3, MovementMode, Player, ScriptContext, ScriptRegistry,
};
use tracing::{debug, info, warn};

use super::replay::{InputKind, InputRecording};

const TICK_MS: u64 = 16;
const PLAYER_SPEED_TILES_PER_SEC: f32 = 4.0;
const START_TILE: IVec3 = IVec3 { x: 1, y: 2, z: 0 };

pub(crate) type SimResult<T> = Result<T, String>;

#[derive(Debug, Default)]
pub(crate) struct DemoSummary {
    pub ticks: u64,
    pub exits_taken: u32,
    pub exits_failed: u32,
    pub sounds: u32,
}

/// Runs the scripted demo: loads the home map, replays the recorded input
/// against the player, and acts as the world driver for exit transfers.
pub(crate) fn run_demo(paths: &AssetPaths, ticks: u64) -> SimResult<DemoSummary> {
    let registry = build_registry();
    let loader = AreaLoader::new(&registry, &paths.assets_dir);
    let mut area = loader
        .load("maps/home.json")
        .map_err(|error| error.to_string())?;
    seed_ambient_hooks(area.data_mut());

    let id = area
        .spawn(player_entity(), START_TILE)
        .map_err(|error| error.to_string())?;
    let mut player = Player::new(id);

    let recording = InputRecording::load(&paths.assets_dir.join("demo_input.json"))?;

    let mut summary = DemoSummary::default();
    let mut now_ms = 0u64;
    for _ in 0..ticks {
        now_ms += TICK_MS;
        summary.ticks += 1;

        for event in recording.events_between(now_ms - TICK_MS, now_ms) {
            let direction = IVec2::new(event.dx, event.dy);
            match event.kind {
                InputKind::Press => player.press(&mut area, now_ms, direction),
                InputKind::Release => player.release(&mut area, now_ms, direction),
                InputKind::Use => player.use_facing_tile(&mut area, now_ms),
            }
        }

        let result = area.tick(now_ms, TICK_MS);
        for sound in &result.sounds {
            debug!(sound = %sound, "sound requested");
            summary.sounds += 1;
        }
        for request in result.exits {
            if request.entity != player.entity() {
                continue;
            }
            match transfer_through_exit(&loader, &request) {
                Ok((next, next_id)) => {
                    info!(from = area.name(), to = next.name(), "exit taken");
                    summary.exits_taken += 1;
                    area = next;
                    seed_ambient_hooks(area.data_mut());
                    player = Player::new(next_id);
                }
                Err(error) => {
                    warn!(%error, "exit transfer failed");
                    summary.exits_failed += 1;
                    area.cancel_exit(now_ms, request.entity);
                }
            }
        }
    }

    info!(
        area = area.name(),
        door_entries = f64::from(area.data().value("door_entries").unwrap_or(0.0)),
        "demo finished"
    );
    Ok(summary)
}

/// Loads the exit's destination area and places a fresh player entity at
/// the exit coordinate. Any failure leaves the old area untouched so the
/// caller can roll the entity back.
fn transfer_through_exit(
    loader: &AreaLoader<'_>,
    request: &ExitRequest,
) -> SimResult<(Area, EntityId)> {
    let descriptor = format!("maps/{}", request.exit.area);
    let mut next = loader
        .load(&descriptor)
        .map_err(|error| error.to_string())?;
    let tile = next
        .grid()
        .virt_to_phys(request.exit.coords)
        .map_err(|error| error.to_string())?;
    let id = next
        .spawn(player_entity(), tile)
        .map_err(|error| error.to_string())?;
    Ok((next, id))
}

fn player_entity() -> Entity {
    let mut entity = Entity::player_character(MovementMode::Continuous)
        .with_speed(PLAYER_SPEED_TILES_PER_SEC)
        .with_step_sound("step.oga");
    for (direction, frame) in [("up", 10), ("down", 12), ("left", 14), ("right", 16)] {
        entity = entity
            .with_phase(format!("stance_{direction}"), Animation::still(frame))
            .with_phase(
                format!("walk_{direction}"),
                Animation::cycling(vec![frame, frame + 1], 6.0),
            );
    }
    entity
}

fn build_registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register("announce_enter", announce_enter);
    registry.register("announce_leave", announce_leave);
    registry.register("chime", chime);
    registry
}

fn announce_enter(context: &mut ScriptContext<'_>) {
    info!(
        area = context.area_name,
        entity = context.entity.0,
        tile = ?context.tile,
        "stepped into the doorway"
    );
    context.data.bump_value("door_entries");
}

fn announce_leave(context: &mut ScriptContext<'_>) {
    info!(
        area = context.area_name,
        entity = context.entity.0,
        tile = ?context.tile,
        "stepped out"
    );
    context.data.bump_value("door_leaves");
}

fn chime(context: &mut ScriptContext<'_>) {
    info!(area = context.area_name, "the sign chimes");
    context.data.bump_value("chimes");
}

fn seed_ambient_hooks(data: &mut DataArea) {
    data.defer(2_000, |data, now_ms| {
        debug!(now_ms, "ambient birdsong cue");
        data.bump_value("ambient_cues");
    });
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    const FIELD_TILESET: &str = r#"{
        "image": "field.png",
        "imagewidth": 128,
        "imageheight": 64,
        "tilewidth": 32,
        "tileheight": 32,
        "tileproperties": {
            "3": {"frames": "3,4", "speed": 4.0}
        }
    }"#;

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("fixture parent")).expect("fixture dir");
        fs::write(path, contents).expect("fixture write");
    }

    fn demo_assets() -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let root = dir.path();
        write_file(root, "assets/tilesets/field.json", FIELD_TILESET);

        let home_data: Vec<&str> = std::iter::repeat("1").take(30).collect();
        let home = format!(
            r#"{{"width": 6, "height": 5,
                 "properties": {{"name": "Home", "music": "home.ogg"}},
                 "tilesets": [{{"firstgid": 1, "source": "../tilesets/field.json"}}],
                 "layers": [
                    {{"type": "tilelayer", "width": 6, "height": 5,
                      "properties": {{"depth": "0.0"}}, "data": [{}]}},
                    {{"type": "objectgroup", "properties": {{"depth": "0.0"}},
                      "objects": [
                        {{"x": 128, "y": 64, "width": 32, "height": 32,
                          "properties": {{"exit": "forest.json,1,1,0.0",
                                          "on_enter": "announce_enter"}}}}
                      ]}}
                 ]}}"#,
            home_data.join(",")
        );
        write_file(root, "assets/maps/home.json", &home);

        let forest_data: Vec<&str> = std::iter::repeat("2").take(16).collect();
        let forest = format!(
            r#"{{"width": 4, "height": 4,
                 "properties": {{"name": "Forest"}},
                 "tilesets": [{{"firstgid": 1, "source": "../tilesets/field.json"}}],
                 "layers": [{{"type": "tilelayer", "width": 4, "height": 4,
                              "properties": {{"depth": "0.0"}}, "data": [{}]}}]}}"#,
            forest_data.join(",")
        );
        write_file(root, "assets/maps/forest.json", &forest);

        write_file(
            root,
            "assets/demo_input.json",
            r#"{"events": [
                {"at_ms": 20, "kind": "press", "dx": 1},
                {"at_ms": 1200, "kind": "release", "dx": 1}
            ]}"#,
        );
        dir
    }

    #[test]
    fn demo_walks_through_the_home_exit() {
        let dir = demo_assets();
        let paths = AssetPaths {
            root: dir.path().to_path_buf(),
            assets_dir: dir.path().join("assets"),
        };
        // The player starts at (1,2) and holds right; the door at (4,2) is
        // three tiles away, 750 ms at 4 tiles/sec.
        let summary = run_demo(&paths, 120).expect("demo runs");
        assert_eq!(summary.exits_taken, 1);
        assert_eq!(summary.exits_failed, 0);
        assert!(summary.sounds >= 3, "one step sound per tile entered");
    }

    #[test]
    fn missing_destination_rolls_the_player_back() {
        let dir = demo_assets();
        // Point the home exit at a map that does not exist.
        let home_path = dir.path().join("assets/maps/home.json");
        let home = fs::read_to_string(&home_path).expect("home fixture");
        fs::write(&home_path, home.replace("forest.json", "swamp.json")).expect("rewrite");

        let paths = AssetPaths {
            root: dir.path().to_path_buf(),
            assets_dir: dir.path().join("assets"),
        };
        let summary = run_demo(&paths, 120).expect("demo survives the failure");
        assert_eq!(summary.exits_taken, 0);
        assert!(summary.exits_failed >= 1);
    }
}
